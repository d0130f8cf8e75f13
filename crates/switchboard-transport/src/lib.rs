//! Switchboard Transport Layer
//!
//! Wire adapters binding the dispatch core to concrete protocols:
//! - [`HttpRpcInterface`] — `POST /v{N}/rpc/{method path}`
//! - [`JsonRpcInterface`] — `POST /v{N}/jsonrpc`
//! - [`RestInterface`] — verb/route inference from method names
//!
//! Each adapter owns its own method table and pre/post middleware lists,
//! parses method name and parameters from the wire request, drives the
//! middleware phases, and serializes the outcome back in its own format —
//! including chunked streaming responses with keep-alive filler.

mod dispatch;
mod streaming;

pub mod jsonrpc;
pub mod rest;
pub mod rpc;

pub use jsonrpc::JsonRpcInterface;
pub use rest::RestInterface;
pub use rpc::HttpRpcInterface;
