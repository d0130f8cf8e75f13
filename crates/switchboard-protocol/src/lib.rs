//! Switchboard — Protocol Types
//!
//! Shared types for the Switchboard API dispatch layer. This crate is the
//! single source of truth for structured errors, wire payload shapes,
//! registration options, version match expressions, and the injected
//! schema capability. It carries no transport or runtime dependencies.

pub mod error;
pub mod options;
pub mod schema;
pub mod version;
pub mod wire;

pub use error::{ApiError, ErrorKind};
pub use options::{RestModel, RestSpec, RestVerb, RouteOptions};
pub use schema::{FieldViolation, Schema, SchemaRef};
pub use version::{ApiVersion, VersionSpec, VersionSpecError};
pub use wire::{
    JsonRpcRequest, JsonRpcResponse, RequestId, RpcResponseBody, StreamTrailer,
};
