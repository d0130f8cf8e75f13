//! Switchboard Router — the dispatch core.
//!
//! Hosts register named, versioned methods once; the router resolves which
//! versions each registration applies to, fans it out to the transport
//! adapters attached to those versions, and drives the per-call middleware
//! phases (pre, call, post) with short-circuit and post-always semantics.
//!
//! The HTTP substrate (axum) stays external: [`ApiRouter::into_service`]
//! consumes the fully-registered router and produces a plain
//! `axum::Router` for the host to serve.

pub mod api;
pub mod context;
pub mod middleware;
pub mod observer;
pub mod registry;
pub mod runner;

pub use api::{ApiRouter, RouterConfig, RouterShared};
pub use context::{CallContext, ManualResponse, ValueStream};
pub use middleware::{
    DynMiddleware, Middleware, MiddlewareDyn, MiddlewareResult, from_fn, handler, streamer,
};
pub use observer::{LifecycleObserver, ObserverSet};
pub use registry::{
    MethodRoute, MountContext, RegisterError, TransportInterface, VersionRouter,
    VersionRouterBuilder,
};
pub use runner::{Phase, run_phase};
