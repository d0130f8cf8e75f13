//! RPC-over-path adapter.
//!
//! Each method is reachable at `POST /v{N}/rpc/{method with '.' → '/'}`
//! with a `{ "params": {...} }` body. Responses are always HTTP 200 with
//! `{"result": ...}` or `{"error": {...}}` — transport-level status codes
//! never encode API failures on this interface.

use std::sync::Arc;

use axum::Router;
use axum::body::Bytes;
use axum::extract::Path;
use axum::http::StatusCode;
use axum::response::Response;
use axum::routing::post;
use serde_json::Value;
use switchboard_protocol::{ApiError, RpcResponseBody};
use switchboard_router::{
    CallContext, DynMiddleware, MethodRoute, MountContext, RegisterError, RouterShared,
    TransportInterface,
};
use tracing::{debug, warn};

use crate::dispatch::{self, AdapterCore, MountedCore};
use crate::streaming;

/// Transport adapter exposing each method at its own sub-path.
#[derive(Default)]
pub struct HttpRpcInterface {
    core: AdapterCore,
}

impl HttpRpcInterface {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TransportInterface for HttpRpcInterface {
    fn name(&self) -> &'static str {
        "rpc"
    }

    fn register(&mut self, route: MethodRoute) -> Result<(), RegisterError> {
        if route.options.norpc {
            debug!(method = %route.options.method, "norpc method skipped by rpc interface");
            return Ok(());
        }
        self.core.insert(route)
    }

    fn register_pre(&mut self, mw: DynMiddleware) {
        self.core.pre.push(mw);
    }

    fn register_post(&mut self, mw: DynMiddleware) {
        self.core.post.push(mw);
    }

    fn mount(self: Box<Self>, ctx: MountContext) -> Router {
        let core = Arc::new(self.core.into_mounted(ctx));

        let wildcard_core = core.clone();
        let wildcard = post(move |Path(method_path): Path<String>, body: Bytes| {
            let core = wildcard_core.clone();
            async move { rpc_call(core, method_path, body).await }
        });

        // POST /rpc with no method segment at all.
        let bare_core = core.clone();
        let bare = post(move || {
            let core = bare_core.clone();
            async move { rpc_error(&core.shared, &ApiError::bad_request("missing method name")) }
        });

        Router::new()
            .route("/rpc", bare)
            .route("/rpc/{*method}", wildcard)
    }
}

async fn rpc_call(core: Arc<MountedCore>, method_path: String, body: Bytes) -> Response {
    let method = method_path.trim_matches('/').replace('/', ".");

    let Some(route) = core.methods.get(&method).cloned() else {
        return rpc_error(&core.shared, &ApiError::not_found(&method));
    };

    let params = match dispatch::rpc_params(&body) {
        Ok(params) => params,
        Err(err) => return rpc_error(&core.shared, &err),
    };

    let ctx = CallContext::new(method, core.version, params, route.options.clone());

    if route.options.streaming_response || route.options.keep_alive {
        return streaming::spawn_streaming(ctx, route, core, Box::new(encode_rpc_final));
    }

    let mut ctx = ctx;
    dispatch::run_pipeline(&mut ctx, &route, &core).await;

    if let Some(manual) = ctx.take_manual() {
        core.shared.observers.request_end(&ctx);
        return dispatch::manual_response(manual);
    }
    if route.options.manual_response {
        warn!(method = ctx.method(), "manual-response method produced no response");
        core.shared.observers.request_end(&ctx);
        return dispatch::empty_response(StatusCode::OK);
    }

    let payload = encode_rpc_final(&ctx, &core.shared);
    core.shared.observers.request_end(&ctx);
    dispatch::json_response(StatusCode::OK, payload)
}

/// Final payload: error wins when both error and result were set.
fn encode_rpc_final(ctx: &CallContext, shared: &RouterShared) -> Bytes {
    let body = if let Some(err) = &ctx.error {
        RpcResponseBody::error(err.to_wire(shared.config.include_error_stack))
    } else {
        RpcResponseBody::result(ctx.result.clone().unwrap_or(Value::Null))
    };
    serde_json::to_vec(&body).unwrap_or_default().into()
}

fn rpc_error(shared: &RouterShared, error: &ApiError) -> Response {
    let body = RpcResponseBody::error(error.to_wire(shared.config.include_error_stack));
    dispatch::json_response(
        StatusCode::OK,
        serde_json::to_vec(&body).unwrap_or_default().into(),
    )
}
