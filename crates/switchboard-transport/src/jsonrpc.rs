//! JSON-RPC adapter — a single endpoint per version.
//!
//! `POST /v{N}/jsonrpc` with body `{ id, method, params }`. Responses are
//! HTTP 200 `{ id, result, error }` with exactly one of result/error
//! non-null. Streaming methods emit newline-delimited JSON chunks followed
//! by a terminal `{"success": ...}` line.

use std::sync::Arc;

use axum::Router;
use axum::body::Bytes;
use axum::http::StatusCode;
use axum::response::Response;
use axum::routing::post;
use serde_json::Value;
use switchboard_protocol::{ApiError, JsonRpcRequest, JsonRpcResponse, RequestId};
use switchboard_router::{
    CallContext, DynMiddleware, MethodRoute, MountContext, RegisterError, RouterShared,
    TransportInterface,
};
use tracing::{debug, warn};

use crate::dispatch::{self, AdapterCore, MountedCore};
use crate::streaming::{self, FinalEncoder};

/// Transport adapter multiplexing every method over one endpoint.
#[derive(Default)]
pub struct JsonRpcInterface {
    core: AdapterCore,
}

impl JsonRpcInterface {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TransportInterface for JsonRpcInterface {
    fn name(&self) -> &'static str {
        "jsonrpc"
    }

    fn register(&mut self, route: MethodRoute) -> Result<(), RegisterError> {
        if route.options.norpc {
            debug!(method = %route.options.method, "norpc method skipped by jsonrpc interface");
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
        let endpoint = post(move |body: Bytes| {
            let core = core.clone();
            async move { jsonrpc_call(core, body).await }
        });
        Router::new().route("/jsonrpc", endpoint)
    }
}

async fn jsonrpc_call(core: Arc<MountedCore>, body: Bytes) -> Response {
    let request: JsonRpcRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            return jsonrpc_error(
                &core.shared,
                None,
                &ApiError::bad_request(format!("malformed JSON body: {e}")),
            );
        }
    };

    let Some(id) = request.id else {
        return jsonrpc_error(&core.shared, None, &ApiError::bad_request("missing request id"));
    };
    let method = match request.method {
        Some(method) if !method.is_empty() => method,
        _ => {
            return jsonrpc_error(
                &core.shared,
                Some(id),
                &ApiError::bad_request("missing method name"),
            );
        }
    };

    let Some(route) = core.methods.get(&method).cloned() else {
        return jsonrpc_error(&core.shared, Some(id), &ApiError::not_found(&method));
    };

    let params = match dispatch::object_params(request.params) {
        Ok(params) => params,
        Err(err) => return jsonrpc_error(&core.shared, Some(id), &err),
    };

    let ctx = CallContext::new(method, core.version, params, route.options.clone());

    if route.options.streaming_response || route.options.keep_alive {
        let encoder_id = id.clone();
        let encode: FinalEncoder = Box::new(move |ctx: &CallContext, shared: &RouterShared| {
            encode_jsonrpc_final(Some(encoder_id), ctx, shared)
        });
        return streaming::spawn_streaming(ctx, route, core, encode);
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

    let payload = encode_jsonrpc_final(Some(id), &ctx, &core.shared);
    core.shared.observers.request_end(&ctx);
    dispatch::json_response(StatusCode::OK, payload)
}

/// Final payload: error wins when both error and result were set.
fn encode_jsonrpc_final(
    id: Option<RequestId>,
    ctx: &CallContext,
    shared: &RouterShared,
) -> Bytes {
    let response = if let Some(err) = &ctx.error {
        JsonRpcResponse::error(id, err.to_wire(shared.config.include_error_stack))
    } else {
        JsonRpcResponse::result(id, ctx.result.clone().unwrap_or(Value::Null))
    };
    serde_json::to_vec(&response).unwrap_or_default().into()
}

fn jsonrpc_error(shared: &RouterShared, id: Option<RequestId>, error: &ApiError) -> Response {
    let response = JsonRpcResponse::error(id, error.to_wire(shared.config.include_error_stack));
    dispatch::json_response(
        StatusCode::OK,
        serde_json::to_vec(&response).unwrap_or_default().into(),
    )
}
