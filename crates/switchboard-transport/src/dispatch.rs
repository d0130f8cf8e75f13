//! Shared per-call execution and response plumbing for the adapters.

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::http::{HeaderName, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde_json::{Map, Value};
use switchboard_protocol::{ApiError, ApiVersion};
use switchboard_router::{
    CallContext, DynMiddleware, ManualResponse, MethodRoute, MountContext, Phase, RegisterError,
    RouterShared, run_phase,
};
use tracing::warn;

/// Registration-phase adapter state: the method table plus this adapter's
/// own pre/post middleware lists.
#[derive(Default)]
pub(crate) struct AdapterCore {
    pub methods: HashMap<String, MethodRoute>,
    pub pre: Vec<DynMiddleware>,
    pub post: Vec<DynMiddleware>,
}

impl AdapterCore {
    pub fn insert(&mut self, route: MethodRoute) -> Result<(), RegisterError> {
        let method = route.options.method.clone();
        if self.methods.insert(method.clone(), route).is_some() {
            return Err(RegisterError::DuplicateMethod(method));
        }
        Ok(())
    }

    /// Freeze into the shape shared by the serving tasks.
    pub fn into_mounted(self, ctx: MountContext) -> MountedCore {
        MountedCore {
            methods: self.methods,
            pre: self.pre.into(),
            post: self.post.into(),
            version: ctx.version,
            shared: ctx.shared,
        }
    }
}

/// Frozen adapter state. Written only during registration; read-only once
/// serving starts.
pub(crate) struct MountedCore {
    pub methods: HashMap<String, MethodRoute>,
    pub pre: Arc<[DynMiddleware]>,
    pub post: Arc<[DynMiddleware]>,
    pub version: ApiVersion,
    pub shared: Arc<RouterShared>,
}

/// Run pre, call, and post phases in order, firing `request-begin`
/// between pre and call, then apply response-schema normalization.
pub(crate) async fn run_pipeline(ctx: &mut CallContext, route: &MethodRoute, core: &MountedCore) {
    run_phase(ctx, Phase::Pre, &core.pre).await;
    core.shared.observers.request_begin(ctx);
    run_phase(ctx, Phase::Call, &route.chain).await;
    run_phase(ctx, Phase::Post, &core.post).await;
    normalize_result(ctx, route);
}

/// Response-schema normalization on the default single-payload branch.
/// Streams and manual responses are never normalized; a violation
/// replaces the result with a validation error.
fn normalize_result(ctx: &mut CallContext, route: &MethodRoute) {
    if ctx.error.is_some() || ctx.has_stream() || ctx.has_manual() {
        return;
    }
    let Some(schema) = &route.options.response_schema else {
        return;
    };
    let Some(result) = ctx.result.take() else {
        return;
    };
    match schema.normalize(&result) {
        Ok(normalized) => ctx.result = Some(normalized),
        Err(violations) => {
            warn!(method = ctx.method(), "response failed schema normalization");
            ctx.error = Some(ApiError::validation(violations));
        }
    }
}

/// Parse an RPC-over-path request body: empty, or `{ "params": {...} }`.
pub(crate) fn rpc_params(body: &[u8]) -> Result<Map<String, Value>, ApiError> {
    if body.is_empty() {
        return Ok(Map::new());
    }
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| ApiError::bad_request(format!("malformed JSON body: {e}")))?;
    let Value::Object(map) = value else {
        return Err(ApiError::bad_request("request body must be a JSON object"));
    };
    match map.get("params") {
        None | Some(Value::Null) => Ok(Map::new()),
        Some(Value::Object(params)) => Ok(params.clone()),
        Some(_) => Err(ApiError::bad_request("params must be an object")),
    }
}

/// Coerce a JSON-RPC `params` field into the context's parameter map.
pub(crate) fn object_params(params: Option<Value>) -> Result<Map<String, Value>, ApiError> {
    match params {
        None | Some(Value::Null) => Ok(Map::new()),
        Some(Value::Object(map)) => Ok(map),
        Some(_) => Err(ApiError::bad_request("params must be an object")),
    }
}

pub(crate) fn json_response(status: StatusCode, body: Bytes) -> Response {
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

pub(crate) fn empty_response(status: StatusCode) -> Response {
    Response::builder()
        .status(status)
        .body(Body::empty())
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

/// Pass a manual response through verbatim. Headers that do not parse are
/// dropped with a warning rather than failing the response.
pub(crate) fn manual_response(manual: ManualResponse) -> Response {
    let status = StatusCode::from_u16(manual.status).unwrap_or(StatusCode::OK);
    let mut builder = Response::builder().status(status);
    for (name, value) in &manual.headers {
        match (name.parse::<HeaderName>(), value.parse::<HeaderValue>()) {
            (Ok(name), Ok(value)) => builder = builder.header(name, value),
            _ => warn!(header = %name, "manual response header dropped: invalid name or value"),
        }
    }
    builder
        .body(Body::from(manual.body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}
