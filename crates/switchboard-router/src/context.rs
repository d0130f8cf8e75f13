//! Call context — per-request mutable state threaded through the
//! middleware phases.
//!
//! One context is created per inbound call and exclusively owned by that
//! call's task. `method` and `version` are fixed at construction; `result`
//! and `error` are the short-circuit signals; `extra_errors` collects
//! post-middleware failures that are logged but never surfaced.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use futures_util::stream::BoxStream;
use serde_json::{Map, Value};
use switchboard_protocol::{ApiError, ApiVersion, RouteOptions};
use uuid::Uuid;

/// Item sequence produced by a streaming-response handler.
pub type ValueStream = BoxStream<'static, Result<Value, ApiError>>;

/// Fully-formed response stored by a manual-mode handler. The adapter
/// passes it through verbatim, with no envelope.
#[derive(Debug, Clone)]
pub struct ManualResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl ManualResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn json(status: u16, value: &Value) -> Self {
        Self::new(status)
            .header("content-type", "application/json")
            .body(serde_json::to_vec(value).unwrap_or_default())
    }
}

/// Per-call mutable state.
pub struct CallContext {
    method: String,
    version: ApiVersion,
    /// User-supplied parameters; schema normalization rewrites in place.
    pub params: Map<String, Value>,
    /// Success value. Setting it short-circuits remaining pre/call steps.
    pub result: Option<Value>,
    /// Failure value. Setting it short-circuits remaining pre/call steps
    /// and wins over `result` at serialization time.
    pub error: Option<ApiError>,
    /// Post-middleware failures: logged, never sent to the caller.
    pub extra_errors: Vec<ApiError>,
    result_stream: Option<ValueStream>,
    manual: Option<ManualResponse>,
    route: Arc<RouteOptions>,
    request_id: Uuid,
}

impl CallContext {
    pub fn new(
        method: impl Into<String>,
        version: ApiVersion,
        params: Map<String, Value>,
        route: Arc<RouteOptions>,
    ) -> Self {
        Self {
            method: method.into(),
            version,
            params,
            result: None,
            error: None,
            extra_errors: Vec::new(),
            result_stream: None,
            manual: None,
            route,
            request_id: Uuid::new_v4(),
        }
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn version(&self) -> ApiVersion {
        self.version
    }

    /// Registration options this call was matched against.
    pub fn route(&self) -> &RouteOptions {
        &self.route
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn set_stream(&mut self, stream: ValueStream) {
        self.result_stream = Some(stream);
    }

    pub fn take_stream(&mut self) -> Option<ValueStream> {
        self.result_stream.take()
    }

    pub fn has_stream(&self) -> bool {
        self.result_stream.is_some()
    }

    pub fn set_manual(&mut self, response: ManualResponse) {
        self.manual = Some(response);
    }

    pub fn take_manual(&mut self) -> Option<ManualResponse> {
        self.manual.take()
    }

    pub fn has_manual(&self) -> bool {
        self.manual.is_some()
    }

    /// True once any outcome (result, error, stream, or manual response)
    /// has been produced — the pre/call short-circuit condition.
    pub fn is_settled(&self) -> bool {
        self.result.is_some()
            || self.error.is_some()
            || self.result_stream.is_some()
            || self.manual.is_some()
    }
}

impl fmt::Debug for CallContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallContext")
            .field("method", &self.method)
            .field("version", &self.version)
            .field("request_id", &self.request_id)
            .field("result", &self.result)
            .field("error", &self.error)
            .field("extra_errors", &self.extra_errors.len())
            .field("has_stream", &self.result_stream.is_some())
            .field("has_manual", &self.manual.is_some())
            .finish()
    }
}
