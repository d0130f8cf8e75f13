//! Wire payload shapes shared by the transport adapters.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-RPC request ID — either a string or integer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    String(String),
    Number(i64),
}

/// Body of an RPC-over-path response. Always sent with HTTP 200; exactly
/// one of `result`/`error` is present (error wins when both were set).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponseBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

impl RpcResponseBody {
    pub fn result(result: Value) -> Self {
        Self {
            result: Some(result),
            error: None,
        }
    }

    pub fn error(error: Value) -> Self {
        Self {
            result: None,
            error: Some(error),
        }
    }
}

/// Inbound JSON-RPC request. Fields are optional so that a missing `id`
/// or `method` surfaces as a structured `bad_request` instead of a parse
/// failure.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcRequest {
    pub id: Option<RequestId>,
    pub method: Option<String>,
    #[serde(default)]
    pub params: Option<Value>,
}

/// JSON-RPC response: `{ id, result, error }` with both keys always
/// present and exactly one of them non-null.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcResponse {
    pub id: Option<RequestId>,
    pub result: Value,
    pub error: Value,
}

impl JsonRpcResponse {
    pub fn result(id: Option<RequestId>, result: Value) -> Self {
        Self {
            id,
            result,
            error: Value::Null,
        }
    }

    pub fn error(id: Option<RequestId>, error: Value) -> Self {
        Self {
            id,
            result: Value::Null,
            error,
        }
    }
}

/// Terminal line of a streaming response: `{"success": true}` or
/// `{"success": false, "error": {...}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamTrailer {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

impl StreamTrailer {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: Value) -> Self {
        Self {
            success: false,
            error: Some(error),
        }
    }
}
