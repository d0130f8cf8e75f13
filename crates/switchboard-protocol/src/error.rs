//! Structured API errors and the code → HTTP status table.
//!
//! Errors cross the wire as `{ code, message, data?, cause?, stack? }`.
//! The `stack` field is stripped by [`ApiError::to_wire`] unless the host
//! opted into exposing it.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::schema::FieldViolation;

/// Well-known error kinds plus a catch-all for host-defined codes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    BadRequest,
    NotFound,
    InternalError,
    RequestError,
    ValidationError,
    Unauthorized,
    Forbidden,
    Conflict,
    NotModified,
    Custom(String),
}

impl ErrorKind {
    /// Stable string code sent over the wire.
    pub fn code(&self) -> &str {
        match self {
            Self::BadRequest => "bad_request",
            Self::NotFound => "not_found",
            Self::InternalError => "internal_error",
            Self::RequestError => "request_error",
            Self::ValidationError => "validation_error",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::Conflict => "conflict",
            Self::NotModified => "not_modified",
            Self::Custom(c) => c,
        }
    }

    pub fn from_code(code: &str) -> Self {
        match code {
            "bad_request" => Self::BadRequest,
            "not_found" => Self::NotFound,
            "internal_error" => Self::InternalError,
            "request_error" => Self::RequestError,
            "validation_error" => Self::ValidationError,
            "unauthorized" => Self::Unauthorized,
            "forbidden" => Self::Forbidden,
            "conflict" => Self::Conflict,
            "not_modified" => Self::NotModified,
            c => Self::Custom(c.to_string()),
        }
    }

    /// HTTP status used by the REST adapter. RPC-style adapters always
    /// answer 200 and carry the error in the body.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::BadRequest | Self::ValidationError => 400,
            Self::Unauthorized => 401,
            Self::Forbidden => 403,
            Self::NotFound => 404,
            Self::NotModified => 304,
            Self::Conflict => 409,
            Self::InternalError | Self::RequestError | Self::Custom(_) => 500,
        }
    }
}

/// Structured error carried through the call context and onto the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<Box<ApiError>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl ApiError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            code: kind.code().to_string(),
            message: message.into(),
            data: None,
            cause: None,
            stack: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_cause(mut self, cause: ApiError) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadRequest, message)
    }

    pub fn not_found(method: &str) -> Self {
        Self::new(ErrorKind::NotFound, format!("Method not found: {method}"))
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InternalError, message)
    }

    pub fn request_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RequestError, message)
    }

    /// Schema normalization failure carrying field-level sub-errors.
    pub fn validation(violations: Vec<FieldViolation>) -> Self {
        Self::new(ErrorKind::ValidationError, "Parameter validation failed")
            .with_data(json!({ "violations": violations }))
    }

    pub fn kind(&self) -> ErrorKind {
        ErrorKind::from_code(&self.code)
    }

    pub fn http_status(&self) -> u16 {
        self.kind().http_status()
    }

    /// Wire representation. Stack traces (including nested causes') are
    /// stripped unless the host configured `include_error_stack`.
    pub fn to_wire(&self, include_stack: bool) -> Value {
        let value = if include_stack {
            serde_json::to_value(self)
        } else {
            let mut stripped = self.clone();
            stripped.strip_stack();
            serde_json::to_value(&stripped)
        };
        value.unwrap_or_else(|_| json!({ "code": self.code, "message": self.message }))
    }

    fn strip_stack(&mut self) {
        self.stack = None;
        if let Some(cause) = &mut self.cause {
            cause.strip_stack();
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "API Error [{}]: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause.as_deref().map(|c| c as &(dyn std::error::Error + 'static))
    }
}
