//! Injected schema capability.
//!
//! The dispatch layer never implements validation itself: hosts plug in
//! their schema engine through this trait. Parameter schemas run as a
//! prepended middleware before the call chain; response schemas run
//! adapter-side once the final result is known.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A compiled schema capable of normalizing a value.
pub trait Schema: Send + Sync {
    /// Normalize `value`, returning the rewritten value or the list of
    /// field-level violations.
    fn normalize(&self, value: &Value) -> Result<Value, Vec<FieldViolation>>;
}

/// Shared handle to an injected schema.
pub type SchemaRef = Arc<dyn Schema>;

/// One field-level schema violation, carried in the `data` payload of a
/// `validation_error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldViolation {
    pub field: String,
    pub message: String,
}

impl FieldViolation {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}
