//! Lifecycle observers — host-facing hooks around each call.
//!
//! `request-begin` fires after pre-middleware completes and before the
//! call chain starts; `request-end` once the response is fully determined
//! (including after a stream finishes or the connection drops);
//! `request-error` for out-of-band failures such as socket errors during
//! a streaming response. Observers fire in registration order and are
//! individually isolated: one failing observer cannot block the others or
//! the request.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use switchboard_protocol::ApiError;
use tracing::warn;

use crate::context::CallContext;

/// Host hook receiving call lifecycle events. All methods default to
/// no-ops, so observers implement only what they care about.
pub trait LifecycleObserver: Send + Sync {
    fn on_request_begin(&self, _ctx: &CallContext) {}
    fn on_request_end(&self, _ctx: &CallContext) {}
    fn on_request_error(&self, _ctx: &CallContext, _error: &ApiError) {}
}

/// Frozen, shareable set of observers with defined fire order.
#[derive(Clone, Default)]
pub struct ObserverSet {
    observers: Arc<Vec<Arc<dyn LifecycleObserver>>>,
}

impl ObserverSet {
    pub fn new(observers: Vec<Arc<dyn LifecycleObserver>>) -> Self {
        Self {
            observers: Arc::new(observers),
        }
    }

    pub fn request_begin(&self, ctx: &CallContext) {
        self.fire("request-begin", |o| o.on_request_begin(ctx));
    }

    pub fn request_end(&self, ctx: &CallContext) {
        self.fire("request-end", |o| o.on_request_end(ctx));
    }

    pub fn request_error(&self, ctx: &CallContext, error: &ApiError) {
        self.fire("request-error", |o| o.on_request_error(ctx, error));
    }

    fn fire(&self, event: &str, f: impl Fn(&dyn LifecycleObserver)) {
        for observer in self.observers.iter() {
            let call = AssertUnwindSafe(|| f(observer.as_ref()));
            if std::panic::catch_unwind(call).is_err() {
                warn!(event, "lifecycle observer panicked");
            }
        }
    }
}
