//! Phase runner — executes an ordered middleware chain against one call
//! context.
//!
//! Steps run strictly sequentially in registration order: step N's
//! mutations must be visible to step N+1, so there is no concurrency
//! within one context. The runner never fails the task itself — every
//! failure, including a panic inside a step, lands in the context.

use std::backtrace::Backtrace;

use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use switchboard_protocol::ApiError;
use tracing::warn;

use crate::context::CallContext;
use crate::middleware::DynMiddleware;

/// The three ordered phases of a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Pre,
    Call,
    Post,
}

/// Run one phase of the chain.
///
/// Pre/Call: a step is skipped (along with the rest of the phase) once the
/// context is settled — a result, error, stream, or manual response exists.
/// A returned value settles `result`; a returned error settles `error`.
///
/// Post: every step runs regardless of the context's state. Return values
/// are ignored; errors are appended to `extra_errors` and logged, never
/// allowed to replace an already-computed outcome.
pub async fn run_phase(ctx: &mut CallContext, phase: Phase, chain: &[DynMiddleware]) {
    for mw in chain {
        if phase != Phase::Post && ctx.is_settled() {
            break;
        }

        let outcome = AssertUnwindSafe(mw.call_dyn(ctx)).catch_unwind().await;
        match outcome {
            Ok(Ok(Some(value))) => {
                if phase != Phase::Post {
                    ctx.result = Some(value);
                }
            }
            Ok(Ok(None)) => {}
            Ok(Err(error)) => apply_error(ctx, phase, error, mw.name_dyn()),
            Err(payload) => {
                let error = error_from_panic(payload);
                apply_error(ctx, phase, error, mw.name_dyn());
            }
        }
    }
}

fn apply_error(ctx: &mut CallContext, phase: Phase, error: ApiError, step: &str) {
    if phase == Phase::Post {
        warn!(
            method = ctx.method(),
            step,
            code = %error.code,
            "post-middleware failed: {}",
            error.message
        );
        ctx.extra_errors.push(error);
    } else {
        ctx.error = Some(error);
    }
}

/// Normalize a panic payload into an internal error so one misbehaving
/// step cannot tear down the request task.
fn error_from_panic(payload: Box<dyn std::any::Any + Send>) -> ApiError {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "internal error".to_string());

    ApiError::internal(message).with_stack(Backtrace::force_capture().to_string())
}
