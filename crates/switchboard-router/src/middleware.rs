//! Middleware — one asynchronous step in a call's processing chain.
//!
//! A step receives the mutable call context and either continues the
//! chain (`Ok(None)`), produces the call's result (`Ok(Some(value))`),
//! or fails it (`Err(error)`). Phase semantics (short-circuit, post-only
//! isolation) live in [`crate::runner`].

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::{Map, Value};
use switchboard_protocol::ApiError;

use crate::context::{CallContext, ValueStream};

/// Outcome of one middleware step.
pub type MiddlewareResult = Result<Option<Value>, ApiError>;

/// An asynchronous middleware step.
pub trait Middleware: Send + Sync + 'static {
    fn call(&self, ctx: &mut CallContext) -> impl Future<Output = MiddlewareResult> + Send;

    /// Name used in logs when a step fails.
    fn name(&self) -> &str {
        "middleware"
    }
}

/// Object-safe version of [`Middleware`] — all refs share lifetime `'a`.
pub trait MiddlewareDyn: Send + Sync {
    fn call_dyn<'a>(
        &'a self,
        ctx: &'a mut CallContext,
    ) -> Pin<Box<dyn Future<Output = MiddlewareResult> + Send + 'a>>;

    fn name_dyn(&self) -> &str;
}

impl<T: Middleware> MiddlewareDyn for T {
    fn call_dyn<'a>(
        &'a self,
        ctx: &'a mut CallContext,
    ) -> Pin<Box<dyn Future<Output = MiddlewareResult> + Send + 'a>> {
        Box::pin(self.call(ctx))
    }

    fn name_dyn(&self) -> &str {
        self.name()
    }
}

/// Shared handle to a registered middleware step.
pub type DynMiddleware = Arc<dyn MiddlewareDyn>;

/// Box a concrete [`Middleware`] into a registrable handle.
pub fn boxed<M: Middleware>(mw: M) -> DynMiddleware {
    Arc::new(mw)
}

/// Middleware from a closure with full context access.
///
/// The closure returns a boxed future tied to the borrow:
///
/// ```ignore
/// from_fn(|ctx| Box::pin(async move {
///     ctx.params.insert("seen".into(), json!(true));
///     Ok(None)
/// }))
/// ```
pub fn from_fn<F>(f: F) -> DynMiddleware
where
    F: for<'a> Fn(
            &'a mut CallContext,
        ) -> Pin<Box<dyn Future<Output = MiddlewareResult> + Send + 'a>>
        + Send
        + Sync
        + 'static,
{
    struct FromFn<F>(F);

    impl<F> MiddlewareDyn for FromFn<F>
    where
        F: for<'a> Fn(
                &'a mut CallContext,
            )
                -> Pin<Box<dyn Future<Output = MiddlewareResult> + Send + 'a>>
            + Send
            + Sync
            + 'static,
    {
        fn call_dyn<'a>(
            &'a self,
            ctx: &'a mut CallContext,
        ) -> Pin<Box<dyn Future<Output = MiddlewareResult> + Send + 'a>> {
            (self.0)(ctx)
        }

        fn name_dyn(&self) -> &str {
            "fn"
        }
    }

    Arc::new(FromFn(f))
}

/// Middleware from a params-in, value-out function — the common shape for
/// call handlers. The returned value becomes the call's result.
pub fn handler<F, Fut>(f: F) -> DynMiddleware
where
    F: Fn(Map<String, Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, ApiError>> + Send + 'static,
{
    struct Handler<F>(F);

    impl<F, Fut> MiddlewareDyn for Handler<F>
    where
        F: Fn(Map<String, Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ApiError>> + Send + 'static,
    {
        fn call_dyn<'a>(
            &'a self,
            ctx: &'a mut CallContext,
        ) -> Pin<Box<dyn Future<Output = MiddlewareResult> + Send + 'a>> {
            let fut = (self.0)(ctx.params.clone());
            Box::pin(async move { fut.await.map(Some) })
        }

        fn name_dyn(&self) -> &str {
            "handler"
        }
    }

    Arc::new(Handler(f))
}

/// Middleware from a params-in, stream-out function, for methods declared
/// with a streaming response. The produced sequence is stored on the
/// context for the adapter to frame.
pub fn streamer<F, Fut>(f: F) -> DynMiddleware
where
    F: Fn(Map<String, Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<ValueStream, ApiError>> + Send + 'static,
{
    struct Streamer<F>(F);

    impl<F, Fut> MiddlewareDyn for Streamer<F>
    where
        F: Fn(Map<String, Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ValueStream, ApiError>> + Send + 'static,
    {
        fn call_dyn<'a>(
            &'a self,
            ctx: &'a mut CallContext,
        ) -> Pin<Box<dyn Future<Output = MiddlewareResult> + Send + 'a>> {
            let fut = (self.0)(ctx.params.clone());
            Box::pin(async move {
                let stream = fut.await?;
                ctx.set_stream(stream);
                Ok(None)
            })
        }

        fn name_dyn(&self) -> &str {
            "streamer"
        }
    }

    Arc::new(Streamer(f))
}
