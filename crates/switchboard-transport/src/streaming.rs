//! Streaming and keep-alive response driver.
//!
//! Calls flagged `keep_alive` or `streaming_response` commit headers
//! immediately and feed their body through a channel while a spawned
//! driver task runs the middleware pipeline. While the pipeline is in
//! flight the driver writes whitespace filler on every keep-alive tick;
//! streamed items are framed as newline-terminated JSON with the
//! keep-alive clock restarting on every chunk, and the sequence ends with
//! a single `{"success": ...}` trailer line.
//!
//! Client disconnect is observed as a failed channel send: the driver
//! stops writing, drops the producer stream (which is the abort signal a
//! Rust producer natively understands), and reports a `request_error`
//! through the lifecycle observers. In-flight middleware is never
//! forcibly unwound. The keep-alive timer is owned by the driver and
//! released in the single teardown path at the end of the task.

use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use futures_util::{Stream, StreamExt};
use serde_json::Value;
use switchboard_protocol::{ApiError, StreamTrailer};
use switchboard_router::{CallContext, MethodRoute, RouterShared};
use tokio::sync::mpsc;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, error};

use crate::dispatch::{MountedCore, run_pipeline};

/// Whitespace filler written on keep-alive ticks. A single space is legal
/// JSON whitespace, so the eventual payload still parses.
const FILLER: Bytes = Bytes::from_static(b" ");

/// Encodes the single final payload for a non-streaming outcome, in the
/// owning adapter's wire shape.
pub(crate) type FinalEncoder = Box<dyn FnOnce(&CallContext, &RouterShared) -> Bytes + Send>;

/// Channel-fed response body.
struct BodyStream {
    rx: mpsc::Receiver<Bytes>,
}

impl Stream for BodyStream {
    type Item = Result<Bytes, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx).map(|item| item.map(Ok))
    }
}

/// Transmission progress for a header-committed call. `Finalized` is
/// entered at most once, whether by completion, error, or a dead
/// connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamState {
    HeadersSent,
    Streaming,
    Finalized,
    Aborted,
}

enum StreamEvent {
    Item(Value),
    Failed(ApiError),
    Done,
    Tick,
}

/// Commit headers now and drive the call in a spawned task.
pub(crate) fn spawn_streaming(
    ctx: CallContext,
    route: MethodRoute,
    core: Arc<MountedCore>,
    encode_final: FinalEncoder,
) -> Response {
    let streaming = route.options.streaming_response;
    let keep_alive = route.options.keep_alive.then(|| {
        route
            .options
            .keep_alive_interval
            .unwrap_or(core.shared.config.keep_alive_interval)
    });

    let (tx, rx) = mpsc::channel::<Bytes>(16);
    tokio::spawn(drive_call(ctx, route, core, tx, keep_alive, encode_final));

    let content_type = if streaming {
        "application/x-ndjson"
    } else {
        "application/json"
    };
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .body(Body::from_stream(BodyStream { rx }))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

async fn drive_call(
    mut ctx: CallContext,
    route: MethodRoute,
    core: Arc<MountedCore>,
    tx: mpsc::Sender<Bytes>,
    keep_alive: Option<Duration>,
    encode_final: FinalEncoder,
) {
    let mut ticker = keep_alive.map(new_ticker);
    let mut state = StreamState::HeadersSent;

    // Run the pipeline, feeding filler while it is in flight. A failed
    // send means the client is gone; middleware already running is not
    // unwound, so the pipeline still completes before teardown.
    {
        let pipeline = run_pipeline(&mut ctx, &route, &core);
        tokio::pin!(pipeline);
        loop {
            tokio::select! {
                _ = &mut pipeline => break,
                _ = tick(&mut ticker), if ticker.is_some() && state != StreamState::Aborted => {
                    if tx.send(FILLER).await.is_err() {
                        state = StreamState::Aborted;
                    }
                }
            }
        }
    }

    if state != StreamState::Aborted {
        if ctx.error.is_some() || !ctx.has_stream() {
            // Error, or a plain result on a keep-alive call: one payload.
            let payload = encode_final(&ctx, &core.shared);
            state = if tx.send(payload).await.is_err() {
                StreamState::Aborted
            } else {
                StreamState::Finalized
            };
        } else if let Some(mut stream) = ctx.take_stream() {
            state = StreamState::Streaming;
            while state == StreamState::Streaming {
                let event = tokio::select! {
                    item = stream.next() => match item {
                        Some(Ok(value)) => StreamEvent::Item(value),
                        Some(Err(err)) => StreamEvent::Failed(err),
                        None => StreamEvent::Done,
                    },
                    _ = tick(&mut ticker), if ticker.is_some() => StreamEvent::Tick,
                };
                match event {
                    StreamEvent::Item(value) => {
                        if tx.send(chunk_line(&value)).await.is_err() {
                            state = StreamState::Aborted;
                        } else if let Some(ticker) = ticker.as_mut() {
                            // Every chunk restarts the keep-alive clock.
                            ticker.reset();
                        }
                    }
                    StreamEvent::Failed(err) => {
                        let trailer = StreamTrailer::failed(
                            err.to_wire(core.shared.config.include_error_stack),
                        );
                        state = send_trailer(&tx, &trailer).await;
                    }
                    StreamEvent::Done => {
                        state = send_trailer(&tx, &StreamTrailer::ok()).await;
                    }
                    StreamEvent::Tick => {
                        if tx.send(FILLER).await.is_err() {
                            state = StreamState::Aborted;
                        }
                    }
                }
            }
            // Dropping the stream is the abort signal to the producer.
            drop(stream);
        }
    }

    // Single teardown path: the keep-alive timer stops here on every
    // branch, then the lifecycle events fire.
    drop(ticker);
    if state == StreamState::Aborted {
        let err = ApiError::request_error("client disconnected during response");
        error!(
            method = ctx.method(),
            version = ctx.version(),
            "response aborted: connection closed"
        );
        core.shared.observers.request_error(&ctx, &err);
    }
    core.shared.observers.request_end(&ctx);
    debug!(
        method = ctx.method(),
        request_id = %ctx.request_id(),
        ?state,
        "header-committed call finished"
    );
}

async fn send_trailer(tx: &mpsc::Sender<Bytes>, trailer: &StreamTrailer) -> StreamState {
    let mut line =
        serde_json::to_vec(trailer).unwrap_or_else(|_| b"{\"success\":false}".to_vec());
    line.push(b'\n');
    if tx.send(line.into()).await.is_err() {
        StreamState::Aborted
    } else {
        StreamState::Finalized
    }
}

fn chunk_line(value: &Value) -> Bytes {
    let mut line = serde_json::to_vec(value).unwrap_or_else(|_| b"null".to_vec());
    line.push(b'\n');
    line.into()
}

fn new_ticker(period: Duration) -> Interval {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // A fresh interval fires immediately; push the first tick out one period.
    ticker.reset();
    ticker
}

async fn tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
