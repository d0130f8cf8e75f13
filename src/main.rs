//! Switchboard — versioned API dispatch demo server.
//!
//! Registers a small notes API once and exposes it over three transports:
//! RPC-over-path (`POST /v1/rpc/notes/get`), JSON-RPC
//! (`POST /v1/jsonrpc`), and inferred REST routes
//! (`GET /v1/rest/notes/{id}`). Version 2 adds a gated method to show
//! version-range registration.
//!
//! Usage:
//!   switchboard                         # Default port 8080
//!   switchboard --port 0               # OS-assigned port
//!   switchboard --cors                 # Allow cross-origin requests
//!   switchboard --include-error-stack  # Expose stack traces on the wire

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use axum::Json;
use axum::routing::get;
use clap::Parser;
use futures_util::StreamExt;
use parking_lot::RwLock;
use serde_json::{Map, Value, json};
use switchboard_protocol::{
    ApiError, ErrorKind, FieldViolation, RestModel, RouteOptions, Schema,
};
use switchboard_router::{
    ApiRouter, CallContext, LifecycleObserver, RouterConfig, VersionRouter, handler, streamer,
};
use switchboard_transport::{HttpRpcInterface, JsonRpcInterface, RestInterface};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "switchboard", about = "Switchboard — versioned API dispatch demo server")]
struct Cli {
    /// Port to listen on (0 for OS-assigned)
    #[arg(long, default_value = "8080")]
    port: u16,

    /// Hostname to bind to
    #[arg(long, default_value = "127.0.0.1")]
    hostname: String,

    /// Allow cross-origin requests
    #[arg(long)]
    cors: bool,

    /// Include stack traces in wire error payloads
    #[arg(long)]
    include_error_stack: bool,

    /// Default keep-alive filler interval in milliseconds
    #[arg(long, default_value = "15000")]
    keep_alive_ms: u64,

    /// Enable verbose logging
    #[arg(long)]
    verbose: bool,
}

type NoteStore = Arc<RwLock<HashMap<String, Value>>>;

/// Logs every call through the lifecycle hooks.
struct RequestLog;

impl LifecycleObserver for RequestLog {
    fn on_request_begin(&self, ctx: &CallContext) {
        info!(
            method = ctx.method(),
            version = ctx.version(),
            request_id = %ctx.request_id(),
            "request begin"
        );
    }

    fn on_request_end(&self, ctx: &CallContext) {
        info!(
            method = ctx.method(),
            request_id = %ctx.request_id(),
            failed = ctx.error.is_some(),
            "request end"
        );
    }

    fn on_request_error(&self, ctx: &CallContext, error: &ApiError) {
        warn!(
            method = ctx.method(),
            request_id = %ctx.request_id(),
            code = %error.code,
            "request error: {}",
            error.message
        );
    }
}

/// Demo schema: requires the listed fields to be present.
struct RequiredFields {
    fields: &'static [&'static str],
}

impl Schema for RequiredFields {
    fn normalize(&self, value: &Value) -> Result<Value, Vec<FieldViolation>> {
        let Some(obj) = value.as_object() else {
            return Err(vec![FieldViolation::new("$", "expected an object")]);
        };
        let violations: Vec<FieldViolation> = self
            .fields
            .iter()
            .filter(|field| !obj.contains_key(**field))
            .map(|field| FieldViolation::new(*field, "required"))
            .collect();
        if violations.is_empty() {
            Ok(value.clone())
        } else {
            Err(violations)
        }
    }
}

fn string_param(params: &Map<String, Value>, key: &str) -> Result<String, ApiError> {
    params
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ApiError::bad_request(format!("missing string parameter: {key}")))
}

fn version_with_all_interfaces(version: u32) -> VersionRouter {
    VersionRouter::builder(version)
        .interface(HttpRpcInterface::new())
        .interface(JsonRpcInterface::new())
        .interface(RestInterface::new())
        .build()
}

fn build_api(config: RouterConfig) -> anyhow::Result<ApiRouter> {
    let mut api = ApiRouter::with_config(config);
    api.add_version(version_with_all_interfaces(1))?;
    api.add_version(version_with_all_interfaces(2))?;
    api.observe(Arc::new(RequestLog));

    let store: NoteStore = Arc::new(RwLock::new(HashMap::new()));

    // Notes CRUD, REST-inferred from the method suffixes.
    {
        let store = store.clone();
        api.register(
            RouteOptions::new("notes.put")
                .model(RestModel::keyed(["id"]))
                .schema(Arc::new(RequiredFields { fields: &["id"] })),
            vec![handler(move |params| {
                let store = store.clone();
                async move {
                    let id = string_param(&params, "id")?;
                    store.write().insert(id.clone(), Value::Object(params));
                    Ok(json!({ "saved": id }))
                }
            })],
        )?;
    }
    {
        let store = store.clone();
        api.register(
            RouteOptions::new("notes.get").model(RestModel::keyed(["id"])),
            vec![handler(move |params| {
                let store = store.clone();
                async move {
                    let id = string_param(&params, "id")?;
                    store
                        .read()
                        .get(&id)
                        .cloned()
                        .ok_or_else(|| ApiError::new(ErrorKind::NotFound, format!("no note {id}")))
                }
            })],
        )?;
    }
    {
        let store = store.clone();
        api.register(
            RouteOptions::new("notes.delete").model(RestModel::keyed(["id"])),
            vec![handler(move |params| {
                let store = store.clone();
                async move {
                    let id = string_param(&params, "id")?;
                    let removed = store.write().remove(&id).is_some();
                    Ok(json!({ "deleted": removed }))
                }
            })],
        )?;
    }
    {
        let store = store.clone();
        api.register(
            RouteOptions::new("notes.list").model(RestModel::keyed(["id"])),
            vec![handler(move |_params| {
                let store = store.clone();
                async move {
                    let notes: Vec<Value> = store.read().values().cloned().collect();
                    Ok(Value::Array(notes))
                }
            })],
        )?;
    }

    // Plain echo, reachable on every version.
    api.register(
        RouteOptions::new("demo.echo"),
        vec![handler(|params| async move { Ok(Value::Object(params)) })],
    )?;

    // Gated to version 2 and up.
    api.register(
        RouteOptions::new("demo.add")
            .versions("2-")
            .schema(Arc::new(RequiredFields { fields: &["a", "b"] })),
        vec![handler(|params| async move {
            let a = params.get("a").and_then(Value::as_f64);
            let b = params.get("b").and_then(Value::as_f64);
            match (a, b) {
                (Some(a), Some(b)) => Ok(json!({ "sum": a + b })),
                _ => Err(ApiError::bad_request("a and b must be numbers")),
            }
        })],
    )?;

    // Slow call kept alive with filler while it runs.
    api.register(
        RouteOptions::new("demo.slow").keep_alive(),
        vec![handler(|_params| async move {
            tokio::time::sleep(Duration::from_secs(2)).await;
            Ok(json!({ "finally": true }))
        })],
    )?;

    // Streaming progress feed.
    api.register(
        RouteOptions::new("job.watch")
            .streaming()
            .keep_alive_every(Duration::from_secs(5)),
        vec![streamer(|_params| async move {
            let stream = futures_util::stream::unfold(0u32, |step| async move {
                if step >= 5 {
                    return None;
                }
                tokio::time::sleep(Duration::from_millis(200)).await;
                Some((Ok(json!({ "step": step, "of": 5 })), step + 1))
            });
            Ok(stream.boxed())
        })],
    )?;

    Ok(api)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = RouterConfig {
        include_error_stack: cli.include_error_stack,
        keep_alive_interval: Duration::from_millis(cli.keep_alive_ms),
    };

    let api = build_api(config)?;
    let mut app = api
        .into_service()
        .route("/health", get(|| async { Json(json!({ "status": "ok" })) }));

    if cli.cors {
        app = app.layer(ServiceBuilder::new().layer(CorsLayer::permissive()));
    }

    let addr = format!("{}:{}", cli.hostname, cli.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("switchboard listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
