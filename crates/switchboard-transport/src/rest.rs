//! REST adapter — inferred resource routes.
//!
//! Methods ending in `.get/.put/.delete/.query/.list` that declare a
//! key-field model are bound to `GET/PUT/DELETE /{basepath}/{key}...` and
//! `GET /{basepath}`; `options.rest` declares a route manually. Parameters
//! are resolved from typed sources with fixed precedence — body < query <
//! route params < explicit overrides — and errors map to HTTP status
//! codes through the error-kind table.

use std::collections::HashMap;
use std::sync::Arc;

use axum::Router;
use axum::body::Bytes;
use axum::extract::{Path, Query};
use axum::http::StatusCode;
use axum::response::Response;
use axum::routing::{MethodFilter, on};
use serde_json::{Map, Value, json};
use switchboard_protocol::{ApiError, RestVerb, RouteOptions};
use switchboard_router::{
    CallContext, DynMiddleware, MethodRoute, MountContext, RegisterError, RouterShared,
    TransportInterface,
};
use tracing::{debug, warn};

use crate::dispatch::{self, AdapterCore, MountedCore};

/// One bound REST route.
#[derive(Debug, Clone)]
struct RestRoute {
    verb: RestVerb,
    /// Path template relative to the adapter root, e.g. `/notes/{id}`.
    path: String,
    method: String,
    /// Explicit parameter overrides from `options.rest`.
    overrides: Map<String, Value>,
}

/// Transport adapter exposing methods as resource routes.
#[derive(Default)]
pub struct RestInterface {
    core: AdapterCore,
    routes: Vec<RestRoute>,
}

impl RestInterface {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TransportInterface for RestInterface {
    fn name(&self) -> &'static str {
        "rest"
    }

    fn register(&mut self, route: MethodRoute) -> Result<(), RegisterError> {
        if route.options.streaming_response {
            debug!(method = %route.options.method, "streaming method not exposed over rest");
            return Ok(());
        }
        if route.options.keep_alive {
            debug!(
                method = %route.options.method,
                "keep-alive ignored on rest: status codes require a finished call"
            );
        }

        let Some(bound) = infer_routes(&route.options)? else {
            debug!(method = %route.options.method, "method has no rest mapping");
            return Ok(());
        };

        for candidate in &bound {
            let clash = self
                .routes
                .iter()
                .any(|existing| existing.verb == candidate.verb && existing.path == candidate.path);
            if clash {
                return Err(RegisterError::DuplicateRoute {
                    verb: candidate.verb.as_str(),
                    route: candidate.path.clone(),
                });
            }
        }

        self.core.insert(route)?;
        self.routes.extend(bound);
        Ok(())
    }

    fn register_pre(&mut self, mw: DynMiddleware) {
        self.core.pre.push(mw);
    }

    fn register_post(&mut self, mw: DynMiddleware) {
        self.core.post.push(mw);
    }

    fn mount(self: Box<Self>, ctx: MountContext) -> Router {
        let routes = self.routes;
        let core = Arc::new(self.core.into_mounted(ctx));

        let mut router = Router::new();
        for bound in routes {
            let path = format!("/rest{}", bound.path);
            let filter = method_filter(bound.verb);
            let handler_core = core.clone();
            let info = Arc::new(bound);
            let handler = move |Path(path_params): Path<HashMap<String, String>>,
                                Query(query): Query<HashMap<String, String>>,
                                body: Bytes| {
                let core = handler_core.clone();
                let info = info.clone();
                async move { rest_call(core, info, path_params, query, body).await }
            };
            router = router.route(&path, on(filter, handler));
        }

        // Unmatched paths in this version get a structured 404 instead of
        // the substrate's empty one.
        let fallback_core = core.clone();
        router.fallback(move || {
            let core = fallback_core.clone();
            async move {
                rest_error(
                    &core.shared,
                    &ApiError::new(
                        switchboard_protocol::ErrorKind::NotFound,
                        "no such route",
                    ),
                )
            }
        })
    }
}

/// Work out which wire routes a registration binds, if any. Methods with
/// neither an explicit `rest` declaration nor a model + recognized suffix
/// stay off this adapter.
fn infer_routes(options: &RouteOptions) -> Result<Option<Vec<RestRoute>>, RegisterError> {
    if let Some(rest) = &options.rest {
        let path = if rest.route.starts_with('/') {
            rest.route.clone()
        } else {
            format!("/{}", rest.route)
        };
        return Ok(Some(vec![RestRoute {
            verb: rest.verb,
            path,
            method: options.method.clone(),
            overrides: rest.params.clone(),
        }]));
    }

    let Some(model) = &options.model else {
        return Ok(None);
    };
    let Some((base, suffix)) = options.method.rsplit_once('.') else {
        return Ok(None);
    };

    let verb = match suffix {
        "get" | "query" | "list" => RestVerb::Get,
        "put" => RestVerb::Put,
        "delete" => RestVerb::Delete,
        _ => return Ok(None),
    };

    let basepath = model
        .basepath
        .clone()
        .unwrap_or_else(|| base.replace('.', "/"));
    if basepath.is_empty() {
        return Err(RegisterError::InvalidMethod(options.method.clone()));
    }

    let path = match suffix {
        "query" | "list" => format!("/{basepath}"),
        _ => {
            let mut path = format!("/{basepath}");
            for key in &model.keys {
                path.push_str(&format!("/{{{key}}}"));
            }
            path
        }
    };

    Ok(Some(vec![RestRoute {
        verb,
        path,
        method: options.method.clone(),
        overrides: Map::new(),
    }]))
}

/// Merge parameter sources with fixed precedence:
/// body < query < route params < explicit overrides.
fn merge_params(
    body: Option<Map<String, Value>>,
    query: &HashMap<String, String>,
    path: &HashMap<String, String>,
    overrides: &Map<String, Value>,
) -> Map<String, Value> {
    let mut merged = body.unwrap_or_default();
    for (key, value) in query {
        merged.insert(key.clone(), Value::String(value.clone()));
    }
    for (key, value) in path {
        merged.insert(key.clone(), Value::String(value.clone()));
    }
    for (key, value) in overrides {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

async fn rest_call(
    core: Arc<MountedCore>,
    info: Arc<RestRoute>,
    path_params: HashMap<String, String>,
    query: HashMap<String, String>,
    body: Bytes,
) -> Response {
    let Some(route) = core.methods.get(&info.method).cloned() else {
        // Route table and method table are built together; this is a bug.
        return rest_error(&core.shared, &ApiError::internal("route bound to unknown method"));
    };

    let body_params = match rest_body(&body) {
        Ok(params) => params,
        Err(err) => return rest_error(&core.shared, &err),
    };
    let params = merge_params(body_params, &query, &path_params, &info.overrides);

    let mut ctx = CallContext::new(info.method.clone(), core.version, params, route.options.clone());
    dispatch::run_pipeline(&mut ctx, &route, &core).await;

    if let Some(manual) = ctx.take_manual() {
        core.shared.observers.request_end(&ctx);
        return dispatch::manual_response(manual);
    }
    if route.options.manual_response {
        warn!(method = ctx.method(), "manual-response method produced no response");
        core.shared.observers.request_end(&ctx);
        return dispatch::empty_response(StatusCode::OK);
    }

    let response = if let Some(err) = &ctx.error {
        rest_error(&core.shared, err)
    } else {
        match &ctx.result {
            Some(value) => dispatch::json_response(
                StatusCode::OK,
                serde_json::to_vec(value).unwrap_or_default().into(),
            ),
            None => dispatch::empty_response(StatusCode::NO_CONTENT),
        }
    };
    core.shared.observers.request_end(&ctx);
    response
}

fn rest_body(body: &Bytes) -> Result<Option<Map<String, Value>>, ApiError> {
    if body.is_empty() {
        return Ok(None);
    }
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| ApiError::bad_request(format!("malformed JSON body: {e}")))?;
    match value {
        Value::Object(map) => Ok(Some(map)),
        Value::Null => Ok(None),
        _ => Err(ApiError::bad_request("request body must be a JSON object")),
    }
}

fn rest_error(shared: &RouterShared, error: &ApiError) -> Response {
    let status = StatusCode::from_u16(error.http_status())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let body = json!({ "error": error.to_wire(shared.config.include_error_stack) });
    dispatch::json_response(status, serde_json::to_vec(&body).unwrap_or_default().into())
}

fn method_filter(verb: RestVerb) -> MethodFilter {
    match verb {
        RestVerb::Get => MethodFilter::GET,
        RestVerb::Put => MethodFilter::PUT,
        RestVerb::Post => MethodFilter::POST,
        RestVerb::Delete => MethodFilter::DELETE,
    }
}
