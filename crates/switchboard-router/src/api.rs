//! Top-level façade — owns every version router, resolves registrations
//! to versions, injects schema normalization, and exposes lifecycle
//! observers.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use switchboard_protocol::{ApiError, RouteOptions, SchemaRef, VersionSpec};
use tracing::{info, warn};

use crate::context::CallContext;
use crate::middleware::{DynMiddleware, Middleware, MiddlewareResult};
use crate::observer::{LifecycleObserver, ObserverSet};
use crate::registry::{MethodRoute, RegisterError, VersionRouter};

/// Router-wide configuration.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Include stack traces in wire error payloads.
    pub include_error_stack: bool,
    /// Default filler interval for keep-alive calls; a registration may
    /// override it per method.
    pub keep_alive_interval: Duration,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            include_error_stack: false,
            keep_alive_interval: Duration::from_secs(15),
        }
    }
}

/// State shared with every mounted adapter: configuration plus the frozen
/// observer set.
pub struct RouterShared {
    pub config: RouterConfig,
    pub observers: ObserverSet,
}

/// The host-facing registration façade.
///
/// Setup order is enforced by ownership: versions are built with their
/// adapters attached, methods are registered against the mutable router,
/// and [`ApiRouter::into_service`] consumes everything — after which the
/// tables are immutable and shared by the serving tasks.
pub struct ApiRouter {
    versions: BTreeMap<u32, VersionRouter>,
    config: RouterConfig,
    observers: Vec<Arc<dyn LifecycleObserver>>,
}

impl std::fmt::Debug for ApiRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiRouter")
            .field("versions", &self.versions.keys().collect::<Vec<_>>())
            .field("config", &self.config)
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl ApiRouter {
    pub fn new() -> Self {
        Self::with_config(RouterConfig::default())
    }

    pub fn with_config(config: RouterConfig) -> Self {
        Self {
            versions: BTreeMap::new(),
            config,
            observers: Vec::new(),
        }
    }

    /// Add a fully-built version router. Versions are distinct; adding the
    /// same number twice is an error.
    pub fn add_version(&mut self, router: VersionRouter) -> Result<&mut Self, RegisterError> {
        let version = router.version();
        if self.versions.contains_key(&version) {
            return Err(RegisterError::DuplicateVersion(version));
        }
        self.versions.insert(version, router);
        Ok(self)
    }

    pub fn version(&self, version: u32) -> Option<&VersionRouter> {
        self.versions.get(&version)
    }

    /// Register a lifecycle observer. Observers fire in registration order.
    pub fn observe(&mut self, observer: Arc<dyn LifecycleObserver>) -> &mut Self {
        self.observers.push(observer);
        self
    }

    /// Register one method across every matching version.
    ///
    /// When a parameter schema is declared, a normalization step is
    /// prepended to the chain exactly once here, so params are normalized
    /// once per call no matter how many versions and adapters matched.
    /// Versions added after this call do not receive the method.
    pub fn register(
        &mut self,
        options: RouteOptions,
        middleware: Vec<DynMiddleware>,
    ) -> Result<(), RegisterError> {
        validate_method(&options.method)?;
        validate_flags(&options)?;

        let mut chain: Vec<DynMiddleware> = Vec::with_capacity(middleware.len() + 1);
        if let Some(schema) = &options.schema {
            chain.push(Arc::new(NormalizeParams {
                schema: schema.clone(),
            }));
        }
        chain.extend(middleware);

        let route = MethodRoute {
            options: Arc::new(options),
            chain: chain.into(),
        };

        let mut matched = 0usize;
        for (version, router) in self.versions.iter_mut() {
            if Self::version_matches(&route.options.versions, *version)? {
                router.register(route.clone())?;
                matched += 1;
            }
        }

        if matched == 0 {
            warn!(method = %route.options.method, "registration matched no versions");
        }
        Ok(())
    }

    /// Register adapter-level pre-middleware across matching versions.
    pub fn register_pre_middleware(
        &mut self,
        versions: Option<VersionSpec>,
        mw: DynMiddleware,
    ) -> Result<(), RegisterError> {
        for (version, router) in self.versions.iter_mut() {
            if Self::version_matches(&versions, *version)? {
                router.register_pre(mw.clone());
            }
        }
        Ok(())
    }

    /// Register adapter-level post-middleware across matching versions.
    pub fn register_post_middleware(
        &mut self,
        versions: Option<VersionSpec>,
        mw: DynMiddleware,
    ) -> Result<(), RegisterError> {
        for (version, router) in self.versions.iter_mut() {
            if Self::version_matches(&versions, *version)? {
                router.register_post(mw.clone());
            }
        }
        Ok(())
    }

    fn version_matches(
        spec: &Option<VersionSpec>,
        version: u32,
    ) -> Result<bool, RegisterError> {
        match spec {
            None => Ok(true),
            Some(spec) => Ok(spec.matches(version)?),
        }
    }

    /// Freeze the router and produce the host-mountable route tree, one
    /// `/v{N}` subtree per version.
    pub fn into_service(self) -> axum::Router {
        let shared = Arc::new(RouterShared {
            config: self.config,
            observers: ObserverSet::new(self.observers),
        });

        info!(versions = self.versions.len(), "api router frozen for serving");

        let mut app = axum::Router::new();
        for (version, router) in self.versions {
            app = app.nest(&format!("/v{version}"), router.mount(shared.clone()));
        }
        app
    }
}

impl Default for ApiRouter {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_method(method: &str) -> Result<(), RegisterError> {
    if method.is_empty() || method.split('.').any(|segment| segment.is_empty()) {
        return Err(RegisterError::InvalidMethod(method.to_string()));
    }
    Ok(())
}

fn validate_flags(options: &RouteOptions) -> Result<(), RegisterError> {
    if options.manual_response && (options.streaming_response || options.keep_alive) {
        return Err(RegisterError::InvalidOptions {
            method: options.method.clone(),
            reason: "manual responses cannot be combined with streaming or keep-alive".into(),
        });
    }
    Ok(())
}

/// Prepended step that rewrites `params` against the declared schema
/// before any call middleware runs.
struct NormalizeParams {
    schema: SchemaRef,
}

impl Middleware for NormalizeParams {
    async fn call(&self, ctx: &mut CallContext) -> MiddlewareResult {
        let input = Value::Object(ctx.params.clone());
        match self.schema.normalize(&input) {
            Ok(Value::Object(map)) => {
                ctx.params = map;
                Ok(None)
            }
            Ok(_) => Err(ApiError::internal(
                "parameter schema produced a non-object value",
            )),
            Err(violations) => Err(ApiError::validation(violations)),
        }
    }

    fn name(&self) -> &str {
        "normalize-params"
    }
}
