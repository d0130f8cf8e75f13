//! Per-version method registry and the transport adapter contract.
//!
//! A `VersionRouter` owns the adapters attached to one API version and
//! the method table for that version. Adapters can only be attached
//! through the builder, and mounting consumes the router — so the setup
//! order (attach adapters, then register methods, then serve) is enforced
//! by the API shape rather than by convention.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::routing::get;
use axum::Json;
use serde_json::{Value, json};
use switchboard_protocol::{ApiVersion, RouteOptions, VersionSpecError};
use tracing::info;

use crate::api::RouterShared;
use crate::middleware::DynMiddleware;

/// One registered method as handed to an adapter: the shared options plus
/// the call chain (schema normalization already prepended).
#[derive(Clone)]
pub struct MethodRoute {
    pub options: Arc<RouteOptions>,
    pub chain: Arc<[DynMiddleware]>,
}

/// Registration failures. Registration happens at startup and is treated
/// as fatal by hosts; a failed fan-out may leave earlier adapters
/// registered.
#[derive(Debug, thiserror::Error)]
pub enum RegisterError {
    #[error("method name {0:?} is not a dot-separated identifier")]
    InvalidMethod(String),
    #[error("method {0:?} is already registered")]
    DuplicateMethod(String),
    #[error("version {0} is already present")]
    DuplicateVersion(ApiVersion),
    #[error("rest route {verb} {route:?} conflicts with an existing registration")]
    DuplicateRoute { verb: &'static str, route: String },
    #[error("invalid options for {method:?}: {reason}")]
    InvalidOptions { method: String, reason: String },
    #[error(transparent)]
    InvalidVersions(#[from] VersionSpecError),
}

/// Everything an adapter needs at mount time.
pub struct MountContext {
    pub version: ApiVersion,
    pub shared: Arc<RouterShared>,
}

/// A wire transport bound to one API version.
///
/// Registration happens on `&mut self`; `mount` consumes the adapter and
/// produces its route tree (paths prefixed with the adapter's own
/// sub-path, e.g. `/rpc/...`). After mounting no further registration is
/// possible.
pub trait TransportInterface: Send + Sync + 'static {
    /// Sub-path identity, e.g. `"rpc"`.
    fn name(&self) -> &'static str;

    /// Bind one method to this adapter's wire routes. Adapters may decline
    /// methods that do not apply to them (e.g. `norpc`) by returning Ok.
    fn register(&mut self, route: MethodRoute) -> Result<(), RegisterError>;

    /// Adapter-level pre-middleware, shared by every method on this
    /// adapter instance.
    fn register_pre(&mut self, mw: DynMiddleware);

    /// Adapter-level post-middleware.
    fn register_post(&mut self, mw: DynMiddleware);

    fn mount(self: Box<Self>, ctx: MountContext) -> axum::Router;
}

/// Builder for a [`VersionRouter`] — the only place adapters can be
/// attached.
pub struct VersionRouterBuilder {
    version: ApiVersion,
    interfaces: Vec<Box<dyn TransportInterface>>,
}

impl VersionRouterBuilder {
    pub fn interface(mut self, interface: impl TransportInterface) -> Self {
        self.interfaces.push(Box::new(interface));
        self
    }

    pub fn build(self) -> VersionRouter {
        info!(
            version = self.version,
            interfaces = self.interfaces.len(),
            "version router created"
        );
        VersionRouter {
            version: self.version,
            interfaces: self.interfaces,
            methods: BTreeMap::new(),
        }
    }
}

/// Registry for one API version: attached adapters plus the method table
/// kept for introspection.
pub struct VersionRouter {
    version: ApiVersion,
    interfaces: Vec<Box<dyn TransportInterface>>,
    methods: BTreeMap<String, Arc<RouteOptions>>,
}

impl VersionRouter {
    pub fn builder(version: ApiVersion) -> VersionRouterBuilder {
        VersionRouterBuilder {
            version,
            interfaces: Vec::new(),
        }
    }

    pub fn version(&self) -> ApiVersion {
        self.version
    }

    /// Registered method names, for introspection.
    pub fn methods(&self) -> impl Iterator<Item = (&str, &Arc<RouteOptions>)> {
        self.methods.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Record a method and fan it out to every attached adapter.
    /// Re-registering a name already present for this version is a
    /// deterministic conflict error.
    pub(crate) fn register(&mut self, route: MethodRoute) -> Result<(), RegisterError> {
        let method = route.options.method.clone();
        if self.methods.contains_key(&method) {
            return Err(RegisterError::DuplicateMethod(method));
        }

        for interface in &mut self.interfaces {
            interface.register(route.clone())?;
        }

        info!(version = self.version, method = %method, "registered method");
        self.methods.insert(method, route.options.clone());
        Ok(())
    }

    pub(crate) fn register_pre(&mut self, mw: DynMiddleware) {
        for interface in &mut self.interfaces {
            interface.register_pre(mw.clone());
        }
    }

    pub(crate) fn register_post(&mut self, mw: DynMiddleware) {
        for interface in &mut self.interfaces {
            interface.register_post(mw.clone());
        }
    }

    /// Consume the router and produce this version's route tree: every
    /// adapter's routes merged, plus a `GET /info` introspection route.
    pub(crate) fn mount(self, shared: Arc<RouterShared>) -> axum::Router {
        let info = json!({
            "version": self.version,
            "methods": self.methods.values().map(|o| o.summary()).collect::<Vec<Value>>(),
        });

        let mut router = axum::Router::new().route(
            "/info",
            get(move || {
                let info = info.clone();
                async move { Json(info) }
            }),
        );

        for interface in self.interfaces {
            router = router.merge(interface.mount(MountContext {
                version: self.version,
                shared: shared.clone(),
            }));
        }

        router
    }
}
