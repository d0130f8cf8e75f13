//! Registration options — one record per method, created at route-setup
//! time and immutable for the process lifetime.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::schema::SchemaRef;
use crate::version::VersionSpec;

/// HTTP verb for an explicit REST route declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RestVerb {
    Get,
    Put,
    Post,
    Delete,
}

impl RestVerb {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Put => "PUT",
            Self::Post => "POST",
            Self::Delete => "DELETE",
        }
    }
}

/// Manual REST route declaration, overriding suffix-based inference.
#[derive(Debug, Clone)]
pub struct RestSpec {
    pub verb: RestVerb,
    /// Route template relative to the adapter root, e.g. `/notes/{id}/tags`.
    pub route: String,
    /// Explicit parameter overrides, merged with the highest precedence.
    pub params: Map<String, Value>,
}

impl RestSpec {
    pub fn new(verb: RestVerb, route: impl Into<String>) -> Self {
        Self {
            verb,
            route: route.into(),
            params: Map::new(),
        }
    }

    pub fn param(mut self, key: impl Into<String>, value: Value) -> Self {
        self.params.insert(key.into(), value);
        self
    }
}

/// Key-field model used to infer REST routes from method-name suffixes.
#[derive(Debug, Clone, Default)]
pub struct RestModel {
    /// Base path for the resource. Defaults to the method name minus its
    /// verb suffix, with dots turned into slashes.
    pub basepath: Option<String>,
    /// Ordered key fields appended as path segments.
    pub keys: Vec<String>,
}

impl RestModel {
    pub fn keyed<I, T>(keys: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            basepath: None,
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    pub fn basepath(mut self, basepath: impl Into<String>) -> Self {
        self.basepath = Some(basepath.into());
        self
    }
}

/// Everything a registration declares about one method.
#[derive(Clone)]
pub struct RouteOptions {
    /// Dot-segmented method name, e.g. `"notes.get"`.
    pub method: String,
    /// Version match expression. `None` means every version that exists
    /// at registration time.
    pub versions: Option<VersionSpec>,
    /// Parameter schema, normalized in place before call middleware.
    pub schema: Option<SchemaRef>,
    /// Response schema, normalized adapter-side on the final result.
    pub response_schema: Option<SchemaRef>,
    /// Result is a sequence of items framed as newline-delimited JSON.
    pub streaming_response: bool,
    /// Handler builds the complete response itself.
    pub manual_response: bool,
    /// Emit filler bytes while the call is in flight.
    pub keep_alive: bool,
    /// Override for the router-level keep-alive interval.
    pub keep_alive_interval: Option<Duration>,
    /// Keep this method off the RPC and JSON-RPC adapters.
    pub norpc: bool,
    /// Key-field model for REST route inference.
    pub model: Option<RestModel>,
    /// Explicit REST route declaration.
    pub rest: Option<RestSpec>,
}

impl RouteOptions {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            versions: None,
            schema: None,
            response_schema: None,
            streaming_response: false,
            manual_response: false,
            keep_alive: false,
            keep_alive_interval: None,
            norpc: false,
            model: None,
            rest: None,
        }
    }

    pub fn versions(mut self, spec: impl Into<VersionSpec>) -> Self {
        self.versions = Some(spec.into());
        self
    }

    pub fn schema(mut self, schema: SchemaRef) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn response_schema(mut self, schema: SchemaRef) -> Self {
        self.response_schema = Some(schema);
        self
    }

    pub fn streaming(mut self) -> Self {
        self.streaming_response = true;
        self
    }

    pub fn manual(mut self) -> Self {
        self.manual_response = true;
        self
    }

    pub fn keep_alive(mut self) -> Self {
        self.keep_alive = true;
        self
    }

    pub fn keep_alive_every(mut self, interval: Duration) -> Self {
        self.keep_alive = true;
        self.keep_alive_interval = Some(interval);
        self
    }

    pub fn norpc(mut self) -> Self {
        self.norpc = true;
        self
    }

    pub fn model(mut self, model: RestModel) -> Self {
        self.model = Some(model);
        self
    }

    pub fn rest(mut self, rest: RestSpec) -> Self {
        self.rest = Some(rest);
        self
    }

    /// Introspection summary for info endpoints. Schemas are opaque
    /// injected objects, so only their presence is reported.
    pub fn summary(&self) -> Value {
        json!({
            "method": self.method,
            "versions": self.versions,
            "schema": self.schema.is_some(),
            "responseSchema": self.response_schema.is_some(),
            "streamingResponse": self.streaming_response,
            "manualResponse": self.manual_response,
            "keepAlive": self.keep_alive,
            "norpc": self.norpc,
            "rest": self.rest.as_ref().map(|r| json!({ "verb": r.verb.as_str(), "route": r.route })),
        })
    }
}

impl fmt::Debug for RouteOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteOptions")
            .field("method", &self.method)
            .field("versions", &self.versions)
            .field("schema", &self.schema.is_some())
            .field("response_schema", &self.response_schema.is_some())
            .field("streaming_response", &self.streaming_response)
            .field("manual_response", &self.manual_response)
            .field("keep_alive", &self.keep_alive)
            .field("norpc", &self.norpc)
            .finish_non_exhaustive()
    }
}
