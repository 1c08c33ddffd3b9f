//! Request classification keys.
//!
//! A request type key identifies the class a request belongs to and knows how
//! to produce a coarser key. The router walks this reduction chain until it
//! finds a mapped pipeline.
//!
//! ```rust
//! use workload_pipelines::core::{HttpMethod, RequestTypeKey, RestRequestTypeKey};
//!
//! let key = RestRequestTypeKey::new("api/v1/orders", Some(HttpMethod::Post));
//! assert_eq!(key.key(), "api/v1/orders (POST)");
//!
//! let reduced = key.reduce_key().unwrap();
//! assert_eq!(reduced.key(), "api/v1/orders");
//! assert_eq!(reduced.reduce_key().unwrap().key(), "api/v1");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug};
use std::hash::Hash;
use std::str::FromStr;

/// Identity of a classified request.
///
/// # Requirements
///
/// - `Eq + Hash`: keys are used as concurrent map keys
/// - `Clone + Send + Sync + 'static`: keys travel with the work to pool threads
/// - `reduce_key` must reach `None` after finitely many steps
pub trait RequestTypeKey: Clone + Eq + Hash + Send + Sync + Debug + 'static {
    /// Stable display identity used in traces and error messages.
    fn key(&self) -> String;

    /// Returns a strictly less specific key, or `None` when no reduction is possible.
    fn reduce_key(&self) -> Option<Self>;
}

/// HTTP methods a REST key can be qualified with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// GET
    Get,
    /// POST
    Post,
    /// PUT
    Put,
    /// DELETE
    Delete,
    /// PATCH
    Patch,
    /// HEAD
    Head,
    /// OPTIONS
    Options,
    /// TRACE
    Trace,
}

impl HttpMethod {
    /// Upper-case method name.
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Trace => "TRACE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = crate::core::WorkloadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "DELETE" => Ok(HttpMethod::Delete),
            "PATCH" => Ok(HttpMethod::Patch),
            "HEAD" => Ok(HttpMethod::Head),
            "OPTIONS" => Ok(HttpMethod::Options),
            "TRACE" => Ok(HttpMethod::Trace),
            _ => Err(crate::core::WorkloadError::invalid_config(
                "httpMethod",
                format!("unknown HTTP method '{}'", s),
            )),
        }
    }
}

/// A free-form key that cannot be reduced.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct GenericRequestTypeKey(String);

impl GenericRequestTypeKey {
    /// Creates a generic key.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }
}

impl RequestTypeKey for GenericRequestTypeKey {
    fn key(&self) -> String {
        self.0.clone()
    }

    fn reduce_key(&self) -> Option<Self> {
        None
    }
}

/// Key of a REST call: endpoint path plus optional HTTP method.
///
/// Reduction first drops the method, then strips trailing path segments.
/// A single-segment path without method is the end of the chain.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RestRequestTypeKey {
    endpoint_url: String,
    http_method: Option<HttpMethod>,
}

impl RestRequestTypeKey {
    /// Creates a REST key.
    pub fn new(endpoint_url: impl Into<String>, http_method: Option<HttpMethod>) -> Self {
        Self {
            endpoint_url: endpoint_url.into(),
            http_method,
        }
    }

    /// Creates a REST key without method.
    pub fn endpoint(endpoint_url: impl Into<String>) -> Self {
        Self::new(endpoint_url, None)
    }

    /// Endpoint path.
    pub fn endpoint_url(&self) -> &str {
        &self.endpoint_url
    }

    /// HTTP method, if any.
    pub fn http_method(&self) -> Option<HttpMethod> {
        self.http_method
    }
}

impl RequestTypeKey for RestRequestTypeKey {
    fn key(&self) -> String {
        match self.http_method {
            Some(method) => format!("{} ({})", self.endpoint_url, method),
            None => self.endpoint_url.clone(),
        }
    }

    fn reduce_key(&self) -> Option<Self> {
        if self.http_method.is_some() {
            return Some(Self::endpoint(self.endpoint_url.clone()));
        }
        let trimmed = self.endpoint_url.trim_end_matches('/');
        let (parent, _) = trimmed.rsplit_once('/')?;
        if parent.is_empty() {
            return None;
        }
        Some(Self::endpoint(parent))
    }
}

/// The crate's built-in key type: either a generic or a REST key.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum RequestKey {
    /// Free-form key
    Generic(GenericRequestTypeKey),
    /// REST endpoint key
    Rest(RestRequestTypeKey),
}

impl RequestKey {
    /// Shorthand for a generic key.
    pub fn generic(key: impl Into<String>) -> Self {
        RequestKey::Generic(GenericRequestTypeKey::new(key))
    }

    /// Shorthand for a REST key with method.
    pub fn rest(endpoint_url: impl Into<String>, method: HttpMethod) -> Self {
        RequestKey::Rest(RestRequestTypeKey::new(endpoint_url, Some(method)))
    }

    /// Shorthand for a REST key without method.
    pub fn endpoint(endpoint_url: impl Into<String>) -> Self {
        RequestKey::Rest(RestRequestTypeKey::endpoint(endpoint_url))
    }
}

impl RequestTypeKey for RequestKey {
    fn key(&self) -> String {
        match self {
            RequestKey::Generic(k) => k.key(),
            RequestKey::Rest(k) => k.key(),
        }
    }

    fn reduce_key(&self) -> Option<Self> {
        match self {
            RequestKey::Generic(k) => k.reduce_key().map(RequestKey::Generic),
            RequestKey::Rest(k) => k.reduce_key().map(RequestKey::Rest),
        }
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

impl From<GenericRequestTypeKey> for RequestKey {
    fn from(key: GenericRequestTypeKey) -> Self {
        RequestKey::Generic(key)
    }
}

impl From<RestRequestTypeKey> for RequestKey {
    fn from(key: RestRequestTypeKey) -> Self {
        RequestKey::Rest(key)
    }
}
