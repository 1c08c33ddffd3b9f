//! Workload mappings and endpoint groups.

use crate::core::{HttpMethod, RequestKey, RequestTypeKey};

/// A REST resource path and the methods it is served for.
///
/// A resource without methods stands for every method of the path.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Resource {
    /// Endpoint path
    pub path: String,
    /// Methods; empty for the whole path
    pub http_methods: Vec<HttpMethod>,
}

impl Resource {
    /// Resource served for the given methods
    pub fn new<S, I>(path: S, http_methods: I) -> Self
    where
        S: Into<String>,
        I: IntoIterator<Item = HttpMethod>,
    {
        Self {
            path: path.into(),
            http_methods: http_methods.into_iter().collect(),
        }
    }

    /// Resource covering every method of `path`
    pub fn any_method<S: Into<String>>(path: S) -> Self {
        Self::new(path, [])
    }
}

/// Endpoints routed as one unit.
///
/// # Example
///
/// ```rust
/// use workload_pipelines::core::{HttpMethod, RequestKey};
/// use workload_pipelines::router::{EndpointsGroup, Resource};
///
/// let group = EndpointsGroup::new()
///     .with_resource(Resource::new("api/v2/Object", [HttpMethod::Get, HttpMethod::Put]))
///     .with_endpoint_url("api/v2");
///
/// assert_eq!(
///     group.request_keys(),
///     vec![
///         RequestKey::rest("api/v2/Object", HttpMethod::Get),
///         RequestKey::rest("api/v2/Object", HttpMethod::Put),
///         RequestKey::endpoint("api/v2"),
///     ]
/// );
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EndpointsGroup {
    /// Resources with their methods
    pub resources: Vec<Resource>,
    /// Bare endpoint URLs
    pub endpoint_urls: Vec<String>,
}

impl EndpointsGroup {
    /// Empty group
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a resource
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_resource(mut self, resource: Resource) -> Self {
        self.resources.push(resource);
        self
    }

    /// Adds a bare endpoint URL
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_endpoint_url<S: Into<String>>(mut self, url: S) -> Self {
        self.endpoint_urls.push(url.into());
        self
    }

    /// Expands the group in declaration order: one key per path and method,
    /// one method-less key per resource without methods, then one method-less
    /// key per endpoint URL.
    pub fn request_keys(&self) -> Vec<RequestKey> {
        let mut keys = Vec::new();
        for resource in &self.resources {
            if resource.http_methods.is_empty() {
                keys.push(RequestKey::endpoint(resource.path.as_str()));
            } else {
                keys.extend(
                    resource
                        .http_methods
                        .iter()
                        .map(|method| RequestKey::rest(resource.path.as_str(), *method)),
                );
            }
        }
        keys.extend(self.endpoint_urls.iter().map(|url| RequestKey::endpoint(url.as_str())));
        keys
    }
}

/// Request keys routed to one pipeline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkloadMapping<K: RequestTypeKey = RequestKey> {
    /// Name used in configuration errors
    pub name: String,
    /// Target pipeline id
    pub pipeline_id: String,
    /// Keys routed to the pipeline
    pub keys: Vec<K>,
}

impl<K: RequestTypeKey> WorkloadMapping<K> {
    /// Mapping of explicit keys
    pub fn new<N, P, I>(name: N, pipeline_id: P, keys: I) -> Self
    where
        N: Into<String>,
        P: Into<String>,
        I: IntoIterator<Item = K>,
    {
        Self {
            name: name.into(),
            pipeline_id: pipeline_id.into(),
            keys: keys.into_iter().collect(),
        }
    }

    /// Mapping of every key an endpoint group expands to
    pub fn for_endpoints<N, P>(name: N, pipeline_id: P, group: &EndpointsGroup) -> Self
    where
        N: Into<String>,
        P: Into<String>,
        K: From<RequestKey>,
    {
        Self::new(
            name,
            pipeline_id,
            group.request_keys().into_iter().map(K::from),
        )
    }
}
