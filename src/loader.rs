//! External declarative pipeline source.
//!
//! Pipelines and their request keys can be declared in a TOML file (or JSON,
//! selected by a `.json` extension) and merged into a router after the
//! explicitly registered configuration.
//!
//! ```toml
//! [[pipelines]]
//! id = "com.acme.Orders"
//! coreThreads = 2
//! maxThreads = 5
//! queueType = "FIFO"
//! maxQueueDepth = 40
//! maxLatency = 1000
//! restKeys = [
//!     { endpointURL = "api/v2/orders", httpMethod = "POST" },
//!     { endpointURL = "api/v2" },
//! ]
//! genericKeys = [{ key = "orders" }]
//! ```
//!
//! Unknown fields are rejected, so a misspelt setting fails loudly instead of
//! silently falling back to its default.

use crate::core::{HttpMethod, RequestKey, Result, WorkloadError};
use crate::pipeline::{PipelineConfig, QueueType, TimeUnit, config::NORM_THREAD_PRIORITY};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// Parsed external pipeline source
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ExternalConfig {
    /// Declared pipelines
    #[serde(default)]
    pub pipelines: Vec<ExternalPipeline>,
}

/// One pipeline record with the request keys routed to it
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ExternalPipeline {
    /// Pipeline id
    pub id: String,
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Description
    #[serde(default)]
    pub description: String,
    /// Core worker count
    pub core_threads: usize,
    /// Maximum worker count; negative means "same as core"
    #[serde(default = "default_max_threads")]
    pub max_threads: i64,
    /// Requested thread priority
    #[serde(default = "default_thread_priority")]
    pub thread_priority: u8,
    /// Keep-alive of non-core workers in `timeUnit`
    #[serde(default = "default_keep_alive")]
    pub max_thread_keep_alive: u64,
    /// Queue policy
    #[serde(default)]
    pub queue_type: QueueType,
    /// FIFO queue capacity
    #[serde(default = "default_queue_depth")]
    pub max_queue_depth: usize,
    /// Maximum queuing latency in `timeUnit`; zero or negative disables the check
    #[serde(default = "default_max_latency")]
    pub max_latency: i64,
    /// Unit of keep-alive and latency
    #[serde(default)]
    pub time_unit: TimeUnit,
    /// Marks the default pipeline
    #[serde(default)]
    pub default_pipeline: bool,
    /// REST request keys routed to this pipeline
    #[serde(default)]
    pub rest_keys: Vec<ExternalRestKey>,
    /// Generic request keys routed to this pipeline
    #[serde(default)]
    pub generic_keys: Vec<ExternalGenericKey>,
}

/// REST request key entry
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExternalRestKey {
    /// Endpoint path
    #[serde(rename = "endpointURL")]
    pub endpoint_url: String,
    /// HTTP method; absent for the whole endpoint
    #[serde(rename = "httpMethod", default, skip_serializing_if = "Option::is_none")]
    pub http_method: Option<HttpMethod>,
}

/// Generic request key entry
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExternalGenericKey {
    /// Key value
    pub key: String,
}

fn default_max_threads() -> i64 {
    -1
}

fn default_thread_priority() -> u8 {
    NORM_THREAD_PRIORITY
}

fn default_keep_alive() -> u64 {
    60_000
}

fn default_queue_depth() -> usize {
    50
}

fn default_max_latency() -> i64 {
    -1
}

impl ExternalConfig {
    /// Load a pipeline source from a file
    ///
    /// Files ending in `.json` are parsed as JSON, everything else as TOML.
    ///
    /// # Errors
    ///
    /// Returns `UnableToLoadExternalConfig` if the file cannot be read, does
    /// not parse, or declares incomplete records.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let location = path.display().to_string();
        let contents = fs::read_to_string(path)
            .map_err(|e| WorkloadError::external_config(location.as_str(), e.to_string()))?;

        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let config: ExternalConfig = if is_json {
            serde_json::from_str(&contents)
                .map_err(|e| WorkloadError::external_config(location.as_str(), e.to_string()))?
        } else {
            toml::from_str(&contents)
                .map_err(|e| WorkloadError::external_config(location.as_str(), e.to_string()))?
        };

        config.validate(&location)?;
        log::info!(
            "loaded {} pipeline(s) from '{}'",
            config.pipelines.len(),
            location
        );
        Ok(config)
    }

    /// Parse a JSON pipeline source
    pub fn from_json_str(s: &str) -> Result<Self> {
        let config: ExternalConfig = serde_json::from_str(s)
            .map_err(|e| WorkloadError::external_config("<json>", e.to_string()))?;
        config.validate("<json>")?;
        Ok(config)
    }

    /// Parse a TOML pipeline source
    ///
    /// Prefer using the `FromStr` trait implementation.
    fn parse(s: &str) -> Result<Self> {
        let config: ExternalConfig = toml::from_str(s)
            .map_err(|e| WorkloadError::external_config("<toml>", e.to_string()))?;
        config.validate("<toml>")?;
        Ok(config)
    }

    /// Checks for:
    /// - Empty pipeline ids
    /// - Empty endpoint URLs and generic keys
    fn validate(&self, location: &str) -> Result<()> {
        for pipeline in &self.pipelines {
            if pipeline.id.trim().is_empty() {
                return Err(WorkloadError::external_config(
                    location,
                    "pipeline record without id",
                ));
            }
            if pipeline.rest_keys.iter().any(|k| k.endpoint_url.trim().is_empty()) {
                return Err(WorkloadError::external_config(
                    location,
                    format!("pipeline '{}' declares an empty endpointURL", pipeline.id),
                ));
            }
            if pipeline.generic_keys.iter().any(|k| k.key.trim().is_empty()) {
                return Err(WorkloadError::external_config(
                    location,
                    format!("pipeline '{}' declares an empty generic key", pipeline.id),
                ));
            }
        }
        Ok(())
    }
}

impl FromStr for ExternalConfig {
    type Err = WorkloadError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl ExternalPipeline {
    /// Pipeline configuration described by the record
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig::new(self.core_threads)
            .with_name(self.name.as_str())
            .with_description(self.description.as_str())
            .with_max_threads(usize::try_from(self.max_threads).unwrap_or(0))
            .with_thread_priority(self.thread_priority)
            .with_keep_alive(self.max_thread_keep_alive)
            .with_queue_type(self.queue_type)
            .with_max_queue_depth(self.max_queue_depth)
            .with_max_latency(self.max_latency)
            .with_time_unit(self.time_unit)
            .with_default_pipeline(self.default_pipeline)
    }

    /// Request keys routed to the pipeline, REST keys first
    pub fn request_keys(&self) -> Vec<RequestKey> {
        let rest = self.rest_keys.iter().map(|k| match k.http_method {
            Some(method) => RequestKey::rest(k.endpoint_url.as_str(), method),
            None => RequestKey::endpoint(k.endpoint_url.as_str()),
        });
        let generic = self
            .generic_keys
            .iter()
            .map(|k| RequestKey::generic(k.key.as_str()));
        rest.chain(generic).collect()
    }
}
