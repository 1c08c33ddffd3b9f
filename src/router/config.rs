//! Router configuration.

use crate::core::{RequestKey, RequestTypeKey, Result, WorkloadError};
use crate::loader::ExternalConfig;
use crate::pipeline::{PipelineConfig, DEFAULT_POLL_INTERVAL};
use crate::router::mapping::WorkloadMapping;
use std::path::PathBuf;
use std::time::Duration;

/// Tuning of request resolution and pipeline workers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouterSettings {
    /// Reductions tried before resolution fails with `ReductionLimitExceeded`
    pub max_reduction_hops: usize,
    /// Also bind keys resolved through the default pipeline
    pub memoize_default_fallback: bool,
    /// Poll interval of pipeline workers
    pub worker_poll_interval: Duration,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            max_reduction_hops: 64,
            memoize_default_fallback: true,
            worker_poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl RouterSettings {
    /// Sets the reduction hop limit
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_max_reduction_hops(mut self, hops: usize) -> Self {
        self.max_reduction_hops = hops;
        self
    }

    /// Sets whether default-pipeline fallbacks are memoized
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_memoize_default_fallback(mut self, memoize: bool) -> Self {
        self.memoize_default_fallback = memoize;
        self
    }

    /// Sets the worker poll interval
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_worker_poll_interval(mut self, interval: Duration) -> Self {
        self.worker_poll_interval = interval;
        self
    }

    /// Validate settings
    pub fn validate(&self) -> Result<()> {
        if self.max_reduction_hops == 0 {
            return Err(WorkloadError::invalid_config(
                "max_reduction_hops",
                "at least one reduction must be allowed",
            ));
        }
        if self.worker_poll_interval.is_zero() {
            return Err(WorkloadError::invalid_config(
                "worker_poll_interval",
                "poll interval must be non-zero",
            ));
        }
        Ok(())
    }
}

/// Everything a [`WorkloadRouter`](crate::router::WorkloadRouter) is built from.
///
/// Pipelines are created in registration order, then static and elastic
/// mappings are applied, then the external source (if any) is merged.
///
/// # Example
///
/// ```rust
/// use workload_pipelines::core::RequestKey;
/// use workload_pipelines::pipeline::PipelineConfig;
/// use workload_pipelines::router::{WorkloadConfig, WorkloadMapping};
///
/// let config: WorkloadConfig = WorkloadConfig::new()
///     .with_pipeline("orders", PipelineConfig::new(2).with_max_threads(5))
///     .with_pipeline("fallback", PipelineConfig::new(1).with_default_pipeline(true))
///     .with_static_mapping(WorkloadMapping::new(
///         "order endpoints",
///         "orders",
///         [RequestKey::endpoint("api/orders")],
///     ));
/// assert_eq!(config.pipelines.len(), 2);
/// ```
#[derive(Clone, Debug)]
pub struct WorkloadConfig<K: RequestTypeKey = RequestKey> {
    /// Pipelines by id, in registration order
    pub pipelines: Vec<(String, PipelineConfig)>,
    /// Mappings fixed in code
    pub static_mappings: Vec<WorkloadMapping<K>>,
    /// Mappings supplied at deployment time
    pub elastic_mappings: Vec<WorkloadMapping<K>>,
    /// Already parsed external source
    pub external_config: Option<ExternalConfig>,
    /// External source file, read while the router is built
    pub external_config_file: Option<PathBuf>,
    /// Resolution and worker tuning
    pub settings: RouterSettings,
}

impl<K: RequestTypeKey> Default for WorkloadConfig<K> {
    fn default() -> Self {
        Self {
            pipelines: Vec::new(),
            static_mappings: Vec::new(),
            elastic_mappings: Vec::new(),
            external_config: None,
            external_config_file: None,
            settings: RouterSettings::default(),
        }
    }
}

impl<K: RequestTypeKey> WorkloadConfig<K> {
    /// Empty configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a pipeline
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_pipeline<S: Into<String>>(mut self, id: S, config: PipelineConfig) -> Self {
        self.pipelines.push((id.into(), config));
        self
    }

    /// Adds a static mapping
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_static_mapping(mut self, mapping: WorkloadMapping<K>) -> Self {
        self.static_mappings.push(mapping);
        self
    }

    /// Adds an elastic mapping
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_elastic_mapping(mut self, mapping: WorkloadMapping<K>) -> Self {
        self.elastic_mappings.push(mapping);
        self
    }

    /// Merges an already parsed external source
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_external_config(mut self, external: ExternalConfig) -> Self {
        self.external_config = Some(external);
        self
    }

    /// Merges the external source stored at `path`
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_external_config_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.external_config_file = Some(path.into());
        self
    }

    /// Replaces the router settings
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_settings(mut self, settings: RouterSettings) -> Self {
        self.settings = settings;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = RouterSettings::default();
        assert_eq!(settings.max_reduction_hops, 64);
        assert!(settings.memoize_default_fallback);
        assert_eq!(settings.worker_poll_interval, Duration::from_millis(50));
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_settings_validation() {
        assert!(RouterSettings::default()
            .with_max_reduction_hops(0)
            .validate()
            .is_err());
        assert!(RouterSettings::default()
            .with_worker_poll_interval(Duration::ZERO)
            .validate()
            .is_err());
    }

    #[test]
    fn test_config_builder_keeps_order() {
        let config: WorkloadConfig = WorkloadConfig::new()
            .with_pipeline("b", PipelineConfig::new(1))
            .with_pipeline("a", PipelineConfig::new(1))
            .with_external_config_file("pipelines.toml");
        let ids: Vec<_> = config.pipelines.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, ["b", "a"]);
        assert_eq!(config.external_config_file, Some(PathBuf::from("pipelines.toml")));
    }
}
