//! Request routing to pipelines.

use crate::core::{RequestKey, RequestTypeKey, Result, WorkloadError, WorkloadErrorHandler};
use crate::loader::ExternalConfig;
use crate::pipeline::{Pipeline, PipelineConfig, PipelineInfo};
use crate::router::config::{RouterSettings, WorkloadConfig};
use crate::router::mapping::WorkloadMapping;
use dashmap::DashMap;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

/// Routes requests to pipelines by request type.
///
/// # Resolution
///
/// 1. A key bound in the mapping resolves directly.
/// 2. Otherwise the key is reduced step by step until a reduced key is bound.
/// 3. If reduction runs out, the default pipeline is used if there is one,
///    else resolution fails with [`WorkloadError::NoPipelineFound`].
///
/// A key resolved in step 2 or 3 is bound to its pipeline, so the next
/// lookup of the same key is a direct hit. Only the original key is bound,
/// never the intermediate reductions. Binding default-pipeline fallbacks can
/// be switched off with [`RouterSettings::memoize_default_fallback`].
///
/// The mapping is a concurrent map: resolution may run on any number of
/// caller threads at once.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use workload_pipelines::core::{HttpMethod, LoggingErrorHandler, RequestKey};
/// use workload_pipelines::pipeline::PipelineConfig;
/// use workload_pipelines::router::{WorkloadConfig, WorkloadMapping, WorkloadRouter};
///
/// # fn main() -> workload_pipelines::core::Result<()> {
/// let router = WorkloadRouter::new(
///     WorkloadConfig::new()
///         .with_pipeline("v1", PipelineConfig::new(2))
///         .with_static_mapping(WorkloadMapping::new("v1", "v1", [RequestKey::endpoint("api/v1")])),
/// )?;
///
/// let key = RequestKey::rest("api/v1/orders", HttpMethod::Post);
/// router.execute(&key, Arc::new(LoggingErrorHandler), || println!("order placed"))?;
/// assert_eq!(router.resolve_pipeline(&key)?.id(), "v1");
/// router.shutdown()?;
/// # Ok(())
/// # }
/// ```
pub struct WorkloadRouter<K: RequestTypeKey = RequestKey> {
    mapping: DashMap<K, Arc<Pipeline>>,
    pipelines: Vec<Arc<Pipeline>>,
    default_pipeline: Option<Arc<Pipeline>>,
    settings: RouterSettings,
}

impl<K: RequestTypeKey> std::fmt::Debug for WorkloadRouter<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkloadRouter")
            .field("pipelines", &self.pipelines.len())
            .field("mapped_keys", &self.mapping.len())
            .field(
                "default_pipeline",
                &self.default_pipeline.as_ref().map(|p| p.id().to_string()),
            )
            .field("settings", &self.settings)
            .finish()
    }
}

/// Collects pipelines and bindings while a router is built.
struct RouterBuilder<K: RequestTypeKey> {
    settings: RouterSettings,
    pipelines: Vec<Arc<Pipeline>>,
    by_id: HashMap<String, Arc<Pipeline>>,
    default_pipeline: Option<Arc<Pipeline>>,
    mapping: HashMap<K, Arc<Pipeline>>,
}

impl<K: RequestTypeKey> RouterBuilder<K> {
    fn new(settings: RouterSettings) -> Self {
        Self {
            settings,
            pipelines: Vec::new(),
            by_id: HashMap::new(),
            default_pipeline: None,
            mapping: HashMap::new(),
        }
    }

    fn add_pipeline(&mut self, id: String, config: PipelineConfig) -> Result<Arc<Pipeline>> {
        if self.by_id.contains_key(&id) {
            return Err(WorkloadError::duplicate_pipeline(id));
        }
        if config.default_pipeline {
            if let Some(first) = &self.default_pipeline {
                return Err(WorkloadError::multiple_default_pipelines(first.id(), id));
            }
        }

        let pipeline = Arc::new(Pipeline::with_poll_interval(
            id.as_str(),
            config,
            self.settings.worker_poll_interval,
        )?);
        if pipeline.is_default() {
            self.default_pipeline = Some(Arc::clone(&pipeline));
        }
        self.by_id.insert(id, Arc::clone(&pipeline));
        self.pipelines.push(Arc::clone(&pipeline));
        Ok(pipeline)
    }

    fn bind(&mut self, key: K, pipeline: &Arc<Pipeline>) {
        if let Some(previous) = self.mapping.insert(key.clone(), Arc::clone(pipeline)) {
            if previous.id() != pipeline.id() {
                log::warn!(
                    "request '{}' moved from pipeline '{}' to '{}'",
                    key.key(),
                    previous.id(),
                    pipeline.id()
                );
            }
        }
    }

    fn apply_mapping(&mut self, mapping: WorkloadMapping<K>) -> Result<()> {
        let pipeline = self
            .by_id
            .get(&mapping.pipeline_id)
            .cloned()
            .ok_or_else(|| {
                WorkloadError::not_existing_pipeline(mapping.pipeline_id.as_str(), mapping.name.as_str())
            })?;
        log::debug!(
            "mapping '{}' routes {} request type(s) to pipeline '{}'",
            mapping.name,
            mapping.keys.len(),
            pipeline.id()
        );
        for key in mapping.keys {
            self.bind(key, &pipeline);
        }
        Ok(())
    }

    fn merge_external(&mut self, external: ExternalConfig) -> Result<()>
    where
        K: From<RequestKey>,
    {
        for record in external.pipelines {
            let pipeline = self.add_pipeline(record.id.clone(), record.pipeline_config())?;
            for key in record.request_keys() {
                self.bind(K::from(key), &pipeline);
            }
        }
        Ok(())
    }

    fn build(self) -> Result<WorkloadRouter<K>> {
        if self.mapping.is_empty() && self.default_pipeline.is_none() {
            return Err(if self.pipelines.is_empty() {
                WorkloadError::NoPipelinesConfigured
            } else {
                WorkloadError::NoWorkloadMappingsAvailable
            });
        }

        log::info!(
            "workload router ready: {} pipeline(s), {} request type(s), default pipeline {}",
            self.pipelines.len(),
            self.mapping.len(),
            self.default_pipeline
                .as_ref()
                .map(|p| format!("'{}'", p.id()))
                .unwrap_or_else(|| "none".to_string())
        );

        Ok(WorkloadRouter {
            mapping: self.mapping.into_iter().collect(),
            pipelines: self.pipelines,
            default_pipeline: self.default_pipeline,
            settings: self.settings,
        })
    }
}

impl<K: RequestTypeKey + From<RequestKey>> WorkloadRouter<K> {
    /// Builds all pipelines and the request mapping.
    ///
    /// # Errors
    ///
    /// - `MultipleDefaultPipelines` if two pipelines are flagged as default
    /// - `DuplicatePipelineId` if an id is registered twice
    /// - `NotExistingPipelineConfigured` if a mapping names an unknown pipeline
    /// - `UnableToLoadExternalConfig` if the external source cannot be loaded
    /// - `NoPipelinesConfigured` if no pipeline is defined at all
    /// - `NoWorkloadMappingsAvailable` if nothing is mapped and there is no default
    /// - any error of [`Pipeline::new`]
    pub fn new(config: WorkloadConfig<K>) -> Result<Self> {
        config.settings.validate()?;
        let mut builder = RouterBuilder::new(config.settings);

        for (id, pipeline_config) in config.pipelines {
            builder.add_pipeline(id, pipeline_config)?;
        }
        for mapping in config.static_mappings.into_iter().chain(config.elastic_mappings) {
            builder.apply_mapping(mapping)?;
        }
        if let Some(external) = config.external_config {
            builder.merge_external(external)?;
        }
        if let Some(path) = config.external_config_file {
            builder.merge_external(ExternalConfig::from_file(path)?)?;
        }

        builder.build()
    }

    /// Builds a router from an external source file alone.
    pub fn from_external_config<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::new(WorkloadConfig::new().with_external_config_file(path.as_ref()))
    }
}

impl<K: RequestTypeKey> WorkloadRouter<K> {
    /// Finds the pipeline serving `key`.
    ///
    /// # Errors
    ///
    /// - `NoPipelineFound` if neither the key, its reductions nor a default pipeline match
    /// - `ReductionLimitExceeded` if the key reduces more often than allowed
    pub fn resolve_pipeline(&self, key: &K) -> Result<Arc<Pipeline>> {
        if let Some(pipeline) = self.mapping.get(key) {
            return Ok(Arc::clone(pipeline.value()));
        }

        let mut hops = 0;
        let mut current = key.reduce_key();
        let found = loop {
            let Some(reduced) = current else {
                break None;
            };
            hops += 1;
            if hops > self.settings.max_reduction_hops {
                return Err(WorkloadError::reduction_limit_exceeded(
                    key.key(),
                    self.settings.max_reduction_hops,
                ));
            }
            if let Some(pipeline) = self.mapping.get(&reduced) {
                break Some(Arc::clone(pipeline.value()));
            }
            current = reduced.reduce_key();
        };

        let (pipeline, memoize) = match found {
            Some(pipeline) => (pipeline, true),
            None => match &self.default_pipeline {
                Some(default) => (Arc::clone(default), self.settings.memoize_default_fallback),
                None => return Err(WorkloadError::no_pipeline_found(key.key())),
            },
        };

        if memoize {
            log::debug!(
                "binding request '{}' to pipeline '{}'",
                key.key(),
                pipeline.id()
            );
            self.mapping.insert(key.clone(), Arc::clone(&pipeline));
        }
        Ok(pipeline)
    }

    /// Resolves the pipeline for `key` and submits `command` to it.
    ///
    /// Resolution failures are returned. Rejections and latency violations
    /// go to `handler`.
    pub fn execute<F>(&self, key: &K, handler: Arc<dyn WorkloadErrorHandler<K>>, command: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let pipeline = self.resolve_pipeline(key)?;
        pipeline.execute(key.clone(), handler, command);
        Ok(())
    }

    /// True when the pipeline serving `key` has no queue slot and no idle worker left
    pub fn is_pipeline_overloaded(&self, key: &K) -> Result<bool> {
        Ok(self.resolve_pipeline(key)?.is_saturated())
    }

    /// Statistics of the default pipeline
    pub fn default_pipeline(&self) -> Option<PipelineInfo> {
        self.default_pipeline.as_ref().map(|p| p.info())
    }

    /// Statistics of the default pipeline and every pipeline reachable from
    /// the mapping, each once, in registration order
    pub fn pipelines(&self) -> Vec<PipelineInfo> {
        let reachable: HashSet<String> = self
            .mapping
            .iter()
            .map(|entry| entry.value().id().to_string())
            .collect();
        self.pipelines
            .iter()
            .filter(|p| p.is_default() || reachable.contains(p.id()))
            .map(|p| p.info())
            .collect()
    }

    /// Statistics of a pipeline by id
    pub fn pipeline(&self, id: &str) -> Option<PipelineInfo> {
        self.pipelines.iter().find(|p| p.id() == id).map(|p| p.info())
    }

    /// Current key to pipeline bindings, including memoized ones
    pub fn workload_mappings(&self) -> HashMap<K, PipelineInfo> {
        self.mapping
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().info()))
            .collect()
    }

    /// Resolution and worker settings
    pub fn settings(&self) -> &RouterSettings {
        &self.settings
    }

    /// Shuts down every pipeline, waiting for queued requests to run.
    ///
    /// All pipelines are asked to stop even if one fails; the first error is returned.
    pub fn shutdown(&self) -> Result<()> {
        let mut first_error = None;
        for pipeline in &self.pipelines {
            if let Err(e) = pipeline.shutdown() {
                log::error!("failed to shut down pipeline '{}': {}", pipeline.id(), e);
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{GenericRequestTypeKey, HttpMethod};

    fn router_with(mappings: &[(&str, RequestKey)], default: bool) -> Result<WorkloadRouter> {
        let mut config = WorkloadConfig::new()
            .with_pipeline("Pipeline1", PipelineConfig::new(1))
            .with_pipeline("Pipeline2", PipelineConfig::new(1));
        if default {
            config = config.with_pipeline(
                "DefaultPipeline",
                PipelineConfig::new(1).with_default_pipeline(true),
            );
        }
        for (pipeline, key) in mappings {
            config = config.with_static_mapping(WorkloadMapping::new(
                format!("{} mapping", pipeline),
                *pipeline,
                [key.clone()],
            ));
        }
        WorkloadRouter::new(config)
    }

    #[test]
    fn test_direct_and_reduced_resolution() {
        let router = router_with(
            &[
                ("Pipeline1", RequestKey::endpoint("api/v1")),
                ("Pipeline2", RequestKey::endpoint("api/v2")),
                ("Pipeline2", RequestKey::rest("api/v2/Object", HttpMethod::Get)),
            ],
            false,
        )
        .unwrap();

        let direct = RequestKey::endpoint("api/v2");
        assert_eq!(router.resolve_pipeline(&direct).unwrap().id(), "Pipeline2");

        let reduced = RequestKey::rest("api/v1/xyz", HttpMethod::Post);
        assert!(!router.workload_mappings().contains_key(&reduced));
        assert_eq!(router.resolve_pipeline(&reduced).unwrap().id(), "Pipeline1");
        assert!(router.workload_mappings().contains_key(&reduced));
        // intermediate reductions stay unbound
        assert!(!router
            .workload_mappings()
            .contains_key(&RequestKey::endpoint("api/v1/xyz")));
    }

    #[test]
    fn test_no_pipeline_found_without_default() {
        let router =
            router_with(&[("Pipeline1", RequestKey::endpoint("api/v1"))], false).unwrap();
        let key = RequestKey::rest("api/v4711", HttpMethod::Get);
        match router.resolve_pipeline(&key) {
            Err(WorkloadError::NoPipelineFound { key }) => assert_eq!(key, "api/v4711 (GET)"),
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(!router.workload_mappings().contains_key(&key));
    }

    #[test]
    fn test_default_fallback_is_memoized() {
        let router = router_with(&[("Pipeline1", RequestKey::endpoint("api/v1"))], true).unwrap();
        let key = RequestKey::endpoint("api/v4711");
        assert_eq!(router.resolve_pipeline(&key).unwrap().id(), "DefaultPipeline");
        assert_eq!(router.workload_mappings()[&key].id(), "DefaultPipeline");
    }

    #[test]
    fn test_default_fallback_not_memoized_when_disabled() {
        let router: WorkloadRouter = WorkloadRouter::new(
            WorkloadConfig::new()
                .with_pipeline("d", PipelineConfig::new(1).with_default_pipeline(true))
                .with_settings(RouterSettings::default().with_memoize_default_fallback(false)),
        )
        .unwrap();
        let key = RequestKey::generic("batch");
        assert_eq!(router.resolve_pipeline(&key).unwrap().id(), "d");
        assert!(router.workload_mappings().is_empty());
    }

    #[test]
    fn test_configuration_errors() {
        let err = WorkloadRouter::<RequestKey>::new(WorkloadConfig::new()).unwrap_err();
        assert!(matches!(err, WorkloadError::NoPipelinesConfigured));

        let err = router_with(&[], false).unwrap_err();
        assert!(matches!(err, WorkloadError::NoWorkloadMappingsAvailable));

        let err = WorkloadRouter::<RequestKey>::new(
            WorkloadConfig::new()
                .with_pipeline("a", PipelineConfig::new(1).with_default_pipeline(true))
                .with_pipeline("b", PipelineConfig::new(1).with_default_pipeline(true)),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            WorkloadError::MultipleDefaultPipelines { ref first, ref second } if first == "a" && second == "b"
        ));

        let err = router_with(&[("Missing", RequestKey::endpoint("api"))], true).unwrap_err();
        assert!(matches!(
            err,
            WorkloadError::NotExistingPipelineConfigured { ref pipeline_id, .. } if pipeline_id == "Missing"
        ));

        let err = WorkloadRouter::<RequestKey>::new(
            WorkloadConfig::new()
                .with_pipeline("a", PipelineConfig::new(1).with_default_pipeline(true))
                .with_pipeline("a", PipelineConfig::new(1)),
        )
        .unwrap_err();
        assert!(matches!(err, WorkloadError::DuplicatePipelineId { .. }));
    }

    #[test]
    fn test_default_only_router() {
        let router: WorkloadRouter = WorkloadRouter::new(
            WorkloadConfig::new()
                .with_pipeline("d", PipelineConfig::new(1).with_default_pipeline(true)),
        )
        .unwrap();
        assert_eq!(router.default_pipeline().map(|p| p.id().to_string()), Some("d".into()));
        assert_eq!(router.pipelines().len(), 1);
    }

    #[test]
    fn test_pipelines_are_deduplicated() {
        let router = router_with(
            &[
                ("Pipeline2", RequestKey::endpoint("api/v2")),
                ("Pipeline2", RequestKey::endpoint("api/v3")),
            ],
            true,
        )
        .unwrap();
        let ids: Vec<String> = router.pipelines().iter().map(|p| p.id().to_string()).collect();
        // Pipeline1 is configured but unreachable
        assert_eq!(ids, ["Pipeline2", "DefaultPipeline"]);
        assert!(router.pipeline("Pipeline1").is_some());
    }

    #[derive(Clone, Debug, PartialEq, Eq, Hash)]
    struct Cyclic(u8);

    impl RequestTypeKey for Cyclic {
        fn key(&self) -> String {
            format!("cyclic-{}", self.0)
        }

        fn reduce_key(&self) -> Option<Self> {
            Some(Cyclic((self.0 + 1) % 2))
        }
    }

    impl From<RequestKey> for Cyclic {
        fn from(_: RequestKey) -> Self {
            Cyclic(0)
        }
    }

    #[test]
    fn test_cyclic_reduction_is_bounded() {
        let router: WorkloadRouter<Cyclic> = WorkloadRouter::new(
            WorkloadConfig::new()
                .with_pipeline("p", PipelineConfig::new(1))
                .with_static_mapping(WorkloadMapping::new("never", "p", [Cyclic(7)]))
                .with_settings(RouterSettings::default().with_max_reduction_hops(8)),
        )
        .unwrap();
        assert!(matches!(
            router.resolve_pipeline(&Cyclic(0)),
            Err(WorkloadError::ReductionLimitExceeded { hops: 8, .. })
        ));
    }

    #[test]
    fn test_generic_keys_use_custom_type() {
        #[derive(Clone, Debug, PartialEq, Eq, Hash)]
        struct Tenant(GenericRequestTypeKey);

        impl RequestTypeKey for Tenant {
            fn key(&self) -> String {
                self.0.key()
            }

            fn reduce_key(&self) -> Option<Self> {
                None
            }
        }

        impl From<RequestKey> for Tenant {
            fn from(key: RequestKey) -> Self {
                Tenant(GenericRequestTypeKey::new(key.key()))
            }
        }

        let tenant = Tenant(GenericRequestTypeKey::new("acme"));
        let router: WorkloadRouter<Tenant> = WorkloadRouter::new(
            WorkloadConfig::new()
                .with_pipeline("p", PipelineConfig::new(1))
                .with_static_mapping(WorkloadMapping::new("tenants", "p", [tenant.clone()])),
        )
        .unwrap();
        assert_eq!(router.resolve_pipeline(&tenant).unwrap().id(), "p");
    }
}
