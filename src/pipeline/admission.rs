//! Pipeline: one elastic worker pool behind an admission queue.

use crate::core::{RequestTypeKey, Result, WorkloadError, WorkloadErrorHandler};
use crate::pipeline::config::PipelineConfig;
use crate::pipeline::info::PipelineInfo;
use crate::pipeline::latency::LatencyGate;
use crate::pipeline::stats::PipelineCounters;
use crate::pool::{ThreadPool, ThreadPoolConfig};
use crate::tracing::TracedJob;
use std::sync::Arc;
use std::time::Duration;

/// Default interval at which idle workers check for work and keep-alive expiry.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

pub(crate) struct PipelineShared {
    pub(crate) id: Arc<str>,
    pub(crate) name: String,
    pub(crate) config: PipelineConfig,
    pub(crate) max_latency: Option<Duration>,
    pub(crate) pool: ThreadPool,
    pub(crate) counters: Arc<PipelineCounters>,
}

/// A bounded worker pool with admission control.
///
/// Every submitted command is wrapped in a [`LatencyGate`]. Submission never
/// blocks: a command is started, queued, or rejected right away. Rejections
/// and latency violations are reported to the caller's
/// [`WorkloadErrorHandler`], never returned.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use workload_pipelines::core::{LoggingErrorHandler, RequestKey};
/// use workload_pipelines::pipeline::{Pipeline, PipelineConfig};
///
/// # fn main() -> workload_pipelines::core::Result<()> {
/// let pipeline = Pipeline::new("orders", PipelineConfig::new(2).with_max_latency(500))?;
/// pipeline.execute(RequestKey::endpoint("api/orders"), Arc::new(LoggingErrorHandler), || {
///     println!("handling order");
/// });
/// pipeline.shutdown()?;
/// assert_eq!(pipeline.info().completed_task_count(), 1);
/// # Ok(())
/// # }
/// ```
pub struct Pipeline {
    shared: Arc<PipelineShared>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("id", &self.shared.id)
            .field("name", &self.shared.name)
            .field("pool", &self.shared.pool)
            .finish()
    }
}

impl Pipeline {
    /// Builds a pipeline from its configuration.
    ///
    /// # Errors
    ///
    /// - `WorkloadError::InvalidConfig` if the configuration does not validate
    /// - `WorkloadError::QueueTypeNotImplemented` for `PRIORITIZED` and `FAIR_WEIGHTED`
    pub fn new(id: impl Into<String>, config: PipelineConfig) -> Result<Self> {
        Self::with_poll_interval(id, config, DEFAULT_POLL_INTERVAL)
    }

    /// Builds a pipeline whose workers poll at `poll_interval`.
    pub fn with_poll_interval(
        id: impl Into<String>,
        config: PipelineConfig,
        poll_interval: Duration,
    ) -> Result<Self> {
        let id: String = id.into();
        config.validate()?;
        let queue_capacity = config.queue_capacity(&id)?;
        if poll_interval.is_zero() {
            return Err(WorkloadError::invalid_config(
                "worker_poll_interval",
                "poll interval must be non-zero",
            ));
        }

        let pool = ThreadPool::new(
            ThreadPoolConfig::new(config.core_threads, config.max_threads)
                .with_keep_alive(config.keep_alive())
                .with_queue_capacity(queue_capacity)
                .with_thread_name_prefix(id.as_str())
                .with_poll_interval(poll_interval),
        )?;

        let name = if config.name.is_empty() {
            id.clone()
        } else {
            config.name.clone()
        };

        log::info!(
            "created pipeline '{}' ({} to {} threads, {} queue of {}, max latency {})",
            id,
            config.core_threads,
            config.effective_max_threads(),
            config.queue_type,
            queue_capacity,
            config
                .max_latency()
                .map(|latency| format!("{}ms", latency.as_millis()))
                .unwrap_or_else(|| "disabled".to_string())
        );
        #[cfg(feature = "tracing")]
        crate::tracing::metrics::record_pipeline_created(
            &id,
            config.core_threads,
            config.effective_max_threads(),
            config.queue_type.as_str(),
        );

        Ok(Self {
            shared: Arc::new(PipelineShared {
                id: Arc::from(id),
                name,
                max_latency: config.max_latency(),
                config,
                pool,
                counters: Arc::new(PipelineCounters::default()),
            }),
        })
    }

    /// Pipeline id
    pub fn id(&self) -> &str {
        &self.shared.id
    }

    /// Display name; the id when the configuration has no name
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Configuration the pipeline was built from
    pub fn config(&self) -> &PipelineConfig {
        &self.shared.config
    }

    /// True if this pipeline is the default pipeline
    pub fn is_default(&self) -> bool {
        self.shared.config.default_pipeline
    }

    /// Submits `command` for the request `key`.
    ///
    /// The command is started on a new worker, queued, or rejected without
    /// blocking. A rejection increments the rejected count and calls
    /// [`WorkloadErrorHandler::request_rejected`] on this thread. An accepted
    /// command may still be discarded by its latency gate before it runs.
    pub fn execute<K, F>(&self, key: K, handler: Arc<dyn WorkloadErrorHandler<K>>, command: F)
    where
        K: RequestTypeKey,
        F: FnOnce() + Send + 'static,
    {
        let gate = LatencyGate::new(
            key.clone(),
            Box::new(command),
            Arc::clone(&self.shared.id),
            self.shared.max_latency,
            Arc::clone(&handler),
            Arc::clone(&self.shared.counters),
        );

        match self.shared.pool.try_execute(TracedJob::new(gate)) {
            Ok(()) => {
                #[cfg(feature = "tracing")]
                crate::tracing::metrics::record_admission(&self.shared.id, self.shared.pool.queue_size());
            }
            Err(e) => {
                self.shared.counters.record_rejection();
                let cause = match e {
                    WorkloadError::QueueFull { current, max } => {
                        WorkloadError::request_rejected(key.key(), self.id(), current, max)
                    }
                    other => other,
                };
                log::warn!("{}", cause);
                #[cfg(feature = "tracing")]
                crate::tracing::metrics::record_rejection(&self.shared.id, &key.key());
                handler.request_rejected(&key, cause);
            }
        }
    }

    /// Live statistics handle
    pub fn info(&self) -> PipelineInfo {
        PipelineInfo::new(Arc::clone(&self.shared))
    }

    /// True when no queue slot is left and every permitted worker is busy
    pub fn is_saturated(&self) -> bool {
        self.shared.pool.is_saturated()
    }

    /// Stops accepting requests and waits until queued requests have run.
    pub fn shutdown(&self) -> Result<()> {
        log::info!("shutting down pipeline '{}'", self.shared.id);
        self.shared.pool.shutdown()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::RequestKey;
    use crate::pipeline::QueueType;
    use parking_lot::{Condvar, Mutex};

    #[derive(Default)]
    struct CountingHandler {
        rejected: Mutex<Vec<String>>,
    }

    impl WorkloadErrorHandler<RequestKey> for CountingHandler {
        fn request_rejected(&self, key: &RequestKey, _cause: WorkloadError) {
            self.rejected.lock().push(key.key());
        }

        fn maximum_latency_exceeded(&self, _key: &RequestKey, _cause: WorkloadError) {}
    }

    #[test]
    fn test_reserved_queue_types_fail() {
        for queue_type in [QueueType::Prioritized, QueueType::FairWeighted] {
            let result = Pipeline::new("p", PipelineConfig::new(1).with_queue_type(queue_type));
            assert!(matches!(
                result,
                Err(WorkloadError::QueueTypeNotImplemented { .. })
            ));
        }
    }

    #[test]
    fn test_invalid_config_fails() {
        assert!(matches!(
            Pipeline::new("p", PipelineConfig::new(0)),
            Err(WorkloadError::InvalidConfig { .. })
        ));
        assert!(Pipeline::with_poll_interval("p", PipelineConfig::new(1), Duration::ZERO).is_err());
    }

    #[test]
    fn test_name_falls_back_to_id() {
        let pipeline = Pipeline::new("com.acme.Orders", PipelineConfig::new(1)).unwrap();
        assert_eq!(pipeline.name(), "com.acme.Orders");

        let pipeline =
            Pipeline::new("com.acme.Orders", PipelineConfig::new(1).with_name("Orders")).unwrap();
        assert_eq!(pipeline.name(), "Orders");
        assert_eq!(pipeline.id(), "com.acme.Orders");
    }

    #[test]
    fn test_not_queued_rejects_third_request() {
        let pipeline = Pipeline::new(
            "single",
            PipelineConfig::new(1).with_queue_type(QueueType::NotQueued),
        )
        .unwrap();
        let handler = Arc::new(CountingHandler::default());
        let release = Arc::new((Mutex::new(false), Condvar::new()));

        for i in 0..3 {
            let release = Arc::clone(&release);
            pipeline.execute(
                RequestKey::generic(format!("r{}", i)),
                Arc::clone(&handler) as Arc<dyn WorkloadErrorHandler<RequestKey>>,
                move || {
                    let (lock, cv) = &*release;
                    let mut released = lock.lock();
                    while !*released {
                        cv.wait(&mut released);
                    }
                },
            );
        }

        assert_eq!(*handler.rejected.lock(), vec!["r2".to_string()]);
        assert_eq!(pipeline.info().rejected_count(), 1);
        assert_eq!(pipeline.info().queue_size(), 1);

        {
            let (lock, cv) = &*release;
            *lock.lock() = true;
            cv.notify_all();
        }
        pipeline.shutdown().unwrap();
        assert_eq!(pipeline.info().completed_task_count(), 2);
    }
}
