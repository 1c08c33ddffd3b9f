//! Error types for workload pipelines

use std::time::Duration;

/// Result type for workload operations
pub type Result<T> = std::result::Result<T, WorkloadError>;

/// Errors that can occur while configuring pipelines or admitting requests
///
/// Configuration variants are raised once while a [`WorkloadRouter`] is built.
/// `RequestRejected` and `MaximumLatencyExceeded` are never returned to the
/// submitting caller; they are handed to its [`WorkloadErrorHandler`].
///
/// [`WorkloadRouter`]: crate::router::WorkloadRouter
/// [`WorkloadErrorHandler`]: crate::core::WorkloadErrorHandler
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum WorkloadError {
    /// Neither explicit nor external configuration defined a single pipeline
    #[error("No pipelines are configured")]
    NoPipelinesConfigured,

    /// Pipelines exist but no request type is mapped and no default pipeline exists
    #[error("Pipelines are configured but no workload mapping or default pipeline is available")]
    NoWorkloadMappingsAvailable,

    /// More than one pipeline is flagged as default
    #[error("Multiple default pipelines configured: '{first}' and '{second}'")]
    MultipleDefaultPipelines {
        /// Pipeline that was registered as default first
        first: String,
        /// Second pipeline claiming to be the default
        second: String,
    },

    /// A workload mapping references a pipeline that does not exist
    #[error("Workload mapping '{mapping}' references not existing pipeline '{pipeline_id}'")]
    NotExistingPipelineConfigured {
        /// Referenced pipeline
        pipeline_id: String,
        /// Name of the offending mapping
        mapping: String,
    },

    /// Two pipelines share the same id
    #[error("Pipeline '{pipeline_id}' is configured more than once")]
    DuplicatePipelineId {
        /// Duplicated pipeline id
        pipeline_id: String,
    },

    /// External pipeline source could not be read or parsed
    #[error("Unable to load external pipeline configuration '{path}': {message}")]
    UnableToLoadExternalConfig {
        /// Location of the source
        path: String,
        /// Error message
        message: String,
    },

    /// Queue policy is reserved but not implemented
    #[error("Queue type {queue_type} of pipeline '{pipeline_id}' is not implemented")]
    QueueTypeNotImplemented {
        /// Pipeline being constructed
        pipeline_id: String,
        /// Requested queue type
        queue_type: String,
    },

    /// Invalid configuration with parameter
    #[error("Invalid configuration for '{parameter}': {message}")]
    InvalidConfig {
        /// Configuration parameter name
        parameter: String,
        /// Error message
        message: String,
    },

    /// Pipeline queue was full and no further worker could be started
    #[error(
        "Request '{key}' rejected by pipeline '{pipeline_id}': {queue_size}/{queue_capacity} requests queued"
    )]
    RequestRejected {
        /// Display form of the request key
        key: String,
        /// Pipeline that rejected the request
        pipeline_id: String,
        /// Queue size at rejection time
        queue_size: usize,
        /// Queue capacity
        queue_capacity: usize,
    },

    /// Request waited longer than the pipeline tolerates
    #[error(
        "Rejecting execution of request '{key}'. Latency {}ms exceeds maximum of {}ms by {}ms",
        .latency.as_millis(),
        .max_latency.as_millis(),
        .overshoot.as_millis()
    )]
    MaximumLatencyExceeded {
        /// Display form of the request key
        key: String,
        /// Observed queuing latency
        latency: Duration,
        /// Configured maximum latency
        max_latency: Duration,
        /// `latency - max_latency`
        overshoot: Duration,
    },

    /// No pipeline matched the key or any of its reductions and there is no default
    #[error("No pipeline found for request '{key}'")]
    NoPipelineFound {
        /// Display form of the original request key
        key: String,
    },

    /// Key reduction did not terminate within the configured bound
    #[error("Reduction of request '{key}' exceeded {hops} hops")]
    ReductionLimitExceeded {
        /// Display form of the original request key
        key: String,
        /// Configured hop limit
        hops: usize,
    },

    /// Thread pool is not running
    #[error("Thread pool '{pool_name}' is not running")]
    NotRunning {
        /// Name of the thread pool
        pool_name: String,
    },

    /// Thread pool is shutting down with job count
    #[error("Thread pool is shutting down ({pending_jobs} jobs pending)")]
    ShuttingDown {
        /// Number of pending jobs
        pending_jobs: usize,
    },

    /// Failed to spawn a worker thread with details
    #[error("Failed to spawn worker thread #{thread_id}: {message}")]
    SpawnError {
        /// ID of the thread that failed to spawn
        thread_id: usize,
        /// Error message
        message: String,
        /// Source IO error
        #[source]
        source: Option<std::io::Error>,
    },

    /// Queue is full with capacity details
    #[error("Job queue is full: {current}/{max} jobs queued")]
    QueueFull {
        /// Current queue size
        current: usize,
        /// Maximum queue size
        max: usize,
    },

    /// General error
    #[error("{0}")]
    Other(String),
}

impl WorkloadError {
    /// Create a multiple default pipelines error
    pub fn multiple_default_pipelines(first: impl Into<String>, second: impl Into<String>) -> Self {
        WorkloadError::MultipleDefaultPipelines {
            first: first.into(),
            second: second.into(),
        }
    }

    /// Create a dangling pipeline reference error
    pub fn not_existing_pipeline(pipeline_id: impl Into<String>, mapping: impl Into<String>) -> Self {
        WorkloadError::NotExistingPipelineConfigured {
            pipeline_id: pipeline_id.into(),
            mapping: mapping.into(),
        }
    }

    /// Create a duplicate pipeline id error
    pub fn duplicate_pipeline(pipeline_id: impl Into<String>) -> Self {
        WorkloadError::DuplicatePipelineId {
            pipeline_id: pipeline_id.into(),
        }
    }

    /// Create an external configuration error
    pub fn external_config(path: impl Into<String>, message: impl Into<String>) -> Self {
        WorkloadError::UnableToLoadExternalConfig {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a not implemented queue type error
    pub fn queue_type_not_implemented(
        pipeline_id: impl Into<String>,
        queue_type: impl std::fmt::Display,
    ) -> Self {
        WorkloadError::QueueTypeNotImplemented {
            pipeline_id: pipeline_id.into(),
            queue_type: queue_type.to_string(),
        }
    }

    /// Create an invalid config error
    pub fn invalid_config(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        WorkloadError::InvalidConfig {
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    /// Create a request rejected error
    pub fn request_rejected(
        key: impl Into<String>,
        pipeline_id: impl Into<String>,
        queue_size: usize,
        queue_capacity: usize,
    ) -> Self {
        WorkloadError::RequestRejected {
            key: key.into(),
            pipeline_id: pipeline_id.into(),
            queue_size,
            queue_capacity,
        }
    }

    /// Create a latency exceeded error; the overshoot is derived
    pub fn maximum_latency_exceeded(
        key: impl Into<String>,
        latency: Duration,
        max_latency: Duration,
    ) -> Self {
        WorkloadError::MaximumLatencyExceeded {
            key: key.into(),
            latency,
            max_latency,
            overshoot: latency.saturating_sub(max_latency),
        }
    }

    /// Create a no pipeline found error
    pub fn no_pipeline_found(key: impl Into<String>) -> Self {
        WorkloadError::NoPipelineFound { key: key.into() }
    }

    /// Create a reduction limit error
    pub fn reduction_limit_exceeded(key: impl Into<String>, hops: usize) -> Self {
        WorkloadError::ReductionLimitExceeded {
            key: key.into(),
            hops,
        }
    }

    /// Create a not running error
    pub fn not_running(pool_name: impl Into<String>) -> Self {
        WorkloadError::NotRunning {
            pool_name: pool_name.into(),
        }
    }

    /// Create a shutting down error
    pub fn shutting_down(pending_jobs: usize) -> Self {
        WorkloadError::ShuttingDown { pending_jobs }
    }

    /// Create a spawn error with source
    pub fn spawn_with_source(
        thread_id: usize,
        message: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        WorkloadError::SpawnError {
            thread_id,
            message: message.into(),
            source: Some(source),
        }
    }

    /// Create a queue full error
    pub fn queue_full(current: usize, max: usize) -> Self {
        WorkloadError::QueueFull { current, max }
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        WorkloadError::Other(msg.into())
    }

    /// Returns true for errors raised while building pipelines or the router
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            WorkloadError::NoPipelinesConfigured
                | WorkloadError::NoWorkloadMappingsAvailable
                | WorkloadError::MultipleDefaultPipelines { .. }
                | WorkloadError::NotExistingPipelineConfigured { .. }
                | WorkloadError::DuplicatePipelineId { .. }
                | WorkloadError::UnableToLoadExternalConfig { .. }
                | WorkloadError::QueueTypeNotImplemented { .. }
                | WorkloadError::InvalidConfig { .. }
        )
    }
}
