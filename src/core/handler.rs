//! Callback interface for per-request admission failures

use crate::core::error::WorkloadError;
use crate::core::key::RequestTypeKey;

/// Receives admission failures of requests handed to a pipeline.
///
/// Both callbacks may run on the submitting thread (queue-full rejection) or
/// on a pool worker (latency violation). Implementations must not block.
pub trait WorkloadErrorHandler<K: RequestTypeKey>: Send + Sync {
    /// The pipeline queue was full and the request was not accepted.
    fn request_rejected(&self, key: &K, cause: WorkloadError);

    /// The request waited longer than the pipeline's maximum latency and was discarded.
    fn maximum_latency_exceeded(&self, key: &K, cause: WorkloadError);
}

/// Handler that only logs admission failures.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingErrorHandler;

impl<K: RequestTypeKey> WorkloadErrorHandler<K> for LoggingErrorHandler {
    fn request_rejected(&self, key: &K, cause: WorkloadError) {
        log::warn!("request '{}' rejected: {}", key.key(), cause);
    }

    fn maximum_latency_exceeded(&self, key: &K, cause: WorkloadError) {
        log::warn!("request '{}' discarded: {}", key.key(), cause);
    }
}
