//! Latency gate wrapped around every admitted command.

use crate::core::{Command, Job, RequestTypeKey, Result, WorkloadError, WorkloadErrorHandler};
use crate::pipeline::stats::PipelineCounters;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Runs a command only if it did not wait in the queue for too long.
///
/// The gate captures the admission time when it is created. When a worker
/// picks it up, the time spent waiting is compared to the pipeline's maximum
/// latency. Stale commands are dropped without running and reported through
/// [`WorkloadErrorHandler::maximum_latency_exceeded`]. The check happens once;
/// a discarded command is never retried.
pub struct LatencyGate<K: RequestTypeKey> {
    key: K,
    command: Option<Command>,
    pipeline_id: Arc<str>,
    admitted_at: Instant,
    max_latency: Option<Duration>,
    handler: Arc<dyn WorkloadErrorHandler<K>>,
    counters: Arc<PipelineCounters>,
}

impl<K: RequestTypeKey> LatencyGate<K> {
    pub(crate) fn new(
        key: K,
        command: Command,
        pipeline_id: Arc<str>,
        max_latency: Option<Duration>,
        handler: Arc<dyn WorkloadErrorHandler<K>>,
        counters: Arc<PipelineCounters>,
    ) -> Self {
        Self {
            key,
            command: Some(command),
            pipeline_id,
            admitted_at: Instant::now(),
            max_latency,
            handler,
            counters,
        }
    }

    /// Key of the gated request
    pub fn key(&self) -> &K {
        &self.key
    }

    /// Time since admission
    pub fn waited(&self) -> Duration {
        self.admitted_at.elapsed()
    }
}

impl<K: RequestTypeKey> Job for LatencyGate<K> {
    fn execute(&mut self) -> Result<()> {
        let command = self
            .command
            .take()
            .ok_or_else(|| WorkloadError::other("latency gate already executed"))?;
        let latency = self.admitted_at.elapsed();

        if let Some(max_latency) = self.max_latency.filter(|max| latency > *max) {
            drop(command);
            self.counters.record_latency_exceeded();

            let key = self.key.key();
            log::warn!(
                "pipeline '{}' discards request '{}' after {}ms in queue (maximum {}ms)",
                self.pipeline_id,
                key,
                latency.as_millis(),
                max_latency.as_millis()
            );
            #[cfg(feature = "tracing")]
            crate::tracing::metrics::record_latency_exceeded(
                &self.pipeline_id,
                &key,
                latency.saturating_sub(max_latency),
            );

            self.handler.maximum_latency_exceeded(
                &self.key,
                WorkloadError::maximum_latency_exceeded(key.as_str(), latency, max_latency),
            );
            return Err(WorkloadError::maximum_latency_exceeded(key, latency, max_latency));
        }

        log::debug!(
            "executing request '{}' on pipeline '{}' after {}ms",
            self.key.key(),
            self.pipeline_id,
            latency.as_millis()
        );
        #[cfg(feature = "tracing")]
        crate::tracing::metrics::record_queue_latency(&self.pipeline_id, &self.key.key(), latency);

        self.counters.record_queue_latency(latency);
        command();
        Ok(())
    }

    fn job_type(&self) -> &str {
        "LatencyGate"
    }
}
