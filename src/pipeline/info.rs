//! Read-only statistics of a pipeline.

use crate::pipeline::admission::PipelineShared;
use crate::pipeline::config::QueueType;
use crate::pipeline::stats::QueueLatency;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Live view of a pipeline's statistics.
///
/// Cloning is cheap. Every getter reads the current state; use
/// [`PipelineInfo::snapshot`] for a frozen, serialisable copy.
#[derive(Clone)]
pub struct PipelineInfo {
    shared: Arc<PipelineShared>,
}

impl PipelineInfo {
    pub(crate) fn new(shared: Arc<PipelineShared>) -> Self {
        Self { shared }
    }

    /// Pipeline id
    pub fn id(&self) -> &str {
        &self.shared.id
    }

    /// Display name
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Description from the configuration
    pub fn description(&self) -> &str {
        &self.shared.config.description
    }

    /// True for the default pipeline
    pub fn is_default(&self) -> bool {
        self.shared.config.default_pipeline
    }

    /// Configured queue policy
    pub fn queue_type(&self) -> QueueType {
        self.shared.config.queue_type
    }

    /// Requested thread priority; not applied to OS threads
    pub fn thread_priority(&self) -> u8 {
        self.shared.config.thread_priority
    }

    /// Maximum queuing latency, `None` when disabled
    pub fn max_latency(&self) -> Option<Duration> {
        self.shared.max_latency
    }

    /// Current number of workers
    pub fn pool_size(&self) -> usize {
        self.shared.pool.pool_size()
    }

    /// Configured core worker count
    pub fn core_pool_size(&self) -> usize {
        self.shared.pool.core_pool_size()
    }

    /// Effective maximum worker count
    pub fn maximum_pool_size(&self) -> usize {
        self.shared.pool.maximum_pool_size()
    }

    /// Highest worker count seen so far
    pub fn largest_pool_size(&self) -> usize {
        self.shared.pool.largest_pool_size()
    }

    /// Workers currently running a request
    pub fn active_count(&self) -> usize {
        self.shared.pool.active_count()
    }

    /// Idle time after which non-core workers retire
    pub fn keep_alive_time(&self) -> Duration {
        self.shared.pool.keep_alive()
    }

    /// Free queue slots
    pub fn remaining_queue_capacity(&self) -> usize {
        self.shared.pool.remaining_queue_capacity()
    }

    /// Requests waiting in the queue
    pub fn queue_size(&self) -> usize {
        self.shared.pool.queue_size()
    }

    /// Requests a worker finished with, including discarded and panicked ones
    pub fn completed_task_count(&self) -> u64 {
        self.shared.pool.completed_task_count()
    }

    /// Requests accepted by the pool
    pub fn task_count(&self) -> u64 {
        self.shared.pool.task_count()
    }

    /// Requests refused because the queue was full
    pub fn rejected_count(&self) -> u64 {
        self.shared.counters.rejected()
    }

    /// Requests discarded by the latency gate
    pub fn latency_exceeded_count(&self) -> u64 {
        self.shared.counters.latency_exceeded()
    }

    /// Commands that panicked
    pub fn failed_count(&self) -> u64 {
        self.shared.pool.panicked_task_count()
    }

    /// Queuing latency of requests that ran
    pub fn queue_latency(&self) -> QueueLatency {
        self.shared.counters.queue_latency()
    }

    /// True when no queue slot is left and every permitted worker is busy
    pub fn is_saturated(&self) -> bool {
        self.shared.pool.is_saturated()
    }

    /// Point-in-time copy of all statistics
    pub fn snapshot(&self) -> PipelineStats {
        let latency = self.queue_latency();
        PipelineStats {
            id: self.id().to_string(),
            name: self.name().to_string(),
            description: self.description().to_string(),
            default_pipeline: self.is_default(),
            queue_type: self.queue_type(),
            thread_priority: self.thread_priority(),
            pool_size: self.pool_size(),
            core_pool_size: self.core_pool_size(),
            maximum_pool_size: self.maximum_pool_size(),
            largest_pool_size: self.largest_pool_size(),
            active_count: self.active_count(),
            keep_alive_ms: duration_millis(self.keep_alive_time()),
            remaining_queue_capacity: self.remaining_queue_capacity(),
            queue_size: self.queue_size(),
            completed_task_count: self.completed_task_count(),
            task_count: self.task_count(),
            rejected_count: self.rejected_count(),
            latency_exceeded_count: self.latency_exceeded_count(),
            failed_count: self.failed_count(),
            max_latency_ms: self.max_latency().map(duration_millis),
            latency_samples: latency.samples,
            average_latency_ms: latency.average.as_secs_f64() * 1_000.0,
            max_observed_latency_ms: latency.max.as_secs_f64() * 1_000.0,
            captured_at: Utc::now(),
        }
    }
}

impl fmt::Debug for PipelineInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineInfo")
            .field("id", &self.id())
            .field("pool_size", &self.pool_size())
            .field("queue_size", &self.queue_size())
            .field("completed_task_count", &self.completed_task_count())
            .field("rejected_count", &self.rejected_count())
            .field("latency_exceeded_count", &self.latency_exceeded_count())
            .finish()
    }
}

fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Frozen pipeline statistics for exporters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineStats {
    /// Pipeline id
    pub id: String,
    /// Display name
    pub name: String,
    /// Description
    pub description: String,
    /// True for the default pipeline
    pub default_pipeline: bool,
    /// Queue policy
    pub queue_type: QueueType,
    /// Requested thread priority
    pub thread_priority: u8,
    /// Current number of workers
    pub pool_size: usize,
    /// Core worker count
    pub core_pool_size: usize,
    /// Maximum worker count
    pub maximum_pool_size: usize,
    /// Highest worker count seen
    pub largest_pool_size: usize,
    /// Workers running a request
    pub active_count: usize,
    /// Keep-alive of non-core workers in milliseconds
    pub keep_alive_ms: u64,
    /// Free queue slots
    pub remaining_queue_capacity: usize,
    /// Requests waiting in the queue
    pub queue_size: usize,
    /// Requests a worker finished with
    pub completed_task_count: u64,
    /// Requests accepted by the pool
    pub task_count: u64,
    /// Requests refused because the queue was full
    pub rejected_count: u64,
    /// Requests discarded by the latency gate
    pub latency_exceeded_count: u64,
    /// Commands that panicked
    pub failed_count: u64,
    /// Maximum queuing latency in milliseconds, absent when disabled
    pub max_latency_ms: Option<u64>,
    /// Requests whose queuing latency was recorded
    pub latency_samples: u64,
    /// Mean queuing latency in milliseconds
    pub average_latency_ms: f64,
    /// Longest queuing latency in milliseconds
    pub max_observed_latency_ms: f64,
    /// Capture time
    pub captured_at: DateTime<Utc>,
}
