//! Admission counters of a pipeline.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Queuing latency observed by the latency gate for requests that ran.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueLatency {
    /// Number of recorded requests
    pub samples: u64,
    /// Mean time between admission and execution
    pub average: Duration,
    /// Longest time between admission and execution
    pub max: Duration,
}

/// Counters updated by submitters (rejections) and workers (latency gate).
///
/// Kept apart from the pool so that queued jobs do not keep the pool alive.
#[derive(Debug, Default)]
pub(crate) struct PipelineCounters {
    rejected: AtomicU64,
    latency_exceeded: AtomicU64,
    latency_tracker: Mutex<LatencyTracker>,
}

impl PipelineCounters {
    pub(crate) fn record_rejection(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_latency_exceeded(&self) {
        self.latency_exceeded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_queue_latency(&self, latency: Duration) {
        self.latency_tracker.lock().record(latency);
    }

    pub(crate) fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    pub(crate) fn latency_exceeded(&self) -> u64 {
        self.latency_exceeded.load(Ordering::Relaxed)
    }

    pub(crate) fn queue_latency(&self) -> QueueLatency {
        let tracker = self.latency_tracker.lock();
        QueueLatency {
            samples: tracker.count,
            average: tracker.avg_latency(),
            max: tracker.max_latency,
        }
    }
}

#[derive(Debug, Default)]
struct LatencyTracker {
    total_time: Duration,
    max_latency: Duration,
    count: u64,
}

impl LatencyTracker {
    fn record(&mut self, duration: Duration) {
        self.total_time = self.total_time.saturating_add(duration);
        self.max_latency = self.max_latency.max(duration);
        self.count += 1;
    }

    fn avg_latency(&self) -> Duration {
        match u32::try_from(self.count) {
            Ok(0) => Duration::ZERO,
            Ok(count) => self.total_time / count,
            Err(_) => Duration::from_nanos(
                u64::try_from(self.total_time.as_nanos() / u128::from(self.count)).unwrap_or(u64::MAX),
            ),
        }
    }
}
