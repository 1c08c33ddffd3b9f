//! Tracing integration for observability.
//!
//! With the `tracing` feature enabled, pipelines emit structured events for
//! every admission decision and the span active at submission time is carried
//! over to the worker that runs the request.
//!
//! # Example
//!
//! ```rust,ignore
//! use tracing_subscriber::{fmt, prelude::*, EnvFilter};
//!
//! tracing_subscriber::registry()
//!     .with(fmt::layer())
//!     .with(EnvFilter::from_default_env()
//!         .add_directive("workload_pipelines=trace".parse().unwrap()))
//!     .init();
//!
//! let span = tracing::info_span!("request", id = 42);
//! let _guard = span.enter();
//! router.execute(&key, handler, || handle())?; // runs inside "request"
//! ```

use crate::core::{Job, Result};

/// A job wrapper that propagates tracing context across thread boundaries.
///
/// The current span is captured when the wrapper is created and entered when
/// the job executes. Without the `tracing` feature it only forwards.
pub struct TracedJob<J: Job> {
    inner: J,
    #[cfg(feature = "tracing")]
    span: tracing::Span,
}

impl<J: Job> TracedJob<J> {
    /// Wraps `job`, capturing the current span.
    pub fn new(job: J) -> Self {
        Self {
            inner: job,
            #[cfg(feature = "tracing")]
            span: tracing::Span::current(),
        }
    }

    /// Wraps `job` with an explicit span.
    #[cfg(feature = "tracing")]
    pub fn with_span(job: J, span: tracing::Span) -> Self {
        Self { inner: job, span }
    }
}

impl<J: Job> Job for TracedJob<J> {
    fn execute(&mut self) -> Result<()> {
        #[cfg(feature = "tracing")]
        let _guard = self.span.enter();
        self.inner.execute()
    }

    fn job_type(&self) -> &str {
        self.inner.job_type()
    }
}

/// Metrics recording functions for observability.
///
/// These functions emit tracing events that can be consumed by
/// metrics collection systems like Prometheus via tracing-opentelemetry.
#[cfg(feature = "tracing")]
pub mod metrics {
    use std::time::Duration;

    /// Records a pipeline being built.
    #[inline]
    pub fn record_pipeline_created(pipeline: &str, core_threads: usize, max_threads: usize, queue_type: &str) {
        tracing::info!(
            pipeline = pipeline,
            core_threads = core_threads,
            max_threads = max_threads,
            queue_type = queue_type,
            "pipeline created"
        );
    }

    /// Records a request accepted by a pipeline.
    #[inline]
    pub fn record_admission(pipeline: &str, queue_depth: usize) {
        tracing::trace!(
            counter.requests_admitted = 1,
            gauge.queue_depth = queue_depth as i64,
            pipeline = pipeline,
            "request admitted"
        );
    }

    /// Records a request refused because the queue was full.
    #[inline]
    pub fn record_rejection(pipeline: &str, key: &str) {
        tracing::debug!(
            counter.requests_rejected = 1,
            pipeline = pipeline,
            key = key,
            "request rejected"
        );
    }

    /// Records a request discarded by the latency gate.
    #[inline]
    pub fn record_latency_exceeded(pipeline: &str, key: &str, overshoot: Duration) {
        tracing::debug!(
            counter.requests_latency_exceeded = 1,
            pipeline = pipeline,
            key = key,
            overshoot_ms = overshoot.as_millis() as u64,
            "maximum latency exceeded"
        );
    }

    /// Records the queuing latency of a request about to run.
    #[inline]
    pub fn record_queue_latency(pipeline: &str, key: &str, latency: Duration) {
        tracing::trace!(
            histogram.queue_latency_ms = latency.as_millis() as u64,
            pipeline = pipeline,
            key = key,
            "executing request"
        );
    }

    /// Records job completion with timing.
    #[inline]
    pub fn record_execution(duration: Duration, success: bool) {
        let duration_ms = duration.as_millis() as u64;
        if success {
            tracing::trace!(
                counter.requests_completed = 1,
                histogram.execution_ms = duration_ms,
                "request completed"
            );
        } else {
            tracing::trace!(
                counter.requests_failed = 1,
                histogram.execution_ms = duration_ms,
                "request failed"
            );
        }
    }

    /// Records a command panic.
    #[inline]
    pub fn record_panic(duration: Duration) {
        tracing::trace!(
            counter.requests_panicked = 1,
            histogram.execution_ms = duration.as_millis() as u64,
            "request panicked"
        );
    }
}
