//! Worker thread implementation

use crate::core::{BoxedJob, Result, WorkloadError};
use crate::pool::thread_pool::PoolShared;
use crate::queue::QueueError;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[cfg(feature = "tracing")]
use tracing::{debug, span, Level};

/// Lower bound for queue waits so a zero keep-alive does not spin.
const MIN_WAIT: Duration = Duration::from_millis(1);

/// A worker thread that processes jobs from the pool queue
///
/// The thread is detached; the pool tracks live workers through its shared
/// state and waits for them on shutdown.
pub(crate) struct Worker {
    id: usize,
    shared: Arc<PoolShared>,
}

impl Worker {
    /// Start a worker, optionally handing it its first job
    ///
    /// # Shutdown Behavior
    ///
    /// Workers exit when the queue is closed and empty,
    /// ensuring all queued jobs are processed before shutdown completes.
    pub(crate) fn spawn(
        id: usize,
        shared: Arc<PoolShared>,
        first_task: Option<BoxedJob>,
    ) -> Result<()> {
        let name = format!("{}-{}", shared.config.thread_name_prefix, id);
        let worker = Self { id, shared };

        thread::Builder::new()
            .name(name)
            .spawn(move || worker.run(first_task))
            .map(|_| ())
            .map_err(|e| WorkloadError::spawn_with_source(id, "Cannot create worker thread", e))
    }

    /// Main worker loop
    fn run(self, first_task: Option<BoxedJob>) {
        #[cfg(feature = "tracing")]
        let worker_span = span!(Level::DEBUG, "worker", id = self.id);
        #[cfg(feature = "tracing")]
        let _guard = worker_span.enter();

        log::trace!("worker {} started", self.id);

        let mut next = first_task;
        loop {
            let job = match next.take() {
                Some(job) => job,
                None => match self.next_job() {
                    Some(job) => job,
                    None => break,
                },
            };
            self.execute_job(job);
        }

        log::trace!("worker {} stopped", self.id);
    }

    /// Wait for the next job; `None` means this worker has been removed from the pool
    fn next_job(&self) -> Option<BoxedJob> {
        let keep_alive = self.shared.config.keep_alive;
        let wait = self.shared.config.poll_interval.min(keep_alive).max(MIN_WAIT);
        let mut idle_since = Instant::now();

        loop {
            match self.shared.queue.recv_timeout(wait) {
                Ok(job) => return Some(job),
                Err(QueueError::Empty) => {
                    if idle_since.elapsed() >= keep_alive {
                        if self.shared.try_retire() {
                            log::debug!(
                                "worker {} retired after {}ms idle",
                                self.id,
                                keep_alive.as_millis()
                            );
                            return None;
                        }
                        idle_since = Instant::now();
                    }
                }
                Err(_) => {
                    #[cfg(feature = "tracing")]
                    debug!(
                        completed = self.shared.counters.get_completed(),
                        "worker shutting down"
                    );
                    self.shared.worker_exited();
                    return None;
                }
            }
        }
    }

    /// Execute a single job with panic protection
    fn execute_job(&self, mut job: BoxedJob) {
        #[cfg(feature = "tracing")]
        let job_span = span!(Level::DEBUG, "job_execution", job_type = job.job_type());
        #[cfg(feature = "tracing")]
        let _job_guard = job_span.enter();

        let counters = &self.shared.counters;
        counters.job_started();
        let start = Instant::now();

        let outcome = catch_unwind(AssertUnwindSafe(|| job.execute()));
        let elapsed = start.elapsed();

        match outcome {
            Ok(Ok(())) => {
                #[cfg(feature = "tracing")]
                crate::tracing::metrics::record_execution(elapsed, true);
            }
            Ok(Err(e @ WorkloadError::MaximumLatencyExceeded { .. })) => {
                // already reported to the request's error handler
                log::debug!("worker {}: {}", self.id, e);
            }
            Ok(Err(e)) => {
                log::warn!(
                    "worker {}: job '{}' failed after {}ms: {}",
                    self.id,
                    job.job_type(),
                    elapsed.as_millis(),
                    e
                );
                #[cfg(feature = "tracing")]
                crate::tracing::metrics::record_execution(elapsed, false);
                counters.increment_failed();
            }
            Err(panic_info) => {
                let panic_msg = if let Some(s) = panic_info.downcast_ref::<&str>() {
                    s.to_string()
                } else if let Some(s) = panic_info.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "Unknown panic".to_string()
                };
                log::error!(
                    "worker {}: job '{}' panicked: {}",
                    self.id,
                    job.job_type(),
                    panic_msg
                );
                #[cfg(feature = "tracing")]
                crate::tracing::metrics::record_panic(elapsed);
                counters.increment_panicked();
            }
        }

        counters.job_finished();
    }
}
