//! Elastic thread pool implementation

use crate::core::{BoxedJob, Job, Result, WorkloadError};
use crate::pool::worker::Worker;
use crate::queue::{BoundedQueue, JobQueue, QueueError};
use crossbeam_utils::CachePadded;
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// How long `Drop` waits for busy workers before giving up on them.
const DROP_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration for thread pool
#[derive(Clone, Debug)]
pub struct ThreadPoolConfig {
    /// Workers kept alive even when idle
    pub core_threads: usize,
    /// Upper bound of concurrently running workers
    pub max_threads: usize,
    /// Idle time after which workers above the core count retire
    pub keep_alive: Duration,
    /// Capacity of the admission queue
    pub queue_capacity: usize,
    /// Thread name prefix
    pub thread_name_prefix: String,
    /// Worker poll interval for checking new jobs, shutdown and keep-alive.
    /// Default: 50ms
    pub poll_interval: Duration,
}

impl Default for ThreadPoolConfig {
    fn default() -> Self {
        Self {
            core_threads: 1,
            max_threads: 1,
            keep_alive: Duration::from_secs(60),
            queue_capacity: 50,
            thread_name_prefix: "worker".to_string(),
            poll_interval: Duration::from_millis(50),
        }
    }
}

impl ThreadPoolConfig {
    /// Create a configuration with `core_threads` core workers and at most
    /// `max(core_threads, max_threads)` workers.
    #[must_use]
    pub fn new(core_threads: usize, max_threads: usize) -> Self {
        Self {
            core_threads,
            max_threads: core_threads.max(max_threads),
            ..Default::default()
        }
    }

    /// Set the idle time after which non-core workers retire
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_keep_alive(mut self, keep_alive: Duration) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    /// Set admission queue capacity
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Set thread name prefix
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_thread_name_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// Set the worker poll interval.
    ///
    /// # Panics
    ///
    /// Panics if interval is zero.
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        assert!(!interval.is_zero(), "poll interval must be non-zero");
        self.poll_interval = interval;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_threads == 0 {
            return Err(WorkloadError::invalid_config(
                "max_threads",
                "at least one worker thread must be allowed",
            ));
        }
        if self.max_threads < self.core_threads {
            return Err(WorkloadError::invalid_config(
                "max_threads",
                format!(
                    "max_threads ({}) is below core_threads ({})",
                    self.max_threads, self.core_threads
                ),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(WorkloadError::invalid_config(
                "queue_capacity",
                "queue capacity must be greater than 0",
            ));
        }
        Ok(())
    }
}

/// Lock-free counters of a pool
#[derive(Debug, Default)]
pub struct PoolCounters {
    submitted: CachePadded<AtomicU64>,
    active: CachePadded<AtomicUsize>,
    completed: AtomicU64,
    failed: AtomicU64,
    panicked: AtomicU64,
}

impl PoolCounters {
    pub(crate) fn increment_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn job_started(&self) {
        self.active.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn job_finished(&self) {
        self.completed.fetch_add(1, Ordering::AcqRel);
        self.active.fetch_sub(1, Ordering::AcqRel);
    }

    pub(crate) fn increment_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn increment_panicked(&self) {
        self.panicked.fetch_add(1, Ordering::Relaxed);
    }

    /// Jobs accepted by the pool
    pub fn get_submitted(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }

    /// Workers currently running a job
    pub fn get_active(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    /// Jobs that ran to an end, successful or not
    pub fn get_completed(&self) -> u64 {
        self.completed.load(Ordering::Acquire)
    }

    /// Jobs that returned an error
    pub fn get_failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    /// Jobs that panicked
    pub fn get_panicked(&self) -> u64 {
        self.panicked.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Default)]
struct PoolState {
    pool_size: usize,
    largest_pool_size: usize,
    next_worker_id: usize,
}

/// State shared between the pool handle and its workers
pub(crate) struct PoolShared {
    pub(crate) config: ThreadPoolConfig,
    pub(crate) queue: Arc<dyn JobQueue>,
    pub(crate) counters: PoolCounters,
    running: AtomicBool,
    state: Mutex<PoolState>,
    workers_exited: Condvar,
}

impl PoolShared {
    /// Retires an idle worker if the pool is above its core size.
    pub(crate) fn try_retire(&self) -> bool {
        let mut state = self.state.lock();
        let above_core = state.pool_size > self.config.core_threads;
        // The last worker stays while work is queued.
        if above_core && (state.pool_size > 1 || self.queue.is_empty()) {
            state.pool_size -= 1;
            self.workers_exited.notify_all();
            true
        } else {
            false
        }
    }

    /// Accounts for a worker leaving after the queue was closed.
    pub(crate) fn worker_exited(&self) {
        let mut state = self.state.lock();
        state.pool_size = state.pool_size.saturating_sub(1);
        self.workers_exited.notify_all();
    }
}

/// A bounded thread pool with an admission queue
///
/// # Admission
///
/// 1. Fewer than `core_threads` workers: a new worker starts with the job.
/// 2. Otherwise the job is offered to the queue.
/// 3. Queue full: a new worker starts with the job if below `max_threads`.
/// 4. Otherwise the job is rejected with [`WorkloadError::QueueFull`].
///
/// Submission never blocks. Workers are started lazily and workers above the
/// core count retire after `keep_alive` without work.
pub struct ThreadPool {
    shared: Arc<PoolShared>,
}

impl std::fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadPool")
            .field("config", &self.shared.config)
            .field("running", &self.is_running())
            .field("pool_size", &self.pool_size())
            .field("counters", &self.shared.counters)
            .finish()
    }
}

impl ThreadPool {
    /// Create a thread pool with custom configuration
    pub fn new(config: ThreadPoolConfig) -> Result<Self> {
        config.validate()?;
        let queue: Arc<dyn JobQueue> = Arc::new(BoundedQueue::new(config.queue_capacity));

        Ok(Self {
            shared: Arc::new(PoolShared {
                config,
                queue,
                counters: PoolCounters::default(),
                running: AtomicBool::new(true),
                state: Mutex::new(PoolState::default()),
                workers_exited: Condvar::new(),
            }),
        })
    }

    /// Submit a job without blocking
    ///
    /// # Errors
    ///
    /// - `WorkloadError::QueueFull` - Queue is at capacity and no worker can be added
    /// - `WorkloadError::NotRunning` - Pool was shut down
    /// - `WorkloadError::SpawnError` - A needed worker thread could not be started
    pub fn try_execute<J: Job + 'static>(&self, job: J) -> Result<()> {
        self.try_submit_boxed(Box::new(job))
    }

    /// Submit a boxed job without blocking
    pub fn try_submit_boxed(&self, job: BoxedJob) -> Result<()> {
        if !self.is_running() {
            return Err(WorkloadError::not_running(&self.shared.config.thread_name_prefix));
        }

        let job = {
            let mut state = self.shared.state.lock();
            if state.pool_size < self.shared.config.core_threads {
                self.add_worker(&mut state, Some(job))?;
                self.shared.counters.increment_submitted();
                return Ok(());
            }
            job
        };

        match self.shared.queue.try_send(job) {
            Ok(()) => {
                self.shared.counters.increment_submitted();
                let mut state = self.shared.state.lock();
                if state.pool_size == 0 {
                    self.add_worker(&mut state, None)?;
                }
                Ok(())
            }
            Err(QueueError::Full(holder)) => {
                let mut state = self.shared.state.lock();
                match holder.take() {
                    Some(job) if state.pool_size < self.shared.config.max_threads => {
                        self.add_worker(&mut state, Some(job))?;
                        self.shared.counters.increment_submitted();
                        Ok(())
                    }
                    _ => Err(WorkloadError::queue_full(
                        self.shared.queue.len(),
                        self.shared.queue.capacity(),
                    )),
                }
            }
            Err(QueueError::Closed(_)) => Err(WorkloadError::shutting_down(self.shared.queue.len())),
            Err(e) => Err(WorkloadError::other(e.to_string())),
        }
    }

    fn add_worker(&self, state: &mut PoolState, first_task: Option<BoxedJob>) -> Result<()> {
        let id = state.next_worker_id;
        state.next_worker_id += 1;
        state.pool_size += 1;

        if let Err(e) = Worker::spawn(id, Arc::clone(&self.shared), first_task) {
            state.pool_size -= 1;
            return Err(e);
        }
        state.largest_pool_size = state.largest_pool_size.max(state.pool_size);
        Ok(())
    }

    /// Check if the pool accepts work
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// Current number of worker threads
    pub fn pool_size(&self) -> usize {
        self.shared.state.lock().pool_size
    }

    /// Highest number of worker threads seen at once
    pub fn largest_pool_size(&self) -> usize {
        self.shared.state.lock().largest_pool_size
    }

    /// Configured core worker count
    pub fn core_pool_size(&self) -> usize {
        self.shared.config.core_threads
    }

    /// Configured maximum worker count
    pub fn maximum_pool_size(&self) -> usize {
        self.shared.config.max_threads
    }

    /// Idle time after which non-core workers retire
    pub fn keep_alive(&self) -> Duration {
        self.shared.config.keep_alive
    }

    /// Workers currently running a job
    pub fn active_count(&self) -> usize {
        self.shared.counters.get_active()
    }

    /// Get current queue size
    pub fn queue_size(&self) -> usize {
        self.shared.queue.len()
    }

    /// Queue capacity
    pub fn queue_capacity(&self) -> usize {
        self.shared.queue.capacity()
    }

    /// Free queue slots
    pub fn remaining_queue_capacity(&self) -> usize {
        self.shared.queue.remaining_capacity()
    }

    /// Jobs that ran to an end
    pub fn completed_task_count(&self) -> u64 {
        self.shared.counters.get_completed()
    }

    /// Jobs accepted by the pool
    pub fn task_count(&self) -> u64 {
        self.shared.counters.get_submitted()
    }

    /// Jobs that returned an error
    pub fn failed_task_count(&self) -> u64 {
        self.shared.counters.get_failed()
    }

    /// Jobs that panicked
    pub fn panicked_task_count(&self) -> u64 {
        self.shared.counters.get_panicked()
    }

    /// True when no queue slot is left and every permitted worker is busy
    pub fn is_saturated(&self) -> bool {
        self.remaining_queue_capacity() == 0 && self.active_count() >= self.maximum_pool_size()
    }

    /// Shutdown the thread pool and wait for all workers to finish
    ///
    /// Stops accepting jobs, closes the queue and waits until workers have
    /// drained it. Calling it again is a no-op.
    pub fn shutdown(&self) -> Result<()> {
        self.shutdown_timeout(None)
    }

    /// Shutdown, waiting at most `timeout` for workers to exit
    ///
    /// # Errors
    ///
    /// Returns `WorkloadError::Other` if workers were still running when the
    /// timeout elapsed.
    pub fn shutdown_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        if self
            .shared
            .running
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            self.shared.queue.close();
        }

        let deadline = timeout.map(|t| Instant::now() + t);
        let mut state = self.shared.state.lock();
        while state.pool_size > 0 {
            match deadline {
                Some(deadline) => {
                    if self
                        .shared
                        .workers_exited
                        .wait_until(&mut state, deadline)
                        .timed_out()
                    {
                        return Err(WorkloadError::other(format!(
                            "Thread pool '{}' still has {} workers after shutdown timeout",
                            self.shared.config.thread_name_prefix, state.pool_size
                        )));
                    }
                }
                None => self.shared.workers_exited.wait(&mut state),
            }
        }
        Ok(())
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown_timeout(Some(DROP_SHUTDOWN_TIMEOUT)) {
            log::error!("Failed to shutdown thread pool during drop: {}", e);
        }
    }
}
