//! Queue abstractions for pipeline admission queues.
//!
//! The pool only ever offers work without blocking ([`JobQueue::try_send`]);
//! a full queue is an admission decision, not a reason to wait.
//!
//! # Built-in Implementations
//!
//! - [`BoundedQueue`]: Bounded FIFO queue with configurable capacity

mod bounded;

pub use bounded::BoundedQueue;

use crate::core::BoxedJob;
use std::time::Duration;

/// Errors that can occur during queue operations.
#[derive(Debug)]
pub enum QueueError {
    /// Queue is at capacity. Contains the rejected job.
    Full(BoxedJobHolder),
    /// Queue is closed and not accepting new jobs. Contains the rejected job.
    Closed(BoxedJobHolder),
    /// No job available within the wait time.
    Empty,
    /// Queue is closed and drained.
    Disconnected,
}

impl std::fmt::Display for QueueError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueueError::Full(_) => write!(f, "queue is full"),
            QueueError::Closed(_) => write!(f, "queue is closed"),
            QueueError::Empty => write!(f, "queue is empty"),
            QueueError::Disconnected => write!(f, "queue is disconnected"),
        }
    }
}

impl std::error::Error for QueueError {}

/// Hands a rejected job back to the submitter.
#[derive(Debug)]
pub struct BoxedJobHolder {
    job: Option<BoxedJob>,
}

impl BoxedJobHolder {
    /// Wraps a rejected job.
    pub fn new(job: BoxedJob) -> Self {
        Self { job: Some(job) }
    }

    /// Takes the job out of the holder.
    pub fn take(mut self) -> Option<BoxedJob> {
        self.job.take()
    }
}

/// Result type for queue operations.
pub type QueueResult<T> = std::result::Result<T, QueueError>;

/// Admission queue shared between submitters and pool workers.
pub trait JobQueue: Send + Sync {
    /// Offers a job without blocking.
    ///
    /// # Errors
    ///
    /// - `QueueError::Full` if the queue is at capacity
    /// - `QueueError::Closed` if the queue is closed
    fn try_send(&self, job: BoxedJob) -> QueueResult<()>;

    /// Waits up to `timeout` for the next job.
    ///
    /// # Errors
    ///
    /// - `QueueError::Empty` if no job arrived in time
    /// - `QueueError::Disconnected` if the queue is closed and drained
    fn recv_timeout(&self, timeout: Duration) -> QueueResult<BoxedJob>;

    /// Stops accepting new jobs. Queued jobs can still be received.
    fn close(&self);

    /// Returns true if the queue is closed.
    fn is_closed(&self) -> bool;

    /// Number of queued jobs.
    fn len(&self) -> usize;

    /// Returns true if no job is queued.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of queued jobs.
    fn capacity(&self) -> usize;

    /// Free slots left.
    fn remaining_capacity(&self) -> usize {
        self.capacity().saturating_sub(self.len())
    }
}
