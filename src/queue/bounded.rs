//! Bounded FIFO queue with capacity limit.

use super::{BoxedJobHolder, JobQueue, QueueError, QueueResult};
use crate::core::BoxedJob;
use crossbeam::channel::{self, Receiver, Sender, TrySendError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// A bounded FIFO queue with configurable capacity.
///
/// Receivers are served in arrival order, so queued work leaves the queue in
/// submission order.
///
/// # Example
///
/// ```rust
/// use workload_pipelines::queue::{BoundedQueue, JobQueue, QueueError};
/// use workload_pipelines::core::ClosureJob;
///
/// let queue = BoundedQueue::new(1);
/// queue.try_send(Box::new(ClosureJob::new(|| Ok(())))).unwrap();
///
/// match queue.try_send(Box::new(ClosureJob::new(|| Ok(())))) {
///     Err(QueueError::Full(_)) => println!("Queue is full"),
///     _ => panic!("expected Full error"),
/// }
/// assert_eq!(queue.remaining_capacity(), 0);
/// ```
pub struct BoundedQueue {
    sender: Sender<BoxedJob>,
    receiver: Receiver<BoxedJob>,
    capacity: usize,
    closed: AtomicBool,
}

impl BoundedQueue {
    /// Creates a new bounded queue with the specified capacity.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0. Pipeline configs are validated before a
    /// queue is built.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must be greater than 0");
        let (sender, receiver) = channel::bounded(capacity);
        Self {
            sender,
            receiver,
            capacity,
            closed: AtomicBool::new(false),
        }
    }
}

impl std::fmt::Debug for BoundedQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedQueue")
            .field("capacity", &self.capacity)
            .field("len", &self.receiver.len())
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}

impl JobQueue for BoundedQueue {
    fn try_send(&self, job: BoxedJob) -> QueueResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(QueueError::Closed(BoxedJobHolder::new(job)));
        }
        self.sender.try_send(job).map_err(|e| match e {
            TrySendError::Full(job) => QueueError::Full(BoxedJobHolder::new(job)),
            TrySendError::Disconnected(job) => QueueError::Closed(BoxedJobHolder::new(job)),
        })
    }

    fn recv_timeout(&self, timeout: Duration) -> QueueResult<BoxedJob> {
        if self.closed.load(Ordering::SeqCst) && self.receiver.is_empty() {
            return Err(QueueError::Disconnected);
        }

        match self.receiver.recv_timeout(timeout) {
            Ok(job) => Ok(job),
            Err(channel::RecvTimeoutError::Timeout) => {
                if self.closed.load(Ordering::SeqCst) && self.receiver.is_empty() {
                    Err(QueueError::Disconnected)
                } else {
                    Err(QueueError::Empty)
                }
            }
            Err(channel::RecvTimeoutError::Disconnected) => Err(QueueError::Disconnected),
        }
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn len(&self) -> usize {
        self.receiver.len()
    }

    fn capacity(&self) -> usize {
        self.capacity
    }
}
