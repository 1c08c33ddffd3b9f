//! Helpers shared by the integration tests

#![allow(dead_code)]

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};
use workload_pipelines::prelude::*;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Records every callback it receives
#[derive(Default)]
pub struct RecordingHandler {
    pub rejected: Mutex<Vec<(RequestKey, WorkloadError)>>,
    pub latency_exceeded: Mutex<Vec<(RequestKey, WorkloadError)>>,
}

impl RecordingHandler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn rejected_keys(&self) -> Vec<String> {
        self.rejected.lock().iter().map(|(key, _)| key.key()).collect()
    }

    pub fn latency_exceeded_keys(&self) -> Vec<String> {
        self.latency_exceeded
            .lock()
            .iter()
            .map(|(key, _)| key.key())
            .collect()
    }
}

impl WorkloadErrorHandler<RequestKey> for RecordingHandler {
    fn request_rejected(&self, key: &RequestKey, cause: WorkloadError) {
        self.rejected.lock().push((key.clone(), cause));
    }

    fn maximum_latency_exceeded(&self, key: &RequestKey, cause: WorkloadError) {
        self.latency_exceeded.lock().push((key.clone(), cause));
    }
}

/// One-shot gate that keeps commands running until released
#[derive(Clone, Default)]
pub struct Latch {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl Latch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn wait(&self) {
        let (lock, cv) = &*self.inner;
        let mut open = lock.lock();
        while !*open {
            cv.wait(&mut open);
        }
    }

    pub fn release(&self) {
        let (lock, cv) = &*self.inner;
        *lock.lock() = true;
        cv.notify_all();
    }
}

/// Polls `condition` until it holds or a second has passed
pub fn wait_until(condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(1);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}
