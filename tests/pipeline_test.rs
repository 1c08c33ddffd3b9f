//! Admission behaviour of single pipelines

mod common;

use common::{init_logging, wait_until, Latch, RecordingHandler};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use workload_pipelines::prelude::*;

fn key(n: usize) -> RequestKey {
    RequestKey::rest(format!("api/item/{}", n), HttpMethod::Get)
}

#[test]
fn test_not_queued_pipeline_rejects_third_request() {
    init_logging();
    let pipeline = Pipeline::new(
        "NoQueuing",
        PipelineConfig::new(1)
            .with_queue_type(QueueType::NotQueued)
            .with_max_latency(100),
    )
    .expect("Failed to create pipeline");
    let handler = RecordingHandler::new();
    let executed = Arc::new(Mutex::new(Vec::new()));

    for n in 0..3 {
        let executed = Arc::clone(&executed);
        pipeline.execute(key(n), handler.clone(), move || {
            thread::sleep(Duration::from_millis(20));
            executed.lock().push(n);
        });
    }

    assert_eq!(handler.rejected_keys(), vec!["api/item/2 (GET)".to_string()]);
    match &handler.rejected.lock()[0].1 {
        WorkloadError::RequestRejected {
            pipeline_id,
            queue_capacity,
            ..
        } => {
            assert_eq!(pipeline_id, "NoQueuing");
            assert_eq!(*queue_capacity, 1);
        }
        other => panic!("unexpected cause: {other}"),
    }

    pipeline.shutdown().expect("Failed to shutdown pipeline");
    assert_eq!(*executed.lock(), vec![0, 1]);

    let info = pipeline.info();
    assert_eq!(info.rejected_count(), 1);
    assert_eq!(info.completed_task_count(), 2);
    assert_eq!(info.latency_exceeded_count(), 0);
}

#[test]
fn test_fifo_pipeline_statistics() {
    init_logging();
    let pipeline = Pipeline::new(
        "FIFOPipeline",
        PipelineConfig::new(2)
            .with_max_threads(5)
            .with_max_queue_depth(40)
            .with_max_latency(1000),
    )
    .expect("Failed to create pipeline");
    let info = pipeline.info();
    assert_eq!(info.pool_size(), 0);
    assert_eq!(info.task_count(), 0);
    assert_eq!(info.remaining_queue_capacity(), 40);

    let handler = RecordingHandler::new();
    // capacity + core + 1 fast commands
    for n in 0..43 {
        pipeline.execute(key(n), handler.clone(), || {});
    }

    pipeline.shutdown().expect("Failed to shutdown pipeline");
    assert!(handler.rejected_keys().is_empty());
    assert_eq!(info.task_count(), 43);
    assert_eq!(info.completed_task_count(), info.task_count());
    assert!(info.largest_pool_size() >= 1 && info.largest_pool_size() <= 5);
    assert_eq!(info.queue_latency().samples, 43);
}

#[test]
fn test_fifo_queue_keeps_submission_order() {
    let pipeline = Pipeline::new("ordered", PipelineConfig::new(1).with_max_queue_depth(10))
        .expect("Failed to create pipeline");
    let handler = RecordingHandler::new();
    let latch = Latch::new();
    let executed = Arc::new(Mutex::new(Vec::new()));

    let blocker = latch.clone();
    pipeline.execute(key(0), handler.clone(), move || blocker.wait());
    for n in 1..=5 {
        let executed = Arc::clone(&executed);
        pipeline.execute(key(n), handler.clone(), move || executed.lock().push(n));
    }
    assert_eq!(pipeline.info().queue_size(), 5);

    latch.release();
    pipeline.shutdown().expect("Failed to shutdown pipeline");
    assert_eq!(*executed.lock(), vec![1, 2, 3, 4, 5]);
}

#[test]
fn test_stale_request_is_discarded() {
    init_logging();
    let pipeline = Pipeline::new("gated", PipelineConfig::new(1).with_max_latency(50))
        .expect("Failed to create pipeline");
    let handler = RecordingHandler::new();
    let stale_ran = Arc::new(AtomicBool::new(false));

    pipeline.execute(key(0), handler.clone(), || thread::sleep(Duration::from_millis(150)));
    let flag = Arc::clone(&stale_ran);
    pipeline.execute(key(1), handler.clone(), move || flag.store(true, Ordering::SeqCst));

    pipeline.shutdown().expect("Failed to shutdown pipeline");
    assert!(!stale_ran.load(Ordering::SeqCst));
    assert_eq!(handler.latency_exceeded_keys(), vec!["api/item/1 (GET)".to_string()]);

    match &handler.latency_exceeded.lock()[0].1 {
        WorkloadError::MaximumLatencyExceeded {
            latency,
            max_latency,
            overshoot,
            ..
        } => {
            assert_eq!(*max_latency, Duration::from_millis(50));
            assert!(*latency > *max_latency);
            assert_eq!(*overshoot, *latency - *max_latency);
        }
        other => panic!("unexpected cause: {other}"),
    }

    let info = pipeline.info();
    assert_eq!(info.latency_exceeded_count(), 1);
    assert_eq!(info.rejected_count(), 0);
    assert_eq!(info.completed_task_count(), 2);
}

#[test]
fn test_disabled_latency_check_runs_stale_requests() {
    let pipeline = Pipeline::new("ungated", PipelineConfig::new(1).with_max_latency(0))
        .expect("Failed to create pipeline");
    let handler = RecordingHandler::new();
    let ran = Arc::new(AtomicBool::new(false));

    pipeline.execute(key(0), handler.clone(), || thread::sleep(Duration::from_millis(80)));
    let flag = Arc::clone(&ran);
    pipeline.execute(key(1), handler.clone(), move || flag.store(true, Ordering::SeqCst));

    pipeline.shutdown().expect("Failed to shutdown pipeline");
    assert!(ran.load(Ordering::SeqCst));
    assert!(handler.latency_exceeded_keys().is_empty());
}

#[test]
fn test_panicking_command_does_not_stop_pipeline() {
    let pipeline =
        Pipeline::new("fragile", PipelineConfig::new(1)).expect("Failed to create pipeline");
    let handler = RecordingHandler::new();
    let ran = Arc::new(AtomicBool::new(false));

    pipeline.execute(key(0), handler.clone(), || panic!("Intentional panic for testing"));
    let flag = Arc::clone(&ran);
    pipeline.execute(key(1), handler.clone(), move || flag.store(true, Ordering::SeqCst));

    pipeline.shutdown().expect("Failed to shutdown pipeline");
    assert!(ran.load(Ordering::SeqCst));
    assert_eq!(pipeline.info().failed_count(), 1);
    assert_eq!(pipeline.info().completed_task_count(), 2);
}

#[test]
fn test_pipeline_grows_to_max_threads_before_rejecting() {
    let pipeline = Pipeline::new(
        "elastic",
        PipelineConfig::new(1)
            .with_max_threads(3)
            .with_max_queue_depth(1),
    )
    .expect("Failed to create pipeline");
    let handler = RecordingHandler::new();
    let latch = Latch::new();

    // core worker, queue slot, two extra workers, then rejection
    for n in 0..5 {
        let latch = latch.clone();
        pipeline.execute(key(n), handler.clone(), move || latch.wait());
    }

    let info = pipeline.info();
    assert_eq!(info.largest_pool_size(), 3);
    assert_eq!(handler.rejected_keys(), vec!["api/item/4 (GET)".to_string()]);
    assert!(wait_until(|| info.active_count() == 3));
    assert!(pipeline.is_saturated());

    latch.release();
    pipeline.shutdown().expect("Failed to shutdown pipeline");
    assert_eq!(info.completed_task_count(), 4);
    assert!(!info.is_saturated());
}

#[test]
fn test_keep_alive_retires_extra_workers() {
    let pipeline = Pipeline::with_poll_interval(
        "shrinking",
        PipelineConfig::new(1)
            .with_max_threads(3)
            .with_max_queue_depth(1)
            .with_keep_alive(50),
        Duration::from_millis(10),
    )
    .expect("Failed to create pipeline");
    let handler = RecordingHandler::new();

    for n in 0..4 {
        pipeline.execute(key(n), handler.clone(), || thread::sleep(Duration::from_millis(30)));
    }
    let info = pipeline.info();
    assert_eq!(info.largest_pool_size(), 3);

    assert!(wait_until(|| info.pool_size() == 1 && info.completed_task_count() == 4));
    pipeline.shutdown().expect("Failed to shutdown pipeline");
}

#[test]
fn test_requests_after_shutdown_are_rejected() {
    let pipeline = Pipeline::new("closed", PipelineConfig::new(1)).expect("Failed to create pipeline");
    pipeline.shutdown().expect("Failed to shutdown pipeline");

    let handler = RecordingHandler::new();
    pipeline.execute(key(0), handler.clone(), || {});
    assert_eq!(handler.rejected_keys().len(), 1);
    assert_eq!(pipeline.info().rejected_count(), 1);
}
