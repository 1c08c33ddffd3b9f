//! Load shedding example
//!
//! Floods a small pipeline and shows the two ways requests are shed: rejection
//! at admission when the pipeline is saturated, and discarding at execution
//! when a request waited longer than the maximum latency.
//!
//! Run with: RUST_LOG=warn cargo run --example load_shedding

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use workload_pipelines::prelude::*;

/// Counts shed requests per cause
#[derive(Default)]
struct SheddingCounter {
    rejected: AtomicUsize,
    too_late: AtomicUsize,
}

impl WorkloadErrorHandler<RequestKey> for SheddingCounter {
    fn request_rejected(&self, key: &RequestKey, cause: WorkloadError) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
        log::warn!("rejected {}: {}", key, cause);
    }

    fn maximum_latency_exceeded(&self, key: &RequestKey, cause: WorkloadError) {
        self.too_late.fetch_add(1, Ordering::Relaxed);
        log::warn!("discarded {}: {}", key, cause);
    }
}

fn main() -> Result<()> {
    env_logger::init();
    println!("=== Workload Pipelines - Load Shedding Example ===\n");

    let pipeline = Pipeline::new(
        "Checkout",
        PipelineConfig::new(2)
            .with_max_threads(3)
            .with_max_queue_depth(5)
            .with_max_latency(100),
    )?;
    let counter = Arc::new(SheddingCounter::default());
    let handler: Arc<dyn WorkloadErrorHandler<RequestKey>> = counter.clone();
    let executed = Arc::new(AtomicUsize::new(0));

    println!("1. Submitting 20 requests of 60ms each");
    for i in 0..20 {
        let executed = Arc::clone(&executed);
        pipeline.execute(
            RequestKey::rest(format!("api/checkout/{}", i), HttpMethod::Post),
            Arc::clone(&handler),
            move || {
                thread::sleep(Duration::from_millis(60));
                executed.fetch_add(1, Ordering::Relaxed);
            },
        );
    }

    let info = pipeline.info();
    println!(
        "   pool size: {}, queued: {}, saturated: {}",
        info.pool_size(),
        info.queue_size(),
        pipeline.is_saturated()
    );

    pipeline.shutdown()?;

    println!("\n2. Outcome:");
    println!("   Executed:          {}", executed.load(Ordering::Relaxed));
    println!("   Rejected:          {}", counter.rejected.load(Ordering::Relaxed));
    println!("   Latency exceeded:  {}", counter.too_late.load(Ordering::Relaxed));

    let latency = info.queue_latency();
    println!(
        "   Queue latency:     avg {:?}, max {:?} over {} samples",
        latency.average, latency.max, latency.samples
    );

    println!("\n=== Example completed successfully ===");
    Ok(())
}
