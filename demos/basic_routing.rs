//! Basic workload routing example
//!
//! Demonstrates routing REST and generic requests to pipelines, key reduction
//! and the default pipeline fallback.
//!
//! Run with: cargo run --example basic_routing

use std::sync::Arc;
use std::thread;
use std::time::Duration;
use workload_pipelines::prelude::*;

fn main() -> Result<()> {
    env_logger::init();
    println!("=== Workload Pipelines - Basic Routing Example ===\n");

    let config = WorkloadConfig::new()
        .with_pipeline(
            "Orders",
            PipelineConfig::new(2)
                .with_max_threads(4)
                .with_max_queue_depth(20)
                .with_max_latency(500),
        )
        .with_pipeline(
            "Reports",
            PipelineConfig::new(1).with_queue_type(QueueType::NotQueued),
        )
        .with_pipeline(
            "Default",
            PipelineConfig::new(1).with_default_pipeline(true),
        )
        .with_static_mapping(WorkloadMapping::for_endpoints(
            "orders",
            "Orders",
            &EndpointsGroup::new()
                .with_endpoint_url("api/v1/orders")
                .with_resource(Resource::new("api/v1/cart", [HttpMethod::Post, HttpMethod::Put])),
        ))
        .with_static_mapping(WorkloadMapping::new(
            "reports",
            "Reports",
            [RequestKey::generic("nightly-report")],
        ));

    let router = WorkloadRouter::new(config)?;
    let handler: Arc<dyn WorkloadErrorHandler<RequestKey>> = Arc::new(LoggingErrorHandler);

    println!("1. Resolving request keys:");
    let keys = [
        RequestKey::rest("api/v1/orders", HttpMethod::Get),
        RequestKey::rest("api/v1/orders/17/items", HttpMethod::Delete),
        RequestKey::rest("api/v1/cart", HttpMethod::Post),
        RequestKey::generic("nightly-report"),
        RequestKey::endpoint("api/v2/unknown"),
    ];
    for key in &keys {
        let pipeline = router.resolve_pipeline(key)?;
        println!("   {:<32} -> {}", key.key(), pipeline.id());
    }

    println!("\n2. Executing requests:");
    for (i, key) in keys.iter().enumerate() {
        router.execute(key, Arc::clone(&handler), move || {
            println!("   Request {} running on {:?}", i, thread::current().id());
            thread::sleep(Duration::from_millis(20));
        })?;
    }

    router.shutdown()?;

    println!("\n3. Pipeline statistics:");
    for info in router.pipelines() {
        println!(
            "   {:<8} completed: {}, rejected: {}, largest pool: {}",
            info.id(),
            info.completed_task_count(),
            info.rejected_count(),
            info.largest_pool_size()
        );
    }

    println!("\n4. Known mappings: {}", router.workload_mappings().len());

    println!("\n=== Example completed successfully ===");
    Ok(())
}
