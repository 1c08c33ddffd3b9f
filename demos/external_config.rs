//! External pipeline configuration example
//!
//! Builds a router from `demos/pipelines.toml` (or a path given as the first
//! argument) and prints the resulting pipelines as JSON snapshots.
//!
//! Run with: cargo run --example external_config [-- path/to/pipelines.toml]

use std::env;
use std::path::PathBuf;
use workload_pipelines::prelude::*;

fn main() -> Result<()> {
    env_logger::init();
    println!("=== Workload Pipelines - External Config Example ===\n");

    let path = env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("demos/pipelines.toml"));
    println!("1. Loading pipelines from {}", path.display());

    let router: WorkloadRouter = WorkloadRouter::from_external_config(&path)?;

    println!("\n2. Configured pipelines:");
    for info in router.pipelines() {
        println!(
            "   {:<18} {:<10} core={} max={} queue={} latency={:?}{}",
            info.id(),
            info.queue_type(),
            info.core_pool_size(),
            info.maximum_pool_size(),
            info.remaining_queue_capacity(),
            info.max_latency(),
            if info.is_default() { " (default)" } else { "" }
        );
    }

    println!("\n3. Routing table:");
    let mut mappings: Vec<_> = router
        .workload_mappings()
        .into_iter()
        .map(|(key, info)| (key.key(), info.id().to_string()))
        .collect();
    mappings.sort();
    for (key, id) in mappings {
        println!("   {:<28} -> {}", key, id);
    }

    println!("\n4. Resolving unmapped keys:");
    for key in [
        RequestKey::rest("api/v2/orders/99", HttpMethod::Get),
        RequestKey::endpoint("api/v3/metrics"),
    ] {
        let pipeline = router.resolve_pipeline(&key)?;
        println!("   {:<28} -> {}", key.key(), pipeline.id());
    }

    println!("\n5. Snapshots:");
    let snapshots: Vec<PipelineStats> = router.pipelines().iter().map(|p| p.snapshot()).collect();
    match serde_json::to_string_pretty(&snapshots) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("   Failed to serialise snapshots: {}", e),
    }

    router.shutdown()?;
    println!("\n=== Example completed successfully ===");
    Ok(())
}
