//! Routing of request types to pipelines

mod common;

use common::{init_logging, RecordingHandler};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use workload_pipelines::prelude::*;

fn execution_config(with_default: bool) -> WorkloadConfig {
    let mut config = WorkloadConfig::new()
        .with_pipeline("Pipeline1", PipelineConfig::new(1).with_max_latency(1000))
        .with_pipeline("Pipeline2", PipelineConfig::new(1).with_max_latency(1000))
        .with_static_mapping(WorkloadMapping::for_endpoints(
            "v1",
            "Pipeline1",
            &EndpointsGroup::new().with_endpoint_url("api/v1"),
        ))
        .with_elastic_mapping(WorkloadMapping::for_endpoints(
            "v2",
            "Pipeline2",
            &EndpointsGroup::new()
                .with_endpoint_url("api/v2")
                .with_resource(Resource::new("api/v2/Object", [HttpMethod::Get])),
        ));
    if with_default {
        config = config.with_pipeline(
            "DefaultPipeline",
            PipelineConfig::new(1).with_default_pipeline(true),
        );
    }
    config
}

#[test]
fn test_end_to_end_reduced_request() {
    init_logging();
    let router = WorkloadRouter::new(
        WorkloadConfig::new()
            .with_pipeline(
                "P",
                PipelineConfig::new(2)
                    .with_max_threads(5)
                    .with_queue_type(QueueType::Fifo)
                    .with_max_queue_depth(40)
                    .with_max_latency(1000),
            )
            .with_static_mapping(WorkloadMapping::new(
                "v2",
                "P",
                [RequestKey::endpoint("api/v2")],
            )),
    )
    .expect("Failed to create router");

    let handler = RecordingHandler::new();
    let executed = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&executed);
    router
        .execute(&RequestKey::rest("api/v2", HttpMethod::Get), handler.clone(), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .expect("request should be routed");

    router.shutdown().expect("Failed to shutdown router");
    assert_eq!(executed.load(Ordering::SeqCst), 1);
    let info = router.pipeline("P").expect("pipeline P exists");
    assert_eq!(info.completed_task_count(), 1);
    assert!(handler.rejected_keys().is_empty());
}

#[test]
fn test_routing_without_default_pipeline() {
    let router = WorkloadRouter::new(execution_config(false)).expect("Failed to create router");
    let handler = RecordingHandler::new();

    router
        .execute(&RequestKey::rest("api/v1/xyz", HttpMethod::Post), handler.clone(), || {})
        .expect("reduces to api/v1");

    let result = router.execute(&RequestKey::rest("api/v4711", HttpMethod::Get), handler.clone(), || {});
    match result {
        Err(WorkloadError::NoPipelineFound { key }) => assert_eq!(key, "api/v4711 (GET)"),
        other => panic!("unexpected result: {other:?}"),
    }

    router.shutdown().expect("Failed to shutdown router");
    assert_eq!(router.pipeline("Pipeline1").map(|p| p.completed_task_count()), Some(1));
    assert_eq!(router.pipeline("Pipeline2").map(|p| p.completed_task_count()), Some(0));
    assert!(router.default_pipeline().is_none());
}

#[test]
fn test_routing_with_default_pipeline() {
    let router = WorkloadRouter::new(execution_config(true)).expect("Failed to create router");
    let handler = RecordingHandler::new();

    router
        .execute(&RequestKey::endpoint("api/v4711"), handler.clone(), || {})
        .expect("falls back to the default pipeline");
    router
        .execute(&RequestKey::rest("api/v2", HttpMethod::Get), handler.clone(), || {})
        .expect("reduces to api/v2");
    router
        .execute(&RequestKey::rest("api/v2/Object", HttpMethod::Get), handler.clone(), || {})
        .expect("mapped directly");

    router.shutdown().expect("Failed to shutdown router");
    let default = router.default_pipeline().expect("default pipeline configured");
    assert_eq!(default.id(), "DefaultPipeline");
    assert_eq!(default.completed_task_count(), 1);
    assert_eq!(router.pipeline("Pipeline2").map(|p| p.completed_task_count()), Some(2));
    assert_eq!(router.pipeline("Pipeline1").map(|p| p.completed_task_count()), Some(0));
}

#[test]
fn test_resolution_is_memoized_for_original_key_only() {
    let router = WorkloadRouter::new(execution_config(true)).expect("Failed to create router");
    let mapped_before = router.workload_mappings().len();
    assert_eq!(mapped_before, 3);

    let key = RequestKey::rest("api/v1/a/b/c", HttpMethod::Delete);
    assert_eq!(router.resolve_pipeline(&key).map(|p| p.id().to_string()).ok(), Some("Pipeline1".into()));

    let mappings = router.workload_mappings();
    assert_eq!(mappings.len(), mapped_before + 1);
    assert_eq!(mappings.get(&key).map(|p| p.id().to_string()), Some("Pipeline1".into()));
    assert!(!mappings.contains_key(&RequestKey::endpoint("api/v1/a/b")));

    // second lookup is a direct hit and does not grow the mapping
    router.resolve_pipeline(&key).expect("memoized");
    assert_eq!(router.workload_mappings().len(), mapped_before + 1);
    router.shutdown().expect("Failed to shutdown router");
}

#[test]
fn test_pipelines_reachable_from_mapping() {
    let router = WorkloadRouter::new(execution_config(true)).expect("Failed to create router");
    let ids: Vec<String> = router.pipelines().iter().map(|p| p.id().to_string()).collect();
    assert_eq!(ids, ["Pipeline1", "Pipeline2", "DefaultPipeline"]);
    router.shutdown().expect("Failed to shutdown router");
}

#[test]
fn test_concurrent_resolution() {
    let router = Arc::new(WorkloadRouter::new(execution_config(false)).expect("Failed to create router"));

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let router = Arc::clone(&router);
            thread::spawn(move || {
                for i in 0..100 {
                    let key = RequestKey::rest(format!("api/v1/{}/{}", t, i % 10), HttpMethod::Get);
                    let pipeline = router.resolve_pipeline(&key).expect("resolvable");
                    assert_eq!(pipeline.id(), "Pipeline1");
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    // 3 configured keys plus 8 threads x 10 distinct keys
    assert_eq!(router.workload_mappings().len(), 3 + 80);
    router.shutdown().expect("Failed to shutdown router");
}

#[test]
fn test_overload_check() {
    let router = WorkloadRouter::new(execution_config(false)).expect("Failed to create router");
    assert!(!router
        .is_pipeline_overloaded(&RequestKey::endpoint("api/v2"))
        .expect("resolvable"));
    assert!(router
        .is_pipeline_overloaded(&RequestKey::endpoint("unknown"))
        .is_err());
    router.shutdown().expect("Failed to shutdown router");
}

#[test]
fn test_unimplemented_queue_type_fails_construction() {
    let result = WorkloadRouter::new(
        execution_config(false).with_pipeline(
            "Weighted",
            PipelineConfig::new(1).with_queue_type(QueueType::FairWeighted),
        ),
    );
    assert!(matches!(
        result,
        Err(WorkloadError::QueueTypeNotImplemented { ref pipeline_id, .. }) if pipeline_id == "Weighted"
    ));
}

#[test]
fn test_stats_snapshot_for_exporters() {
    let router = WorkloadRouter::new(execution_config(true)).expect("Failed to create router");
    let snapshots: Vec<PipelineStats> = router.pipelines().iter().map(|p| p.snapshot()).collect();
    let json = serde_json::to_string(&snapshots).expect("serialisable");
    assert!(json.contains("\"id\":\"DefaultPipeline\""));
    assert!(json.contains("\"rejectedCount\":0"));
    router.shutdown().expect("Failed to shutdown router");
}
