//! # Workload Pipelines
//!
//! Request-level admission control for services that must shed load instead
//! of collapsing under it.
//!
//! ## Features
//!
//! - **Pipelines**: elastic worker pools with a bounded admission queue
//! - **Latency Gate**: queued requests that waited too long are discarded, not run
//! - **Workload Router**: maps request types to pipelines with hierarchical fallback
//! - **Default Pipeline**: optional catch-all for request types nobody mapped
//! - **External Configuration**: pipelines and request keys declared in TOML or JSON
//! - **Statistics**: live per-pipeline counters and serialisable snapshots
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use workload_pipelines::prelude::*;
//!
//! # fn main() -> Result<()> {
//! let router = WorkloadRouter::new(
//!     WorkloadConfig::new()
//!         .with_pipeline(
//!             "Pipeline2",
//!             PipelineConfig::new(2)
//!                 .with_max_threads(5)
//!                 .with_max_queue_depth(40)
//!                 .with_max_latency(1000),
//!         )
//!         .with_static_mapping(WorkloadMapping::new(
//!             "v2",
//!             "Pipeline2",
//!             [RequestKey::endpoint("api/v2")],
//!         )),
//! )?;
//!
//! // ("api/v2", GET) reduces to "api/v2"
//! let key = RequestKey::rest("api/v2", HttpMethod::Get);
//! router.execute(&key, Arc::new(LoggingErrorHandler), || {
//!     println!("handling request");
//! })?;
//!
//! router.shutdown()?;
//! let stats = router.pipeline("Pipeline2").map(|p| p.completed_task_count());
//! assert_eq!(stats, Some(1));
//! # Ok(())
//! # }
//! ```
//!
//! ## Handling Admission Failures
//!
//! Rejections are part of normal operation under load, so they are never
//! returned from `execute`. They go to a [`WorkloadErrorHandler`](core::WorkloadErrorHandler):
//!
//! ```rust
//! use workload_pipelines::prelude::*;
//!
//! struct ServiceUnavailable;
//!
//! impl WorkloadErrorHandler<RequestKey> for ServiceUnavailable {
//!     fn request_rejected(&self, key: &RequestKey, cause: WorkloadError) {
//!         eprintln!("503 for {}: {}", key, cause);
//!     }
//!
//!     fn maximum_latency_exceeded(&self, key: &RequestKey, cause: WorkloadError) {
//!         eprintln!("504 for {}: {}", key, cause);
//!     }
//! }
//! ```
//!
//! ## Request Keys
//!
//! Keys reduce towards less specific keys until one is mapped:
//! `("api/v1/xyz", POST)` → `"api/v1/xyz"` → `"api/v1"` → `"api"`.
//! Custom key types implement [`RequestTypeKey`](core::RequestTypeKey).

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod core;
pub mod loader;
pub mod pipeline;
pub mod pool;
pub mod prelude;
pub mod queue;
pub mod router;
pub mod tracing;

pub use crate::core::{RequestKey, RequestTypeKey, Result, WorkloadError, WorkloadErrorHandler};
pub use crate::pipeline::{Pipeline, PipelineConfig, PipelineInfo};
pub use crate::router::{WorkloadConfig, WorkloadRouter};
