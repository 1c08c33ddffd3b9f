//! Pipelines: bounded worker pools with latency-gated admission.
//!
//! A [`Pipeline`] is built from a [`PipelineConfig`] and owns one elastic
//! [`ThreadPool`](crate::pool::ThreadPool) whose queue capacity follows the
//! configured [`QueueType`]. Statistics are read through [`PipelineInfo`].

mod admission;
pub mod config;
mod info;
mod latency;
mod stats;

pub use admission::{Pipeline, DEFAULT_POLL_INTERVAL};
pub use config::{PipelineConfig, QueueType, TimeUnit};
pub use info::{PipelineInfo, PipelineStats};
pub use latency::LatencyGate;
pub use stats::QueueLatency;
