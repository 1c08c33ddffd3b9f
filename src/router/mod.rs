//! Mapping of request types to pipelines.

pub mod config;
pub mod mapping;
mod workload;

pub use config::{RouterSettings, WorkloadConfig};
pub use mapping::{EndpointsGroup, Resource, WorkloadMapping};
pub use workload::WorkloadRouter;
