//! Convenient re-exports for common types and traits

pub use crate::core::{
    GenericRequestTypeKey, HttpMethod, LoggingErrorHandler, RequestKey, RequestTypeKey, Result,
    RestRequestTypeKey, WorkloadError, WorkloadErrorHandler,
};
pub use crate::loader::ExternalConfig;
pub use crate::pipeline::{
    Pipeline, PipelineConfig, PipelineInfo, PipelineStats, QueueType, TimeUnit,
};
pub use crate::router::{
    EndpointsGroup, Resource, RouterSettings, WorkloadConfig, WorkloadMapping, WorkloadRouter,
};
