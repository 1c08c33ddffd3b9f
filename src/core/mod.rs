//! Core types and traits for workload pipelines

pub mod error;
pub mod handler;
pub mod job;
pub mod key;

pub use error::{Result, WorkloadError};
pub use handler::{LoggingErrorHandler, WorkloadErrorHandler};
pub use job::{BoxedJob, ClosureJob, Command, Job};
pub use key::{GenericRequestTypeKey, HttpMethod, RequestKey, RequestTypeKey, RestRequestTypeKey};
