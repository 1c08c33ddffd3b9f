//! Thread pool and worker implementations

pub mod thread_pool;
mod worker;

pub use thread_pool::{PoolCounters, ThreadPool, ThreadPoolConfig};
