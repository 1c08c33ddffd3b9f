//! Pipeline configuration.
//!
//! This module provides [`PipelineConfig`] together with the [`QueueType`]
//! and [`TimeUnit`] enums it is built from.

use crate::core::{Result, WorkloadError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Admission queue policy of a pipeline.
///
/// Only `NotQueued` and `Fifo` are implemented. Building a pipeline with one of
/// the other variants fails with [`WorkloadError::QueueTypeNotImplemented`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueueType {
    /// A single request may wait while the workers are busy
    NotQueued,
    /// Requests wait in arrival order up to `max_queue_depth`
    #[default]
    Fifo,
    /// Reserved, not implemented
    #[serde(alias = "PRIORIZED")]
    Prioritized,
    /// Reserved, not implemented
    FairWeighted,
}

impl QueueType {
    /// Returns the configuration name of the queue type.
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueType::NotQueued => "NOT_QUEUED",
            QueueType::Fifo => "FIFO",
            QueueType::Prioritized => "PRIORITIZED",
            QueueType::FairWeighted => "FAIR_WEIGHTED",
        }
    }

    /// Returns true if pipelines can be built with this queue type.
    pub fn is_implemented(&self) -> bool {
        matches!(self, QueueType::NotQueued | QueueType::Fifo)
    }
}

impl fmt::Display for QueueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for QueueType {
    type Err = WorkloadError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "NOT_QUEUED" => Ok(QueueType::NotQueued),
            "FIFO" => Ok(QueueType::Fifo),
            "PRIORITIZED" | "PRIORIZED" => Ok(QueueType::Prioritized),
            "FAIR_WEIGHTED" => Ok(QueueType::FairWeighted),
            _ => Err(WorkloadError::invalid_config(
                "queueType",
                format!("unknown queue type '{}'", s),
            )),
        }
    }
}

/// Unit for keep-alive and latency values of a [`PipelineConfig`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimeUnit {
    /// Nanoseconds
    Nanoseconds,
    /// Microseconds
    Microseconds,
    /// Milliseconds
    #[default]
    Milliseconds,
    /// Seconds
    Seconds,
    /// Minutes
    Minutes,
    /// Hours
    Hours,
    /// Days
    Days,
}

impl TimeUnit {
    /// Converts `value` in this unit to a duration, saturating on overflow.
    pub fn to_duration(self, value: u64) -> Duration {
        match self {
            TimeUnit::Nanoseconds => Duration::from_nanos(value),
            TimeUnit::Microseconds => Duration::from_micros(value),
            TimeUnit::Milliseconds => Duration::from_millis(value),
            TimeUnit::Seconds => Duration::from_secs(value),
            TimeUnit::Minutes => Duration::from_secs(value.saturating_mul(60)),
            TimeUnit::Hours => Duration::from_secs(value.saturating_mul(3_600)),
            TimeUnit::Days => Duration::from_secs(value.saturating_mul(86_400)),
        }
    }
}

/// Lowest accepted thread priority
pub const MIN_THREAD_PRIORITY: u8 = 1;
/// Priority of a pipeline that does not set one
pub const NORM_THREAD_PRIORITY: u8 = 5;
/// Highest accepted thread priority
pub const MAX_THREAD_PRIORITY: u8 = 10;

/// Configuration of one pipeline.
///
/// Keep-alive and latency values are interpreted in `time_unit`.
///
/// # Example
///
/// ```rust
/// use workload_pipelines::pipeline::{PipelineConfig, QueueType};
/// use std::time::Duration;
///
/// let config = PipelineConfig::new(2)
///     .with_name("Orders")
///     .with_max_threads(5)
///     .with_queue_type(QueueType::Fifo)
///     .with_max_queue_depth(40)
///     .with_max_latency(1000);
///
/// assert!(config.validate().is_ok());
/// assert_eq!(config.effective_max_threads(), 5);
/// assert_eq!(config.max_latency(), Some(Duration::from_secs(1)));
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Display name; the pipeline id is used when empty
    pub name: String,
    /// Free text description
    pub description: String,
    /// Workers kept alive even when idle
    pub core_threads: usize,
    /// Upper bound of workers; values below `core_threads` mean `core_threads`
    pub max_threads: usize,
    /// Requested worker priority, 1 (lowest) to 10 (highest)
    pub thread_priority: u8,
    /// Idle time after which workers above the core count retire
    pub max_thread_keep_alive: u64,
    /// Admission queue policy
    pub queue_type: QueueType,
    /// Queue capacity for `QueueType::Fifo`
    pub max_queue_depth: usize,
    /// Maximum queuing latency; zero or negative disables the check
    pub max_latency: i64,
    /// Unit of `max_thread_keep_alive` and `max_latency`
    pub time_unit: TimeUnit,
    /// Marks the pipeline serving requests no mapping matches
    pub default_pipeline: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::new(1)
    }
}

impl PipelineConfig {
    /// Creates a configuration with `core_threads` workers and default values
    /// for everything else.
    #[must_use]
    pub fn new(core_threads: usize) -> Self {
        Self {
            name: String::new(),
            description: String::new(),
            core_threads,
            max_threads: 0,
            thread_priority: NORM_THREAD_PRIORITY,
            max_thread_keep_alive: 60_000,
            queue_type: QueueType::Fifo,
            max_queue_depth: 50,
            max_latency: -1,
            time_unit: TimeUnit::Milliseconds,
            default_pipeline: false,
        }
    }

    /// Sets the display name.
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the description.
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the maximum worker count.
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_max_threads(mut self, max_threads: usize) -> Self {
        self.max_threads = max_threads;
        self
    }

    /// Sets the requested worker priority.
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_thread_priority(mut self, priority: u8) -> Self {
        self.thread_priority = priority;
        self
    }

    /// Sets the keep-alive of non-core workers, in `time_unit`.
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_keep_alive(mut self, keep_alive: u64) -> Self {
        self.max_thread_keep_alive = keep_alive;
        self
    }

    /// Sets the queue policy.
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_queue_type(mut self, queue_type: QueueType) -> Self {
        self.queue_type = queue_type;
        self
    }

    /// Sets the FIFO queue capacity.
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_max_queue_depth(mut self, depth: usize) -> Self {
        self.max_queue_depth = depth;
        self
    }

    /// Sets the maximum queuing latency, in `time_unit`.
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_max_latency(mut self, max_latency: i64) -> Self {
        self.max_latency = max_latency;
        self
    }

    /// Sets the unit of keep-alive and latency values.
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_time_unit(mut self, unit: TimeUnit) -> Self {
        self.time_unit = unit;
        self
    }

    /// Marks the pipeline as the default pipeline.
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_default_pipeline(mut self, default_pipeline: bool) -> Self {
        self.default_pipeline = default_pipeline;
        self
    }

    /// `max(core_threads, max_threads)`
    pub fn effective_max_threads(&self) -> usize {
        self.core_threads.max(self.max_threads)
    }

    /// Keep-alive of non-core workers.
    pub fn keep_alive(&self) -> Duration {
        self.time_unit.to_duration(self.max_thread_keep_alive)
    }

    /// Maximum queuing latency, `None` when the check is disabled.
    pub fn max_latency(&self) -> Option<Duration> {
        u64::try_from(self.max_latency)
            .ok()
            .filter(|latency| *latency > 0)
            .map(|latency| self.time_unit.to_duration(latency))
    }

    /// Admission queue capacity implied by the queue type.
    ///
    /// # Errors
    ///
    /// Returns `QueueTypeNotImplemented` for the reserved queue types.
    pub fn queue_capacity(&self, pipeline_id: &str) -> Result<usize> {
        match self.queue_type {
            QueueType::NotQueued => Ok(1),
            QueueType::Fifo => Ok(self.max_queue_depth),
            other => Err(WorkloadError::queue_type_not_implemented(pipeline_id, other)),
        }
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.effective_max_threads() == 0 {
            return Err(WorkloadError::invalid_config(
                "maxThreads",
                "a pipeline needs at least one worker thread",
            ));
        }
        if self.queue_type == QueueType::Fifo && self.max_queue_depth == 0 {
            return Err(WorkloadError::invalid_config(
                "maxQueueDepth",
                "FIFO pipelines need a queue depth greater than 0",
            ));
        }
        if !(MIN_THREAD_PRIORITY..=MAX_THREAD_PRIORITY).contains(&self.thread_priority) {
            return Err(WorkloadError::invalid_config(
                "threadPriority",
                format!(
                    "priority {} is outside {}..={}",
                    self.thread_priority, MIN_THREAD_PRIORITY, MAX_THREAD_PRIORITY
                ),
            ));
        }
        Ok(())
    }
}
