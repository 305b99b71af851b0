//! loadgrid-core: shared types for the loadgrid placement engine.
//!
//! Every other loadgrid crate builds on the types defined here:
//!
//! - **`types`**: jobs, node specs, metric samples
//! - **`config`**: `GridConfig`, the TOML-backed static cluster description
//! - **`event`**: `GridEvent` and the broadcast `EventBus` that makes every
//!   placement outcome (assign, retry, reject, drop) observable
//! - **`error`**: configuration and job validation errors

pub mod config;
pub mod error;
pub mod event;
pub mod types;

pub use config::{
    AdmissionMode, GridConfig, MetricsConfig, QueueConfig, ReportConfig, RetryConfig,
    MAX_DURATION, ScoringConfig, ShutdownPolicy, parse_duration,
};
pub use error::{ConfigError, ConfigResult, JobError};
pub use event::{EventBus, GridEvent, RejectReason};
pub use types::{Job, JobId, MetricSample, NodeId, NodeSpec, epoch_millis};
