//! Scheduler error types.

use thiserror::Error;

use speedflux_core::{ConfigError, IntervalKind};

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A cycle used up its write retries under the `exit` policy.
    #[error("{kind} write retries exhausted: {reason}")]
    WriteExhausted { kind: IntervalKind, reason: String },
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
