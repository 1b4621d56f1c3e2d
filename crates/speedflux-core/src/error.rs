//! Configuration error types.

use thiserror::Error;

/// Result type alias for settings resolution.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while loading or validating settings.
///
/// All of these are fatal at startup and never occur once the
/// scheduler is running.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("neither bandwidth nor latency has a valid interval")]
    NoEnabledIntervals,

    #[error("missing required setting: {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error("failed to read config file {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("failed to parse config file: {0}")]
    Parse(String),
}
