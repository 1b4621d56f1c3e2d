//! speedflux-core — shared types and settings for the Speedflux collector.
//!
//! Holds the data model that flows through a measurement cycle
//! (`IntervalSpec`, `ProbeResult`, `Record`) and the typed `Settings`
//! resolved once at startup.
//!
//! # Architecture
//!
//! ```text
//! Scheduler (IntervalSpec × 2)
//!   └── cycle: ProbeRunner → ProbeResult
//!                 └── RecordTransformer → Vec<Record>
//!                        └── Writer → time-series store
//! ```
//!
//! Nothing in this crate performs I/O except `Settings::from_file`.

pub mod config;
pub mod error;
pub mod types;

pub use config::{
    BandwidthSettings, ExhaustionPolicy, LatencySettings, LogLevel, Settings, StoreSettings,
    WriteSettings,
};
pub use error::{ConfigError, ConfigResult};
pub use types::*;
