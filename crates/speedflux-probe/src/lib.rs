//! speedflux-probe — bandwidth and latency probes.
//!
//! Wraps the external measurement tools behind the [`ProbeRunner`] trait
//! so the scheduler can be driven by a mock in tests.
//!
//! # Architecture
//!
//! ```text
//! SystemProbeRunner: ProbeRunner
//!   ├── SpeedtestCli → `speedtest -f json` → BandwidthPayload
//!   └── PingCli      → `ping -c N -s S -W T` per target → PingStats
//! ```
//!
//! A probe that exits unsuccessfully, times out, or prints output that
//! cannot be parsed yields `ProbeResult::Failure` rather than an error;
//! the caller decides whether to write anything.

pub mod error;
pub mod payload;
pub mod ping;
pub mod runner;
pub mod speedtest;

pub use error::ProbeError;
pub use payload::{BandwidthPayload, InterfaceInfo, PingSection, ResultInfo, ServerInfo, TransferSection};
pub use ping::{PingCli, PingStats};
pub use runner::{LatencyOutcome, ProbeRunner, SystemProbeRunner};
pub use speedtest::SpeedtestCli;
