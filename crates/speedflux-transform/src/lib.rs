//! speedflux-transform — maps probe output to time-series records.
//!
//! A bandwidth payload always becomes five records (`ping`, `download`,
//! `upload`, `packetLoss`, `speeds`); each latency target becomes one
//! `pings` record. Tags are chosen by a [`TagPolicy`] from a fixed
//! per-probe catalog and attached identically to every record of a batch.
//!
//! Transformation is a pure function of its inputs: the same payload
//! always yields the same records.

pub mod error;
pub mod tags;
pub mod transformer;

pub use error::{TransformError, TransformResult};
pub use tags::{TagPolicy, WILDCARD, bandwidth_catalog, latency_catalog};
pub use transformer::{BYTES_PER_MEGABIT, RecordTransformer, bytes_to_megabits};
