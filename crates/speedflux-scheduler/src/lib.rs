//! speedflux-scheduler — the collector's main loop.
//!
//! # Architecture
//!
//! ```text
//! Scheduler::run
//!   ├── IntervalClock (remaining seconds per interval, bounded sleep)
//!   └── per-interval slot ── spawned cycle (Pipeline)
//!         ProbeRunner → RecordTransformer → Writer
//! ```
//!
//! Each interval has at most one cycle in flight. A cycle that is still
//! running when its interval fires again is aborted and replaced.

pub mod clock;
pub mod cycle;
pub mod error;
pub mod scheduler;

pub use clock::{IntervalClock, MAX_SLEEP_SECS};
pub use cycle::{CycleOutcome, Pipeline};
pub use error::{SchedulerError, SchedulerResult};
pub use scheduler::Scheduler;
