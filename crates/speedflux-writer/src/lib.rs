//! speedflux-writer — persists record batches to the time-series store.
//!
//! # Architecture
//!
//! ```text
//! Writer (bounded retry, exponential backoff)
//!   └── StoreClient (trait)
//!         └── InfluxClient → POST /api/v2/write (line protocol)
//! ```
//!
//! A write is all-or-nothing per call. Connection-class failures are
//! retried up to `RetryPolicy::max_retries` times with the same batch;
//! a store that answers with an error status is not retried.

pub mod client;
pub mod error;
pub mod line_protocol;
pub mod writer;

pub use client::{InfluxClient, StoreClient, StoreHealth};
pub use error::{WriteError, WriteResult};
pub use writer::{RetryPolicy, Writer};
