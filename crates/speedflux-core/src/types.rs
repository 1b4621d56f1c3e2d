//! Domain types for a measurement cycle.
//!
//! A cycle is triggered by an `IntervalSpec`, produces a `ProbeResult`,
//! and ends as an ordered batch of `Record`s handed to the writer.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Tag mapping attached to a record. Keys are unique; order is irrelevant.
pub type Tags = BTreeMap<String, String>;

// ── Intervals ──────────────────────────────────────────────────────

/// The two independently scheduled probe types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntervalKind {
    Bandwidth,
    Latency,
}

impl IntervalKind {
    /// Label used in write confirmations ("Speedtest data written").
    pub fn label(&self) -> &'static str {
        match self {
            IntervalKind::Bandwidth => "Speedtest",
            IntervalKind::Latency => "Ping",
        }
    }
}

impl fmt::Display for IntervalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntervalKind::Bandwidth => f.write_str("bandwidth"),
            IntervalKind::Latency => f.write_str("latency"),
        }
    }
}

/// A recurring probe schedule. A negative period disables the interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntervalSpec {
    pub kind: IntervalKind,
    pub period_secs: i64,
}

impl IntervalSpec {
    /// Shortest period an enabled interval may have.
    pub const MIN_PERIOD_SECS: i64 = 1;

    /// Create an interval spec.
    ///
    /// A period of zero is clamped to `MIN_PERIOD_SECS` so the
    /// scheduling loop never sleeps for zero seconds.
    pub fn new(kind: IntervalKind, period_secs: i64) -> Self {
        if period_secs == 0 {
            warn!(
                %kind,
                min_secs = Self::MIN_PERIOD_SECS,
                "interval of 0s is below the minimum, using minimum"
            );
            return Self {
                kind,
                period_secs: Self::MIN_PERIOD_SECS,
            };
        }
        Self { kind, period_secs }
    }

    /// A spec that is never scheduled.
    pub fn disabled(kind: IntervalKind) -> Self {
        Self {
            kind,
            period_secs: -1,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.period_secs >= 0
    }

    /// The period as a duration, or `None` when disabled.
    pub fn period(&self) -> Option<Duration> {
        if self.is_enabled() {
            Some(Duration::from_secs(self.period_secs as u64))
        } else {
            None
        }
    }
}

// ── Probe results ──────────────────────────────────────────────────

/// Outcome of one probe invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeResult<T> {
    /// The probe ran and its output was fully parsed.
    Success(T),
    /// The probe exited unsuccessfully or its output was unusable.
    Failure { reason: String },
}

impl<T> ProbeResult<T> {
    pub fn failure(reason: impl Into<String>) -> Self {
        ProbeResult::Failure {
            reason: reason.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ProbeResult::Success(_))
    }

    pub fn as_success(&self) -> Option<&T> {
        match self {
            ProbeResult::Success(payload) => Some(payload),
            ProbeResult::Failure { .. } => None,
        }
    }
}

// ── Records ────────────────────────────────────────────────────────

/// A field value stored on a record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue {
    Float(f64),
    Integer(i64),
    Boolean(bool),
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<u64> for FieldValue {
    fn from(value: u64) -> Self {
        FieldValue::Integer(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Boolean(value)
    }
}

/// One time-series data point.
///
/// Built with the `with_*` methods and immutable afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    measurement: String,
    timestamp: DateTime<Utc>,
    fields: BTreeMap<String, FieldValue>,
    tags: Tags,
}

impl Record {
    pub fn new(measurement: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            measurement: measurement.into(),
            timestamp,
            fields: BTreeMap::new(),
            tags: Tags::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn with_tag(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(name.into(), value.into());
        self
    }

    /// Attach every tag in `tags`, replacing any existing values.
    pub fn with_tags(mut self, tags: &Tags) -> Self {
        self.tags
            .extend(tags.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    pub fn measurement(&self) -> &str {
        &self.measurement
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn fields(&self) -> &BTreeMap<String, FieldValue> {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<FieldValue> {
        self.fields.get(name).copied()
    }

    pub fn tags(&self) -> &Tags {
        &self.tags
    }
}
