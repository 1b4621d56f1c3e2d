//! Countdown bookkeeping for the two intervals.
//!
//! The clock does no sleeping itself. The loop asks it how long to
//! sleep, sleeps, reports the elapsed seconds back, and collects the
//! intervals that came due.

use speedflux_core::{ConfigError, IntervalKind, IntervalSpec};

/// Upper bound on a single scheduler sleep, in seconds.
pub const MAX_SLEEP_SECS: u64 = 60;

#[derive(Debug, Clone, Copy)]
struct IntervalState {
    spec: IntervalSpec,
    remaining: i64,
}

#[derive(Debug, Clone)]
pub struct IntervalClock {
    states: Vec<IntervalState>,
}

impl IntervalClock {
    /// Start every enabled interval with its full period remaining.
    ///
    /// Fails when no interval is enabled.
    pub fn new(specs: impl IntoIterator<Item = IntervalSpec>) -> Result<Self, ConfigError> {
        let states: Vec<_> = specs
            .into_iter()
            .filter(IntervalSpec::is_enabled)
            .map(|mut spec| {
                spec.period_secs = spec.period_secs.max(IntervalSpec::MIN_PERIOD_SECS);
                IntervalState {
                    spec,
                    remaining: spec.period_secs,
                }
            })
            .collect();

        if states.is_empty() {
            return Err(ConfigError::NoEnabledIntervals);
        }
        Ok(Self { states })
    }

    /// Kinds that are scheduled at all.
    pub fn enabled(&self) -> impl Iterator<Item = IntervalKind> + '_ {
        self.states.iter().map(|s| s.spec.kind)
    }

    pub fn remaining(&self, kind: IntervalKind) -> Option<i64> {
        self.states
            .iter()
            .find(|s| s.spec.kind == kind)
            .map(|s| s.remaining)
    }

    /// Collect every interval whose countdown reached zero and restart
    /// its countdown from the full period.
    pub fn due(&mut self) -> Vec<IntervalKind> {
        let mut due = Vec::new();
        for state in &mut self.states {
            if state.remaining <= 0 {
                state.remaining = state.spec.period_secs;
                due.push(state.spec.kind);
            }
        }
        due
    }

    /// `min(60, min remaining)`, never below one second.
    pub fn sleep_secs(&self) -> u64 {
        let next = self
            .states
            .iter()
            .map(|s| s.remaining)
            .min()
            .unwrap_or(MAX_SLEEP_SECS as i64);
        (next.max(1) as u64).min(MAX_SLEEP_SECS)
    }

    pub fn advance(&mut self, secs: u64) {
        let secs = secs as i64;
        for state in &mut self.states {
            state.remaining -= secs;
        }
    }
}
