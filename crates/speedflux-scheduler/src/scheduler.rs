//! The dual-interval scheduling loop.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use speedflux_core::{ExhaustionPolicy, IntervalKind, IntervalSpec, Settings};

use crate::clock::IntervalClock;
use crate::cycle::{CycleOutcome, Pipeline};
use crate::error::{SchedulerError, SchedulerResult};

/// Drives both intervals until shutdown.
pub struct Scheduler {
    clock: IntervalClock,
    pipeline: Arc<Pipeline>,
    run_on_start: bool,
    on_exhausted: ExhaustionPolicy,
    /// In-flight cycle per interval.
    slots: HashMap<IntervalKind, JoinHandle<()>>,
}

impl Scheduler {
    /// Fails with a configuration error when no interval is enabled.
    pub fn new(
        intervals: impl IntoIterator<Item = IntervalSpec>,
        pipeline: Pipeline,
    ) -> SchedulerResult<Self> {
        Ok(Self {
            clock: IntervalClock::new(intervals)?,
            pipeline: Arc::new(pipeline),
            run_on_start: false,
            on_exhausted: ExhaustionPolicy::Contain,
            slots: HashMap::new(),
        })
    }

    pub fn from_settings(settings: &Settings, pipeline: Pipeline) -> SchedulerResult<Self> {
        Ok(Self::new(settings.intervals(), pipeline)?
            .with_run_on_start(settings.run_on_start)
            .with_exhaustion_policy(settings.write.on_exhausted))
    }

    /// Dispatch every enabled interval once before the first sleep.
    pub fn with_run_on_start(mut self, run_on_start: bool) -> Self {
        self.run_on_start = run_on_start;
        self
    }

    pub fn with_exhaustion_policy(mut self, policy: ExhaustionPolicy) -> Self {
        self.on_exhausted = policy;
        self
    }

    /// Run until `shutdown` flips to `true`.
    ///
    /// Returns an error only when a cycle exhausts its write retries
    /// under `ExhaustionPolicy::Exit`. In-flight cycles are aborted on
    /// the way out.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> SchedulerResult<()> {
        let (fatal_tx, mut fatal_rx) = mpsc::channel::<SchedulerError>(4);

        let enabled: Vec<IntervalKind> = self.clock.enabled().collect();
        info!(
            intervals = ?enabled,
            run_on_start = self.run_on_start,
            on_exhausted = ?self.on_exhausted,
            "scheduler started"
        );

        if self.run_on_start {
            for kind in &enabled {
                self.dispatch(*kind, &fatal_tx);
            }
        }

        let mut secs = self.clock.sleep_secs();
        let sleep = tokio::time::sleep(Duration::from_secs(secs));
        tokio::pin!(sleep);

        let result = loop {
            tokio::select! {
                () = &mut sleep => {
                    self.clock.advance(secs);
                    for kind in self.clock.due() {
                        self.dispatch(kind, &fatal_tx);
                    }
                    secs = self.clock.sleep_secs();
                    debug!(sleep_secs = secs, "scheduler tick");
                    sleep.as_mut().reset(Instant::now() + Duration::from_secs(secs));
                }
                Some(err) = fatal_rx.recv() => {
                    break Err(err);
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("scheduler shutting down");
                        break Ok(());
                    }
                }
            }
        };

        self.stop_all();
        result
    }

    /// Start a fresh cycle for `kind`, aborting one still in flight.
    fn dispatch(&mut self, kind: IntervalKind, fatal_tx: &mpsc::Sender<SchedulerError>) {
        if let Some(previous) = self.slots.remove(&kind) {
            if !previous.is_finished() {
                warn!(%kind, "previous cycle still running, superseding it");
                previous.abort();
            }
        }

        let pipeline = self.pipeline.clone();
        let policy = self.on_exhausted;
        let fatal_tx = fatal_tx.clone();

        let handle = tokio::spawn(async move {
            let outcome = pipeline.run_cycle(kind).await;
            debug!(%kind, ?outcome, "cycle finished");

            if policy == ExhaustionPolicy::Exit && outcome.is_exhausted() {
                if let CycleOutcome::WriteFailed(e) = outcome {
                    let _ = fatal_tx
                        .send(SchedulerError::WriteExhausted {
                            kind,
                            reason: e.to_string(),
                        })
                        .await;
                }
            }
        });

        debug!(%kind, "cycle dispatched");
        self.slots.insert(kind, handle);
    }

    fn stop_all(&mut self) {
        for (kind, handle) in self.slots.drain() {
            if !handle.is_finished() {
                handle.abort();
                debug!(%kind, "in-flight cycle aborted");
            }
        }
    }
}
