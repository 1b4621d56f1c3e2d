//! One probe → transform → write cycle.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use speedflux_core::{IntervalKind, ProbeResult, Record, Settings};
use speedflux_probe::ProbeRunner;
use speedflux_transform::{RecordTransformer, TagPolicy};
use speedflux_writer::{WriteError, Writer};

/// How a cycle ended. Every failure stays inside its own cycle.
#[derive(Debug)]
pub enum CycleOutcome {
    Written { records: usize },
    ProbeFailed { reason: String },
    TransformFailed { reason: String },
    WriteFailed(WriteError),
}

impl CycleOutcome {
    pub fn is_exhausted(&self) -> bool {
        matches!(self, CycleOutcome::WriteFailed(WriteError::Exhausted { .. }))
    }
}

/// Everything a cycle needs, shared by all cycles of both intervals.
pub struct Pipeline {
    probe: Arc<dyn ProbeRunner>,
    transformer: RecordTransformer,
    writer: Writer,
    server_id: Option<String>,
    targets: Vec<String>,
}

impl Pipeline {
    pub fn new(probe: Arc<dyn ProbeRunner>, transformer: RecordTransformer, writer: Writer) -> Self {
        Self {
            probe,
            transformer,
            writer,
            server_id: None,
            targets: Vec::new(),
        }
    }

    pub fn from_settings(settings: &Settings, probe: Arc<dyn ProbeRunner>, writer: Writer) -> Self {
        Self::new(
            probe,
            RecordTransformer::new(TagPolicy::from_settings(settings)),
            writer,
        )
        .with_server_id(settings.bandwidth.server_id.clone())
        .with_targets(settings.latency.targets.clone())
    }

    /// Pin bandwidth tests to one server. Empty means automatic choice.
    pub fn with_server_id(mut self, server_id: Option<String>) -> Self {
        self.server_id = server_id.filter(|id| !id.trim().is_empty());
        self
    }

    pub fn with_targets(mut self, targets: Vec<String>) -> Self {
        self.targets = targets;
        self
    }

    pub async fn run_cycle(&self, kind: IntervalKind) -> CycleOutcome {
        match kind {
            IntervalKind::Bandwidth => self.run_bandwidth_cycle().await,
            IntervalKind::Latency => self.run_latency_cycle().await,
        }
    }

    pub async fn run_bandwidth_cycle(&self) -> CycleOutcome {
        let label = IntervalKind::Bandwidth.label();
        debug!(server_id = ?self.server_id, "starting speedtest cycle");

        let payload = match self.probe.run_bandwidth(self.server_id.as_deref()).await {
            ProbeResult::Success(payload) => payload,
            ProbeResult::Failure { reason } => {
                warn!(%reason, "speedtest failed, skipping write");
                return CycleOutcome::ProbeFailed { reason };
            }
        };

        let records = match self.transformer.transform_bandwidth(&payload) {
            Ok(records) => records,
            Err(e) => {
                error!(error = %e, "could not build speedtest records");
                return CycleOutcome::TransformFailed {
                    reason: e.to_string(),
                };
            }
        };

        info!(
            download_bytes_per_sec = ?payload.download.bandwidth,
            upload_bytes_per_sec = ?payload.upload.bandwidth,
            latency_ms = ?payload.ping.latency,
            "speedtest complete"
        );

        self.write(records, label).await
    }

    pub async fn run_latency_cycle(&self) -> CycleOutcome {
        let label = IntervalKind::Latency.label();
        debug!(targets = self.targets.len(), "starting ping cycle");

        let outcomes = self.probe.run_latency(&self.targets).await;
        let timestamp = Utc::now();

        for outcome in &outcomes {
            if let ProbeResult::Failure { reason } = &outcome.result {
                warn!(host = %outcome.target, %reason, "ping failed");
            }
        }

        let records = self.transformer.transform_latency_batch(&outcomes, timestamp);
        self.write(records, label).await
    }

    async fn write(&self, records: Vec<Record>, label: &str) -> CycleOutcome {
        let count = records.len();
        match self.writer.write(&records, label).await {
            Ok(()) => CycleOutcome::Written { records: count },
            Err(e) => CycleOutcome::WriteFailed(e),
        }
    }
}
