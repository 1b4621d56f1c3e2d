//! Bounded-retry writer.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use speedflux_core::{Record, WriteSettings};

use crate::client::StoreClient;
use crate::error::{WriteError, WriteResult};

/// Retry limits and exponential backoff for a single write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry. Doubles after each failure.
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn from_settings(settings: &WriteSettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            base_delay: Duration::from_millis(settings.backoff_ms),
            ..Self::default()
        }
    }

    /// Delay before retry number `retry` (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }

    /// Total attempts a write may make.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

/// Writes record batches through a [`StoreClient`], retrying
/// connection failures with the same batch.
#[derive(Clone)]
pub struct Writer {
    client: Arc<dyn StoreClient>,
    policy: RetryPolicy,
}

impl Writer {
    pub fn new(client: Arc<dyn StoreClient>, policy: RetryPolicy) -> Self {
        Self { client, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Write `batch`, labelled `kind` in logs.
    ///
    /// Returns `WriteError::Exhausted` once `max_retries` retries have
    /// failed; the batch is then dropped. Rejections are returned
    /// immediately.
    pub async fn write(&self, batch: &[Record], kind: &str) -> WriteResult<()> {
        let max_attempts = self.policy.max_attempts();
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            match self.client.write(batch).await {
                Ok(()) => {
                    info!(kind, records = batch.len(), attempt, "{kind} data written successfully");
                    debug!(kind, ?batch, "written batch");
                    return Ok(());
                }
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    let delay = self.policy.delay_for(attempt);
                    warn!(
                        kind,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "write failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) if e.is_retryable() => {
                    error!(
                        kind,
                        attempts = attempt,
                        error = %e,
                        "max retries exceeded for write; check your database, bucket and token configuration"
                    );
                    return Err(WriteError::Exhausted {
                        attempts: attempt,
                        last: e.to_string(),
                    });
                }
                Err(e) => {
                    error!(kind, records = batch.len(), error = %e, "write failed, dropping batch");
                    return Err(e);
                }
            }
        }
    }
}
