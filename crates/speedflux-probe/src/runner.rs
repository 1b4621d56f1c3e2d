//! The probe-runner seam used by the scheduler.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use speedflux_core::{LatencySettings, ProbeResult};

use crate::error::ProbeError;
use crate::payload::BandwidthPayload;
use crate::ping::{PingCli, PingStats};
use crate::speedtest::SpeedtestCli;

/// Result of pinging one configured target.
#[derive(Debug, Clone, PartialEq)]
pub struct LatencyOutcome {
    pub target: String,
    pub result: ProbeResult<PingStats>,
}

/// Executes bandwidth and latency probes.
///
/// Implementations bound their own runtime; the scheduler imposes no
/// timeout besides superseding a cycle at its next trigger.
#[async_trait]
pub trait ProbeRunner: Send + Sync + 'static {
    /// Run one bandwidth test, optionally pinned to a server id.
    async fn run_bandwidth(&self, server_id: Option<&str>) -> ProbeResult<BandwidthPayload>;

    /// Ping every target, in order, and report each outcome.
    async fn run_latency(&self, targets: &[String]) -> Vec<LatencyOutcome>;
}

/// Probe runner backed by the `speedtest` and `ping` executables.
#[derive(Debug, Clone)]
pub struct SystemProbeRunner {
    speedtest: SpeedtestCli,
    ping: PingCli,
}

impl SystemProbeRunner {
    pub fn new(speedtest: SpeedtestCli, ping: PingCli) -> Self {
        Self { speedtest, ping }
    }

    /// Build runners from the latency settings, using default executables.
    pub fn from_settings(latency: &LatencySettings) -> Self {
        Self::new(
            SpeedtestCli::new(),
            PingCli::new(
                latency.count,
                latency.size,
                Duration::from_secs(latency.timeout_secs),
            ),
        )
    }
}

#[async_trait]
impl ProbeRunner for SystemProbeRunner {
    async fn run_bandwidth(&self, server_id: Option<&str>) -> ProbeResult<BandwidthPayload> {
        self.speedtest.run(server_id).await
    }

    async fn run_latency(&self, targets: &[String]) -> Vec<LatencyOutcome> {
        // Sequential so probes do not interfere with each other.
        let mut outcomes = Vec::with_capacity(targets.len());
        for target in targets {
            let result = self.ping.ping(target).await;
            outcomes.push(LatencyOutcome {
                target: target.clone(),
                result,
            });
        }
        outcomes
    }
}

/// Run a command to completion and return its stdout.
///
/// The child is killed if the deadline passes or the calling task is
/// cancelled. A non-zero exit becomes `ProbeError::Exit`.
pub(crate) async fn run_to_completion(
    mut cmd: Command,
    program: &str,
    deadline: Duration,
) -> Result<Vec<u8>, ProbeError> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = cmd.spawn().map_err(|source| ProbeError::Launch {
        program: program.to_string(),
        source,
    })?;

    let output = match tokio::time::timeout(deadline, child.wait_with_output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(source)) => {
            return Err(ProbeError::Launch {
                program: program.to_string(),
                source,
            });
        }
        Err(_) => {
            return Err(ProbeError::Timeout {
                program: program.to_string(),
                secs: deadline.as_secs(),
            });
        }
    };

    if output.status.success() {
        return Ok(output.stdout);
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    let detail = match stderr.trim() {
        "" => String::from_utf8_lossy(&output.stdout)
            .lines()
            .rev()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .unwrap_or("no output")
            .to_string(),
        s => s.to_string(),
    };

    Err(ProbeError::Exit {
        program: program.to_string(),
        status: output.status.to_string(),
        detail,
    })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(script);
        cmd
    }

    #[tokio::test]
    async fn successful_command_returns_stdout() {
        let out = run_to_completion(sh("echo hello"), "sh", Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(String::from_utf8_lossy(&out).trim(), "hello");
    }

    #[tokio::test]
    async fn nonzero_exit_reports_stderr() {
        let err = run_to_completion(sh("echo boom >&2; exit 3"), "sh", Duration::from_secs(5))
            .await
            .unwrap_err();
        match err {
            ProbeError::Exit { detail, .. } => assert_eq!(detail, "boom"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn nonzero_exit_falls_back_to_stdout() {
        let err = run_to_completion(sh("echo first; echo last; exit 1"), "sh", Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(err.to_string().ends_with(": last"));
    }

    #[tokio::test]
    async fn deadline_kills_slow_command() {
        let err = run_to_completion(sh("sleep 10"), "sh", Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, ProbeError::Timeout { .. }));
    }

    #[tokio::test]
    async fn latency_outcomes_follow_target_order() {
        let runner = SystemProbeRunner::new(
            SpeedtestCli::new(),
            PingCli::new(1, 56, Duration::from_secs(1)).with_program("/nonexistent/ping"),
        );
        let targets = vec!["10.0.0.1".to_string(), "10.0.0.2".to_string()];
        let outcomes = runner.run_latency(&targets).await;
        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].target, "10.0.0.1");
        assert_eq!(outcomes[1].target, "10.0.0.2");
        assert!(outcomes.iter().all(|o| !o.result.is_success()));
    }
}
