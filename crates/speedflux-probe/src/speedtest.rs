//! Bandwidth probe backed by the Ookla `speedtest` CLI.

use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, info, warn};

use speedflux_core::ProbeResult;

use crate::error::ProbeError;
use crate::payload::BandwidthPayload;
use crate::runner::run_to_completion;

/// Upper bound on a single speedtest run.
pub const DEFAULT_SPEEDTEST_TIMEOUT: Duration = Duration::from_secs(180);

/// Runs `speedtest --accept-license --accept-gdpr -f json`.
#[derive(Debug, Clone)]
pub struct SpeedtestCli {
    program: String,
    timeout: Duration,
}

impl SpeedtestCli {
    pub fn new() -> Self {
        Self {
            program: "speedtest".to_string(),
            timeout: DEFAULT_SPEEDTEST_TIMEOUT,
        }
    }

    /// Use a different executable (path or name on `$PATH`).
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn command(&self, server_id: Option<&str>) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(["--accept-license", "--accept-gdpr", "-f", "json"]);
        if let Some(id) = server_id {
            cmd.arg(format!("--server-id={id}"));
        }
        cmd
    }

    /// Run one speedtest, optionally pinned to a server.
    pub async fn run(&self, server_id: Option<&str>) -> ProbeResult<BandwidthPayload> {
        match server_id {
            Some(id) => info!(server_id = %id, "manual server choice"),
            None => info!("automatic server choice"),
        }

        let output = match run_to_completion(self.command(server_id), &self.program, self.timeout).await {
            Ok(output) => output,
            Err(e) => {
                warn!(error = %e, "speedtest failed");
                return ProbeResult::failure(e.to_string());
            }
        };

        match parse_output(&output) {
            Ok(payload) => {
                info!(
                    time = %payload.timestamp,
                    ping_ms = payload.ping.latency.unwrap_or(0.0),
                    download_mbps = payload.download.bandwidth.unwrap_or(0.0) / 125_000.0,
                    upload_mbps = payload.upload.bandwidth.unwrap_or(0.0) / 125_000.0,
                    isp = %payload.isp,
                    external_ip = %payload.interface.external_ip,
                    server_id = payload.server.id,
                    server = %format!("{} @ {}", payload.server.name, payload.server.location),
                    "speedtest successful"
                );
                ProbeResult::Success(payload)
            }
            Err(e) => {
                warn!(error = %e, "speedtest output could not be parsed");
                debug!(stdout = %String::from_utf8_lossy(&output), "speedtest raw output");
                ProbeResult::failure(e.to_string())
            }
        }
    }
}

impl Default for SpeedtestCli {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse CLI stdout into a payload.
///
/// The CLI may interleave JSON log lines with the result, so the last
/// line that parses as a complete result wins.
pub fn parse_output(stdout: &[u8]) -> Result<BandwidthPayload, ProbeError> {
    let text = std::str::from_utf8(stdout)
        .map_err(|e| ProbeError::Parse(format!("output is not UTF-8: {e}")))?;

    let mut last_err = None;
    for line in text.lines().rev().map(str::trim).filter(|l| !l.is_empty()) {
        match serde_json::from_str::<BandwidthPayload>(line) {
            Ok(payload) => return Ok(payload),
            Err(e) => last_err = Some(e),
        }
    }

    // Pretty-printed output spans several lines.
    match serde_json::from_str::<BandwidthPayload>(text) {
        Ok(payload) => Ok(payload),
        Err(e) => Err(ProbeError::Parse(
            last_err.map(|le| le.to_string()).unwrap_or_else(|| e.to_string()),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESULT_LINE: &str = r#"{"type":"result","timestamp":"2024-03-01T12:00:00Z","ping":{"jitter":0.5,"latency":10.2},"download":{"bandwidth":12500000,"bytes":150000000,"elapsed":12000},"upload":{"bandwidth":2500000,"bytes":30000000,"elapsed":10000},"packetLoss":0,"isp":"Example ISP","interface":{"internalIp":"192.168.1.10","name":"eth0","macAddr":"AA:BB:CC:DD:EE:FF","isVpn":false,"externalIp":"203.0.113.5"},"server":{"id":1234,"host":"speedtest.example.net","port":8080,"name":"Example","location":"Amsterdam","country":"Netherlands","ip":"198.51.100.7"},"result":{"id":"abcd-1234","url":"https://www.speedtest.net/result/c/abcd-1234"}}"#;

    #[test]
    fn parse_single_result_line() {
        let payload = parse_output(RESULT_LINE.as_bytes()).unwrap();
        assert_eq!(payload.isp, "Example ISP");
        assert_eq!(payload.server.id, 1234);
        assert!(!payload.result.persisted);
    }

    #[test]
    fn parse_skips_log_lines() {
        let stdout = format!(
            "{{\"type\":\"log\",\"timestamp\":\"2024-03-01T11:59:59Z\",\"message\":\"warming up\",\"level\":\"info\"}}\n{RESULT_LINE}\n"
        );
        let payload = parse_output(stdout.as_bytes()).unwrap();
        assert_eq!(payload.download.bandwidth, Some(12_500_000.0));
    }

    #[test]
    fn parse_pretty_printed_result() {
        let value: serde_json::Value = serde_json::from_str(RESULT_LINE).unwrap();
        let pretty = serde_json::to_string_pretty(&value).unwrap();
        let payload = parse_output(pretty.as_bytes()).unwrap();
        assert_eq!(payload.result.id, "abcd-1234");
    }

    #[test]
    fn parse_garbage_fails() {
        let err = parse_output(b"Limit reached: too many requests").unwrap_err();
        assert!(matches!(err, ProbeError::Parse(_)));
        assert!(parse_output(b"").is_err());
    }

    #[test]
    fn command_includes_server_override() {
        let cli = SpeedtestCli::new();
        let cmd = cli.command(Some("4242"));
        let args: Vec<_> = cmd
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            ["--accept-license", "--accept-gdpr", "-f", "json", "--server-id=4242"]
        );

        let cmd = cli.command(None);
        assert_eq!(cmd.as_std().get_args().count(), 4);
    }

    #[tokio::test]
    async fn missing_binary_is_failure() {
        let cli = SpeedtestCli::new().with_program("/nonexistent/speedtest-binary");
        let result = cli.run(None).await;
        match result {
            ProbeResult::Failure { reason } => assert!(reason.contains("failed to launch")),
            ProbeResult::Success(_) => panic!("expected failure"),
        }
    }
}
