//! Latency probe backed by the system `ping` utility.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use tokio::process::Command;
use tracing::{debug, warn};

use speedflux_core::ProbeResult;

use crate::runner::run_to_completion;

/// `rtt min/avg/max/mdev = 9.1/10.2/11.3/0.4 ms` (Linux) or
/// `round-trip min/avg/max/stddev = ...` (BSD, macOS).
static UNIX_RTT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:rtt|round-trip) min/avg/max/(?:mdev|stddev) = ([0-9.]+)/([0-9.]+)/([0-9.]+)/[0-9.]+ ms")
        .expect("static regex")
});

/// `Minimum = 9ms, Maximum = 11ms, Average = 10ms` (Windows).
static WINDOWS_RTT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Minimum = ([0-9]+)ms, Maximum = ([0-9]+)ms, Average = ([0-9]+)ms")
        .expect("static regex")
});

static PACKET_LOSS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(?([0-9.]+)% (?:packet )?loss").expect("static regex"));

/// Round-trip statistics for one target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PingStats {
    pub rtt_min_ms: f64,
    pub rtt_avg_ms: f64,
    pub rtt_max_ms: f64,
    /// Fraction of lost packets, 0.0 to 1.0.
    pub packet_loss: f64,
}

/// Pings one host with a fixed packet count, size and per-reply timeout.
#[derive(Debug, Clone)]
pub struct PingCli {
    program: String,
    count: u32,
    size: u32,
    timeout: Duration,
}

impl PingCli {
    pub fn new(count: u32, size: u32, timeout: Duration) -> Self {
        Self {
            program: "ping".to_string(),
            count: count.max(1),
            size,
            timeout,
        }
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Wall-clock limit for the whole invocation.
    fn deadline(&self) -> Duration {
        self.timeout * self.count + Duration::from_secs(1)
    }

    #[cfg(not(windows))]
    fn command(&self, target: &str) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("-n")
            .arg("-c")
            .arg(self.count.to_string())
            .arg("-s")
            .arg(self.size.to_string())
            .arg("-W")
            .arg(self.timeout.as_secs().max(1).to_string())
            .arg(target);
        cmd
    }

    #[cfg(windows)]
    fn command(&self, target: &str) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("-n")
            .arg(self.count.to_string())
            .arg("-l")
            .arg(self.size.to_string())
            .arg("-w")
            .arg(self.timeout.as_millis().to_string())
            .arg(target);
        cmd
    }

    /// Ping `target` once (per the configured count) and report the result.
    pub async fn ping(&self, target: &str) -> ProbeResult<PingStats> {
        debug!(%target, "running ping test");

        let stdout = match run_to_completion(self.command(target), &self.program, self.deadline()).await {
            Ok(stdout) => stdout,
            Err(e) => {
                warn!(%target, error = %e, "ping failed");
                return ProbeResult::failure(e.to_string());
            }
        };

        let text = String::from_utf8_lossy(&stdout);
        match parse_summary(&text) {
            Some(stats) => {
                debug!(%target, rtt_avg_ms = stats.rtt_avg_ms, "ping succeeded");
                ProbeResult::Success(stats)
            }
            None => {
                warn!(%target, "ping output had no round-trip summary");
                ProbeResult::failure("no round-trip summary in ping output")
            }
        }
    }
}

/// Extract round-trip statistics from ping's summary lines.
///
/// Returns `None` when no round-trip line is present (no replies).
pub fn parse_summary(output: &str) -> Option<PingStats> {
    let mut rtt: Option<(f64, f64, f64)> = None;
    let mut packet_loss = 0.0;

    for line in output.lines().map(str::trim) {
        if let Some(caps) = UNIX_RTT.captures(line) {
            rtt = Some((
                caps[1].parse().ok()?,
                caps[2].parse().ok()?,
                caps[3].parse().ok()?,
            ));
        } else if let Some(caps) = WINDOWS_RTT.captures(line) {
            // Windows prints min, max, avg.
            rtt = Some((
                caps[1].parse().ok()?,
                caps[3].parse().ok()?,
                caps[2].parse().ok()?,
            ));
        } else if let Some(caps) = PACKET_LOSS.captures(line) {
            packet_loss = caps[1].parse::<f64>().ok()? / 100.0;
        }
    }

    let (rtt_min_ms, rtt_avg_ms, rtt_max_ms) = rtt?;
    Some(PingStats {
        rtt_min_ms,
        rtt_avg_ms,
        rtt_max_ms,
        packet_loss,
    })
}
