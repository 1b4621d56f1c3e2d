//! Typed collector settings and the optional `speedflux.toml` file layer.
//!
//! Every option has a built-in default. A TOML file may override any
//! subset; the daemon then applies CLI/environment overrides on top and
//! calls [`Settings::validate`] once before anything is scheduled.

use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::types::{IntervalKind, IntervalSpec};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Value of the `namespace` tag. Empty means unset.
    pub namespace: Option<String>,
    /// Tag names to attach to bandwidth records; `*` selects all.
    pub tags: Option<Vec<String>>,
    pub log_level: LogLevel,
    /// Dispatch one cycle per enabled interval as soon as the collector starts.
    pub run_on_start: bool,
    pub store: StoreSettings,
    pub bandwidth: BandwidthSettings,
    pub latency: LatencySettings,
    pub write: WriteSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub url: String,
    pub token: String,
    pub org: String,
    pub bucket: String,
    pub verify_tls: bool,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BandwidthSettings {
    /// Seconds between speedtests; negative disables.
    pub interval_secs: i64,
    pub server_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LatencySettings {
    /// Seconds between ping rounds; negative disables.
    pub interval_secs: i64,
    pub targets: Vec<String>,
    /// Echo requests per target.
    pub count: u32,
    /// Payload size in bytes.
    pub size: u32,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriteSettings {
    /// Additional attempts after the first failed write.
    pub max_retries: u32,
    /// Delay before the first retry; doubles per attempt.
    pub backoff_ms: u64,
    pub on_exhausted: ExhaustionPolicy,
}

/// What happens once a write has used up all of its retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExhaustionPolicy {
    /// Abort only the current cycle; scheduling continues.
    #[default]
    Contain,
    /// Stop the collector with an error.
    Exit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// `EnvFilter` directive for this level.
    pub fn as_directive(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            other => Err(ConfigError::Invalid {
                key: "LOG_TYPE",
                reason: format!("unknown level '{other}'"),
            }),
        }
    }
}

impl FromStr for ExhaustionPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "contain" => Ok(ExhaustionPolicy::Contain),
            "exit" => Ok(ExhaustionPolicy::Exit),
            other => Err(ConfigError::Invalid {
                key: "WRITE_EXHAUSTED",
                reason: format!("expected 'contain' or 'exit', got '{other}'"),
            }),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            namespace: None,
            tags: None,
            log_level: LogLevel::Info,
            run_on_start: true,
            store: StoreSettings::default(),
            bandwidth: BandwidthSettings::default(),
            latency: LatencySettings::default(),
            write: WriteSettings::default(),
        }
    }
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            url: "http://influxdb:8086".to_string(),
            token: String::new(),
            org: "org".to_string(),
            bucket: "speedtests".to_string(),
            verify_tls: true,
            timeout_secs: 10,
        }
    }
}

impl Default for BandwidthSettings {
    fn default() -> Self {
        Self {
            interval_secs: 300,
            server_id: None,
        }
    }
}

impl Default for LatencySettings {
    fn default() -> Self {
        Self {
            interval_secs: 5,
            targets: vec!["1.1.1.1".to_string(), "8.8.8.8".to_string()],
            count: 1,
            size: 128,
            timeout_secs: 1,
        }
    }
}

impl Default for WriteSettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_ms: 1000,
            on_exhausted: ExhaustionPolicy::Contain,
        }
    }
}

impl Settings {
    /// Load settings from a TOML file. Missing keys keep their defaults.
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Check the option set. Called once at startup.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.bandwidth.interval_secs < 0 && self.latency.interval_secs < 0 {
            return Err(ConfigError::NoEnabledIntervals);
        }

        let url = self.store.url.trim();
        if url.is_empty() {
            return Err(ConfigError::Missing("INFLUX_DB_URL"));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::Invalid {
                key: "INFLUX_DB_URL",
                reason: "URL scheme must be http or https".to_string(),
            });
        }
        if self.store.token.trim().is_empty() {
            return Err(ConfigError::Missing("INFLUX_DB_TOKEN"));
        }
        if self.store.org.trim().is_empty() {
            return Err(ConfigError::Missing("INFLUX_DB_ORG"));
        }
        if self.store.bucket.trim().is_empty() {
            return Err(ConfigError::Missing("INFLUX_DB_BUCKET"));
        }

        if self.latency.interval_secs >= 0 {
            if self.latency.targets.is_empty() {
                return Err(ConfigError::Missing("PING_TARGETS"));
            }
            if self.latency.count == 0 {
                return Err(ConfigError::Invalid {
                    key: "PING_COUNT",
                    reason: "must be at least 1".to_string(),
                });
            }
        }

        Ok(())
    }

    /// The bandwidth and latency schedules, in that order.
    pub fn intervals(&self) -> [IntervalSpec; 2] {
        [
            IntervalSpec::new(IntervalKind::Bandwidth, self.bandwidth.interval_secs),
            IntervalSpec::new(IntervalKind::Latency, self.latency.interval_secs),
        ]
    }

    /// The configured namespace, treating an empty string as unset.
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref().filter(|ns| !ns.is_empty())
    }
}

/// Split a comma-separated option into trimmed, non-empty entries.
pub fn parse_list(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
