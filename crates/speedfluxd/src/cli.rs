//! Command line and environment surface.
//!
//! Every flag falls back to its environment variable. Anything left
//! unset keeps the value from the `--config` file, or the built-in
//! default when there is no file.

use std::path::PathBuf;

use clap::{ArgAction, Parser, ValueEnum, builder::BoolishValueParser};

use speedflux_core::config::parse_list;
use speedflux_core::{ConfigResult, ExhaustionPolicy, LogLevel, Settings};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(
    name = "speedfluxd",
    version,
    about = "Periodic speedtest and ping collector for InfluxDB"
)]
pub struct Cli {
    /// TOML settings file applied beneath flags and environment.
    #[arg(long, env = "SPEEDFLUX_CONFIG")]
    pub config: Option<PathBuf>,

    /// Value of the `namespace` tag.
    #[arg(long, env = "NAMESPACE")]
    pub namespace: Option<String>,

    #[arg(long, env = "INFLUX_DB_URL")]
    pub influx_url: Option<String>,

    #[arg(long, env = "INFLUX_DB_TOKEN", hide_env_values = true)]
    pub influx_token: Option<String>,

    #[arg(long, env = "INFLUX_DB_ORG")]
    pub influx_org: Option<String>,

    #[arg(long, env = "INFLUX_DB_BUCKET")]
    pub influx_bucket: Option<String>,

    /// Verify the store's TLS certificate.
    #[arg(long, env = "INFLUX_DB_VERIFY_SSL", action = ArgAction::Set, value_parser = BoolishValueParser::new())]
    pub influx_verify_ssl: Option<bool>,

    /// Store request timeout in seconds.
    #[arg(long, env = "INFLUX_DB_TIMEOUT")]
    pub influx_timeout: Option<u64>,

    /// Comma-separated tag names for bandwidth records; `*` selects all.
    #[arg(long, env = "INFLUX_DB_TAGS")]
    pub influx_tags: Option<String>,

    #[arg(long, env = "SPEEDTEST_SERVER_ID")]
    pub speedtest_server_id: Option<String>,

    /// Seconds between speedtests; negative disables.
    #[arg(long, env = "SPEEDTEST_INTERVAL", allow_negative_numbers = true)]
    pub speedtest_interval: Option<i64>,

    /// Comma-separated ping targets.
    #[arg(long, env = "PING_TARGETS")]
    pub ping_targets: Option<String>,

    /// Seconds between ping rounds; negative disables.
    #[arg(long, env = "PING_INTERVAL", allow_negative_numbers = true)]
    pub ping_interval: Option<i64>,

    #[arg(long, env = "PING_COUNT")]
    pub ping_count: Option<u32>,

    #[arg(long, env = "PING_SIZE")]
    pub ping_size: Option<u32>,

    #[arg(long, env = "PING_TIMEOUT")]
    pub ping_timeout: Option<u64>,

    /// Retries after a failed write.
    #[arg(long, env = "WRITE_RETRIES")]
    pub write_retries: Option<u32>,

    /// Delay before the first retry, in milliseconds.
    #[arg(long, env = "WRITE_BACKOFF_MS")]
    pub write_backoff_ms: Option<u64>,

    /// `contain` drops the batch and keeps running, `exit` stops the collector.
    #[arg(long, env = "WRITE_EXHAUSTED")]
    pub write_exhausted: Option<ExhaustionPolicy>,

    /// Run every enabled probe once at startup.
    #[arg(long, env = "RUN_ON_START", action = ArgAction::Set, value_parser = BoolishValueParser::new())]
    pub run_on_start: Option<bool>,

    #[arg(long, env = "LOG_TYPE")]
    pub log_level: Option<LogLevel>,

    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl Cli {
    /// Overlay every option that was given onto `settings`.
    pub fn apply(&self, settings: &mut Settings) {
        if let Some(ns) = &self.namespace {
            settings.namespace = Some(ns.trim().to_string()).filter(|ns| !ns.is_empty());
        }

        let store = &mut settings.store;
        if let Some(url) = &self.influx_url {
            store.url = url.trim().to_string();
        }
        if let Some(token) = &self.influx_token {
            store.token = token.trim().to_string();
        }
        if let Some(org) = &self.influx_org {
            store.org = org.trim().to_string();
        }
        if let Some(bucket) = &self.influx_bucket {
            store.bucket = bucket.trim().to_string();
        }
        if let Some(verify) = self.influx_verify_ssl {
            store.verify_tls = verify;
        }
        if let Some(timeout) = self.influx_timeout {
            store.timeout_secs = timeout;
        }

        if let Some(tags) = &self.influx_tags {
            let tags = parse_list(tags);
            settings.tags = (!tags.is_empty()).then_some(tags);
        }

        if let Some(id) = &self.speedtest_server_id {
            settings.bandwidth.server_id = Some(id.trim().to_string()).filter(|id| !id.is_empty());
        }
        if let Some(interval) = self.speedtest_interval {
            settings.bandwidth.interval_secs = interval;
        }

        let latency = &mut settings.latency;
        if let Some(targets) = &self.ping_targets {
            latency.targets = parse_list(targets);
        }
        if let Some(interval) = self.ping_interval {
            latency.interval_secs = interval;
        }
        if let Some(count) = self.ping_count {
            latency.count = count;
        }
        if let Some(size) = self.ping_size {
            latency.size = size;
        }
        if let Some(timeout) = self.ping_timeout {
            latency.timeout_secs = timeout;
        }

        let write = &mut settings.write;
        if let Some(retries) = self.write_retries {
            write.max_retries = retries;
        }
        if let Some(backoff) = self.write_backoff_ms {
            write.backoff_ms = backoff;
        }
        if let Some(policy) = self.write_exhausted {
            write.on_exhausted = policy;
        }

        if let Some(run) = self.run_on_start {
            settings.run_on_start = run;
        }
        if let Some(level) = self.log_level {
            settings.log_level = level;
        }
    }
}

/// Build validated settings: defaults, then the file, then flags/env.
pub fn resolve_settings(cli: &Cli) -> ConfigResult<Settings> {
    let mut settings = match &cli.config {
        Some(path) => Settings::from_file(path)?,
        None => Settings::default(),
    };
    cli.apply(&mut settings);
    settings.validate()?;
    Ok(settings)
}
