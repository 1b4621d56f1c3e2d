//! Structured result of a speedtest run (`speedtest -f json`).
//!
//! Numeric measurement fields are optional here: the transformer decides
//! which of them default to zero and which are required.

use chrono::{DateTime, Utc};
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BandwidthPayload {
    /// Record type emitted by the CLI ("result" for a finished test).
    #[serde(rename = "type", default)]
    pub output_type: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub ping: PingSection,
    pub download: TransferSection,
    pub upload: TransferSection,
    pub packet_loss: Option<f64>,
    pub isp: String,
    pub interface: InterfaceInfo,
    pub server: ServerInfo,
    pub result: ResultInfo,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PingSection {
    pub jitter: Option<f64>,
    pub latency: Option<f64>,
}

/// Download or upload leg. `bandwidth` is in bytes per second,
/// `elapsed` in milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TransferSection {
    pub bandwidth: Option<f64>,
    pub bytes: Option<u64>,
    pub elapsed: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterfaceInfo {
    pub internal_ip: String,
    pub name: String,
    pub mac_addr: String,
    pub is_vpn: bool,
    pub external_ip: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ServerInfo {
    pub id: u64,
    pub host: String,
    pub port: u16,
    pub name: String,
    pub location: String,
    pub country: String,
    pub ip: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ResultInfo {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub persisted: bool,
}
