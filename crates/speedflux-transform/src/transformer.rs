//! Probe output → records.

use chrono::{DateTime, Utc};
use tracing::debug;

use speedflux_core::{ProbeResult, Record, Tags};
use speedflux_probe::{BandwidthPayload, LatencyOutcome, PingStats};

use crate::error::{TransformError, TransformResult};
use crate::tags::{TagPolicy, bandwidth_catalog, latency_catalog};

/// Bytes per second in one megabit per second.
pub const BYTES_PER_MEGABIT: f64 = 125_000.0;

pub fn bytes_to_megabits(bytes_per_second: f64) -> f64 {
    bytes_per_second / BYTES_PER_MEGABIT
}

/// Builds record batches from probe results using a fixed tag policy.
#[derive(Debug, Clone, Default)]
pub struct RecordTransformer {
    policy: TagPolicy,
}

impl RecordTransformer {
    pub fn new(policy: TagPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &TagPolicy {
        &self.policy
    }

    /// Build the five bandwidth records.
    ///
    /// Missing latency, jitter, packet loss, bandwidth and download
    /// bytes default to zero. Download elapsed and upload bytes/elapsed
    /// are required.
    pub fn transform_bandwidth(&self, payload: &BandwidthPayload) -> TransformResult<Vec<Record>> {
        let download_elapsed = payload
            .download
            .elapsed
            .ok_or(TransformError::MissingField("download.elapsed"))?;
        let upload_bytes = payload
            .upload
            .bytes
            .ok_or(TransformError::MissingField("upload.bytes"))?;
        let upload_elapsed = payload
            .upload
            .elapsed
            .ok_or(TransformError::MissingField("upload.elapsed"))?;

        let ts = payload.timestamp;
        let jitter = payload.ping.jitter.unwrap_or(0.0);
        let latency = payload.ping.latency.unwrap_or(0.0);
        let packet_loss = payload.packet_loss.unwrap_or(0.0) as i64;
        let download_mbps = bytes_to_megabits(payload.download.bandwidth.unwrap_or(0.0));
        let download_bytes = payload.download.bytes.unwrap_or(0);
        let upload_mbps = bytes_to_megabits(payload.upload.bandwidth.unwrap_or(0.0));

        let tags = self
            .policy
            .resolve(&bandwidth_catalog(payload, self.policy.namespace()));

        let records = vec![
            Record::new("ping", ts)
                .with_field("jitter", jitter)
                .with_field("latency", latency),
            Record::new("download", ts)
                .with_field("bandwidth", download_mbps)
                .with_field("bytes", download_bytes)
                .with_field("elapsed", download_elapsed),
            Record::new("upload", ts)
                .with_field("bandwidth", upload_mbps)
                .with_field("bytes", upload_bytes)
                .with_field("elapsed", upload_elapsed),
            Record::new("packetLoss", ts).with_field("packetLoss", packet_loss),
            Record::new("speeds", ts)
                .with_field("jitter", jitter)
                .with_field("latency", latency)
                .with_field("packetLoss", packet_loss)
                .with_field("bandwidth_down", download_mbps)
                .with_field("bytes_down", download_bytes)
                .with_field("elapsed_down", download_elapsed)
                .with_field("bandwidth_up", upload_mbps)
                .with_field("bytes_up", upload_bytes)
                .with_field("elapsed_up", upload_elapsed),
        ];

        debug!(tags = tags.len(), "bandwidth records built");
        Ok(records.into_iter().map(|r| r.with_tags(&tags)).collect())
    }

    /// Build the `pings` record for one target.
    ///
    /// The `target` tag is always present; the policy decides whether
    /// `namespace` joins it.
    pub fn transform_latency(
        &self,
        target: &str,
        result: &ProbeResult<PingStats>,
        timestamp: DateTime<Utc>,
    ) -> Record {
        let (success, rtt) = match result {
            ProbeResult::Success(stats) => (1i64, stats.rtt_avg_ms),
            ProbeResult::Failure { .. } => (0i64, 0.0),
        };

        let mut tags: Tags = self
            .policy
            .resolve(&latency_catalog(target, self.policy.namespace()));
        tags.insert("target".to_string(), target.to_string());

        Record::new("pings", timestamp)
            .with_field("success", success)
            .with_field("rtt", rtt)
            .with_tags(&tags)
    }

    /// One `pings` record per outcome, all sharing `timestamp`.
    pub fn transform_latency_batch(
        &self,
        outcomes: &[LatencyOutcome],
        timestamp: DateTime<Utc>,
    ) -> Vec<Record> {
        outcomes
            .iter()
            .map(|o| self.transform_latency(&o.target, &o.result, timestamp))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use speedflux_core::FieldValue;

    const RESULT_JSON: &str = r#"{
        "type": "result",
        "timestamp": "2024-03-01T12:00:00Z",
        "ping": {"jitter": 0.5, "latency": 10.2},
        "download": {"bandwidth": 12500000, "bytes": 150000000, "elapsed": 12000},
        "upload": {"bandwidth": 2500000, "bytes": 30000000, "elapsed": 10000},
        "packetLoss": 1.75,
        "isp": "Example ISP",
        "interface": {"internalIp": "192.168.1.10", "name": "eth0",
                      "macAddr": "AA:BB:CC:DD:EE:FF", "isVpn": true,
                      "externalIp": "203.0.113.5"},
        "server": {"id": 1234, "host": "speedtest.example.net", "port": 8080,
                   "name": "Example", "location": "Amsterdam",
                   "country": "Netherlands", "ip": "198.51.100.7"},
        "result": {"id": "abcd-1234",
                   "url": "https://www.speedtest.net/result/c/abcd-1234"}
    }"#;

    fn payload() -> BandwidthPayload {
        serde_json::from_str(RESULT_JSON).unwrap()
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 5).unwrap()
    }

    #[test]
    fn bandwidth_yields_five_records_in_order() {
        let records = RecordTransformer::default()
            .transform_bandwidth(&payload())
            .unwrap();
        let measurements: Vec<_> = records.iter().map(|r| r.measurement()).collect();
        assert_eq!(
            measurements,
            ["ping", "download", "upload", "packetLoss", "speeds"]
        );
        let expected_ts = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        assert!(records.iter().all(|r| r.timestamp() == expected_ts));
    }

    #[test]
    fn bandwidth_converts_to_megabits() {
        let records = RecordTransformer::default()
            .transform_bandwidth(&payload())
            .unwrap();
        assert_eq!(records[1].field("bandwidth"), Some(FieldValue::Float(100.0)));
        assert_eq!(records[1].field("bytes"), Some(FieldValue::Integer(150_000_000)));
        assert_eq!(records[2].field("bandwidth"), Some(FieldValue::Float(20.0)));
        assert_eq!(records[4].field("bandwidth_down"), Some(FieldValue::Float(100.0)));
        assert_eq!(records[4].field("elapsed_up"), Some(FieldValue::Integer(10_000)));
    }

    #[test]
    fn packet_loss_is_truncated_to_integer() {
        let records = RecordTransformer::default()
            .transform_bandwidth(&payload())
            .unwrap();
        assert_eq!(records[3].field("packetLoss"), Some(FieldValue::Integer(1)));
        assert_eq!(records[4].field("packetLoss"), Some(FieldValue::Integer(1)));
    }

    #[test]
    fn optional_fields_default_to_zero() {
        let mut p = payload();
        p.ping.jitter = None;
        p.packet_loss = None;
        p.download.bandwidth = None;
        p.download.bytes = None;

        let records = RecordTransformer::default().transform_bandwidth(&p).unwrap();
        assert_eq!(records[0].field("jitter"), Some(FieldValue::Float(0.0)));
        assert_eq!(records[1].field("bandwidth"), Some(FieldValue::Float(0.0)));
        assert_eq!(records[1].field("bytes"), Some(FieldValue::Integer(0)));
        assert_eq!(records[3].field("packetLoss"), Some(FieldValue::Integer(0)));
    }

    #[test]
    fn missing_upload_elapsed_is_an_error() {
        let mut p = payload();
        p.upload.elapsed = None;
        let err = RecordTransformer::default().transform_bandwidth(&p).unwrap_err();
        assert_eq!(err, TransformError::MissingField("upload.elapsed"));
    }

    #[test]
    fn missing_required_fields_are_named() {
        let mut p = payload();
        p.upload.bytes = None;
        assert_eq!(
            RecordTransformer::default().transform_bandwidth(&p).unwrap_err(),
            TransformError::MissingField("upload.bytes")
        );

        let mut p = payload();
        p.download.elapsed = None;
        assert_eq!(
            RecordTransformer::default().transform_bandwidth(&p).unwrap_err(),
            TransformError::MissingField("download.elapsed")
        );
    }

    #[test]
    fn transformation_is_deterministic() {
        let transformer = RecordTransformer::new(TagPolicy::new(Some("lab1"), Some(&names(&["*"]))));
        let p = payload();
        let first = transformer.transform_bandwidth(&p).unwrap();
        let second = transformer.transform_bandwidth(&p).unwrap();
        assert_eq!(first, second);
        assert_eq!(format!("{first:?}"), format!("{second:?}"));
    }

    #[test]
    fn wildcard_attaches_full_bandwidth_catalog() {
        let transformer = RecordTransformer::new(TagPolicy::new(Some("lab1"), Some(&names(&["*"]))));
        let p = payload();
        let records = transformer.transform_bandwidth(&p).unwrap();
        let catalog = bandwidth_catalog(&p, Some("lab1"));
        assert_eq!(catalog.len(), 16);
        for record in &records {
            assert_eq!(record.tags(), &catalog);
        }
        assert_eq!(records[0].tags()["vpn_enabled"], "true");
        assert_eq!(records[0].tags()["server_port"], "8080");
    }

    #[test]
    fn namespace_only_by_default() {
        let transformer = RecordTransformer::new(TagPolicy::new(Some("lab1"), None));
        let records = transformer.transform_bandwidth(&payload()).unwrap();
        for record in &records {
            assert_eq!(record.tags().len(), 1);
            assert_eq!(record.tags()["namespace"], "lab1");
        }
    }

    #[test]
    fn selected_tags_are_identical_across_batch() {
        let transformer = RecordTransformer::new(TagPolicy::new(
            None,
            Some(&names(&["isp", "server_id", "not_a_tag"])),
        ));
        let records = transformer.transform_bandwidth(&payload()).unwrap();
        let first = records[0].tags().clone();
        assert_eq!(first.len(), 2);
        assert_eq!(first["server_id"], "1234");
        assert!(records.iter().all(|r| r.tags() == &first));
    }

    #[test]
    fn latency_success_record() {
        let transformer = RecordTransformer::new(TagPolicy::new(Some("lab1"), None));
        let stats = PingStats {
            rtt_min_ms: 9.0,
            rtt_avg_ms: 10.5,
            rtt_max_ms: 12.0,
            packet_loss: 0.0,
        };
        let record = transformer.transform_latency("1.1.1.1", &ProbeResult::Success(stats), ts());
        assert_eq!(record.measurement(), "pings");
        assert_eq!(record.timestamp(), ts());
        assert_eq!(record.field("success"), Some(FieldValue::Integer(1)));
        assert_eq!(record.field("rtt"), Some(FieldValue::Float(10.5)));
        assert_eq!(record.tags()["target"], "1.1.1.1");
        assert_eq!(record.tags()["namespace"], "lab1");
    }

    #[test]
    fn latency_failure_record() {
        let transformer = RecordTransformer::default();
        let record =
            transformer.transform_latency("8.8.8.8", &ProbeResult::failure("timeout"), ts());
        assert_eq!(record.field("success"), Some(FieldValue::Integer(0)));
        assert_eq!(record.field("rtt"), Some(FieldValue::Float(0.0)));
        assert_eq!(record.tags().len(), 1);
        assert_eq!(record.tags()["target"], "8.8.8.8");
    }

    #[test]
    fn latency_batch_has_one_record_per_target() {
        let transformer = RecordTransformer::new(TagPolicy::new(None, Some(&names(&["*"]))));
        let outcomes = vec![
            LatencyOutcome {
                target: "1.1.1.1".to_string(),
                result: ProbeResult::failure("unreachable"),
            },
            LatencyOutcome {
                target: "8.8.8.8".to_string(),
                result: ProbeResult::failure("unreachable"),
            },
        ];
        let records = transformer.transform_latency_batch(&outcomes, ts());
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].tags()["target"], "1.1.1.1");
        assert_eq!(records[1].tags()["target"], "8.8.8.8");
        assert!(records.iter().all(|r| r.timestamp() == ts()));
    }

    #[test]
    fn megabit_conversion() {
        for bps in [0.0, 1.0, 125_000.0, 987_654_321.0] {
            assert_eq!(bytes_to_megabits(bps), bps / 125_000.0);
        }
        assert_eq!(bytes_to_megabits(125_000.0), 1.0);
    }
}
