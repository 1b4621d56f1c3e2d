//! Store client seam and the InfluxDB v2 HTTP implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use tracing::debug;

use speedflux_core::{Record, StoreSettings};

use crate::error::{WriteError, WriteResult};
use crate::line_protocol::{PRECISION, encode_batch};

/// Accepts a batch of records for the configured bucket.
///
/// A call either persists the whole batch or fails. Implementations
/// must be safe to share between the bandwidth and latency cycles.
#[async_trait]
pub trait StoreClient: Send + Sync + 'static {
    async fn write(&self, batch: &[Record]) -> WriteResult<()>;
}

/// Response of `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StoreHealth {
    pub name: String,
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

impl StoreHealth {
    pub fn is_pass(&self) -> bool {
        self.status.eq_ignore_ascii_case("pass")
    }
}

/// InfluxDB v2 client writing line protocol over HTTP.
#[derive(Debug, Clone)]
pub struct InfluxClient {
    http: reqwest::Client,
    write_url: Url,
    health_url: Url,
    token: String,
    org: String,
    bucket: String,
}

impl InfluxClient {
    pub fn new(settings: &StoreSettings) -> WriteResult<Self> {
        let base = settings.url.trim().trim_end_matches('/');

        let write_url = Url::parse_with_params(
            &format!("{base}/api/v2/write"),
            &[
                ("org", settings.org.as_str()),
                ("bucket", settings.bucket.as_str()),
                ("precision", PRECISION),
            ],
        )
        .map_err(|e| WriteError::Client(format!("invalid store URL '{base}': {e}")))?;
        let health_url = Url::parse(&format!("{base}/health"))
            .map_err(|e| WriteError::Client(format!("invalid store URL '{base}': {e}")))?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs.max(1)))
            .danger_accept_invalid_certs(!settings.verify_tls)
            .user_agent(concat!("speedflux/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| WriteError::Client(e.to_string()))?;

        Ok(Self {
            http,
            write_url,
            health_url,
            token: settings.token.clone(),
            org: settings.org.clone(),
            bucket: settings.bucket.clone(),
        })
    }

    pub fn write_url(&self) -> &Url {
        &self.write_url
    }

    pub fn org(&self) -> &str {
        &self.org
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Query the store's health endpoint.
    pub async fn health(&self) -> WriteResult<StoreHealth> {
        let response = self
            .http
            .get(self.health_url.clone())
            .send()
            .await
            .map_err(|e| WriteError::Connection(e.to_string()))?;

        let body = response
            .text()
            .await
            .map_err(|e| WriteError::Connection(e.to_string()))?;
        serde_json::from_str(&body)
            .map_err(|e| WriteError::Client(format!("unexpected health response: {e}")))
    }
}

#[async_trait]
impl StoreClient for InfluxClient {
    async fn write(&self, batch: &[Record]) -> WriteResult<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let body = encode_batch(batch);
        debug!(bucket = %self.bucket, records = batch.len(), bytes = body.len(), "posting batch");

        let response = self
            .http
            .post(self.write_url.clone())
            .header(reqwest::header::AUTHORIZATION, format!("Token {}", self.token))
            .header(reqwest::header::CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(body)
            .send()
            .await
            .map_err(|e| WriteError::Connection(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(WriteError::Rejected {
            status: status.as_u16(),
            body: body.trim().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn settings(url: &str) -> StoreSettings {
        StoreSettings {
            url: url.to_string(),
            token: "secret-token".to_string(),
            org: "my org".to_string(),
            bucket: "speedtests".to_string(),
            verify_tls: true,
            timeout_secs: 2,
        }
    }

    fn batch() -> Vec<Record> {
        vec![
            Record::new("pings", Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap())
                .with_field("rtt", 10.5)
                .with_tag("target", "1.1.1.1"),
        ]
    }

    /// Accept one HTTP request, reply with `response`, and return the raw request.
    async fn one_shot_server(response: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = stream.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request);
                if let Some(header_end) = text.find("\r\n\r\n") {
                    let content_length = text[..header_end]
                        .lines()
                        .find_map(|l| {
                            let (name, value) = l.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    if request.len() >= header_end + 4 + content_length {
                        break;
                    }
                }
            }
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.shutdown().await.ok();
            String::from_utf8_lossy(&request).into_owned()
        });
        (format!("http://{addr}"), handle)
    }

    #[test]
    fn write_url_carries_org_bucket_precision() {
        let client = InfluxClient::new(&settings("http://influxdb:8086/")).unwrap();
        let url = client.write_url().as_str();
        assert!(url.starts_with("http://influxdb:8086/api/v2/write?"));
        assert!(url.contains("org=my+org"));
        assert!(url.contains("bucket=speedtests"));
        assert!(url.contains("precision=ms"));
    }

    #[test]
    fn invalid_url_is_client_error() {
        let err = InfluxClient::new(&settings("not a url")).unwrap_err();
        assert!(matches!(err, WriteError::Client(_)));
    }

    #[tokio::test]
    async fn write_to_closed_port_is_retryable() {
        let client = InfluxClient::new(&settings("http://127.0.0.1:1")).unwrap();
        let err = client.write(&batch()).await.unwrap_err();
        assert!(err.is_retryable(), "got {err}");
    }

    #[tokio::test]
    async fn empty_batch_skips_request() {
        let client = InfluxClient::new(&settings("http://127.0.0.1:1")).unwrap();
        client.write(&[]).await.unwrap();
    }

    #[tokio::test]
    async fn write_posts_line_protocol_with_token() {
        let (url, server) =
            one_shot_server("HTTP/1.1 204 No Content\r\nContent-Length: 0\r\nConnection: close\r\n\r\n").await;
        let client = InfluxClient::new(&settings(&url)).unwrap();

        client.write(&batch()).await.unwrap();

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /api/v2/write?"));
        assert!(request.to_ascii_lowercase().contains("authorization: token secret-token"));
        assert!(request.ends_with("pings,target=1.1.1.1 rtt=10.5 1709294400000"));
    }

    #[tokio::test]
    async fn error_status_is_rejection() {
        let (url, server) = one_shot_server(
            "HTTP/1.1 401 Unauthorized\r\nContent-Length: 12\r\nConnection: close\r\n\r\nunauthorized",
        )
        .await;
        let client = InfluxClient::new(&settings(&url)).unwrap();

        let err = client.write(&batch()).await.unwrap_err();
        server.await.unwrap();
        match err {
            WriteError::Rejected { status, body } => {
                assert_eq!(status, 401);
                assert_eq!(body, "unauthorized");
            }
            other => panic!("expected rejection, got {other}"),
        }
        assert!(!WriteError::Rejected { status: 401, body: String::new() }.is_retryable());
    }

    #[tokio::test]
    async fn health_parses_status() {
        let body = r#"{"name":"influxdb","message":"ready for queries and writes","status":"pass","version":"v2.7.1"}"#;
        let response: &'static str = Box::leak(
            format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            )
            .into_boxed_str(),
        );
        let (url, server) = one_shot_server(response).await;
        let client = InfluxClient::new(&settings(&url)).unwrap();

        let health = client.health().await.unwrap();
        server.await.unwrap();
        assert!(health.is_pass());
        assert_eq!(health.version.as_deref(), Some("v2.7.1"));
    }
}
