//! HttpUploader - POSTs batches as JSON arrays

use contracts::{Batch, BatchResult, ContractError, ErrorKind, Record, Uploader};
use reqwest::StatusCode;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, instrument, warn};

const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Configuration for HttpUploader
#[derive(Debug, Clone)]
pub struct HttpUploaderConfig {
    /// Endpoint receiving the batches
    pub url: String,
    /// Per-request timeout
    pub timeout: Duration,
}

impl HttpUploaderConfig {
    /// Create config from params map
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, String> {
        let url = params
            .get("url")
            .ok_or_else(|| "missing 'url' parameter".to_string())?
            .clone();

        let timeout_ms = match params.get("timeout_ms") {
            Some(raw) => raw
                .parse::<u64>()
                .ok()
                .filter(|ms| *ms > 0)
                .ok_or_else(|| format!("invalid timeout_ms '{raw}'"))?,
            None => DEFAULT_TIMEOUT_MS,
        };

        Ok(Self {
            url,
            timeout: Duration::from_millis(timeout_ms),
        })
    }
}

/// Optional acknowledgement body of a 2xx response
#[derive(Debug, Default, Deserialize)]
struct UploadAck {
    /// Positions within the batch that the target rejected
    #[serde(default)]
    failed_indices: Vec<usize>,
    #[serde(default)]
    message: Option<String>,
}

/// Uploader that sends each batch in one HTTP request
pub struct HttpUploader {
    name: String,
    config: HttpUploaderConfig,
    client: reqwest::Client,
}

impl HttpUploader {
    /// Create a new HttpUploader
    pub fn new(name: impl Into<String>, config: HttpUploaderConfig) -> Result<Self, ContractError> {
        let name = name.into();
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ContractError::uploader_setup(&name, e.to_string()))?;

        debug!(uploader = %name, url = %config.url, "HttpUploader ready");
        Ok(Self {
            name,
            config,
            client,
        })
    }

    /// Create from params (for factory)
    pub fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> Result<Self, ContractError> {
        let name = name.into();
        let config = HttpUploaderConfig::from_params(params)
            .map_err(|e| ContractError::uploader_setup(&name, e))?;
        Self::new(name, config)
    }

    /// JSON payloads are embedded as-is, anything else as a string
    fn record_to_json(record: &Record) -> serde_json::Value {
        serde_json::from_slice(&record.payload).unwrap_or_else(|_| {
            serde_json::Value::String(String::from_utf8_lossy(&record.payload).into_owned())
        })
    }

    async fn send(&self, batch: &Batch) -> Result<(StatusCode, String), reqwest::Error> {
        let body: Vec<serde_json::Value> = batch.records.iter().map(Self::record_to_json).collect();
        let response = self.client.post(&self.config.url).json(&body).send().await?;
        let status = response.status();
        let text = response.text().await?;
        Ok((status, text))
    }
}

/// Map an HTTP response onto a batch result
pub(crate) fn classify_response(batch: &Batch, status: StatusCode, body: &str) -> BatchResult {
    if status.is_success() {
        let ack: UploadAck = if body.trim().is_empty() {
            UploadAck::default()
        } else {
            serde_json::from_str(body).unwrap_or_default()
        };

        if ack.failed_indices.is_empty() {
            return BatchResult::success(batch);
        }

        let failed: Vec<usize> = ack
            .failed_indices
            .iter()
            .filter_map(|pos| batch.records.get(*pos).map(|r| r.index))
            .collect();
        if failed.is_empty() {
            warn!(
                batch_id = %batch.id,
                positions = ?ack.failed_indices,
                "ack names no position inside the batch, treating as accepted"
            );
            return BatchResult::success(batch);
        }
        let message = ack
            .message
            .unwrap_or_else(|| format!("{} records rejected by target", failed.len()));
        return BatchResult::partial(batch, failed, ErrorKind::PermanentRejection, message);
    }

    let message = format!("HTTP {status}: {}", body.trim());
    let transient = status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error();

    if transient {
        BatchResult::failure(batch, ErrorKind::Transient, message)
    } else {
        BatchResult::failure(batch, ErrorKind::PermanentRejection, message)
    }
}

impl Uploader for HttpUploader {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "http_uploader_upload",
        skip(self, batch),
        fields(uploader = %self.name, batch_id = %batch.id, records = batch.len())
    )]
    async fn upload(&self, batch: &Batch) -> BatchResult {
        match self.send(batch).await {
            Ok((status, body)) => {
                debug!(status = status.as_u16(), "response received");
                classify_response(batch, status, &body)
            }
            Err(e) => {
                let reason = if e.is_timeout() { "request timed out" } else { "request failed" };
                warn!(uploader = %self.name, error = %e, "{reason}");
                BatchResult::failure(batch, ErrorKind::Transient, format!("{reason}: {e}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::BatchId;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn batch() -> Batch {
        Batch::new(
            BatchId(0),
            vec![
                Record::new(10, r#"{"email":"a"}"#),
                Record::new(11, r#"{"email":"b"}"#),
                Record::new(12, "plain"),
            ],
        )
    }

    #[test]
    fn test_classify_success() {
        assert!(classify_response(&batch(), StatusCode::OK, "").is_success());
        assert!(classify_response(&batch(), StatusCode::NO_CONTENT, "not json").is_success());
    }

    #[test]
    fn test_classify_partial() {
        let result = classify_response(&batch(), StatusCode::OK, r#"{"failed_indices":[1,7]}"#);
        assert_eq!(result.error_kind, Some(ErrorKind::PermanentRejection));
        assert_eq!(result.failed_record_indices.iter().copied().collect::<Vec<_>>(), vec![11]);
        assert_eq!(result.succeeded_count, 2);
        assert!(!result.retryable);
    }

    #[test]
    fn test_classify_out_of_range_positions_only() {
        let batch = batch();
        let result = classify_response(&batch, StatusCode::OK, r#"{"failed_indices":[7, 3]}"#);
        assert!(result.is_success());
        assert_eq!(result.succeeded_count, 3);

        let normalized = crate::report::normalize(result, &batch);
        assert!(normalized.is_success());
        assert!(normalized.failed_record_indices.is_empty());
        assert_eq!(normalized.succeeded_count, 3);
    }

    #[test]
    fn test_classify_status_codes() {
        for status in [
            StatusCode::REQUEST_TIMEOUT,
            StatusCode::TOO_MANY_REQUESTS,
            StatusCode::BAD_GATEWAY,
            StatusCode::SERVICE_UNAVAILABLE,
        ] {
            let result = classify_response(&batch(), status, "");
            assert_eq!(result.error_kind, Some(ErrorKind::Transient), "{status}");
            assert!(result.retryable);
        }
        for status in [StatusCode::BAD_REQUEST, StatusCode::UNAUTHORIZED, StatusCode::NOT_FOUND] {
            let result = classify_response(&batch(), status, "nope");
            assert_eq!(result.error_kind, Some(ErrorKind::PermanentRejection), "{status}");
            assert!(!result.retryable);
        }
    }

    #[test]
    fn test_from_params() {
        let params = HashMap::from([
            ("url".to_string(), "http://127.0.0.1:9/upload".to_string()),
            ("timeout_ms".to_string(), "250".to_string()),
        ]);
        let config = HttpUploaderConfig::from_params(&params).unwrap();
        assert_eq!(config.timeout, Duration::from_millis(250));

        assert!(HttpUploaderConfig::from_params(&HashMap::new()).is_err());
    }

    /// Serve one request with a canned response, returning the request body
    async fn serve_once(status_line: &'static str, body: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/upload", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut raw = Vec::new();
            let mut buf = [0u8; 4096];
            let body_start = loop {
                let n = socket.read(&mut buf).await.unwrap();
                raw.extend_from_slice(&buf[..n]);
                if let Some(pos) = raw.windows(4).position(|w| w == b"\r\n\r\n") {
                    break pos + 4;
                }
            };
            let head = String::from_utf8_lossy(&raw[..body_start]).to_lowercase();
            let content_length: usize = head
                .lines()
                .find_map(|l| l.strip_prefix("content-length:"))
                .map(|v| v.trim().parse().unwrap())
                .unwrap_or(0);
            while raw.len() < body_start + content_length {
                let n = socket.read(&mut buf).await.unwrap();
                raw.extend_from_slice(&buf[..n]);
            }

            let response = format!(
                "HTTP/1.1 {status_line}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            String::from_utf8_lossy(&raw[body_start..]).into_owned()
        });

        (url, handle)
    }

    fn uploader(url: String) -> HttpUploader {
        let config = HttpUploaderConfig {
            url,
            timeout: Duration::from_secs(5),
        };
        HttpUploader::new("test_http", config).unwrap()
    }

    #[tokio::test]
    async fn test_upload_posts_json_array() {
        let (url, server) = serve_once("200 OK", "").await;
        let result = uploader(url).upload(&batch()).await;
        assert!(result.is_success());

        let body: serde_json::Value = serde_json::from_str(&server.await.unwrap()).unwrap();
        assert_eq!(
            body,
            serde_json::json!([{"email": "a"}, {"email": "b"}, "plain"])
        );
    }

    #[tokio::test]
    async fn test_upload_partial_rejection() {
        let (url, server) = serve_once("200 OK", r#"{"failed_indices":[0,2]}"#).await;
        let result = uploader(url).upload(&batch()).await;
        server.await.unwrap();

        assert_eq!(
            result.failed_record_indices.iter().copied().collect::<Vec<_>>(),
            vec![10, 12]
        );
        assert_eq!(result.succeeded_count, 1);
    }

    #[tokio::test]
    async fn test_upload_server_error_is_transient() {
        let (url, server) = serve_once("503 Service Unavailable", "busy").await;
        let result = uploader(url).upload(&batch()).await;
        server.await.unwrap();

        assert_eq!(result.error_kind, Some(ErrorKind::Transient));
        assert!(result.retryable);
        assert_eq!(result.failed_record_indices.len(), 3);
    }

    #[tokio::test]
    async fn test_connection_refused_is_transient() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/upload", listener.local_addr().unwrap());
        drop(listener);

        let result = uploader(url).upload(&batch()).await;
        assert_eq!(result.error_kind, Some(ErrorKind::Transient));
    }
}
