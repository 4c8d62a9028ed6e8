use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::event::TelemetryEvent;

/// A transport-level failure. Only these trigger a retry; an HTTP response of
/// any status is not a failure.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("invalid request: {0}")]
    Request(String),

    #[error("{0}")]
    Other(String),
}

/// Sends one telemetry event to an endpoint.
#[async_trait]
pub trait Transport: Send + Sync {
    /// POST `event` as JSON to `url`. Returns the HTTP status code.
    async fn send(
        &self,
        url: &str,
        headers: &[(String, String)],
        event: &TelemetryEvent,
        timeout: Duration,
    ) -> Result<u16, TransportError>;
}

/// `reqwest`-backed transport.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Fails when the HTTP client cannot be built (e.g. TLS backend setup).
    pub fn new() -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .tcp_keepalive(None)
            .build()
            .map_err(|e| TransportError::Other(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

/// Convert configured headers, skipping entries that aren't valid HTTP.
pub(crate) fn header_map(headers: &[(String, String)]) -> HeaderMap {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(n), Ok(v)) => {
                map.insert(n, v);
            }
            _ => debug!(header = %name, "skipping invalid telemetry header"),
        }
    }
    map
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        url: &str,
        headers: &[(String, String)],
        event: &TelemetryEvent,
        timeout: Duration,
    ) -> Result<u16, TransportError> {
        // Headers first so `json()` keeps a caller-supplied Content-Type.
        let resp = self
            .client
            .post(url)
            .headers(header_map(headers))
            .timeout(timeout)
            .json(event)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout(timeout)
                } else if e.is_connect() {
                    TransportError::Connect(e.to_string())
                } else if e.is_builder() || e.is_request() {
                    TransportError::Request(e.to_string())
                } else {
                    TransportError::Other(e.to_string())
                }
            })?;
        Ok(resp.status().as_u16())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_map_skips_invalid() {
        let headers = vec![
            ("Content-Type".to_string(), "application/json".to_string()),
            ("bad header".to_string(), "x".to_string()),
            ("X-Ok".to_string(), "line\nbreak".to_string()),
        ];
        let map = header_map(&headers);
        assert_eq!(map.len(), 1);
        assert_eq!(map["content-type"], "application/json");
    }

    #[tokio::test]
    async fn test_invalid_url_is_transport_error() {
        let transport = HttpTransport::new().unwrap();
        let event = TelemetryEvent::new("x", None);
        let result = transport
            .send("not a url", &[], &event, Duration::from_secs(1))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_refused_connection_is_transport_error() {
        let transport = HttpTransport::new().unwrap();
        let event = TelemetryEvent::new("x", None);
        // Port 1 on loopback is essentially never listening.
        let result = transport
            .send("http://127.0.0.1:1/", &[], &event, Duration::from_secs(2))
            .await;
        assert!(result.is_err());
    }
}
