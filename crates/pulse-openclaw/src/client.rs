use pulse_config::OpenClawConfig;
use pulse_core::{PulseError, Result};
use reqwest::Method;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Endpoint `predict` posts to unless told otherwise.
pub const DEFAULT_PREDICT_ENDPOINT: &str = "/predict";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);
const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Client for the OpenClaw analysis API.
#[derive(Clone)]
pub struct OpenClawClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl std::fmt::Debug for OpenClawClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenClawClient")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl OpenClawClient {
    /// Create a client. `base_url` must be non-empty; a trailing `/` is dropped.
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(PulseError::Config(
                "OpenClaw base_url must be set in [openclaw] or OPENCLAW_BASE_URL".into(),
            ));
        }
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| PulseError::Http(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url,
            api_key: api_key.filter(|k| !k.is_empty()),
            timeout: timeout.unwrap_or(DEFAULT_TIMEOUT),
        })
    }

    /// Build from the `[openclaw]` section (env fallbacks already applied by the loader).
    pub fn from_config(config: &OpenClawConfig) -> Result<Self> {
        Self::new(
            config.base_url.clone().unwrap_or_default(),
            config.api_key.clone(),
            Some(Duration::from_secs(config.timeout_secs)),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `<base>/<endpoint>` with exactly one slash between them.
    pub fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(ref key) = self.api_key {
            match HeaderValue::from_str(&format!("Bearer {key}")) {
                Ok(v) => {
                    headers.insert(AUTHORIZATION, v);
                }
                Err(_) => debug!("OpenClaw API key is not a valid header value, sending without it"),
            }
        }
        headers
    }

    /// Send `payload` as JSON to `endpoint` and return the JSON response.
    /// Non-2xx statuses are errors.
    pub async fn invoke(&self, endpoint: &str, payload: &Value, method: &str) -> Result<Value> {
        let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
            .map_err(|_| PulseError::OpenClaw(format!("invalid HTTP method '{method}'")))?;
        let url = self.url(endpoint);
        debug!(%method, %url, "OpenClaw request");

        let resp = self
            .client
            .request(method, &url)
            .headers(self.headers())
            .timeout(self.timeout)
            .json(payload)
            .send()
            .await
            .map_err(|e| PulseError::Http(format!("{url}: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(PulseError::OpenClaw(format!("HTTP {status} from {url}: {text}")));
        }

        resp.json::<Value>()
            .await
            .map_err(|e| PulseError::OpenClaw(format!("invalid JSON from {url}: {e}")))
    }

    /// POST to a prediction endpoint (default `/predict`).
    pub async fn predict(&self, payload: &Value, endpoint: Option<&str>) -> Result<Value> {
        self.invoke(endpoint.unwrap_or(DEFAULT_PREDICT_ENDPOINT), payload, "POST")
            .await
    }

    pub async fn analyze(&self, endpoint: &str, payload: &Value) -> Result<Value> {
        self.invoke(endpoint, payload, "POST").await
    }

    /// `GET <base>/health` with a short timeout. True only on a 200.
    pub async fn health(&self) -> bool {
        let result = self
            .client
            .get(self.url("/health"))
            .headers(self.headers())
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await;
        match result {
            Ok(resp) => resp.status() == reqwest::StatusCode::OK,
            Err(e) => {
                debug!(base_url = %self.base_url, error = %e, "OpenClaw health check failed");
                false
            }
        }
    }
}
