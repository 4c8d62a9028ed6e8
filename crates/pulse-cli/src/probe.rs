//! One-shot telemetry diagnostics.
//!
//! Unlike the dispatcher, a probe runs in the foreground, prints every
//! request and response, and reports failure to the caller.

use pulse_core::{PulseError, Result};
use pulse_telemetry::{Backoff, Sleeper, TelemetryEvent};
use serde_json::{Value, json};
use std::time::Duration;
use tracing::warn;

/// Wire shape of the probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ProbeMode {
    /// Bare telemetry event, retried with backoff.
    Plain,
    /// JSON-RPC `telemetry.emit` envelope with an `X-Session-ID` header.
    Jsonrpc,
    /// JSON-RPC envelope whose session comes from `SESSION_ID` or the headers.
    JsonrpcSession,
}

/// A fully-built probe request.
#[derive(Debug, Clone)]
pub struct ProbeRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Value,
    pub timeout: Duration,
    /// Retries after the first attempt.
    pub retries: u32,
}

#[derive(Debug, Clone)]
pub struct ProbeResponse {
    pub status: u16,
    pub body: String,
    pub attempts: u32,
}

/// Parse `MCP_TELEMETRY_HEADERS`. Anything but a JSON object is ignored
/// with a warning. Non-string values are rendered as JSON text.
pub fn parse_extra_headers(raw: Option<&str>) -> Vec<(String, String)> {
    let Some(raw) = raw.filter(|r| !r.trim().is_empty()) else {
        return Vec::new();
    };
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => map
            .into_iter()
            .map(|(k, v)| {
                let v = match v {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                (k, v)
            })
            .collect(),
        _ => {
            warn!("MCP_TELEMETRY_HEADERS is not a JSON object, ignoring");
            Vec::new()
        }
    }
}

/// Insert or replace headers by exact name.
pub fn merge_headers(headers: &mut Vec<(String, String)>, extra: Vec<(String, String)>) {
    for (name, value) in extra {
        match headers.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => headers.push((name, value)),
        }
    }
}

/// `Bearer abcdefgh...` for `Bearer <token>`, `REDACTED` without a scheme.
pub fn mask_authorization(value: &str) -> String {
    match value.split_once(' ') {
        Some((scheme, token)) => {
            let visible: String = token.chars().take(8).collect();
            format!("{scheme} {visible}...")
        }
        None => "REDACTED".to_string(),
    }
}

/// Headers safe to print.
pub fn masked_headers(headers: &[(String, String)]) -> Value {
    let map = headers
        .iter()
        .map(|(k, v)| {
            let v = if k == "Authorization" {
                mask_authorization(v)
            } else {
                v.clone()
            };
            (k.clone(), Value::String(v))
        })
        .collect();
    Value::Object(map)
}

fn header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(n, _)| n == name)
        .map(|(_, v)| v.as_str())
}

/// Build the request for `mode`. `env` looks up `MCP_TELEMETRY_AUTH`,
/// `MCP_TELEMETRY_HEADERS`, `MCP_SESSION_ID` and `SESSION_ID`.
pub fn build_probe(
    mode: ProbeMode,
    url: &str,
    env: &dyn Fn(&str) -> Option<String>,
) -> ProbeRequest {
    let mut headers = vec![("Content-Type".to_string(), "application/json".to_string())];
    match mode {
        ProbeMode::Plain => {
            headers.push(("X-Device".into(), std::env::consts::OS.into()));
            headers.push(("X-Coding-Tool".into(), "vscode".into()));
        }
        ProbeMode::Jsonrpc | ProbeMode::JsonrpcSession => {
            headers.push(("Accept".into(), "application/json, text/event-stream".into()));
        }
    }

    let session = (mode == ProbeMode::Jsonrpc).then(|| {
        env("MCP_SESSION_ID").unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
    });
    if let Some(ref s) = session {
        headers.push(("X-Session-ID".into(), s.clone()));
    }
    if let Some(token) = env("MCP_TELEMETRY_AUTH") {
        headers.push(("Authorization".into(), format!("Bearer {token}")));
    }
    merge_headers(
        &mut headers,
        parse_extra_headers(env("MCP_TELEMETRY_HEADERS").as_deref()),
    );

    let note_id = uuid::Uuid::new_v4().to_string();
    let (body, timeout, retries) = match mode {
        ProbeMode::Plain => {
            let event = TelemetryEvent::new(
                "integration.header_test",
                json!({"id": note_id, "note": "header test"}).as_object().cloned(),
            );
            (
                serde_json::to_value(&event).unwrap_or_default(),
                Duration::from_secs(10),
                3,
            )
        }
        ProbeMode::Jsonrpc => (
            jsonrpc_envelope(
                session.as_deref(),
                "integration.jsonrpc_test",
                json!({"id": note_id, "note": "jsonrpc test (with session)"}),
            ),
            Duration::from_secs(10),
            0,
        ),
        ProbeMode::JsonrpcSession => {
            let session = env("SESSION_ID").or_else(|| header(&headers, "X-Session-ID").map(str::to_string));
            (
                jsonrpc_envelope(
                    session.as_deref(),
                    "integration.jsonrpc_test_with_session",
                    json!({"id": note_id, "note": "jsonrpc test with session"}),
                ),
                Duration::from_secs(15),
                0,
            )
        }
    };

    ProbeRequest {
        url: url.to_string(),
        headers,
        body,
        timeout,
        retries,
    }
}

fn jsonrpc_envelope(session: Option<&str>, event_type: &str, payload: Value) -> Value {
    let event = TelemetryEvent::new(event_type, payload.as_object().cloned());
    json!({
        "jsonrpc": "2.0",
        "method": "telemetry.emit",
        "id": uuid::Uuid::new_v4().to_string(),
        "params": {
            "session": session,
            "type": event.event_type(),
            "timestamp": event.timestamp(),
            "payload": event.payload(),
        }
    })
}

/// Send the probe, printing each attempt. Transport failures are retried
/// up to `request.retries` times with 0.5s doubling backoff.
pub async fn send_probe(
    client: &reqwest::Client,
    request: &ProbeRequest,
    sleeper: &dyn Sleeper,
) -> Result<ProbeResponse> {
    let total = request.retries + 1;
    let mut backoff = Backoff::default();
    let pretty = |v: &Value| serde_json::to_string_pretty(v).unwrap_or_default();
    let mut attempt = 0;

    loop {
        attempt += 1;
        println!("\n--- Attempt {attempt}/{total} POST {} ---", request.url);
        println!("Request headers:\n{}", pretty(&masked_headers(&request.headers)));
        println!("Request body:\n{}", pretty(&request.body));

        // Headers before the body so `json()` keeps our Content-Type.
        let mut builder = client.post(&request.url).timeout(request.timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        match builder.json(&request.body).send().await {
            Ok(resp) => {
                let status = resp.status().as_u16();
                let body = resp.text().await.unwrap_or_else(|_| "<unprintable>".into());
                println!("Response status: {status}");
                println!("Response body: {body}");
                return Ok(ProbeResponse {
                    status,
                    body,
                    attempts: attempt,
                });
            }
            Err(e) => {
                println!("Request error: {e}");
                if attempt >= total {
                    println!("Max retries reached, aborting");
                    return Err(PulseError::Http(format!(
                        "telemetry probe to {} failed after {total} attempt(s): {e}",
                        request.url
                    )));
                }
                let delay = backoff.next_delay();
                println!("Retrying in {:.1} seconds...", delay.as_secs_f64());
                sleeper.sleep(delay).await;
            }
        }
    }
}
