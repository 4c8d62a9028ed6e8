//! Local stand-in for the OpenClaw analysis API.

use axum::{Json, Router, routing::{get, post}};
use pulse_core::{PulseError, Result};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::info;

pub const DEFAULT_MOCK_LISTEN: &str = "127.0.0.1:9000";

const SUMMARY_CHARS: usize = 200;

#[derive(Debug, Deserialize)]
struct AnalyzeRequest {
    text: String,
    #[serde(default)]
    meta: Map<String, Value>,
}

/// Router serving `GET /health` and `POST /analyze`.
pub fn mock_router() -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/analyze", post(analyze_handler))
}

async fn health_handler() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

async fn analyze_handler(Json(req): Json<AnalyzeRequest>) -> Json<Value> {
    Json(analyze_text(&req.text, req.meta))
}

/// The mock analysis: echo, summary (first 200 chars), whitespace word count.
pub fn analyze_text(text: &str, meta: Map<String, Value>) -> Value {
    let summary: String = text.chars().take(SUMMARY_CHARS).collect();
    let tokens = text.split_whitespace().count();
    json!({
        "input": {"text": text, "meta": meta},
        "summary": summary,
        "tokens": tokens,
        "insights": {
            "length": text.chars().count(),
            "word_count": tokens,
            "mock_label": "mock_insight",
        }
    })
}

/// Serve the mock API on `listen` until Ctrl-C.
pub async fn serve_mock(listen: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .map_err(|e| PulseError::Server(format!("failed to bind {listen}: {e}")))?;
    info!(listen = %listen, "OpenClaw mock API listening");

    axum::serve(listener, mock_router())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .map_err(|e| PulseError::Server(format!("mock API error: {e}")))?;

    info!("OpenClaw mock API stopped");
    Ok(())
}
