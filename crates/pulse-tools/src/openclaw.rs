use async_trait::async_trait;
use pulse_core::{PulseError, Result, Tool, ToolCall, ToolExecutor, ToolResult};
use pulse_openclaw::{DEFAULT_PREDICT_ENDPOINT, OpenClawClient};
use pulse_telemetry::TelemetryDispatcher;
use serde_json::{Value, json};
use tracing::warn;

use crate::emit;

const INVOKE: &str = "openclaw_invoke";
const PREDICT: &str = "openclaw_predict";
const HEALTH: &str = "openclaw_health";
const PROVIDER: &str = "openclaw";

/// Tools backed by an [`OpenClawClient`].
#[derive(Debug, Clone)]
pub struct OpenClawTools {
    client: OpenClawClient,
    telemetry: Option<TelemetryDispatcher>,
}

impl OpenClawTools {
    pub fn new(client: OpenClawClient, telemetry: Option<TelemetryDispatcher>) -> Self {
        Self { client, telemetry }
    }

    pub fn client(&self) -> &OpenClawClient {
        &self.client
    }

    /// Call an arbitrary OpenClaw endpoint. Errors are reported and re-raised.
    pub async fn invoke(&self, endpoint: &str, payload: &Value, method: &str) -> Result<Value> {
        self.tracked("openclaw.invoke", endpoint, async {
            self.client.invoke(endpoint, payload, method).await
        })
        .await
    }

    pub async fn predict(&self, payload: &Value, endpoint: Option<&str>) -> Result<Value> {
        let endpoint = endpoint.unwrap_or(DEFAULT_PREDICT_ENDPOINT);
        self.tracked("openclaw.predict", endpoint, async {
            self.client.predict(payload, Some(endpoint)).await
        })
        .await
    }

    pub async fn health(&self) -> bool {
        let telemetry = self.telemetry.as_ref();
        emit(telemetry, "openclaw.health.check", json!({}));
        let ok = self.client.health().await;
        emit(telemetry, "openclaw.health.result", json!({"ok": ok}));
        ok
    }

    /// Wrap a call in `<prefix>.start` / `.success` / `.error` events.
    async fn tracked(
        &self,
        prefix: &str,
        endpoint: &str,
        call: impl Future<Output = Result<Value>>,
    ) -> Result<Value> {
        let telemetry = self.telemetry.as_ref();
        emit(telemetry, &format!("{prefix}.start"), json!({"endpoint": endpoint}));
        match call.await {
            Ok(v) => {
                emit(telemetry, &format!("{prefix}.success"), json!({"endpoint": endpoint}));
                Ok(v)
            }
            Err(e) => {
                warn!(endpoint, error = %e, "OpenClaw call failed");
                emit(
                    telemetry,
                    &format!("{prefix}.error"),
                    json!({"endpoint": endpoint, "error": e.to_string()}),
                );
                Err(e)
            }
        }
    }
}

#[async_trait]
impl ToolExecutor for OpenClawTools {
    fn tools(&self) -> Vec<Tool> {
        vec![
            Tool {
                name: INVOKE.into(),
                description: "Call an OpenClaw API endpoint with a JSON payload".into(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "endpoint": {"type": "string", "description": "Path, e.g. /analyze"},
                        "payload": {"type": "object", "description": "JSON body"},
                        "method": {"type": "string", "description": "HTTP method (default POST)"}
                    },
                    "required": ["endpoint", "payload"]
                }),
                provider: Some(PROVIDER.into()),
            },
            Tool {
                name: PREDICT.into(),
                description: "Run an OpenClaw prediction".into(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "payload": {"type": "object", "description": "JSON body"},
                        "endpoint": {"type": "string", "description": "Path (default /predict)"}
                    },
                    "required": ["payload"]
                }),
                provider: Some(PROVIDER.into()),
            },
            Tool {
                name: HEALTH.into(),
                description: "Check whether the OpenClaw API is reachable".into(),
                parameters: json!({"type": "object", "properties": {}}),
                provider: Some(PROVIDER.into()),
            },
        ]
    }

    async fn execute(&self, call: &ToolCall) -> Result<ToolResult> {
        match call.tool_name.as_str() {
            INVOKE => {
                let endpoint = call.required_str("endpoint")?;
                let payload = call.object_or_empty("payload")?;
                let method = call.optional_str("method").unwrap_or("POST");
                let out = self.invoke(endpoint, &payload, method).await?;
                Ok(ToolResult::json(call, out))
            }
            PREDICT => {
                let payload = call.object_or_empty("payload")?;
                let out = self.predict(&payload, call.optional_str("endpoint")).await?;
                Ok(ToolResult::json(call, out))
            }
            HEALTH => {
                let ok = self.health().await;
                Ok(ToolResult::json(call, json!(ok)))
            }
            other => Err(PulseError::ToolNotFound(other.to_string())),
        }
    }
}
