//! JSON-RPC 2.0 envelope types and the tool-call method table served on `/mcp`.

use pulse_core::{PulseError, ToolCall, ToolExecutor};
use pulse_tools::ToolRegistry;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::metrics::Metrics;

pub const PROTOCOL_VERSION: &str = "2024-11-05";

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;

#[derive(Debug, Serialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct RpcResponse {
    pub jsonrpc: &'static str,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl RpcResponse {
    pub fn ok(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn err(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(RpcError {
                code,
                message: message.into(),
            }),
        }
    }
}

/// A validated request. `id` is `None` for notifications.
#[derive(Debug)]
pub struct RpcRequest {
    pub id: Option<Value>,
    pub method: String,
    pub params: Value,
}

impl RpcRequest {
    /// Validate the envelope of an already-parsed body.
    pub fn from_value(body: Value) -> Result<Self, RpcResponse> {
        let Value::Object(mut obj) = body else {
            return Err(RpcResponse::err(Value::Null, INVALID_REQUEST, "request must be an object"));
        };
        let id = obj.remove("id");
        let reply_id = id.clone().unwrap_or(Value::Null);

        if obj.get("jsonrpc").and_then(Value::as_str) != Some("2.0") {
            return Err(RpcResponse::err(reply_id, INVALID_REQUEST, "jsonrpc must be \"2.0\""));
        }
        let Some(Value::String(method)) = obj.remove("method") else {
            return Err(RpcResponse::err(reply_id, INVALID_REQUEST, "method must be a string"));
        };
        Ok(Self {
            id,
            method,
            params: obj.remove("params").unwrap_or(Value::Null),
        })
    }
}

/// Dispatch one request. Returns `None` for notifications.
pub async fn handle(registry: &ToolRegistry, metrics: &Metrics, req: RpcRequest) -> Option<RpcResponse> {
    debug!(method = %req.method, "json-rpc request");
    let Some(id) = req.id else {
        // Notifications (e.g. notifications/initialized) get no reply.
        return None;
    };

    let reply = match req.method.as_str() {
        "initialize" => RpcResponse::ok(
            id,
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {"tools": {}},
                "serverInfo": {"name": "pulse", "version": env!("CARGO_PKG_VERSION")}
            }),
        ),
        "ping" => RpcResponse::ok(id, json!({})),
        "tools/list" => {
            let tools: Vec<Value> = registry
                .tools()
                .into_iter()
                .map(|t| {
                    json!({
                        "name": t.name,
                        "description": t.description,
                        "inputSchema": t.parameters,
                    })
                })
                .collect();
            RpcResponse::ok(id, json!({"tools": tools}))
        }
        "tools/call" => call_tool(registry, metrics, id, &req.params).await,
        other => RpcResponse::err(id, METHOD_NOT_FOUND, format!("method not found: {other}")),
    };
    Some(reply)
}

async fn call_tool(registry: &ToolRegistry, metrics: &Metrics, id: Value, params: &Value) -> RpcResponse {
    let Some(name) = params.get("name").and_then(Value::as_str) else {
        return RpcResponse::err(id, INVALID_PARAMS, "params.name must be a string");
    };
    let arguments = match params.get("arguments") {
        None | Some(Value::Null) => json!({}),
        Some(v @ Value::Object(_)) => v.clone(),
        Some(_) => return RpcResponse::err(id, INVALID_PARAMS, "params.arguments must be an object"),
    };

    metrics.inc_tool_calls();
    let call = ToolCall::new(uuid::Uuid::new_v4().to_string(), name, arguments);
    let result = match registry.execute(&call).await {
        Ok(r) => r,
        Err(PulseError::ToolNotFound(name)) => {
            metrics.inc_tool_errors();
            return RpcResponse::err(id, INVALID_PARAMS, format!("unknown tool: {name}"));
        }
        Err(e) => {
            metrics.inc_tool_errors();
            pulse_core::ToolResult::error(&call, &e)
        }
    };
    if result.is_error {
        debug!(tool = name, error = %result.content, "tool call failed");
    }

    let mut body = json!({
        "content": [{"type": "text", "text": result.content}],
        "isError": result.is_error,
    });
    if let Some(data) = result.data {
        body["structuredContent"] = json!({"result": data});
    }
    RpcResponse::ok(id, body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_validation() {
        let ok = RpcRequest::from_value(json!({"jsonrpc": "2.0", "id": 1, "method": "ping"})).unwrap();
        assert_eq!(ok.id, Some(json!(1)));
        assert_eq!(ok.params, Value::Null);

        let err = RpcRequest::from_value(json!([1])).unwrap_err();
        assert_eq!(err.error.unwrap().code, INVALID_REQUEST);

        let err = RpcRequest::from_value(json!({"jsonrpc": "1.0", "id": 2, "method": "x"})).unwrap_err();
        assert_eq!(err.id, json!(2));

        let err = RpcRequest::from_value(json!({"jsonrpc": "2.0", "id": 3, "method": 5})).unwrap_err();
        assert_eq!(err.error.unwrap().code, INVALID_REQUEST);
    }

    #[test]
    fn test_notification_has_no_id() {
        let req = RpcRequest::from_value(json!({"jsonrpc": "2.0", "method": "notifications/initialized"})).unwrap();
        assert!(req.id.is_none());
    }

    #[test]
    fn test_response_serialization_omits_absent_fields() {
        let v = serde_json::to_value(RpcResponse::ok(json!(1), json!({}))).unwrap();
        assert!(v.get("error").is_none());
        let v = serde_json::to_value(RpcResponse::err(json!(1), METHOD_NOT_FOUND, "x")).unwrap();
        assert!(v.get("result").is_none());
        assert_eq!(v["error"]["code"], -32601);
    }
}
