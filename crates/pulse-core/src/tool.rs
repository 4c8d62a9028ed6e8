use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::PulseError;

/// Description of a tool exposed to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    /// Unique name, e.g. "planner_agent", "openclaw_invoke".
    pub name: String,
    /// Human-readable description shown to the client.
    pub description: String,
    /// JSON Schema of the parameters object.
    pub parameters: Value,
    /// Which integration provides this tool (None = built-in).
    #[serde(default)]
    pub provider: Option<String>,
}

/// A request from a client to call a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub tool_name: String,
    #[serde(default)]
    pub arguments: Value,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, tool_name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            tool_name: tool_name.into(),
            arguments,
        }
    }

    /// Fetch a required string argument.
    pub fn required_str(&self, key: &str) -> crate::Result<&str> {
        self.arguments
            .get(key)
            .and_then(Value::as_str)
            .ok_or_else(|| {
                PulseError::tool(&self.tool_name, format!("missing string argument '{key}'"))
            })
    }

    /// Fetch an optional string argument.
    pub fn optional_str(&self, key: &str) -> Option<&str> {
        self.arguments.get(key).and_then(Value::as_str)
    }

    /// Fetch a JSON object argument, defaulting to `{}` when absent.
    pub fn object_or_empty(&self, key: &str) -> crate::Result<Value> {
        match self.arguments.get(key) {
            None | Some(Value::Null) => Ok(Value::Object(Default::default())),
            Some(v @ Value::Object(_)) => Ok(v.clone()),
            Some(_) => Err(PulseError::tool(
                &self.tool_name,
                format!("argument '{key}' must be an object"),
            )),
        }
    }
}

/// The result of executing a tool call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool_call_id: String,
    pub content: String,
    pub is_error: bool,
    /// Optional structured data returned alongside the text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ToolResult {
    pub fn text(call: &ToolCall, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: call.id.clone(),
            content: content.into(),
            is_error: false,
            data: None,
        }
    }

    /// A successful result whose text is the pretty-printed JSON value.
    pub fn json(call: &ToolCall, data: Value) -> Self {
        Self {
            tool_call_id: call.id.clone(),
            content: serde_json::to_string_pretty(&data).unwrap_or_default(),
            is_error: false,
            data: Some(data),
        }
    }

    pub fn error(call: &ToolCall, err: &PulseError) -> Self {
        Self {
            tool_call_id: call.id.clone(),
            content: err.to_string(),
            is_error: true,
            data: None,
        }
    }
}

/// Trait implemented by anything that can execute tool calls.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// List all tools this executor provides.
    fn tools(&self) -> Vec<Tool>;

    /// Execute a single tool call and return the result.
    async fn execute(&self, call: &ToolCall) -> crate::Result<ToolResult>;
}
