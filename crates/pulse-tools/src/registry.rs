use async_trait::async_trait;
use pulse_config::PulseConfig;
use pulse_core::{PulseError, Result, Tool, ToolCall, ToolExecutor, ToolResult};
use pulse_openclaw::OpenClawClient;
use pulse_telemetry::TelemetryDispatcher;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::{AgentTools, OpenClawTools};

/// Routes tool calls by name to the executor that provides the tool.
///
/// The first executor to register a name owns it.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    executors: Vec<Arc<dyn ToolExecutor>>,
    by_name: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard tool set: the agent tools always, the OpenClaw tools
    /// only when `openclaw.base_url` is configured.
    pub fn from_config(config: &PulseConfig, telemetry: Option<TelemetryDispatcher>) -> Result<Self> {
        let mut registry = Self::new();
        registry.register(Arc::new(AgentTools::new(telemetry.clone())));

        if config.openclaw.base_url.is_some() {
            let client = OpenClawClient::from_config(&config.openclaw)?;
            info!(base_url = %client.base_url(), "OpenClaw tools enabled");
            registry.register(Arc::new(OpenClawTools::new(client, telemetry)));
        } else {
            debug!("no OpenClaw base URL configured, OpenClaw tools disabled");
        }
        Ok(registry)
    }

    pub fn register(&mut self, executor: Arc<dyn ToolExecutor>) {
        let idx = self.executors.len();
        for tool in executor.tools() {
            if self.by_name.contains_key(&tool.name) {
                warn!(tool = %tool.name, "duplicate tool name, keeping the first registration");
                continue;
            }
            self.by_name.insert(tool.name, idx);
        }
        self.executors.push(executor);
    }

    pub fn has_tool(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Convenience wrapper that builds the [`ToolCall`] with a fresh id.
    pub async fn call(&self, name: &str, arguments: Value) -> Result<ToolResult> {
        let call = ToolCall::new(uuid::Uuid::new_v4().to_string(), name, arguments);
        self.execute(&call).await
    }
}

#[async_trait]
impl ToolExecutor for ToolRegistry {
    /// Tools in registration order.
    fn tools(&self) -> Vec<Tool> {
        self.executors
            .iter()
            .enumerate()
            .flat_map(|(idx, ex)| {
                ex.tools()
                    .into_iter()
                    .filter(move |t| self.by_name.get(&t.name) == Some(&idx))
            })
            .collect()
    }

    async fn execute(&self, call: &ToolCall) -> Result<ToolResult> {
        let idx = self
            .by_name
            .get(&call.tool_name)
            .copied()
            .ok_or_else(|| PulseError::ToolNotFound(call.tool_name.clone()))?;
        debug!(tool = %call.tool_name, id = %call.id, "executing tool");
        self.executors[idx].execute(call).await
    }
}
