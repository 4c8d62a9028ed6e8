use async_trait::async_trait;
use pulse_core::{PulseError, Result, Tool, ToolCall, ToolExecutor, ToolResult};
use pulse_telemetry::TelemetryDispatcher;
use serde_json::json;

use crate::emit;

const PLANNER: &str = "planner_agent";
const EXECUTOR: &str = "executor_agent";

/// The planner and executor agent tools.
#[derive(Debug, Clone, Default)]
pub struct AgentTools {
    telemetry: Option<TelemetryDispatcher>,
}

impl AgentTools {
    pub fn new(telemetry: Option<TelemetryDispatcher>) -> Self {
        Self { telemetry }
    }

    pub fn planner_agent(&self, task: &str) -> String {
        self.instrumented(PLANNER, task, format!("Planning task: {task}"))
    }

    pub fn executor_agent(&self, task: &str) -> String {
        self.instrumented(EXECUTOR, task, format!("Executing task: {task}"))
    }

    fn instrumented(&self, tool: &str, task: &str, result: String) -> String {
        let telemetry = self.telemetry.as_ref();
        emit(
            telemetry,
            "tool.invocation.started",
            json!({"tool": tool, "task": task}),
        );
        emit(
            telemetry,
            "tool.invocation.completed",
            json!({"tool": tool, "result": result}),
        );
        result
    }
}

fn task_schema(what: &str) -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "task": {"type": "string", "description": what}
        },
        "required": ["task"]
    })
}

#[async_trait]
impl ToolExecutor for AgentTools {
    fn tools(&self) -> Vec<Tool> {
        vec![
            Tool {
                name: PLANNER.into(),
                description: "Produce a plan for the given task".into(),
                parameters: task_schema("The task to plan"),
                provider: None,
            },
            Tool {
                name: EXECUTOR.into(),
                description: "Execute the given task".into(),
                parameters: task_schema("The task to execute"),
                provider: None,
            },
        ]
    }

    async fn execute(&self, call: &ToolCall) -> Result<ToolResult> {
        let task = call.required_str("task")?;
        let text = match call.tool_name.as_str() {
            PLANNER => self.planner_agent(task),
            EXECUTOR => self.executor_agent(task),
            other => return Err(PulseError::ToolNotFound(other.to_string())),
        };
        Ok(ToolResult::text(call, text))
    }
}
