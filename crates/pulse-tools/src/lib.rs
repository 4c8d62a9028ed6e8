//! # pulse-tools
//!
//! The tools served by Pulse: two agent stubs (`planner_agent`,
//! `executor_agent`) and the OpenClaw wrappers (`openclaw_invoke`,
//! `openclaw_predict`, `openclaw_health`). Every tool reports lifecycle
//! events through an optional [`TelemetryDispatcher`]; telemetry never
//! changes a tool's result.

pub mod agents;
pub mod openclaw;
pub mod registry;

pub use agents::AgentTools;
pub use openclaw::OpenClawTools;
pub use registry::ToolRegistry;

use pulse_telemetry::TelemetryDispatcher;
use serde_json::Value;

/// Track an event if telemetry is wired in.
pub(crate) fn emit(telemetry: Option<&TelemetryDispatcher>, event_type: &str, payload: Value) {
    if let Some(t) = telemetry {
        t.track(event_type, Some(payload));
    }
}
