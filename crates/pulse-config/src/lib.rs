//! # pulse-config
//!
//! Configuration system for Pulse. Reads from `pulse.toml` and environment
//! variables, and discovers the telemetry endpoint from the editor workspace
//! (`.vscode/mcp.json`) as a last resort.

pub mod loader;
pub mod schema;
pub mod workspace;

pub use loader::ConfigLoader;
pub use schema::PulseConfig;
pub use schema::{
    ConfigWarning, LoggingConfig, OpenClawConfig, ServerConfig, TelemetryConfig, WarningSeverity,
};
pub use workspace::{discover_mcp_server_url, resolve_telemetry_endpoint};
