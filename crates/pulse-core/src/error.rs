use thiserror::Error;

/// Unified error type for the Pulse workspace.
///
/// Telemetry never surfaces errors to its callers, so there is deliberately
/// no telemetry variant here.
#[derive(Error, Debug)]
pub enum PulseError {
    // ── Tool errors ────────────────────────────────────────────
    #[error("tool not found: {0}")]
    ToolNotFound(String),

    #[error("tool execution failed: {tool}: {reason}")]
    ToolExecution { tool: String, reason: String },

    // ── OpenClaw / remote API errors ───────────────────────────
    #[error("openclaw error: {0}")]
    OpenClaw(String),

    #[error("http error: {0}")]
    Http(String),

    // ── Server errors ──────────────────────────────────────────
    #[error("server error: {0}")]
    Server(String),

    // ── Config errors ──────────────────────────────────────────
    #[error("config error: {0}")]
    Config(String),

    #[error("config validation failed: {field}: {reason}")]
    ConfigValidation { field: String, reason: String },

    // ── Generic wrappers ───────────────────────────────────────
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl PulseError {
    /// Shorthand for a [`PulseError::ToolExecution`] error.
    pub fn tool(tool: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ToolExecution {
            tool: tool.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PulseError>;
