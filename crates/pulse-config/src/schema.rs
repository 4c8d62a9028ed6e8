use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Root configuration: maps to `pulse.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PulseConfig {
    pub telemetry: TelemetryConfig,
    pub openclaw: OpenClawConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

// ── Telemetry ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Endpoint events are POSTed to. Takes priority over `MCP_TELEMETRY_URL`
    /// and over the URL discovered in `.vscode/mcp.json`. None = disabled.
    pub url: Option<String>,
    /// Request headers. When non-empty this replaces the default
    /// `Content-Type: application/json` entirely.
    pub headers: HashMap<String, String>,
    /// Per-attempt network timeout.
    pub timeout_secs: u64,
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Bound of the in-memory event queue. Events beyond it are dropped.
    pub queue_capacity: usize,
    /// Number of background delivery workers.
    pub workers: usize,
    /// How long shutdown waits for queued events to drain.
    pub shutdown_grace_secs: u64,
    /// Directory searched for `.vscode/mcp.json` (default: current directory).
    pub workspace_dir: Option<PathBuf>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            url: None,
            headers: HashMap::new(),
            timeout_secs: 5,
            max_retries: 3,
            queue_capacity: 1024,
            workers: 4,
            shutdown_grace_secs: 2,
            workspace_dir: None,
        }
    }
}

// ── OpenClaw ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenClawConfig {
    /// Base URL of the OpenClaw analysis API.
    /// Can also be set via OPENCLAW_BASE_URL.
    pub base_url: Option<String>,
    /// Bearer token sent with every request.
    /// Can also be set via OPENCLAW_API_KEY.
    pub api_key: Option<String>,
    /// Request timeout for invoke/predict/analyze calls.
    pub timeout_secs: u64,
}

impl Default for OpenClawConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            timeout_secs: 15,
        }
    }
}

// ── Server ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// HTTP listen address. MCP_HOST / MCP_PORT override its parts.
    pub listen: String,
    /// Optional API key for the tool endpoints.
    pub api_key: Option<String>,
    /// Enable permissive CORS.
    pub cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:8000".into(),
            api_key: None,
            cors: false,
        }
    }
}

impl ServerConfig {
    /// Host part of `listen`.
    pub fn host(&self) -> &str {
        self.listen
            .rsplit_once(':')
            .map(|(h, _)| h)
            .unwrap_or(&self.listen)
    }

    /// Port part of `listen`, if any.
    pub fn port(&self) -> Option<&str> {
        self.listen.rsplit_once(':').map(|(_, p)| p)
    }
}

// ── Logging ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
    /// Output format: "pretty", "json", "compact".
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "pretty".into(),
        }
    }
}

// ── Validation ─────────────────────────────────────────────────

/// A single config validation issue.
#[derive(Debug)]
pub struct ConfigWarning {
    pub field: String,
    pub message: String,
    pub severity: WarningSeverity,
    pub hint: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningSeverity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let icon = match self.severity {
            WarningSeverity::Error => "❌",
            WarningSeverity::Warning => "⚠️ ",
            WarningSeverity::Info => "💡",
        };
        write!(f, "{} {}: {}", icon, self.field, self.message)?;
        if let Some(ref h) = self.hint {
            write!(f, "\n   ↳ {}", h)?;
        }
        Ok(())
    }
}

fn is_http_url(raw: &str) -> bool {
    url::Url::parse(raw)
        .map(|u| matches!(u.scheme(), "http" | "https"))
        .unwrap_or(false)
}

impl PulseConfig {
    /// Validate the config and return a list of warnings/errors.
    /// Returns `Err` with all messages joined if any severity is Error.
    pub fn validate(&self) -> Result<Vec<ConfigWarning>, String> {
        let mut warnings = Vec::new();

        // ── Telemetry endpoint ───
        match self.telemetry.url.as_deref() {
            None => warnings.push(ConfigWarning {
                field: "telemetry.url".into(),
                message: "no telemetry endpoint configured — events will be discarded".into(),
                severity: WarningSeverity::Info,
                hint: Some(
                    "Set telemetry.url, MCP_TELEMETRY_URL, or a server url in .vscode/mcp.json"
                        .into(),
                ),
            }),
            // A bad telemetry URL only makes deliveries fail, it never stops the server.
            Some(u) if !is_http_url(u) => warnings.push(ConfigWarning {
                field: "telemetry.url".into(),
                message: format!("'{u}' is not an http(s) URL — deliveries will fail"),
                severity: WarningSeverity::Warning,
                hint: Some("Use e.g. 'https://telemetry.example.com/proxy'".into()),
            }),
            Some(_) => {}
        }

        // ── Telemetry pool ───
        if self.telemetry.workers == 0 {
            warnings.push(ConfigWarning {
                field: "telemetry.workers".into(),
                message: "workers is 0 — no event would ever be delivered".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. 4".into()),
            });
        }
        if self.telemetry.queue_capacity == 0 {
            warnings.push(ConfigWarning {
                field: "telemetry.queue_capacity".into(),
                message: "queue_capacity is 0".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. 1024".into()),
            });
        }
        if self.telemetry.timeout_secs == 0 {
            warnings.push(ConfigWarning {
                field: "telemetry.timeout_secs".into(),
                message: "timeout is 0 — every attempt would time out".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. 5".into()),
            });
        }
        if self.telemetry.max_retries > 10 {
            warnings.push(ConfigWarning {
                field: "telemetry.max_retries".into(),
                message: format!(
                    "{} retries — backoff doubles from 0.5s, the last wait alone is {}s",
                    self.telemetry.max_retries,
                    0.5 * 2f64.powf(f64::from(self.telemetry.max_retries) - 1.0)
                ),
                severity: WarningSeverity::Warning,
                hint: Some("3 retries is usually enough for best-effort telemetry".into()),
            });
        }

        // ── OpenClaw ───
        if let Some(ref base) = self.openclaw.base_url {
            if !is_http_url(base) {
                warnings.push(ConfigWarning {
                    field: "openclaw.base_url".into(),
                    message: format!("'{base}' is not an http(s) URL"),
                    severity: WarningSeverity::Error,
                    hint: Some("Use e.g. 'http://127.0.0.1:9000'".into()),
                });
            }
        }
        if self.openclaw.timeout_secs == 0 {
            warnings.push(ConfigWarning {
                field: "openclaw.timeout_secs".into(),
                message: "timeout is 0".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. 15".into()),
            });
        }

        // ── Server listen address ───
        if self.server.listen.is_empty() {
            warnings.push(ConfigWarning {
                field: "server.listen".into(),
                message: "listen address is empty".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. '127.0.0.1:8000'".into()),
            });
        } else if self.server.listen.starts_with("0.0.0.0") {
            warnings.push(ConfigWarning {
                field: "server.listen".into(),
                message: "binding to 0.0.0.0 — server is accessible from all interfaces".into(),
                severity: WarningSeverity::Warning,
                hint: Some("Use '127.0.0.1:8000' for local-only access, or set an api_key".into()),
            });
        }

        // ── API key ───
        if self.server.api_key.is_none() && self.server.listen.starts_with("0.0.0.0") {
            warnings.push(ConfigWarning {
                field: "server.api_key".into(),
                message: "no API key set while server is network-accessible".into(),
                severity: WarningSeverity::Warning,
                hint: Some("Set server.api_key to protect your tools".into()),
            });
        }

        // ── Logging format ───
        let valid_formats = ["pretty", "json", "compact"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            warnings.push(ConfigWarning {
                field: "logging.format".into(),
                message: format!("unknown log format '{}'", self.logging.format),
                severity: WarningSeverity::Warning,
                hint: Some(format!("Valid values: {}", valid_formats.join(", "))),
            });
        }

        // ── Logging level ───
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            warnings.push(ConfigWarning {
                field: "logging.level".into(),
                message: format!("unknown log level '{}'", self.logging.level),
                severity: WarningSeverity::Warning,
                hint: Some(format!("Valid values: {}", valid_levels.join(", "))),
            });
        }

        // Check for hard errors
        let errors: Vec<String> = warnings
            .iter()
            .filter(|w| w.severity == WarningSeverity::Error)
            .map(|w| format!("{}: {}", w.field, w.message))
            .collect();

        if !errors.is_empty() {
            return Err(format!("Configuration errors:\n  • {}", errors.join("\n  • ")));
        }

        Ok(warnings)
    }
}
