use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{Shell, generate};
use pulse_config::{ConfigLoader, PulseConfig, WarningSeverity};
use pulse_core::PulseError;
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;

use crate::probe::ProbeMode;

mod openclaw;
mod serve;
mod telemetry;
mod tools;

/// Pulse: agent tool server with best-effort telemetry
#[derive(Parser)]
#[command(name = "pulse", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to pulse.toml config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level override (e.g. debug, info, warn, error)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Suppress all log output (errors only)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the tool server (JSON-RPC on /mcp, REST on /api/v1)
    Serve,
    /// Run the mock OpenClaw analysis API
    MockApi {
        /// Address to listen on
        #[arg(short = 'L', long, default_value = pulse_openclaw::DEFAULT_MOCK_LISTEN)]
        listen: String,
    },
    /// Call the OpenClaw API
    Openclaw {
        /// OpenClaw base URL (overrides config and OPENCLAW_BASE_URL)
        #[arg(long)]
        base_url: Option<String>,

        #[command(subcommand)]
        action: OpenClawAction,
    },
    /// Emit telemetry events or probe the endpoint
    Telemetry {
        #[command(subcommand)]
        action: TelemetryAction,
    },
    /// List or call tools without starting the server
    Tools {
        #[command(subcommand)]
        action: ToolsAction,
    },
    /// Show current configuration
    Config {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Audit configuration
    Doctor,
    /// Show version and build info
    Version,
    /// Generate shell completions for bash, zsh, or fish
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum OpenClawAction {
    /// Check whether the API answers GET /health with 200
    Health,
    /// Send a JSON payload to an endpoint
    Invoke {
        /// Endpoint path, e.g. /analyze
        endpoint: String,
        /// JSON payload
        #[arg(short, long, default_value = "{}")]
        payload: String,
        /// HTTP method
        #[arg(short, long, default_value = "POST")]
        method: String,
    },
    /// Run a prediction
    Predict {
        /// JSON payload
        #[arg(short, long, default_value = "{}")]
        payload: String,
        /// Prediction endpoint
        #[arg(short, long, default_value = pulse_openclaw::DEFAULT_PREDICT_ENDPOINT)]
        endpoint: String,
    },
}

#[derive(Subcommand)]
enum TelemetryAction {
    /// Track one event through the dispatcher and wait for it to drain
    Emit {
        /// Event type, e.g. integration.manual
        event_type: String,
        /// JSON object payload
        #[arg(short, long)]
        payload: Option<String>,
    },
    /// Send a diagnostic request and print the full exchange
    Probe {
        /// Request shape
        #[arg(short, long, value_enum, default_value = "plain")]
        mode: ProbeMode,
        /// Endpoint (default: resolved telemetry URL)
        #[arg(long)]
        url: Option<String>,
    },
}

#[derive(Subcommand)]
enum ToolsAction {
    /// List available tools
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Call a tool
    Call {
        /// Tool name, e.g. planner_agent
        name: String,
        /// JSON object of arguments
        #[arg(short, long, default_value = "{}")]
        args: String,
    },
}

/// Parse a JSON command-line argument.
fn parse_json_arg(flag: &str, raw: &str) -> pulse_core::Result<Value> {
    serde_json::from_str(raw)
        .map_err(|e| PulseError::Other(anyhow::anyhow!("--{flag} is not valid JSON: {e}")))
}

fn grace(config: &PulseConfig) -> Duration {
    Duration::from_secs(config.telemetry.shutdown_grace_secs)
}

impl Cli {
    pub async fn run(self) -> pulse_core::Result<()> {
        // Load config first so we can use it for log format
        let config_loader = ConfigLoader::load(self.config.as_deref())?;
        let config = config_loader.get();

        // Resolve log level: --verbose > --quiet > --log-level > config
        let log_level = if self.verbose {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            self.log_level
                .as_deref()
                .unwrap_or(config.logging.level.as_str())
        };
        init_tracing(&config.logging.format, log_level);

        match self.command {
            Commands::Serve => serve::cmd_serve(config).await,
            Commands::MockApi { listen } => serve::cmd_mock_api(&listen).await,
            Commands::Openclaw { base_url, action } => {
                openclaw::cmd_openclaw(config, base_url, action).await
            }
            Commands::Telemetry { action } => telemetry::cmd_telemetry(config, action).await,
            Commands::Tools { action } => tools::cmd_tools(config, action).await,
            Commands::Config { json } => Self::cmd_config(&config, json),
            Commands::Doctor => Self::cmd_doctor(&config, config_loader.path()),
            Commands::Version => Self::cmd_version(),
            Commands::Completions { shell } => Self::cmd_completions(shell),
        }
    }

    fn cmd_config(config: &PulseConfig, json: bool) -> pulse_core::Result<()> {
        if json {
            println!("{}", serde_json::to_string_pretty(config)?);
        } else {
            println!(
                "{}",
                toml::to_string_pretty(config).map_err(|e| PulseError::Config(e.to_string()))?
            );
        }
        Ok(())
    }

    fn cmd_doctor(config: &PulseConfig, path: &std::path::Path) -> pulse_core::Result<()> {
        println!("🩺 Pulse Doctor — Configuration Audit");
        println!();
        if path.exists() {
            println!("  📄 config: {}", path.display());
        } else {
            println!("  📄 config: {} (not found, using defaults)", path.display());
        }

        let warnings = match config.validate() {
            Ok(w) => w,
            Err(e) => {
                println!("{e}");
                return Ok(());
            }
        };

        let mut warn_count = 0;
        let mut info_count = 0;
        for w in &warnings {
            println!("  {w}");
            match w.severity {
                WarningSeverity::Warning => warn_count += 1,
                WarningSeverity::Info => info_count += 1,
                WarningSeverity::Error => {}
            }
        }

        if let Some(ref url) = config.telemetry.url {
            println!("  ✅ telemetry: {url}");
        }
        match config.openclaw.base_url {
            Some(ref url) => println!("  ✅ openclaw: {url}"),
            None => {
                println!("  💡 openclaw.base_url: not set — OpenClaw tools are disabled");
                info_count += 1;
            }
        }
        if config.server.api_key.is_some() {
            println!("  ✅ server.api_key: set");
        }

        println!();
        if warn_count == 0 {
            println!("✅ No warnings ({info_count} suggestion(s))");
        } else {
            println!("⚠️  {warn_count} warning(s), {info_count} suggestion(s)");
        }
        Ok(())
    }

    fn cmd_version() -> pulse_core::Result<()> {
        println!("Pulse v{}", env!("CARGO_PKG_VERSION"));
        println!("   Rust edition: 2024");
        println!("   Target: {}", std::env::consts::ARCH);
        println!("   OS: {}", std::env::consts::OS);
        #[cfg(debug_assertions)]
        println!("   Profile: debug");
        #[cfg(not(debug_assertions))]
        println!("   Profile: release");
        Ok(())
    }

    fn cmd_completions(shell: Shell) -> pulse_core::Result<()> {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "pulse", &mut std::io::stdout());
        Ok(())
    }
}

/// Install the global subscriber. `RUST_LOG` wins over `level` when set.
fn init_tracing(format: &str, level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    match format {
        "json" => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .with_target(true)
            .init(),
        "compact" => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .compact()
            .with_target(false)
            .init(),
        _ => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_probe_mode() {
        let cli = Cli::try_parse_from(["pulse", "telemetry", "probe", "--mode", "jsonrpc-session"])
            .unwrap();
        match cli.command {
            Commands::Telemetry {
                action: TelemetryAction::Probe { mode, url },
            } => {
                assert_eq!(mode, ProbeMode::JsonrpcSession);
                assert!(url.is_none());
            }
            _ => panic!("expected telemetry probe"),
        }
    }

    #[test]
    fn test_parse_openclaw_invoke_defaults() {
        let cli = Cli::try_parse_from([
            "pulse",
            "openclaw",
            "--base-url",
            "http://127.0.0.1:9000",
            "invoke",
            "/analyze",
        ])
        .unwrap();
        match cli.command {
            Commands::Openclaw {
                base_url,
                action: OpenClawAction::Invoke { endpoint, payload, method },
            } => {
                assert_eq!(base_url.as_deref(), Some("http://127.0.0.1:9000"));
                assert_eq!(endpoint, "/analyze");
                assert_eq!(payload, "{}");
                assert_eq!(method, "POST");
            }
            _ => panic!("expected openclaw invoke"),
        }
    }

    #[test]
    fn test_verbose_conflicts_with_quiet() {
        assert!(Cli::try_parse_from(["pulse", "-v", "-q", "version"]).is_err());
    }

    #[test]
    fn test_parse_json_arg() {
        assert_eq!(parse_json_arg("payload", r#"{"a":1}"#).unwrap()["a"], 1);
        let err = parse_json_arg("payload", "{oops").unwrap_err();
        assert!(err.to_string().contains("--payload"));
    }
}
