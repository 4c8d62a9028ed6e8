use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::schema::PulseConfig;
use crate::workspace::resolve_telemetry_endpoint;

/// Loads the Pulse configuration and resolves derived values.
pub struct ConfigLoader {
    config: PulseConfig,
    config_path: PathBuf,
}

/// Read an environment variable, treating empty values as unset.
fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

impl ConfigLoader {
    /// Resolve the config path: explicit path > PULSE_CONFIG env > ./pulse.toml
    pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
        Self::resolve_path_with_env(explicit, &env_var)
    }

    /// Same as [`ConfigLoader::resolve_path`] with an injectable environment lookup.
    pub fn resolve_path_with_env(
        explicit: Option<&Path>,
        env: &dyn Fn(&str) -> Option<String>,
    ) -> PathBuf {
        if let Some(p) = explicit {
            return p.to_path_buf();
        }
        if let Some(p) = env("PULSE_CONFIG") {
            return PathBuf::from(p);
        }
        PathBuf::from("pulse.toml")
    }

    /// Load the config from disk, falling back to defaults.
    pub fn load(path: Option<&Path>) -> pulse_core::Result<Self> {
        Self::load_with_env(path, &env_var)
    }

    /// Same as [`ConfigLoader::load`] with an injectable environment lookup.
    pub fn load_with_env(
        path: Option<&Path>,
        env: &dyn Fn(&str) -> Option<String>,
    ) -> pulse_core::Result<Self> {
        let config_path = Self::resolve_path_with_env(path, env);
        let config = if config_path.exists() {
            info!(?config_path, "loading configuration");
            let raw = std::fs::read_to_string(&config_path)?;
            Self::parse(&raw, &config_path)?
        } else {
            if path.is_some() {
                warn!(?config_path, "config file not found, using defaults");
            }
            PulseConfig::default()
        };

        let config = Self::apply_env_overrides(config, env);
        let config = Self::resolve_telemetry(config, env);

        // Validate config: log warnings, fail on errors
        match config.validate() {
            Ok(warnings) => {
                for w in &warnings {
                    warn!("{}", w);
                }
            }
            Err(e) => {
                return Err(pulse_core::PulseError::Config(e));
            }
        }

        Ok(Self {
            config,
            config_path,
        })
    }

    fn parse(raw: &str, config_path: &Path) -> pulse_core::Result<PulseConfig> {
        toml::from_str::<PulseConfig>(raw).map_err(|e| {
            pulse_core::PulseError::Config(format!(
                "failed to parse {}: {}",
                config_path.display(),
                e
            ))
        })
    }

    /// Get a snapshot of the loaded config.
    pub fn get(&self) -> PulseConfig {
        self.config.clone()
    }

    /// Path the config was (or would have been) read from.
    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Apply env var overrides (OPENCLAW_BASE_URL, MCP_HOST, MCP_PORT, etc.)
    pub fn apply_env_overrides(
        mut config: PulseConfig,
        env: &dyn Fn(&str) -> Option<String>,
    ) -> PulseConfig {
        // OpenClaw: env fills in when the config file doesn't set the value.
        if config.openclaw.base_url.is_none() {
            config.openclaw.base_url = env("OPENCLAW_BASE_URL");
        }
        if config.openclaw.api_key.is_none() {
            config.openclaw.api_key = env("OPENCLAW_API_KEY");
        }
        if let Some(ref mut base) = config.openclaw.base_url {
            let trimmed = base.trim_end_matches('/').len();
            base.truncate(trimmed);
        }

        // MCP_HOST / MCP_PORT replace the matching half of the listen address.
        let host = env("MCP_HOST");
        let port = env("MCP_PORT");
        if host.is_some() || port.is_some() {
            let host = host.unwrap_or_else(|| config.server.host().to_string());
            let port = port
                .or_else(|| config.server.port().map(str::to_string))
                .unwrap_or_else(|| "8000".into());
            config.server.listen = format!("{host}:{port}");
        }

        if let Some(v) = env("PULSE_LOG_LEVEL") {
            config.logging.level = v;
        }
        config
    }

    /// Fill `telemetry.url` from MCP_TELEMETRY_URL or the workspace file
    /// when the config file doesn't set it.
    fn resolve_telemetry(
        mut config: PulseConfig,
        env: &dyn Fn(&str) -> Option<String>,
    ) -> PulseConfig {
        let workspace_dir = config
            .telemetry
            .workspace_dir
            .clone()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."));

        config.telemetry.url = resolve_telemetry_endpoint(
            config.telemetry.url.as_deref(),
            env("MCP_TELEMETRY_URL").as_deref(),
            &workspace_dir,
        );
        config
    }
}
