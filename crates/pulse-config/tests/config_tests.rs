#[cfg(test)]
mod tests {
    use pulse_config::ConfigLoader;
    use pulse_config::schema::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    // ── Default tests ──────────────────────────────────────────

    #[test]
    fn test_telemetry_config_defaults() {
        let config = TelemetryConfig::default();
        assert!(config.url.is_none());
        assert!(config.headers.is_empty());
        assert_eq!(config.timeout_secs, 5);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.queue_capacity, 1024);
        assert_eq!(config.workers, 4);
    }

    #[test]
    fn test_openclaw_config_defaults() {
        let config = OpenClawConfig::default();
        assert!(config.base_url.is_none());
        assert!(config.api_key.is_none());
        assert_eq!(config.timeout_secs, 15);
    }

    #[test]
    fn test_server_config_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.listen, "127.0.0.1:8000");
        assert_eq!(config.host(), "127.0.0.1");
        assert_eq!(config.port(), Some("8000"));
        assert!(!config.cors);
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_logging_config_defaults() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, "info");
        assert_eq!(config.format, "pretty");
    }

    // ── TOML tests ─────────────────────────────────────────────

    #[test]
    fn test_config_toml_roundtrip() {
        let config = PulseConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let restored: PulseConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(restored.server.listen, config.server.listen);
        assert_eq!(restored.telemetry.max_retries, config.telemetry.max_retries);
    }

    #[test]
    fn test_partial_toml_applies_defaults() {
        let toml_str = r#"
[telemetry]
url = "https://telemetry.example.com/proxy"
max_retries = 5

[telemetry.headers]
Authorization = "Bearer abc"
"#;
        let config: PulseConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(
            config.telemetry.url.as_deref(),
            Some("https://telemetry.example.com/proxy")
        );
        assert_eq!(config.telemetry.max_retries, 5);
        assert_eq!(config.telemetry.headers["Authorization"], "Bearer abc");
        // Defaults should fill in
        assert_eq!(config.telemetry.timeout_secs, 5);
        assert_eq!(config.server.listen, "127.0.0.1:8000");
    }

    // ── Validation ─────────────────────────────────────────────

    #[test]
    fn test_default_config_is_valid_with_info() {
        let warnings = PulseConfig::default().validate().unwrap();
        assert!(warnings
            .iter()
            .any(|w| w.field == "telemetry.url" && w.severity == WarningSeverity::Info));
    }

    #[test]
    fn test_zero_workers_is_error() {
        let mut config = PulseConfig::default();
        config.telemetry.workers = 0;
        let err = config.validate().unwrap_err();
        assert!(err.contains("telemetry.workers"));
    }

    #[test]
    fn test_bad_telemetry_url_is_only_a_warning() {
        let mut config = PulseConfig::default();
        config.telemetry.url = Some("not a url".into());
        let warnings = config.validate().unwrap();
        assert!(warnings
            .iter()
            .any(|w| w.field == "telemetry.url" && w.severity == WarningSeverity::Warning));
    }

    #[test]
    fn test_bad_openclaw_url_is_error() {
        let mut config = PulseConfig::default();
        config.openclaw.base_url = Some("ftp://example.com".into());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_huge_max_retries_warns_without_overflow() {
        let mut config = PulseConfig::default();
        config.telemetry.max_retries = u32::MAX;
        let warnings = config.validate().unwrap();
        assert!(warnings
            .iter()
            .any(|w| w.field == "telemetry.max_retries" && w.severity == WarningSeverity::Warning));

        config.telemetry.max_retries = 11;
        let warnings = config.validate().unwrap();
        let w = warnings
            .iter()
            .find(|w| w.field == "telemetry.max_retries")
            .unwrap();
        assert!(w.message.contains("512s"));
    }

    #[test]
    fn test_public_listen_warns() {
        let mut config = PulseConfig::default();
        config.server.listen = "0.0.0.0:8000".into();
        let warnings = config.validate().unwrap();
        assert!(warnings.iter().any(|w| w.field == "server.api_key"));
    }

    // ── ConfigLoader tests ─────────────────────────────────────

    #[test]
    fn test_config_loader_with_file() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("pulse.toml");
        let mut f = std::fs::File::create(&config_path).unwrap();
        writeln!(
            f,
            r#"
[telemetry]
url = "http://127.0.0.1:7000/events"
timeout_secs = 2

[openclaw]
base_url = "http://127.0.0.1:9000/"

[server]
listen = "127.0.0.1:8100"
"#
        )
        .unwrap();

        let loader = ConfigLoader::load_with_env(
            Some(config_path.as_path()),
            &env_from(&[("MCP_TELEMETRY_URL", "http://env-loses")]),
        )
        .unwrap();
        let config = loader.get();
        assert_eq!(
            config.telemetry.url.as_deref(),
            Some("http://127.0.0.1:7000/events")
        );
        assert_eq!(config.telemetry.timeout_secs, 2);
        assert_eq!(
            config.openclaw.base_url.as_deref(),
            Some("http://127.0.0.1:9000")
        );
        assert_eq!(config.server.listen, "127.0.0.1:8100");
        assert_eq!(loader.path(), config_path.as_path());
    }

    #[test]
    fn test_config_loader_env_fills_telemetry_url() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("pulse.toml");
        std::fs::write(
            &config_path,
            format!(
                "[telemetry]\nworkspace_dir = {:?}\n",
                dir.path().display().to_string()
            ),
        )
        .unwrap();

        let loader = ConfigLoader::load_with_env(
            Some(config_path.as_path()),
            &env_from(&[("MCP_TELEMETRY_URL", "https://proxy.example.com")]),
        )
        .unwrap();
        assert_eq!(
            loader.get().telemetry.url.as_deref(),
            Some("https://proxy.example.com")
        );
    }

    #[test]
    fn test_config_loader_discovers_workspace_url() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".vscode")).unwrap();
        std::fs::write(
            dir.path().join(".vscode/mcp.json"),
            r#"{"servers":{"pulse":{"type":"http","url":"https://mcp.example.com/proxy"}}}"#,
        )
        .unwrap();
        let config_path = dir.path().join("pulse.toml");
        std::fs::write(
            &config_path,
            format!(
                "[telemetry]\nworkspace_dir = {:?}\n",
                dir.path().display().to_string()
            ),
        )
        .unwrap();

        let loader = ConfigLoader::load_with_env(Some(config_path.as_path()), &no_env).unwrap();
        assert_eq!(
            loader.get().telemetry.url.as_deref(),
            Some("https://mcp.example.com/proxy")
        );
    }

    #[test]
    fn test_config_loader_host_port_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        let loader = ConfigLoader::load_with_env(
            Some(missing.as_path()),
            &env_from(&[("MCP_PORT", "9100")]),
        )
        .unwrap();
        assert_eq!(loader.get().server.listen, "127.0.0.1:9100");

        let loader = ConfigLoader::load_with_env(
            Some(missing.as_path()),
            &env_from(&[("MCP_HOST", "localhost"), ("MCP_PORT", "9200")]),
        )
        .unwrap();
        assert_eq!(loader.get().server.listen, "localhost:9200");
    }

    #[test]
    fn test_config_loader_openclaw_env_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        let loader = ConfigLoader::load_with_env(
            Some(missing.as_path()),
            &env_from(&[
                ("OPENCLAW_BASE_URL", "http://127.0.0.1:9000"),
                ("OPENCLAW_API_KEY", "secret"),
            ]),
        )
        .unwrap();
        let config = loader.get();
        assert_eq!(config.openclaw.base_url.as_deref(), Some("http://127.0.0.1:9000"));
        assert_eq!(config.openclaw.api_key.as_deref(), Some("secret"));
    }

    #[test]
    fn test_config_loader_rejects_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("pulse.toml");
        std::fs::write(&config_path, "[telemetry\nurl = ").unwrap();
        let result = ConfigLoader::load_with_env(Some(config_path.as_path()), &no_env);
        assert!(matches!(result, Err(pulse_core::PulseError::Config(_))));
    }

    #[test]
    fn test_resolve_path_uses_injected_env() {
        let env = env_from(&[("PULSE_CONFIG", "/etc/pulse/custom.toml")]);
        assert_eq!(
            ConfigLoader::resolve_path_with_env(None, &env),
            std::path::PathBuf::from("/etc/pulse/custom.toml")
        );
        assert_eq!(
            ConfigLoader::resolve_path_with_env(Some(std::path::Path::new("explicit.toml")), &env),
            std::path::PathBuf::from("explicit.toml")
        );
        assert_eq!(
            ConfigLoader::resolve_path_with_env(None, &no_env),
            std::path::PathBuf::from("pulse.toml")
        );
    }

    #[test]
    fn test_config_loader_reads_path_from_injected_env() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("from-env.toml");
        std::fs::write(&config_path, "[server]\nlisten = \"127.0.0.1:8200\"\n").unwrap();
        let path = config_path.to_string_lossy().to_string();

        let loader =
            ConfigLoader::load_with_env(None, &env_from(&[("PULSE_CONFIG", path.as_str())])).unwrap();
        assert_eq!(loader.path(), config_path.as_path());
        assert_eq!(loader.get().server.listen, "127.0.0.1:8200");
    }
}
