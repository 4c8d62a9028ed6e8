use pulse_config::PulseConfig;
use pulse_telemetry::TelemetryDispatcher;
use pulse_tools::ToolRegistry;
use tracing::info;

pub(super) async fn cmd_serve(config: PulseConfig) -> pulse_core::Result<()> {
    let telemetry = TelemetryDispatcher::from_config(&config.telemetry);
    let registry = ToolRegistry::from_config(&config, Some(telemetry.clone()))?;
    info!(tools = registry.len(), "tool registry ready");

    pulse_server::start_server(config.server.clone(), registry, telemetry, super::grace(&config))
        .await
}

pub(super) async fn cmd_mock_api(listen: &str) -> pulse_core::Result<()> {
    println!("OpenClaw mock API on http://{listen} (Ctrl-C to stop)");
    pulse_openclaw::serve_mock(listen).await
}
