use pulse_config::PulseConfig;
use pulse_core::{PulseError, ToolExecutor};
use pulse_telemetry::TelemetryDispatcher;
use pulse_tools::ToolRegistry;

use super::{ToolsAction, grace, parse_json_arg};

pub(super) async fn cmd_tools(config: PulseConfig, action: ToolsAction) -> pulse_core::Result<()> {
    match action {
        ToolsAction::List { json } => {
            let registry = ToolRegistry::from_config(&config, None)?;
            let tools = registry.tools();
            if json {
                println!("{}", serde_json::to_string_pretty(&tools)?);
                return Ok(());
            }
            println!("\x1b[1mTools\x1b[0m ({})", tools.len());
            for t in &tools {
                let provider = t.provider.as_deref().unwrap_or("builtin");
                println!("  {:<18} \x1b[90m[{provider}]\x1b[0m {}", t.name, t.description);
            }
            Ok(())
        }
        ToolsAction::Call { name, args } => {
            let args = parse_json_arg("args", &args)?;
            if !args.is_object() {
                return Err(PulseError::tool(&name, "--args must be a JSON object"));
            }

            let telemetry = TelemetryDispatcher::from_config(&config.telemetry);
            let registry = ToolRegistry::from_config(&config, Some(telemetry.clone()))?;
            let result = registry.call(&name, args).await;
            telemetry.shutdown(grace(&config)).await;

            let result = result?;
            println!("{}", result.content);
            Ok(())
        }
    }
}
