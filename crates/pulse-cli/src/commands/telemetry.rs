use pulse_config::PulseConfig;
use pulse_core::PulseError;
use pulse_telemetry::{TelemetryDispatcher, TokioSleeper};
use serde_json::Value;

use super::{TelemetryAction, grace, parse_json_arg};
use crate::probe::{ProbeMode, build_probe, send_probe};

pub(super) async fn cmd_telemetry(config: PulseConfig, action: TelemetryAction) -> pulse_core::Result<()> {
    match action {
        TelemetryAction::Emit {
            event_type,
            payload,
        } => {
            let payload = match payload {
                Some(raw) => match parse_json_arg("payload", &raw)? {
                    v @ (Value::Object(_) | Value::Null) => Some(v),
                    _ => {
                        return Err(PulseError::Other(anyhow::anyhow!(
                            "--payload must be a JSON object"
                        )));
                    }
                },
                None => None,
            };
            cmd_emit(&config, &event_type, payload).await
        }
        TelemetryAction::Probe { mode, url } => cmd_probe(&config, mode, url).await,
    }
}

async fn cmd_emit(config: &PulseConfig, event_type: &str, payload: Option<Value>) -> pulse_core::Result<()> {
    let telemetry = TelemetryDispatcher::from_config(&config.telemetry);
    let Some(endpoint) = telemetry.endpoint().map(str::to_string) else {
        println!("⚠️  No telemetry endpoint configured, event discarded");
        return Ok(());
    };

    telemetry.track(event_type, payload);
    let drained = telemetry.shutdown(grace(config)).await;
    let stats = telemetry.stats();

    if stats.delivered > 0 {
        println!("✅ {event_type} delivered to {endpoint} ({} attempt(s))", stats.attempts);
    } else if !drained {
        println!("⏳ {event_type} still in flight when the grace period ended");
    } else {
        println!(
            "❌ {event_type} not delivered to {endpoint} after {} attempt(s)",
            stats.attempts
        );
    }
    Ok(())
}

async fn cmd_probe(config: &PulseConfig, mode: ProbeMode, url: Option<String>) -> pulse_core::Result<()> {
    let url = url
        .filter(|u| !u.is_empty())
        .or_else(|| config.telemetry.url.clone())
        .ok_or_else(|| {
            PulseError::Config(
                "no telemetry endpoint: pass --url or set MCP_TELEMETRY_URL".into(),
            )
        })?;

    let env = |key: &str| std::env::var(key).ok().filter(|v| !v.is_empty());
    let request = build_probe(mode, &url, &env);
    let client = reqwest::Client::builder()
        .tcp_keepalive(None)
        .build()
        .map_err(|e| PulseError::Http(format!("failed to build HTTP client: {e}")))?;

    let response = send_probe(&client, &request, &TokioSleeper).await?;
    println!("\nDone. Final response status: {}", response.status);

    if mode != ProbeMode::Plain && response.status >= 400 {
        return Err(PulseError::Http(format!(
            "telemetry endpoint answered {}",
            response.status
        )));
    }
    Ok(())
}
