use pulse_config::PulseConfig;
use pulse_openclaw::OpenClawClient;
use serde_json::json;

use super::{OpenClawAction, parse_json_arg};

pub(super) async fn cmd_openclaw(
    mut config: PulseConfig,
    base_url: Option<String>,
    action: OpenClawAction,
) -> pulse_core::Result<()> {
    if base_url.is_some() {
        config.openclaw.base_url = base_url;
    }
    let client = OpenClawClient::from_config(&config.openclaw)?;

    let out = match action {
        OpenClawAction::Health => json!({"ok": client.health().await}),
        OpenClawAction::Invoke {
            endpoint,
            payload,
            method,
        } => {
            let payload = parse_json_arg("payload", &payload)?;
            client.invoke(&endpoint, &payload, &method).await?
        }
        OpenClawAction::Predict { payload, endpoint } => {
            let payload = parse_json_arg("payload", &payload)?;
            client.predict(&payload, Some(&endpoint)).await?
        }
    };
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}
