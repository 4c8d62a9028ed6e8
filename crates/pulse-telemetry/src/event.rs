use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single telemetry event: the body POSTed to the endpoint.
///
/// Immutable once built; the timestamp is taken when the event is created,
/// not when it is delivered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryEvent {
    #[serde(rename = "type")]
    event_type: String,
    timestamp: String,
    payload: Map<String, Value>,
}

impl TelemetryEvent {
    /// Build an event stamped with the current UTC time.
    pub fn new(event_type: impl Into<String>, payload: Option<Map<String, Value>>) -> Self {
        Self::at(event_type, payload, Utc::now())
    }

    /// Build an event with an explicit creation time.
    pub fn at(
        event_type: impl Into<String>,
        payload: Option<Map<String, Value>>,
        created: DateTime<Utc>,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            timestamp: format_timestamp(created),
            payload: payload.unwrap_or_default(),
        }
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }
}

/// ISO-8601 with microseconds and a trailing `Z`, e.g. `2026-10-17T09:14:03.120331Z`.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}
