//! One event's delivery sequence: the first attempt plus bounded retries.

use std::time::Duration;
use tracing::debug;

use crate::backoff::{Backoff, Sleeper};
use crate::event::TelemetryEvent;
use crate::stats::TelemetryStats;
use crate::transport::Transport;

/// Immutable dispatcher configuration, shared by every worker.
#[derive(Debug, Clone)]
pub struct DispatcherSettings {
    /// None = telemetry disabled.
    pub endpoint: Option<String>,
    pub headers: Vec<(String, String)>,
    /// Per-attempt timeout.
    pub timeout: Duration,
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub queue_capacity: usize,
    pub workers: usize,
}

impl DispatcherSettings {
    pub fn default_headers() -> Vec<(String, String)> {
        vec![("Content-Type".to_string(), "application/json".to_string())]
    }

    pub fn is_enabled(&self) -> bool {
        self.endpoint.is_some()
    }
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            headers: Self::default_headers(),
            timeout: Duration::from_secs(5),
            max_retries: 3,
            queue_capacity: 1024,
            workers: 4,
        }
    }
}

/// How a delivery sequence ended. Never surfaced to `track` callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// No endpoint; nothing was sent.
    Disabled,
    /// An attempt got a response (any status).
    Succeeded { attempts: u32 },
    /// Every attempt failed at the transport level.
    Exhausted { attempts: u32 },
}

/// Run the delivery sequence for `event`.
///
/// Makes at most `max_retries + 1` attempts, sleeping 0.5s, 1s, 2s, …
/// between them. A response of any status ends the sequence.
pub async fn deliver(
    settings: &DispatcherSettings,
    transport: &dyn Transport,
    sleeper: &dyn Sleeper,
    stats: &TelemetryStats,
    event: &TelemetryEvent,
) -> DeliveryOutcome {
    let Some(url) = settings.endpoint.as_deref() else {
        return DeliveryOutcome::Disabled;
    };

    let total_attempts = settings.max_retries.saturating_add(1);
    let mut backoff = Backoff::default();

    for attempt in 1..=total_attempts {
        stats.inc_attempts();
        match transport
            .send(url, &settings.headers, event, settings.timeout)
            .await
        {
            Ok(status) => {
                if !(200..300).contains(&status) {
                    // Still counts as delivered: the endpoint answered.
                    debug!(
                        event_type = event.event_type(),
                        status, "telemetry endpoint returned non-success status"
                    );
                }
                return DeliveryOutcome::Succeeded { attempts: attempt };
            }
            Err(e) => {
                debug!(
                    event_type = event.event_type(),
                    attempt,
                    max = total_attempts,
                    error = %e,
                    "telemetry attempt failed"
                );
                if attempt < total_attempts {
                    sleeper.sleep(backoff.next_delay()).await;
                }
            }
        }
    }

    DeliveryOutcome::Exhausted {
        attempts: total_attempts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockReply, MockTransport, RecordingSleeper};
    use serde_json::json;

    fn settings(max_retries: u32) -> DispatcherSettings {
        DispatcherSettings {
            endpoint: Some("http://telemetry.test/events".into()),
            max_retries,
            ..Default::default()
        }
    }

    fn event() -> TelemetryEvent {
        TelemetryEvent::new("unit.test", json!({"k": "v"}).as_object().cloned())
    }

    #[tokio::test]
    async fn test_disabled_sends_nothing() {
        let transport = MockTransport::new();
        let sleeper = RecordingSleeper::new();
        let stats = TelemetryStats::new();
        let outcome = deliver(
            &DispatcherSettings::default(),
            &transport,
            &sleeper,
            &stats,
            &event(),
        )
        .await;
        assert_eq!(outcome, DeliveryOutcome::Disabled);
        assert_eq!(transport.calls(), 0);
        assert_eq!(stats.snapshot().attempts, 0);
    }

    #[tokio::test]
    async fn test_retry_bound_is_max_retries_plus_one() {
        for n in [0u32, 1, 3, 5] {
            let transport = MockTransport::always_failing();
            let sleeper = RecordingSleeper::new();
            let stats = TelemetryStats::new();
            let outcome = deliver(&settings(n), &transport, &sleeper, &stats, &event()).await;
            assert_eq!(outcome, DeliveryOutcome::Exhausted { attempts: n + 1 });
            assert_eq!(transport.calls(), (n + 1) as usize);
            assert_eq!(sleeper.sleeps().len(), n as usize);
        }
    }

    #[tokio::test]
    async fn test_backoff_doubles_between_attempts() {
        let transport = MockTransport::always_failing();
        let sleeper = RecordingSleeper::new();
        let stats = TelemetryStats::new();
        deliver(&settings(3), &transport, &sleeper, &stats, &event()).await;
        assert_eq!(
            sleeper.sleeps(),
            vec![
                Duration::from_millis(500),
                Duration::from_millis(1000),
                Duration::from_millis(2000),
            ]
        );
    }

    #[tokio::test]
    async fn test_first_success_short_circuits() {
        let transport = MockTransport::new();
        let sleeper = RecordingSleeper::new();
        let stats = TelemetryStats::new();
        let outcome = deliver(&settings(3), &transport, &sleeper, &stats, &event()).await;
        assert_eq!(outcome, DeliveryOutcome::Succeeded { attempts: 1 });
        assert_eq!(transport.calls(), 1);
        assert!(sleeper.sleeps().is_empty());
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failures() {
        let transport = MockTransport::new()
            .with_reply(MockReply::Fail("connection refused".into()))
            .with_reply(MockReply::Fail("connection reset".into()));
        let sleeper = RecordingSleeper::new();
        let stats = TelemetryStats::new();
        let outcome = deliver(&settings(3), &transport, &sleeper, &stats, &event()).await;
        assert_eq!(outcome, DeliveryOutcome::Succeeded { attempts: 3 });
        assert_eq!(
            sleeper.sleeps(),
            vec![Duration::from_millis(500), Duration::from_secs(1)]
        );
        assert_eq!(stats.snapshot().attempts, 3);
    }

    #[tokio::test]
    async fn test_error_status_is_not_retried() {
        let transport = MockTransport::new().with_reply(MockReply::Status(503));
        let sleeper = RecordingSleeper::new();
        let stats = TelemetryStats::new();
        let outcome = deliver(&settings(3), &transport, &sleeper, &stats, &event()).await;
        assert_eq!(outcome, DeliveryOutcome::Succeeded { attempts: 1 });
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_request_carries_settings() {
        let transport = MockTransport::new();
        let sleeper = RecordingSleeper::new();
        let stats = TelemetryStats::new();
        let mut s = settings(0);
        s.timeout = Duration::from_secs(7);
        s.headers = vec![("X-Device".into(), "linux".into())];
        deliver(&s, &transport, &sleeper, &stats, &event()).await;

        let req = &transport.requests()[0];
        assert_eq!(req.url, "http://telemetry.test/events");
        assert_eq!(req.timeout, Duration::from_secs(7));
        assert_eq!(req.headers, vec![("X-Device".to_string(), "linux".to_string())]);
        assert_eq!(req.body["type"], "unit.test");
    }
}
