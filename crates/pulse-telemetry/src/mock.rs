//! In-memory transport and sleeper for deterministic testing.
//!
//! Nothing here touches the network or the clock.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use crate::backoff::Sleeper;
use crate::event::TelemetryEvent;
use crate::transport::{Transport, TransportError};

/// What the mock answers to one attempt.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// A response with this status code.
    Status(u16),
    /// A transport-level failure.
    Fail(String),
}

/// One request seen by [`MockTransport`].
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Value,
    pub timeout: Duration,
}

/// A transport that replays scripted replies, then falls back to a fixed one.
///
/// Cloning shares the script and the request log, so a clone handed to a
/// dispatcher can still be inspected by the test.
///
/// ```
/// use pulse_telemetry::mock::{MockReply, MockTransport};
/// let transport = MockTransport::new()
///     .with_reply(MockReply::Fail("refused".into()))
///     .with_reply(MockReply::Status(204));
/// assert_eq!(transport.calls(), 0);
/// ```
#[derive(Clone)]
pub struct MockTransport {
    script: Arc<Mutex<VecDeque<MockReply>>>,
    fallback: MockReply,
    delay: Option<Duration>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockTransport {
    /// Answers `200` to everything.
    pub fn new() -> Self {
        Self {
            script: Arc::new(Mutex::new(VecDeque::new())),
            fallback: MockReply::Status(200),
            delay: None,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Fails every attempt with a connection error.
    pub fn always_failing() -> Self {
        Self {
            fallback: MockReply::Fail("connection refused".into()),
            ..Self::new()
        }
    }

    /// Queue a reply for the next unscripted attempt.
    pub fn with_reply(self, reply: MockReply) -> Self {
        self.script.lock().push_back(reply);
        self
    }

    /// Hold every attempt for `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of attempts made so far.
    pub fn calls(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    /// Event types received, in arrival order.
    pub fn event_types(&self) -> Vec<String> {
        self.requests
            .lock()
            .iter()
            .filter_map(|r| r.body["type"].as_str().map(str::to_string))
            .collect()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(
        &self,
        url: &str,
        headers: &[(String, String)],
        event: &TelemetryEvent,
        timeout: Duration,
    ) -> Result<u16, TransportError> {
        self.requests.lock().push(RecordedRequest {
            url: url.to_string(),
            headers: headers.to_vec(),
            body: serde_json::to_value(event).unwrap_or(Value::Null),
            timeout,
        });

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let reply = self
            .script
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        match reply {
            MockReply::Status(code) => Ok(code),
            MockReply::Fail(msg) => Err(TransportError::Connect(msg)),
        }
    }
}

/// A sleeper that records requested waits and returns immediately.
#[derive(Clone, Default)]
pub struct RecordingSleeper {
    sleeps: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().push(duration);
    }
}
