use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, info, trace, warn};

use pulse_config::TelemetryConfig;

use crate::backoff::{Sleeper, TokioSleeper};
use crate::delivery::{DeliveryOutcome, DispatcherSettings, deliver};
use crate::event::TelemetryEvent;
use crate::stats::{StatsSnapshot, TelemetryStats};
use crate::transport::{HttpTransport, Transport};

type SharedReceiver = Arc<tokio::sync::Mutex<mpsc::Receiver<TelemetryEvent>>>;

/// Non-blocking telemetry client.
///
/// Cheap to clone; clones share the queue, the workers and the counters.
/// `track` never blocks the caller and never reports failure. Delivery
/// happens on a fixed pool of background workers fed by a bounded queue.
/// The pool starts on the first Tokio runtime the dispatcher sees, either
/// at `build` or at a later `track`.
#[derive(Clone)]
pub struct TelemetryDispatcher {
    inner: Arc<Inner>,
}

struct Inner {
    settings: Arc<DispatcherSettings>,
    state: Mutex<State>,
    stats: Arc<TelemetryStats>,
}

enum State {
    /// Endpoint configured, waiting for a runtime to start the pool on.
    Idle {
        transport: Arc<dyn Transport>,
        sleeper: Arc<dyn Sleeper>,
    },
    Running(Pool),
    /// Disabled or shut down.
    Stopped,
}

struct Pool {
    sender: mpsc::Sender<TelemetryEvent>,
    receiver: SharedReceiver,
    workers: Vec<JoinHandle<()>>,
}

impl Pool {
    fn start(
        handle: &Handle,
        settings: &Arc<DispatcherSettings>,
        stats: &Arc<TelemetryStats>,
        transport: Arc<dyn Transport>,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        let (sender, rx) = mpsc::channel(settings.queue_capacity);
        let receiver: SharedReceiver = Arc::new(tokio::sync::Mutex::new(rx));
        let workers = (0..settings.workers)
            .map(|id| {
                handle.spawn(worker_loop(
                    id,
                    receiver.clone(),
                    settings.clone(),
                    transport.clone(),
                    sleeper.clone(),
                    stats.clone(),
                ))
            })
            .collect();

        info!(
            endpoint = settings.endpoint.as_deref().unwrap_or_default(),
            workers = settings.workers,
            queue = settings.queue_capacity,
            "telemetry enabled"
        );
        Self {
            sender,
            receiver,
            workers,
        }
    }
}

impl State {
    /// Start the pool if it is idle and a runtime is available.
    fn ensure_running(&mut self, settings: &Arc<DispatcherSettings>, stats: &Arc<TelemetryStats>) {
        let State::Idle { transport, sleeper } = self else {
            return;
        };
        let Ok(handle) = Handle::try_current() else {
            return;
        };
        let pool = Pool::start(&handle, settings, stats, transport.clone(), sleeper.clone());
        *self = State::Running(pool);
    }

    fn worker_count(&self) -> usize {
        match self {
            State::Running(pool) => pool.workers.len(),
            _ => 0,
        }
    }
}

impl std::fmt::Debug for TelemetryDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryDispatcher")
            .field("endpoint", &self.inner.settings.endpoint)
            .field("workers", &self.inner.state.lock().worker_count())
            .finish()
    }
}

impl TelemetryDispatcher {
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::default()
    }

    /// Build a dispatcher from the `[telemetry]` config section.
    ///
    /// `config.url` is expected to be resolved already (see
    /// `pulse_config::resolve_telemetry_endpoint`).
    pub fn from_config(config: &TelemetryConfig) -> Self {
        let mut builder = Self::builder()
            .maybe_endpoint(config.url.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .max_retries(config.max_retries)
            .queue_capacity(config.queue_capacity)
            .workers(config.workers);

        if !config.headers.is_empty() {
            let mut headers: Vec<(String, String)> = config
                .headers
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            headers.sort();
            builder = builder.headers(headers);
        }
        builder.build()
    }

    /// A dispatcher with no endpoint. Every event is discarded.
    pub fn disabled() -> Self {
        Self::builder().build()
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.settings.is_enabled()
    }

    pub fn endpoint(&self) -> Option<&str> {
        self.inner.settings.endpoint.as_deref()
    }

    pub fn settings(&self) -> &DispatcherSettings {
        &self.inner.settings
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.inner.stats.snapshot()
    }

    /// Record an event. Returns immediately.
    ///
    /// `payload` must be a JSON object; `None` and `null` become `{}`.
    /// Any other value is dropped. When disabled, stopped or saturated the
    /// event is silently discarded, as it is when the pool has not started
    /// and there is still no Tokio runtime to start it on.
    pub fn track(&self, event_type: &str, payload: Option<Value>) {
        let stats = &self.inner.stats;
        stats.inc_tracked();

        if !self.is_enabled() {
            stats.inc_disabled();
            trace!(event_type, "telemetry disabled, discarding event");
            return;
        }

        let payload = match payload {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(map)) => map,
            Some(other) => {
                stats.inc_dropped();
                debug!(event_type, kind = json_kind(&other), "telemetry payload is not an object");
                return;
            }
        };
        let event = TelemetryEvent::new(event_type, Some(payload));

        let mut state = self.inner.state.lock();
        state.ensure_running(&self.inner.settings, stats);
        let sender = match &*state {
            State::Running(pool) => &pool.sender,
            State::Idle { .. } => {
                stats.inc_dropped();
                trace!(event_type, "no Tokio runtime yet, discarding event");
                return;
            }
            State::Stopped => {
                stats.inc_dropped();
                trace!(event_type, "telemetry stopped, discarding event");
                return;
            }
        };

        match sender.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                stats.inc_dropped();
                debug!(event_type = event.event_type(), "telemetry queue full, dropping event");
            }
            Err(TrySendError::Closed(event)) => {
                stats.inc_dropped();
                trace!(event_type = event.event_type(), "telemetry queue closed, dropping event");
            }
        }
    }

    /// Like [`track`](Self::track) for any serializable payload.
    pub fn track_value<T: Serialize + ?Sized>(&self, event_type: &str, payload: &T) {
        match serde_json::to_value(payload) {
            Ok(value) => self.track(event_type, Some(value)),
            Err(e) => {
                self.inner.stats.inc_tracked();
                self.inner.stats.inc_dropped();
                debug!(event_type, error = %e, "telemetry payload not serializable");
            }
        }
    }

    /// Stop accepting events and wait up to `grace` for queued ones to be
    /// delivered. Returns `false` if the grace period ran out first; the
    /// sequences still in flight are then cancelled and, like the events
    /// left in the queue, counted as dropped.
    ///
    /// Idempotent. Events tracked afterwards are dropped.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        let previous = {
            let mut state = self.inner.state.lock();
            std::mem::replace(&mut *state, State::Stopped)
        };
        let State::Running(pool) = previous else {
            return true;
        };
        let Pool {
            sender,
            receiver,
            mut workers,
        } = pool;

        // Dropping the sender closes the queue; workers exit once it's empty.
        drop(sender);

        let drain = async {
            for worker in workers.iter_mut() {
                let _ = worker.await;
            }
        };
        if tokio::time::timeout(grace, drain).await.is_ok() {
            debug!("telemetry queue drained");
            return true;
        }

        for worker in &workers {
            worker.abort();
        }
        for worker in workers {
            let _ = worker.await;
        }

        let abandoned = {
            let mut rx = receiver.lock().await;
            rx.close();
            let mut n = 0u64;
            while rx.try_recv().is_ok() {
                n += 1;
            }
            n
        };
        self.inner.stats.add_dropped(abandoned);
        warn!(?grace, abandoned, "telemetry shutdown grace expired, abandoning queued events");
        false
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Builder for [`TelemetryDispatcher`].
pub struct DispatcherBuilder {
    settings: DispatcherSettings,
    transport: Option<Arc<dyn Transport>>,
    sleeper: Option<Arc<dyn Sleeper>>,
}

impl Default for DispatcherBuilder {
    fn default() -> Self {
        Self {
            settings: DispatcherSettings::default(),
            transport: None,
            sleeper: None,
        }
    }
}

impl DispatcherBuilder {
    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.settings.endpoint = Some(url.into());
        self
    }

    /// Set or clear the endpoint. Empty strings clear it.
    pub fn maybe_endpoint(mut self, url: Option<String>) -> Self {
        self.settings.endpoint = url.filter(|u| !u.trim().is_empty());
        self
    }

    /// Replace the default headers entirely.
    pub fn headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.settings.headers = headers;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.settings.timeout = timeout;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.settings.max_retries = n;
        self
    }

    pub fn queue_capacity(mut self, n: usize) -> Self {
        self.settings.queue_capacity = n;
        self
    }

    pub fn workers(mut self, n: usize) -> Self {
        self.settings.workers = n;
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = Some(sleeper);
        self
    }

    /// Build the dispatcher. Workers start right away on the current Tokio
    /// runtime, or on the first `track` made inside one.
    pub fn build(self) -> TelemetryDispatcher {
        let mut settings = self.settings;
        settings.queue_capacity = settings.queue_capacity.max(1);
        settings.workers = settings.workers.max(1);
        let settings = Arc::new(settings);
        let stats = Arc::new(TelemetryStats::new());

        let transport: Option<Arc<dyn Transport>> = match self.transport {
            Some(transport) => Some(transport),
            None if settings.is_enabled() => match HttpTransport::new() {
                Ok(transport) => Some(Arc::new(transport)),
                Err(e) => {
                    warn!(error = %e, "telemetry disabled, no HTTP transport");
                    None
                }
            },
            None => None,
        };

        let mut state = match transport {
            Some(transport) if settings.is_enabled() => State::Idle {
                transport,
                sleeper: self.sleeper.unwrap_or_else(|| Arc::new(TokioSleeper)),
            },
            _ => {
                if !settings.is_enabled() {
                    debug!("no telemetry endpoint configured");
                }
                State::Stopped
            }
        };

        state.ensure_running(&settings, &stats);
        if matches!(state, State::Idle { .. }) {
            debug!("no Tokio runtime yet, telemetry workers start on first use");
        }

        TelemetryDispatcher {
            inner: Arc::new(Inner {
                settings,
                state: Mutex::new(state),
                stats,
            }),
        }
    }
}

/// A delivery task owned by a worker. Dropping it before it finishes
/// (the worker was aborted) cancels the sequence and counts the event as dropped.
struct InFlight {
    task: JoinHandle<DeliveryOutcome>,
    stats: Arc<TelemetryStats>,
    finished: bool,
}

impl InFlight {
    async fn join(&mut self) -> Result<DeliveryOutcome, JoinError> {
        let result = (&mut self.task).await;
        self.finished = true;
        result
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if !self.finished {
            self.task.abort();
            self.stats.inc_dropped();
        }
    }
}

async fn worker_loop(
    id: usize,
    rx: SharedReceiver,
    settings: Arc<DispatcherSettings>,
    transport: Arc<dyn Transport>,
    sleeper: Arc<dyn Sleeper>,
    stats: Arc<TelemetryStats>,
) {
    loop {
        let next = rx.lock().await.recv().await;
        let Some(event) = next else {
            break;
        };
        let event_type = event.event_type().to_string();

        // Each delivery runs in its own task so a panic only loses this event.
        let task = tokio::spawn({
            let settings = settings.clone();
            let transport = transport.clone();
            let sleeper = sleeper.clone();
            let stats = stats.clone();
            async move {
                deliver(
                    &settings,
                    transport.as_ref(),
                    sleeper.as_ref(),
                    &stats,
                    &event,
                )
                .await
            }
        });

        let mut in_flight = InFlight {
            task,
            stats: stats.clone(),
            finished: false,
        };

        match in_flight.join().await {
            Ok(DeliveryOutcome::Succeeded { attempts }) => {
                stats.inc_delivered();
                trace!(worker = id, event_type = %event_type, attempts, "telemetry delivered");
            }
            Ok(DeliveryOutcome::Exhausted { attempts }) => {
                stats.inc_exhausted();
                debug!(worker = id, event_type = %event_type, attempts, "telemetry retries exhausted, giving up");
            }
            Ok(DeliveryOutcome::Disabled) => {}
            Err(e) => {
                warn!(worker = id, event_type = %event_type, error = %e, "telemetry delivery task failed");
            }
        }
    }
    trace!(worker = id, "telemetry worker stopped");
}
