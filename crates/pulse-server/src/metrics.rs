//! Prometheus-compatible metrics for the Pulse server.
//!
//! Server counters live here; telemetry counters are read from the
//! dispatcher at render time.

use pulse_telemetry::StatsSnapshot;
use std::fmt::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

#[derive(Debug)]
struct MetricsInner {
    http_requests_total: AtomicU64,
    /// 4xx + 5xx responses.
    http_errors_total: AtomicU64,
    mcp_requests_total: AtomicU64,
    tool_calls_total: AtomicU64,
    tool_errors_total: AtomicU64,
    started_at: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner {
                http_requests_total: AtomicU64::new(0),
                http_errors_total: AtomicU64::new(0),
                mcp_requests_total: AtomicU64::new(0),
                tool_calls_total: AtomicU64::new(0),
                tool_errors_total: AtomicU64::new(0),
                started_at: Instant::now(),
            }),
        }
    }

    pub fn inc_http_requests(&self) {
        self.inner
            .http_requests_total
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_http_errors(&self) {
        self.inner.http_errors_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_mcp_requests(&self) {
        self.inner
            .mcp_requests_total
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_tool_calls(&self) {
        self.inner.tool_calls_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_tool_errors(&self) {
        self.inner.tool_errors_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn uptime_secs(&self) -> u64 {
        self.inner.started_at.elapsed().as_secs()
    }

    /// Render metrics in Prometheus text exposition format.
    pub fn render_prometheus(&self, telemetry: &StatsSnapshot) -> String {
        let m = &self.inner;
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);

        let rows: [(&str, &str, &str, u64); 12] = [
            ("pulse_uptime_seconds", "gauge", "Time since the server started.", self.uptime_secs()),
            ("pulse_http_requests_total", "counter", "Total HTTP requests served.", load(&m.http_requests_total)),
            ("pulse_http_errors_total", "counter", "Total HTTP errors (4xx/5xx).", load(&m.http_errors_total)),
            ("pulse_mcp_requests_total", "counter", "Total JSON-RPC requests handled.", load(&m.mcp_requests_total)),
            ("pulse_tool_calls_total", "counter", "Total tool calls executed.", load(&m.tool_calls_total)),
            ("pulse_tool_errors_total", "counter", "Total tool execution errors.", load(&m.tool_errors_total)),
            ("pulse_telemetry_tracked_total", "counter", "Events passed to the telemetry dispatcher.", telemetry.tracked),
            ("pulse_telemetry_delivered_total", "counter", "Telemetry events that reached the endpoint.", telemetry.delivered),
            ("pulse_telemetry_exhausted_total", "counter", "Telemetry events abandoned after all retries.", telemetry.exhausted),
            ("pulse_telemetry_dropped_total", "counter", "Telemetry events dropped before delivery.", telemetry.dropped),
            ("pulse_telemetry_disabled_total", "counter", "Telemetry events discarded with no endpoint.", telemetry.disabled),
            ("pulse_telemetry_attempts_total", "counter", "Telemetry POST attempts.", telemetry.attempts),
        ];

        let mut out = String::new();
        for (i, (name, kind, help, value)) in rows.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            let _ = writeln!(out, "# HELP {name} {help}");
            let _ = writeln!(out, "# TYPE {name} {kind}");
            let _ = writeln!(out, "{name} {value}");
        }
        out
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
