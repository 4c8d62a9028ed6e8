use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Internal counters. Purely observational; nothing reads them on the
/// delivery path.
#[derive(Debug, Default)]
pub struct TelemetryStats {
    tracked: AtomicU64,
    disabled: AtomicU64,
    dropped: AtomicU64,
    attempts: AtomicU64,
    delivered: AtomicU64,
    exhausted: AtomicU64,
}

/// Point-in-time copy of [`TelemetryStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Calls to `track`.
    pub tracked: u64,
    /// Events discarded because no endpoint is configured.
    pub disabled: u64,
    /// Events dropped before delivery (queue full/closed, no runtime, bad payload,
    /// abandoned at shutdown).
    pub dropped: u64,
    /// Individual POST attempts.
    pub attempts: u64,
    /// Sequences that ended with a response.
    pub delivered: u64,
    /// Sequences that ran out of retries.
    pub exhausted: u64,
}

impl TelemetryStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn inc_tracked(&self) {
        self.tracked.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_disabled(&self) {
        self.disabled.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_dropped(&self, n: u64) {
        self.dropped.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn inc_attempts(&self) {
        self.attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_exhausted(&self) {
        self.exhausted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            tracked: self.tracked.load(Ordering::Relaxed),
            disabled: self.disabled.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            attempts: self.attempts.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            exhausted: self.exhausted.load(Ordering::Relaxed),
        }
    }
}
