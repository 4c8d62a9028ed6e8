//! # pulse-telemetry
//!
//! Fire-and-forget event tracking. [`TelemetryDispatcher::track`] never
//! blocks and never fails: events are queued to a bounded pool of background
//! workers which POST them to the configured endpoint with exponential
//! backoff, and silently give up once the retry budget is spent.

pub mod backoff;
pub mod delivery;
pub mod dispatcher;
pub mod event;
pub mod mock;
pub mod stats;
pub mod transport;

pub use backoff::{Backoff, Sleeper, TokioSleeper};
pub use delivery::{DeliveryOutcome, DispatcherSettings};
pub use dispatcher::{DispatcherBuilder, TelemetryDispatcher};
pub use event::TelemetryEvent;
pub use stats::{StatsSnapshot, TelemetryStats};
pub use transport::{HttpTransport, Transport, TransportError};
