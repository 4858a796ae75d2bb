//! Observability for the execution engine
//!
//! - Structured JSON log lines ([`Logger`])
//! - Typed lifecycle events ([`Event`])
//! - Invocation scopes that always log an outcome ([`ObservationScope`])
//! - Monotonic counters ([`EngineMetrics`])
//!
//! # Principles
//!
//! 1. Observability never changes an invocation's result
//! 2. Logging is synchronous; there are no background threads
//! 3. Log lines are deterministic for the same event and fields

mod events;
mod logger;
mod metrics;
mod scope;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use metrics::{EngineMetrics, MetricsSnapshot};
pub use scope::ObservationScope;

/// Logs `event` at its own severity
pub fn log_event(event: Event) {
    Logger::log(event.severity(), event.as_str(), &[]);
}

/// Logs `event` at its own severity with fields
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    Logger::log(event.severity(), event.as_str(), fields);
}
