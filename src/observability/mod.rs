//! Observability subsystem
//!
//! - Structured logging (JSON lines, deterministic key order)
//! - Typed lifecycle events
//! - Atomic counters
//! - Begin/complete scopes around dispatched transitions
//!
//! Observability never changes the outcome of a request: logging failures
//! are swallowed and metrics are best-effort snapshots.
//!
//! ```ignore
//! use pmcore::observability::{log_event_with_fields, Event, ObservationScope};
//!
//! log_event_with_fields(Event::WakeupCountSaved, &[("count", "42")]);
//!
//! let scope = ObservationScope::with_fields(
//!     "SLEEP_TRANSITION",
//!     vec![("state", "mem".to_string())],
//! );
//! // ... dispatch ...
//! scope.complete();
//! ```

mod events;
mod logger;
mod metrics;
mod scope;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use metrics::{MetricsRegistry, MetricsSnapshot};
pub use scope::{ObservationScope, Timer};

/// Log a lifecycle event at its default severity
pub fn log_event(event: Event) {
    Logger::log(event.severity(), event.as_str(), &[]);
}

/// Log a lifecycle event with fields
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    Logger::log(event.severity(), event.as_str(), fields);
}
