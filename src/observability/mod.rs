//! Observability for docshard
//!
//! - Structured logging (JSON lines on stderr)
//! - Typed lifecycle events
//! - Begin/complete scopes around fan-outs
//!
//! Observability is read-only: a logging failure never fails a query.
//!
//! ```ignore
//! use docshard::observability::{log_event_with_fields, Event, ObservationScope};
//!
//! log_event_with_fields(Event::IndexCreated, &[("field", "title")]);
//!
//! let scope = ObservationScope::with_fields("FANOUT", &[("store", "movies")]);
//! // ... query partitions ...
//! scope.complete();
//! ```

mod events;
mod logger;
mod scope;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use scope::ObservationScope;

/// Log a lifecycle event
pub fn log_event(event: Event) {
    Logger::log(event.severity(), event.as_str(), &[]);
}

/// Log a lifecycle event with fields
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    Logger::log(event.severity(), event.as_str(), fields);
}
