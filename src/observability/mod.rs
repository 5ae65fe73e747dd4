//! Observability subsystem
//!
//! - Typed lifecycle events, logged through `tracing`
//! - Store counters
//!
//! Observability is read-only: logging never changes the outcome of an
//! operation. Subscriber installation belongs to the binary.
//!
//! # Usage
//!
//! ```ignore
//! use regstore::observability::{log_event_with_fields, Event};
//!
//! log_event_with_fields(Event::StatusChanged, &[("uri", uri), ("status", "stable")]);
//! ```

mod events;
mod metrics;

pub use events::Event;
pub use metrics::{MetricsSnapshot, StoreMetrics};

use tracing::Level;

/// Log a lifecycle event
pub fn log_event(event: Event) {
    log_event_with_fields(event, &[]);
}

/// Log a lifecycle event with fields.
///
/// Fields are rendered in key order so the same event always produces the
/// same line.
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    let rendered = render_fields(fields);
    let name = event.as_str();
    let level = event.level();
    if level == Level::ERROR {
        tracing::error!(event = name, fields = %rendered);
    } else if level == Level::WARN {
        tracing::warn!(event = name, fields = %rendered);
    } else if level == Level::INFO {
        tracing::info!(event = name, fields = %rendered);
    } else {
        tracing::debug!(event = name, fields = %rendered);
    }
}

fn render_fields(fields: &[(&str, &str)]) -> String {
    let mut sorted: Vec<_> = fields.iter().collect();
    sorted.sort_by_key(|(k, _)| *k);
    sorted
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(" ")
}
