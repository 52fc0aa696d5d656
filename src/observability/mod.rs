//! Observability subsystem for walrecover
//!
//! Structured JSON logging of replay and listing lifecycle events.
//!
//! # Principles
//!
//! 1. Observability is read-only
//! 2. No side effects on execution
//! 3. Deterministic output
//!
//! # Usage
//!
//! ```ignore
//! use walrecover::observability::{log_event_with_fields, Event};
//!
//! log_event_with_fields(Event::ReplayEndOfLog, &[("position", "0/180")]);
//! ```

mod events;
mod logger;

pub use events::Event;
pub use logger::{Logger, Severity};

/// Log a lifecycle event at its own severity
pub fn log_event(event: Event) {
    Logger::log(event.severity(), event.as_str(), &[]);
}

/// Log a lifecycle event with fields
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    Logger::log(event.severity(), event.as_str(), fields);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_event() {
        // This just verifies no panic
        log_event(Event::ReplayStart);
        log_event(Event::ListComplete);
    }

    #[test]
    fn test_log_event_with_fields() {
        log_event_with_fields(Event::ControlLoaded, &[("data_dir", "/tmp/test")]);
    }
}
