//! Observable events for walrecover
//!
//! Every lifecycle step of a replay or listing pass has a fixed event
//! name and a fixed severity.

use std::fmt;

use super::logger::Severity;

/// Observable events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Replay lifecycle
    /// Replay pass begins
    ReplayStart,
    /// Control metadata read and accepted
    ControlLoaded,
    /// Requested directory had no control file; default directory used
    ControlFallback,
    /// Replay finished normally
    ReplayComplete,
    /// Replay aborted on an unrecoverable error (FATAL)
    ReplayAborted,

    // Log reading
    /// Segment file opened
    SegmentOpened,
    /// Segment file closed
    SegmentClosed,
    /// Decoder ran past the last written record
    ReplayEndOfLog,
    /// Decoder stopped at a short or garbled record
    ReplayDecodeStopped,

    // Per record
    /// Record outside the DML class passed over
    RecordSkipped,
    /// Record redo applied
    RecordApplied,

    // Finalization
    /// Control file rewritten with the new redo position
    ControlUpdated,
    /// End-of-recovery checkpoint requested
    CheckpointRequested,
    /// Checkpoint finished
    CheckpointComplete,

    // Listing
    /// Listing pass begins
    ListStart,
    /// Listing pass finished
    ListComplete,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ReplayStart => "REPLAY_START",
            Event::ControlLoaded => "CONTROL_LOADED",
            Event::ControlFallback => "CONTROL_FALLBACK",
            Event::ReplayComplete => "REPLAY_COMPLETE",
            Event::ReplayAborted => "REPLAY_ABORTED",

            Event::SegmentOpened => "SEGMENT_OPENED",
            Event::SegmentClosed => "SEGMENT_CLOSED",
            Event::ReplayEndOfLog => "REPLAY_END_OF_LOG",
            Event::ReplayDecodeStopped => "REPLAY_DECODE_STOPPED",

            Event::RecordSkipped => "RECORD_SKIPPED",
            Event::RecordApplied => "RECORD_APPLIED",

            Event::ControlUpdated => "CONTROL_UPDATED",
            Event::CheckpointRequested => "CHECKPOINT_REQUESTED",
            Event::CheckpointComplete => "CHECKPOINT_COMPLETE",

            Event::ListStart => "LIST_START",
            Event::ListComplete => "LIST_COMPLETE",
        }
    }

    /// Severity the event is logged at
    pub fn severity(&self) -> Severity {
        match self {
            Event::RecordSkipped | Event::RecordApplied | Event::SegmentClosed => Severity::Trace,
            Event::ReplayDecodeStopped => Severity::Warn,
            Event::ReplayAborted => Severity::Fatal,
            _ => Severity::Info,
        }
    }

    /// Returns true if this event indicates a fatal condition
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_events_have_string_representation() {
        let events = [
            Event::ReplayStart,
            Event::ControlLoaded,
            Event::ControlFallback,
            Event::ReplayComplete,
            Event::ReplayAborted,
            Event::SegmentOpened,
            Event::SegmentClosed,
            Event::ReplayEndOfLog,
            Event::ReplayDecodeStopped,
            Event::RecordSkipped,
            Event::RecordApplied,
            Event::ControlUpdated,
            Event::CheckpointRequested,
            Event::CheckpointComplete,
            Event::ListStart,
            Event::ListComplete,
        ];

        for event in events {
            let s = event.as_str();
            assert!(!s.is_empty());
            assert!(s.chars().all(|c| c.is_uppercase() || c == '_'));
        }
    }

    #[test]
    fn test_event_severities() {
        assert!(Event::ReplayAborted.is_fatal());
        assert!(!Event::ReplayComplete.is_fatal());
        assert_eq!(Event::RecordApplied.severity(), Severity::Trace);
        assert_eq!(Event::ReplayDecodeStopped.severity(), Severity::Warn);
    }

    #[test]
    fn test_event_display() {
        assert_eq!(format!("{}", Event::ReplayEndOfLog), "REPLAY_END_OF_LOG");
    }
}
