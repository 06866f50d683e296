//! Work items passed from the capture worker to the response worker.

use std::time::Instant;
use uuid::Uuid;

/// Position of a work item within its START/FINISH pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    /// Carries the payload to process.
    Start,
    /// Same payload, used to reconcile the round once START is done.
    Finish,
}

/// One half of an accepted utterance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    /// Shared by the START and FINISH of one utterance.
    pub round_id: Uuid,
    /// Transcript (already merged with the previous one for continuations).
    pub text: String,
    pub marker: Marker,
    /// This utterance extends the immediately preceding one.
    pub continuation: bool,
    pub is_goodbye: bool,
    /// When the command was accepted, for latency accounting.
    pub start_time: Instant,
}

impl WorkItem {
    /// Build the START/FINISH pair for one accepted utterance.
    pub fn pair(
        text: impl Into<String>,
        continuation: bool,
        is_goodbye: bool,
        start_time: Instant,
    ) -> (Self, Self) {
        let start = Self {
            round_id: Uuid::new_v4(),
            text: text.into(),
            marker: Marker::Start,
            continuation,
            is_goodbye,
            start_time,
        };
        let finish = Self {
            marker: Marker::Finish,
            ..start.clone()
        };
        (start, finish)
    }

    pub fn is_start(&self) -> bool {
        self.marker == Marker::Start
    }

    pub fn is_finish(&self) -> bool {
        self.marker == Marker::Finish
    }

    /// Whether `self` is the FINISH belonging to the START `start`.
    pub fn finishes(&self, start: &WorkItem) -> bool {
        self.is_finish()
            && self.round_id == start.round_id
            && self.text == start.text
            && self.start_time == start.start_time
    }
}
