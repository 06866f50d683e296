//! Interrupted utterances carried into the next generation call.

use std::collections::VecDeque;

/// Bounded, ordered, deduplicated list of interrupted utterances.
#[derive(Debug, Clone)]
pub struct InterruptContext {
    entries: VecDeque<String>,
    max_entries: usize,
}

impl InterruptContext {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            max_entries: max_entries.max(1),
        }
    }

    /// Append `text` unless it is already present. The oldest entry is
    /// dropped once the cap is reached.
    pub fn push(&mut self, text: &str) {
        let text = text.trim();
        if text.is_empty() || self.entries.iter().any(|e| e == text) {
            return;
        }
        if self.entries.len() == self.max_entries {
            self.entries.pop_front();
        }
        self.entries.push_back(text.to_owned());
    }

    /// Remove the newest entry (superseded by a continuation).
    pub fn pop_latest(&mut self) -> Option<String> {
        self.entries.pop_back()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }
}
