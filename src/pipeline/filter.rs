//! Cheap gates applied before any collaborator call: duplicate suppression
//! and the short-utterance meaningfulness check.

use crate::config::FilterConfig;
use crate::error::{HarkError, Result};
use regex::Regex;
use std::time::{Duration, Instant};

/// Lowercase, strip punctuation and collapse whitespace.
pub fn normalize(text: &str) -> String {
    text.chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '\'' {
                c.to_ascii_lowercase()
            } else {
                ' '
            }
        })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Drops an identical transcript repeated within a short window.
#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    last: Option<(String, Instant)>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self { window, last: None }
    }

    /// Returns true when `text` should be skipped as a duplicate.
    ///
    /// Continuations are never duplicates. Every accepted transcript becomes
    /// the new reference point.
    pub fn is_duplicate(&mut self, text: &str, continuation: bool, now: Instant) -> bool {
        let normalized = normalize(text);
        let duplicate = !continuation
            && self.last.as_ref().is_some_and(|(last, at)| {
                *last == normalized && now.saturating_duration_since(*at) < self.window
            });
        if !duplicate {
            self.last = Some((normalized, now));
        }
        duplicate
    }
}

/// Rejects short transcripts that are most likely filler or misrecognition.
#[derive(Debug)]
pub struct MeaningfulnessFilter {
    max_short_words: usize,
    min_word_chars: usize,
    deny: Vec<Regex>,
    allow: Vec<String>,
}

impl MeaningfulnessFilter {
    /// # Errors
    ///
    /// Returns [`HarkError::Config`] for an invalid deny pattern.
    pub fn new(config: &FilterConfig) -> Result<Self> {
        let deny = config
            .deny_patterns
            .iter()
            .map(|p| {
                Regex::new(p)
                    .map_err(|e| HarkError::Config(format!("invalid deny pattern {p:?}: {e}")))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            max_short_words: config.max_short_words,
            min_word_chars: config.min_word_chars,
            deny,
            allow: config.allow_words.iter().map(|w| normalize(w)).collect(),
        })
    }

    pub fn is_meaningful(&self, text: &str) -> bool {
        let normalized = normalize(text);
        let words: Vec<&str> = normalized.split(' ').filter(|w| !w.is_empty()).collect();
        match words.len() {
            0 => false,
            n if n > self.max_short_words => true,
            _ => {
                if words.len() == 1 && self.allow.iter().any(|a| a == words[0]) {
                    return true;
                }
                if self.deny.iter().any(|re| re.is_match(&normalized)) {
                    return false;
                }
                !(words.len() == 1 && words[0].chars().count() < self.min_word_chars)
            }
        }
    }
}
