//! Conversation history with a word budget and optional JSON persistence.
//!
//! File format:
//!
//! ```json
//! {"history": [{"message": {"role": "user", "content": "..."}, "length": 3}]}
//! ```
//!
//! The full log is kept (and persisted); only the newest entries that fit
//! the budget are sent to the model.

use crate::error::{HarkError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Share of the model context the history may use.
const BUDGET_RATIO: f64 = 0.75;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub message: ChatMessage,
    /// Word count of `message.content`.
    pub length: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at: Option<DateTime<Utc>>,
}

impl HistoryEntry {
    pub fn new(role: Role, content: &str) -> Self {
        Self {
            message: ChatMessage {
                role,
                content: content.to_owned(),
            },
            length: word_count(content),
            at: Some(Utc::now()),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct HistoryFile {
    history: Vec<HistoryEntry>,
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Chat log plus the budget used to window it.
#[derive(Debug)]
pub struct ChatHistory {
    entries: Vec<HistoryEntry>,
    budget: usize,
    system_words: usize,
    path: Option<PathBuf>,
}

impl ChatHistory {
    /// Empty in-memory history.
    pub fn new(max_tokens: usize, system_prompt: &str) -> Self {
        Self {
            entries: Vec::new(),
            budget: (max_tokens as f64 * BUDGET_RATIO) as usize,
            system_words: word_count(system_prompt),
            path: None,
        }
    }

    /// History backed by `path`. A missing file starts an empty log.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path, max_tokens: usize, system_prompt: &str) -> Result<Self> {
        let mut history = Self::new(max_tokens, system_prompt);
        history.path = Some(path.to_owned());
        if !path.exists() {
            debug!(path = %path.display(), "no chat history yet");
            return Ok(history);
        }
        let content = std::fs::read_to_string(path)?;
        let file: HistoryFile = serde_json::from_str(&content)
            .map_err(|e| HarkError::Llm(format!("invalid chat history {}: {e}", path.display())))?;
        history.entries = file.history;
        info!(
            entries = history.entries.len(),
            in_window = history.window(0).len(),
            "chat history loaded"
        );
        Ok(history)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    /// Newest entries that fit the budget alongside the system prompt and a
    /// pending turn of `pending_words`.
    pub fn window(&self, pending_words: usize) -> &[HistoryEntry] {
        let mut used = self.system_words + pending_words;
        let mut start = self.entries.len();
        for entry in self.entries.iter().rev() {
            if used + entry.length >= self.budget {
                break;
            }
            used += entry.length;
            start -= 1;
        }
        &self.entries[start..]
    }

    /// Record a completed exchange and persist it.
    ///
    /// # Errors
    ///
    /// Returns an error if the history file cannot be written.
    pub fn commit(&mut self, user: &str, assistant: &str) -> Result<()> {
        self.entries.push(HistoryEntry::new(Role::User, user));
        self.entries.push(HistoryEntry::new(Role::Assistant, assistant));
        self.save()
    }

    /// Write the full log to the backing file, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = HistoryFile {
            history: self.entries.clone(),
        };
        let content = serde_json::to_string(&file)
            .map_err(|e| HarkError::Llm(format!("chat history serialization failed: {e}")))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
