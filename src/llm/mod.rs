//! Language model collaborator.
//!
//! [`OpenAiClient`] talks to any OpenAI-compatible chat completions server.
//! It owns the chat history, cleans model output for speech and answers the
//! web search classifier question.

pub mod api;
pub mod classify;
pub mod history;
pub mod sanitize;

pub use api::OpenAiClient;
pub use history::{ChatHistory, HistoryEntry, Role};
