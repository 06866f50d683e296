//! Hark: a barge-in capable voice assistant pipeline.
//!
//! Two worker threads cooperate through a shared command queue:
//! wake word → record → transcribe on one side, retrieval / web search →
//! generation → synthesis → interruptible playback on the other. Saying
//! the wake phrase while an answer is in flight interrupts it at the next
//! stage boundary, and the interrupted question is carried into the next
//! prompt.
//!
//! # Architecture
//!
//! - **[`pipeline`]**: workers, queue protocol, interrupt bookkeeping and
//!   the [`Orchestrator`] that owns the threads
//! - **[`collaborators`]**: traits for wake word, recording, STT, retrieval,
//!   search, LLM, TTS, audio output and status overlays
//! - **[`llm`]**, **[`retrieval`]**, **[`search`]**, **[`status`]**,
//!   **[`audio`]**: concrete collaborators
//! - **[`console`]**: typed-text collaborators for running without audio

pub mod audio;
pub mod clock;
pub mod collaborators;
pub mod config;
pub mod console;
pub mod error;
pub mod llm;
pub mod logging;
pub mod pipeline;
pub mod retrieval;
pub mod search;
pub mod status;

#[cfg(test)]
mod test_utils;

pub use config::HarkConfig;
pub use error::{HarkError, Result};
pub use pipeline::coordinator::Orchestrator;
pub use pipeline::interrupt::{InterruptCounter, PlaybackActive};
