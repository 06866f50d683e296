//! Contracts for the external collaborators the pipeline drives.
//!
//! The orchestration layer never does acoustic work, transcription, language
//! modelling or synthesis itself. Each of those sits behind one of these
//! traits and is handed to a worker at construction time. Every call is
//! blocking; calls that can run for seconds take the shared
//! [`InterruptCounter`] and must poll it at sub-second granularity.

use crate::error::Result;
use crate::pipeline::interrupt::InterruptCounter;
use crate::pipeline::prompt::UserTurn;
use std::time::Duration;

/// A silence-bounded command recording.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordedCommand {
    /// Mono PCM samples.
    pub samples: Vec<i16>,
    /// Sample rate of `samples` in Hz.
    pub sample_rate: u32,
}

impl RecordedCommand {
    /// Total recorded duration, trailing silence included.
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples.len() as f64 / f64::from(self.sample_rate))
    }
}

/// Synthesized speech ready for playback.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SynthesizedAudio {
    /// Mono f32 samples in `[-1, 1]`.
    pub samples: Vec<f32>,
    /// Sample rate of `samples` in Hz.
    pub sample_rate: u32,
}

impl SynthesizedAudio {
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples.len() as f64 / f64::from(self.sample_rate))
    }
}

/// A document to insert into the retrieval store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub content: String,
    /// Where the content came from (usually a URL).
    pub source: String,
}

/// One retrieval hit.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedChunk {
    pub content: String,
    pub source: String,
    /// Relevance in `[0, 1]`.
    pub score: f32,
}

/// The classifier's verdict on whether a web search is warranted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchDecision {
    NotNeeded,
    Search { topic: String },
}

/// Input to a generation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    /// The user's utterance as transcribed.
    pub text: String,
    /// The rendered user turn (interrupt and context blocks included).
    pub turn: UserTurn,
}

/// Result of a generation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Generation {
    /// Full, sanitised answer text.
    Complete(String),
    /// The interrupt counter went positive mid-stream; partial output was discarded.
    Interrupted,
}

/// Blocks until the wake phrase is heard.
pub trait WakeWordEngine: Send {
    /// Wait for the wake phrase.
    ///
    /// Returns `Ok(true)` on detection and `Ok(false)` when `abort` returned
    /// true. Implementations poll `abort` once per audio frame. The engine
    /// must be usable again after either outcome.
    fn detect(&mut self, abort: &dyn Fn() -> bool) -> Result<bool>;
}

/// Records one command utterance.
pub trait CommandRecorder: Send {
    /// Record until `silence_threshold` of continuous silence has elapsed.
    fn record(&mut self, silence_threshold: Duration) -> Result<RecordedCommand>;
}

/// Speech-to-text.
pub trait Transcriber: Send {
    /// Load models or open connections. Called once before the readiness
    /// rendezvous; an error aborts startup.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }

    /// Transcribe a recording. An empty string means nothing was recognised.
    fn transcribe(&mut self, command: &RecordedCommand) -> Result<String>;
}

/// Document store queried for response context.
pub trait RetrievalStore: Send {
    /// Top hits for `text`, best first.
    fn query(&mut self, text: &str) -> Result<Vec<RetrievedChunk>>;

    fn add_document(&mut self, document: Document) -> Result<()>;
}

/// Web search and page fetching.
pub trait SearchClient: Send {
    /// Result URLs for `query`.
    fn search(&mut self, query: &str) -> Result<Vec<String>>;

    /// Fetch readable text for each URL. Pages that fail are left out.
    fn fetch(&mut self, urls: &[String]) -> Result<Vec<Document>>;
}

/// Language model client. Owns the chat history.
pub trait LlmClient: Send {
    /// See [`Transcriber::warm_up`].
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }

    /// Ask whether `text` needs a web search. `Ok(None)` means the call was
    /// interrupted.
    fn classify_search_need(
        &mut self,
        text: &str,
        interrupt: &InterruptCounter,
    ) -> Result<Option<SearchDecision>>;

    /// Stream an answer, checking `interrupt` for every streamed unit.
    fn generate(
        &mut self,
        request: &GenerationRequest,
        interrupt: &InterruptCounter,
    ) -> Result<Generation>;
}

/// Text-to-speech.
pub trait Synthesizer: Send {
    /// See [`Transcriber::warm_up`].
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }

    /// Synthesize `text`. `Ok(None)` means the call was interrupted.
    fn synthesize(
        &mut self,
        text: &str,
        interrupt: &InterruptCounter,
    ) -> Result<Option<SynthesizedAudio>>;
}

/// Audio output device.
pub trait AudioSink: Send {
    /// Write one chunk. Blocks for roughly the chunk's playback time.
    fn write(&mut self, chunk: &[f32]) -> Result<()>;

    /// Block until everything written has been played.
    fn finish(&mut self) -> Result<()>;

    /// Drop anything still buffered.
    fn stop(&mut self);
}

/// Optional visible indicator (e.g. a chat overlay).
///
/// Failures are logged by the caller and never block the pipeline.
pub trait StatusSink: Send + Sync {
    fn show(&self, text: &str) -> Result<()>;

    fn clear(&self) -> Result<()>;
}
