//! Error types for the hark pipeline.

/// Top-level error type for the voice assistant pipeline.
#[derive(Debug, thiserror::Error)]
pub enum HarkError {
    /// Wake word engine failure.
    #[error("wake word error: {0}")]
    WakeWord(String),

    /// Command recording failure.
    #[error("recorder error: {0}")]
    Recorder(String),

    /// Speech-to-text transcription error.
    #[error("STT error: {0}")]
    Stt(String),

    /// Retrieval store error.
    #[error("retrieval error: {0}")]
    Retrieval(String),

    /// Web search or page fetch error.
    #[error("search error: {0}")]
    Search(String),

    /// Language model client error.
    #[error("LLM error: {0}")]
    Llm(String),

    /// Text-to-speech synthesis error.
    #[error("TTS error: {0}")]
    Tts(String),

    /// Audio output error.
    #[error("playback error: {0}")]
    Playback(String),

    /// Status overlay error.
    #[error("status error: {0}")]
    Status(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Pipeline coordination error.
    #[error("pipeline error: {0}")]
    Pipeline(String),

    /// Channel send/receive error.
    #[error("channel error: {0}")]
    Channel(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<hark_search::SearchError> for HarkError {
    fn from(e: hark_search::SearchError) -> Self {
        Self::Search(e.to_string())
    }
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, HarkError>;
