//! Configuration types for the voice assistant pipeline.
//!
//! Every worker receives the section it needs at construction time; nothing
//! here is read through globals.

use crate::error::{HarkError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration for the pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HarkConfig {
    /// Wake word / command capture timing.
    pub capture: CaptureConfig,
    /// Conversation phrases (goodbye detection and replies).
    pub conversation: ConversationConfig,
    /// Response pipeline decisions.
    pub response: ResponseConfig,
    /// Meaningfulness filter word lists.
    pub filter: FilterConfig,
    /// Playback chunking.
    pub playback: PlaybackConfig,
    /// Language model client settings.
    pub llm: LlmConfig,
    /// Web search settings.
    pub search: SearchSettings,
    /// Status overlay settings.
    pub status: StatusConfig,
    /// Audio output and debug dumps.
    pub audio: AudioConfig,
    /// Log output settings.
    pub logging: LoggingConfig,
}

/// Capture worker timing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Seconds without a follow-up command before the wake phrase is required
    /// again.
    ///
    /// Set to 0 to disable the timeout (and with it, continuation merging).
    pub wakeword_reset_timeout_s: f64,
    /// Maximum gap in seconds between two commands for the second one to be
    /// merged into the first.
    pub continuation_threshold_s: f64,
    /// Minimum voiced duration in seconds for a recording to count as a command.
    pub min_voice_s: f64,
    /// Continuous silence in seconds that ends a command recording.
    pub silence_threshold_s: f64,
    /// Upper bound in ms on waiting for the assistant's own playback to stop
    /// before recording a barge-in command.
    pub playback_settle_timeout_ms: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            wakeword_reset_timeout_s: 30.0,
            continuation_threshold_s: 2.0,
            min_voice_s: 0.3,
            silence_threshold_s: 1.0,
            playback_settle_timeout_ms: 1500,
        }
    }
}

impl CaptureConfig {
    /// The wake word reset timeout, or `None` when disabled.
    pub fn reset_timeout(&self) -> Option<Duration> {
        (self.wakeword_reset_timeout_s > 0.0)
            .then(|| Duration::from_secs_f64(self.wakeword_reset_timeout_s))
    }

    pub fn continuation_threshold(&self) -> Duration {
        Duration::from_secs_f64(self.continuation_threshold_s.max(0.0))
    }

    pub fn silence_threshold(&self) -> Duration {
        Duration::from_secs_f64(self.silence_threshold_s.max(0.0))
    }

    /// Shortest recording accepted as a command: voiced part plus the
    /// trailing silence window that ended it.
    pub fn min_command_duration(&self) -> Duration {
        Duration::from_secs_f64((self.min_voice_s + self.silence_threshold_s).max(0.0))
    }

    pub fn playback_settle_timeout(&self) -> Duration {
        Duration::from_millis(self.playback_settle_timeout_ms)
    }
}

/// Conversation phrase configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationConfig {
    /// Wake phrase, used for display and by text-driven engines.
    pub wake_phrase: String,
    /// Phrases that end the conversation (case-insensitive substring match).
    pub goodbye_phrases: Vec<String>,
    /// Replies spoken when a goodbye phrase is detected (one picked at random).
    pub goodbye_responses: Vec<String>,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            wake_phrase: "hark".to_owned(),
            goodbye_phrases: vec![
                "goodbye".to_owned(),
                "bye bye".to_owned(),
                "see you later".to_owned(),
                "good night".to_owned(),
                "that's all".to_owned(),
            ],
            goodbye_responses: vec![
                "Goodbye! Say 'Hark' to talk again.".to_owned(),
                "See you later! Wake me with 'Hark' when you need me.".to_owned(),
                "Take care! Just say 'Hark' to start another conversation.".to_owned(),
                "Bye! I'll be listening for 'Hark' when you're ready to chat.".to_owned(),
            ],
        }
    }
}

/// Response pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseConfig {
    /// Identical non-continuation transcripts within this window are dropped.
    pub debounce_window_ms: u64,
    /// Minimum retrieval relevance score to answer without a web search.
    pub confidence_threshold: f32,
    /// Whether the search fallback is allowed at all.
    pub enable_websearch: bool,
    /// Maximum interrupted utterances carried into the next prompt.
    pub max_interrupt_context: usize,
    /// Bounded wait in ms for the FINISH marker after a START completes.
    pub finish_timeout_ms: u64,
    /// Spoken while a web search runs. `{topic}` is replaced with the topic.
    pub search_notification: String,
}

impl Default for ResponseConfig {
    fn default() -> Self {
        Self {
            debounce_window_ms: 2000,
            confidence_threshold: 0.3,
            enable_websearch: true,
            max_interrupt_context: 4,
            finish_timeout_ms: 100,
            search_notification: "Searching the web for {topic}".to_owned(),
        }
    }
}

impl ResponseConfig {
    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_window_ms)
    }

    pub fn finish_timeout(&self) -> Duration {
        Duration::from_millis(self.finish_timeout_ms)
    }
}

/// Meaningfulness filter configuration.
///
/// These are tunable heuristics. A transcript longer than `max_short_words`
/// always passes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Transcripts with at most this many words are checked against the lists.
    pub max_short_words: usize,
    /// Single words shorter than this are treated as misrecognitions.
    pub min_word_chars: usize,
    /// Regexes (matched against the normalized transcript) for filler and
    /// greeting noise.
    pub deny_patterns: Vec<String>,
    /// Single imperative words that always pass.
    pub allow_words: Vec<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            max_short_words: 2,
            min_word_chars: 3,
            deny_patterns: vec![
                r"^(uh+|um+|hm+|mm+|ah+|oh+|er+|huh)$".to_owned(),
                r"^(hi|hello|hey|yo)( there)?$".to_owned(),
                r"^(thanks?|thank you)( so much)?$".to_owned(),
                r"^(okay|ok|yeah|yep|nope|right|sure|cool)$".to_owned(),
                r"^(you|the|a|and|so)$".to_owned(),
            ],
            allow_words: [
                "stop", "wait", "continue", "repeat", "help", "pause", "resume", "cancel",
                "next", "louder", "quieter", "yes", "no",
            ]
            .iter()
            .map(|w| (*w).to_owned())
            .collect(),
        }
    }
}

/// Playback chunking configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Size of each audio write in ms. Bounds barge-in latency during playback.
    pub chunk_ms: u32,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self { chunk_ms: 100 }
    }
}

/// OpenAI-compatible language model client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Base URL of the chat completions server.
    pub api_url: String,
    /// Model name to request.
    pub api_model: String,
    /// API key. When empty, `OPENAI_API_KEY` is read from the environment.
    pub api_key: String,
    /// Sampling temperature.
    pub temperature: f64,
    /// Top-p (nucleus) sampling threshold.
    pub top_p: f64,
    /// Model context size in tokens. History is trimmed to 75% of this,
    /// counted in words.
    pub max_tokens: usize,
    /// Whether reasoning is allowed. When false, `/no_think` is appended to
    /// user turns.
    pub enable_think: bool,
    /// System prompt.
    pub system_prompt: String,
    /// Optional JSON file holding the full conversation history.
    pub history_path: Option<PathBuf>,
    /// Read/connect timeout for each request in seconds.
    pub request_timeout_s: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:11434/v1".to_owned(),
            api_model: "qwen3:8b".to_owned(),
            api_key: String::new(),
            temperature: 0.7,
            top_p: 0.95,
            max_tokens: 7000,
            enable_think: true,
            system_prompt: "You are a helpful voice assistant. Keep answers short and \
                            conversational."
                .to_owned(),
            history_path: None,
            request_timeout_s: 60,
        }
    }
}

impl LlmConfig {
    /// Configured key, falling back to `OPENAI_API_KEY`.
    pub fn effective_api_key(&self) -> String {
        if self.api_key.is_empty() {
            std::env::var("OPENAI_API_KEY").unwrap_or_default()
        } else {
            self.api_key.clone()
        }
    }
}

/// Web search configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Maximum result URLs fetched per search.
    pub max_results: usize,
    /// HTTP timeout per request in seconds.
    pub timeout_s: u64,
    /// Characters kept from each fetched page.
    pub max_page_chars: usize,
    /// HTML search endpoint queried with a `q` form field.
    pub endpoint: String,
    /// User-Agent for the search endpoint and page fetches.
    pub user_agent: String,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            max_results: 5,
            timeout_s: 8,
            max_page_chars: 20_000,
            endpoint: hark_search::DEFAULT_ENDPOINT.to_owned(),
            user_agent: hark_search::DEFAULT_USER_AGENT.to_owned(),
        }
    }
}

/// Which status overlay to drive.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusBackend {
    /// No overlay.
    #[default]
    None,
    /// Indicators are written to the log.
    Log,
    /// VRChat-style OSC chatbox over UDP.
    Osc,
}

/// Status overlay configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusConfig {
    pub backend: StatusBackend,
    /// UDP target for the OSC backend.
    pub osc_addr: String,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            backend: StatusBackend::None,
            osc_addr: "127.0.0.1:9000".to_owned(),
        }
    }
}

/// Audio output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Output sample rate in Hz.
    pub output_sample_rate: u32,
    /// Output device name (None = system default).
    pub output_device: Option<String>,
    /// When set, each command and response is written here as a WAV file.
    pub dump_dir: Option<PathBuf>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            output_sample_rate: 24_000,
            output_device: None,
            dump_dir: None,
        }
    }
}

/// Log output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is not set.
    pub filter: String,
    /// When set, logs are also written to daily-rotated files in this directory.
    pub file_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "hark=info".to_owned(),
            file_dir: None,
        }
    }
}

impl HarkConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| HarkError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| HarkError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `<config dir>/hark/config.toml`.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp/hark-config"))
            .join("hark")
            .join("config.toml")
    }

    /// Reject values the workers cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`HarkError::Config`] describing the first invalid field.
    pub fn validate(&self) -> Result<()> {
        let c = &self.capture;
        for (name, value) in [
            ("capture.wakeword_reset_timeout_s", c.wakeword_reset_timeout_s),
            ("capture.continuation_threshold_s", c.continuation_threshold_s),
            ("capture.min_voice_s", c.min_voice_s),
            ("capture.silence_threshold_s", c.silence_threshold_s),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(HarkError::Config(format!(
                    "{name} must be a non-negative number, got {value}"
                )));
            }
        }
        if self.playback.chunk_ms == 0 {
            return Err(HarkError::Config(
                "playback.chunk_ms must be greater than 0".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.response.confidence_threshold) {
            return Err(HarkError::Config(format!(
                "response.confidence_threshold must be within [0, 1], got {}",
                self.response.confidence_threshold
            )));
        }
        if self.response.max_interrupt_context == 0 {
            return Err(HarkError::Config(
                "response.max_interrupt_context must be greater than 0".into(),
            ));
        }
        for pattern in &self.filter.deny_patterns {
            regex::Regex::new(pattern).map_err(|e| {
                HarkError::Config(format!("invalid filter.deny_patterns entry {pattern:?}: {e}"))
            })?;
        }
        Ok(())
    }
}
