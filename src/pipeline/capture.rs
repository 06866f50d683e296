//! Wake word / command capture state machine.
//!
//! ```text
//! WAITING_FOR_WAKEWORD ──wake──▶ RECORDING_COMMAND ──accepted──▶ emit START+FINISH
//!          ▲                              ▲                             │
//!          └── reset timeout / goodbye ───┴──── no wake word needed ◀───┘
//! ```
//!
//! While a response is in flight (the queue is non-empty) a command is only
//! accepted after a wake word, and that wake word counts as a barge-in.

use super::Shared;
use super::messages::WorkItem;
use crate::audio::wav::WavDumper;
use crate::collaborators::{CommandRecorder, Transcriber, WakeWordEngine};
use crate::config::{CaptureConfig, ConversationConfig};
use crate::error::Result;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Pause after a failed round so a broken device does not spin the loop.
const ERROR_BACKOFF: Duration = Duration::from_millis(200);
/// How often the playback settle wait re-checks the flag.
const SETTLE_POLL: Duration = Duration::from_millis(10);

/// The capture worker's collaborators.
pub struct CaptureCollaborators {
    pub wake: Box<dyn WakeWordEngine>,
    pub recorder: Box<dyn CommandRecorder>,
    pub transcriber: Box<dyn Transcriber>,
}

/// Conversation state owned by the capture worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationState {
    /// The wake phrase must be heard before the next command.
    pub ask_wakeword: bool,
    pub last_command_time: Option<Instant>,
    /// Last emitted transcript, for continuation merging.
    pub previous_text: String,
    pub first_iteration: bool,
}

impl Default for ConversationState {
    fn default() -> Self {
        Self {
            ask_wakeword: true,
            last_command_time: None,
            previous_text: String::new(),
            first_iteration: true,
        }
    }
}

impl ConversationState {
    /// Back to waiting for the wake phrase with no history.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// What one pass through the loop produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// A START/FINISH pair was enqueued.
    Emitted {
        text: String,
        continuation: bool,
        is_goodbye: bool,
    },
    /// The recording was shorter than the minimum command length.
    TooShort,
    /// Nothing was recognised.
    EmptyTranscript,
    /// The conversation timed out while a response was in flight; the wake
    /// phrase is required again.
    WakeWordReset,
    /// Shutdown was requested while waiting.
    Cancelled,
}

/// Produces [`WorkItem`] pairs from the microphone side.
pub struct CaptureWorker {
    config: CaptureConfig,
    goodbye_phrases: Vec<String>,
    parts: CaptureCollaborators,
    shared: Shared,
    state: ConversationState,
    dumps: Option<WavDumper>,
}

impl CaptureWorker {
    pub fn new(
        config: CaptureConfig,
        conversation: &ConversationConfig,
        parts: CaptureCollaborators,
        shared: Shared,
    ) -> Self {
        Self {
            config,
            goodbye_phrases: conversation
                .goodbye_phrases
                .iter()
                .map(|p| p.trim().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
            parts,
            shared,
            state: ConversationState::default(),
            dumps: None,
        }
    }

    /// Save every accepted recording in the dumper's directory as
    /// `command-<timestamp>-<id>.wav`.
    pub fn with_dumps(mut self, dumps: WavDumper) -> Self {
        self.dumps = Some(dumps);
        self
    }

    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    /// Load models before the readiness rendezvous.
    ///
    /// # Errors
    ///
    /// Returns the transcriber's initialisation error.
    pub fn warm_up(&mut self) -> Result<()> {
        self.parts.transcriber.warm_up()
    }

    /// Loop until `cancel` fires. Round errors are logged and the worker
    /// goes back to waiting for the wake phrase.
    pub fn run(mut self, cancel: &CancellationToken) {
        info!("capture worker running");
        while !cancel.is_cancelled() {
            match self.run_iteration(cancel) {
                Ok(CaptureOutcome::Cancelled) => break,
                Ok(outcome) => debug!(?outcome, "capture round done"),
                Err(e) => {
                    warn!("capture round failed: {e}");
                    self.state.reset();
                    self.shared.clear_status();
                    std::thread::sleep(ERROR_BACKOFF);
                }
            }
        }
        info!("capture worker stopped");
    }

    /// One pass: optional wake wait, record, transcribe, classify, emit.
    ///
    /// # Errors
    ///
    /// Returns wake word, recorder or transcriber failures.
    pub fn run_iteration(&mut self, cancel: &CancellationToken) -> Result<CaptureOutcome> {
        self.apply_reset_timeout();

        let in_flight = !self.shared.queue.is_empty();
        if self.state.ask_wakeword || in_flight {
            let wake_required = self.state.ask_wakeword;
            let queue = &self.shared.queue;
            let abort = || cancel.is_cancelled() || (!wake_required && queue.is_empty());
            let heard = self.parts.wake.detect(&abort)?;
            if cancel.is_cancelled() {
                return Ok(CaptureOutcome::Cancelled);
            }
            if heard {
                self.on_wake(wake_required);
            } else if wake_required {
                // Spurious abort; go round again.
                return Ok(CaptureOutcome::TooShort);
            } else {
                // The queue drained; the conversation may have expired meanwhile.
                self.apply_reset_timeout();
                if self.state.ask_wakeword {
                    return Ok(CaptureOutcome::WakeWordReset);
                }
            }
        }

        let command = self
            .parts
            .recorder
            .record(self.config.silence_threshold())?;
        let duration = command.duration();
        if duration < self.config.min_command_duration() {
            debug!(duration_ms = duration.as_millis() as u64, "no speech detected");
            return Ok(CaptureOutcome::TooShort);
        }
        if let Some(dumps) = &self.dumps {
            dumps.write_command(&command);
        }

        let text = self.parts.transcriber.transcribe(&command)?;
        let text = text.trim();
        if text.is_empty() {
            debug!("no command detected");
            return Ok(CaptureOutcome::EmptyTranscript);
        }
        info!(text, "heard command");

        let (text, continuation) = self.merge_continuation(text, duration);
        let is_goodbye = self.is_goodbye(&text);

        let (start, finish) =
            WorkItem::pair(text.clone(), continuation, is_goodbye, self.shared.clock.now());
        self.shared.queue.push_pair(start, finish);
        self.shared.show_status("(thinking)");

        if is_goodbye {
            info!("goodbye detected, back to wake word mode");
            self.state.reset();
        }

        Ok(CaptureOutcome::Emitted {
            text,
            continuation,
            is_goodbye,
        })
    }

    fn apply_reset_timeout(&mut self) {
        let Some(timeout) = self.config.reset_timeout() else {
            return;
        };
        let now = self.shared.clock.now();
        let expired = self
            .state
            .last_command_time
            .is_none_or(|last| now.saturating_duration_since(last) > timeout);
        if !expired {
            return;
        }
        if !self.state.ask_wakeword {
            warn!("wake word reset");
        }
        self.state.reset();
        self.shared.clear_status();
    }

    fn on_wake(&mut self, wake_required: bool) {
        if wake_required {
            self.state.last_command_time = Some(self.shared.clock.now());
            self.state.ask_wakeword = false;
        }
        if let Some(count) = self.shared.queue.register_barge_in(&self.shared.interrupt) {
            warn!(count, "interrupt fired");
            self.await_playback_settled();
        }
        self.shared.show_status("(listening)");
    }

    /// Give the response side a moment to stop talking so the command
    /// recording does not start with the assistant's own voice.
    fn await_playback_settled(&self) {
        let deadline = Instant::now() + self.config.playback_settle_timeout();
        while self.shared.playback.is_active() && Instant::now() < deadline {
            std::thread::sleep(SETTLE_POLL);
        }
        if self.shared.playback.is_active() {
            debug!("playback still active after settle timeout");
        }
    }

    fn merge_continuation(&mut self, text: &str, duration: Duration) -> (String, bool) {
        let now = self.shared.clock.now();
        let within_window = self.state.last_command_time.is_some_and(|last| {
            now.saturating_duration_since(last).saturating_sub(duration)
                < self.config.continuation_threshold()
        });
        let continuation = self.config.reset_timeout().is_some()
            && !self.state.first_iteration
            && !self.state.previous_text.is_empty()
            && within_window;

        let text = if continuation {
            format!("{}, {text}", self.state.previous_text)
        } else {
            text.to_owned()
        };

        if !self.state.ask_wakeword {
            self.state.last_command_time = Some(now);
        }
        self.state.previous_text.clone_from(&text);
        self.state.first_iteration = false;
        (text, continuation)
    }

    fn is_goodbye(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        self.goodbye_phrases.iter().any(|p| lower.contains(p))
    }
}
