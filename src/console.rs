//! Terminal collaborators: typed lines stand in for speech.
//!
//! Every line typed on stdin counts as the wake phrase followed by a
//! command. Wake engines fire on lines they have not seen yet, the recorder
//! consumes the oldest pending line and the transcriber returns it.
//! Recordings and synthesized audio are silence sized to the text, so the
//! pipeline's timing rules still apply. Answers are printed when they are
//! synthesized.

use crate::collaborators::{
    CommandRecorder, RecordedCommand, SynthesizedAudio, Synthesizer, Transcriber, WakeWordEngine,
};
use crate::error::{HarkError, Result};
use crate::pipeline::interrupt::InterruptCounter;
use std::collections::VecDeque;
use std::io::{BufRead, Write};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::debug;

const POLL: Duration = Duration::from_millis(20);
/// How long the recorder waits for a line before returning silence.
const LISTEN_WINDOW: Duration = Duration::from_millis(1500);
const RECORD_RATE: u32 = 16_000;
const SECONDS_PER_WORD: f64 = 0.4;
const SPOKEN_WORDS_PER_SECOND: f64 = 2.5;

#[derive(Debug)]
struct Typed {
    seq: u64,
    text: String,
    at: Instant,
}

#[derive(Debug, Default)]
struct InputState {
    next_seq: u64,
    /// Typed lines not yet recorded, oldest first.
    pending: VecDeque<Typed>,
    /// Recorded lines not yet transcribed.
    heard: VecDeque<String>,
}

/// Line source shared by the console collaborators.
#[derive(Debug, Default)]
pub struct ConsoleInput {
    state: Mutex<InputState>,
}

impl ConsoleInput {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn state(&self) -> Result<MutexGuard<'_, InputState>> {
        self.state
            .lock()
            .map_err(|e| HarkError::Channel(format!("console input lock poisoned: {e}")))
    }

    /// Queue a line as if it had been spoken. Blank lines are ignored.
    pub fn send_line(&self, line: &str) -> Result<()> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(());
        }
        let mut state = self.state()?;
        state.next_seq += 1;
        let seq = state.next_seq;
        state.pending.push_back(Typed {
            seq,
            text: line.to_owned(),
            at: Instant::now(),
        });
        debug!(seq, "console line queued");
        Ok(())
    }

    /// Read stdin on a background thread, calling `on_eof` when it closes.
    ///
    /// # Errors
    ///
    /// Returns an error if the thread cannot be spawned.
    pub fn spawn_stdin(
        self: &Arc<Self>,
        on_eof: impl FnOnce() + Send + 'static,
    ) -> Result<JoinHandle<()>> {
        let input = Arc::clone(self);
        let handle = std::thread::Builder::new()
            .name("hark-stdin".into())
            .spawn(move || {
                for line in std::io::stdin().lock().lines() {
                    let Ok(line) = line else { break };
                    if let Err(e) = input.send_line(&line) {
                        tracing::warn!("console input dropped: {e}");
                        break;
                    }
                }
                debug!("stdin closed");
                on_eof();
            })?;
        Ok(handle)
    }

    fn newest_pending_after(&self, seen: u64) -> Result<Option<u64>> {
        let state = self.state()?;
        Ok(state
            .pending
            .back()
            .map(|typed| typed.seq)
            .filter(|seq| *seq > seen))
    }
}

/// Fires once per typed line.
#[derive(Debug)]
pub struct ConsoleWake {
    input: Arc<ConsoleInput>,
    seen: u64,
}

impl ConsoleWake {
    pub fn new(input: Arc<ConsoleInput>) -> Self {
        Self { input, seen: 0 }
    }
}

impl WakeWordEngine for ConsoleWake {
    fn detect(&mut self, abort: &dyn Fn() -> bool) -> Result<bool> {
        loop {
            if let Some(seq) = self.input.newest_pending_after(self.seen)? {
                self.seen = seq;
                return Ok(true);
            }
            if abort() {
                return Ok(false);
            }
            std::thread::sleep(POLL);
        }
    }
}

/// Turns the oldest pending line into a silent recording sized to its
/// word count. Recording ends when the line, read aloud from the moment it
/// was typed, plus the trailing silence would have ended.
#[derive(Debug)]
pub struct ConsoleRecorder {
    input: Arc<ConsoleInput>,
    seconds_per_word: f64,
}

impl ConsoleRecorder {
    pub fn new(input: Arc<ConsoleInput>) -> Self {
        Self {
            input,
            seconds_per_word: SECONDS_PER_WORD,
        }
    }

    pub fn with_seconds_per_word(mut self, seconds: f64) -> Self {
        self.seconds_per_word = seconds.max(0.0);
        self
    }
}

fn silence(seconds: f64) -> Vec<i16> {
    vec![0; (seconds * f64::from(RECORD_RATE)) as usize]
}

impl CommandRecorder for ConsoleRecorder {
    fn record(&mut self, silence_threshold: Duration) -> Result<RecordedCommand> {
        let deadline = Instant::now() + LISTEN_WINDOW;
        loop {
            let typed = self.input.state()?.pending.pop_front();
            if let Some(typed) = typed {
                let words = typed.text.split_whitespace().count() as f64;
                let seconds = words * self.seconds_per_word + silence_threshold.as_secs_f64();
                let ends = typed.at + Duration::from_secs_f64(seconds);
                std::thread::sleep(ends.saturating_duration_since(Instant::now()));
                self.input.state()?.heard.push_back(typed.text);
                return Ok(RecordedCommand {
                    samples: silence(seconds),
                    sample_rate: RECORD_RATE,
                });
            }
            if Instant::now() >= deadline {
                // Nobody spoke: trailing silence only.
                return Ok(RecordedCommand {
                    samples: silence(silence_threshold.as_secs_f64()),
                    sample_rate: RECORD_RATE,
                });
            }
            std::thread::sleep(POLL);
        }
    }
}

/// Returns the line behind the most recent recording.
#[derive(Debug)]
pub struct ConsoleTranscriber {
    input: Arc<ConsoleInput>,
}

impl ConsoleTranscriber {
    pub fn new(input: Arc<ConsoleInput>) -> Self {
        Self { input }
    }
}

impl Transcriber for ConsoleTranscriber {
    fn transcribe(&mut self, _command: &RecordedCommand) -> Result<String> {
        Ok(self.input.state()?.heard.pop_front().unwrap_or_default())
    }
}

/// Prints text under a speaker label and returns silence that takes as
/// long as reading it aloud would.
#[derive(Debug, Clone)]
pub struct ConsoleSynthesizer {
    label: String,
    sample_rate: u32,
}

impl ConsoleSynthesizer {
    pub fn new(label: impl Into<String>, sample_rate: u32) -> Self {
        Self {
            label: label.into(),
            sample_rate: sample_rate.max(1),
        }
    }
}

impl Synthesizer for ConsoleSynthesizer {
    fn synthesize(
        &mut self,
        text: &str,
        interrupt: &InterruptCounter,
    ) -> Result<Option<SynthesizedAudio>> {
        if interrupt.is_interrupted() {
            return Ok(None);
        }
        let mut out = std::io::stdout().lock();
        writeln!(out, "{}: {text}", self.label)?;
        out.flush()?;

        let seconds = text.split_whitespace().count() as f64 / SPOKEN_WORDS_PER_SECOND;
        let samples = (seconds * f64::from(self.sample_rate)) as usize;
        Ok(Some(SynthesizedAudio {
            samples: vec![0.0; samples],
            sample_rate: self.sample_rate,
        }))
    }
}
