//! Interruptible playback.
//!
//! Audio is written in fixed-size chunks on the calling thread while a
//! scoped listener thread waits for the wake phrase. Both share one
//! [`CancellationToken`]: the listener cancels it on detection, the writer
//! cancels it when it finishes so the listener returns.

use super::interrupt::{InterruptCounter, PlaybackActive};
use crate::collaborators::{AudioSink, SynthesizedAudio, WakeWordEngine};
use crate::error::Result;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Playback that ended more than this much earlier than the clip length is
/// reported as truncated.
const EARLY_END_TOLERANCE: Duration = Duration::from_millis(500);

/// How a playback call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackOutcome {
    Completed,
    Interrupted,
}

/// Chunked writer racing a wake-word listener.
#[derive(Debug, Clone, Copy)]
pub struct BargeInPlayer {
    chunk_ms: u32,
}

impl BargeInPlayer {
    pub fn new(chunk_ms: u32) -> Self {
        Self {
            chunk_ms: chunk_ms.max(1),
        }
    }

    /// Samples per write for `sample_rate`.
    pub fn chunk_len(&self, sample_rate: u32) -> usize {
        let len = u64::from(sample_rate) * u64::from(self.chunk_ms) / 1000;
        usize::try_from(len).unwrap_or(usize::MAX).max(1)
    }

    /// Play `audio`, stopping within one chunk of a wake word or a positive
    /// interrupt counter.
    ///
    /// `playback` is held active for the whole call.
    ///
    /// # Errors
    ///
    /// Returns the sink's error if a write fails. The listener is released
    /// first.
    pub fn play(
        &self,
        audio: &SynthesizedAudio,
        sink: &mut dyn AudioSink,
        listener: &mut dyn WakeWordEngine,
        playback: &PlaybackActive,
        interrupt: &InterruptCounter,
    ) -> Result<PlaybackOutcome> {
        let _active = playback.activate();
        let cancel = CancellationToken::new();
        let chunk_len = self.chunk_len(audio.sample_rate);
        let started = Instant::now();

        let (written, heard) = std::thread::scope(|scope| {
            let listener_cancel = cancel.clone();
            let listen = scope.spawn(move || {
                let abort = || listener_cancel.is_cancelled();
                match listener.detect(&abort) {
                    Ok(true) => {
                        info!("wake word during playback");
                        listener_cancel.cancel();
                        true
                    }
                    Ok(false) => false,
                    Err(e) => {
                        warn!("barge-in listener failed: {e}");
                        false
                    }
                }
            });

            let written = write_chunks(audio, chunk_len, sink, &cancel, interrupt);
            cancel.cancel();
            let heard = listen.join().unwrap_or(false);
            (written, heard)
        });

        let stopped_early = written?;
        if stopped_early || heard {
            sink.stop();
            debug!(
                played_ms = started.elapsed().as_millis() as u64,
                "playback cut short"
            );
            return Ok(PlaybackOutcome::Interrupted);
        }

        let elapsed = started.elapsed();
        let expected = audio.duration();
        if elapsed + EARLY_END_TOLERANCE < expected {
            warn!(
                elapsed_ms = elapsed.as_millis() as u64,
                expected_ms = expected.as_millis() as u64,
                "playback ended early, output may be truncated"
            );
        }
        Ok(PlaybackOutcome::Completed)
    }

    /// Play a short clip without a listener of its own. Used for spoken
    /// notifications while another stage is still working; only the
    /// interrupt counter can cut it short.
    ///
    /// # Errors
    ///
    /// Returns the sink's error if a write fails.
    pub fn play_unlistened(
        &self,
        audio: &SynthesizedAudio,
        sink: &mut dyn AudioSink,
        playback: &PlaybackActive,
        interrupt: &InterruptCounter,
    ) -> Result<PlaybackOutcome> {
        let _active = playback.activate();
        let never = CancellationToken::new();
        if write_chunks(
            audio,
            self.chunk_len(audio.sample_rate),
            sink,
            &never,
            interrupt,
        )? {
            sink.stop();
            return Ok(PlaybackOutcome::Interrupted);
        }
        Ok(PlaybackOutcome::Completed)
    }
}

/// Returns `Ok(true)` if writing stopped because of a cancellation.
fn write_chunks(
    audio: &SynthesizedAudio,
    chunk_len: usize,
    sink: &mut dyn AudioSink,
    cancel: &CancellationToken,
    interrupt: &InterruptCounter,
) -> Result<bool> {
    let should_stop = || cancel.is_cancelled() || interrupt.is_interrupted();
    for chunk in audio.samples.chunks(chunk_len) {
        if should_stop() {
            return Ok(true);
        }
        sink.write(chunk)?;
        if should_stop() {
            return Ok(true);
        }
    }
    sink.finish()?;
    Ok(false)
}
