//! Capture → response pipeline and the primitives the two workers share.
//!
//! Two long-lived threads run the pipeline: the [`capture::CaptureWorker`]
//! (wake word, command recording, transcription) and the
//! [`response::ResponseWorker`] (retrieval, search, generation, synthesis,
//! interruptible playback). They only communicate through the
//! [`queue::CommandQueue`], the [`interrupt::InterruptCounter`] and the
//! [`interrupt::PlaybackActive`] flag, all bundled in [`Shared`].

pub mod barge_in;
pub mod capture;
pub mod context;
pub mod coordinator;
pub mod filter;
pub mod interrupt;
pub mod messages;
pub mod prompt;
pub mod queue;
pub mod response;

use crate::clock::Clock;
use crate::collaborators::StatusSink;
use interrupt::{InterruptCounter, PlaybackActive};
use queue::CommandQueue;
use std::sync::Arc;
use tracing::debug;

/// Handles both workers hold on to.
#[derive(Clone)]
pub struct Shared {
    pub queue: Arc<CommandQueue>,
    pub interrupt: InterruptCounter,
    pub playback: PlaybackActive,
    pub status: Arc<dyn StatusSink>,
    pub clock: Arc<dyn Clock>,
}

impl Shared {
    pub fn new(status: Arc<dyn StatusSink>, clock: Arc<dyn Clock>) -> Self {
        Self {
            queue: Arc::new(CommandQueue::new()),
            interrupt: InterruptCounter::new(),
            playback: PlaybackActive::new(),
            status,
            clock,
        }
    }

    /// Show an indicator. Overlay failures never reach the caller.
    pub fn show_status(&self, text: &str) {
        if let Err(e) = self.status.show(text) {
            debug!("status show failed: {e}");
        }
    }

    pub fn clear_status(&self) {
        if let Err(e) = self.status.clear() {
            debug!("status clear failed: {e}");
        }
    }
}

impl std::fmt::Debug for Shared {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shared")
            .field("queue_len", &self.queue.len())
            .field("interrupt", &self.interrupt.get())
            .field("playback_active", &self.playback.is_active())
            .finish_non_exhaustive()
    }
}
