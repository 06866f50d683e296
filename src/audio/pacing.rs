//! Output sink that plays nothing but takes real time.
//!
//! Used when no speaker is compiled in, so interruption timing behaves as
//! it would with a device.

use crate::collaborators::AudioSink;
use crate::error::Result;
use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct PacedSink {
    sample_rate: u32,
    /// When everything written so far will have "played".
    drained_at: Option<Instant>,
}

impl PacedSink {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate: sample_rate.max(1),
            drained_at: None,
        }
    }

    fn chunk_duration(&self, samples: usize) -> Duration {
        Duration::from_secs_f64(samples as f64 / f64::from(self.sample_rate))
    }
}

impl AudioSink for PacedSink {
    fn write(&mut self, chunk: &[f32]) -> Result<()> {
        let now = Instant::now();
        let start = self.drained_at.filter(|t| *t > now).unwrap_or(now);
        let end = start + self.chunk_duration(chunk.len());
        self.drained_at = Some(end);
        std::thread::sleep(end.saturating_duration_since(now));
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if let Some(end) = self.drained_at.take() {
            std::thread::sleep(end.saturating_duration_since(Instant::now()));
        }
        Ok(())
    }

    fn stop(&mut self) {
        self.drained_at = None;
    }
}
