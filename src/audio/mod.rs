//! Audio output and WAV dumps.

pub mod pacing;
#[cfg(feature = "speaker")]
pub mod playback;
pub mod wav;

pub use pacing::PacedSink;
#[cfg(feature = "speaker")]
pub use playback::CpalSink;
pub use wav::WavDumper;
