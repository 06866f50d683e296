//! Debug dumps of recorded commands and synthesized responses.
//!
//! Files are named `<kind>-<UTC timestamp>-<short id>.wav`. Commands are
//! written as 16-bit PCM, responses as 32-bit float.

use crate::collaborators::{RecordedCommand, SynthesizedAudio};
use chrono::Utc;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Writes WAV files into one directory. Write failures are logged and
/// otherwise ignored.
#[derive(Debug, Clone)]
pub struct WavDumper {
    dir: PathBuf,
}

impl WavDumper {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn write_command(&self, command: &RecordedCommand) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: command.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        self.write("command", spec, &command.samples);
    }

    pub fn write_response(&self, audio: &SynthesizedAudio) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: audio.sample_rate,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        self.write("response", spec, &audio.samples);
    }

    fn write<S: hound::Sample + Copy>(&self, kind: &str, spec: hound::WavSpec, samples: &[S]) {
        let path = self.next_path(kind);
        match write_wav(&path, spec, samples) {
            Ok(()) => debug!(path = %path.display(), samples = samples.len(), "wav dumped"),
            Err(e) => warn!(path = %path.display(), "wav dump failed: {e}"),
        }
    }

    fn next_path(&self, kind: &str) -> PathBuf {
        let stamp = Utc::now().format("%Y%m%dT%H%M%S%.3f");
        let id = uuid::Uuid::new_v4().simple().to_string();
        self.dir.join(format!("{kind}-{stamp}-{}.wav", &id[..8]))
    }
}

fn write_wav<S: hound::Sample + Copy>(
    path: &Path,
    spec: hound::WavSpec,
    samples: &[S],
) -> hound::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = hound::WavWriter::create(path, spec)?;
    for &sample in samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()
}
