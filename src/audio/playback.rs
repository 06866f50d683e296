//! Speaker output via cpal.
//!
//! The cpal stream is not `Send` on every platform, so it lives on its own
//! thread. Writers share a sample queue with the stream callback.

use crate::collaborators::AudioSink;
use crate::config::AudioConfig;
use crate::error::{HarkError, Result};
use cpal::StreamConfig;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{error, info};

const POLL: Duration = Duration::from_millis(5);

#[derive(Default)]
struct SpeakerState {
    queue: Mutex<VecDeque<f32>>,
    failed: AtomicBool,
    closed: AtomicBool,
}

impl SpeakerState {
    fn queue(&self) -> Result<MutexGuard<'_, VecDeque<f32>>> {
        self.queue
            .lock()
            .map_err(|e| HarkError::Playback(format!("speaker queue lock poisoned: {e}")))
    }

    fn check(&self) -> Result<()> {
        if self.failed.load(Ordering::Acquire) {
            return Err(HarkError::Playback("output stream failed".into()));
        }
        Ok(())
    }
}

/// Streaming speaker sink. Writes block once about one chunk is queued
/// ahead of the device.
pub struct CpalSink {
    state: Arc<SpeakerState>,
    thread: Option<JoinHandle<()>>,
}

impl CpalSink {
    /// Open the configured output device and start its stream.
    ///
    /// # Errors
    ///
    /// Returns an error if no output device is available or the stream
    /// cannot be started.
    pub fn open(config: &AudioConfig) -> Result<Self> {
        let state = Arc::new(SpeakerState::default());
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<()>>(1);
        let thread_state = Arc::clone(&state);
        let config = config.clone();

        let thread = std::thread::Builder::new()
            .name("hark-speaker".into())
            .spawn(move || {
                let stream = match build_stream(&config, &thread_state) {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));
                while !thread_state.closed.load(Ordering::Acquire) {
                    std::thread::sleep(POLL * 4);
                }
                drop(stream);
            })
            .map_err(|e| HarkError::Playback(format!("cannot spawn speaker thread: {e}")))?;

        let ready = ready_rx
            .recv()
            .map_err(|_| HarkError::Playback("speaker thread exited during startup".into()))?;
        let sink = Self {
            state,
            thread: Some(thread),
        };
        ready.map(|()| sink)
    }

    /// List available output devices.
    ///
    /// # Errors
    ///
    /// Returns an error if devices cannot be enumerated.
    pub fn list_output_devices() -> Result<Vec<String>> {
        let host = cpal::default_host();
        let devices = host
            .output_devices()
            .map_err(|e| HarkError::Playback(format!("cannot enumerate devices: {e}")))?;

        let mut names = Vec::new();
        for device in devices {
            if let Ok(desc) = device.description() {
                names.push(desc.name().to_owned());
            }
        }
        Ok(names)
    }
}

fn build_stream(config: &AudioConfig, state: &Arc<SpeakerState>) -> Result<cpal::Stream> {
    let host = cpal::default_host();

    let device = if let Some(ref name) = config.output_device {
        host.output_devices()
            .map_err(|e| HarkError::Playback(format!("cannot enumerate devices: {e}")))?
            .find(|d| {
                d.description()
                    .ok()
                    .is_some_and(|desc| desc.name() == name)
            })
            .ok_or_else(|| HarkError::Playback(format!("output device '{name}' not found")))?
    } else {
        host.default_output_device()
            .ok_or_else(|| HarkError::Playback("no default output device".into()))?
    };

    let device_name = device
        .description()
        .map(|d| d.name().to_owned())
        .unwrap_or_else(|_| "<unknown>".into());
    info!(device = %device_name, rate = config.output_sample_rate, "using output device");

    let stream_config = StreamConfig {
        channels: 1,
        sample_rate: config.output_sample_rate,
        buffer_size: cpal::BufferSize::Default,
    };

    let callback_state = Arc::clone(state);
    let error_state = Arc::clone(state);
    let stream = device
        .build_output_stream(
            &stream_config,
            move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                let Ok(mut queue) = callback_state.queue.lock() else {
                    data.fill(0.0);
                    return;
                };
                for sample in data.iter_mut() {
                    *sample = queue.pop_front().unwrap_or(0.0);
                }
            },
            move |err| {
                error!("audio output stream error: {err}");
                error_state.failed.store(true, Ordering::Release);
            },
            None,
        )
        .map_err(|e| HarkError::Playback(format!("failed to build output stream: {e}")))?;

    stream
        .play()
        .map_err(|e| HarkError::Playback(format!("failed to start output stream: {e}")))?;
    Ok(stream)
}

impl AudioSink for CpalSink {
    fn write(&mut self, chunk: &[f32]) -> Result<()> {
        self.state.check()?;
        self.state.queue()?.extend(chunk.iter().copied());
        loop {
            self.state.check()?;
            if self.state.queue()?.len() <= chunk.len() {
                return Ok(());
            }
            std::thread::sleep(POLL);
        }
    }

    fn finish(&mut self) -> Result<()> {
        loop {
            self.state.check()?;
            if self.state.queue()?.is_empty() {
                return Ok(());
            }
            std::thread::sleep(POLL);
        }
    }

    fn stop(&mut self) {
        if let Ok(mut queue) = self.state.queue() {
            queue.clear();
        }
    }
}

impl Drop for CpalSink {
    fn drop(&mut self) {
        self.state.closed.store(true, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}
