//! Speaker playback via cpal.
//!
//! Non-blocking: `play` builds an output stream over a shared sample
//! buffer and returns immediately; the render loop polls `is_busy`
//! every frame through the playback coordinator.

use crate::config::TtsConfig;
use crate::error::{Error, Result};
use crate::playback::AudioSink;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::StreamConfig;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{error, info};

struct PlaybackBuffer {
    samples: Vec<f32>,
    position: usize,
}

/// cpal-backed implementation of [`AudioSink`].
pub struct CpalSink {
    device: cpal::Device,
    stream: Option<cpal::Stream>,
    finished: Arc<AtomicBool>,
}

impl CpalSink {
    /// Open the configured (or default) output device.
    ///
    /// # Errors
    ///
    /// Returns an error when no output device is available.
    pub fn new(config: &TtsConfig) -> Result<Self> {
        let host = cpal::default_host();

        let device = if let Some(ref name) = config.output_device {
            host.output_devices()
                .map_err(|e| Error::Audio(format!("cannot enumerate devices: {e}")))?
                .find(|d| {
                    d.description()
                        .ok()
                        .map(|desc| desc.name() == name)
                        .unwrap_or(false)
                })
                .ok_or_else(|| Error::Audio(format!("output device '{name}' not found")))?
        } else {
            host.default_output_device()
                .ok_or_else(|| Error::Audio("no default output device".into()))?
        };

        let device_name = device
            .description()
            .map(|d| d.name().to_owned())
            .unwrap_or_else(|_| "<unknown>".into());
        info!("using output device: {device_name}");

        Ok(Self {
            device,
            stream: None,
            finished: Arc::new(AtomicBool::new(true)),
        })
    }
}

impl AudioSink for CpalSink {
    fn play(&mut self, samples: &[f32], sample_rate: u32) -> Result<()> {
        // drop any previous stream before starting a new one
        self.stream = None;

        if samples.is_empty() {
            self.finished.store(true, Ordering::SeqCst);
            return Ok(());
        }

        let stream_config = StreamConfig {
            channels: 1,
            sample_rate,
            buffer_size: cpal::BufferSize::Default,
        };
        let buffer = Arc::new(Mutex::new(PlaybackBuffer {
            samples: samples.to_vec(),
            position: 0,
        }));
        let finished = Arc::new(AtomicBool::new(false));

        let buffer_clone = Arc::clone(&buffer);
        let finished_clone = Arc::clone(&finished);
        let stream = self
            .device
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                    let Ok(mut buf) = buffer_clone.lock() else {
                        return;
                    };
                    for sample in data.iter_mut() {
                        if buf.position < buf.samples.len() {
                            *sample = buf.samples[buf.position];
                            buf.position += 1;
                        } else {
                            *sample = 0.0;
                            finished_clone.store(true, Ordering::SeqCst);
                        }
                    }
                },
                move |err| {
                    error!("audio output stream error: {err}");
                },
                None,
            )
            .map_err(|e| Error::Audio(format!("failed to build output stream: {e}")))?;

        stream
            .play()
            .map_err(|e| Error::Audio(format!("failed to start output stream: {e}")))?;

        self.stream = Some(stream);
        self.finished = finished;
        Ok(())
    }

    fn is_busy(&self) -> bool {
        self.stream.is_some() && !self.finished.load(Ordering::SeqCst)
    }

    fn stop(&mut self) {
        self.stream = None;
        self.finished.store(true, Ordering::SeqCst);
    }
}
