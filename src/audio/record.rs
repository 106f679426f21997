//! Microphone capture via cpal.
//!
//! Captures at the device's native sample rate and downsamples to the
//! configured pipeline rate in software. Recording is blocking and
//! window-based: the recorder worker asks for one fixed-length window
//! at a time.

use crate::audio::{downsample, to_mono};
use crate::config::CaptureConfig;
use crate::error::{Error, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::StreamConfig;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// Blocking, window-based microphone recorder.
pub struct CpalRecorder {
    device: cpal::Device,
    stream_config: StreamConfig,
    target_sample_rate: u32,
}

impl CpalRecorder {
    /// Open the configured (or default) input device.
    ///
    /// # Errors
    ///
    /// Returns an error when no input device is available.
    pub fn new(config: &CaptureConfig) -> Result<Self> {
        let host = cpal::default_host();

        let device = if let Some(ref name) = config.input_device {
            host.input_devices()
                .map_err(|e| Error::Audio(format!("cannot enumerate devices: {e}")))?
                .find(|d| {
                    d.description()
                        .ok()
                        .map(|desc| desc.name() == name)
                        .unwrap_or(false)
                })
                .ok_or_else(|| Error::Audio(format!("input device '{name}' not found")))?
        } else {
            host.default_input_device()
                .ok_or_else(|| Error::Audio("no default input device".into()))?
        };

        let device_name = device
            .description()
            .map(|d| d.name().to_owned())
            .unwrap_or_else(|_| "<unknown>".into());

        let default_config = device
            .default_input_config()
            .map_err(|e| Error::Audio(format!("no default input config: {e}")))?;
        let stream_config = StreamConfig {
            channels: default_config.channels(),
            sample_rate: default_config.sample_rate(),
            buffer_size: cpal::BufferSize::Default,
        };

        info!(
            "input device '{device_name}': native {}Hz, {} channels, target {}Hz",
            stream_config.sample_rate,
            stream_config.channels,
            config.sample_rate
        );

        Ok(Self {
            device,
            stream_config,
            target_sample_rate: config.sample_rate,
        })
    }

    #[must_use]
    pub fn sample_rate(&self) -> u32 {
        self.target_sample_rate
    }

    /// Record one window of audio, blocking until `window` has elapsed.
    ///
    /// Returns mono samples at the target rate.
    ///
    /// # Errors
    ///
    /// Returns an error when the input stream cannot be built or started.
    pub fn record_window(&self, window: Duration) -> Result<Vec<f32>> {
        let native_rate = self.stream_config.sample_rate;
        let native_channels = self.stream_config.channels;
        let (tx, rx) = crossbeam_channel::unbounded::<Vec<f32>>();

        let stream = self
            .device
            .build_input_stream(
                &self.stream_config,
                move |data: &[f32], _info: &cpal::InputCallbackInfo| {
                    // keep the audio callback cheap: ship raw frames out
                    if tx.send(data.to_vec()).is_err() {
                        debug!("capture receiver gone, dropping frames");
                    }
                },
                move |err| {
                    error!("audio input stream error: {err}");
                },
                None,
            )
            .map_err(|e| Error::Audio(format!("failed to build input stream: {e}")))?;

        stream
            .play()
            .map_err(|e| Error::Audio(format!("failed to start input stream: {e}")))?;

        let deadline = Instant::now() + window;
        let mut native = Vec::new();
        while Instant::now() < deadline {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if let Ok(chunk) = rx.recv_timeout(remaining.min(Duration::from_millis(100))) {
                native.extend_from_slice(&chunk);
            }
        }
        drop(stream);

        let mono = to_mono(&native, native_channels);
        Ok(downsample(&mono, native_rate, self.target_sample_rate))
    }
}
