//! Speech-to-text transcription.
//!
//! The engine is an external collaborator behind [`Transcriber`]. The
//! shipped implementation drives a `whisper` CLI binary; loading it is
//! expensive, so the process-wide instance is created lazily exactly
//! once and shared from then on.

use crate::config::{Device, SttConfig};
use crate::error::{Error, Result};
use crate::synth::write_wav_mono;
use std::path::PathBuf;
use std::process::Command;
use std::sync::OnceLock;
use tracing::{debug, info};

/// External transcription contract: mono audio in, text out.
pub trait Transcriber: Send + Sync {
    /// Transcribe mono samples. Silence yields an empty string.
    ///
    /// # Errors
    ///
    /// Returns an error when the underlying engine fails.
    fn transcribe(&self, samples: &[f32], sample_rate: u32) -> Result<String>;
}

impl<T: Transcriber + Sync + ?Sized> Transcriber for &'static T {
    fn transcribe(&self, samples: &[f32], sample_rate: u32) -> Result<String> {
        (**self).transcribe(samples, sample_rate)
    }
}

/// Whisper driven as a subprocess.
#[derive(Debug)]
pub struct WhisperCli {
    binary: PathBuf,
    model_size: String,
    language: String,
    device: Device,
    work_dir: PathBuf,
}

impl WhisperCli {
    /// Locate the whisper binary.
    ///
    /// # Errors
    ///
    /// Returns an error when the binary is not on `PATH`.
    pub fn new(config: &SttConfig) -> Result<Self> {
        let binary = which::which(&config.whisper_bin).map_err(|e| {
            Error::Stt(format!(
                "whisper binary '{}' not found: {e}",
                config.whisper_bin
            ))
        })?;
        info!(
            "whisper ready: {} (model={}, language={})",
            binary.display(),
            config.size_stt,
            config.language
        );
        Ok(Self {
            binary,
            model_size: config.size_stt.clone(),
            language: config.language.clone(),
            device: config.device,
            work_dir: std::env::temp_dir(),
        })
    }
}

impl Transcriber for WhisperCli {
    fn transcribe(&self, samples: &[f32], sample_rate: u32) -> Result<String> {
        if samples.is_empty() {
            return Ok(String::new());
        }

        let stem = format!("stt_{}_{}", std::process::id(), hash_samples(samples).to_hex());
        let wav_path = self.work_dir.join(format!("{stem}.wav"));
        write_wav_mono(&wav_path, samples, sample_rate)?;

        debug!("transcribing {:.1}s of audio", samples.len() as f64 / f64::from(sample_rate));
        let device = match self.device {
            Device::Cpu => "cpu",
            Device::Gpu => "cuda",
        };
        let output = Command::new(&self.binary)
            .arg(&wav_path)
            .args(["--model", &self.model_size])
            .args(["--language", &self.language])
            .args(["--device", device])
            .args(["--output_format", "txt"])
            .arg("--output_dir")
            .arg(&self.work_dir)
            .output()
            .map_err(|e| Error::Stt(format!("failed to run whisper: {e}")))?;

        let txt_path = self.work_dir.join(format!("{stem}.txt"));
        let result = if output.status.success() {
            std::fs::read_to_string(&txt_path)
                .map(|t| t.trim().to_owned())
                .map_err(|e| Error::Stt(format!("whisper wrote no transcript: {e}")))
        } else {
            Err(Error::Stt(format!(
                "whisper exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr)
            )))
        };

        let _ = std::fs::remove_file(&wav_path);
        let _ = std::fs::remove_file(&txt_path);
        result
    }
}

fn hash_samples(samples: &[f32]) -> blake3::Hash {
    let mut hasher = blake3::Hasher::new();
    for sample in samples {
        hasher.update(&sample.to_le_bytes());
    }
    hasher.finalize()
}

static SHARED: OnceLock<WhisperCli> = OnceLock::new();

/// Process-wide transcriber, created on first use.
///
/// Later calls return the already-initialized instance and ignore their
/// config argument.
///
/// # Errors
///
/// Returns an error when first-time initialization fails; a later call
/// may retry with a corrected config.
pub fn shared_transcriber(config: &SttConfig) -> Result<&'static WhisperCli> {
    if let Some(existing) = SHARED.get() {
        return Ok(existing);
    }
    let created = WhisperCli::new(config)?;
    // a concurrent initializer may have won the race; use whichever landed
    let _ = SHARED.set(created);
    SHARED
        .get()
        .ok_or_else(|| Error::Stt("transcriber initialization raced and failed".into()))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn missing_binary_is_an_error() {
        let config = SttConfig {
            whisper_bin: "definitely-not-a-real-binary-name".into(),
            ..SttConfig::default()
        };
        let err = WhisperCli::new(&config).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn sample_hash_is_stable_and_content_addressed() {
        let a = [0.1_f32, -0.5, 0.25];
        let b = [0.1_f32, -0.5, 0.26];
        assert_eq!(hash_samples(&a), hash_samples(&a));
        assert_ne!(hash_samples(&a), hash_samples(&b));
    }
}
