//! Text-to-speech synthesis.
//!
//! The engine is an external collaborator behind [`SpeechSynthesizer`].
//! The shipped implementation shells out to a `piper` binary and reads
//! back the WAV it produces; any engine producing f32 mono samples can
//! be substituted at construction time.

pub mod stage;

use crate::config::TtsConfig;
use crate::error::{Error, Result};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use tracing::{debug, info};

/// One synthesized utterance: f32 mono samples plus their rate.
#[derive(Debug, Clone)]
pub struct SynthesizedSpeech {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl SynthesizedSpeech {
    /// Playback duration in seconds.
    #[must_use]
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / f64::from(self.sample_rate)
    }
}

/// External speech synthesis contract: text in, mono audio out.
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `text`. Empty text yields empty audio, not an error.
    ///
    /// # Errors
    ///
    /// Returns an error when the underlying engine fails; the stage
    /// converts it into a failed result rather than propagating.
    fn synthesize(&self, text: &str) -> Result<SynthesizedSpeech>;
}

/// Piper TTS driven as a subprocess.
///
/// Piper reads text on stdin and writes a WAV file; the engine reads
/// the file back and converts to f32 mono.
pub struct PiperProcess {
    binary: PathBuf,
    voice_model: PathBuf,
    work_dir: PathBuf,
}

impl PiperProcess {
    /// Locate the piper binary and validate the voice model path.
    ///
    /// # Errors
    ///
    /// Returns an error when the binary is not on `PATH` or the voice
    /// model file does not exist.
    pub fn new(config: &TtsConfig) -> Result<Self> {
        let binary = which::which(&config.piper_bin)
            .map_err(|e| Error::Tts(format!("piper binary '{}' not found: {e}", config.piper_bin)))?;
        let voice_model = config.voice_model.clone();
        if !voice_model.is_file() {
            return Err(Error::Tts(format!(
                "voice model not found: {}",
                voice_model.display()
            )));
        }
        info!("piper ready: {} ({})", binary.display(), voice_model.display());
        Ok(Self {
            binary,
            voice_model,
            work_dir: std::env::temp_dir(),
        })
    }
}

impl SpeechSynthesizer for PiperProcess {
    fn synthesize(&self, text: &str) -> Result<SynthesizedSpeech> {
        if text.trim().is_empty() {
            return Ok(SynthesizedSpeech {
                samples: Vec::new(),
                sample_rate: 0,
            });
        }

        let out_path = self.work_dir.join(format!(
            "piper_{}_{}.wav",
            std::process::id(),
            blake3::hash(text.as_bytes()).to_hex()
        ));

        debug!("piper synthesizing {} chars", text.len());
        let mut child = Command::new(&self.binary)
            .arg("--model")
            .arg(&self.voice_model)
            .arg("--output_file")
            .arg(&out_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| Error::Tts(format!("failed to spawn piper: {e}")))?;

        {
            use std::io::Write;
            let stdin = child
                .stdin
                .as_mut()
                .ok_or_else(|| Error::Tts("piper stdin unavailable".into()))?;
            stdin
                .write_all(text.as_bytes())
                .map_err(|e| Error::Tts(format!("failed to write to piper: {e}")))?;
        }

        let status = child
            .wait()
            .map_err(|e| Error::Tts(format!("piper did not exit cleanly: {e}")))?;
        if !status.success() {
            return Err(Error::Tts(format!("piper exited with {status}")));
        }

        let speech = read_wav_mono(&out_path);
        let _ = std::fs::remove_file(&out_path);
        speech
    }
}

/// Read a WAV file into f32 mono samples, averaging channels.
///
/// # Errors
///
/// Returns an error when the file cannot be opened or decoded.
pub fn read_wav_mono(path: &std::path::Path) -> Result<SynthesizedSpeech> {
    let mut reader = hound::WavReader::open(path)
        .map_err(|e| Error::Tts(format!("cannot open {}: {e}", path.display())))?;
    let spec = reader.spec();

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| Error::Tts(format!("cannot decode {}: {e}", path.display())))?,
        hound::SampleFormat::Int => {
            let max = f32::from(i16::MAX);
            reader
                .samples::<i16>()
                .map(|s| s.map(|v| f32::from(v) / max))
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| Error::Tts(format!("cannot decode {}: {e}", path.display())))?
        }
    };

    let channels = usize::from(spec.channels.max(1));
    let samples = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect()
    };

    Ok(SynthesizedSpeech {
        samples,
        sample_rate: spec.sample_rate,
    })
}

/// Write f32 mono samples as a 16-bit PCM WAV file.
///
/// # Errors
///
/// Returns an error when the file cannot be written.
pub fn write_wav_mono(path: &std::path::Path, samples: &[f32], sample_rate: u32) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)
        .map_err(|e| Error::Tts(format!("cannot create {}: {e}", path.display())))?;
    for &sample in samples {
        let clamped = (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16;
        writer
            .write_sample(clamped)
            .map_err(|e| Error::Tts(format!("cannot write {}: {e}", path.display())))?;
    }
    writer
        .finalize()
        .map_err(|e| Error::Tts(format!("cannot finalize {}: {e}", path.display())))?;
    Ok(())
}
