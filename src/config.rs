//! Configuration types for the avatar assistant.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Speech-to-text settings.
    pub stt: SttConfig,
    /// Speech capture (microphone + VAD gate) settings.
    pub capture: CaptureConfig,
    /// Text-to-speech settings.
    pub tts: TtsConfig,
    /// Viewer (render loop) settings.
    pub viewer: ViewerConfig,
    /// Expression cooldown settings.
    pub cooldown: CooldownConfig,
    /// Work queue capacities.
    pub queues: QueueConfig,
    /// Emotion / irony analysis settings.
    pub emotion: EmotionConfig,
    /// Toxicity gate settings.
    pub toxicity: ToxicityConfig,
    /// Audio artifact retention settings.
    pub artifacts: ArtifactConfig,
    /// Conversation memory settings.
    pub memory: MemoryConfig,
}

/// Inference device for the external engines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    #[default]
    Cpu,
    Gpu,
}

/// Speech-to-text configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SttConfig {
    /// Transcription model size passed to the external engine
    /// ("tiny", "base", "small", "medium", "large").
    pub size_stt: String,
    /// Transcription language ("en" or "fr").
    pub language: String,
    /// Inference device.
    pub device: Device,
    /// External transcriber executable name (looked up on PATH).
    pub whisper_bin: String,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            size_stt: "base".into(),
            language: "en".into(),
            device: Device::Cpu,
            whisper_bin: "whisper".into(),
        }
    }
}

/// Microphone capture + voice-activity gate configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Sample rate for captured audio in Hz.
    pub sample_rate: u32,
    /// Fixed recording window length in seconds.
    pub window_secs: f32,
    /// RMS energy threshold above which a 100ms window counts as speech.
    ///
    /// Typical values for f32 samples in \[-1, 1\]:
    ///   - 0.005: very sensitive (picks up quiet speech and some noise)
    ///   - 0.01:  normal sensitivity (default)
    ///   - 0.02:  reduced sensitivity (noisy environments)
    pub vad_threshold: f32,
    /// Minimum cumulative speech duration (seconds) for a window to be
    /// forwarded to transcription.
    pub min_speech_secs: f32,
    /// Input device name (None = system default).
    pub input_device: Option<String>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            window_secs: 30.0,
            vad_threshold: 0.01,
            min_speech_secs: 0.5,
            input_device: None,
        }
    }
}

/// Text-to-speech configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TtsConfig {
    /// External synthesizer executable name (looked up on PATH).
    pub piper_bin: String,
    /// Voice model path handed to the synthesizer.
    pub voice_model: PathBuf,
    /// Output sample rate in Hz.
    pub sample_rate: u32,
    /// Output device name (None = system default).
    pub output_device: Option<String>,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            piper_bin: "piper".into(),
            voice_model: PathBuf::from("models/voice.onnx"),
            sample_rate: 22_050,
            output_device: None,
        }
    }
}

/// Render loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Window width in pixels.
    pub width: u32,
    /// Window height in pixels.
    pub height: u32,
    /// Window title.
    pub title: String,
    /// Delay between frames in milliseconds.
    pub frame_delay_ms: u64,
    /// Avatar model name to load from the registry.
    pub model: String,
    /// Multiplier applied to the lip-sync RMS envelope before it drives
    /// the mouth-open parameter.
    pub lip_sync_gain: f32,
    /// Idle rotation oscillation amplitude in degrees.
    pub rotation_amplitude: f32,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            width: 500,
            height: 600,
            title: "Mascotte".into(),
            frame_delay_ms: 10,
            model: "mao".into(),
            lip_sync_gain: 3.0,
            rotation_amplitude: 1.0,
        }
    }
}

/// Expression cooldown configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CooldownConfig {
    /// Minimum interval between expression changes for normal requests,
    /// in seconds.
    pub normal_secs: f64,
    /// Minimum interval for priority requests, in seconds.
    pub priority_secs: f64,
}

impl Default for CooldownConfig {
    fn default() -> Self {
        // short enough that back-to-back sentences can still shift
        // the expression
        Self {
            normal_secs: 0.3,
            priority_secs: 0.1,
        }
    }
}

impl CooldownConfig {
    /// Cooldown to apply for a given request priority.
    #[must_use]
    pub fn for_priority(&self, priority: bool) -> Duration {
        let secs = if priority {
            self.priority_secs
        } else {
            self.normal_secs
        };
        Duration::from_secs_f64(secs.max(0.0))
    }
}

/// Bounded queue capacities.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// External submission queue (any thread -> render loop).
    pub external: usize,
    /// Per-stage input queues (render loop -> worker).
    pub stage: usize,
    /// Per-stage result queues (worker -> render loop).
    pub results: usize,
    /// Capture segment queue (recorder -> transcriber).
    pub capture: usize,
    /// Maximum external submissions drained per frame tick.
    pub drain_per_tick: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            external: 50,
            stage: 16,
            results: 16,
            capture: 2,
            drain_per_tick: 3,
        }
    }
}

/// Emotion / irony analysis configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmotionConfig {
    /// Irony score threshold above which the polarity flip is applied.
    pub irony_threshold: f32,
    /// How the two irony detectors are combined ("strict", "mean", "union").
    pub irony_mode: crate::emotion::irony::IronyMode,
}

impl Default for EmotionConfig {
    fn default() -> Self {
        Self {
            irony_threshold: 0.5,
            irony_mode: crate::emotion::irony::IronyMode::Strict,
        }
    }
}

/// Toxicity gate configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToxicityConfig {
    /// Overall toxicity score at or above which a submission is rejected.
    pub threshold: f32,
}

impl Default for ToxicityConfig {
    fn default() -> Self {
        Self { threshold: 0.5 }
    }
}

/// Audio artifact retention configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactConfig {
    /// Directory for transient `.wav` artifacts (None = platform cache dir).
    pub dir: Option<PathBuf>,
    /// Retention window in seconds; older artifacts are swept.
    pub retention_secs: u64,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            dir: None,
            retention_secs: 15 * 60,
        }
    }
}

/// Conversation memory configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Maximum conversation turns retained in the sliding window
    /// (one turn = one user + one assistant message).
    pub max_turns: usize,
    /// Path of the persisted feeling history (None = platform data dir).
    pub feeling_history: Option<PathBuf>,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_turns: 20,
            feeling_history: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::error::Error::Config(e.to_string()))
    }
}
