//! Message types passed between pipeline stages.

use crate::emotion::Emotion;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::time::Instant;

/// A request submitted through the external API, consumed exactly once
/// by the render loop.
#[derive(Debug, Clone)]
pub struct SubmitRequest {
    /// Text to speak (and, unless `emotion_id` is preset, to analyze).
    pub text: String,
    /// Preset expression id bypassing emotion classification.
    pub emotion_id: Option<String>,
    /// Priority requests use the shorter expression cooldown.
    pub priority: bool,
    /// When the request entered the external queue.
    pub submitted_at: Instant,
}

impl SubmitRequest {
    #[must_use]
    pub fn new(text: impl Into<String>, priority: bool) -> Self {
        Self {
            text: text.into(),
            emotion_id: None,
            priority,
            submitted_at: Instant::now(),
        }
    }

    #[must_use]
    pub fn with_emotion(text: impl Into<String>, emotion_id: impl Into<String>, priority: bool) -> Self {
        Self {
            text: text.into(),
            emotion_id: Some(emotion_id.into()),
            priority,
            submitted_at: Instant::now(),
        }
    }
}

/// Input to a worker stage: a payload or the shutdown sentinel.
///
/// `stop()` enqueues `Shutdown` to unblock a worker waiting on an empty
/// queue; the worker treats it as "drain and exit".
#[derive(Debug, Clone)]
pub enum StageInput<T> {
    Item(T),
    Shutdown,
}

/// Per-item outcome carried by stage results.
///
/// Failures are isolated per item and travel as data, never as panics
/// across the queue boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Ok,
    Failed { reason: String },
}

impl Outcome {
    #[must_use]
    pub fn is_ok(&self) -> bool {
        matches!(self, Outcome::Ok)
    }
}

/// A text handed to the emotion classification stage.
#[derive(Debug, Clone)]
pub struct EmotionRequest {
    pub text: String,
    pub submitted_at: Instant,
}

/// Result of analyzing one input text for emotions.
#[derive(Debug, Clone)]
pub struct EmotionResult {
    /// The analyzed text.
    pub text: String,
    /// Labels whose score cleared the detection threshold, best first.
    pub detected: Vec<Emotion>,
    /// Highest-probability label after irony adjustment.
    pub dominant: Option<Emotion>,
    /// Expression id mapped from the dominant label.
    pub expression: Option<String>,
    pub outcome: Outcome,
    pub analyzed_at: DateTime<Utc>,
}

/// A text handed to the speech synthesis stage.
#[derive(Debug, Clone)]
pub struct SynthesisRequest {
    pub text: String,
    /// Preset expression id; when `None` the stage derives one from the
    /// text so the result arrives with audio and expression together.
    pub emotion_id: Option<String>,
    pub priority: bool,
    pub submitted_at: Instant,
}

/// Synthesized utterance ready for playback, consumed exactly once by
/// the playback coordinator.
#[derive(Debug, Clone)]
pub struct SynthesisResult {
    pub text: String,
    /// Path of the transient WAV artifact.
    pub wav_path: PathBuf,
    /// Mono f32 samples for the sink and the lip-sync envelope.
    pub samples: Vec<f32>,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Playback duration in seconds.
    pub duration_secs: f64,
    /// Expression to apply while the audio plays.
    pub emotion_id: Option<String>,
    pub priority: bool,
    pub outcome: Outcome,
    pub finished_at: DateTime<Utc>,
}
