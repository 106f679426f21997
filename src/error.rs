//! Error types for the avatar pipeline.

/// Top-level error type for the avatar assistant.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Audio device or stream error.
    #[error("audio error: {0}")]
    Audio(String),

    /// Speech-to-text transcription error.
    #[error("STT error: {0}")]
    Stt(String),

    /// Text-to-speech synthesis error.
    #[error("TTS error: {0}")]
    Tts(String),

    /// Emotion / irony classification error.
    #[error("emotion error: {0}")]
    Emotion(String),

    /// Toxicity classification error.
    #[error("toxicity error: {0}")]
    Toxicity(String),

    /// Avatar model loading or rendering error.
    #[error("avatar error: {0}")]
    Avatar(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Conversation memory / persisted state error.
    #[error("memory error: {0}")]
    Memory(String),

    /// Pipeline coordination error (stage startup, singleton discipline).
    #[error("pipeline error: {0}")]
    Pipeline(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, Error>;
