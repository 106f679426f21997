//! Mascotte: an interactive virtual-avatar assistant.
//!
//! The crate drives a speaking, emoting 2D avatar:
//! Microphone → VAD → STT → text, and text → emotion/irony analysis →
//! TTS → playback with expression and lip-sync.
//!
//! # Architecture
//!
//! Background worker stages are connected by bounded queues to one
//! single-threaded render loop that owns all avatar state:
//! - **Capture**: records windows from the microphone via `cpal`,
//!   gates them with RMS voice activity, transcribes them
//! - **Emotion**: classifies text over a fixed label set, adjusts for
//!   irony, and maps the dominant label to an avatar expression
//! - **Synthesis**: turns each sentence into a WAV artifact plus an
//!   expression id
//! - **Viewer**: the render loop; drains submissions, starts at most
//!   one playback at a time, animates the avatar and its mouth

pub mod artifacts;
pub mod audio;
pub mod avatar;
pub mod capture;
pub mod config;
pub mod emotion;
pub mod error;
pub mod feelings;
pub mod lipsync;
pub mod memory;
pub mod messages;
pub mod playback;
pub mod prompter;
pub mod queue;
pub mod stt;
pub mod synth;
pub mod text;
pub mod toxicity;
pub mod viewer;

mod worker;

pub use config::Config;
pub use error::{Error, Result};
pub use memory::ConversationMemory;
pub use playback::{PlaybackCoordinator, PlaybackState};
pub use viewer::{ViewerHandle, ViewerParts, ViewerRuntime};
