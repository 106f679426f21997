//! Lip-sync envelope derived from the playing audio.
//!
//! The mouth-open parameter follows the loudness of the audio: the
//! samples are sliced into short windows, each window's RMS is
//! precomputed when playback starts, and the render loop looks up the
//! window for the current elapsed time every frame. No audio analysis
//! happens on the render thread.

use std::time::Duration;

/// Window length for the RMS envelope.
const WINDOW: Duration = Duration::from_millis(50);

/// Precomputed mouth-open envelope for one utterance.
#[derive(Debug, Clone)]
pub struct LipSyncTrack {
    /// One mouth-open value per window, already gain-scaled and clamped.
    envelope: Vec<f32>,
    window: Duration,
}

impl LipSyncTrack {
    /// Build the envelope from mono samples.
    ///
    /// `gain` scales raw RMS (typically well below 1.0 for speech) into
    /// the avatar's `0.0..=1.0` mouth range.
    #[must_use]
    pub fn new(samples: &[f32], sample_rate: u32, gain: f32) -> Self {
        let per_window = (f64::from(sample_rate) * WINDOW.as_secs_f64()) as usize;
        let envelope = if per_window == 0 || samples.is_empty() {
            Vec::new()
        } else {
            samples
                .chunks(per_window)
                .map(|chunk| (rms(chunk) * gain).clamp(0.0, 1.0))
                .collect()
        };
        Self {
            envelope,
            window: WINDOW,
        }
    }

    /// Mouth-open value at `elapsed` since playback start.
    ///
    /// `None` past the end of the audio; the caller relaxes the mouth
    /// to closed.
    #[must_use]
    pub fn mouth_open(&self, elapsed: Duration) -> Option<f32> {
        let index = (elapsed.as_secs_f64() / self.window.as_secs_f64()) as usize;
        self.envelope.get(index).copied()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.envelope.is_empty()
    }
}

fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}
