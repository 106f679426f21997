//! Speech capture and transcription pipeline.
//!
//! Two cooperating workers share a small bounded queue: the recorder
//! blocks on fixed-length microphone windows and forwards only those
//! that pass an RMS voice-activity gate; the transcriber pops segments
//! and turns them into text. Recognized text comes out of a result
//! queue polled by the embedding application.
//!
//! The recorder's blocking record call is not interruptible, so a stop
//! request is observed with a latency of at most one window.

use crate::config::CaptureConfig;
use crate::error::Result;
use crate::queue::WorkQueue;
use crate::stt::Transcriber;
use crate::worker::{join_with_timeout, JOIN_TIMEOUT, POP_TIMEOUT};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, info, warn};

/// VAD analysis window length.
const VAD_WINDOW: Duration = Duration::from_millis(100);

/// Microphone contract: blocking, window-based recording.
pub trait AudioSource: Send {
    /// Record one window of mono audio, blocking until it has elapsed.
    ///
    /// # Errors
    ///
    /// Returns an error when the capture device fails.
    fn record_window(&mut self, window: Duration) -> Result<Vec<f32>>;

    /// Sample rate of the returned audio in Hz.
    fn sample_rate(&self) -> u32;
}

impl AudioSource for crate::audio::record::CpalRecorder {
    fn record_window(&mut self, window: Duration) -> Result<Vec<f32>> {
        crate::audio::record::CpalRecorder::record_window(self, window)
    }

    fn sample_rate(&self) -> u32 {
        crate::audio::record::CpalRecorder::sample_rate(self)
    }
}

/// Whether a recorded segment contains enough speech to transcribe.
///
/// The segment is sliced into 100ms windows; a window counts as speech
/// when its RMS energy clears `threshold`, and the segment passes when
/// the cumulative speech time reaches `min_speech_secs`.
#[must_use]
pub fn has_speech(samples: &[f32], sample_rate: u32, threshold: f32, min_speech_secs: f32) -> bool {
    let per_window = (f64::from(sample_rate) * VAD_WINDOW.as_secs_f64()) as usize;
    if per_window == 0 || samples.is_empty() {
        return false;
    }
    let speech_windows = samples
        .chunks(per_window)
        .filter(|chunk| rms(chunk) > threshold)
        .count();
    let speech_secs = speech_windows as f32 * VAD_WINDOW.as_secs_f32();
    speech_secs >= min_speech_secs
}

fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

/// Owns the recorder and transcriber workers.
pub struct SpeechCaptureStage {
    segments: WorkQueue<Vec<f32>>,
    transcripts: WorkQueue<String>,
    stop: Arc<AtomicBool>,
    recorder: Option<JoinHandle<()>>,
    transcriber: Option<JoinHandle<()>>,
    window: Duration,
}

impl SpeechCaptureStage {
    #[must_use]
    pub fn new(segment_capacity: usize, transcript_capacity: usize) -> Self {
        Self {
            segments: WorkQueue::new("capture-segments", segment_capacity),
            transcripts: WorkQueue::new("capture-transcripts", transcript_capacity),
            stop: Arc::new(AtomicBool::new(false)),
            recorder: None,
            transcriber: None,
            window: Duration::from_secs(30),
        }
    }

    /// Spawn both workers. Idempotent while already running.
    pub fn start(
        &mut self,
        mut source: Box<dyn AudioSource>,
        transcriber: Arc<dyn Transcriber>,
        config: &CaptureConfig,
    ) {
        if self.is_running() {
            return;
        }
        self.stop.store(false, Ordering::SeqCst);
        self.window = Duration::from_secs_f32(config.window_secs.max(0.1));

        let window = self.window;
        let threshold = config.vad_threshold;
        let min_speech = config.min_speech_secs;
        let segments = self.segments.clone();
        let stop = Arc::clone(&self.stop);
        let recorder = std::thread::Builder::new()
            .name("capture-recorder".into())
            .spawn(move || {
                info!("recorder worker started");
                while !stop.load(Ordering::SeqCst) {
                    match source.record_window(window) {
                        Ok(samples) => {
                            if has_speech(&samples, source.sample_rate(), threshold, min_speech) {
                                if !segments.submit(samples) {
                                    debug!("segment queue full, discarding window");
                                }
                            } else {
                                debug!("window below speech threshold, discarded");
                            }
                        }
                        Err(e) => {
                            warn!("recording failed: {e}");
                            // avoid a hot error loop when the device is gone
                            std::thread::sleep(Duration::from_millis(500));
                        }
                    }
                }
                info!("recorder worker exiting");
            });
        match recorder {
            Ok(handle) => self.recorder = Some(handle),
            Err(e) => warn!("failed to spawn recorder worker: {e}"),
        }

        let segments = self.segments.clone();
        let transcripts = self.transcripts.clone();
        let stop = Arc::clone(&self.stop);
        let sample_rate = config.sample_rate;
        let worker = std::thread::Builder::new()
            .name("capture-transcriber".into())
            .spawn(move || {
                info!("transcriber worker started");
                while !stop.load(Ordering::SeqCst) {
                    let Some(segment) = segments.pop_timeout(POP_TIMEOUT) else {
                        continue;
                    };
                    match transcriber.transcribe(&segment, sample_rate) {
                        Ok(text) if text.trim().is_empty() => {
                            debug!("empty transcript, discarded");
                        }
                        Ok(text) => {
                            if !transcripts.submit(text) {
                                warn!("transcript queue full, text dropped");
                            }
                        }
                        Err(e) => warn!("transcription failed: {e}"),
                    }
                }
                info!("transcriber worker exiting");
            });
        match worker {
            Ok(handle) => self.transcriber = Some(handle),
            Err(e) => warn!("failed to spawn transcriber worker: {e}"),
        }
    }

    /// Pop one recognized text without blocking.
    #[must_use]
    pub fn poll_transcript(&self) -> Option<String> {
        self.transcripts.poll()
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.recorder.as_ref().is_some_and(|h| !h.is_finished())
            || self.transcriber.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop both workers. The recorder may take up to one recording
    /// window to notice.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.recorder.take() {
            join_with_timeout("capture-recorder", handle, self.window + JOIN_TIMEOUT);
        }
        if let Some(handle) = self.transcriber.take() {
            join_with_timeout("capture-transcriber", handle, JOIN_TIMEOUT);
        }
        info!("capture stage stopped");
    }
}

impl Drop for SpeechCaptureStage {
    fn drop(&mut self) {
        if self.recorder.is_some() || self.transcriber.is_some() {
            self.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use std::time::Instant;

    const RATE: u32 = 16_000;

    fn speech_window(secs: f32) -> Vec<f32> {
        // loud enough to clear the default 0.01 threshold
        vec![0.2; (RATE as f32 * secs) as usize]
    }

    #[test]
    fn vad_passes_sustained_speech() {
        assert!(has_speech(&speech_window(1.0), RATE, 0.01, 0.5));
    }

    #[test]
    fn vad_rejects_silence_and_short_bursts() {
        let silence = vec![0.0_f32; RATE as usize];
        assert!(!has_speech(&silence, RATE, 0.01, 0.5));

        // 200ms of speech inside 1s of silence: below the 0.5s minimum
        let mut burst = vec![0.0_f32; RATE as usize];
        for sample in &mut burst[..3200] {
            *sample = 0.2;
        }
        assert!(!has_speech(&burst, RATE, 0.01, 0.5));

        assert!(!has_speech(&[], RATE, 0.01, 0.5));
    }

    struct ScriptedSource {
        windows: Vec<Vec<f32>>,
    }

    impl AudioSource for ScriptedSource {
        fn record_window(&mut self, _window: Duration) -> Result<Vec<f32>> {
            // emulate the blocking record call at test speed
            std::thread::sleep(Duration::from_millis(10));
            Ok(self.windows.pop().unwrap_or_default())
        }

        fn sample_rate(&self) -> u32 {
            RATE
        }
    }

    struct EchoTranscriber;

    impl Transcriber for EchoTranscriber {
        fn transcribe(&self, samples: &[f32], _sample_rate: u32) -> Result<String> {
            Ok(format!("{} samples heard", samples.len()))
        }
    }

    fn test_config() -> CaptureConfig {
        CaptureConfig {
            window_secs: 0.1,
            ..CaptureConfig::default()
        }
    }

    #[test]
    fn speech_flows_through_to_transcripts() {
        let mut stage = SpeechCaptureStage::new(2, 8);
        stage.start(
            Box::new(ScriptedSource {
                windows: vec![speech_window(1.0)],
            }),
            Arc::new(EchoTranscriber),
            &test_config(),
        );

        let deadline = Instant::now() + Duration::from_secs(2);
        let transcript = loop {
            if let Some(text) = stage.poll_transcript() {
                break text;
            }
            assert!(Instant::now() < deadline, "no transcript within deadline");
            std::thread::sleep(Duration::from_millis(10));
        };
        assert_eq!(transcript, "16000 samples heard");
        stage.stop();
    }

    #[test]
    fn silence_never_reaches_the_transcriber() {
        let mut stage = SpeechCaptureStage::new(2, 8);
        stage.start(
            Box::new(ScriptedSource {
                windows: vec![vec![0.0; RATE as usize]; 3],
            }),
            Arc::new(EchoTranscriber),
            &test_config(),
        );
        std::thread::sleep(Duration::from_millis(200));
        assert!(stage.poll_transcript().is_none());
        stage.stop();
    }

    #[test]
    fn stop_terminates_both_workers() {
        let mut stage = SpeechCaptureStage::new(2, 8);
        stage.start(
            Box::new(ScriptedSource { windows: vec![] }),
            Arc::new(EchoTranscriber),
            &test_config(),
        );
        assert!(stage.is_running());
        stage.stop();
        assert!(!stage.is_running());
    }
}
