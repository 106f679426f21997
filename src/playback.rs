//! Playback state machine and expression cooldowns.
//!
//! At most one utterance plays at a time. The coordinator owns the
//! transition between `Idle` and `Playing` and is driven by the render
//! loop: `begin` when a synthesized utterance is taken up, `poll` every
//! frame with the current instant. All timing flows through explicit
//! `Instant` arguments so the state machine is testable without audio.

use crate::config::CooldownConfig;
use crate::error::Result;
use crate::messages::SynthesisResult;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Grace margin past the nominal duration before playback is forced to
/// end even when the sink still reports busy.
pub const PLAYBACK_MARGIN: Duration = Duration::from_millis(500);

/// Audio output contract. `play` must not block for the duration of the
/// audio; `is_busy` reports whether samples are still being rendered.
///
/// Deliberately not `Send`: the cpal stream is thread-bound and the
/// coordinator only ever runs on the render thread.
pub trait AudioSink {
    /// Start non-blocking playback of mono samples.
    ///
    /// # Errors
    ///
    /// Returns an error when the output device rejects the audio.
    fn play(&mut self, samples: &[f32], sample_rate: u32) -> Result<()>;

    /// Whether the sink is still rendering the last `play` call.
    fn is_busy(&self) -> bool;

    /// Stop rendering immediately.
    fn stop(&mut self);
}

/// Current playback state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Playing {
        wav_path: PathBuf,
        emotion_id: Option<String>,
        started_at: Instant,
        duration: Duration,
    },
}

/// Rate limiter for avatar expression changes.
///
/// Priority utterances use the shorter window so reactions to direct
/// interaction stay snappy while ambient chatter cannot make the face
/// flicker.
#[derive(Debug, Clone, Default)]
pub struct CooldownTracker {
    last_change: Option<Instant>,
}

impl CooldownTracker {
    /// Whether an expression change is allowed at `now`.
    #[must_use]
    pub fn ready(&self, now: Instant, cooldown: Duration) -> bool {
        match self.last_change {
            None => true,
            Some(last) => now.duration_since(last) >= cooldown,
        }
    }

    /// Record an expression change at `now`.
    pub fn mark(&mut self, now: Instant) {
        self.last_change = Some(now);
    }
}

/// What `begin` decided for one utterance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeginPlayback {
    /// Expression to apply now, `None` when suppressed by cooldown or
    /// absent from the utterance.
    pub expression: Option<String>,
}

/// Playback finished; the render loop resets expressions and mouth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackFinished {
    pub wav_path: PathBuf,
    /// Whether an expression was applied and now needs resetting.
    pub had_expression: bool,
}

/// Owns the audio sink, the playback state, and the cooldown tracker.
pub struct PlaybackCoordinator {
    sink: Box<dyn AudioSink>,
    state: PlaybackState,
    cooldowns: CooldownConfig,
    tracker: CooldownTracker,
    applied_expression: bool,
}

impl PlaybackCoordinator {
    #[must_use]
    pub fn new(sink: Box<dyn AudioSink>, cooldowns: CooldownConfig) -> Self {
        Self {
            sink,
            state: PlaybackState::Idle,
            cooldowns,
            tracker: CooldownTracker::default(),
            applied_expression: false,
        }
    }

    #[must_use]
    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.state == PlaybackState::Idle
    }

    /// Start playing one utterance.
    ///
    /// Returns `None` without touching the sink when playback is already
    /// in progress; the caller keeps the utterance queued. Otherwise the
    /// audio starts and the returned decision names the expression to
    /// apply, already filtered through the cooldown.
    ///
    /// # Errors
    ///
    /// Returns an error when the sink rejects the audio; the state stays
    /// `Idle` so the next utterance can still play.
    pub fn begin(&mut self, result: &SynthesisResult, now: Instant) -> Result<Option<BeginPlayback>> {
        if !self.is_idle() {
            return Ok(None);
        }

        self.sink.play(&result.samples, result.sample_rate)?;
        let duration = Duration::from_secs_f64(result.duration_secs.max(0.0));
        self.state = PlaybackState::Playing {
            wav_path: result.wav_path.clone(),
            emotion_id: result.emotion_id.clone(),
            started_at: now,
            duration,
        };

        let expression = match &result.emotion_id {
            Some(id) if self.request_expression(result.priority, now) => {
                self.applied_expression = true;
                Some(id.clone())
            }
            Some(id) => {
                debug!("expression '{id}' suppressed by cooldown");
                self.applied_expression = false;
                None
            }
            None => {
                self.applied_expression = false;
                None
            }
        };

        info!(
            duration_secs = duration.as_secs_f64(),
            expression = expression.as_deref().unwrap_or("-"),
            "playback started"
        );
        Ok(Some(BeginPlayback { expression }))
    }

    /// Whether an expression change is allowed now; records the change
    /// when it is. Shared by playback-bound and direct expression paths
    /// so both count against the same cooldown.
    pub fn request_expression(&mut self, priority: bool, now: Instant) -> bool {
        let cooldown = self.cooldowns.for_priority(priority);
        if self.tracker.ready(now, cooldown) {
            self.tracker.mark(now);
            true
        } else {
            debug!(
                remaining_secs = (cooldown
                    - now.duration_since(self.tracker.last_change.unwrap_or(now)))
                .as_secs_f64(),
                "expression change rejected by cooldown"
            );
            false
        }
    }

    /// Advance the state machine to `now`.
    ///
    /// Playback ends when the sink goes quiet or when the elapsed time
    /// exceeds the nominal duration plus the grace margin, whichever
    /// comes first. The margin guards against a sink that never clears
    /// its busy flag.
    pub fn poll(&mut self, now: Instant) -> Option<PlaybackFinished> {
        let PlaybackState::Playing {
            wav_path,
            started_at,
            duration,
            ..
        } = &self.state
        else {
            return None;
        };

        let elapsed = now.duration_since(*started_at);
        let overtime = elapsed > *duration + PLAYBACK_MARGIN;
        if self.sink.is_busy() && !overtime {
            return None;
        }
        if overtime && self.sink.is_busy() {
            warn!("sink still busy past duration + margin, forcing stop");
            self.sink.stop();
        }

        let finished = PlaybackFinished {
            wav_path: wav_path.clone(),
            had_expression: self.applied_expression,
        };
        self.state = PlaybackState::Idle;
        self.applied_expression = false;
        info!("playback finished");
        Some(finished)
    }

    /// Elapsed playback time at `now`, for the lip-sync envelope.
    #[must_use]
    pub fn elapsed(&self, now: Instant) -> Option<Duration> {
        match &self.state {
            PlaybackState::Playing { started_at, .. } => Some(now.duration_since(*started_at)),
            PlaybackState::Idle => None,
        }
    }

    /// Stop any in-progress playback immediately.
    pub fn shutdown(&mut self) {
        if !self.is_idle() {
            self.sink.stop();
            self.state = PlaybackState::Idle;
            self.applied_expression = false;
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::messages::Outcome;
    use chrono::Utc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    /// Sink whose busy flag is controlled by the test.
    struct TestSink {
        busy: Arc<AtomicBool>,
        plays: usize,
    }

    impl TestSink {
        fn new() -> (Self, Arc<AtomicBool>) {
            let busy = Arc::new(AtomicBool::new(false));
            (
                Self {
                    busy: Arc::clone(&busy),
                    plays: 0,
                },
                busy,
            )
        }
    }

    impl AudioSink for TestSink {
        fn play(&mut self, _samples: &[f32], _sample_rate: u32) -> Result<()> {
            self.plays += 1;
            self.busy.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn is_busy(&self) -> bool {
            self.busy.load(Ordering::SeqCst)
        }

        fn stop(&mut self) {
            self.busy.store(false, Ordering::SeqCst);
        }
    }

    fn utterance(duration_secs: f64, emotion_id: Option<&str>, priority: bool) -> SynthesisResult {
        SynthesisResult {
            text: "test".into(),
            wav_path: PathBuf::from("/tmp/tts_test.wav"),
            samples: vec![0.1; 160],
            sample_rate: 16_000,
            duration_secs,
            emotion_id: emotion_id.map(str::to_owned),
            priority,
            outcome: Outcome::Ok,
            finished_at: Utc::now(),
        }
    }

    fn coordinator() -> (PlaybackCoordinator, Arc<AtomicBool>) {
        let (sink, busy) = TestSink::new();
        // long cooldowns so suppression is observable at whole-second
        // instants
        let cooldowns = CooldownConfig {
            normal_secs: 4.0,
            priority_secs: 1.0,
        };
        (PlaybackCoordinator::new(Box::new(sink), cooldowns), busy)
    }

    #[test]
    fn at_most_one_playback() {
        let (mut coord, _busy) = coordinator();
        let now = Instant::now();
        let first = coord.begin(&utterance(1.0, Some("wow"), false), now).unwrap();
        assert!(first.is_some());
        // second begin while playing: refused, sink untouched
        let second = coord.begin(&utterance(1.0, Some("sad"), false), now).unwrap();
        assert!(second.is_none());
        assert!(!coord.is_idle());
    }

    #[test]
    fn ends_when_sink_goes_quiet() {
        let (mut coord, busy) = coordinator();
        let start = Instant::now();
        coord.begin(&utterance(10.0, None, false), start).unwrap();
        // well within the duration but the sink is done
        busy.store(false, Ordering::SeqCst);
        let finished = coord.poll(start + Duration::from_millis(100));
        assert!(finished.is_some());
        assert!(coord.is_idle());
    }

    #[test]
    fn ends_when_duration_plus_margin_exceeded() {
        let (mut coord, busy) = coordinator();
        let start = Instant::now();
        coord.begin(&utterance(1.0, None, false), start).unwrap();
        busy.store(true, Ordering::SeqCst);

        // busy and within margin: still playing
        assert!(coord.poll(start + Duration::from_millis(1400)).is_none());
        // busy but past duration + margin: forced to end
        let finished = coord.poll(start + Duration::from_millis(1600));
        assert!(finished.is_some());
        assert!(coord.is_idle());
        assert!(!busy.load(Ordering::SeqCst));
    }

    #[test]
    fn cooldown_suppresses_rapid_expression_changes() {
        let (mut coord, busy) = coordinator();
        let start = Instant::now();

        let first = coord
            .begin(&utterance(0.1, Some("wow"), false), start)
            .unwrap()
            .unwrap();
        assert_eq!(first.expression.as_deref(), Some("wow"));

        busy.store(false, Ordering::SeqCst);
        coord.poll(start + Duration::from_millis(200)).unwrap();

        // 1s after the first change: inside the 4s normal cooldown
        let second = coord
            .begin(&utterance(0.1, Some("sad"), false), start + Duration::from_secs(1))
            .unwrap()
            .unwrap();
        assert!(second.expression.is_none());

        busy.store(false, Ordering::SeqCst);
        coord.poll(start + Duration::from_secs(2)).unwrap();

        // 5s after the first change: cooldown elapsed
        let third = coord
            .begin(&utterance(0.1, Some("sad"), false), start + Duration::from_secs(5))
            .unwrap()
            .unwrap();
        assert_eq!(third.expression.as_deref(), Some("sad"));
    }

    #[test]
    fn priority_uses_shorter_cooldown() {
        let (mut coord, busy) = coordinator();
        let start = Instant::now();

        coord
            .begin(&utterance(0.1, Some("wow"), true), start)
            .unwrap()
            .unwrap();
        busy.store(false, Ordering::SeqCst);
        coord.poll(start + Duration::from_millis(200)).unwrap();

        // 2s > 1s priority cooldown, < 4s normal cooldown
        let second = coord
            .begin(&utterance(0.1, Some("sad"), true), start + Duration::from_secs(2))
            .unwrap()
            .unwrap();
        assert_eq!(second.expression.as_deref(), Some("sad"));
    }

    #[test]
    fn finished_reports_expression_reset_need() {
        let (mut coord, busy) = coordinator();
        let start = Instant::now();
        coord
            .begin(&utterance(0.1, Some("wow"), false), start)
            .unwrap()
            .unwrap();
        busy.store(false, Ordering::SeqCst);
        let finished = coord.poll(start + Duration::from_millis(200)).unwrap();
        assert!(finished.had_expression);

        // an utterance without an expression needs no reset
        coord
            .begin(&utterance(0.1, None, false), start + Duration::from_secs(10))
            .unwrap()
            .unwrap();
        busy.store(false, Ordering::SeqCst);
        let finished = coord
            .poll(start + Duration::from_secs(11))
            .unwrap();
        assert!(!finished.had_expression);
    }

    #[test]
    fn elapsed_tracks_playback_only() {
        let (mut coord, _busy) = coordinator();
        let start = Instant::now();
        assert!(coord.elapsed(start).is_none());
        coord.begin(&utterance(1.0, None, false), start).unwrap();
        let elapsed = coord.elapsed(start + Duration::from_millis(300)).unwrap();
        assert_eq!(elapsed, Duration::from_millis(300));
    }
}
