//! The render loop and its process-wide handle.
//!
//! One `ViewerRuntime` owns the avatar, the playback coordinator, the
//! worker stages, and the conversation memory. It is single-threaded:
//! every tick drains a bounded number of external submissions, routes
//! them to the stages, takes up finished utterances when idle, and
//! drives the idle animation and lip-sync.
//!
//! Other threads talk to it only through [`ViewerHandle`], which wraps
//! the external submission queue and the toxicity gate. At most one
//! runtime may be registered process-wide; external threads can wait
//! for it to come up.

use crate::artifacts::ArtifactStore;
use crate::avatar::AvatarModel;
use crate::config::Config;
use crate::emotion::irony::EmotionAnalyzer;
use crate::emotion::stage::EmotionStage;
use crate::error::{Error, Result};
use crate::feelings::FeelingHistory;
use crate::lipsync::LipSyncTrack;
use crate::memory::{ConversationMemory, MemoryInfo, Role};
use crate::messages::SubmitRequest;
use crate::playback::{AudioSink, PlaybackCoordinator};
use crate::queue::WorkQueue;
use crate::synth::stage::SynthesisStage;
use crate::synth::SpeechSynthesizer;
use crate::text::split_sentences;
use crate::toxicity::ToxicityFilter;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// How often expired audio artifacts are swept.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Per-frame phase increment of the idle rotation oscillation.
const ROTATION_PHASE_STEP: f32 = std::f32::consts::PI * 10.0 / 1000.0 * 0.5;

/// Expression ids walked by [`ViewerRuntime::cycle_expression`], in the
/// order the emotion table introduces them.
const EXPRESSION_CYCLE: &[&str] = &[
    "idle", "wow", "laugh", "love", "pleased", "very_sad", "studious", "idle_alt", "angry",
    "gloom", "sad", "blush",
];

/// Thread-safe handle for submitting work to the running viewer.
#[derive(Clone)]
pub struct ViewerHandle {
    external: WorkQueue<SubmitRequest>,
    toxicity: Arc<ToxicityFilter>,
    stop: Arc<AtomicBool>,
}

impl ViewerHandle {
    /// Submit text for the avatar to speak.
    ///
    /// The text is screened for toxicity synchronously; a flagged or
    /// unscreenable text returns `false` and produces no downstream
    /// work. `false` is also returned when the queue is full.
    pub fn send_text(&self, text: &str, priority: bool) -> bool {
        if self.toxicity.is_toxic(text) {
            info!("submission rejected by toxicity gate");
            return false;
        }
        self.external.submit(SubmitRequest::new(text, priority))
    }

    /// Submit text with a preset expression, bypassing classification.
    /// The toxicity gate still applies.
    pub fn send_with_expression(&self, text: &str, emotion_id: &str, priority: bool) -> bool {
        if self.toxicity.is_toxic(text) {
            info!("submission rejected by toxicity gate");
            return false;
        }
        self.external
            .submit(SubmitRequest::with_emotion(text, emotion_id, priority))
    }

    /// Apply an expression without speaking. Subject to the same
    /// cooldown as playback-bound expressions.
    pub fn send_emotion_direct(&self, emotion_id: &str) -> bool {
        self.external
            .submit(SubmitRequest::with_emotion("", emotion_id, true))
    }

    /// Ask the render loop to exit after the current frame.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }
}

struct Registry {
    slot: Mutex<Option<ViewerHandle>>,
    ready: Condvar,
}

static REGISTRY: Registry = Registry {
    slot: Mutex::new(None),
    ready: Condvar::new(),
};

/// Handle of the registered viewer, if one is running.
#[must_use]
pub fn get_instance() -> Option<ViewerHandle> {
    REGISTRY.slot.lock().ok()?.clone()
}

/// Block until a viewer registers or `timeout` elapses.
#[must_use]
pub fn wait_for_instance(timeout: Duration) -> Option<ViewerHandle> {
    let deadline = Instant::now() + timeout;
    let mut slot = REGISTRY.slot.lock().ok()?;
    while slot.is_none() {
        let remaining = deadline.checked_duration_since(Instant::now())?;
        let (guard, result) = REGISTRY.ready.wait_timeout(slot, remaining).ok()?;
        slot = guard;
        if result.timed_out() && slot.is_none() {
            return None;
        }
    }
    slot.clone()
}

fn register(handle: ViewerHandle) -> Result<()> {
    let mut slot = REGISTRY
        .slot
        .lock()
        .map_err(|_| Error::Pipeline("viewer registry lock poisoned".into()))?;
    if slot.is_some() {
        return Err(Error::Pipeline("a viewer is already initialized".into()));
    }
    *slot = Some(handle);
    REGISTRY.ready.notify_all();
    Ok(())
}

fn unregister() {
    if let Ok(mut slot) = REGISTRY.slot.lock() {
        *slot = None;
    }
}

/// Everything the runtime needs injected at construction.
pub struct ViewerParts {
    pub avatar: Box<dyn AvatarModel>,
    pub sink: Box<dyn AudioSink>,
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
}

/// The single-threaded render/update loop.
pub struct ViewerRuntime {
    config: Config,
    avatar: Box<dyn AvatarModel>,
    coordinator: PlaybackCoordinator,
    emotion_stage: EmotionStage,
    synth_stage: SynthesisStage,
    external: WorkQueue<SubmitRequest>,
    memory: ConversationMemory,
    feelings: FeelingHistory,
    artifacts: ArtifactStore,
    lipsync: Option<LipSyncTrack>,
    rotation_phase: f32,
    offset: (f32, f32),
    scale: f32,
    cycle_index: usize,
    last_sweep: Instant,
    stop: Arc<AtomicBool>,
    toxicity: Arc<ToxicityFilter>,
    registered: bool,
}

impl ViewerRuntime {
    /// Build a runtime without registering it process-wide. Used by
    /// embedders that manage their own lifecycle, and by tests.
    ///
    /// # Errors
    ///
    /// Returns an error when the artifact store cannot be opened.
    pub fn new(config: Config, parts: ViewerParts) -> Result<Self> {
        let artifacts = ArtifactStore::open(&config.artifacts)?;
        let analyzer = Arc::new(EmotionAnalyzer::heuristic(
            config.emotion.irony_mode,
            config.emotion.irony_threshold,
        ));
        let toxicity = Arc::new(ToxicityFilter::lexicon(config.toxicity.threshold));

        let mut emotion_stage = EmotionStage::new(config.queues.stage, config.queues.results);
        emotion_stage.start(Arc::clone(&analyzer));

        let mut synth_stage = SynthesisStage::new(config.queues.stage, config.queues.results);
        synth_stage.start(parts.synthesizer, analyzer, artifacts.clone());

        let feelings_path = config.memory.feeling_history.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("mascotte")
                .join("feeling_history.json")
        });

        let external = WorkQueue::new("external", config.queues.external);
        let coordinator = PlaybackCoordinator::new(parts.sink, config.cooldown.clone());
        let memory = ConversationMemory::new(config.memory.max_turns);

        Ok(Self {
            avatar: parts.avatar,
            coordinator,
            emotion_stage,
            synth_stage,
            external,
            memory,
            feelings: FeelingHistory::load(&feelings_path),
            artifacts,
            lipsync: None,
            rotation_phase: 0.0,
            offset: (0.0, 0.0),
            scale: 1.0,
            cycle_index: 0,
            last_sweep: Instant::now(),
            stop: Arc::new(AtomicBool::new(false)),
            toxicity,
            registered: false,
            config,
        })
    }

    /// Build a runtime and register it as the process-wide instance.
    ///
    /// # Errors
    ///
    /// Fails fast when another viewer is already registered, or when
    /// construction fails.
    pub fn initialize(config: Config, parts: ViewerParts) -> Result<Self> {
        let mut runtime = Self::new(config, parts)?;
        register(runtime.handle())?;
        runtime.registered = true;
        info!("viewer initialized");
        Ok(runtime)
    }

    /// Handle for submitting work from any thread.
    #[must_use]
    pub fn handle(&self) -> ViewerHandle {
        ViewerHandle {
            external: self.external.clone(),
            toxicity: Arc::clone(&self.toxicity),
            stop: Arc::clone(&self.stop),
        }
    }

    /// Current playback state, for embedders and tests.
    #[must_use]
    pub fn playback_state(&self) -> &crate::playback::PlaybackState {
        self.coordinator.state()
    }

    /// Work still sitting in the synthesis stage (queued plus finished
    /// but not yet played).
    #[must_use]
    pub fn synthesis_backlog(&self) -> usize {
        self.synth_stage.pending() + self.synth_stage.ready()
    }

    #[must_use]
    pub fn memory_info(&self) -> MemoryInfo {
        self.memory.get_memory_info()
    }

    /// Record a user utterance (e.g. from the capture pipeline) into the
    /// conversation window.
    pub fn add_user_message(&mut self, content: &str) {
        self.memory.add_message(Role::User, content);
    }

    /// Clear the conversation window.
    pub fn clear_memory(&mut self) {
        self.memory.clear();
    }

    /// Nudge the model offset (renderer arrow keys).
    pub fn nudge_offset(&mut self, dx: f32, dy: f32) {
        self.offset.0 += dx;
        self.offset.1 += dy;
        self.avatar.set_offset(self.offset.0, self.offset.1);
    }

    /// Nudge the model scale, clamped to a usable range.
    pub fn nudge_scale(&mut self, delta: f32) {
        self.scale = (self.scale + delta).clamp(0.1, 5.0);
        self.avatar.set_scale(self.scale);
    }

    /// Step to the next expression in the fixed cycle. Manual control,
    /// not subject to the playback cooldown.
    pub fn cycle_expression(&mut self) {
        self.cycle_index = (self.cycle_index + 1) % EXPRESSION_CYCLE.len();
        let id = EXPRESSION_CYCLE[self.cycle_index];
        if let Err(e) = self.avatar.set_expression(id) {
            warn!("cannot apply expression '{id}': {e}");
        }
    }

    /// Return offset, scale, and expressions to their defaults.
    pub fn reset_model(&mut self) {
        self.offset = (0.0, 0.0);
        self.scale = 1.0;
        self.cycle_index = 0;
        self.avatar.set_offset(0.0, 0.0);
        self.avatar.set_scale(1.0);
        self.avatar.reset_expressions();
    }

    /// Run until a stop is requested, ticking once per frame delay.
    pub fn run(&mut self) {
        let frame_delay = Duration::from_millis(self.config.viewer.frame_delay_ms);
        info!("render loop started ({}ms frames)", frame_delay.as_millis());
        while !self.stop.load(Ordering::SeqCst) {
            self.tick(Instant::now());
            std::thread::sleep(frame_delay);
        }
        self.cleanup();
    }

    /// One frame of the cooperative loop.
    pub fn tick(&mut self, now: Instant) {
        // 1. drain a bounded number of external submissions
        for request in self.external.drain_up_to(self.config.queues.drain_per_tick) {
            self.route_request(&request, now);
        }

        // 2. feelings from finished analyses; utterances only when idle
        while let Some(result) = self.emotion_stage.poll_result() {
            if result.outcome.is_ok() {
                if let Err(e) = self.feelings.append(result.analyzed_at, &result.detected) {
                    warn!("cannot persist feeling history: {e}");
                }
            } else {
                debug!("discarding failed emotion result");
            }
        }
        if self.coordinator.is_idle() {
            if let Some(result) = self.synth_stage.poll_result() {
                self.begin_utterance(&result, now);
            }
        }

        // 3. playback completion
        if let Some(finished) = self.coordinator.poll(now) {
            if finished.had_expression {
                self.avatar.reset_expressions();
            }
            self.avatar.set_mouth_open(0.0);
            self.lipsync = None;
        }

        // 4-5. idle animation
        self.rotation_phase += ROTATION_PHASE_STEP;
        self.avatar
            .rotate(self.rotation_phase.sin() * self.config.viewer.rotation_amplitude);

        // 6. lip-sync from the playing audio
        if let (Some(track), Some(elapsed)) = (&self.lipsync, self.coordinator.elapsed(now)) {
            self.avatar
                .set_mouth_open(track.mouth_open(elapsed).unwrap_or(0.0));
        }

        // 7. advance and draw
        let dt = self.config.viewer.frame_delay_ms as f32 / 1000.0;
        self.avatar.update(dt);
        self.avatar.draw();

        if now.duration_since(self.last_sweep) >= SWEEP_INTERVAL {
            self.artifacts.sweep_expired();
            self.last_sweep = now;
        }
    }

    fn route_request(&mut self, request: &SubmitRequest, now: Instant) {
        // expression-only request: no audio, straight to the avatar
        if request.text.is_empty() {
            if let Some(id) = &request.emotion_id {
                if self.coordinator.request_expression(request.priority, now) {
                    if let Err(e) = self.avatar.set_expression(id) {
                        warn!("cannot apply expression '{id}': {e}");
                    }
                }
            }
            return;
        }

        self.memory.add_message(Role::Assistant, request.text.clone());

        // full text to the classifier, per-sentence to the synthesizer
        if request.emotion_id.is_none() && !self.emotion_stage.submit(request.text.clone()) {
            debug!("emotion stage full, skipping analysis");
        }
        for sentence in split_sentences(&request.text) {
            if !self
                .synth_stage
                .submit(sentence, request.emotion_id.clone(), request.priority)
            {
                debug!("synthesis stage full, dropping sentence");
            }
        }
    }

    fn begin_utterance(&mut self, result: &crate::messages::SynthesisResult, now: Instant) {
        if !result.outcome.is_ok() {
            debug!("discarding failed synthesis result");
            return;
        }
        match self.coordinator.begin(result, now) {
            Ok(Some(begin)) => {
                self.lipsync = Some(LipSyncTrack::new(
                    &result.samples,
                    result.sample_rate,
                    self.config.viewer.lip_sync_gain,
                ));
                if let Some(id) = begin.expression {
                    if let Err(e) = self.avatar.set_expression(&id) {
                        warn!("cannot apply expression '{id}': {e}");
                    }
                }
            }
            Ok(None) => {
                // not idle; the result stays deferred in its queue
            }
            Err(e) => warn!("cannot start playback: {e}"),
        }
    }

    /// Stop all workers and release the process-wide registration.
    /// Failures are logged, never propagated: cleanup runs to the end.
    pub fn cleanup(&mut self) {
        info!("viewer shutting down");
        self.coordinator.shutdown();
        self.emotion_stage.stop();
        self.synth_stage.stop();
        self.avatar.reset_expressions();
        self.avatar.set_mouth_open(0.0);
        self.artifacts.sweep_expired();
        if self.registered {
            unregister();
            self.registered = false;
        }
    }
}

impl Drop for ViewerRuntime {
    fn drop(&mut self) {
        if self.registered {
            unregister();
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::avatar::NullAvatar;
    use crate::synth::SynthesizedSpeech;

    struct InstantSink {
        busy: bool,
    }

    impl AudioSink for InstantSink {
        fn play(&mut self, _samples: &[f32], _sample_rate: u32) -> Result<()> {
            self.busy = true;
            Ok(())
        }

        fn is_busy(&self) -> bool {
            self.busy
        }

        fn stop(&mut self) {
            self.busy = false;
        }
    }

    struct ToneSynth;

    impl SpeechSynthesizer for ToneSynth {
        fn synthesize(&self, _text: &str) -> Result<SynthesizedSpeech> {
            Ok(SynthesizedSpeech {
                samples: vec![0.1; 1600],
                sample_rate: 16_000,
            })
        }
    }

    fn test_config(dir: &std::path::Path) -> Config {
        let mut config = Config::default();
        config.artifacts.dir = Some(dir.join("artifacts"));
        config.memory.feeling_history = Some(dir.join("feelings.json"));
        config
    }

    fn test_runtime(dir: &std::path::Path) -> ViewerRuntime {
        ViewerRuntime::new(
            test_config(dir),
            ViewerParts {
                avatar: Box::new(NullAvatar::new()),
                sink: Box::new(InstantSink { busy: false }),
                synthesizer: Arc::new(ToneSynth),
            },
        )
        .unwrap()
    }

    fn tick_until<F: Fn(&ViewerRuntime) -> bool>(runtime: &mut ViewerRuntime, cond: F) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while !cond(runtime) {
            assert!(Instant::now() < deadline, "condition not reached");
            runtime.tick(Instant::now());
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn submitted_text_reaches_playback() {
        let tmp = tempfile::tempdir().unwrap();
        let mut runtime = test_runtime(tmp.path());
        let handle = runtime.handle();

        assert!(handle.send_text("I am so happy to see you today!", false));
        tick_until(&mut runtime, |r| !r.coordinator.is_idle());
        runtime.cleanup();
    }

    #[test]
    fn toxic_text_is_refused_with_no_downstream_work() {
        let tmp = tempfile::tempdir().unwrap();
        let mut runtime = test_runtime(tmp.path());
        let handle = runtime.handle();

        assert!(!handle.send_text("you are worthless and stupid", false));
        // a few frames later nothing has been queued or played
        for _ in 0..5 {
            runtime.tick(Instant::now());
        }
        assert!(runtime.coordinator.is_idle());
        assert_eq!(runtime.synth_stage.pending(), 0);
        assert_eq!(runtime.emotion_stage.pending(), 0);
        runtime.cleanup();
    }

    #[test]
    fn assistant_turns_land_in_memory() {
        let tmp = tempfile::tempdir().unwrap();
        let mut runtime = test_runtime(tmp.path());
        let handle = runtime.handle();

        runtime.add_user_message("hello there");
        assert!(handle.send_text("Nice to meet you.", false));
        runtime.tick(Instant::now());

        let info = runtime.memory_info();
        assert_eq!(info.messages_in_memory, 2);
        assert_eq!(info.current_turns, 1);
        runtime.cleanup();
    }

    #[test]
    fn cleanup_stops_all_workers() {
        let tmp = tempfile::tempdir().unwrap();
        let mut runtime = test_runtime(tmp.path());
        assert!(runtime.emotion_stage.is_running());
        assert!(runtime.synth_stage.is_running());
        runtime.cleanup();
        assert!(!runtime.emotion_stage.is_running());
        assert!(!runtime.synth_stage.is_running());
    }

    #[derive(Default)]
    struct TransformLog {
        offset: (f32, f32),
        scale: f32,
        expression: Option<String>,
    }

    struct SharedAvatar(std::sync::Arc<Mutex<TransformLog>>);

    impl AvatarModel for SharedAvatar {
        fn set_expression(&mut self, id: &str) -> Result<()> {
            self.0.lock().unwrap().expression = Some(id.to_owned());
            Ok(())
        }

        fn reset_expressions(&mut self) {
            self.0.lock().unwrap().expression = None;
        }

        fn set_mouth_open(&mut self, _value: f32) {}

        fn rotate(&mut self, _degrees: f32) {}

        fn set_offset(&mut self, dx: f32, dy: f32) {
            self.0.lock().unwrap().offset = (dx, dy);
        }

        fn set_scale(&mut self, scale: f32) {
            self.0.lock().unwrap().scale = scale;
        }

        fn update(&mut self, _dt: f32) {}

        fn draw(&mut self) {}
    }

    #[test]
    fn transform_controls_drive_the_avatar() {
        let tmp = tempfile::tempdir().unwrap();
        let log = std::sync::Arc::new(Mutex::new(TransformLog::default()));
        let mut runtime = ViewerRuntime::new(
            test_config(tmp.path()),
            ViewerParts {
                avatar: Box::new(SharedAvatar(std::sync::Arc::clone(&log))),
                sink: Box::new(InstantSink { busy: false }),
                synthesizer: Arc::new(ToneSynth),
            },
        )
        .unwrap();

        runtime.nudge_offset(5.0, -3.0);
        runtime.nudge_offset(5.0, -3.0);
        assert_eq!(log.lock().unwrap().offset, (10.0, -6.0));

        runtime.nudge_scale(10.0);
        assert_eq!(log.lock().unwrap().scale, 5.0);

        runtime.cycle_expression();
        assert_eq!(log.lock().unwrap().expression.as_deref(), Some("wow"));

        runtime.reset_model();
        {
            let log = log.lock().unwrap();
            assert_eq!(log.offset, (0.0, 0.0));
            assert_eq!(log.scale, 1.0);
            assert!(log.expression.is_none());
        }
        runtime.cleanup();
    }

    #[test]
    fn registry_allows_exactly_one_instance() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(get_instance().is_none());

        let mut first = ViewerRuntime::initialize(
            test_config(tmp.path()),
            ViewerParts {
                avatar: Box::new(NullAvatar::new()),
                sink: Box::new(InstantSink { busy: false }),
                synthesizer: Arc::new(ToneSynth),
            },
        )
        .unwrap();
        assert!(get_instance().is_some());
        assert!(wait_for_instance(Duration::from_millis(50)).is_some());

        // a second initialization fails fast
        let second = ViewerRuntime::initialize(
            test_config(tmp.path()),
            ViewerParts {
                avatar: Box::new(NullAvatar::new()),
                sink: Box::new(InstantSink { busy: false }),
                synthesizer: Arc::new(ToneSynth),
            },
        );
        assert!(second.is_err());

        first.cleanup();
        assert!(get_instance().is_none());
        assert!(wait_for_instance(Duration::from_millis(20)).is_none());
    }
}
