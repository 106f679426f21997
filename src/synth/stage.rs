//! Background worker turning text into playable utterances.
//!
//! Each item is synthesized, written to a WAV artifact, and paired with
//! an expression id so the playback coordinator receives audio and
//! expression together. When the request carries no preset expression
//! the stage derives one from the text.

use crate::artifacts::ArtifactStore;
use crate::emotion::irony::EmotionAnalyzer;
use crate::messages::{Outcome, StageInput, SynthesisRequest, SynthesisResult};
use crate::queue::WorkQueue;
use crate::synth::{write_wav_mono, SpeechSynthesizer};
use crate::worker::{join_with_timeout, JOIN_TIMEOUT, POP_TIMEOUT};
use chrono::Utc;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Owns the synthesis worker thread and its input/result queues.
pub struct SynthesisStage {
    input: WorkQueue<StageInput<SynthesisRequest>>,
    results: WorkQueue<SynthesisResult>,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

struct WorkerContext {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    analyzer: Arc<EmotionAnalyzer>,
    artifacts: ArtifactStore,
}

impl SynthesisStage {
    #[must_use]
    pub fn new(input_capacity: usize, result_capacity: usize) -> Self {
        Self {
            input: WorkQueue::new("synth-input", input_capacity),
            results: WorkQueue::new("synth-results", result_capacity),
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }

    /// Spawn the worker thread. Idempotent while already running.
    pub fn start(
        &mut self,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        analyzer: Arc<EmotionAnalyzer>,
        artifacts: ArtifactStore,
    ) {
        if self.is_running() {
            return;
        }
        self.running.store(true, Ordering::SeqCst);
        let input = self.input.clone();
        let results = self.results.clone();
        let running = Arc::clone(&self.running);
        let ctx = WorkerContext {
            synthesizer,
            analyzer,
            artifacts,
        };
        let handle = std::thread::Builder::new()
            .name("synth-stage".into())
            .spawn(move || run_worker(&input, &results, &ctx, &running));
        match handle {
            Ok(handle) => self.handle = Some(handle),
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                warn!("failed to spawn synthesis worker: {e}");
            }
        }
    }

    /// Enqueue one text for synthesis. Returns `false` when the input
    /// queue is full and the request was dropped.
    pub fn submit(&self, text: impl Into<String>, emotion_id: Option<String>, priority: bool) -> bool {
        self.input.submit(StageInput::Item(SynthesisRequest {
            text: text.into(),
            emotion_id,
            priority,
            submitted_at: Instant::now(),
        }))
    }

    /// Pop one finished utterance without blocking.
    #[must_use]
    pub fn poll_result(&self) -> Option<SynthesisResult> {
        self.results.poll()
    }

    #[must_use]
    pub fn pending(&self) -> usize {
        self.input.len()
    }

    /// Finished utterances waiting to be taken up.
    #[must_use]
    pub fn ready(&self) -> usize {
        self.results.len()
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop the worker: clear the run flag, enqueue the shutdown
    /// sentinel, join with a bounded timeout.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        let _ = self.input.submit(StageInput::Shutdown);
        if let Some(handle) = self.handle.take() {
            join_with_timeout("synth-stage", handle, JOIN_TIMEOUT);
        }
        info!("synthesis stage stopped");
    }
}

impl Drop for SynthesisStage {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.stop();
        }
    }
}

fn run_worker(
    input: &WorkQueue<StageInput<SynthesisRequest>>,
    results: &WorkQueue<SynthesisResult>,
    ctx: &WorkerContext,
    running: &AtomicBool,
) {
    info!("synthesis worker started");
    while running.load(Ordering::SeqCst) {
        match input.pop_timeout(POP_TIMEOUT) {
            None => {}
            Some(StageInput::Shutdown) => break,
            Some(StageInput::Item(request)) => {
                let result = synthesize_one(ctx, &request);
                if !results.submit(result) {
                    warn!("synthesis result queue full, utterance dropped");
                }
            }
        }
    }
    info!("synthesis worker exiting");
}

fn synthesize_one(ctx: &WorkerContext, request: &SynthesisRequest) -> SynthesisResult {
    match try_synthesize(ctx, request) {
        Ok(result) => result,
        Err(e) => {
            warn!("synthesis failed for \"{}\": {e}", request.text);
            SynthesisResult {
                text: request.text.clone(),
                wav_path: PathBuf::new(),
                samples: Vec::new(),
                sample_rate: 0,
                duration_secs: 0.0,
                emotion_id: request.emotion_id.clone(),
                priority: request.priority,
                outcome: Outcome::Failed {
                    reason: e.to_string(),
                },
                finished_at: Utc::now(),
            }
        }
    }
}

fn try_synthesize(
    ctx: &WorkerContext,
    request: &SynthesisRequest,
) -> crate::error::Result<SynthesisResult> {
    let started = Instant::now();
    let speech = ctx.synthesizer.synthesize(&request.text)?;

    // preset expression wins; otherwise derive one from the text
    let emotion_id = match &request.emotion_id {
        Some(id) => Some(id.clone()),
        None => match ctx.analyzer.expression_for(&request.text) {
            Ok(expression) => Some(expression),
            Err(e) => {
                warn!("expression derivation failed, playing without: {e}");
                None
            }
        },
    };

    let wav_path = ctx.artifacts.path_for(&request.text);
    write_wav_mono(&wav_path, &speech.samples, speech.sample_rate)?;
    debug!(
        elapsed_ms = started.elapsed().as_millis() as u64,
        duration_secs = speech.duration_secs(),
        "synthesized utterance"
    );

    Ok(SynthesisResult {
        text: request.text.clone(),
        wav_path,
        duration_secs: speech.duration_secs(),
        samples: speech.samples,
        sample_rate: speech.sample_rate,
        emotion_id,
        priority: request.priority,
        outcome: Outcome::Ok,
        finished_at: Utc::now(),
    })
}
