//! Background worker running emotion analysis off the render thread.

use crate::emotion::irony::EmotionAnalyzer;
use crate::messages::{EmotionRequest, EmotionResult, Outcome, StageInput};
use crate::queue::WorkQueue;
use crate::worker::{join_with_timeout, JOIN_TIMEOUT, POP_TIMEOUT};
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Scores at or above this value count as detected labels in results.
const DETECTION_THRESHOLD: f32 = 0.3;

/// Owns the emotion worker thread and its input/result queues.
///
/// The worker blocks on the input queue with a short timeout, so it
/// notices both new work and a stop request promptly. A failing analysis
/// produces a `Failed` result for that item; it never kills the worker.
pub struct EmotionStage {
    input: WorkQueue<StageInput<EmotionRequest>>,
    results: WorkQueue<EmotionResult>,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl EmotionStage {
    #[must_use]
    pub fn new(input_capacity: usize, result_capacity: usize) -> Self {
        Self {
            input: WorkQueue::new("emotion-input", input_capacity),
            results: WorkQueue::new("emotion-results", result_capacity),
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }

    /// Spawn the worker thread. Idempotent while already running.
    pub fn start(&mut self, analyzer: Arc<EmotionAnalyzer>) {
        if self.is_running() {
            return;
        }
        self.running.store(true, Ordering::SeqCst);
        let input = self.input.clone();
        let results = self.results.clone();
        let running = Arc::clone(&self.running);
        let handle = std::thread::Builder::new()
            .name("emotion-stage".into())
            .spawn(move || run_worker(&input, &results, &analyzer, &running));
        match handle {
            Ok(handle) => self.handle = Some(handle),
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                warn!("failed to spawn emotion worker: {e}");
            }
        }
    }

    /// Enqueue one text for analysis. Returns `false` when the input
    /// queue is full and the text was dropped.
    pub fn submit(&self, text: impl Into<String>) -> bool {
        self.input.submit(StageInput::Item(EmotionRequest {
            text: text.into(),
            submitted_at: Instant::now(),
        }))
    }

    /// Pop one finished result without blocking.
    #[must_use]
    pub fn poll_result(&self) -> Option<EmotionResult> {
        self.results.poll()
    }

    #[must_use]
    pub fn pending(&self) -> usize {
        self.input.len()
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
            join_with_timeout("emotion-stage", handle, JOIN_TIMEOUT);
        }
        info!("emotion stage stopped");
    }
}

impl Drop for EmotionStage {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.stop();
        }
    }
}

fn run_worker(
    input: &WorkQueue<StageInput<EmotionRequest>>,
    results: &WorkQueue<EmotionResult>,
    analyzer: &EmotionAnalyzer,
    running: &AtomicBool,
) {
    info!("emotion worker started");
    while running.load(Ordering::SeqCst) {
        match input.pop_timeout(POP_TIMEOUT) {
            None => {}
            Some(StageInput::Shutdown) => break,
            Some(StageInput::Item(request)) => {
                let result = analyze_one(analyzer, &request);
                if !results.submit(result) {
                    warn!("emotion result queue full, result dropped");
                }
            }
        }
    }
    info!("emotion worker exiting");
}

fn analyze_one(analyzer: &EmotionAnalyzer, request: &EmotionRequest) -> EmotionResult {
    match analyzer.analyze(&request.text) {
        Ok(analysis) => {
            debug!(
                dominant = analysis.dominant.label(),
                irony = analysis.irony.is_irony,
                "analyzed text"
            );
            EmotionResult {
                text: request.text.clone(),
                detected: analysis.scores.detected(DETECTION_THRESHOLD),
                dominant: Some(analysis.dominant),
                expression: Some(analysis.dominant.expression().to_owned()),
                outcome: Outcome::Ok,
                analyzed_at: Utc::now(),
            }
        }
        Err(e) => {
            warn!("emotion analysis failed: {e}");
            EmotionResult {
                text: request.text.clone(),
                detected: Vec::new(),
                dominant: None,
                expression: None,
                outcome: Outcome::Failed {
                    reason: e.to_string(),
                },
                analyzed_at: Utc::now(),
            }
        }
    }
}
