//! Irony detection and the polarity-flip adjustment.
//!
//! Two independent detectors score the text; their scores are combined
//! under a configurable mode. When the combined score clears the
//! threshold, every emotion weight is multiplied by a fixed polarity
//! table and the distribution is renormalized before the arg-max.

use crate::emotion::{Emotion, EmotionClassifier, EmotionScores};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// How the two irony detector scores are combined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IronyMode {
    /// Both detectors must clear the threshold; score is the minimum.
    #[default]
    Strict,
    /// Average of the two scores clears the threshold.
    Mean,
    /// Either detector clears the threshold; score is the maximum.
    Union,
}

/// External irony/sarcasm detector contract.
pub trait IronyDetector: Send + Sync {
    /// Score in `0.0..=1.0`; higher means more likely ironic.
    ///
    /// # Errors
    ///
    /// Returns an error when the underlying engine fails.
    fn irony_score(&self, text: &str) -> Result<f32>;
}

/// Surface markers that frequently accompany sarcasm.
const SARCASM_MARKERS: &[&str] = &[
    "oh",
    "yeah",
    "sure",
    "great",
    "wonderful",
    "perfect",
    "amazing",
    "brilliant",
    "fantastic",
    "...",
    "really",
    "totally",
    "absolutely",
    "of course",
    "obviously",
];

/// Whether the text carries any sarcasm surface marker.
#[must_use]
pub fn has_sarcasm_marker(text: &str) -> bool {
    let lower = text.to_lowercase();
    SARCASM_MARKERS.iter().any(|m| lower.contains(m))
}

/// Marker-density heuristic standing in for a trained irony model.
#[derive(Debug, Clone, Default)]
pub struct MarkerIronyDetector;

impl IronyDetector for MarkerIronyDetector {
    fn irony_score(&self, text: &str) -> Result<f32> {
        let lower = text.to_lowercase();
        let hits = SARCASM_MARKERS.iter().filter(|m| lower.contains(*m)).count();
        // 1 marker -> 0.3, 2 -> 0.6, 3+ -> capped at 0.9
        Ok((hits as f32 * 0.3).min(0.9))
    }
}

/// Polarity multiplier applied to each emotion weight when the text is
/// ironic. Negative values flip the emotion's contribution; values above
/// 1.0 amplify emotions that irony tends to mask.
#[must_use]
pub fn polarity_weight(emotion: Emotion) -> f32 {
    match emotion {
        Emotion::Joy => -0.7,
        Emotion::Excitement => -0.5,
        Emotion::Approval => -0.8,
        Emotion::Gratitude => -0.9,
        Emotion::Admiration => -0.8,
        Emotion::Realization => 1.2,
        Emotion::Relief => -0.6,
        Emotion::Desire => 0.3,
        Emotion::Sadness => 1.5,
        Emotion::Curiosity => 0.8,
        Emotion::Optimism => -0.9,
        Emotion::Neutral => 1.0,
        Emotion::Amusement => 1.3,
        Emotion::Anger => 1.4,
        Emotion::Annoyance => 1.5,
        Emotion::Caring => -0.7,
        Emotion::Confusion => 0.9,
        Emotion::Disappointment => 1.6,
        Emotion::Disapproval => 1.4,
        Emotion::Disgust => 1.3,
        Emotion::Embarrassment => 0.7,
        Emotion::Fear => 0.8,
        Emotion::Grief => 0.5,
        Emotion::Love => -0.8,
        Emotion::Nervousness => 0.9,
        Emotion::Pride => -0.6,
        Emotion::Remorse => 0.4,
        Emotion::Surprise => 1.1,
    }
}

/// Multiply each weight by the polarity table and renormalize.
///
/// Weights driven negative are clamped to zero before renormalization; a
/// non-positive total leaves the input distribution unchanged.
#[must_use]
pub fn apply_polarity_flip(scores: &EmotionScores) -> EmotionScores {
    let mut adjusted = EmotionScores::new();
    for (emotion, score) in scores.iter() {
        adjusted.set(emotion, (score * polarity_weight(emotion)).max(0.0));
    }
    let total: f32 = adjusted.iter().map(|(_, s)| s).sum();
    if total > 0.0 {
        adjusted.normalize();
        adjusted
    } else {
        scores.clone()
    }
}

/// Combined verdict from the two detectors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IronyVerdict {
    pub is_irony: bool,
    pub score: f32,
}

/// Combine two detector scores under `mode` against `threshold`.
#[must_use]
pub fn combine(mode: IronyMode, score_1: f32, score_2: f32, threshold: f32) -> IronyVerdict {
    match mode {
        IronyMode::Strict => IronyVerdict {
            is_irony: score_1 > threshold && score_2 > threshold,
            score: score_1.min(score_2),
        },
        IronyMode::Mean => {
            let score = (score_1 + score_2) / 2.0;
            IronyVerdict {
                is_irony: score > threshold,
                score,
            }
        }
        IronyMode::Union => IronyVerdict {
            is_irony: score_1 > threshold || score_2 > threshold,
            score: score_1.max(score_2),
        },
    }
}

/// Damping factor for short, joyful, marker-free text.
///
/// Genuinely happy one-liners are the most common false positive for
/// irony detectors, so their scores are scaled down before combining.
const SINCERE_JOY_DAMPING: f32 = 0.3;

fn damp_for_sincere_joy(text: &str, scores: &EmotionScores, s1: f32, s2: f32) -> (f32, f32) {
    let high_joy = scores.get(Emotion::Joy) > 0.7;
    let short_text = text.split_whitespace().count() < 12;
    if high_joy && short_text && !has_sarcasm_marker(text) {
        (s1 * SINCERE_JOY_DAMPING, s2 * SINCERE_JOY_DAMPING)
    } else {
        (s1, s2)
    }
}

/// Full analysis of one text: distribution, irony verdict, dominant label.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub scores: EmotionScores,
    pub irony: IronyVerdict,
    pub dominant: Emotion,
}

/// Emotion analyzer combining a classifier with two irony detectors.
pub struct EmotionAnalyzer {
    classifier: Box<dyn EmotionClassifier>,
    detector_1: Box<dyn IronyDetector>,
    detector_2: Box<dyn IronyDetector>,
    mode: IronyMode,
    threshold: f32,
}

impl EmotionAnalyzer {
    #[must_use]
    pub fn new(
        classifier: Box<dyn EmotionClassifier>,
        detector_1: Box<dyn IronyDetector>,
        detector_2: Box<dyn IronyDetector>,
        mode: IronyMode,
        threshold: f32,
    ) -> Self {
        Self {
            classifier,
            detector_1,
            detector_2,
            mode,
            threshold,
        }
    }

    /// Analyzer with the built-in heuristic collaborators.
    #[must_use]
    pub fn heuristic(mode: IronyMode, threshold: f32) -> Self {
        Self::new(
            Box::new(crate::emotion::KeywordEmotionClassifier),
            Box::new(MarkerIronyDetector),
            Box::new(MarkerIronyDetector),
            mode,
            threshold,
        )
    }

    /// Analyze one text: classify, score irony, flip polarity if ironic,
    /// take the stable arg-max.
    ///
    /// # Errors
    ///
    /// Returns an error when the classifier or a detector fails.
    pub fn analyze(&self, text: &str) -> Result<Analysis> {
        let scores = self.classifier.classify(text)?;
        let s1 = self.detector_1.irony_score(text)?;
        let s2 = self.detector_2.irony_score(text)?;
        let (s1, s2) = damp_for_sincere_joy(text, &scores, s1, s2);

        let irony = combine(self.mode, s1, s2, self.threshold);
        let scores = if irony.is_irony {
            debug!(score = irony.score, "irony detected, flipping polarity");
            apply_polarity_flip(&scores)
        } else {
            scores
        };

        let dominant = scores.dominant();
        Ok(Analysis {
            scores,
            irony,
            dominant,
        })
    }

    /// Expression id for the dominant emotion of `text`.
    ///
    /// # Errors
    ///
    /// Returns an error when analysis fails.
    pub fn expression_for(&self, text: &str) -> Result<String> {
        Ok(self.analyze(text)?.dominant.expression().to_owned())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    struct FixedScores(EmotionScores);

    impl EmotionClassifier for FixedScores {
        fn classify(&self, _text: &str) -> Result<EmotionScores> {
            Ok(self.0.clone())
        }
    }

    struct FixedIrony(f32);

    impl IronyDetector for FixedIrony {
        fn irony_score(&self, _text: &str) -> Result<f32> {
            Ok(self.0)
        }
    }

    fn joy_sadness_scores() -> EmotionScores {
        let mut scores = EmotionScores::new();
        scores.set(Emotion::Joy, 0.9);
        scores.set(Emotion::Sadness, 0.1);
        scores
    }

    #[test]
    fn polarity_flip_changes_argmax() {
        // joy has a negative polarity weight, sadness a positive one:
        // above the irony threshold the arg-max must change.
        let scores = joy_sadness_scores();
        assert_eq!(scores.dominant(), Emotion::Joy);
        let adjusted = apply_polarity_flip(&scores);
        assert_ne!(adjusted.dominant(), Emotion::Joy);
        assert_eq!(adjusted.dominant(), Emotion::Sadness);
    }

    #[test]
    fn flipped_distribution_is_renormalized() {
        let adjusted = apply_polarity_flip(&joy_sadness_scores());
        let total: f32 = adjusted.iter().map(|(_, s)| s).sum();
        assert!((total - 1.0).abs() < 1e-6);
    }

    #[test]
    fn all_negative_distribution_is_left_unchanged() {
        let mut scores = EmotionScores::new();
        scores.set(Emotion::Joy, 1.0);
        // joy * -0.7 clamps to zero, total is zero: keep the original
        let adjusted = apply_polarity_flip(&scores);
        assert_eq!(adjusted, scores);
    }

    #[test]
    fn strict_mode_needs_both_detectors() {
        assert!(!combine(IronyMode::Strict, 0.9, 0.2, 0.5).is_irony);
        let verdict = combine(IronyMode::Strict, 0.9, 0.7, 0.5);
        assert!(verdict.is_irony);
        assert!((verdict.score - 0.7).abs() < 1e-6);
    }

    #[test]
    fn union_mode_needs_either_detector() {
        let verdict = combine(IronyMode::Union, 0.9, 0.2, 0.5);
        assert!(verdict.is_irony);
        assert!((verdict.score - 0.9).abs() < 1e-6);
    }

    #[test]
    fn mean_mode_averages() {
        let verdict = combine(IronyMode::Mean, 0.8, 0.4, 0.5);
        assert!(verdict.is_irony);
        assert!((verdict.score - 0.6).abs() < 1e-6);
    }

    #[test]
    fn analyzer_flips_under_irony() {
        let analyzer = EmotionAnalyzer::new(
            Box::new(FixedScores(joy_sadness_scores())),
            Box::new(FixedIrony(0.9)),
            Box::new(FixedIrony(0.9)),
            IronyMode::Strict,
            0.5,
        );
        // marker-free long-enough pretext is irrelevant: fixed detectors
        let analysis = analyzer
            .analyze("what a wonderfully productive meeting that was at three in the morning")
            .unwrap();
        assert!(analysis.irony.is_irony);
        assert_eq!(analysis.dominant, Emotion::Sadness);
    }

    #[test]
    fn analyzer_keeps_sincere_joy() {
        let analyzer = EmotionAnalyzer::new(
            Box::new(FixedScores(joy_sadness_scores())),
            Box::new(FixedIrony(0.6)),
            Box::new(FixedIrony(0.6)),
            IronyMode::Strict,
            0.5,
        );
        // short, joyful, marker-free: scores are damped below threshold
        let analysis = analyzer.analyze("I am so happy today").unwrap();
        assert!(!analysis.irony.is_irony);
        assert_eq!(analysis.dominant, Emotion::Joy);
    }

    #[test]
    fn marker_detector_scores_scale_with_hits() {
        let detector = MarkerIronyDetector;
        let none = detector.irony_score("plain statement").unwrap();
        let some = detector.irony_score("oh sure, totally wonderful").unwrap();
        assert_eq!(none, 0.0);
        assert!(some > 0.5);
        assert!(some <= 0.9);
    }
}
