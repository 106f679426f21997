//! Emotion classification and the emotion → expression mapping.
//!
//! The label set is the 28-label GoEmotions taxonomy. Classification
//! itself is an external collaborator behind [`EmotionClassifier`]; the
//! crate ships a keyword heuristic as the default implementation, the
//! same way the energy-based VAD stands in for a trained model.

pub mod irony;
pub mod stage;

use crate::error::Result;

/// The fixed emotion label set (GoEmotions taxonomy).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum Emotion {
    Admiration,
    Amusement,
    Anger,
    Annoyance,
    Approval,
    Caring,
    Confusion,
    Curiosity,
    Desire,
    Disappointment,
    Disapproval,
    Disgust,
    Embarrassment,
    Excitement,
    Fear,
    Gratitude,
    Grief,
    Joy,
    Love,
    Nervousness,
    Optimism,
    Pride,
    Realization,
    Relief,
    Remorse,
    Sadness,
    Surprise,
    Neutral,
}

/// Expression id applied when no label maps to anything better.
pub const DEFAULT_EXPRESSION: &str = "idle";

impl Emotion {
    /// All labels, in taxonomy order. This order is the tie-break order
    /// for arg-max over score distributions.
    pub const ALL: [Emotion; 28] = [
        Emotion::Admiration,
        Emotion::Amusement,
        Emotion::Anger,
        Emotion::Annoyance,
        Emotion::Approval,
        Emotion::Caring,
        Emotion::Confusion,
        Emotion::Curiosity,
        Emotion::Desire,
        Emotion::Disappointment,
        Emotion::Disapproval,
        Emotion::Disgust,
        Emotion::Embarrassment,
        Emotion::Excitement,
        Emotion::Fear,
        Emotion::Gratitude,
        Emotion::Grief,
        Emotion::Joy,
        Emotion::Love,
        Emotion::Nervousness,
        Emotion::Optimism,
        Emotion::Pride,
        Emotion::Realization,
        Emotion::Relief,
        Emotion::Remorse,
        Emotion::Sadness,
        Emotion::Surprise,
        Emotion::Neutral,
    ];

    /// Canonical lowercase label.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Emotion::Admiration => "admiration",
            Emotion::Amusement => "amusement",
            Emotion::Anger => "anger",
            Emotion::Annoyance => "annoyance",
            Emotion::Approval => "approval",
            Emotion::Caring => "caring",
            Emotion::Confusion => "confusion",
            Emotion::Curiosity => "curiosity",
            Emotion::Desire => "desire",
            Emotion::Disappointment => "disappointment",
            Emotion::Disapproval => "disapproval",
            Emotion::Disgust => "disgust",
            Emotion::Embarrassment => "embarrassment",
            Emotion::Excitement => "excitement",
            Emotion::Fear => "fear",
            Emotion::Gratitude => "gratitude",
            Emotion::Grief => "grief",
            Emotion::Joy => "joy",
            Emotion::Love => "love",
            Emotion::Nervousness => "nervousness",
            Emotion::Optimism => "optimism",
            Emotion::Pride => "pride",
            Emotion::Realization => "realization",
            Emotion::Relief => "relief",
            Emotion::Remorse => "remorse",
            Emotion::Sadness => "sadness",
            Emotion::Surprise => "surprise",
            Emotion::Neutral => "neutral",
        }
    }

    /// Parse a label; unknown labels are `None` (callers fall back to
    /// [`Emotion::Neutral`] or the default expression).
    #[must_use]
    pub fn from_label(label: &str) -> Option<Emotion> {
        Emotion::ALL.iter().copied().find(|e| e.label() == label)
    }

    /// Expression id for this label.
    ///
    /// Every label has a guaranteed arm; several labels deliberately
    /// share an expression because the avatar models ship fewer
    /// expressions than the taxonomy has labels.
    #[must_use]
    pub fn expression(self) -> &'static str {
        match self {
            Emotion::Joy | Emotion::Neutral => DEFAULT_EXPRESSION,
            Emotion::Excitement | Emotion::Admiration | Emotion::Realization | Emotion::Surprise => {
                "wow"
            }
            Emotion::Approval | Emotion::Amusement => "laugh",
            Emotion::Gratitude | Emotion::Desire | Emotion::Caring | Emotion::Love => "love",
            Emotion::Relief => "pleased",
            Emotion::Sadness | Emotion::Grief => "very_sad",
            Emotion::Curiosity => "studious",
            Emotion::Optimism | Emotion::Pride => "idle_alt",
            Emotion::Anger | Emotion::Annoyance => "angry",
            Emotion::Confusion | Emotion::Disapproval | Emotion::Disgust | Emotion::Fear => "gloom",
            Emotion::Disappointment | Emotion::Remorse => "sad",
            Emotion::Embarrassment | Emotion::Nervousness => "blush",
        }
    }
}

/// A probability distribution over the label set.
#[derive(Debug, Clone, PartialEq)]
pub struct EmotionScores {
    scores: [f32; 28],
}

impl Default for EmotionScores {
    fn default() -> Self {
        Self { scores: [0.0; 28] }
    }
}

impl EmotionScores {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, emotion: Emotion) -> f32 {
        self.scores[emotion as usize]
    }

    pub fn set(&mut self, emotion: Emotion, score: f32) {
        self.scores[emotion as usize] = score;
    }

    /// Iterate `(label, score)` in taxonomy order.
    pub fn iter(&self) -> impl Iterator<Item = (Emotion, f32)> + '_ {
        Emotion::ALL.iter().map(move |&e| (e, self.get(e)))
    }

    /// Scale all scores so they sum to 1.0. A non-positive total leaves
    /// the distribution untouched.
    pub fn normalize(&mut self) {
        let total: f32 = self.scores.iter().sum();
        if total > 0.0 {
            for score in &mut self.scores {
                *score /= total;
            }
        }
    }

    /// Highest-scoring label. Stable: on ties the first label in
    /// taxonomy order wins.
    #[must_use]
    pub fn dominant(&self) -> Emotion {
        let mut best = Emotion::Admiration;
        let mut best_score = f32::NEG_INFINITY;
        for (emotion, score) in self.iter() {
            if score > best_score {
                best = emotion;
                best_score = score;
            }
        }
        best
    }

    /// Labels scoring at or above `threshold`, best first.
    #[must_use]
    pub fn detected(&self, threshold: f32) -> Vec<Emotion> {
        let mut hits: Vec<(Emotion, f32)> =
            self.iter().filter(|&(_, s)| s >= threshold).collect();
        hits.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        hits.into_iter().map(|(e, _)| e).collect()
    }
}

/// External emotion classifier contract: text in, distribution out.
pub trait EmotionClassifier: Send + Sync {
    /// Classify `text` into a score distribution over the label set.
    ///
    /// # Errors
    ///
    /// Returns an error when the underlying engine fails; the stage
    /// converts it into a failed result rather than propagating.
    fn classify(&self, text: &str) -> Result<EmotionScores>;
}

/// (emotion, keywords) heuristic table for the default classifier.
const KEYWORD_TABLE: &[(Emotion, &[&str])] = &[
    (
        Emotion::Joy,
        &["happy", "glad", "great day", "wonderful", "joy", "smile", "content"],
    ),
    (
        Emotion::Excitement,
        &["excited", "can't wait", "thrilled", "hyped", "amazing news"],
    ),
    (
        Emotion::Gratitude,
        &["thank", "grateful", "appreciate", "thanks"],
    ),
    (
        Emotion::Love,
        &["love", "adore", "dear", "sweetheart"],
    ),
    (
        Emotion::Sadness,
        &["sad", "unhappy", "cry", "miss", "lonely", "down"],
    ),
    (
        Emotion::Grief,
        &["grief", "passed away", "loss", "mourning", "funeral"],
    ),
    (
        Emotion::Anger,
        &["angry", "furious", "hate", "rage", "mad at"],
    ),
    (
        Emotion::Annoyance,
        &["annoying", "irritating", "ugh", "fed up", "so tired of"],
    ),
    (
        Emotion::Fear,
        &["afraid", "scared", "terrified", "worried", "anxious"],
    ),
    (
        Emotion::Curiosity,
        &["curious", "wonder", "how does", "why does", "what if", "tell me more"],
    ),
    (
        Emotion::Confusion,
        &["confused", "don't understand", "lost", "what do you mean"],
    ),
    (
        Emotion::Surprise,
        &["surprised", "no way", "can't believe", "what?!", "unexpected"],
    ),
    (
        Emotion::Disappointment,
        &["disappointed", "let down", "expected better", "shame"],
    ),
    (
        Emotion::Disgust,
        &["disgusting", "gross", "revolting", "yuck"],
    ),
    (
        Emotion::Embarrassment,
        &["embarrassed", "awkward", "ashamed", "cringe"],
    ),
    (
        Emotion::Optimism,
        &["hopeful", "it will work out", "looking forward", "bright side"],
    ),
    (
        Emotion::Pride,
        &["proud", "accomplished", "nailed it"],
    ),
    (
        Emotion::Relief,
        &["relieved", "phew", "finally over", "glad that's done"],
    ),
    (
        Emotion::Remorse,
        &["sorry", "regret", "my fault", "apologize"],
    ),
    (
        Emotion::Admiration,
        &["impressive", "admire", "brilliant", "respect"],
    ),
    (
        Emotion::Amusement,
        &["haha", "funny", "lol", "hilarious", "joke"],
    ),
    (
        Emotion::Caring,
        &["take care", "here for you", "hope you feel", "thinking of you"],
    ),
    (
        Emotion::Approval,
        &["agree", "good idea", "exactly", "well said"],
    ),
    (
        Emotion::Disapproval,
        &["disagree", "bad idea", "shouldn't", "wrong to"],
    ),
    (
        Emotion::Desire,
        &["wish", "want so", "dream of", "crave"],
    ),
    (
        Emotion::Nervousness,
        &["nervous", "on edge", "jittery", "butterflies"],
    ),
    (
        Emotion::Realization,
        &["i see now", "makes sense now", "just realized", "oh, right"],
    ),
];

/// Baseline weight so the distribution is never all-zero and empty or
/// keyword-free text classifies as neutral.
const NEUTRAL_BASELINE: f32 = 1.0;

/// Keyword-heuristic classifier used when no external model is wired in.
#[derive(Debug, Clone, Default)]
pub struct KeywordEmotionClassifier;

impl EmotionClassifier for KeywordEmotionClassifier {
    fn classify(&self, text: &str) -> Result<EmotionScores> {
        let lower = text.to_lowercase();
        let mut scores = EmotionScores::new();
        scores.set(Emotion::Neutral, NEUTRAL_BASELINE);

        for &(emotion, keywords) in KEYWORD_TABLE {
            let hits = keywords.iter().filter(|kw| lower.contains(*kw)).count();
            if hits > 0 {
                // Two keyword hits dominate the neutral baseline.
                scores.set(emotion, hits as f32 * 1.5);
            }
        }

        scores.normalize();
        Ok(scores)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn label_round_trip() {
        for &emotion in &Emotion::ALL {
            assert_eq!(Emotion::from_label(emotion.label()), Some(emotion));
        }
    }

    #[test]
    fn unknown_label_is_none() {
        assert_eq!(Emotion::from_label("rage"), None);
        assert_eq!(Emotion::from_label(""), None);
    }

    #[test]
    fn every_label_has_an_expression() {
        for &emotion in &Emotion::ALL {
            assert!(!emotion.expression().is_empty());
        }
        assert_eq!(Emotion::Neutral.expression(), DEFAULT_EXPRESSION);
    }

    #[test]
    fn dominant_is_stable_on_ties() {
        let mut scores = EmotionScores::new();
        scores.set(Emotion::Anger, 0.4);
        scores.set(Emotion::Sadness, 0.4);
        // Anger comes first in taxonomy order
        assert_eq!(scores.dominant(), Emotion::Anger);
    }

    #[test]
    fn normalize_sums_to_one() {
        let mut scores = EmotionScores::new();
        scores.set(Emotion::Joy, 3.0);
        scores.set(Emotion::Sadness, 1.0);
        scores.normalize();
        let total: f32 = scores.iter().map(|(_, s)| s).sum();
        assert!((total - 1.0).abs() < 1e-6);
        assert!((scores.get(Emotion::Joy) - 0.75).abs() < 1e-6);
    }

    #[test]
    fn normalize_leaves_zero_distribution_alone() {
        let mut scores = EmotionScores::new();
        scores.normalize();
        assert_eq!(scores.get(Emotion::Neutral), 0.0);
    }

    #[test]
    fn keyword_classifier_finds_sadness() {
        let classifier = KeywordEmotionClassifier;
        let scores = classifier.classify("I feel so sad and lonely today").unwrap();
        assert_eq!(scores.dominant(), Emotion::Sadness);
    }

    #[test]
    fn keyword_classifier_defaults_to_neutral() {
        let classifier = KeywordEmotionClassifier;
        let scores = classifier.classify("the train departs at seven").unwrap();
        assert_eq!(scores.dominant(), Emotion::Neutral);
    }

    #[test]
    fn detected_is_sorted_best_first() {
        let mut scores = EmotionScores::new();
        scores.set(Emotion::Joy, 0.6);
        scores.set(Emotion::Surprise, 0.9);
        scores.set(Emotion::Fear, 0.1);
        let detected = scores.detected(0.5);
        assert_eq!(detected, vec![Emotion::Surprise, Emotion::Joy]);
    }
}
