//! Toxicity screening applied before any text enters the pipeline.
//!
//! Scoring is an external collaborator behind [`ToxicityClassifier`];
//! the built-in lexicon implementation stands in for a trained model
//! the same way the keyword classifier does for emotions.

use crate::error::Result;
use tracing::debug;

/// Per-category toxicity scores in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ToxicityScores {
    /// Aggregate score; always at least the maximum of the categories.
    pub toxicity: f32,
    pub severe_toxicity: f32,
    pub obscene: f32,
    pub threat: f32,
    pub insult: f32,
    pub identity_attack: f32,
}

impl ToxicityScores {
    /// Highest score across all categories.
    #[must_use]
    pub fn max_score(&self) -> f32 {
        self.toxicity
            .max(self.severe_toxicity)
            .max(self.obscene)
            .max(self.threat)
            .max(self.insult)
            .max(self.identity_attack)
    }

    /// Name of the highest-scoring category, for logging.
    #[must_use]
    pub fn worst_category(&self) -> &'static str {
        let pairs = [
            ("severe_toxicity", self.severe_toxicity),
            ("threat", self.threat),
            ("identity_attack", self.identity_attack),
            ("insult", self.insult),
            ("obscene", self.obscene),
            ("toxicity", self.toxicity),
        ];
        pairs
            .iter()
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map_or("toxicity", |&(name, _)| name)
    }
}

/// External toxicity classifier contract.
pub trait ToxicityClassifier: Send + Sync {
    /// Score `text` across the toxicity categories.
    ///
    /// # Errors
    ///
    /// Returns an error when the underlying engine fails. Callers treat
    /// a failed screening as toxic and refuse the text.
    fn score(&self, text: &str) -> Result<ToxicityScores>;
}

const INSULT_TERMS: &[&str] = &[
    "stupid",
    "idiot",
    "worthless",
    "moron",
    "pathetic",
    "loser",
    "dumb",
    "imbecile",
];

const THREAT_TERMS: &[&str] = &[
    "kill you",
    "hurt you",
    "destroy you",
    "i will find you",
    "watch your back",
];

const OBSCENE_TERMS: &[&str] = &["damn", "hell no", "crap", "screw you"];

const IDENTITY_TERMS: &[&str] = &["your kind", "people like you are all", "go back to"];

fn term_score(lower: &str, terms: &[&str], per_hit: f32) -> f32 {
    let hits = terms.iter().filter(|t| lower.contains(*t)).count();
    (hits as f32 * per_hit).min(1.0)
}

/// Term-list classifier used when no external model is wired in.
#[derive(Debug, Clone, Default)]
pub struct LexiconToxicity;

impl ToxicityClassifier for LexiconToxicity {
    fn score(&self, text: &str) -> Result<ToxicityScores> {
        let lower = text.to_lowercase();
        let insult = term_score(&lower, INSULT_TERMS, 0.4);
        let threat = term_score(&lower, THREAT_TERMS, 0.7);
        let obscene = term_score(&lower, OBSCENE_TERMS, 0.3);
        let identity_attack = term_score(&lower, IDENTITY_TERMS, 0.7);
        let severe_toxicity = if threat >= 0.7 && insult > 0.0 { threat } else { 0.0 };
        let toxicity = insult
            .max(threat)
            .max(obscene)
            .max(identity_attack)
            .max(severe_toxicity);
        Ok(ToxicityScores {
            toxicity,
            severe_toxicity,
            obscene,
            threat,
            insult,
            identity_attack,
        })
    }
}

/// Threshold gate over a classifier.
pub struct ToxicityFilter {
    classifier: Box<dyn ToxicityClassifier>,
    threshold: f32,
}

impl ToxicityFilter {
    #[must_use]
    pub fn new(classifier: Box<dyn ToxicityClassifier>, threshold: f32) -> Self {
        Self {
            classifier,
            threshold,
        }
    }

    /// Filter with the built-in lexicon classifier.
    #[must_use]
    pub fn lexicon(threshold: f32) -> Self {
        Self::new(Box::new(LexiconToxicity), threshold)
    }

    /// Whether `text` must be refused.
    ///
    /// A classifier failure counts as toxic: text that cannot be
    /// screened never enters the pipeline.
    #[must_use]
    pub fn is_toxic(&self, text: &str) -> bool {
        match self.classifier.score(text) {
            Ok(scores) => {
                let toxic = scores.max_score() >= self.threshold;
                if toxic {
                    debug!(
                        category = scores.worst_category(),
                        score = scores.max_score(),
                        "text refused as toxic"
                    );
                }
                toxic
            }
            Err(e) => {
                debug!("toxicity screening failed, refusing text: {e}");
                true
            }
        }
    }
}
