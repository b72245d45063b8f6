//! Stable interface over the content-classification and similarity services.
//!
//! The services themselves sit behind [`ZeroShotClassifier`] and
//! [`SemanticScorer`]; the adapter owns the weighting, thresholding and input
//! truncation so every backend behaves the same from the caller's side.

pub mod lexical;

use crate::config::{AppConfig, ClassificationWeights};
use crate::error::ClassificationError;
use crate::scanner::text::truncate_chars;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

pub use lexical::LexicalBackend;

/// Multi-label zero-shot classification: scores every candidate label
/// independently in [0, 1].
pub trait ZeroShotClassifier: Send + Sync {
    fn classify(
        &self,
        text: &str,
        labels: &[String],
    ) -> Result<Vec<(String, f64)>, ClassificationError>;
}

/// Semantic/lexical similarity service.
pub trait SemanticScorer: Send + Sync {
    /// Similarity between a document and a category label.
    fn label_score(&self, text: &str, label: &str) -> Result<f64, ClassificationError>;

    /// Similarity between two documents.
    fn text_similarity(&self, text_a: &str, text_b: &str) -> Result<f64, ClassificationError>;
}

/// Category name to confidence, only for categories at or above the threshold.
/// Entries keep the order of the category set they were scored against.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassificationResult {
    scores: Vec<(String, f64)>,
}

impl ClassificationResult {
    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn get(&self, category: &str) -> Option<f64> {
        self.scores
            .iter()
            .find(|(name, _)| name == category)
            .map(|(_, score)| *score)
    }

    pub fn contains(&self, category: &str) -> bool {
        self.get(category).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.scores.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Highest scoring category; ties go to the earlier category.
    pub fn top(&self) -> Option<(&str, f64)> {
        let mut best: Option<(&str, f64)> = None;
        for (name, score) in self.iter() {
            if best.map_or(true, |(_, best_score)| score > best_score) {
                best = Some((name, score));
            }
        }
        best
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassifierConfig {
    pub weights: ClassificationWeights,
    pub threshold: f64,
    pub max_text_chars: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            weights: ClassificationWeights::default(),
            threshold: crate::config::DEFAULT_CONFIDENCE_THRESHOLD,
            max_text_chars: crate::config::DEFAULT_MAX_TEXT_CHARS,
        }
    }
}

impl From<&AppConfig> for ClassifierConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            weights: config.classification_weights,
            threshold: config.confidence_threshold,
            max_text_chars: config.max_text_chars,
        }
    }
}

#[derive(Clone)]
pub struct ClassificationAdapter {
    zero_shot: Arc<dyn ZeroShotClassifier>,
    semantic: Arc<dyn SemanticScorer>,
    config: ClassifierConfig,
}

impl ClassificationAdapter {
    pub fn new(
        zero_shot: Arc<dyn ZeroShotClassifier>,
        semantic: Arc<dyn SemanticScorer>,
        config: ClassifierConfig,
    ) -> Self {
        Self {
            zero_shot,
            semantic,
            config,
        }
    }

    /// Adapter backed by the built-in lexical backend for both services.
    pub fn lexical(config: ClassifierConfig) -> Self {
        let backend = Arc::new(LexicalBackend::new());
        Self::new(backend.clone(), backend, config)
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    fn bounded<'a>(&self, text: &'a str) -> &'a str {
        truncate_chars(text, self.config.max_text_chars)
    }

    /// Score `text` against `categories` and keep those whose weighted score is
    /// at or above `threshold`.
    pub fn try_classify_purpose(
        &self,
        text: &str,
        categories: &[String],
        threshold: f64,
    ) -> Result<ClassificationResult, ClassificationError> {
        let text = self.bounded(text);
        if text.trim().is_empty() || categories.is_empty() {
            return Ok(ClassificationResult::default());
        }

        let zero_shot: BTreeMap<String, f64> = self
            .zero_shot
            .classify(text, categories)?
            .into_iter()
            .collect();

        let mut scores: Vec<(String, f64)> = Vec::new();
        for category in categories {
            let zero_shot_score =
                checked_score("zero-shot", zero_shot.get(category).copied().unwrap_or(0.0))?;
            let semantic_score =
                checked_score("semantic", self.semantic.label_score(text, category)?)?;
            let score = self.config.weights.combine(zero_shot_score, semantic_score);

            if score >= threshold && !scores.iter().any(|(name, _)| name == category) {
                scores.push((category.clone(), score));
            }
        }

        debug!("Classified text into {} categories", scores.len());
        Ok(ClassificationResult { scores })
    }

    /// Like [`Self::try_classify_purpose`], but a service failure is logged and
    /// yields an empty result.
    pub fn classify_purpose(
        &self,
        text: &str,
        categories: &[String],
        threshold: f64,
    ) -> ClassificationResult {
        match self.try_classify_purpose(text, categories, threshold) {
            Ok(result) => result,
            Err(e) => {
                warn!("Classification failed, treating as unclassified: {}", e);
                ClassificationResult::default()
            }
        }
    }

    pub fn try_similarity(&self, text_a: &str, text_b: &str) -> Result<f64, ClassificationError> {
        let score = self
            .semantic
            .text_similarity(self.bounded(text_a), self.bounded(text_b))?;
        checked_score("similarity", score)
    }

    /// Like [`Self::try_similarity`], but a service failure is logged and
    /// yields `0.0`.
    pub fn similarity(&self, text_a: &str, text_b: &str) -> f64 {
        match self.try_similarity(text_a, text_b) {
            Ok(score) => score,
            Err(e) => {
                warn!("Similarity failed, scoring as 0: {}", e);
                0.0
            }
        }
    }
}

impl Serialize for ClassificationResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.iter())
    }
}

fn checked_score(service: &'static str, score: f64) -> Result<f64, ClassificationError> {
    if score.is_nan() {
        return Err(ClassificationError::new(service, "returned NaN"));
    }
    Ok(score.clamp(0.0, 1.0))
}
