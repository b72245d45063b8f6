use crate::classify::lexical::tokenize;
use crate::classify::ClassificationAdapter;
use crate::progress::{ProgressReporter, SilentReporter};
use crate::scanner::FileRecord;
use ahash::AHashSet;
use dashmap::DashMap;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use tracing::{debug, info};

/// Report progress every this many scored pairs.
const PROGRESS_INTERVAL: usize = 64;

/// A text-bearing file and the bounded prefix read from it.
#[derive(Debug, Clone)]
pub struct TextDocument {
    pub record: FileRecord,
    pub text: String,
}

/// Similarity of a canonicalized pair (`left` sorts before `right`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityResult {
    pub left: PathBuf,
    pub right: PathBuf,
    pub overall_similarity: f64,
    pub component_scores: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimilarPair {
    pub a: FileRecord,
    pub b: FileRecord,
    pub result: SimilarityResult,
}

/// Pairwise scorer with a symmetric cache keyed on the canonical pair.
pub struct SimilarityEngine {
    adapter: ClassificationAdapter,
    cache: DashMap<(PathBuf, PathBuf), f64>,
}

impl SimilarityEngine {
    pub fn new(adapter: ClassificationAdapter) -> Self {
        Self {
            adapter,
            cache: DashMap::new(),
        }
    }

    pub fn cached_pairs(&self) -> usize {
        self.cache.len()
    }

    fn content_score(&self, left: &TextDocument, right: &TextDocument) -> f64 {
        let key = (left.record.path.clone(), right.record.path.clone());
        if let Some(score) = self.cache.get(&key) {
            return *score;
        }
        let score = self.adapter.similarity(&left.text, &right.text);
        self.cache.insert(key, score);
        score
    }

    /// Score one pair. Argument order does not matter.
    pub fn compare(&self, a: &TextDocument, b: &TextDocument) -> SimilarityResult {
        let (left, right) = if a.record.path <= b.record.path {
            (a, b)
        } else {
            (b, a)
        };

        let content = self.content_score(left, right);
        let mut component_scores = BTreeMap::new();
        component_scores.insert("content".to_string(), content);
        component_scores.insert(
            "name".to_string(),
            name_similarity(left.record.stem(), right.record.stem()),
        );

        SimilarityResult {
            left: left.record.path.clone(),
            right: right.record.path.clone(),
            overall_similarity: content,
            component_scores,
        }
    }

    /// Every unordered pair of `documents` whose overall similarity is at or
    /// above `threshold`, ordered by the pair's paths.
    ///
    /// Quadratic in the number of documents; callers pre-filter.
    pub fn pairwise(
        &self,
        documents: &[TextDocument],
        threshold: f64,
        reporter: &dyn ProgressReporter,
    ) -> Vec<SimilarPair> {
        let pairs: Vec<(usize, usize)> = (0..documents.len())
            .flat_map(|i| ((i + 1)..documents.len()).map(move |j| (i, j)))
            .collect();
        let total = pairs.len();
        info!(
            "Scoring {} pairs across {} documents (threshold={:.2})",
            total,
            documents.len(),
            threshold
        );

        reporter.on_similarity_start(total);
        let start = Instant::now();
        let done = AtomicUsize::new(0);

        let mut matches: Vec<SimilarPair> = pairs
            .par_iter()
            .filter_map(|&(i, j)| {
                let result = self.compare(&documents[i], &documents[j]);

                let n = done.fetch_add(1, Ordering::Relaxed) + 1;
                if n % PROGRESS_INTERVAL == 0 || n == total {
                    reporter.on_similarity_progress(n, total);
                }

                if result.overall_similarity < threshold {
                    return None;
                }
                let (a, b) = if documents[i].record.path == result.left {
                    (&documents[i], &documents[j])
                } else {
                    (&documents[j], &documents[i])
                };
                Some(SimilarPair {
                    a: a.record.clone(),
                    b: b.record.clone(),
                    result,
                })
            })
            .collect();

        matches.sort_by(|x, y| (&x.a.path, &x.b.path).cmp(&(&y.a.path, &y.b.path)));

        debug!(
            "{} of {} pairs at or above {:.2}",
            matches.len(),
            total,
            threshold
        );
        reporter.on_similarity_complete(matches.len(), start.elapsed().as_secs_f64());
        matches
    }
}

/// Convenience wrapper around [`SimilarityEngine::pairwise`] with a fresh cache.
pub fn pairwise_similarity(
    adapter: &ClassificationAdapter,
    documents: &[TextDocument],
    threshold: f64,
) -> Vec<SimilarPair> {
    SimilarityEngine::new(adapter.clone()).pairwise(documents, threshold, &SilentReporter)
}

/// Jaccard index of the word sets of two file stems.
pub fn name_similarity(stem_a: &str, stem_b: &str) -> f64 {
    let a: AHashSet<String> = tokenize(stem_a).into_iter().collect();
    let b: AHashSet<String> = tokenize(stem_b).into_iter().collect();
    let union = a.union(&b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(&b).count() as f64 / union as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_similarity() {
        assert_eq!(name_similarity("report", "report_draft"), 0.5);
        assert_eq!(name_similarity("report", "report"), 1.0);
        assert_eq!(name_similarity("a", "b"), 0.0);
    }
}
