use super::{SemanticScorer, ZeroShotClassifier};
use crate::error::ClassificationError;
use ahash::{AHashMap, AHashSet};

const STOP_WORDS: &[&str] = &[
    "a", "about", "an", "and", "are", "as", "at", "be", "but", "by", "can", "could", "for",
    "from", "had", "has", "have", "if", "in", "into", "is", "it", "its", "my", "not", "of",
    "on", "or", "our", "so", "than", "that", "the", "then", "these", "this", "those", "to",
    "was", "we", "will", "with", "would", "you", "your",
];

/// Seed vocabulary for the default purpose categories. Labels without seeds
/// are matched on their own words only.
const CATEGORY_SEEDS: &[(&str, &[&str])] = &[
    (
        "work",
        &[
            "work", "job", "office", "meeting", "report", "project", "client", "deadline",
            "manager", "management", "business", "colleague", "team", "proposal", "strategy",
        ],
    ),
    (
        "leisure",
        &[
            "leisure", "hobby", "game", "games", "movie", "music", "travel", "vacation",
            "holiday", "sport", "fun", "recipe", "recipes", "cooking",
        ],
    ),
    (
        "personal projects",
        &["personal", "project", "side", "diy", "build", "prototype", "idea", "hobby"],
    ),
    (
        "private",
        &["private", "password", "confidential", "secret", "diary", "journal"],
    ),
    (
        "family",
        &[
            "family", "kids", "children", "parents", "mom", "dad", "wedding", "birthday", "home",
        ],
    ),
    (
        "education",
        &[
            "education", "school", "university", "course", "lecture", "study", "homework",
            "exam", "research", "academic", "thesis",
        ],
    ),
    (
        "finance",
        &[
            "finance", "financial", "budget", "budgeting", "invoice", "tax", "taxes", "bank",
            "expense", "salary", "payment", "investment",
        ],
    ),
    (
        "health",
        &[
            "health", "medical", "doctor", "fitness", "diet", "exercise", "hospital",
            "medication", "wellness",
        ],
    ),
];

/// Lowercased alphanumeric tokens, stop words and single characters removed.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() > 1)
        .map(|t| t.to_lowercase())
        .filter(|t| !STOP_WORDS.contains(&t.as_str()))
        .collect()
}

pub fn term_counts(text: &str) -> AHashMap<String, u32> {
    let mut counts = AHashMap::new();
    for token in tokenize(text) {
        *counts.entry(token).or_insert(0) += 1;
    }
    counts
}

/// Cosine similarity of two term-frequency vectors.
pub fn cosine(a: &AHashMap<String, u32>, b: &AHashMap<String, u32>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    let dot: f64 = small
        .iter()
        .filter_map(|(term, &x)| large.get(term).map(|&y| x as f64 * y as f64))
        .sum();
    dot / (norm(a) * norm(b))
}

fn norm(v: &AHashMap<String, u32>) -> f64 {
    v.values().map(|&x| (x as f64).powi(2)).sum::<f64>().sqrt()
}

/// Built-in, model-free backend for both service traits.
///
/// Zero-shot: each label scores `hits / (hits + 1)` where `hits` is the number
/// of distinct label keywords present in the text. Semantic: term-frequency
/// cosine similarity.
#[derive(Debug, Default)]
pub struct LexicalBackend;

impl LexicalBackend {
    pub fn new() -> Self {
        Self
    }

    fn keywords(label: &str) -> AHashSet<String> {
        let mut keywords: AHashSet<String> = tokenize(label).into_iter().collect();
        let key = label.to_lowercase();
        if let Some((_, seeds)) = CATEGORY_SEEDS.iter().find(|(name, _)| *name == key) {
            keywords.extend(seeds.iter().map(|s| s.to_string()));
        }
        keywords
    }
}

impl ZeroShotClassifier for LexicalBackend {
    fn classify(
        &self,
        text: &str,
        labels: &[String],
    ) -> Result<Vec<(String, f64)>, ClassificationError> {
        let counts = term_counts(text);
        Ok(labels
            .iter()
            .map(|label| {
                let hits = Self::keywords(label)
                    .iter()
                    .filter(|k| counts.contains_key(k.as_str()))
                    .count() as f64;
                (label.clone(), hits / (hits + 1.0))
            })
            .collect())
    }
}

impl SemanticScorer for LexicalBackend {
    fn label_score(&self, text: &str, label: &str) -> Result<f64, ClassificationError> {
        let label_vector: AHashMap<String, u32> =
            Self::keywords(label).into_iter().map(|k| (k, 1)).collect();
        Ok(cosine(&term_counts(text), &label_vector))
    }

    fn text_similarity(&self, text_a: &str, text_b: &str) -> Result<f64, ClassificationError> {
        Ok(cosine(&term_counts(text_a), &term_counts(text_b)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_drops_stop_words() {
        assert_eq!(
            tokenize("This is a Work-Report about Q3!"),
            vec!["work", "report", "q3"]
        );
    }

    #[test]
    fn test_text_similarity_bounds() {
        let backend = LexicalBackend::new();
        let same = backend
            .text_similarity("project management report", "project management report")
            .unwrap();
        assert!((same - 1.0).abs() < 1e-12);
        assert_eq!(
            backend
                .text_similarity("project management", "cooking recipes")
                .unwrap(),
            0.0
        );
        assert_eq!(backend.text_similarity("", "anything").unwrap(), 0.0);
    }

    #[test]
    fn test_multi_label_classification() {
        let backend = LexicalBackend::new();
        let labels = vec![
            "Work".to_string(),
            "Finance".to_string(),
            "Education".to_string(),
            "Health".to_string(),
        ];
        let scores: AHashMap<String, f64> = backend
            .classify(
                "Work tasks for a personal finance project: academic research and family budgeting",
                &labels,
            )
            .unwrap()
            .into_iter()
            .collect();

        assert!(scores["Work"] >= 0.5);
        assert!(scores["Finance"] >= 0.5);
        assert!(scores["Education"] >= 0.5);
        assert_eq!(scores["Health"], 0.0);
    }
}
