use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::tempdir;

use refile_core::analysis::{
    categorize, compile_rules, generate_version_name, pairwise_similarity, SimilarityEngine,
    TextDocument,
};
use refile_core::classify::{SemanticScorer, ZeroShotClassifier};
use refile_core::config::RuleConfig;
use refile_core::error::ClassificationError;
use refile_core::scanner::extract;
use refile_core::{
    AnalysisEngine, AppConfig, CategorySet, ClassificationAdapter, ClassifierConfig, Reorganizer,
    RollbackOutcome, SilentReporter,
};

const REPORT: &str = "work report about project management";
const REPORT_DRAFT: &str = "draft work report on project management strategies";
const GROCERIES: &str = "grocery list: bananas, apples, milk";

fn document(path: &Path, text: &str) -> TextDocument {
    fs::write(path, text).unwrap();
    TextDocument {
        record: extract(path).unwrap(),
        text: text.to_string(),
    }
}

fn lexical() -> ClassificationAdapter {
    ClassificationAdapter::lexical(ClassifierConfig::default())
}

#[test]
fn test_similarity_is_symmetric() {
    let dir = tempdir().unwrap();
    let a = document(&dir.path().join("report.txt"), REPORT);
    let b = document(&dir.path().join("report_draft.txt"), REPORT_DRAFT);

    let engine = SimilarityEngine::new(lexical());
    let ab = engine.compare(&a, &b);
    let ba = engine.compare(&b, &a);

    assert_eq!(ab, ba);
    assert_eq!(ab.left, a.record.path);
    assert_eq!(engine.cached_pairs(), 1);
    assert!(ab.overall_similarity >= 0.5);
    assert!(ab.component_scores.contains_key("content"));
    assert!(ab.component_scores.contains_key("name"));
}

#[test]
fn test_pairwise_keeps_pairs_at_threshold() {
    let dir = tempdir().unwrap();
    let docs = vec![
        document(&dir.path().join("groceries.txt"), GROCERIES),
        document(&dir.path().join("report.txt"), REPORT),
        document(&dir.path().join("report_draft.txt"), REPORT_DRAFT),
    ];
    let adapter = lexical();

    let pairs = pairwise_similarity(&adapter, &docs, 0.5);
    assert_eq!(pairs.len(), 1);
    assert_eq!(pairs[0].a.name, "report.txt");
    assert_eq!(pairs[0].b.name, "report_draft.txt");

    // The boundary is inclusive.
    let exact = pairs[0].result.overall_similarity;
    assert_eq!(pairwise_similarity(&adapter, &docs, exact).len(), 1);
    assert!(pairwise_similarity(&adapter, &docs, exact + 1e-9).is_empty());

    // At zero every pair is kept.
    assert_eq!(pairwise_similarity(&adapter, &docs, 0.0).len(), 3);
}

struct Unavailable;

impl ZeroShotClassifier for Unavailable {
    fn classify(
        &self,
        _text: &str,
        _labels: &[String],
    ) -> Result<Vec<(String, f64)>, ClassificationError> {
        Err(ClassificationError::new("zero-shot", "connection refused"))
    }
}

impl SemanticScorer for Unavailable {
    fn label_score(&self, _text: &str, _label: &str) -> Result<f64, ClassificationError> {
        Err(ClassificationError::new("semantic", "connection refused"))
    }

    fn text_similarity(&self, _a: &str, _b: &str) -> Result<f64, ClassificationError> {
        Err(ClassificationError::new("semantic", "connection refused"))
    }
}

#[test]
fn test_service_failure_degrades_to_zero() {
    let dir = tempdir().unwrap();
    let docs = vec![
        document(&dir.path().join("report.txt"), REPORT),
        document(&dir.path().join("report_draft.txt"), REPORT_DRAFT),
    ];
    let backend = Arc::new(Unavailable);
    let adapter = ClassificationAdapter::new(backend.clone(), backend, ClassifierConfig::default());

    assert!(adapter.try_similarity(REPORT, REPORT_DRAFT).is_err());
    assert!(pairwise_similarity(&adapter, &docs, 0.5).is_empty());

    let all = SimilarityEngine::new(adapter.clone()).pairwise(&docs, 0.0, &SilentReporter);
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].result.overall_similarity, 0.0);

    let purposes = adapter.classify_purpose(REPORT, &CategorySet::default().purpose_categories, 0.5);
    assert!(purposes.is_empty());
}

#[test]
fn test_version_names_are_unique() {
    let dir = tempdir().unwrap();
    fs::create_dir_all(dir.path().join("a")).unwrap();
    fs::create_dir_all(dir.path().join("b")).unwrap();
    fs::write(dir.path().join("a/report.txt"), REPORT).unwrap();
    fs::write(dir.path().join("b/report.txt"), REPORT).unwrap();
    fs::write(dir.path().join("report_draft.txt"), REPORT_DRAFT).unwrap();
    fs::write(dir.path().join("report_final.txt"), REPORT_DRAFT).unwrap();

    let engine = AnalysisEngine::new(AppConfig::default(), CategorySet::default());
    let groups = engine.version_groups(dir.path(), 0.5).unwrap();
    assert_eq!(groups.len(), 1);

    let names: Vec<&str> = groups[0]
        .members
        .iter()
        .map(|m| m.version_name.as_str())
        .collect();
    assert_eq!(names.len(), 4);
    let distinct: HashSet<&str> = names.iter().copied().collect();
    assert_eq!(distinct.len(), 4);
    assert!(names.iter().any(|n| n.starts_with("report_final_final_")));
    assert!(names.iter().any(|n| n.starts_with("report_draft_draft_")));

    // Both sides of every pair get distinct names.
    let pairs = engine.find_similar_files(dir.path(), 0.5).unwrap();
    let types = &engine.categories().version_types;
    for pair in &pairs {
        assert_ne!(
            generate_version_name(&pair.a, &pair.result, types),
            generate_version_name(&pair.b, &pair.result, types)
        );
    }
}

#[test]
fn test_find_similar_skips_binary_and_non_text() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("report.txt"), REPORT).unwrap();
    fs::write(dir.path().join("report_draft.txt"), REPORT_DRAFT).unwrap();
    // Same words, but not a text extension.
    fs::write(dir.path().join("report.png"), REPORT).unwrap();
    // Text extension, binary content.
    let mut blob = REPORT.as_bytes().to_vec();
    blob.push(0);
    fs::write(dir.path().join("blob.txt"), blob).unwrap();

    let engine = AnalysisEngine::new(AppConfig::default(), CategorySet::default());
    let documents = engine.text_documents(dir.path()).unwrap();
    let names: Vec<&str> = documents.iter().map(|d| d.record.name.as_str()).collect();
    assert_eq!(names, vec!["report.txt", "report_draft.txt"]);

    let pairs = engine.find_similar_files(dir.path(), 0.5).unwrap();
    assert_eq!(pairs.len(), 1);
}

#[test]
fn test_report_scenario_end_to_end() {
    let dir = tempdir().unwrap();
    let base = dir.path();
    fs::write(base.join("report.txt"), REPORT).unwrap();
    fs::write(base.join("report_draft.txt"), REPORT_DRAFT).unwrap();

    let engine = AnalysisEngine::new(AppConfig::default(), CategorySet::default());
    let pairs = engine.find_similar_files(base, 0.5).unwrap();
    assert_eq!(pairs.len(), 1);
    assert!(pairs[0].result.overall_similarity >= 0.5);
    assert_eq!(pairs[0].a.path, base.join("report.txt"));
    assert_eq!(pairs[0].b.path, base.join("report_draft.txt"));

    let rules = compile_rules(&[RuleConfig {
        category: "Work".to_string(),
        extensions: Some(vec!["txt".to_string()]),
        ..RuleConfig::default()
    }])
    .unwrap();
    assert_eq!(categorize(&pairs[0].a, &rules), "Work");

    let mut reorganizer = Reorganizer::with_rules(rules);
    let plan = reorganizer.generate_folder_hierarchy(base).unwrap();
    assert_eq!(plan.files("Work").len(), 2);

    let report = reorganizer.apply(&plan, base).unwrap();
    assert!(report.is_complete());
    assert_eq!(
        fs::read_to_string(base.join("Work/report.txt")).unwrap(),
        REPORT
    );
    assert_eq!(
        fs::read_to_string(base.join("Work/report_draft.txt")).unwrap(),
        REPORT_DRAFT
    );
    assert!(!base.join("report.txt").exists());

    let outcome = reorganizer.rollback(base).unwrap();
    assert!(matches!(outcome, RollbackOutcome::RolledBack(_)));
    assert_eq!(fs::read_to_string(base.join("report.txt")).unwrap(), REPORT);
    assert_eq!(
        fs::read_to_string(base.join("report_draft.txt")).unwrap(),
        REPORT_DRAFT
    );
    assert!(!base.join("Work").exists());
}
