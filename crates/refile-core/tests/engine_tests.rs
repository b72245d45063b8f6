use std::fs;
use tempfile::tempdir;

use refile_core::config::{load_categories, load_configuration};
use refile_core::engine::{METHOD_CONTENT, METHOD_METADATA_ONLY};
use refile_core::error::ConfigError;
use refile_core::{AnalysisEngine, AppConfig, CategorySet, Error};

const WORK_TEXT: &str = "quarterly work report for the client meeting about project deadline";

fn engine() -> AnalysisEngine {
    AnalysisEngine::new(AppConfig::default(), CategorySet::default())
}

#[test]
fn test_analyze_file_classifies_text() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("status.txt");
    fs::write(&path, WORK_TEXT).unwrap();

    let analysis = engine().analyze_file(&path).unwrap();
    assert_eq!(analysis.path, path);
    assert_eq!(analysis.metadata.extension, "txt");
    assert_eq!(analysis.metadata.size_bytes, WORK_TEXT.len() as u64);
    assert!(analysis.purposes.contains("Work"));
    assert_eq!(analysis.purposes.top().map(|(name, _)| name), Some("Work"));
    assert_eq!(analysis.classification_method, METHOD_CONTENT);
    assert_eq!(analysis.content_preview.as_deref(), Some(WORK_TEXT));
    assert_eq!(analysis.content_fingerprint.as_ref().map(String::len), Some(16));
}

#[test]
fn test_analyze_file_truncates_preview() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("long.md");
    fs::write(&path, "é".repeat(2_000)).unwrap();

    let analysis = engine().analyze_file(&path).unwrap();
    let preview = analysis.content_preview.unwrap();
    assert_eq!(preview.chars().count(), 500);
}

#[test]
fn test_analyze_missing_file_fails() {
    let dir = tempdir().unwrap();
    let result = engine().analyze_file(&dir.path().join("missing.txt"));
    assert!(matches!(result, Err(Error::Metadata(_))));
}

#[test]
fn test_analyze_directory_writes_documents() {
    let dir = tempdir().unwrap();
    let src = dir.path().join("src");
    let out = src.join("analysis");
    fs::create_dir_all(src.join("a")).unwrap();
    fs::create_dir_all(src.join("b")).unwrap();
    fs::write(src.join("a/notes.txt"), WORK_TEXT).unwrap();
    fs::write(src.join("b/notes.txt"), "family birthday party at home").unwrap();
    fs::write(src.join("photo.jpg"), [0xffu8, 0xd8, 0xff]).unwrap();
    fs::write(src.join("blob.txt"), [b'a', 0, b'b']).unwrap();

    let engine = engine();
    let summary = engine.analyze_directory(&src, Some(&out)).unwrap();
    assert_eq!(summary.analyses.len(), 4);
    assert_eq!(summary.processed, 2);
    assert_eq!(summary.skipped, 2);
    assert_eq!(summary.failed, 0);

    let mut written: Vec<String> = fs::read_dir(&out)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    written.sort();
    assert_eq!(
        written,
        vec![
            "blob_analysis.json",
            "notes_1_analysis.json",
            "notes_analysis.json",
            "photo_analysis.json",
        ]
    );

    let doc: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(out.join("notes_analysis.json")).unwrap())
            .unwrap();
    assert_eq!(doc["metadata"]["name"], "notes.txt");
    assert!(doc["purposes"]["Work"].as_f64().unwrap() >= 0.5);
    assert_eq!(doc["classification_method"], METHOD_CONTENT);

    let doc: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(out.join("photo_analysis.json")).unwrap())
            .unwrap();
    assert_eq!(doc["classification_method"], METHOD_METADATA_ONLY);
    assert!(doc["content_preview"].is_null());

    // The output directory is not analyzed on a second run.
    let again = engine.analyze_directory(&src, Some(&out)).unwrap();
    assert_eq!(again.analyses.len(), 4);
}

#[test]
fn test_output_dir_excluded_however_spelled() {
    let dir = tempdir().unwrap();
    let src = dir.path().join("src");
    fs::create_dir_all(src.join("a")).unwrap();
    fs::write(src.join("a/notes.txt"), WORK_TEXT).unwrap();
    fs::write(src.join("todo.md"), WORK_TEXT).unwrap();
    let out = src.join("a").join("..").join("analysis");

    let engine = engine();
    let first = engine.analyze_directory(&src, Some(&out)).unwrap();
    assert_eq!(first.analyses.len(), 2);
    assert!(src.join("analysis/notes_analysis.json").is_file());

    let again = engine.analyze_directory(&src, Some(&out)).unwrap();
    assert_eq!(again.analyses.len(), 2);
}

#[test]
fn test_analyze_directory_rejects_missing_dir() {
    let dir = tempdir().unwrap();
    let result = engine().analyze_directory(&dir.path().join("nope"), None);
    assert!(matches!(result, Err(Error::Io(_))));
}

#[test]
fn test_configuration_requires_rules_and_weights() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("refile.toml");
    fs::write(&path, "confidence_threshold = 0.6\n").unwrap();

    let result = load_configuration(Some(&path));
    assert!(matches!(result, Err(ConfigError::Source(_))));

    fs::write(
        &path,
        r#"
similarity_threshold = 0.8

[classification_weights]
zero_shot = 0.6
semantic = 0.4

[[hierarchy_rules]]
category = "Work"
extensions = ["txt"]
"#,
    )
    .unwrap();
    let config = load_configuration(Some(&path)).unwrap();
    assert_eq!(config.hierarchy_rules.len(), 1);
    assert_eq!(config.similarity_threshold, 0.8);
    assert_eq!(config.confidence_threshold, 0.5);
    assert_eq!(config.classification_weights.zero_shot, 0.6);

    assert!(matches!(
        load_configuration(Some(&dir.path().join("absent.toml"))),
        Err(ConfigError::NotFound(_))
    ));
}

#[test]
fn test_unreadable_categories_fall_back() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("categories.json");
    fs::write(&path, "{ not json").unwrap();
    assert_eq!(load_categories(Some(&path)), CategorySet::default());

    fs::write(&path, r#"{ "version_types": ["old", "new"] }"#).unwrap();
    let categories = load_categories(Some(&path));
    assert_eq!(categories.version_types, vec!["old", "new"]);
    assert_eq!(categories.purpose_categories.len(), 8);
}
