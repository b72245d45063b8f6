use crate::error::ConfigError;
use config::{Config, File as ConfigFile};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Config file names probed in the working directory when no path is given.
const DEFAULT_CONFIG_FILES: &[&str] = &["Refile.toml", "Refile.json", "Refile.yaml", "Refile.yml"];

pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.5;
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.5;
pub const DEFAULT_MAX_TEXT_CHARS: usize = 100_000;
pub const DEFAULT_MAX_TEXT_FILE_BYTES: u64 = 10 * 1024 * 1024;

/// Reorganization configuration. `hierarchy_rules` and `classification_weights`
/// must be present in any explicitly loaded document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub hierarchy_rules: Vec<RuleConfig>,
    pub classification_weights: ClassificationWeights,
    #[serde(default)]
    pub ignore_patterns: Vec<String>,
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,
    #[serde(default = "default_max_text_chars")]
    pub max_text_chars: usize,
    #[serde(default = "default_max_text_file_bytes")]
    pub max_text_file_bytes: u64,
    #[serde(default = "default_text_extensions")]
    pub text_extensions: Vec<String>,
}

/// One entry of `hierarchy_rules`. Every predicate that is present must hold.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleConfig {
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_size_bytes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_size_bytes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub years: Option<Vec<i32>>,
}

/// Weights used to blend the zero-shot score with the semantic score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassificationWeights {
    pub zero_shot: f64,
    pub semantic: f64,
}

impl Default for ClassificationWeights {
    fn default() -> Self {
        Self {
            zero_shot: 0.7,
            semantic: 0.3,
        }
    }
}

impl ClassificationWeights {
    pub fn combine(&self, zero_shot_score: f64, semantic_score: f64) -> f64 {
        self.zero_shot * zero_shot_score + self.semantic * semantic_score
    }
}

fn default_confidence_threshold() -> f64 {
    DEFAULT_CONFIDENCE_THRESHOLD
}

fn default_similarity_threshold() -> f64 {
    DEFAULT_SIMILARITY_THRESHOLD
}

fn default_max_text_chars() -> usize {
    DEFAULT_MAX_TEXT_CHARS
}

fn default_max_text_file_bytes() -> u64 {
    DEFAULT_MAX_TEXT_FILE_BYTES
}

fn default_text_extensions() -> Vec<String> {
    [
        "txt", "md", "markdown", "rst", "org", "tex", "csv", "tsv", "json", "yaml", "yml",
        "toml", "xml", "html", "htm", "log", "ini", "cfg", "rtf",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn rule(category: &str, extensions: &[&str]) -> RuleConfig {
    RuleConfig {
        category: category.to_string(),
        extensions: Some(extensions.iter().map(|s| s.to_string()).collect()),
        ..RuleConfig::default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            hierarchy_rules: vec![
                rule("Documents", &["pdf", "doc", "docx", "odt", "rtf", "txt", "md"]),
                rule("Spreadsheets", &["xls", "xlsx", "ods", "csv", "tsv"]),
                rule("Presentations", &["ppt", "pptx", "odp", "key"]),
                rule(
                    "Images",
                    &["jpg", "jpeg", "png", "gif", "bmp", "svg", "webp", "heic", "tiff"],
                ),
                rule("Audio", &["mp3", "wav", "flac", "aac", "ogg", "m4a"]),
                rule("Video", &["mp4", "mov", "avi", "mkv", "webm"]),
                rule("Archives", &["zip", "tar", "gz", "bz2", "xz", "7z", "rar"]),
                rule(
                    "Code",
                    &["rs", "py", "js", "ts", "java", "c", "h", "cpp", "go", "rb", "sh"],
                ),
            ],
            classification_weights: ClassificationWeights::default(),
            ignore_patterns: Vec::new(),
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            max_text_chars: DEFAULT_MAX_TEXT_CHARS,
            max_text_file_bytes: DEFAULT_MAX_TEXT_FILE_BYTES,
            text_extensions: default_text_extensions(),
        }
    }
}

impl AppConfig {
    /// Check values the deserializer cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for rule in &self.hierarchy_rules {
            validate_category_name(&rule.category)?;
            if let (Some(min), Some(max)) = (rule.min_size_bytes, rule.max_size_bytes) {
                if min > max {
                    return Err(ConfigError::InvalidRule {
                        category: rule.category.clone(),
                        reason: format!("min_size_bytes {} exceeds max_size_bytes {}", min, max),
                    });
                }
            }
            if let Some(pattern) = &rule.name_pattern {
                glob::Pattern::new(pattern).map_err(|e| ConfigError::InvalidRule {
                    category: rule.category.clone(),
                    reason: format!("bad name_pattern '{}': {}", pattern, e),
                })?;
            }
        }

        let weights = self.classification_weights;
        for (key, value) in [
            ("classification_weights.zero_shot", weights.zero_shot),
            ("classification_weights.semantic", weights.semantic),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidValue {
                    key,
                    reason: format!("expected a non-negative number, got {}", value),
                });
            }
        }

        for (key, value) in [
            ("confidence_threshold", self.confidence_threshold),
            ("similarity_threshold", self.similarity_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidValue {
                    key,
                    reason: format!("expected a value in [0, 1], got {}", value),
                });
            }
        }

        if self.max_text_chars == 0 {
            return Err(ConfigError::InvalidValue {
                key: "max_text_chars",
                reason: "must be greater than zero".to_string(),
            });
        }

        Ok(())
    }

    pub fn is_text_extension(&self, extension: &str) -> bool {
        self.text_extensions
            .iter()
            .any(|e| e.trim_start_matches('.').eq_ignore_ascii_case(extension))
    }
}

/// Category names become directory names under the output base.
pub fn validate_category_name(name: &str) -> Result<(), ConfigError> {
    let trimmed = name.trim();
    if trimmed.is_empty()
        || trimmed == "."
        || trimmed == ".."
        || name.contains('/')
        || name.contains('\\')
        || name.contains('\0')
    {
        return Err(ConfigError::InvalidCategory(name.to_string()));
    }
    Ok(())
}

/// Load the reorganization configuration.
///
/// An explicit `path` must exist and contain every required key. Without a
/// path, a `Refile.{toml,json,yaml,yml}` in the working directory is used if
/// present, otherwise the built-in defaults.
pub fn load_configuration(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let path: PathBuf = match path {
        Some(p) => {
            if !p.is_file() {
                return Err(ConfigError::NotFound(p.to_path_buf()));
            }
            p.to_path_buf()
        }
        None => match DEFAULT_CONFIG_FILES
            .iter()
            .map(PathBuf::from)
            .find(|p| p.is_file())
        {
            Some(p) => p,
            None => {
                debug!("No configuration file found, using built-in rules");
                return Ok(AppConfig::default());
            }
        },
    };

    debug!("Loading configuration from {}", path.display());
    let builder = Config::builder()
        .add_source(ConfigFile::from(path.as_path()))
        .build()?;
    let config = builder.try_deserialize::<AppConfig>()?;
    config.validate()?;
    Ok(config)
}

/// Label vocabularies used by classification and version naming.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySet {
    #[serde(default = "default_purpose_categories")]
    pub purpose_categories: Vec<String>,
    #[serde(default = "default_project_categories")]
    pub project_categories: Vec<String>,
    #[serde(default = "default_version_types")]
    pub version_types: Vec<String>,
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn default_purpose_categories() -> Vec<String> {
    to_strings(&[
        "Work",
        "Leisure",
        "Personal Projects",
        "Private",
        "Family",
        "Education",
        "Finance",
        "Health",
    ])
}

fn default_project_categories() -> Vec<String> {
    to_strings(&["Work", "Personal", "Academic", "Freelance"])
}

fn default_version_types() -> Vec<String> {
    to_strings(&["unique", "draft", "revised", "final"])
}

impl Default for CategorySet {
    fn default() -> Self {
        Self {
            purpose_categories: default_purpose_categories(),
            project_categories: default_project_categories(),
            version_types: default_version_types(),
        }
    }
}

/// Load the categories document. Any failure falls back to the built-in set;
/// this never aborts the run.
pub fn load_categories(path: Option<&Path>) -> CategorySet {
    let Some(path) = path else {
        return CategorySet::default();
    };

    let loaded = Config::builder()
        .add_source(ConfigFile::from(path))
        .build()
        .and_then(|c| c.try_deserialize::<CategorySet>());

    match loaded {
        Ok(categories) => categories,
        Err(e) => {
            warn!(
                "Error loading categories from {}: {}. Using defaults",
                path.display(),
                e
            );
            CategorySet::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.classification_weights.zero_shot, 0.7);
        assert_eq!(config.classification_weights.semantic, 0.3);
        assert_eq!(config.max_text_chars, 100_000);
    }

    #[test]
    fn test_load_json_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("reorg.json");
        fs::write(
            &path,
            r#"{
                "hierarchy_rules": [
                    {"category": "Docs", "extensions": ["txt", "pdf"]},
                    {"category": "Everything"}
                ],
                "classification_weights": {"zero_shot": 0.6, "semantic": 0.4}
            }"#,
        )
        .unwrap();

        let config = load_configuration(Some(&path)).unwrap();
        assert_eq!(config.hierarchy_rules.len(), 2);
        assert_eq!(config.hierarchy_rules[0].category, "Docs");
        assert!(config.hierarchy_rules[1].extensions.is_none());
        assert_eq!(config.classification_weights.semantic, 0.4);
        assert_eq!(config.confidence_threshold, DEFAULT_CONFIDENCE_THRESHOLD);
    }

    #[test]
    fn test_missing_required_key_is_fatal() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("reorg.json");
        fs::write(
            &path,
            r#"{"hierarchy_rules": [{"category": "Docs", "extensions": ["txt"]}]}"#,
        )
        .unwrap();

        let err = load_configuration(Some(&path)).unwrap_err();
        assert!(err.to_string().contains("classification_weights"));
    }

    #[test]
    fn test_missing_explicit_file_is_fatal() {
        let dir = tempdir().unwrap();
        let result = load_configuration(Some(&dir.path().join("nope.toml")));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_category_name_with_separator_is_rejected() {
        assert!(validate_category_name("Work").is_ok());
        assert!(validate_category_name("Personal Projects").is_ok());
        assert!(validate_category_name("a/b").is_err());
        assert!(validate_category_name("..").is_err());
        assert!(validate_category_name("  ").is_err());
    }

    #[test]
    fn test_threshold_out_of_range_is_rejected() {
        let config = AppConfig {
            similarity_threshold: 1.5,
            ..AppConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { key: "similarity_threshold", .. })
        ));
    }

    #[test]
    fn test_categories_fall_back_on_bad_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("categories.json");
        fs::write(&path, "{ this is not json").unwrap();

        let categories = load_categories(Some(&path));
        assert_eq!(categories, CategorySet::default());
        assert_eq!(categories.purpose_categories.len(), 8);
        assert_eq!(categories.project_categories.len(), 4);
        assert_eq!(categories.version_types.len(), 4);
    }

    #[test]
    fn test_categories_partial_document_keeps_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("categories.json");
        fs::write(&path, r#"{"purpose_categories": ["Work", "Travel"]}"#).unwrap();

        let categories = load_categories(Some(&path));
        assert_eq!(categories.purpose_categories, vec!["Work", "Travel"]);
        assert_eq!(categories.version_types, default_version_types());
    }
}
