use crate::analysis::similarity::{SimilarPair, SimilarityEngine, TextDocument};
use crate::analysis::versioning::{version_groups, VersionGroup};
use crate::classify::{ClassificationAdapter, ClassificationResult, ClassifierConfig};
use crate::config::{AppConfig, CategorySet};
use crate::error::Error;
use crate::fingerprint;
use crate::progress::{ProgressReporter, SilentReporter};
use crate::reorganize::ledger::is_ledger_file;
use crate::scanner::{self, text::truncate_chars, FileRecord};
use ahash::AHashSet;
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Characters of content kept in an analysis document.
pub const CONTENT_PREVIEW_CHARS: usize = 500;

pub const METHOD_CONTENT: &str = "zero_shot+semantic";
pub const METHOD_METADATA_ONLY: &str = "metadata_only";

const ANALYSIS_SUFFIX: &str = "_analysis.json";

/// Everything known about one file after analysis.
#[derive(Debug, Clone, Serialize)]
pub struct FileAnalysis {
    pub path: PathBuf,
    pub metadata: FileRecord,
    pub purposes: ClassificationResult,
    pub content_preview: Option<String>,
    pub content_fingerprint: Option<String>,
    pub classification_method: &'static str,
    pub analyzed_at: DateTime<Utc>,
}

impl FileAnalysis {
    pub fn has_content(&self) -> bool {
        self.content_preview.is_some()
    }
}

#[derive(Debug, Default)]
pub struct AnalysisSummary {
    pub analyses: Vec<FileAnalysis>,
    /// Files analyzed from their content.
    pub processed: usize,
    /// Files without readable text, analyzed from metadata alone.
    pub skipped: usize,
    pub failed: usize,
    pub written: Vec<PathBuf>,
}

/// Per-file analysis and directory-wide similarity over one configuration.
pub struct AnalysisEngine {
    config: AppConfig,
    categories: CategorySet,
    adapter: ClassificationAdapter,
    reporter: Arc<dyn ProgressReporter>,
}

impl AnalysisEngine {
    /// Engine using the built-in lexical backend.
    pub fn new(config: AppConfig, categories: CategorySet) -> Self {
        let adapter = ClassificationAdapter::lexical(ClassifierConfig::from(&config));
        Self::with_adapter(config, categories, adapter)
    }

    pub fn with_adapter(
        config: AppConfig,
        categories: CategorySet,
        adapter: ClassificationAdapter,
    ) -> Self {
        Self {
            config,
            categories,
            adapter,
            reporter: Arc::new(SilentReporter),
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn categories(&self) -> &CategorySet {
        &self.categories
    }

    /// Bounded text of `record`, or `None` when it is not a text file, too
    /// large, binary or unreadable.
    fn read_text(&self, record: &FileRecord) -> Option<String> {
        if !self.config.is_text_extension(&record.extension) {
            return None;
        }
        if record.size_bytes > self.config.max_text_file_bytes {
            debug!(
                "Skipping text of {} ({} bytes over limit)",
                record.path.display(),
                record.size_bytes
            );
            return None;
        }
        match scanner::read_text_prefix(&record.path, self.config.max_text_chars) {
            Ok(text) => text,
            Err(e) => {
                warn!("Error reading {}: {}", record.path.display(), e);
                None
            }
        }
    }

    pub fn analyze_file(&self, path: &Path) -> Result<FileAnalysis, Error> {
        let record = scanner::extract(path)?;
        let text = self.read_text(&record);

        let (purposes, method) = match text.as_deref() {
            Some(text) => (
                self.adapter.classify_purpose(
                    text,
                    &self.categories.purpose_categories,
                    self.config.confidence_threshold,
                ),
                METHOD_CONTENT,
            ),
            None => (ClassificationResult::default(), METHOD_METADATA_ONLY),
        };

        let content_fingerprint = match fingerprint::partial_content_hash(path) {
            Ok(hash) => Some(format!("{:016x}", hash)),
            Err(e) => {
                warn!("Error fingerprinting {}: {}", path.display(), e);
                None
            }
        };

        Ok(FileAnalysis {
            path: record.path.clone(),
            content_preview: text
                .as_deref()
                .map(|t| truncate_chars(t, CONTENT_PREVIEW_CHARS).to_string()),
            metadata: record,
            purposes,
            content_fingerprint,
            classification_method: method,
            analyzed_at: Utc::now(),
        })
    }

    /// Analyze every file below `dir`. With `output_dir`, one
    /// `<stem>_analysis.json` document per file is written there.
    pub fn analyze_directory(
        &self,
        dir: &Path,
        output_dir: Option<&Path>,
    ) -> Result<AnalysisSummary, Error> {
        info!("Analyzing {}", dir.display());
        let excluded: Vec<PathBuf> = output_dir.map(Path::to_path_buf).into_iter().collect();

        self.reporter.on_scan_start();
        let scan_start = Instant::now();
        let paths: Vec<PathBuf> = scanner::collect_files(
            dir,
            &self.config.ignore_patterns,
            &excluded,
            self.reporter.as_ref(),
        )?
        .into_iter()
        .filter(|p| !is_ledger_file(p))
        .collect();
        self.reporter
            .on_scan_complete(paths.len(), scan_start.elapsed().as_secs_f64());

        let total = paths.len();
        self.reporter.on_analyze_start(total);
        let start = Instant::now();
        let done = AtomicUsize::new(0);

        let results: Vec<Result<FileAnalysis, Error>> = paths
            .par_iter()
            .map(|path| {
                let result = self.analyze_file(path);
                let n = done.fetch_add(1, Ordering::Relaxed) + 1;
                self.reporter.on_analyze_progress(n, total);
                result
            })
            .collect();

        let mut summary = AnalysisSummary::default();
        for result in results {
            match result {
                Ok(analysis) => {
                    if analysis.has_content() {
                        summary.processed += 1;
                    } else {
                        summary.skipped += 1;
                    }
                    summary.analyses.push(analysis);
                }
                Err(e) => {
                    error!("Error analyzing file: {}", e);
                    summary.failed += 1;
                }
            }
        }
        self.reporter
            .on_analyze_complete(summary.analyses.len(), start.elapsed().as_secs_f64());

        if let Some(out) = output_dir {
            summary.written = write_analyses(&summary.analyses, out)?;
        }

        info!(
            "Analysis finished: {} processed, {} skipped, {} failed",
            summary.processed, summary.skipped, summary.failed
        );
        Ok(summary)
    }

    /// Text documents below `dir` eligible for similarity scoring.
    pub fn text_documents(&self, dir: &Path) -> Result<Vec<TextDocument>, Error> {
        let paths =
            scanner::collect_files(dir, &self.config.ignore_patterns, &[], &SilentReporter)?;
        let documents: Vec<TextDocument> = paths
            .par_iter()
            .filter(|p| !is_ledger_file(p))
            .filter_map(|path| match scanner::extract(path) {
                Ok(record) => {
                    let text = self.read_text(&record)?;
                    Some(TextDocument { record, text })
                }
                Err(e) => {
                    warn!("Skipping file: {}", e);
                    None
                }
            })
            .collect();
        debug!("{} text documents under {}", documents.len(), dir.display());
        Ok(documents)
    }

    /// Pairs of text files below `dir` at or above `threshold`.
    pub fn find_similar_files(&self, dir: &Path, threshold: f64) -> Result<Vec<SimilarPair>, Error> {
        let documents = self.text_documents(dir)?;
        let engine = SimilarityEngine::new(self.adapter.clone());
        Ok(engine.pairwise(&documents, threshold, self.reporter.as_ref()))
    }

    /// Near-duplicate groups below `dir` with a version name for each member.
    pub fn version_groups(&self, dir: &Path, threshold: f64) -> Result<Vec<VersionGroup>, Error> {
        let pairs = self.find_similar_files(dir, threshold)?;
        Ok(version_groups(&pairs, &self.categories.version_types))
    }
}

/// Write each analysis as pretty JSON. Files sharing a stem get `_1`, `_2`,
/// ... suffixes in path order.
fn write_analyses(analyses: &[FileAnalysis], output_dir: &Path) -> Result<Vec<PathBuf>, Error> {
    fs::create_dir_all(output_dir)?;
    let mut used: AHashSet<String> = AHashSet::new();
    let mut written = Vec::with_capacity(analyses.len());

    for analysis in analyses {
        let stem = analysis.metadata.stem();
        let mut name = format!("{}{}", stem, ANALYSIS_SUFFIX);
        let mut counter = 0u32;
        while used.contains(&name) {
            counter += 1;
            name = format!("{}_{}{}", stem, counter, ANALYSIS_SUFFIX);
        }
        used.insert(name.clone());

        let path = output_dir.join(&name);
        let json = serde_json::to_string_pretty(analysis)?;
        fs::write(&path, json)?;
        debug!("Wrote {}", path.display());
        written.push(path);
    }

    Ok(written)
}
