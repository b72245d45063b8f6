use crate::scanner::FileRecord;
use ahash::AHashSet;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Proposed hierarchy: category name to the files it receives, ordered by
/// path. A file appears under exactly one category.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReorganizationPlan {
    source_dir: PathBuf,
    categories: BTreeMap<String, Vec<FileRecord>>,
    skipped: usize,
}

impl ReorganizationPlan {
    pub fn new(source_dir: &Path) -> Self {
        Self {
            source_dir: source_dir.to_path_buf(),
            ..Self::default()
        }
    }

    pub(crate) fn push(&mut self, category: &str, record: FileRecord) {
        self.categories
            .entry(category.to_string())
            .or_default()
            .push(record);
    }

    pub(crate) fn mark_skipped(&mut self) {
        self.skipped += 1;
    }

    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    /// Files that failed metadata extraction while planning.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn category_count(&self) -> usize {
        self.categories.len()
    }

    pub fn file_count(&self) -> usize {
        self.categories.values().map(Vec::len).sum()
    }

    pub fn files(&self, category: &str) -> &[FileRecord] {
        self.categories
            .get(category)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.categories.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[FileRecord])> {
        self.categories
            .iter()
            .map(|(category, files)| (category.as_str(), files.as_slice()))
    }
}

/// Picks collision-free destinations: `name.ext`, then `name_1.ext`,
/// `name_2.ext`, ... skipping paths already claimed in this run, present on
/// disk, or held by another file of the plan.
///
/// Every file of the plan counts as occupying its source path for the whole
/// run, so the destinations do not depend on how far an apply has got. A
/// preview and the apply that follows resolve the same paths.
#[derive(Debug, Default)]
pub struct DestinationResolver {
    claimed: AHashSet<PathBuf>,
    sources: AHashSet<PathBuf>,
}

impl DestinationResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_plan(plan: &ReorganizationPlan) -> Self {
        Self {
            claimed: AHashSet::new(),
            sources: plan
                .categories
                .values()
                .flatten()
                .map(|record| record.path.clone())
                .collect(),
        }
    }

    fn is_free(&self, candidate: &Path) -> bool {
        !self.claimed.contains(candidate)
            && !self.sources.contains(candidate)
            && !candidate.exists()
    }

    /// Destination for `source` inside `dir`. Returns `source` itself when the
    /// file already sits at its unsuffixed destination.
    pub fn resolve(&mut self, dir: &Path, file_name: &str, source: &Path) -> PathBuf {
        let name = Path::new(file_name);
        let stem = name
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| file_name.to_string());
        let extension = name
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();

        let mut candidate = dir.join(file_name);
        let mut counter: u64 = 0;
        loop {
            if candidate == source && !self.claimed.contains(&candidate) {
                break;
            }
            if self.is_free(&candidate) {
                break;
            }
            counter += 1;
            candidate = dir.join(format!("{}_{}{}", stem, counter, extension));
        }

        self.claimed.insert(candidate.clone());
        candidate
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreviewEntry {
    pub category: String,
    pub source: PathBuf,
    pub destination: PathBuf,
}

/// Read-only view of what an apply would do.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanPreview {
    pub base_output_dir: PathBuf,
    pub entries: Vec<PreviewEntry>,
}

impl PlanPreview {
    pub fn build(plan: &ReorganizationPlan, base_output_dir: &Path) -> Self {
        let mut resolver = DestinationResolver::for_plan(plan);
        let mut entries = Vec::with_capacity(plan.file_count());
        for (category, files) in plan.iter() {
            let dir = base_output_dir.join(category);
            for record in files {
                entries.push(PreviewEntry {
                    category: category.to_string(),
                    source: record.path.clone(),
                    destination: resolver.resolve(&dir, &record.name, &record.path),
                });
            }
        }
        Self {
            base_output_dir: base_output_dir.to_path_buf(),
            entries,
        }
    }

    /// Entries whose destination differs from the source.
    pub fn moves(&self) -> impl Iterator<Item = &PreviewEntry> {
        self.entries.iter().filter(|e| e.source != e.destination)
    }
}

impl fmt::Display for PlanPreview {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Proposed Folder Reorganization:")?;
        let mut current: Option<&str> = None;
        for entry in &self.entries {
            if current != Some(entry.category.as_str()) {
                writeln!(f)?;
                writeln!(f, "Category: {}", entry.category)?;
                current = Some(entry.category.as_str());
            }
            if entry.source == entry.destination {
                writeln!(f, "  - {} (unchanged)", entry.source.display())?;
            } else {
                writeln!(
                    f,
                    "  - {} -> {}",
                    entry.source.display(),
                    entry.destination.display()
                )?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_resolver_counts_up_on_collision() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("Docs");
        let mut resolver = DestinationResolver::new();

        let first = resolver.resolve(&target, "notes.txt", Path::new("/a/notes.txt"));
        let second = resolver.resolve(&target, "notes.txt", Path::new("/b/notes.txt"));
        let third = resolver.resolve(&target, "notes.txt", Path::new("/c/notes.txt"));

        assert_eq!(first, target.join("notes.txt"));
        assert_eq!(second, target.join("notes_1.txt"));
        assert_eq!(third, target.join("notes_2.txt"));
    }

    #[test]
    fn test_resolver_skips_existing_files() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("README"), "taken").unwrap();
        let mut resolver = DestinationResolver::new();

        let dest = resolver.resolve(dir.path(), "README", Path::new("/elsewhere/README"));
        assert_eq!(dest, dir.path().join("README_1"));
    }

    #[test]
    fn test_resolver_treats_plan_sources_as_occupied() {
        let dir = tempdir().unwrap();
        let work = dir.path().join("Work");
        let held = work.join("a.txt");
        let mut plan = ReorganizationPlan::new(dir.path());
        plan.push("Archive", FileRecord {
            path: held.clone(),
            name: "a.txt".to_string(),
            extension: "txt".to_string(),
            size_bytes: 100,
            created_at: 0,
            modified_at: 0,
            inferred_year: 1970,
        });

        // Not on disk, but another file of the plan lives there.
        let mut resolver = DestinationResolver::for_plan(&plan);
        let dest = resolver.resolve(&work, "a.txt", &dir.path().join("a.txt"));
        assert_eq!(dest, work.join("a_1.txt"));

        // The file itself may stay where it is.
        let mut resolver = DestinationResolver::for_plan(&plan);
        assert_eq!(resolver.resolve(&work, "a.txt", &held), held);
    }

    #[test]
    fn test_resolver_keeps_file_in_place() {
        let dir = tempdir().unwrap();
        let existing = dir.path().join("a.txt");
        fs::write(&existing, "x").unwrap();
        let mut resolver = DestinationResolver::new();

        assert_eq!(resolver.resolve(dir.path(), "a.txt", &existing), existing);
    }
}
