//! Planning, application and rollback of category-driven file moves.
//!
//! Only this module mutates the scanned tree. The undo state is the
//! [`MoveLedger`] persisted under the output directory; callers must not run
//! two applies or rollbacks against the same output directory at once.

pub mod ledger;
pub mod plan;

pub use ledger::{MoveLedger, MoveRecord, MoveState, LEDGER_FILE_NAME};
pub use plan::{DestinationResolver, PlanPreview, PreviewEntry, ReorganizationPlan};

use crate::analysis::categorize::{categorize, compile_rules, CategoryRule};
use crate::config::AppConfig;
use crate::error::{ConfigError, Error, FileMoveError};
use crate::progress::{ProgressReporter, SilentReporter};
use crate::scanner::{self, FileRecord};
use rayon::prelude::*;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReorganizationState {
    Idle,
    Planned,
    Previewed,
    Applied,
    RolledBack,
}

#[derive(Debug, Default)]
pub struct ApplyReport {
    pub moved: Vec<MoveRecord>,
    /// Files already at their destination.
    pub unchanged: usize,
    pub failures: Vec<FileMoveError>,
    pub created_dirs: Vec<PathBuf>,
    pub cancelled: bool,
    pub ledger_path: PathBuf,
}

impl ApplyReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && !self.cancelled
    }
}

#[derive(Debug, Default)]
pub struct RollbackReport {
    pub restored: Vec<MoveRecord>,
    /// Moves that could not be undone. They stay in the ledger.
    pub failures: Vec<FileMoveError>,
    pub removed_dirs: Vec<PathBuf>,
}

#[derive(Debug)]
pub enum RollbackOutcome {
    /// The ledger was empty.
    NothingToRollback,
    RolledBack(RollbackReport),
}

pub struct Reorganizer {
    rules: Vec<CategoryRule>,
    ignore_patterns: Vec<String>,
    state: ReorganizationState,
    cancel_flag: Arc<AtomicBool>,
    reporter: Arc<dyn ProgressReporter>,
}

impl Reorganizer {
    pub fn new(config: &AppConfig) -> Result<Self, ConfigError> {
        let rules = compile_rules(&config.hierarchy_rules)?;
        Ok(Self::with_rules(rules).with_ignore_patterns(config.ignore_patterns.clone()))
    }

    pub fn with_rules(rules: Vec<CategoryRule>) -> Self {
        Self {
            rules,
            ignore_patterns: Vec::new(),
            state: ReorganizationState::Idle,
            cancel_flag: Arc::new(AtomicBool::new(false)),
            reporter: Arc::new(SilentReporter),
        }
    }

    pub fn with_ignore_patterns(mut self, patterns: Vec<String>) -> Self {
        self.ignore_patterns = patterns;
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn rules(&self) -> &[CategoryRule] {
        &self.rules
    }

    pub fn state(&self) -> ReorganizationState {
        self.state
    }

    /// Setting the token stops an apply before its next file. It is reset
    /// when an apply starts.
    pub fn cancel_token(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel_flag)
    }

    /// Scan `source_dir` recursively and group every file under the category
    /// of its first matching rule. Files whose metadata cannot be read are
    /// skipped.
    pub fn generate_folder_hierarchy(
        &mut self,
        source_dir: &Path,
    ) -> Result<ReorganizationPlan, Error> {
        info!("Planning reorganization of {}", source_dir.display());
        self.reporter.on_scan_start();
        let scan_start = Instant::now();

        let paths: Vec<PathBuf> = scanner::collect_files(
            source_dir,
            &self.ignore_patterns,
            &[],
            self.reporter.as_ref(),
        )?
        .into_iter()
        .filter(|p| !ledger::is_ledger_file(p))
        .collect();
        self.reporter
            .on_scan_complete(paths.len(), scan_start.elapsed().as_secs_f64());

        let records: Vec<_> = paths.par_iter().map(|p| scanner::extract(p)).collect();

        let mut plan = ReorganizationPlan::new(source_dir);
        for record in records {
            match record {
                Ok(record) => {
                    let category = categorize(&record, &self.rules);
                    plan.push(category, record);
                }
                Err(e) => {
                    warn!("Skipping file: {}", e);
                    plan.mark_skipped();
                }
            }
        }

        debug!(
            "Plan has {} files in {} categories ({} skipped)",
            plan.file_count(),
            plan.category_count(),
            plan.skipped()
        );
        self.state = ReorganizationState::Planned;
        Ok(plan)
    }

    /// Resolve every destination without touching the filesystem.
    pub fn preview(&mut self, plan: &ReorganizationPlan, base_output_dir: &Path) -> PlanPreview {
        let preview = PlanPreview::build(plan, base_output_dir);
        self.state = ReorganizationState::Previewed;
        preview
    }

    /// Move every planned file into `base_output_dir/<category>/`.
    ///
    /// Each move is journaled before it happens. A file that cannot be moved
    /// is reported and skipped; the ledger only keeps moves that happened, so
    /// a partial apply can still be rolled back. Any ledger left by a
    /// previous apply is discarded.
    pub fn apply(
        &mut self,
        plan: &ReorganizationPlan,
        base_output_dir: &Path,
    ) -> Result<ApplyReport, Error> {
        self.cancel_flag.store(false, Ordering::Relaxed);

        let base_existed = base_output_dir.is_dir();
        fs::create_dir_all(base_output_dir)?;

        let mut ledger = match MoveLedger::open(base_output_dir) {
            Ok(stale) if !stale.is_clear() => {
                warn!(
                    "Discarding previous ledger {} with {} recorded moves",
                    stale.path().display(),
                    stale.len()
                );
                let mut stale = stale;
                stale.clear()?;
                stale
            }
            Ok(ledger) => ledger,
            Err(e) => {
                warn!("Ignoring unreadable ledger: {}", e);
                MoveLedger::fresh(base_output_dir)
            }
        };
        if !base_existed {
            ledger.record_created_dir(base_output_dir)?;
        }

        let mut report = ApplyReport {
            ledger_path: ledger.path().to_path_buf(),
            ..ApplyReport::default()
        };
        if !base_existed {
            report.created_dirs.push(base_output_dir.to_path_buf());
        }

        let total = plan.file_count();
        info!(
            "Applying {} files into {}",
            total,
            base_output_dir.display()
        );
        self.reporter.on_move_start(total);
        let start = Instant::now();
        let mut resolver = DestinationResolver::for_plan(plan);
        let mut done = 0usize;

        'categories: for (category, files) in plan.iter() {
            if self.is_cancelled() {
                warn!("Apply cancelled after {} of {} files", done, total);
                report.cancelled = true;
                break;
            }
            let dir = base_output_dir.join(category);
            if !dir.is_dir() {
                if let Err(e) = fs::create_dir_all(&dir) {
                    error!("Cannot create {}: {}", dir.display(), e);
                    for record in files {
                        report.failures.push(FileMoveError::new(
                            &record.path,
                            dir.join(&record.name),
                            io::Error::new(e.kind(), e.to_string()),
                        ));
                    }
                    done += files.len();
                    continue;
                }
                ledger.record_created_dir(&dir)?;
                report.created_dirs.push(dir.clone());
            }

            for record in files {
                if self.is_cancelled() {
                    warn!("Apply cancelled after {} of {} files", done, total);
                    report.cancelled = true;
                    break 'categories;
                }

                self.apply_one(record, &dir, &mut resolver, &mut ledger, &mut report)?;
                done += 1;
                self.reporter.on_move_progress(done, total);
            }
        }

        ledger.persist()?;
        self.reporter.on_move_complete(
            report.moved.len(),
            report.failures.len(),
            start.elapsed().as_secs_f64(),
        );
        info!(
            "Reorganization applied: {} moved, {} unchanged, {} failed",
            report.moved.len(),
            report.unchanged,
            report.failures.len()
        );
        self.state = ReorganizationState::Applied;
        Ok(report)
    }

    fn is_cancelled(&self) -> bool {
        self.cancel_flag.load(Ordering::Relaxed)
    }

    fn apply_one(
        &self,
        record: &FileRecord,
        dir: &Path,
        resolver: &mut DestinationResolver,
        ledger: &mut MoveLedger,
        report: &mut ApplyReport,
    ) -> Result<(), Error> {
        let destination = resolver.resolve(dir, &record.name, &record.path);
        if destination == record.path {
            report.unchanged += 1;
            return Ok(());
        }

        let index = ledger.begin(&record.path, &destination)?;
        match move_file(&record.path, &destination) {
            Ok(()) => {
                debug!(
                    "Moved {} -> {}",
                    record.path.display(),
                    destination.display()
                );
                report.moved.push(ledger.complete(index)?);
            }
            Err(e) => {
                ledger.abandon(index)?;
                let failure = FileMoveError::new(&record.path, &destination, e);
                error!("{}", failure);
                report.failures.push(failure);
            }
        }
        Ok(())
    }

    /// Undo the moves recorded under `base_output_dir`.
    ///
    /// Every recorded file goes back to its original path, the ledger is
    /// cleared and directories created by the apply are removed once empty.
    /// Moves that fail stay in the ledger for a later attempt.
    pub fn rollback(&mut self, base_output_dir: &Path) -> Result<RollbackOutcome, Error> {
        let mut ledger = MoveLedger::open(base_output_dir)?;
        if ledger.is_clear() {
            info!("No previous state to rollback.");
            return Ok(RollbackOutcome::NothingToRollback);
        }

        info!(
            "Rolling back {} moves from {}",
            ledger.len(),
            ledger.path().display()
        );
        let total = ledger.len();
        self.reporter.on_move_start(total);
        let start = Instant::now();

        let mut report = RollbackReport::default();
        let mut remaining = Vec::new();

        for (done, record) in ledger.entries().iter().rev().enumerate() {
            match undo_move(record) {
                Ok(true) => report.restored.push(record.clone()),
                Ok(false) => {}
                Err(e) => {
                    let failure =
                        FileMoveError::new(&record.destination_path, &record.original_path, e);
                    error!("{}", failure);
                    report.failures.push(failure);
                    remaining.push(record.clone());
                }
            }
            self.reporter.on_move_progress(done + 1, total);
        }
        remaining.reverse();
        ledger.replace_moves(remaining);

        // The ledger file sits in the base directory, so settle it before
        // removing directories.
        let mut dirs = ledger.created_dirs().to_vec();
        ledger.set_created_dirs(Vec::new());
        ledger.persist()?;

        let mut still_present = Vec::new();
        dirs.sort_by_key(|d| std::cmp::Reverse(d.components().count()));
        for dir in dirs {
            match fs::remove_dir(&dir) {
                Ok(()) => {
                    debug!("Removed empty directory {}", dir.display());
                    report.removed_dirs.push(dir);
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    debug!("Keeping directory {}: {}", dir.display(), e);
                    still_present.push(dir);
                }
            }
        }

        if !ledger.is_empty() || !still_present.is_empty() {
            still_present.reverse();
            ledger.set_created_dirs(still_present);
            ledger.persist()?;
        }

        self.reporter.on_move_complete(
            report.restored.len(),
            report.failures.len(),
            start.elapsed().as_secs_f64(),
        );
        info!(
            "Rollback finished: {} restored, {} failed, {} directories removed",
            report.restored.len(),
            report.failures.len(),
            report.removed_dirs.len()
        );
        self.state = ReorganizationState::RolledBack;
        Ok(RollbackOutcome::RolledBack(report))
    }
}

/// Move one ledger entry back. `Ok(false)` when a pending entry turns out
/// never to have been moved.
fn undo_move(record: &MoveRecord) -> io::Result<bool> {
    let at_destination = record.destination_path.exists();
    let at_origin = record.original_path.exists();

    if record.state == MoveState::Pending && (at_origin || !at_destination) {
        debug!(
            "Pending move of {} never happened",
            record.original_path.display()
        );
        return Ok(false);
    }

    if at_origin {
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            "original path is occupied",
        ));
    }
    if let Some(parent) = record.original_path.parent() {
        fs::create_dir_all(parent)?;
    }
    move_file(&record.destination_path, &record.original_path)?;
    Ok(true)
}

/// Rename `from` to `to`, copying across filesystems. Never overwrites.
pub(crate) fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    if to.exists() {
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            "destination already exists",
        ));
    }
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => copy_then_remove(from, to),
        Err(e) => Err(e),
    }
}

/// Copy `from` into a newly created `to`, then delete `from`. On any failure
/// the partial `to` is removed and `from` is left untouched.
fn copy_then_remove(from: &Path, to: &Path) -> io::Result<()> {
    let mut reader = fs::File::open(from)?;
    let permissions = reader.metadata()?.permissions();
    let mut writer = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(to)?;

    let copied = io::copy(&mut reader, &mut writer)
        .and_then(|_| writer.set_permissions(permissions))
        .and_then(|_| writer.sync_all());
    drop(writer);
    if let Err(e) = copied {
        let _ = fs::remove_file(to);
        return Err(e);
    }

    if let Err(e) = fs::remove_file(from) {
        let _ = fs::remove_file(to);
        return Err(e);
    }
    Ok(())
}
