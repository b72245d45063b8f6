use indicatif::{ProgressBar, ProgressStyle};
use refile_core::ProgressReporter;
use std::sync::Mutex;
use std::time::Duration;

const TICK_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

/// CLI progress reporter using indicatif progress bars.
///
/// The scan phase gets a spinner; analysis, pair scoring and moves get a bar
/// since their totals are known up front.
pub struct CliReporter {
    bar: Mutex<Option<ProgressBar>>,
}

impl CliReporter {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }

    fn set_bar(&self, pb: ProgressBar) {
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(old) = guard.take() {
                old.finish_and_clear();
            }
            *guard = Some(pb);
        }
    }

    fn finish_bar(&self) {
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(pb) = guard.take() {
                pb.finish_and_clear();
            }
        }
    }

    fn update(&self, done: usize, total: usize) {
        if let Ok(guard) = self.bar.lock() {
            if let Some(pb) = guard.as_ref() {
                if pb.length() != Some(total as u64) {
                    pb.set_length(total as u64);
                }
                pb.set_position(done as u64);
            }
        }
    }

    fn start_bar(&self, label: &str, unit: &str, total: usize) {
        let template = format!(
            "  {{spinner:.cyan}} {} [{{bar:30.cyan/dim}}] {{pos}}/{{len}} {} ({{eta}} remaining)",
            label, unit
        );
        let style = ProgressStyle::with_template(&template)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("━╸─")
            .tick_chars(TICK_CHARS);
        let pb = ProgressBar::new(total as u64);
        pb.set_style(style);
        pb.enable_steady_tick(Duration::from_millis(80));
        self.set_bar(pb);
    }
}

impl ProgressReporter for CliReporter {
    fn on_scan_start(&self) {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_chars(TICK_CHARS),
        );
        pb.set_message("Scanning files...");
        pb.enable_steady_tick(Duration::from_millis(80));
        self.set_bar(pb);
    }

    fn on_scan_progress(&self, files_found: usize, _current_path: &str) {
        if let Ok(guard) = self.bar.lock() {
            if let Some(pb) = guard.as_ref() {
                pb.set_message(format!("Scanning... {} files found", files_found));
            }
        }
    }

    fn on_scan_complete(&self, total_files: usize, duration_secs: f64) {
        self.finish_bar();
        eprintln!(
            "  \x1b[32m✓\x1b[0m Scan complete: {} files in {:.2}s",
            total_files, duration_secs
        );
    }

    fn on_analyze_start(&self, total_files: usize) {
        self.start_bar("Analyzing", "files", total_files);
    }

    fn on_analyze_progress(&self, files_done: usize, total_files: usize) {
        self.update(files_done, total_files);
    }

    fn on_analyze_complete(&self, processed: usize, duration_secs: f64) {
        self.finish_bar();
        eprintln!(
            "  \x1b[32m✓\x1b[0m Analysis complete: {} files in {:.2}s",
            processed, duration_secs
        );
    }

    fn on_similarity_start(&self, total_pairs: usize) {
        self.start_bar("Comparing", "pairs", total_pairs);
    }

    fn on_similarity_progress(&self, pairs_done: usize, total_pairs: usize) {
        self.update(pairs_done, total_pairs);
    }

    fn on_similarity_complete(&self, matches: usize, duration_secs: f64) {
        self.finish_bar();
        eprintln!(
            "  \x1b[32m✓\x1b[0m Comparison complete: {} similar pairs in {:.2}s",
            matches, duration_secs
        );
    }

    fn on_move_start(&self, total_moves: usize) {
        self.start_bar("Moving", "files", total_moves);
    }

    fn on_move_progress(&self, moves_done: usize, total_moves: usize) {
        self.update(moves_done, total_moves);
    }

    fn on_move_complete(&self, moved: usize, failed: usize, duration_secs: f64) {
        self.finish_bar();
        eprintln!(
            "  \x1b[32m✓\x1b[0m Moves complete: {} moved, {} failed in {:.2}s",
            moved, failed, duration_secs
        );
    }
}
