/// Trait for reporting pipeline progress.
///
/// The CLI implements it with indicatif bars. All methods have default no-op
/// implementations.
pub trait ProgressReporter: Send + Sync {
    fn on_scan_start(&self) {}
    fn on_scan_progress(&self, _files_found: usize, _current_path: &str) {}
    fn on_scan_complete(&self, _total_files: usize, _duration_secs: f64) {}
    fn on_analyze_start(&self, _total_files: usize) {}
    fn on_analyze_progress(&self, _files_done: usize, _total_files: usize) {}
    fn on_analyze_complete(&self, _processed: usize, _duration_secs: f64) {}
    fn on_similarity_start(&self, _total_pairs: usize) {}
    fn on_similarity_progress(&self, _pairs_done: usize, _total_pairs: usize) {}
    fn on_similarity_complete(&self, _matches: usize, _duration_secs: f64) {}
    fn on_move_start(&self, _total_moves: usize) {}
    fn on_move_progress(&self, _moves_done: usize, _total_moves: usize) {}
    fn on_move_complete(&self, _moved: usize, _failed: usize, _duration_secs: f64) {}
}

/// No-op progress reporter for silent operation.
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}
