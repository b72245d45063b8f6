use crate::progress::ProgressReporter;
use glob::Pattern;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{error, warn};
use walkdir::WalkDir;

/// Compile ignore globs, logging and dropping the invalid ones.
pub fn compile_patterns(ignore_globs: &[String]) -> Vec<Pattern> {
    ignore_globs
        .iter()
        .filter_map(|glob| match Pattern::new(glob) {
            Ok(p) => Some(p),
            Err(e) => {
                error!("Invalid glob pattern '{}': {}", glob, e);
                None
            }
        })
        .collect()
}

/// Absolute form of `path` with symlinks resolved, so differently spelled
/// paths to the same directory compare equal. Paths that do not exist fall
/// back to a plain absolute path.
fn normalize(path: &Path) -> PathBuf {
    path.canonicalize()
        .or_else(|_| std::path::absolute(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

/// Recursive traversal of `root` returning every regular file, sorted by path.
///
/// Entries matching an ignore pattern are pruned, as are the `excluded` paths
/// (and everything below them), however either side is spelled. Symlinks are
/// not followed. Unreadable entries are logged and skipped. Each file found is
/// reported through `on_scan_progress`.
pub fn collect_files(
    root: &Path,
    ignore_globs: &[String],
    excluded: &[PathBuf],
    reporter: &dyn ProgressReporter,
) -> io::Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("{} is not a directory", root.display()),
        ));
    }

    let ignore_patterns = compile_patterns(ignore_globs);
    let root_abs = normalize(root);
    let excluded: Vec<PathBuf> = excluded.iter().map(|ex| normalize(ex)).collect();
    let mut files = Vec::new();

    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            let path = entry.path();
            if !excluded.is_empty() {
                let abs = root_abs.join(path.strip_prefix(root).unwrap_or(path));
                if excluded.iter().any(|ex| abs.starts_with(ex)) {
                    return false;
                }
            }
            !ignore_patterns
                .iter()
                .any(|pattern| pattern.matches_path(path))
        });

    for entry_result in walker {
        let entry = match entry_result {
            Ok(entry) => entry,
            Err(err) => {
                let path = err
                    .path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default();
                if err
                    .io_error()
                    .map(|e| e.kind() == io::ErrorKind::PermissionDenied)
                    .unwrap_or(false)
                {
                    error!("Access denied reading {}: {}", path, err);
                } else {
                    warn!("Error walking {}: {}", path, err);
                }
                continue;
            }
        };

        if entry.file_type().is_file() {
            reporter.on_scan_progress(files.len() + 1, &entry.path().to_string_lossy());
            files.push(entry.into_path());
        }
    }

    files.sort();
    Ok(files)
}
