use crate::error::MetadataError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Fixed year length used for `inferred_year`. Ignores leap years, so files
/// created near a year boundary can be attributed to the neighbouring year.
pub const SECONDS_PER_YEAR: i64 = 31_536_000;
pub const EPOCH_YEAR: i32 = 1970;

/// Snapshot of one file's filesystem attributes, taken at scan time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileRecord {
    pub path: PathBuf,
    pub name: String,
    /// Suffix without the leading dot, empty when the file has none.
    pub extension: String,
    pub size_bytes: u64,
    /// Unix seconds. Falls back to the modification time where the platform
    /// has no birth time.
    pub created_at: i64,
    pub modified_at: i64,
    pub inferred_year: i32,
}

impl FileRecord {
    pub fn stem(&self) -> &str {
        self.path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.name)
    }
}

pub fn infer_year(created_at: i64) -> i32 {
    (created_at.div_euclid(SECONDS_PER_YEAR)) as i32 + EPOCH_YEAR
}

fn unix_seconds(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_secs() as i64,
        Err(e) => -(e.duration().as_secs() as i64),
    }
}

/// Read the attributes of a regular file. Read-only.
pub fn extract(path: &Path) -> Result<FileRecord, MetadataError> {
    let metadata = fs::metadata(path).map_err(|e| MetadataError::new(path, e))?;
    if !metadata.is_file() {
        return Err(MetadataError::new(
            path,
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a regular file"),
        ));
    }

    let modified_at = metadata
        .modified()
        .map(unix_seconds)
        .map_err(|e| MetadataError::new(path, e))?;
    let created_at = metadata.created().map(unix_seconds).unwrap_or(modified_at);

    let name = path
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_default();

    Ok(FileRecord {
        path: path.to_path_buf(),
        name,
        extension,
        size_bytes: metadata.len(),
        created_at,
        modified_at,
        inferred_year: infer_year(created_at),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_extract_text_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        fs::write(&path, "sample work document").unwrap();

        let record = extract(&path).unwrap();
        assert_eq!(record.name, "notes.txt");
        assert_eq!(record.extension, "txt");
        assert_eq!(record.stem(), "notes");
        assert_eq!(record.size_bytes, 20);
        assert!(record.inferred_year >= 2020);
        assert_eq!(record.inferred_year, infer_year(record.created_at));
    }

    #[test]
    fn test_extract_missing_file() {
        let dir = tempdir().unwrap();
        let err = extract(&dir.path().join("gone.txt")).unwrap_err();
        assert!(err.path.ends_with("gone.txt"));
    }

    #[test]
    fn test_extract_directory_is_error() {
        let dir = tempdir().unwrap();
        assert!(extract(dir.path()).is_err());
    }

    #[test]
    fn test_infer_year_approximation() {
        assert_eq!(infer_year(0), 1970);
        assert_eq!(infer_year(SECONDS_PER_YEAR - 1), 1970);
        assert_eq!(infer_year(SECONDS_PER_YEAR), 1971);
        assert_eq!(infer_year(1_704_067_200), 2024);
        // 2023-12-25: ignored leap days push late December into the next year.
        assert_eq!(infer_year(1_703_462_400), 2024);
    }
}
