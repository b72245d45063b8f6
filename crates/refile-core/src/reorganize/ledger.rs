//! Persisted record of the moves performed by an apply.
//!
//! The ledger lives next to the category directories as
//! `.refile-ledger.json`. Every move is written as `pending` before the file
//! is touched and flipped to `completed` afterwards, so a crash mid-apply
//! leaves enough on disk for rollback to find every file. Writes go to a temp
//! file that is synced and renamed over the ledger.

use crate::error::Error;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

pub const LEDGER_FILE_NAME: &str = ".refile-ledger.json";
const LEDGER_TEMP_FILE_NAME: &str = ".refile-ledger.json.tmp";
const LEDGER_FORMAT_VERSION: u32 = 1;

/// True for the ledger file and its temp file.
pub fn is_ledger_file(path: &Path) -> bool {
    path.file_name()
        .map(|n| n == LEDGER_FILE_NAME || n == LEDGER_TEMP_FILE_NAME)
        .unwrap_or(false)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveState {
    /// Written before the move; the move may or may not have happened.
    Pending,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRecord {
    pub original_path: PathBuf,
    pub destination_path: PathBuf,
    pub state: MoveState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub moved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LedgerDocument {
    version: u32,
    base_output_dir: PathBuf,
    created_at: DateTime<Utc>,
    /// Directories created by the apply, in creation order.
    created_dirs: Vec<PathBuf>,
    moves: Vec<MoveRecord>,
}

#[derive(Debug)]
pub struct MoveLedger {
    path: PathBuf,
    doc: LedgerDocument,
}

impl MoveLedger {
    pub fn path_for(base_output_dir: &Path) -> PathBuf {
        base_output_dir.join(LEDGER_FILE_NAME)
    }

    /// Empty ledger for `base_output_dir`. Nothing is written until the first
    /// mutation.
    pub fn fresh(base_output_dir: &Path) -> Self {
        Self {
            path: Self::path_for(base_output_dir),
            doc: LedgerDocument {
                version: LEDGER_FORMAT_VERSION,
                base_output_dir: base_output_dir.to_path_buf(),
                created_at: Utc::now(),
                created_dirs: Vec::new(),
                moves: Vec::new(),
            },
        }
    }

    /// Load the ledger persisted under `base_output_dir`, or an empty one.
    pub fn open(base_output_dir: &Path) -> Result<Self, Error> {
        let path = Self::path_for(base_output_dir);
        let json = match fs::read_to_string(&path) {
            Ok(json) => json,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Ok(Self::fresh(base_output_dir));
            }
            Err(e) => return Err(e.into()),
        };
        let doc: LedgerDocument = serde_json::from_str(&json)?;
        debug!(
            "Loaded ledger {} with {} moves",
            path.display(),
            doc.moves.len()
        );
        Ok(Self { path, doc })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.doc.created_at
    }

    /// No moves recorded, pending or completed.
    pub fn is_empty(&self) -> bool {
        self.doc.moves.is_empty()
    }

    /// Nothing left to undo: no moves and no created directories.
    pub fn is_clear(&self) -> bool {
        self.doc.moves.is_empty() && self.doc.created_dirs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.doc.moves.len()
    }

    pub fn entries(&self) -> &[MoveRecord] {
        &self.doc.moves
    }

    /// Completed moves only.
    pub fn records(&self) -> impl Iterator<Item = &MoveRecord> {
        self.doc
            .moves
            .iter()
            .filter(|m| m.state == MoveState::Completed)
    }

    pub fn created_dirs(&self) -> &[PathBuf] {
        &self.doc.created_dirs
    }

    pub(crate) fn record_created_dir(&mut self, dir: &Path) -> Result<(), Error> {
        self.doc.created_dirs.push(dir.to_path_buf());
        self.persist()
    }

    pub(crate) fn set_created_dirs(&mut self, dirs: Vec<PathBuf>) {
        self.doc.created_dirs = dirs;
    }

    /// Write-ahead entry for a move about to happen. Returns its index.
    pub(crate) fn begin(&mut self, original: &Path, destination: &Path) -> Result<usize, Error> {
        self.doc.moves.push(MoveRecord {
            original_path: original.to_path_buf(),
            destination_path: destination.to_path_buf(),
            state: MoveState::Pending,
            moved_at: None,
        });
        self.persist()?;
        Ok(self.doc.moves.len() - 1)
    }

    pub(crate) fn complete(&mut self, index: usize) -> Result<MoveRecord, Error> {
        let record = &mut self.doc.moves[index];
        record.state = MoveState::Completed;
        record.moved_at = Some(Utc::now());
        let record = record.clone();
        self.persist()?;
        Ok(record)
    }

    /// Drop the entry of a move that did not happen.
    pub(crate) fn abandon(&mut self, index: usize) -> Result<(), Error> {
        self.doc.moves.remove(index);
        self.persist()
    }

    pub(crate) fn replace_moves(&mut self, moves: Vec<MoveRecord>) {
        self.doc.moves = moves;
    }

    /// Write the ledger, or remove its file once nothing is left to undo.
    pub fn persist(&self) -> Result<(), Error> {
        if self.is_clear() {
            return self.remove_file();
        }

        let json = serde_json::to_string_pretty(&self.doc)?;
        let temp_path = self.path.with_file_name(LEDGER_TEMP_FILE_NAME);
        {
            let mut file = File::create(&temp_path)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&temp_path, &self.path)?;
        trace!("Persisted ledger with {} moves", self.doc.moves.len());
        Ok(())
    }

    /// Forget every entry and delete the ledger file.
    pub(crate) fn clear(&mut self) -> Result<(), Error> {
        self.doc.moves.clear();
        self.doc.created_dirs.clear();
        self.doc.created_at = Utc::now();
        self.remove_file()
    }

    fn remove_file(&self) -> Result<(), Error> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_write_ahead_round_trip() {
        let dir = tempdir().unwrap();
        let base = dir.path();

        let mut ledger = MoveLedger::fresh(base);
        assert!(!MoveLedger::path_for(base).exists());

        let idx = ledger
            .begin(Path::new("/src/a.txt"), &base.join("Docs/a.txt"))
            .unwrap();
        let on_disk = MoveLedger::open(base).unwrap();
        assert_eq!(on_disk.entries()[0].state, MoveState::Pending);
        assert_eq!(on_disk.records().count(), 0);

        ledger.complete(idx).unwrap();
        let on_disk = MoveLedger::open(base).unwrap();
        assert_eq!(on_disk.records().count(), 1);
        assert!(on_disk.entries()[0].moved_at.is_some());
        assert!(!base.join(LEDGER_TEMP_FILE_NAME).exists());
    }

    #[test]
    fn test_abandon_and_clear_remove_file() {
        let dir = tempdir().unwrap();
        let base = dir.path();

        let mut ledger = MoveLedger::fresh(base);
        let idx = ledger
            .begin(Path::new("/src/a.txt"), &base.join("a.txt"))
            .unwrap();
        assert!(ledger.path().exists());
        ledger.abandon(idx).unwrap();
        assert!(!ledger.path().exists());

        ledger.record_created_dir(&base.join("Docs")).unwrap();
        assert!(ledger.path().exists());
        ledger.clear().unwrap();
        assert!(!ledger.path().exists());
        assert!(MoveLedger::open(base).unwrap().is_clear());
    }

    #[test]
    fn test_is_ledger_file() {
        assert!(is_ledger_file(Path::new("/out/.refile-ledger.json")));
        assert!(is_ledger_file(Path::new("/out/.refile-ledger.json.tmp")));
        assert!(!is_ledger_file(Path::new("/out/ledger.json")));
    }
}
