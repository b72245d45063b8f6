use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Metadata error: {0}")]
    Metadata(#[from] MetadataError),

    #[error("Classification error: {0}")]
    Classification(#[from] ClassificationError),

    #[error("Move error: {0}")]
    FileMove(#[from] FileMoveError),

    #[error("JSON error: {0}")]
    Ledger(#[from] serde_json::Error),
}

/// Malformed or incomplete configuration. Fatal at startup.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0}")]
    Source(#[from] config::ConfigError),

    #[error("configuration file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("invalid category name '{0}'")]
    InvalidCategory(String),

    #[error("invalid rule for category '{category}': {reason}")]
    InvalidRule { category: String, reason: String },

    #[error("invalid value for '{key}': {reason}")]
    InvalidValue { key: &'static str, reason: String },
}

/// Per-file stat failure between listing and extraction.
#[derive(Error, Debug)]
#[error("cannot read metadata for {}: {source}", path.display())]
pub struct MetadataError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

impl MetadataError {
    pub fn new(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self {
            path: path.into(),
            source,
        }
    }
}

/// Failure of the classification or similarity service for one call.
#[derive(Error, Debug, Clone)]
#[error("{service} failed: {message}")]
pub struct ClassificationError {
    pub service: &'static str,
    pub message: String,
}

impl ClassificationError {
    pub fn new(service: &'static str, message: impl Into<String>) -> Self {
        Self {
            service,
            message: message.into(),
        }
    }
}

/// A single file move that failed during apply or rollback.
#[derive(Error, Debug)]
#[error("cannot move {} to {}: {source}", from.display(), to.display())]
pub struct FileMoveError {
    pub from: PathBuf,
    pub to: PathBuf,
    #[source]
    pub source: io::Error,
}

impl FileMoveError {
    pub fn new(from: impl Into<PathBuf>, to: impl Into<PathBuf>, source: io::Error) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            source,
        }
    }
}
