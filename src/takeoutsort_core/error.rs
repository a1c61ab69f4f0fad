use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TakeoutError {
    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to place {source_path} into {destination}: {error}")]
    PlacementFailed {
        source_path: PathBuf,
        destination: PathBuf,
        error: std::io::Error,
    },

    // Filesystem errors
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    // Sidecar records
    #[error("Unparseable metadata record {path}: {reason}")]
    UnparseableRecord { path: PathBuf, reason: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // Metadata collaborator
    #[error("exiftool is not installed or not in PATH")]
    ExiftoolMissing,

    #[error("Exiftool error: {0}")]
    Exiftool(String),

    #[error("Found {0} corrupted or unreadable file(s)")]
    CorruptOutput(usize),

    // Worker pool
    #[error("Failed to build worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    // User interaction
    #[error("Operation cancelled by user")]
    Cancelled,

    #[error("Argument error: {0}")]
    Argument(String),
}

/// Result type for takeoutsort operations.
pub type Result<T> = std::result::Result<T, TakeoutError>;
