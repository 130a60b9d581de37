//! Run-level error types.
//!
//! These abort a run before any file is processed. Everything that can go
//! wrong for a single file is reported through its outcome instead.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelocError {
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("Cannot enumerate {path}: {source}")]
    Enumerate {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Config error: {0}")]
    Config(String),

    #[error("Record store error: {0}")]
    RecordStore(#[from] elreloc_db::DbError),

    #[error("Path translation error: {0}")]
    Translation(#[from] crate::translate::PathTranslationError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, RelocError>;
