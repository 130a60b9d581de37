//! Per-file outcomes and the run summary.

use crate::serial::SerialKey;
use crate::translate::{StoragePath, TransportPath};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// Why a file was left in place without being an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// The record store has no entry for the serial.
    NotFound,
    /// Something already occupies the destination path.
    DestinationExists { destination: TransportPath },
    /// The run was cancelled before this file was started.
    Cancelled,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NotFound => write!(f, "no record for serial"),
            SkipReason::DestinationExists { destination } => {
                write!(f, "destination exists: {}", destination)
            }
            SkipReason::Cancelled => write!(f, "cancelled before start"),
        }
    }
}

/// Why a file could not be relocated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum FailureReason {
    /// No serial could be derived from the file name.
    Extraction { message: String },
    /// The directory entry could not be read.
    Enumeration { message: String },
    /// More than one storage path is recorded for the serial.
    AmbiguousMatch { candidates: Vec<StoragePath> },
    /// The record store query failed.
    Lookup { message: String },
    /// The storage path lies outside the configured prefix.
    PathTranslation { message: String },
    /// The filesystem operation failed.
    Relocation {
        destination: TransportPath,
        message: String,
    },
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Extraction { message } => write!(f, "extraction: {}", message),
            FailureReason::Enumeration { message } => write!(f, "enumeration: {}", message),
            FailureReason::AmbiguousMatch { candidates } => {
                write!(f, "ambiguous match: ")?;
                for (idx, candidate) in candidates.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", candidate)?;
                }
                Ok(())
            }
            FailureReason::Lookup { message } => write!(f, "lookup: {}", message),
            FailureReason::PathTranslation { message } => write!(f, "path translation: {}", message),
            FailureReason::Relocation {
                destination,
                message,
            } => write!(f, "relocation to {}: {}", destination, message),
        }
    }
}

/// Terminal state of one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RelocationOutcome {
    Moved { destination: TransportPath },
    /// Dry-run: the file would be moved here.
    Planned { destination: TransportPath },
    Skipped(SkipReason),
    Failed(FailureReason),
}

impl RelocationOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            RelocationOutcome::Moved { .. } => "moved",
            RelocationOutcome::Planned { .. } => "planned",
            RelocationOutcome::Skipped(_) => "skipped",
            RelocationOutcome::Failed(_) => "failed",
        }
    }

    /// Human-readable detail: the destination or the reason.
    pub fn detail(&self) -> String {
        match self {
            RelocationOutcome::Moved { destination } | RelocationOutcome::Planned { destination } => {
                destination.to_string()
            }
            RelocationOutcome::Skipped(reason) => reason.to_string(),
            RelocationOutcome::Failed(reason) => reason.to_string(),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, RelocationOutcome::Failed(_))
    }
}

/// One reported row: the source file, its serial if one was extracted, and
/// what happened to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileReport {
    pub source: PathBuf,
    pub serial: Option<SerialKey>,
    pub outcome: RelocationOutcome,
}

/// Counts per terminal state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub moved: usize,
    pub planned: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl RunSummary {
    pub fn from_reports(reports: &[FileReport]) -> Self {
        let mut summary = Self::default();
        for report in reports {
            summary.record(&report.outcome);
        }
        summary
    }

    pub fn record(&mut self, outcome: &RelocationOutcome) {
        self.total += 1;
        match outcome {
            RelocationOutcome::Moved { .. } => self.moved += 1,
            RelocationOutcome::Planned { .. } => self.planned += 1,
            RelocationOutcome::Skipped(_) => self.skipped += 1,
            RelocationOutcome::Failed(_) => self.failed += 1,
        }
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} files: {} moved, {} planned, {} skipped, {} failed",
            self.total, self.moved, self.planned, self.skipped, self.failed
        )
    }
}

/// Result of a whole run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub dry_run: bool,
    pub cancelled: bool,
    pub summary: RunSummary,
    pub files: Vec<FileReport>,
}

impl RunReport {
    pub fn new(dry_run: bool, files: Vec<FileReport>) -> Self {
        let summary = RunSummary::from_reports(&files);
        let cancelled = files
            .iter()
            .any(|f| f.outcome == RelocationOutcome::Skipped(SkipReason::Cancelled));
        Self {
            dry_run,
            cancelled,
            summary,
            files,
        }
    }
}
