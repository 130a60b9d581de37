//! Helpful error types for CLI commands
//!
//! Every error includes:
//! - What went wrong
//! - Context about the situation
//! - Suggestions for how to fix it

use elreloc::RelocError;
use std::fmt;
use std::path::Path;

/// An error with helpful context and suggestions
#[derive(Debug)]
pub struct HelpfulError {
    /// The main error message
    pub message: String,
    /// Additional context about what was happening
    pub context: Option<String>,
    /// Suggestions for how to fix the error
    pub suggestions: Vec<String>,
}

impl HelpfulError {
    /// Create a new helpful error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: None,
            suggestions: Vec::new(),
        }
    }

    /// Add context to the error
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Add multiple suggestions
    pub fn with_suggestions(mut self, suggestions: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.suggestions.extend(suggestions.into_iter().map(|s| s.into()));
        self
    }

    // === Common error constructors ===

    /// Path does not exist
    pub fn path_not_found(path: &Path) -> Self {
        Self::new(format!("Path not found: {}", path.display()))
            .with_context("The specified path does not exist on the filesystem")
            .with_suggestions([
                format!("TRY: Check that the path exists: ls -la {}", path.display()),
                "TRY: Verify you have read permissions for this path".to_string(),
                "TRY: Check for typos in the path".to_string(),
            ])
    }

    /// Path exists but is not a directory
    pub fn not_a_directory(path: &Path) -> Self {
        Self::new(format!("Not a directory: {}", path.display()))
            .with_context("The relocate command expects a directory of EL images")
            .with_suggestions([
                format!(
                    "TRY: Relocate the parent directory: elreloc relocate {}",
                    path.parent()
                        .map(|p| p.display().to_string())
                        .unwrap_or_else(|| ".".to_string())
                ),
                format!("TRY: Check the serial of a single file: elreloc serials {}", path.display()),
            ])
    }

    /// Directory cannot be listed
    pub fn cannot_enumerate(path: &Path, reason: &str) -> Self {
        Self::new(format!("Cannot read directory: {}", path.display()))
            .with_context(reason.to_string())
            .with_suggestions([
                format!("TRY: Check directory permissions: ls -la {}", path.display()),
                "TRY: Make sure the share or volume is mounted".to_string(),
            ])
    }

    /// Configuration missing or invalid
    pub fn config_error(details: &str) -> Self {
        Self::new(format!("Configuration error: {}", details))
            .with_context(format!(
                "Configuration is read from {} unless --config is given",
                elreloc::config::default_config_path().display()
            ))
            .with_suggestions([
                "TRY: Inspect the resolved configuration: elreloc config".to_string(),
                "TRY: Set ELRELOC_STORAGE_PREFIX, ELRELOC_TRANSPORT_PREFIX and ELRELOC_RECORD_STORE_DSN"
                    .to_string(),
                "TRY: Pass an explicit file: elreloc relocate <DIR> --config relocator.toml".to_string(),
            ])
    }

    /// Record store unreachable or misconfigured
    pub fn record_store_error(details: &str) -> Self {
        Self::new(format!("Cannot use the record store: {}", details))
            .with_context("The record store is needed to resolve serials to storage paths")
            .with_suggestions([
                "TRY: Check record_store_dsn with: elreloc config".to_string(),
                "TRY: Verify the database host is reachable from this machine".to_string(),
                "TRY: Check [record_store] table and column names".to_string(),
                "TRY: Work offline from an export: elreloc relocate <DIR> --records records.csv".to_string(),
            ])
    }

    /// Output file cannot be written
    pub fn cannot_write_file(path: &Path, reason: &str) -> Self {
        Self::new(format!("Cannot write file: {}", path.display()))
            .with_context(reason.to_string())
            .with_suggestions([
                format!(
                    "TRY: Check that the directory exists and is writable: ls -la {}",
                    path.parent()
                        .map(|p| p.display().to_string())
                        .unwrap_or_else(|| ".".to_string())
                ),
            ])
    }
}

impl From<RelocError> for HelpfulError {
    fn from(err: RelocError) -> Self {
        match &err {
            RelocError::PathNotFound(path) => Self::path_not_found(path),
            RelocError::NotADirectory(path) => Self::not_a_directory(path),
            RelocError::Enumerate { path, source } => Self::cannot_enumerate(path, &source.to_string()),
            RelocError::Config(details) => Self::config_error(details),
            RelocError::Translation(inner) => Self::config_error(&inner.to_string()),
            RelocError::RecordStore(inner) => Self::record_store_error(&inner.to_string()),
            RelocError::Io(inner) => Self::new(format!("IO error: {}", inner)),
        }
    }
}

impl fmt::Display for HelpfulError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ERROR: {}", self.message)?;

        if let Some(ctx) = &self.context {
            writeln!(f, "CONTEXT: {}", ctx)?;
        }

        if !self.suggestions.is_empty() {
            writeln!(f)?;
            for suggestion in &self.suggestions {
                writeln!(f, "  {}", suggestion)?;
            }
        }

        Ok(())
    }
}

impl std::error::Error for HelpfulError {}
