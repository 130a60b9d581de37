//! Error types for the record store layer.

use thiserror::Error;

/// Record store operation result type.
pub type Result<T> = std::result::Result<T, DbError>;

/// Record store errors.
#[derive(Error, Debug)]
pub enum DbError {
    /// SQLx error (connection, query, decoding)
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// SQL Server driver error
    #[cfg(feature = "mssql")]
    #[error("SQL Server error: {0}")]
    Mssql(#[from] tiberius::error::Error),

    /// IO error (socket setup for drivers that need it)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// DSN scheme is not one this build can talk to
    #[error("Unsupported record store DSN '{dsn}': {reason}")]
    UnsupportedDsn { dsn: String, reason: String },

    /// Configured table or column name failed validation
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(#[from] crate::schema::IdentifierError),
}

impl DbError {
    /// Create an unsupported DSN error. The DSN is redacted before it is stored.
    pub fn unsupported_dsn(dsn: &str, reason: impl Into<String>) -> Self {
        Self::UnsupportedDsn {
            dsn: crate::dsn::redact_dsn(dsn),
            reason: reason.into(),
        }
    }
}
