//! Record table layout and the read-only lookup query built from it.
//!
//! Table and column names come from configuration and are interpolated into
//! SQL, so every name is validated first. Serial values are always bound.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;

const MAX_IDENTIFIER_LEN: usize = 128;

const FORBIDDEN_KEYWORDS: &[&str] = &[
    "SELECT", "INSERT", "UPDATE", "DELETE", "DROP", "CREATE", "ALTER", "TRUNCATE", "EXEC",
    "EXECUTE", "UNION", "ATTACH", "DETACH", "GRANT", "REVOKE",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifierError {
    message: String,
}

impl IdentifierError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for IdentifierError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error for IdentifierError {}

/// Where serials and storage paths live in the record store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSchema {
    /// Table name, optionally schema-qualified (`dbo.el_desh`)
    #[serde(default = "default_table")]
    pub table: String,
    #[serde(default = "default_serial_column")]
    pub serial_column: String,
    /// Column holding the storage path (or its directory part when
    /// `filename_column` is set)
    #[serde(default = "default_path_column")]
    pub path_column: String,
    /// Optional column holding the file name, joined onto `path_column`
    #[serde(default)]
    pub filename_column: Option<String>,
}

fn default_table() -> String {
    "el_desh".to_string()
}

fn default_serial_column() -> String {
    "serial_nbr".to_string()
}

fn default_path_column() -> String {
    "file_path".to_string()
}

impl Default for RecordSchema {
    fn default() -> Self {
        Self {
            table: default_table(),
            serial_column: default_serial_column(),
            path_column: default_path_column(),
            filename_column: None,
        }
    }
}

/// Placeholder style for the single bound parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    /// `?` (SQLite, MySQL)
    Question,
    /// `$1` (PostgreSQL)
    Dollar,
    /// `@P1` (SQL Server)
    AtP,
}

impl Placeholder {
    fn as_str(self) -> &'static str {
        match self {
            Placeholder::Question => "?",
            Placeholder::Dollar => "$1",
            Placeholder::AtP => "@P1",
        }
    }
}

impl RecordSchema {
    /// Validate every configured name.
    pub fn validate(&self) -> Result<(), IdentifierError> {
        validate_identifier(&self.table, true)?;
        validate_identifier(&self.serial_column, false)?;
        validate_identifier(&self.path_column, false)?;
        if let Some(column) = &self.filename_column {
            validate_identifier(column, false)?;
        }
        Ok(())
    }

    /// Build the lookup query. Columns come back as (path[, file_name]).
    pub fn lookup_sql(&self, placeholder: Placeholder) -> Result<String, IdentifierError> {
        self.validate()?;
        let columns = match &self.filename_column {
            Some(name) => format!("{}, {}", self.path_column, name),
            None => self.path_column.clone(),
        };
        Ok(format!(
            "SELECT DISTINCT {columns} FROM {table} WHERE {serial} = {param} ORDER BY {columns}",
            columns = columns,
            table = self.table,
            serial = self.serial_column,
            param = placeholder.as_str(),
        ))
    }
}

/// Join a directory-style path and a file name with `/` unless the directory
/// already ends in a separator.
pub fn join_storage_path(dir: &str, file_name: Option<&str>) -> String {
    match file_name.map(str::trim).filter(|name| !name.is_empty()) {
        None => dir.to_string(),
        Some(name) if dir.is_empty() => name.to_string(),
        Some(name) if dir.ends_with('/') || dir.ends_with('\\') => format!("{}{}", dir, name),
        Some(name) => format!("{}/{}", dir, name),
    }
}

/// Accepts `name` or (for tables) `schema.name`; each part must start with a
/// letter or underscore and contain only ASCII alphanumerics and underscores.
pub fn validate_identifier(ident: &str, allow_qualified: bool) -> Result<(), IdentifierError> {
    if ident.is_empty() {
        return Err(IdentifierError::new("Identifier is empty"));
    }
    if ident.len() > MAX_IDENTIFIER_LEN {
        return Err(IdentifierError::new(format!(
            "Identifier '{}' is longer than {} characters",
            ident, MAX_IDENTIFIER_LEN
        )));
    }

    let parts: Vec<&str> = ident.split('.').collect();
    if parts.len() > 2 || (parts.len() == 2 && !allow_qualified) {
        return Err(IdentifierError::new(format!(
            "Identifier '{}' has too many qualifiers",
            ident
        )));
    }

    for part in parts {
        let mut chars = part.chars();
        let first_ok = chars
            .next()
            .map(|c| c.is_ascii_alphabetic() || c == '_')
            .unwrap_or(false);
        if !first_ok || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(IdentifierError::new(format!(
                "Identifier '{}' must contain only letters, digits and underscores",
                ident
            )));
        }
        if FORBIDDEN_KEYWORDS.contains(&part.to_ascii_uppercase().as_str()) {
            return Err(IdentifierError::new(format!(
                "Identifier '{}' is a reserved keyword",
                ident
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_identifier_accepts_plain_and_qualified() {
        assert!(validate_identifier("serial_nbr", false).is_ok());
        assert!(validate_identifier("dbo.el_desh", true).is_ok());
        assert!(validate_identifier("_t1", false).is_ok());
    }

    #[test]
    fn test_validate_identifier_rejects_injection() {
        assert!(validate_identifier("", false).is_err());
        assert!(validate_identifier("dbo.el_desh", false).is_err());
        assert!(validate_identifier("a.b.c", true).is_err());
        assert!(validate_identifier("1abc", false).is_err());
        assert!(validate_identifier("x; DROP TABLE y", false).is_err());
        assert!(validate_identifier("name\"", false).is_err());
        assert!(validate_identifier("drop", false).is_err());
    }

    #[test]
    fn test_lookup_sql_single_column() {
        let schema = RecordSchema::default();
        let sql = schema.lookup_sql(Placeholder::Question).unwrap();
        assert_eq!(
            sql,
            "SELECT DISTINCT file_path FROM el_desh WHERE serial_nbr = ? ORDER BY file_path"
        );
    }

    #[test]
    fn test_lookup_sql_with_filename_column() {
        let schema = RecordSchema {
            table: "dbo.el_desh".to_string(),
            filename_column: Some("file_name".to_string()),
            ..RecordSchema::default()
        };
        let sql = schema.lookup_sql(Placeholder::AtP).unwrap();
        assert_eq!(
            sql,
            "SELECT DISTINCT file_path, file_name FROM dbo.el_desh WHERE serial_nbr = @P1 ORDER BY file_path, file_name"
        );
    }

    #[test]
    fn test_lookup_sql_rejects_bad_schema() {
        let schema = RecordSchema {
            path_column: "file_path--".to_string(),
            ..RecordSchema::default()
        };
        assert!(schema.lookup_sql(Placeholder::Dollar).is_err());
    }

    #[test]
    fn test_join_storage_path() {
        assert_eq!(join_storage_path("/EL/HEL001", Some("a.jpg")), "/EL/HEL001/a.jpg");
        assert_eq!(join_storage_path("/EL/HEL001/", Some("a.jpg")), "/EL/HEL001/a.jpg");
        assert_eq!(join_storage_path("/EL/HEL001/a.jpg", None), "/EL/HEL001/a.jpg");
        assert_eq!(join_storage_path("/EL/HEL001", Some("  ")), "/EL/HEL001");
        assert_eq!(join_storage_path("", Some("a.jpg")), "a.jpg");
    }
}
