//! Storage path → transport path translation.
//!
//! The record store names files in its own grammar (`/EL/<GROUP>/<FILE>`);
//! the relocator needs the share grammar (`\\server\share\<GROUP>\<FILE>`).
//! Translation is a prefix substitution plus separator normalisation of the
//! remainder. Paths outside the storage prefix are errors, never passed
//! through.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// A path as stored in the record store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct StoragePath(String);

impl StoragePath {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StoragePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A destination path in the transport (share) grammar.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TransportPath(String);

impl TransportPath {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Hand the path to the filesystem layer.
    pub fn to_path_buf(&self) -> PathBuf {
        PathBuf::from(&self.0)
    }
}

impl From<String> for TransportPath {
    /// Wrap a path that is already in the transport grammar.
    fn from(path: String) -> Self {
        Self(path)
    }
}

impl fmt::Display for TransportPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Path separator of the transport grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Separator {
    #[serde(rename = "\\")]
    Backslash,
    #[serde(rename = "/")]
    Slash,
}

impl Separator {
    pub fn as_char(self) -> char {
        match self {
            Separator::Backslash => '\\',
            Separator::Slash => '/',
        }
    }

    /// Backslash if the prefix contains one (UNC, drive paths), else slash.
    pub fn infer(transport_prefix: &str) -> Self {
        if transport_prefix.contains('\\') {
            Separator::Backslash
        } else {
            Separator::Slash
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathTranslationError {
    #[error("storage path '{path}' is outside the configured prefix '{prefix}'")]
    OutsidePrefix { path: String, prefix: String },

    #[error("storage prefix must not be empty")]
    EmptyStoragePrefix,

    #[error("transport prefix must not be empty")]
    EmptyTransportPrefix,
}

/// Prefix-mapping rule between the two grammars.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTranslator {
    storage_prefix: String,
    transport_prefix: String,
    separator: Separator,
}

impl PathTranslator {
    /// Build a translator, inferring the transport separator from the prefix.
    pub fn new(
        storage_prefix: impl Into<String>,
        transport_prefix: impl Into<String>,
    ) -> Result<Self, PathTranslationError> {
        let transport_prefix = transport_prefix.into();
        let separator = Separator::infer(&transport_prefix);
        Self::with_separator(storage_prefix, transport_prefix, separator)
    }

    pub fn with_separator(
        storage_prefix: impl Into<String>,
        transport_prefix: impl Into<String>,
        separator: Separator,
    ) -> Result<Self, PathTranslationError> {
        let storage_prefix = storage_prefix.into();
        let transport_prefix = transport_prefix.into();
        if storage_prefix.is_empty() {
            return Err(PathTranslationError::EmptyStoragePrefix);
        }
        if transport_prefix.is_empty() {
            return Err(PathTranslationError::EmptyTransportPrefix);
        }
        Ok(Self {
            storage_prefix,
            transport_prefix,
            separator,
        })
    }

    pub fn separator(&self) -> Separator {
        self.separator
    }

    /// Translate a storage path into the transport grammar.
    ///
    /// The prefix only matches at a path component boundary, so `/EL` does
    /// not claim `/ELX/...`.
    pub fn translate(&self, path: &StoragePath) -> Result<TransportPath, PathTranslationError> {
        let remainder = path
            .as_str()
            .strip_prefix(&self.storage_prefix)
            .filter(|rest| self.at_boundary(rest))
            .ok_or_else(|| PathTranslationError::OutsidePrefix {
                path: path.as_str().to_string(),
                prefix: self.storage_prefix.clone(),
            })?;

        let sep = self.separator.as_char();
        let mut out = String::with_capacity(self.transport_prefix.len() + remainder.len());
        out.push_str(&self.transport_prefix);
        out.extend(
            remainder
                .chars()
                .map(|c| if is_separator(c) { sep } else { c }),
        );
        Ok(TransportPath(out))
    }

    fn at_boundary(&self, remainder: &str) -> bool {
        self.storage_prefix.ends_with(is_separator)
            || remainder.is_empty()
            || remainder.starts_with(is_separator)
    }
}

fn is_separator(c: char) -> bool {
    c == '/' || c == '\\'
}
