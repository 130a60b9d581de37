//! Serial extraction from EL image file names.
//!
//! The serial is positional: the first [`SERIAL_LEN`] characters of the file
//! stem. Short stems fail instead of producing a shorter key, because a
//! shorter key would match unrelated serials in the record store.

use serde::Serialize;
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// Number of characters in a serial key.
pub const SERIAL_LEN: usize = 20;

/// Extensions (lowercase) recognised as EL images.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg"];

/// A 20-character serial key. Opaque; no charset is enforced.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct SerialKey(String);

impl SerialKey {
    /// Wrap an existing serial, checking only its length.
    pub fn new(serial: impl Into<String>) -> Result<Self, ExtractionError> {
        let serial = serial.into();
        let len = serial.chars().count();
        if len != SERIAL_LEN {
            return Err(ExtractionError::WrongLength { serial, len });
        }
        Ok(Self(serial))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SerialKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SerialKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Why a serial could not be extracted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionError {
    #[error("'{file_name}' is not a .jpg/.jpeg image")]
    NotAnImage { file_name: String },

    #[error("stem '{stem}' of '{file_name}' has {len} characters, a serial needs {}", SERIAL_LEN)]
    StemTooShort {
        file_name: String,
        stem: String,
        len: usize,
    },

    #[error("serial '{serial}' has {len} characters, expected {}", SERIAL_LEN)]
    WrongLength { serial: String, len: usize },

    #[error("file name is not valid UTF-8: {0}")]
    NonUtf8(String),
}

/// Strip any directory component, accepting both `/` and `\` separators.
fn base_name(file_name: &str) -> &str {
    file_name
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or(file_name)
}

/// Return the stem of an image file name, or `None` if the extension is not
/// a recognised image extension (case-insensitive).
pub fn image_stem(file_name: &str) -> Option<&str> {
    stem_of(base_name(file_name))
}

fn stem_of(name: &str) -> Option<&str> {
    let (stem, ext) = name.rsplit_once('.')?;
    IMAGE_EXTENSIONS
        .iter()
        .any(|known| ext.eq_ignore_ascii_case(known))
        .then_some(stem)
}

/// Whether a path names a recognised image file (by extension only).
pub fn is_image_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
        .unwrap_or(false)
}

/// Extract the serial key from a file name (with or without a directory part).
pub fn extract_serial(file_name: &str) -> Result<SerialKey, ExtractionError> {
    serial_from_name(base_name(file_name))
}

/// `name` is a bare file name; separators in it are ordinary characters.
fn serial_from_name(name: &str) -> Result<SerialKey, ExtractionError> {
    let stem = stem_of(name).ok_or_else(|| ExtractionError::NotAnImage {
        file_name: name.to_string(),
    })?;

    match stem.char_indices().nth(SERIAL_LEN) {
        Some((end, _)) => Ok(SerialKey(stem[..end].to_string())),
        None => {
            let len = stem.chars().count();
            if len == SERIAL_LEN {
                Ok(SerialKey(stem.to_string()))
            } else {
                Err(ExtractionError::StemTooShort {
                    file_name: name.to_string(),
                    stem: stem.to_string(),
                    len,
                })
            }
        }
    }
}

/// Extract the serial key from a filesystem path.
pub fn extract_serial_from_path(path: &Path) -> Result<SerialKey, ExtractionError> {
    let name = path
        .file_name()
        .ok_or_else(|| ExtractionError::NotAnImage {
            file_name: path.display().to_string(),
        })?;
    let name = name
        .to_str()
        .ok_or_else(|| ExtractionError::NonUtf8(name.to_string_lossy().into_owned()))?;
    serial_from_name(name)
}
