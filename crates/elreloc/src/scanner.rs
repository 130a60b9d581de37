//! Image enumeration: the batch form of serial extraction.
//!
//! A scan yields one entry per JPEG, lazily, each carrying either its serial
//! or the per-file reason it has none. Only a root that cannot be listed at
//! all is fatal.

use crate::error::{RelocError, Result};
use crate::serial::{extract_serial_from_path, is_image_path, ExtractionError, SerialKey};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Why a scanned entry has no serial.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScanItemError {
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error("cannot read entry: {0}")]
    Unreadable(String),
}

/// One enumerated image.
#[derive(Debug, Clone)]
pub struct ScannedImage {
    pub path: PathBuf,
    pub serial: std::result::Result<SerialKey, ScanItemError>,
}

/// Directory scanning options.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScanOptions {
    /// Descend into subdirectories
    pub recursive: bool,
    /// Maximum depth below the root when recursive (None = unlimited)
    pub max_depth: Option<usize>,
}

/// Lazy iterator over the images in a directory.
pub struct ImageScan {
    walker: walkdir::IntoIter,
}

impl Iterator for ImageScan {
    type Item = ScannedImage;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.walker.next()? {
                Ok(entry) => {
                    let path = entry.path();
                    let is_file = entry.file_type().is_file()
                        || (entry.path_is_symlink() && path.is_file());
                    if !is_file || !is_image_path(path) {
                        continue;
                    }
                    let serial = extract_serial_from_path(path).map_err(ScanItemError::from);
                    if let Err(err) = &serial {
                        debug!(path = %path.display(), error = %err, "No serial for image");
                    }
                    return Some(ScannedImage {
                        path: entry.into_path(),
                        serial,
                    });
                }
                Err(err) => {
                    let Some(path) = err.path().map(Path::to_path_buf) else {
                        warn!(error = %err, "Skipping unreadable entry");
                        continue;
                    };
                    warn!(path = %path.display(), error = %err, "Unreadable entry");
                    return Some(ScannedImage {
                        path,
                        serial: Err(ScanItemError::Unreadable(err.to_string())),
                    });
                }
            }
        }
    }
}

/// Start scanning `root` for images.
///
/// Entries come back sorted by file name within each directory.
pub fn scan_images(root: &Path, options: ScanOptions) -> Result<ImageScan> {
    ensure_listable_dir(root)?;

    let max_depth = if options.recursive {
        options.max_depth.unwrap_or(usize::MAX)
    } else {
        1
    };

    let walker = WalkDir::new(root)
        .min_depth(1)
        .max_depth(max_depth)
        .sort_by_file_name()
        .into_iter();

    Ok(ImageScan { walker })
}

fn ensure_listable_dir(root: &Path) -> Result<()> {
    if !root.exists() {
        return Err(RelocError::PathNotFound(root.to_path_buf()));
    }
    if !root.is_dir() {
        return Err(RelocError::NotADirectory(root.to_path_buf()));
    }
    fs::read_dir(root).map_err(|source| RelocError::Enumerate {
        path: root.to_path_buf(),
        source,
    })?;
    Ok(())
}

/// Unique serials found under a path, plus the entries that had none.
#[derive(Debug, Default)]
pub struct SerialListing {
    pub serials: BTreeSet<SerialKey>,
    pub processed: Vec<(PathBuf, SerialKey)>,
    pub rejected: Vec<(PathBuf, ScanItemError)>,
}

/// Collect the serials of a single image file or of every image in a directory.
pub fn collect_serials(path: &Path, options: ScanOptions) -> Result<SerialListing> {
    let mut listing = SerialListing::default();

    if path.is_file() {
        if !is_image_path(path) {
            listing.rejected.push((
                path.to_path_buf(),
                ScanItemError::Extraction(ExtractionError::NotAnImage {
                    file_name: path.display().to_string(),
                }),
            ));
            return Ok(listing);
        }
        match extract_serial_from_path(path) {
            Ok(serial) => listing.record(path.to_path_buf(), serial),
            Err(err) => listing.rejected.push((path.to_path_buf(), err.into())),
        }
        return Ok(listing);
    }

    for image in scan_images(path, options)? {
        match image.serial {
            Ok(serial) => listing.record(image.path, serial),
            Err(err) => listing.rejected.push((image.path, err)),
        }
    }
    Ok(listing)
}

impl SerialListing {
    fn record(&mut self, path: PathBuf, serial: SerialKey) {
        self.serials.insert(serial.clone());
        self.processed.push((path, serial));
    }
}
