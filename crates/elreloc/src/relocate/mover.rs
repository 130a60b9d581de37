//! No-overwrite file move with a verified copy fallback.
//!
//! A same-volume move is a single `rename`. When that fails (typically a
//! different volume or a network share), the file is streamed into a hidden
//! temporary sibling of the destination, checked against the source, and
//! only then published under its final name. The source is deleted last, so
//! at every point either the source or a complete destination exists.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

const COPY_BUFFER_SIZE: usize = 256 * 1024;

#[derive(Debug, Error)]
pub enum MoveError {
    #[error("destination already exists")]
    DestinationExists,

    #[error("destination directory {0} does not exist")]
    MissingDirectory(PathBuf),

    #[error("destination has no parent directory")]
    NoParent,

    #[error("{stage}: {source}")]
    Io {
        stage: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("copy verification failed: {0}")]
    VerificationFailed(String),

    #[error("destination was written but the source could not be removed and was kept: {0}")]
    SourceRetained(#[source] io::Error),
}

impl MoveError {
    fn io(stage: &'static str) -> impl FnOnce(io::Error) -> MoveError {
        move |source| MoveError::Io { stage, source }
    }
}

/// How a successful move was carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveMethod {
    Rename,
    VerifiedCopy,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MoveOptions {
    /// Create the destination directory tree when it is missing.
    pub create_missing_dirs: bool,
}

/// Filesystem steps that can fail independently of the copy itself.
#[derive(Clone, Copy)]
struct FileOps {
    rename: fn(&Path, &Path) -> io::Result<()>,
    remove: fn(&Path) -> io::Result<()>,
    /// Length and hash of the written copy.
    reread: fn(&Path) -> io::Result<(u64, blake3::Hash)>,
}

impl FileOps {
    const STD: FileOps = FileOps {
        rename: rename_file,
        remove: remove_file,
        reread: hash_file,
    };
}

fn rename_file(from: &Path, to: &Path) -> io::Result<()> {
    fs::rename(from, to)
}

fn remove_file(path: &Path) -> io::Result<()> {
    fs::remove_file(path)
}

/// Move `source` to `destination` without ever replacing an existing file.
pub fn move_file(source: &Path, destination: &Path, options: MoveOptions) -> Result<MoveMethod, MoveError> {
    move_file_with(source, destination, options, FileOps::STD)
}

fn move_file_with(
    source: &Path,
    destination: &Path,
    options: MoveOptions,
    ops: FileOps,
) -> Result<MoveMethod, MoveError> {
    if exists(destination) {
        return Err(MoveError::DestinationExists);
    }

    let parent = destination
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .ok_or(MoveError::NoParent)?;
    if !parent.is_dir() {
        if !options.create_missing_dirs {
            return Err(MoveError::MissingDirectory(parent.to_path_buf()));
        }
        fs::create_dir_all(parent).map_err(MoveError::io("create destination directory"))?;
        debug!(dir = %parent.display(), "Created destination directory");
    }

    match (ops.rename)(source, destination) {
        Ok(()) => return Ok(MoveMethod::Rename),
        Err(err) => {
            debug!(
                source = %source.display(),
                destination = %destination.display(),
                error = %err,
                "Rename failed, falling back to verified copy"
            );
        }
    }

    copy_verify_publish(source, destination, parent, ops)?;

    (ops.remove)(source).map_err(MoveError::SourceRetained)?;
    Ok(MoveMethod::VerifiedCopy)
}

fn exists(path: &Path) -> bool {
    // symlink_metadata so a dangling link still counts as occupied
    fs::symlink_metadata(path).is_ok()
}

/// Removes the temporary file unless the copy was published.
struct TempFile {
    path: PathBuf,
    published: bool,
}

impl Drop for TempFile {
    fn drop(&mut self) {
        if self.published {
            return;
        }
        if let Err(err) = fs::remove_file(&self.path) {
            if err.kind() != io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %err, "Failed to remove temporary file");
            }
        }
    }
}

fn temp_path(destination: &Path, parent: &Path) -> PathBuf {
    let name = destination
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    parent.join(format!(".{}.{}.elreloc-tmp", name, std::process::id()))
}

fn copy_verify_publish(
    source: &Path,
    destination: &Path,
    parent: &Path,
    ops: FileOps,
) -> Result<(), MoveError> {
    let mut input = File::open(source).map_err(MoveError::io("open source"))?;
    let source_len = input
        .metadata()
        .map_err(MoveError::io("read source metadata"))?
        .len();

    let path = temp_path(destination, parent);
    let mut output = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .map_err(MoveError::io("create temporary file"))?;
    let mut temp = TempFile {
        path,
        published: false,
    };

    let (copied, source_hash) = {
        let mut hasher = blake3::Hasher::new();
        let mut buffer = vec![0u8; COPY_BUFFER_SIZE];
        let mut copied = 0u64;
        loop {
            let n = input.read(&mut buffer).map_err(MoveError::io("read source"))?;
            if n == 0 {
                break;
            }
            output
                .write_all(&buffer[..n])
                .map_err(MoveError::io("write temporary file"))?;
            hasher.update(&buffer[..n]);
            copied += n as u64;
        }
        (copied, hasher.finalize())
    };
    output.flush().map_err(MoveError::io("flush temporary file"))?;
    output.sync_all().map_err(MoveError::io("sync temporary file"))?;
    drop(output);

    if copied != source_len {
        return Err(MoveError::VerificationFailed(format!(
            "source is {} bytes but {} were copied",
            source_len, copied
        )));
    }

    let (written_len, written_hash) =
        (ops.reread)(&temp.path).map_err(MoveError::io("re-read temporary file"))?;
    if written_len != source_len || written_hash != source_hash {
        return Err(MoveError::VerificationFailed(format!(
            "source {} ({} bytes), copy {} ({} bytes)",
            source_hash.to_hex(),
            source_len,
            written_hash.to_hex(),
            written_len
        )));
    }

    // the destination may have appeared while copying
    if exists(destination) {
        return Err(MoveError::DestinationExists);
    }
    (ops.rename)(&temp.path, destination).map_err(MoveError::io("publish copy"))?;
    temp.published = true;

    debug!(
        destination = %destination.display(),
        bytes = source_len,
        blake3 = %source_hash.to_hex(),
        "Copy verified and published"
    );
    Ok(())
}

fn hash_file(path: &Path) -> io::Result<(u64, blake3::Hash)> {
    let mut file = File::open(path)?;
    let mut hasher = blake3::Hasher::new();
    let mut buffer = vec![0u8; COPY_BUFFER_SIZE];
    let mut len = 0u64;
    loop {
        let n = file.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
        len += n as u64;
    }
    Ok((len, hasher.finalize()))
}
