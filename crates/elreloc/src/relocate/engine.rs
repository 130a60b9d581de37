//! The per-file relocation state machine.
//!
//! Each file walks `Pending → Extracted → Resolved → Translated` and ends in
//! exactly one [`RelocationOutcome`]. Files are independent: a failure is
//! recorded and the run moves on.

use super::mover::{move_file, MoveError, MoveMethod, MoveOptions};
use super::outcome::{FailureReason, FileReport, RelocationOutcome, RunReport, SkipReason};
use crate::error::Result;
use crate::lookup::{LookupError, RecordLookup};
use crate::scanner::{scan_images, ScanItemError, ScanOptions, ScannedImage};
use crate::serial::{extract_serial_from_path, SerialKey};
use crate::translate::{PathTranslator, TransportPath};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Cooperative cancellation flag, checked between files.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RelocatorOptions {
    /// Stop at the translated destination; touch nothing.
    pub dry_run: bool,
    pub create_missing_dirs: bool,
    pub scan: ScanOptions,
}

/// Where a file has got to before its terminal outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Extracted,
    Resolved,
    Translated,
}

pub struct Relocator<'a> {
    lookup: &'a dyn RecordLookup,
    translator: PathTranslator,
    options: RelocatorOptions,
    cancel: CancelToken,
}

impl<'a> Relocator<'a> {
    pub fn new(lookup: &'a dyn RecordLookup, translator: PathTranslator, options: RelocatorOptions) -> Self {
        Self {
            lookup,
            translator,
            options,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Relocate every image in `dir`.
    ///
    /// Fails only if `dir` itself cannot be enumerated.
    pub fn run(&self, dir: &Path) -> Result<RunReport> {
        let images = scan_images(dir, self.options.scan)?;
        info!(
            dir = %dir.display(),
            dry_run = self.options.dry_run,
            recursive = self.options.scan.recursive,
            "Starting relocation run"
        );
        let report = self.run_images(images);
        info!(summary = %report.summary, "Relocation run finished");
        Ok(report)
    }

    /// Process an already enumerated set of images, in order.
    pub fn run_images(&self, images: impl IntoIterator<Item = ScannedImage>) -> RunReport {
        let mut files = Vec::new();
        let mut cancelled = false;
        for image in images {
            if !cancelled && self.cancel.is_cancelled() {
                warn!("Cancellation requested, remaining files will not be started");
                cancelled = true;
            }
            let report = if cancelled {
                FileReport {
                    serial: image.serial.ok(),
                    source: image.path,
                    outcome: RelocationOutcome::Skipped(SkipReason::Cancelled),
                }
            } else {
                self.process(image)
            };
            files.push(report);
        }
        RunReport::new(self.options.dry_run, files)
    }

    /// Relocate a single file by path.
    pub fn relocate_file(&self, source: &Path) -> FileReport {
        self.process(ScannedImage {
            path: source.to_path_buf(),
            serial: extract_serial_from_path(source).map_err(ScanItemError::from),
        })
    }

    fn process(&self, image: ScannedImage) -> FileReport {
        let ScannedImage { path, serial } = image;

        let serial = match serial {
            Ok(serial) => serial,
            Err(err) => {
                let reason = match err {
                    ScanItemError::Extraction(e) => FailureReason::Extraction {
                        message: e.to_string(),
                    },
                    ScanItemError::Unreadable(message) => FailureReason::Enumeration { message },
                };
                warn!(source = %path.display(), reason = %reason, "File failed");
                return FileReport {
                    source: path,
                    serial: None,
                    outcome: RelocationOutcome::Failed(reason),
                };
            }
        };
        self.transition(&path, Stage::Extracted);

        let outcome = self.resolve_and_move(&path, &serial);
        match &outcome {
            RelocationOutcome::Moved { destination } => {
                info!(source = %path.display(), serial = %serial, destination = %destination, "Moved");
            }
            RelocationOutcome::Planned { destination } => {
                info!(source = %path.display(), serial = %serial, destination = %destination, "Would move");
            }
            RelocationOutcome::Skipped(reason) => {
                warn!(source = %path.display(), serial = %serial, reason = %reason, "Skipped");
            }
            RelocationOutcome::Failed(reason) => {
                warn!(source = %path.display(), serial = %serial, reason = %reason, "Failed");
            }
        }

        FileReport {
            source: path,
            serial: Some(serial),
            outcome,
        }
    }

    fn resolve_and_move(&self, path: &Path, serial: &SerialKey) -> RelocationOutcome {
        let storage_path = match self.lookup.lookup(serial) {
            Ok(storage_path) => storage_path,
            Err(LookupError::NotFound { .. }) => {
                return RelocationOutcome::Skipped(SkipReason::NotFound);
            }
            Err(LookupError::AmbiguousMatch { candidates, .. }) => {
                return RelocationOutcome::Failed(FailureReason::AmbiguousMatch { candidates });
            }
            Err(err @ LookupError::Store { .. }) => {
                return RelocationOutcome::Failed(FailureReason::Lookup {
                    message: err.to_string(),
                });
            }
        };
        self.transition(path, Stage::Resolved);

        let destination = match self.translator.translate(&storage_path) {
            Ok(destination) => destination,
            Err(err) => {
                return RelocationOutcome::Failed(FailureReason::PathTranslation {
                    message: err.to_string(),
                });
            }
        };
        self.transition(path, Stage::Translated);

        if self.options.dry_run {
            return RelocationOutcome::Planned { destination };
        }

        self.perform_move(path, destination)
    }

    fn perform_move(&self, path: &Path, destination: TransportPath) -> RelocationOutcome {
        let options = MoveOptions {
            create_missing_dirs: self.options.create_missing_dirs,
        };
        match move_file(path, &destination.to_path_buf(), options) {
            Ok(method) => {
                if method == MoveMethod::VerifiedCopy {
                    debug!(source = %path.display(), "Moved by verified copy");
                }
                RelocationOutcome::Moved { destination }
            }
            Err(MoveError::DestinationExists) => {
                RelocationOutcome::Skipped(SkipReason::DestinationExists { destination })
            }
            Err(err) => RelocationOutcome::Failed(FailureReason::Relocation {
                destination,
                message: err.to_string(),
            }),
        }
    }

    fn transition(&self, path: &Path, stage: Stage) {
        debug!(source = %path.display(), stage = ?stage, "State transition");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::StaticLookup;
    use crate::translate::StoragePath;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    const FRONT: &str = "HEL0012345X6789Y_front.jpg";
    const FRONT_SERIAL: &str = "HEL0012345X6789Y_fro";

    struct Fixture {
        _tmp: TempDir,
        input: PathBuf,
        share: PathBuf,
        translator: PathTranslator,
    }

    fn fixture() -> Fixture {
        let tmp = TempDir::new().unwrap();
        let input = tmp.path().join("input");
        let share = tmp.path().join("share");
        fs::create_dir_all(&input).unwrap();
        fs::create_dir_all(share.join("HEL001")).unwrap();
        let translator = PathTranslator::new("/EL", share.to_string_lossy().into_owned()).unwrap();
        Fixture {
            _tmp: tmp,
            input,
            share,
            translator,
        }
    }

    fn key(s: &str) -> SerialKey {
        SerialKey::new(s).unwrap()
    }

    fn table() -> StaticLookup {
        let mut table = StaticLookup::new();
        table.insert(key(FRONT_SERIAL), format!("/EL/HEL001/{}", FRONT));
        table
    }

    fn snapshot(dir: &Path) -> Vec<(PathBuf, Vec<u8>)> {
        let mut entries: Vec<_> = walkdir::WalkDir::new(dir)
            .into_iter()
            .map(|e| e.unwrap())
            .filter(|e| e.file_type().is_file())
            .map(|e| (e.path().to_path_buf(), fs::read(e.path()).unwrap()))
            .collect();
        entries.sort();
        entries
    }

    #[test]
    fn test_moves_resolved_file() {
        let fx = fixture();
        fs::write(fx.input.join(FRONT), b"el image").unwrap();
        let lookup = table();

        let relocator = Relocator::new(&lookup, fx.translator.clone(), RelocatorOptions::default());
        let report = relocator.run(&fx.input).unwrap();

        let dest = fx.share.join("HEL001").join(FRONT);
        assert_eq!(report.files.len(), 1);
        assert_eq!(report.files[0].serial, Some(key(FRONT_SERIAL)));
        assert!(matches!(report.files[0].outcome, RelocationOutcome::Moved { .. }));
        assert_eq!(fs::read(&dest).unwrap(), b"el image");
        assert!(!fx.input.join(FRONT).exists());
        assert_eq!(report.summary.moved, 1);
    }

    #[test]
    fn test_second_run_is_idempotent() {
        let fx = fixture();
        fs::write(fx.input.join(FRONT), b"el image").unwrap();
        let lookup = table();
        let relocator = Relocator::new(&lookup, fx.translator.clone(), RelocatorOptions::default());
        relocator.run(&fx.input).unwrap();

        // same source set put back
        fs::write(fx.input.join(FRONT), b"el image").unwrap();
        let report = relocator.run(&fx.input).unwrap();
        assert!(matches!(
            report.files[0].outcome,
            RelocationOutcome::Skipped(SkipReason::DestinationExists { .. })
        ));
        assert!(fx.input.join(FRONT).exists());

        // and an emptied input yields no outcomes
        fs::remove_file(fx.input.join(FRONT)).unwrap();
        let report = relocator.run(&fx.input).unwrap();
        assert!(report.files.is_empty());
    }

    #[test]
    fn test_dry_run_touches_nothing() {
        let fx = fixture();
        fs::write(fx.input.join(FRONT), b"el image").unwrap();
        fs::write(fx.input.join("UNKNOWNSERIAL0000000.jpg"), b"other").unwrap();
        let lookup = table();
        let before_input = snapshot(&fx.input);
        let before_share = snapshot(&fx.share);

        let options = RelocatorOptions {
            dry_run: true,
            create_missing_dirs: true,
            ..Default::default()
        };
        let report = Relocator::new(&lookup, fx.translator.clone(), options)
            .run(&fx.input)
            .unwrap();

        assert!(report.dry_run);
        let planned = report
            .files
            .iter()
            .find(|f| f.serial == Some(key(FRONT_SERIAL)))
            .unwrap();
        let expected = fx.share.join("HEL001").join(FRONT);
        assert_eq!(
            planned.outcome,
            RelocationOutcome::Planned {
                destination: TransportPath::from(expected.to_string_lossy().into_owned())
            }
        );
        assert_eq!(snapshot(&fx.input), before_input);
        assert_eq!(snapshot(&fx.share), before_share);
        assert_eq!(report.summary.moved, 0);
    }

    #[test]
    fn test_not_found_and_ambiguous_leave_source() {
        let fx = fixture();
        let lonely = fx.input.join("NOSUCHSERIAL00000000.jpg");
        let twin = fx.input.join("TWOMATCHES000000000A_x.jpg");
        fs::write(&lonely, b"a").unwrap();
        fs::write(&twin, b"b").unwrap();
        let mut lookup = StaticLookup::new();
        lookup
            .insert(key("TWOMATCHES000000000A"), "/EL/A/one.jpg")
            .insert(key("TWOMATCHES000000000A"), "/EL/B/two.jpg");

        let report = Relocator::new(&lookup, fx.translator.clone(), RelocatorOptions::default())
            .run(&fx.input)
            .unwrap();

        assert_eq!(
            report.files[0].outcome,
            RelocationOutcome::Skipped(SkipReason::NotFound)
        );
        assert_eq!(
            report.files[1].outcome,
            RelocationOutcome::Failed(FailureReason::AmbiguousMatch {
                candidates: vec![StoragePath::new("/EL/A/one.jpg"), StoragePath::new("/EL/B/two.jpg")]
            })
        );
        assert!(lonely.exists());
        assert!(twin.exists());
        assert!(report.summary.has_failures());
    }

    #[test]
    fn test_per_file_failures_do_not_stop_the_run() {
        let fx = fixture();
        fs::write(fx.input.join("short.jpg"), b"x").unwrap();
        fs::write(fx.input.join("OUTSIDEPREFIX0000000.jpg"), b"y").unwrap();
        fs::write(fx.input.join(FRONT), b"z").unwrap();
        let mut lookup = table();
        lookup.insert(key("OUTSIDEPREFIX0000000"), "/OTHER/G/x.jpg");

        let report = Relocator::new(&lookup, fx.translator.clone(), RelocatorOptions::default())
            .run(&fx.input)
            .unwrap();

        let outcomes: Vec<_> = report.files.iter().map(|f| f.outcome.label()).collect();
        assert_eq!(outcomes, vec!["moved", "failed", "failed"]);
        assert!(matches!(
            report.files[1].outcome,
            RelocationOutcome::Failed(FailureReason::PathTranslation { .. })
        ));
        assert!(matches!(
            report.files[2].outcome,
            RelocationOutcome::Failed(FailureReason::Extraction { .. })
        ));
        assert_eq!(report.files[2].serial, None);
    }

    #[test]
    fn test_missing_destination_directory() {
        let fx = fixture();
        fs::write(fx.input.join(FRONT), b"z").unwrap();
        let mut lookup = StaticLookup::new();
        lookup.insert(key(FRONT_SERIAL), format!("/EL/NEWGROUP/{}", FRONT));

        let report = Relocator::new(&lookup, fx.translator.clone(), RelocatorOptions::default())
            .run(&fx.input)
            .unwrap();
        assert!(matches!(
            report.files[0].outcome,
            RelocationOutcome::Failed(FailureReason::Relocation { .. })
        ));
        assert!(fx.input.join(FRONT).exists());

        let options = RelocatorOptions {
            create_missing_dirs: true,
            ..Default::default()
        };
        let report = Relocator::new(&lookup, fx.translator.clone(), options)
            .run(&fx.input)
            .unwrap();
        assert!(matches!(report.files[0].outcome, RelocationOutcome::Moved { .. }));
        assert!(fx.share.join("NEWGROUP").join(FRONT).exists());
    }

    #[test]
    fn test_duplicate_destination_in_one_run() {
        let fx = fixture();
        let sub = fx.input.join("again");
        fs::create_dir(&sub).unwrap();
        fs::write(fx.input.join(FRONT), b"first").unwrap();
        fs::write(sub.join(FRONT), b"second").unwrap();
        let lookup = table();

        let options = RelocatorOptions {
            scan: ScanOptions {
                recursive: true,
                max_depth: None,
            },
            ..Default::default()
        };
        let report = Relocator::new(&lookup, fx.translator.clone(), options)
            .run(&fx.input)
            .unwrap();

        let labels: Vec<_> = report.files.iter().map(|f| f.outcome.label()).collect();
        assert_eq!(labels, vec!["moved", "skipped"]);
        assert_eq!(
            fs::read(fx.share.join("HEL001").join(FRONT)).unwrap(),
            b"first"
        );
        assert_eq!(fs::read(sub.join(FRONT)).unwrap(), b"second");
    }

    #[test]
    fn test_cancellation_between_files() {
        let fx = fixture();
        fs::write(fx.input.join(FRONT), b"z").unwrap();
        let lookup = table();
        let cancel = CancelToken::new();
        cancel.cancel();

        let report = Relocator::new(&lookup, fx.translator.clone(), RelocatorOptions::default())
            .with_cancel_token(cancel)
            .run(&fx.input)
            .unwrap();
        assert!(report.cancelled);
        assert_eq!(
            report.files[0].outcome,
            RelocationOutcome::Skipped(SkipReason::Cancelled)
        );
        assert_eq!(report.files[0].serial, Some(key(FRONT_SERIAL)));
        assert!(fx.input.join(FRONT).exists());
    }

    #[test]
    fn test_relocate_single_file() {
        let fx = fixture();
        let source = fx.input.join(FRONT);
        fs::write(&source, b"z").unwrap();
        let lookup = table();

        let report = Relocator::new(&lookup, fx.translator.clone(), RelocatorOptions::default())
            .relocate_file(&source);
        assert!(matches!(report.outcome, RelocationOutcome::Moved { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_subdirectory_fails_only_that_entry() {
        use std::os::unix::fs::PermissionsExt;

        let fx = fixture();
        let locked = fx.input.join("locked");
        fs::create_dir(&locked).unwrap();
        fs::write(locked.join("HEL0099999X0000Y_back.jpg"), b"hidden").unwrap();
        fs::write(fx.input.join(FRONT), b"z").unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
        if fs::read_dir(&locked).is_ok() {
            // permission bits do not apply to this user (root)
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let lookup = table();
        let options = RelocatorOptions {
            scan: ScanOptions {
                recursive: true,
                max_depth: None,
            },
            ..Default::default()
        };
        let report = Relocator::new(&lookup, fx.translator.clone(), options)
            .run(&fx.input)
            .unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        assert_eq!(report.files.len(), 2);
        assert!(matches!(report.files[0].outcome, RelocationOutcome::Moved { .. }));
        assert_eq!(report.files[1].source, locked);
        assert_eq!(report.files[1].serial, None);
        assert!(matches!(
            report.files[1].outcome,
            RelocationOutcome::Failed(FailureReason::Enumeration { .. })
        ));
        assert_eq!(report.summary.failed, 1);
    }

    #[test]
    fn test_unreadable_root_is_fatal() {
        let fx = fixture();
        let lookup = table();
        let relocator = Relocator::new(&lookup, fx.translator.clone(), RelocatorOptions::default());
        assert!(relocator.run(&fx.input.join("missing")).is_err());
    }
}
