//! elreloc - EL image relocation
//!
//! Extracts the serial from an EL image file name, resolves it to the
//! storage path recorded in the record store, translates that path onto the
//! network share, and moves the file there without ever overwriting.

pub mod config;
pub mod error;
pub mod lookup;
pub mod relocate;
pub mod scanner;
pub mod serial;
pub mod translate;

pub use config::RelocatorConfig;
pub use error::{RelocError, Result};
pub use lookup::{LookupError, RecordLookup, StaticLookup, StoreLookup};
pub use relocate::{
    CancelToken, FailureReason, FileReport, RelocationOutcome, Relocator, RelocatorOptions,
    RunReport, RunSummary, SkipReason,
};
pub use scanner::{collect_serials, scan_images, ScanOptions, ScannedImage, SerialListing};
pub use serial::{extract_serial, ExtractionError, SerialKey, SERIAL_LEN};
pub use translate::{PathTranslationError, PathTranslator, Separator, StoragePath, TransportPath};
