//! Serial → storage path resolution.
//!
//! [`RecordLookup`] is the seam between the relocator and the record store.
//! Implementations return every candidate; [`RecordLookup::lookup`] turns
//! the candidate set into exactly one path or a typed error, so the zero and
//! many cases cannot be assumed away.

use crate::error::{RelocError, Result};
use crate::serial::SerialKey;
use crate::translate::StoragePath;
use elreloc_db::{RecordSchema, RecordStore};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use tokio::runtime::Runtime;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("no record for serial {serial}")]
    NotFound { serial: SerialKey },

    #[error("serial {serial} matches {} records: {}", .candidates.len(), join_candidates(.candidates))]
    AmbiguousMatch {
        serial: SerialKey,
        candidates: Vec<StoragePath>,
    },

    #[error("record store query for {serial} failed: {message}")]
    Store { serial: SerialKey, message: String },
}

fn join_candidates(candidates: &[StoragePath]) -> String {
    candidates
        .iter()
        .map(StoragePath::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Source of storage paths keyed by serial.
pub trait RecordLookup {
    /// Every distinct storage path for `serial`, in ascending order.
    fn candidates(&self, serial: &SerialKey) -> std::result::Result<Vec<StoragePath>, LookupError>;

    /// The single storage path for `serial`.
    fn lookup(&self, serial: &SerialKey) -> std::result::Result<StoragePath, LookupError> {
        let mut candidates = self.candidates(serial)?;
        match candidates.len() {
            0 => Err(LookupError::NotFound {
                serial: serial.clone(),
            }),
            1 => Ok(candidates.remove(0)),
            _ => Err(LookupError::AmbiguousMatch {
                serial: serial.clone(),
                candidates,
            }),
        }
    }

    /// Release any connection held by the lookup.
    fn close(self: Box<Self>) {}
}

/// [`RecordLookup`] backed by the configured record store.
///
/// The store driver is async; this wrapper owns a current-thread runtime and
/// blocks the caller for each query.
pub struct StoreLookup {
    runtime: Runtime,
    store: RecordStore,
}

impl StoreLookup {
    /// Connect to the record store. Fails if the DSN or schema is invalid or
    /// the store is unreachable.
    pub fn connect(dsn: &str, schema: RecordSchema) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let store = runtime.block_on(RecordStore::connect(dsn, schema))?;
        Ok(Self { runtime, store })
    }

}

impl RecordLookup for StoreLookup {
    fn candidates(&self, serial: &SerialKey) -> std::result::Result<Vec<StoragePath>, LookupError> {
        self.runtime
            .block_on(self.store.storage_paths(serial.as_str()))
            .map(|paths| paths.into_iter().map(StoragePath::new).collect())
            .map_err(|err| LookupError::Store {
                serial: serial.clone(),
                message: err.to_string(),
            })
    }

    fn close(self: Box<Self>) {
        let Self { runtime, store } = *self;
        runtime.block_on(store.close());
        debug!("Record store closed");
    }
}

/// In-memory lookup table, loaded from a `serial,path` CSV export of the
/// record store.
#[derive(Debug, Clone, Default)]
pub struct StaticLookup {
    records: HashMap<SerialKey, Vec<StoragePath>>,
}

#[derive(Debug, Deserialize)]
struct RecordRow {
    serial: String,
    path: String,
}

impl StaticLookup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a CSV export with `serial` and `path` header columns.
    ///
    /// Rows whose serial is not exactly 20 characters can never match an
    /// extracted key and are rejected.
    pub fn from_csv(path: &Path) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path)
            .map_err(|e| RelocError::Config(format!("{}: {}", path.display(), e)))?;
        let mut table = Self::new();
        for (idx, row) in reader.deserialize::<RecordRow>().enumerate() {
            // header is line 1
            let line = idx + 2;
            let row = row.map_err(|e| {
                RelocError::Config(format!("{} line {}: {}", path.display(), line, e))
            })?;
            let serial = SerialKey::new(row.serial.trim()).map_err(|e| {
                RelocError::Config(format!("{} line {}: {}", path.display(), line, e))
            })?;
            table.insert(serial, row.path);
        }
        debug!(path = %path.display(), serials = table.records.len(), "Loaded record table");
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn insert(&mut self, serial: SerialKey, path: impl Into<String>) -> &mut Self {
        let paths = self.records.entry(serial).or_default();
        let path = StoragePath::new(path);
        if let Err(idx) = paths.binary_search(&path) {
            paths.insert(idx, path);
        }
        self
    }
}

impl RecordLookup for StaticLookup {
    fn candidates(&self, serial: &SerialKey) -> std::result::Result<Vec<StoragePath>, LookupError> {
        Ok(self.records.get(serial).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> SerialKey {
        SerialKey::new(s).unwrap()
    }

    struct FailingLookup;

    impl RecordLookup for FailingLookup {
        fn candidates(
            &self,
            serial: &SerialKey,
        ) -> std::result::Result<Vec<StoragePath>, LookupError> {
            Err(LookupError::Store {
                serial: serial.clone(),
                message: "connection reset".to_string(),
            })
        }
    }

    #[test]
    fn test_lookup_zero_one_many() {
        let mut table = StaticLookup::new();
        table.insert(key("HEL0012345X6789Y_fro"), "/EL/HEL001/HEL0012345X6789Y_front.jpg");
        table
            .insert(key("TWOMATCHES000000000A"), "/EL/B/two.jpg")
            .insert(key("TWOMATCHES000000000A"), "/EL/A/one.jpg");

        assert_eq!(
            table.lookup(&key("HEL0012345X6789Y_fro")).unwrap(),
            StoragePath::new("/EL/HEL001/HEL0012345X6789Y_front.jpg")
        );
        assert_eq!(
            table.lookup(&key("NOSUCHSERIAL00000000")),
            Err(LookupError::NotFound {
                serial: key("NOSUCHSERIAL00000000")
            })
        );
        match table.lookup(&key("TWOMATCHES000000000A")) {
            Err(LookupError::AmbiguousMatch { candidates, .. }) => assert_eq!(
                candidates,
                vec![StoragePath::new("/EL/A/one.jpg"), StoragePath::new("/EL/B/two.jpg")]
            ),
            other => panic!("expected ambiguous match, got {:?}", other),
        }
    }

    #[test]
    fn test_static_lookup_collapses_identical_paths() {
        let mut table = StaticLookup::new();
        table
            .insert(key("DUPLICATEDSERIAL0000"), "/EL/G/dup.jpg")
            .insert(key("DUPLICATEDSERIAL0000"), "/EL/G/dup.jpg");
        assert!(table.lookup(&key("DUPLICATEDSERIAL0000")).is_ok());
    }

    #[test]
    fn test_from_csv() {
        let tmp = tempfile::TempDir::new().unwrap();
        let csv_path = tmp.path().join("records.csv");
        std::fs::write(
            &csv_path,
            "serial,path\nHEL0012345X6789Y_fro,/EL/HEL001/HEL0012345X6789Y_front.jpg\nTWOMATCHES000000000A,/EL/A/one.jpg\nTWOMATCHES000000000A,/EL/B/two.jpg\n",
        )
        .unwrap();

        let table = StaticLookup::from_csv(&csv_path).unwrap();
        assert_eq!(table.len(), 2);
        assert!(table.lookup(&key("HEL0012345X6789Y_fro")).is_ok());
        assert!(matches!(
            table.lookup(&key("TWOMATCHES000000000A")),
            Err(LookupError::AmbiguousMatch { .. })
        ));
    }

    #[test]
    fn test_from_csv_rejects_bad_serial() {
        let tmp = tempfile::TempDir::new().unwrap();
        let csv_path = tmp.path().join("records.csv");
        std::fs::write(&csv_path, "serial,path\nSHORT,/EL/x.jpg\n").unwrap();

        let err = StaticLookup::from_csv(&csv_path).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_store_lookup_against_sqlite() {
        let tmp = tempfile::TempDir::new().unwrap();
        let db_path = tmp.path().join("records.db");
        let seed = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        seed.block_on(async {
            let pool = sqlx::sqlite::SqlitePoolOptions::new()
                .max_connections(1)
                .connect(&format!("sqlite:{}?mode=rwc", db_path.display()))
                .await
                .unwrap();
            sqlx::query("CREATE TABLE el_desh (serial_nbr TEXT NOT NULL, file_path TEXT)")
                .execute(&pool)
                .await
                .unwrap();
            sqlx::query("INSERT INTO el_desh VALUES ('HEL0012345X6789Y_fro', '/EL/HEL001/a.jpg')")
                .execute(&pool)
                .await
                .unwrap();
            pool.close().await;
        });

        let store = StoreLookup::connect(
            &format!("sqlite:{}", db_path.display()),
            RecordSchema::default(),
        )
        .unwrap();
        assert_eq!(
            store.lookup(&key("HEL0012345X6789Y_fro")).unwrap(),
            StoragePath::new("/EL/HEL001/a.jpg")
        );
        assert!(matches!(
            store.lookup(&key("NOSUCHSERIAL00000000")),
            Err(LookupError::NotFound { .. })
        ));

        let boxed: Box<dyn RecordLookup> = Box::new(store);
        boxed.close();
    }

    #[test]
    fn test_store_errors_pass_through() {
        let err = FailingLookup.lookup(&key("ANYSERIAL00000000000")).unwrap_err();
        assert!(matches!(err, LookupError::Store { .. }));
    }

    #[test]
    fn test_ambiguous_message_lists_candidates() {
        let err = LookupError::AmbiguousMatch {
            serial: key("TWOMATCHES000000000A"),
            candidates: vec![StoragePath::new("/EL/A/one.jpg"), StoragePath::new("/EL/B/two.jpg")],
        };
        let text = err.to_string();
        assert!(text.contains("matches 2 records"));
        assert!(text.contains("/EL/A/one.jpg, /EL/B/two.jpg"));
    }
}
