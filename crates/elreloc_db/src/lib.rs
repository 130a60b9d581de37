//! Read-only record store access for elreloc.
//!
//! The record store maps an image serial to the storage path of its
//! authoritative copy. This crate owns every query against it; the engine
//! only sees `RecordStore::storage_paths`.
//!
//! # Usage
//!
//! ```rust,ignore
//! use elreloc_db::{RecordSchema, RecordStore};
//!
//! let store = RecordStore::connect("sqlite:/data/records.db", RecordSchema::default()).await?;
//! let paths = store.storage_paths("HEL0012345X6789Y_fro").await?;
//! ```

pub mod dsn;
mod error;
#[cfg(feature = "mssql")]
mod mssql;
pub mod schema;

pub use dsn::{redact_dsn, DsnKind};
pub use error::{DbError, Result};
pub use schema::{join_storage_path, IdentifierError, Placeholder, RecordSchema};

use sqlx::any::AnyPoolOptions;
use sqlx::AnyPool;
use tracing::{debug, info};

enum Backend {
    Sqlx(AnyPool),
    #[cfg(feature = "mssql")]
    Mssql(mssql::MssqlStore),
}

/// Connection to the record store plus the prepared lookup query.
pub struct RecordStore {
    backend: Backend,
    kind: DsnKind,
    schema: RecordSchema,
    lookup_sql: String,
}

impl RecordStore {
    /// Connect using a DSN and table layout.
    ///
    /// Fails before connecting if the DSN scheme is unsupported or the
    /// schema names do not validate.
    pub async fn connect(dsn: &str, schema: RecordSchema) -> Result<Self> {
        let kind = DsnKind::from_dsn(dsn)?;
        let lookup_sql = schema.lookup_sql(kind.placeholder())?;

        let backend = match kind {
            DsnKind::SqlServer => connect_mssql(dsn).await?,
            _ => {
                sqlx::any::install_default_drivers();
                let pool = AnyPoolOptions::new()
                    .max_connections(2)
                    .connect(dsn.trim())
                    .await?;
                Backend::Sqlx(pool)
            }
        };

        info!(
            backend = kind.as_str(),
            dsn = %redact_dsn(dsn),
            table = %schema.table,
            "Record store connected"
        );

        Ok(Self {
            backend,
            kind,
            schema,
            lookup_sql,
        })
    }

    pub fn kind(&self) -> DsnKind {
        self.kind
    }

    /// All distinct storage paths recorded for a serial, in ascending order.
    pub async fn storage_paths(&self, serial: &str) -> Result<Vec<String>> {
        let with_filename = self.schema.filename_column.is_some();

        let mut paths = match &self.backend {
            Backend::Sqlx(pool) => {
                if with_filename {
                    let rows: Vec<(Option<String>, Option<String>)> =
                        sqlx::query_as(&self.lookup_sql)
                            .bind(serial)
                            .fetch_all(pool)
                            .await?;
                    rows.into_iter()
                        .filter_map(|(dir, name)| {
                            dir.map(|dir| join_storage_path(&dir, name.as_deref()))
                        })
                        .collect::<Vec<_>>()
                } else {
                    let rows: Vec<(Option<String>,)> = sqlx::query_as(&self.lookup_sql)
                        .bind(serial)
                        .fetch_all(pool)
                        .await?;
                    rows.into_iter().filter_map(|(path,)| path).collect()
                }
            }
            #[cfg(feature = "mssql")]
            Backend::Mssql(store) => {
                store
                    .query_paths(&self.lookup_sql, serial, with_filename)
                    .await?
            }
        };

        // DISTINCT runs before the join, so different (dir, name) splits of the
        // same path can still collide.
        paths.sort();
        paths.dedup();

        debug!(serial, matches = paths.len(), "Record store lookup");
        Ok(paths)
    }

    /// Close the connection.
    pub async fn close(self) {
        match self.backend {
            Backend::Sqlx(pool) => pool.close().await,
            #[cfg(feature = "mssql")]
            Backend::Mssql(_) => {}
        }
    }
}

#[cfg(feature = "mssql")]
async fn connect_mssql(dsn: &str) -> Result<Backend> {
    Ok(Backend::Mssql(mssql::MssqlStore::connect(dsn).await?))
}

#[cfg(not(feature = "mssql"))]
async fn connect_mssql(dsn: &str) -> Result<Backend> {
    Err(DbError::unsupported_dsn(
        dsn,
        "SQL Server support requires the `mssql` feature",
    ))
}
