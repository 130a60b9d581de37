//! Relocator configuration.
//!
//! Loaded from TOML (`--config <path>` or `<home>/config.toml`), then
//! overridden from the environment. The resolved value is passed explicitly
//! to whatever needs it; nothing here is global.

use crate::error::{RelocError, Result};
use crate::lookup::{RecordLookup, StaticLookup, StoreLookup};
use crate::relocate::RelocatorOptions;
use crate::scanner::ScanOptions;
use crate::translate::{PathTranslator, Separator};
use elreloc_db::{redact_dsn, DsnKind, RecordSchema};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

pub const ENV_STORAGE_PREFIX: &str = "ELRELOC_STORAGE_PREFIX";
pub const ENV_TRANSPORT_PREFIX: &str = "ELRELOC_TRANSPORT_PREFIX";
pub const ENV_RECORD_STORE_DSN: &str = "ELRELOC_RECORD_STORE_DSN";
pub const ENV_RECORDS_CSV: &str = "ELRELOC_RECORDS_CSV";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RelocatorConfig {
    /// Prefix of storage paths in the record store (`/EL/`)
    #[serde(default)]
    pub storage_prefix: String,

    /// Prefix substituted for it (`\\server\share\`)
    #[serde(default)]
    pub transport_prefix: String,

    /// Record store connection string
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub record_store_dsn: String,

    /// `serial,path` CSV export used instead of the record store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub records_csv: Option<PathBuf>,

    /// Transport separator; inferred from the transport prefix when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport_separator: Option<Separator>,

    #[serde(default)]
    pub create_missing_dirs: bool,

    #[serde(default)]
    pub recursive: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<usize>,

    #[serde(default)]
    pub record_store: RecordSchema,
}

/// Default config location: `<home>/config.toml`.
pub fn default_config_path() -> PathBuf {
    elreloc_logging::elreloc_home().join("config.toml")
}

impl RelocatorConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| RelocError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::parse(&content).map_err(|e| match e {
            RelocError::Config(msg) => RelocError::Config(format!("{}: {}", path.display(), msg)),
            other => other,
        })
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| RelocError::Config(e.to_string()))
    }

    /// Resolve the effective configuration without validating it.
    ///
    /// An explicit path must exist. The default path is optional, in which
    /// case everything has to come from the environment. Returns the file
    /// that was read, if any.
    pub fn resolve_unvalidated(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>)> {
        // .env values only fill in variables that are not already set
        if let Ok(path) = dotenvy::dotenv() {
            debug!(path = %path.display(), "Loaded .env");
        }

        let (mut config, source) = match explicit {
            Some(path) => (Self::load(path)?, Some(path.to_path_buf())),
            None => {
                let path = default_config_path();
                if path.is_file() {
                    (Self::load(&path)?, Some(path))
                } else {
                    (Self::default(), None)
                }
            }
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok((config, source))
    }

    /// Resolve and validate.
    pub fn resolve(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>)> {
        let (config, source) = Self::resolve_unvalidated(explicit)?;
        config.validate()?;
        Ok((config, source))
    }

    /// Apply environment overrides; `lookup` returns the value of a variable.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.is_empty());
        if let Some(v) = non_empty(ENV_STORAGE_PREFIX) {
            self.storage_prefix = v;
        }
        if let Some(v) = non_empty(ENV_TRANSPORT_PREFIX) {
            self.transport_prefix = v;
        }
        if let Some(v) = non_empty(ENV_RECORD_STORE_DSN) {
            self.record_store_dsn = v;
        }
        if let Some(v) = non_empty(ENV_RECORDS_CSV) {
            self.records_csv = Some(PathBuf::from(v));
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.storage_prefix.is_empty() {
            return Err(RelocError::Config(format!(
                "storage_prefix is not set (config file or {})",
                ENV_STORAGE_PREFIX
            )));
        }
        if self.transport_prefix.is_empty() {
            return Err(RelocError::Config(format!(
                "transport_prefix is not set (config file or {})",
                ENV_TRANSPORT_PREFIX
            )));
        }
        match (&self.records_csv, self.record_store_dsn.is_empty()) {
            (None, true) => {
                return Err(RelocError::Config(format!(
                    "record_store_dsn is not set (config file or {})",
                    ENV_RECORD_STORE_DSN
                )));
            }
            (Some(_), _) => {}
            (None, false) => {
                DsnKind::from_dsn(&self.record_store_dsn)?;
                self.record_store
                    .validate()
                    .map_err(|e| RelocError::Config(format!("[record_store] {}", e)))?;
            }
        }
        if self.max_depth.is_some() && !self.recursive {
            debug!("max_depth has no effect without recursive");
        }
        Ok(())
    }

    pub fn translator(&self) -> Result<PathTranslator> {
        let translator = match self.transport_separator {
            Some(sep) => PathTranslator::with_separator(&self.storage_prefix, &self.transport_prefix, sep)?,
            None => PathTranslator::new(&self.storage_prefix, &self.transport_prefix)?,
        };
        Ok(translator)
    }

    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            recursive: self.recursive,
            max_depth: self.max_depth,
        }
    }

    pub fn relocator_options(&self, dry_run: bool) -> RelocatorOptions {
        RelocatorOptions {
            dry_run,
            create_missing_dirs: self.create_missing_dirs,
            scan: self.scan_options(),
        }
    }

    /// Open the configured lookup source: the CSV export if one is set,
    /// otherwise the record store.
    pub fn open_lookup(&self) -> Result<Box<dyn RecordLookup>> {
        if let Some(path) = &self.records_csv {
            return Ok(Box::new(StaticLookup::from_csv(path)?));
        }
        let store = StoreLookup::connect(&self.record_store_dsn, self.record_store.clone())?;
        Ok(Box::new(store))
    }

    /// DSN with any password removed, for display.
    pub fn redacted_dsn(&self) -> String {
        redact_dsn(&self.record_store_dsn)
    }

    /// Copy safe to print or serialize.
    pub fn redacted(&self) -> Self {
        Self {
            record_store_dsn: self.redacted_dsn(),
            ..self.clone()
        }
    }
}
