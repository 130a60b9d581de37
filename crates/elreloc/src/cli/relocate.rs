//! `elreloc relocate` - move EL images to their recorded share location

use super::error::HelpfulError;
use super::output::{write_report, OutputFormat};
use anyhow::{Context, Result};
use elreloc::{CancelToken, RelocError, Relocator, RelocatorConfig, RunReport};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use tracing::info;

/// Exit code when at least one file failed
pub const EXIT_FILE_FAILURES: u8 = 1;
/// Exit code when the run was interrupted
pub const EXIT_CANCELLED: u8 = 130;

#[derive(Debug, clap::Args)]
pub struct RelocateArgs {
    /// Directory containing the EL images
    pub dir: PathBuf,

    /// Report what would be moved without touching any file
    #[arg(long)]
    pub dry_run: bool,

    /// Report format
    #[arg(long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Write the report to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Descend into subdirectories
    #[arg(short, long)]
    pub recursive: bool,

    /// Maximum directory depth when recursing
    #[arg(long)]
    pub max_depth: Option<usize>,

    /// Create missing destination directories
    #[arg(long)]
    pub create_dirs: bool,

    /// Resolve serials from a `serial,path` CSV export instead of the record store
    #[arg(long)]
    pub records: Option<PathBuf>,

    /// Configuration file (default: ~/.elreloc/config.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// Outcome of the command, mapped to the process exit code by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelocateStatus {
    Clean,
    FileFailures,
    Cancelled,
}

impl RelocateStatus {
    pub fn from_report(report: &RunReport) -> Self {
        if report.cancelled {
            RelocateStatus::Cancelled
        } else if report.summary.has_failures() {
            RelocateStatus::FileFailures
        } else {
            RelocateStatus::Clean
        }
    }

    pub fn exit_code(self) -> u8 {
        match self {
            RelocateStatus::Clean => 0,
            RelocateStatus::FileFailures => EXIT_FILE_FAILURES,
            RelocateStatus::Cancelled => EXIT_CANCELLED,
        }
    }
}

fn load_config(args: &RelocateArgs) -> Result<RelocatorConfig, RelocError> {
    let (mut config, source) = RelocatorConfig::resolve_unvalidated(args.config.as_deref())?;
    if let Some(records) = &args.records {
        config.records_csv = Some(records.clone());
    }
    if args.recursive {
        config.recursive = true;
    }
    if args.max_depth.is_some() {
        config.max_depth = args.max_depth;
    }
    if args.create_dirs {
        config.create_missing_dirs = true;
    }
    config.validate()?;
    match source {
        Some(path) => info!(config = %path.display(), "Using configuration file"),
        None => info!("No configuration file, using environment"),
    }
    Ok(config)
}

pub fn run(args: RelocateArgs, cancel: CancelToken) -> Result<RelocateStatus> {
    let config = load_config(&args).map_err(HelpfulError::from)?;
    let translator = config.translator().map_err(HelpfulError::from)?;
    let lookup = config.open_lookup().map_err(HelpfulError::from)?;

    let result = Relocator::new(lookup.as_ref(), translator, config.relocator_options(args.dry_run))
        .with_cancel_token(cancel)
        .run(&args.dir);
    lookup.close();
    let report = result.map_err(HelpfulError::from)?;

    match &args.output {
        Some(path) => {
            let file = File::create(path)
                .map_err(|e| HelpfulError::cannot_write_file(path, &e.to_string()))?;
            let mut out = BufWriter::new(file);
            write_report(&report, args.format, &mut out)?;
            out.flush()
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            eprintln!("{}", report.summary);
            eprintln!("Report written to {}", path.display());
        }
        None => {
            let stdout = io::stdout();
            let mut out = stdout.lock();
            write_report(&report, args.format, &mut out)?;
            if args.format != OutputFormat::Table {
                eprintln!("{}", report.summary);
            }
        }
    }

    Ok(RelocateStatus::from_report(&report))
}
