//! `elreloc serials` - list the unique serials in a file or directory

use super::error::HelpfulError;
use super::output::write_serials_csv;
use anyhow::{Context, Result};
use elreloc::{collect_serials, ScanOptions};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use tracing::warn;

#[derive(Debug, clap::Args)]
pub struct SerialsArgs {
    /// Image file or directory
    pub path: PathBuf,

    /// Export the serials to a CSV file (`Serial_Number` column)
    #[arg(long)]
    pub csv: Option<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Descend into subdirectories
    #[arg(short, long)]
    pub recursive: bool,
}

/// With `quiet` (the global `-q`), only the serial list goes to stdout and
/// the summary lines are dropped, so the output can be piped as-is.
pub fn run(args: SerialsArgs, quiet: bool) -> Result<()> {
    let options = ScanOptions {
        recursive: args.recursive,
        max_depth: None,
    };
    let listing = collect_serials(&args.path, options).map_err(HelpfulError::from)?;

    for (path, err) in &listing.rejected {
        warn!(path = %path.display(), error = %err, "No serial");
    }

    if let Some(csv_path) = &args.csv {
        let file = File::create(csv_path)
            .map_err(|e| HelpfulError::cannot_write_file(csv_path, &e.to_string()))?;
        let mut out = BufWriter::new(file);
        write_serials_csv(&listing.serials, &mut out)?;
        out.flush()
            .with_context(|| format!("Failed to write {}", csv_path.display()))?;
    }

    if args.json {
        let value = serde_json::json!({
            "path": args.path.display().to_string(),
            "serials": listing.serials,
            "processed": listing.processed.len(),
            "rejected": listing
                .rejected
                .iter()
                .map(|(path, err)| serde_json::json!({
                    "file": path.display().to_string(),
                    "error": err.to_string(),
                }))
                .collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    for serial in &listing.serials {
        println!("{}", serial);
    }
    if quiet {
        return Ok(());
    }
    eprintln!(
        "{} unique serials from {} images ({} without a serial)",
        listing.serials.len(),
        listing.processed.len(),
        listing.rejected.len()
    );
    if let Some(csv_path) = &args.csv {
        eprintln!("Serials written to {}", csv_path.display());
    }
    Ok(())
}
