//! Output formatting for CLI commands
//!
//! Renders run reports as:
//! - Tables with per-outcome colours
//! - JSON documents
//! - CSV exports

use anyhow::Result;
use comfy_table::{presets::UTF8_FULL_CONDENSED, Cell, Color, ContentArrangement, Table};
use elreloc::{FileReport, RelocationOutcome, RunReport, SerialKey};
use std::io::Write;

/// Export format for the relocate report
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
    Csv,
}

/// Color for an outcome label
pub fn color_for_outcome(outcome: &RelocationOutcome) -> Color {
    match outcome {
        RelocationOutcome::Moved { .. } => Color::Green,
        RelocationOutcome::Planned { .. } => Color::Cyan,
        RelocationOutcome::Skipped(_) => Color::Yellow,
        RelocationOutcome::Failed(_) => Color::Red,
    }
}

fn file_label(report: &FileReport) -> String {
    report.source.display().to_string()
}

fn serial_label(report: &FileReport) -> String {
    report
        .serial
        .as_ref()
        .map(SerialKey::to_string)
        .unwrap_or_else(|| "-".to_string())
}

/// Build a table with custom column colors
pub fn table_colored(headers: &[&str], rows: Vec<Vec<(String, Option<Color>)>>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic);

    let header_cells: Vec<Cell> = headers.iter().map(|h| Cell::new(h).fg(Color::Cyan)).collect();
    table.set_header(header_cells);

    for row in rows {
        let cells: Vec<Cell> = row
            .into_iter()
            .map(|(text, color)| {
                let cell = Cell::new(text);
                if let Some(c) = color {
                    cell.fg(c)
                } else {
                    cell
                }
            })
            .collect();
        table.add_row(cells);
    }

    table
}

/// Per-file report table
pub fn report_table(report: &RunReport) -> Table {
    let rows = report
        .files
        .iter()
        .map(|file| {
            vec![
                (file_label(file), None),
                (serial_label(file), None),
                (
                    file.outcome.label().to_string(),
                    Some(color_for_outcome(&file.outcome)),
                ),
                (file.outcome.detail(), None),
            ]
        })
        .collect();
    table_colored(&["File", "Serial", "Outcome", "Detail"], rows)
}

/// Write the report as a human-readable table plus summary
pub fn write_report_table(report: &RunReport, out: &mut dyn Write) -> Result<()> {
    if report.dry_run {
        writeln!(out, "DRY RUN: no files were moved")?;
    }
    if report.files.is_empty() {
        writeln!(out, "No images found")?;
    } else {
        writeln!(out, "{}", report_table(report))?;
    }
    writeln!(out, "{}", report.summary)?;
    if report.cancelled {
        writeln!(out, "Run was cancelled; files not started are reported as skipped")?;
    }
    Ok(())
}

/// Write the report as a JSON document
pub fn write_report_json(report: &RunReport, out: &mut dyn Write) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, report)?;
    writeln!(out)?;
    Ok(())
}

/// Write the report as CSV (`file,serial,outcome,detail`)
pub fn write_report_csv(report: &RunReport, out: &mut dyn Write) -> Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(["file", "serial", "outcome", "detail"])?;
    for file in &report.files {
        let serial = file.serial.as_ref().map(SerialKey::as_str).unwrap_or("");
        writer.write_record([
            file_label(file).as_str(),
            serial,
            file.outcome.label(),
            file.outcome.detail().as_str(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_report(report: &RunReport, format: OutputFormat, out: &mut dyn Write) -> Result<()> {
    match format {
        OutputFormat::Table => write_report_table(report, out),
        OutputFormat::Json => write_report_json(report, out),
        OutputFormat::Csv => write_report_csv(report, out),
    }
}

/// Write unique serials as a one-column CSV with a `Serial_Number` header
pub fn write_serials_csv<'a>(
    serials: impl IntoIterator<Item = &'a SerialKey>,
    out: &mut dyn Write,
) -> Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(["Serial_Number"])?;
    for serial in serials {
        writer.write_record([serial.as_str()])?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use elreloc::{FailureReason, SkipReason, StoragePath, TransportPath};
    use std::path::PathBuf;

    fn key(s: &str) -> SerialKey {
        SerialKey::new(s).unwrap()
    }

    fn sample_report() -> RunReport {
        RunReport::new(
            false,
            vec![
                FileReport {
                    source: PathBuf::from("in/HEL0012345X6789Y_front.jpg"),
                    serial: Some(key("HEL0012345X6789Y_fro")),
                    outcome: RelocationOutcome::Moved {
                        destination: TransportPath::from(
                            r"\\server\share\HEL001\HEL0012345X6789Y_front.jpg".to_string(),
                        ),
                    },
                },
                FileReport {
                    source: PathBuf::from("in/TWOMATCHES000000000A.jpg"),
                    serial: Some(key("TWOMATCHES000000000A")),
                    outcome: RelocationOutcome::Failed(FailureReason::AmbiguousMatch {
                        candidates: vec![StoragePath::new("/EL/A/x.jpg"), StoragePath::new("/EL/B/x.jpg")],
                    }),
                },
                FileReport {
                    source: PathBuf::from("in/short.jpg"),
                    serial: None,
                    outcome: RelocationOutcome::Skipped(SkipReason::NotFound),
                },
            ],
        )
    }

    #[test]
    fn test_csv_export() {
        let mut buf = Vec::new();
        write_report_csv(&sample_report(), &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], "file,serial,outcome,detail");
        assert_eq!(
            lines[1],
            r"in/HEL0012345X6789Y_front.jpg,HEL0012345X6789Y_fro,moved,\\server\share\HEL001\HEL0012345X6789Y_front.jpg"
        );
        // detail contains a comma, so it is quoted
        assert_eq!(
            lines[2],
            "in/TWOMATCHES000000000A.jpg,TWOMATCHES000000000A,failed,\"ambiguous match: /EL/A/x.jpg, /EL/B/x.jpg\""
        );
        assert_eq!(lines[3], "in/short.jpg,,skipped,no record for serial");
    }

    #[test]
    fn test_json_export() {
        let mut buf = Vec::new();
        write_report_json(&sample_report(), &mut buf).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(value["dry_run"], false);
        assert_eq!(value["summary"]["moved"], 1);
        assert_eq!(value["summary"]["failed"], 1);
        assert_eq!(value["files"][0]["outcome"]["status"], "moved");
        assert_eq!(value["files"][2]["serial"], serde_json::Value::Null);
    }

    #[test]
    fn test_table_contains_rows_and_summary() {
        let mut buf = Vec::new();
        write_report_table(&sample_report(), &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("HEL0012345X6789Y_fro"));
        assert!(text.contains("3 files: 1 moved, 0 planned, 1 skipped, 1 failed"));
        assert!(!text.contains("DRY RUN"));
    }

    #[test]
    fn test_serials_csv() {
        let serials = [key("AAAAAAAAAAAAAAAAAAAA"), key("BBBBBBBBBBBBBBBBBBBB")];
        let mut buf = Vec::new();
        write_serials_csv(serials.iter(), &mut buf).unwrap();
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "Serial_Number\nAAAAAAAAAAAAAAAAAAAA\nBBBBBBBBBBBBBBBBBBBB\n"
        );
    }
}
