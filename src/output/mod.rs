//! Output formatting module.
//!
//! Renders a finished [`ScanReport`] as plain text, JSON or CSV, and drives
//! the live progress bar from [`ProgressEvent`](crate::report::ProgressEvent)s.

mod csv_format;
mod json_format;
mod plain;
mod progress;

pub use csv_format::write_csv;
pub use json_format::write_json;
pub use plain::{print_error, print_scan_header, print_warning, write_plain, PlainOptions};
pub use progress::ScanProgress;

use crate::cli::OutputFormat;
use crate::error::CliResult;
use crate::report::ScanReport;
use std::io;

/// Format and print a report to stdout.
pub fn print_report(report: &ScanReport, format: OutputFormat, options: PlainOptions) -> CliResult<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    match format {
        OutputFormat::Plain => write_plain(&mut out, report, options)?,
        OutputFormat::Json => write_json(&mut out, report)?,
        OutputFormat::Csv => write_csv(&mut out, report)?,
    }
    Ok(())
}
