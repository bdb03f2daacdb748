//! Output formatting and persistence for fetched tables and analysis results.
//!
//! Supports pretty-printing, JSON logging, and CSV export (optionally
//! gzip-compressed).

use anyhow::{Context, Result};
use csv::WriterBuilder;
use flate2::Compression;
use flate2::write::GzEncoder;
use serde::Serialize;
use std::fmt::Debug;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use tracing::{debug, info};

use crate::analysis::Comparison;
use crate::stats::FetchRecord;
use crate::table::Table;

/// Logs a value using Rust's debug pretty-print format.
pub fn print_pretty<T: Debug>(value: &T) {
    debug!("{:#?}", value);
}

/// Logs a value as pretty-printed JSON.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Writes `table` as CSV, one column per field in [`Table::columns`] order.
///
/// Fields a row omits are written as empty cells. With `gzip` set the
/// output is compressed.
pub fn write_table_csv(path: &str, table: &Table, gzip: bool) -> Result<()> {
    debug!(path, gzip, rows = table.len(), "Writing table CSV");
    let file = File::create(path).with_context(|| format!("Failed to create '{path}'"))?;

    if gzip {
        let mut encoder = GzEncoder::new(file, Compression::default());
        write_table(&mut encoder, table)?;
        encoder.finish()?.flush()?;
    } else {
        write_table(file, table)?;
    }

    Ok(())
}

fn write_table<W: Write>(out: W, table: &Table) -> Result<()> {
    let mut writer = csv::Writer::from_writer(out);

    if !table.columns().is_empty() {
        writer.write_record(table.columns())?;
    }
    for row in table.rows() {
        writer.write_record(
            table
                .columns()
                .iter()
                .map(|c| row.get(c).map(|v| v.to_string()).unwrap_or_default()),
        )?;
    }

    writer.flush()?;
    Ok(())
}

/// Appends a [`FetchRecord`] as a row to a CSV file.
///
/// Creates the file with headers if it does not already exist.
pub fn append_record(path: &str, record: &FetchRecord) -> Result<()> {
    let file_exists = Path::new(path).exists();
    debug!(path, file_exists, "Appending CSV record");

    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists) // IMPORTANT when appending
        .from_writer(file);

    writer.serialize(record)?;
    writer.flush()?;

    Ok(())
}

#[derive(Serialize)]
struct ComparisonRow<'a> {
    metric: &'a str,
    before_count: usize,
    after_count: usize,
    before_mean: f64,
    after_mean: f64,
    change_pct: f64,
    t_statistic: f64,
    p_value: f64,
    cohens_d: f64,
    significant: bool,
}

/// Saves analysis results to a CSV file, replacing any existing file.
pub fn save_comparisons(path: &str, comparisons: &[Comparison]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create '{path}'"))?;

    for c in comparisons {
        writer.serialize(ComparisonRow {
            metric: &c.metric,
            before_count: c.before_count,
            after_count: c.after_count,
            before_mean: c.result.before_mean,
            after_mean: c.result.after_mean,
            change_pct: c.result.percentage_change,
            t_statistic: c.result.t_statistic,
            p_value: c.result.p_value,
            cohens_d: c.result.cohens_d,
            significant: c.result.significant,
        })?;
    }

    writer.flush()?;
    info!(path, metrics = comparisons.len(), "Analysis results saved");
    Ok(())
}
