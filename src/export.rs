//! Writing server exports and filtered tables to disk.

use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::Serialize;
use tracing::info;

use crate::report::TableRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    /// Guesses from the file extension, defaulting to CSV.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => ExportFormat::Json,
            _ => ExportFormat::Csv,
        }
    }
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    Ok(())
}

/// Saves a server-generated export (CSV or JSON body) unchanged.
pub fn save_bytes(path: &Path, body: &[u8]) -> Result<()> {
    ensure_parent(path)?;
    fs::write(path, body).with_context(|| format!("failed to write {}", path.display()))?;
    info!("Saved {} bytes to {}", body.len(), path.display());
    Ok(())
}

pub fn write_csv<R: TableRow, W: Write>(rows: &[R], writer: W) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(R::headers())?;
    for row in rows {
        csv.write_record(row.cells())?;
    }
    csv.flush()?;
    Ok(())
}

pub fn write_json<R: Serialize, W: Write>(rows: &[R], writer: W) -> Result<()> {
    serde_json::to_writer_pretty(writer, rows)?;
    Ok(())
}

/// Writes the rows currently shown by a view (filtered and sorted, all pages).
pub fn write_table<R>(rows: &[R], path: &Path, format: ExportFormat) -> Result<()>
where
    R: TableRow + Serialize,
{
    ensure_parent(path)?;
    let file =
        fs::File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    match format {
        ExportFormat::Csv => write_csv(rows, file),
        ExportFormat::Json => write_json(rows, file),
    }
    .with_context(|| format!("failed to export to {}", path.display()))?;
    info!("Exported {} rows to {}", rows.len(), path.display());
    Ok(())
}
