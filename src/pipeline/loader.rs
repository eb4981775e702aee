//! Dataset loading and saving for CSV and Parquet files

use std::path::Path;

use anyhow::{Context, Result};
use polars::prelude::*;
use tracing::info;

/// Lowercased file extension, or an empty string
fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}

/// Load a dataset from a file (CSV or Parquet based on extension).
/// Column names are taken from the file header.
pub fn load_dataset(path: &Path) -> Result<DataFrame> {
    let lf = match extension_of(path).as_str() {
        "csv" => LazyCsvReader::new(path)
            .with_has_header(true)
            .finish()
            .with_context(|| format!("Failed to load CSV file: {}", path.display()))?,
        "parquet" => LazyFrame::scan_parquet(path, Default::default())
            .with_context(|| format!("Failed to load Parquet file: {}", path.display()))?,
        other => anyhow::bail!(
            "Unsupported file format: {}. Supported formats: csv, parquet",
            other
        ),
    };

    let df = lf
        .collect()
        .with_context(|| format!("Failed to read dataset: {}", path.display()))?;

    let (rows, cols) = df.shape();
    info!(path = %path.display(), rows, cols, "Dataset loaded");
    Ok(df)
}

/// Save dataset to file (CSV or Parquet based on extension)
pub fn save_dataset(df: &mut DataFrame, path: &Path) -> Result<()> {
    match extension_of(path).as_str() {
        "csv" => {
            let mut file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path.display()))?;
            CsvWriter::new(&mut file)
                .finish(df)
                .with_context(|| format!("Failed to write CSV file: {}", path.display()))?;
        }
        "parquet" => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path.display()))?;
            ParquetWriter::new(file)
                .finish(df)
                .with_context(|| format!("Failed to write Parquet file: {}", path.display()))?;
        }
        other => anyhow::bail!(
            "Unsupported output format: {}. Supported formats: csv, parquet",
            other
        ),
    }

    info!(path = %path.display(), rows = df.height(), cols = df.width(), "Dataset saved");
    Ok(())
}
