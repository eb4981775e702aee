//! JSON export of pipeline runs and fitted encodings

use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;

use super::summary::PipelineSummary;
use crate::pipeline::{EncodingState, PipelineConfig};

/// Metadata about the pipeline run
#[derive(Serialize)]
pub struct RunMetadata {
    /// Timestamp of the export (ISO 8601 format)
    pub timestamp: String,
    pub tabprep_version: String,
    /// Input file path, if the table came from a file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_column: Option<String>,
}

/// Complete pipeline report with metadata
#[derive(Serialize)]
pub struct PipelineReport<'a> {
    pub metadata: RunMetadata,
    pub config: &'a PipelineConfig,
    pub summary: &'a PipelineSummary,
    pub encodings: &'a [EncodingState],
}

/// Write the configuration, summary and fitted encodings of a run to JSON
pub fn export_pipeline_report(
    config: &PipelineConfig,
    summary: &PipelineSummary,
    encodings: &[EncodingState],
    input_file: Option<&str>,
    output_path: &Path,
) -> Result<()> {
    let report = PipelineReport {
        metadata: RunMetadata {
            timestamp: Utc::now().to_rfc3339(),
            tabprep_version: env!("CARGO_PKG_VERSION").to_string(),
            input_file: input_file.map(|s| s.to_string()),
            target_column: config.target.clone(),
        },
        config,
        summary,
        encodings,
    };

    let json = serde_json::to_string_pretty(&report)
        .context("Failed to serialize pipeline report to JSON")?;

    std::fs::write(output_path, json).with_context(|| {
        format!(
            "Failed to write pipeline report to {}",
            output_path.display()
        )
    })?;

    Ok(())
}

/// Write fitted encodings so they can be applied to another table later
pub fn export_encodings(encodings: &[EncodingState], output_path: &Path) -> Result<()> {
    let json =
        serde_json::to_string_pretty(encodings).context("Failed to serialize encodings to JSON")?;

    std::fs::write(output_path, json)
        .with_context(|| format!("Failed to write encodings to {}", output_path.display()))?;

    Ok(())
}

/// Read encodings written by [`export_encodings`]
pub fn load_encodings(path: &Path) -> Result<Vec<EncodingState>> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read encodings from {}", path.display()))?;
    serde_json::from_str(&json)
        .with_context(|| format!("Invalid encodings file: {}", path.display()))
}
