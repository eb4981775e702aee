//! Pipeline configuration and orchestration
//!
//! A [`PipelineConfig`] lists stages to run in order. Stages never call each
//! other; the runner hands each one the previous stage's output table and
//! records what changed.

use std::path::Path;
use std::time::Instant;

use anyhow::Context;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::cleaning::{
    compact_numeric_storage, drop_duplicate_rows, drop_near_constant_columns, fill_missing,
    FillStrategy, DEFAULT_CONSTANT_THRESHOLD,
};
use super::columns::{column_names, require_column};
use super::encoding::{EncodingState, FrequencyEncoding, LabelEncoding, OneHotEncoding};
use super::scoring::{target_vector, AnovaFTest};
use super::selection::{
    select_k_best_univariate, tree_based_select, variance_threshold_select, DEFAULT_K,
};
use super::time::{derive_calendar_time_features, derive_elapsed_time_features};
use super::tree::{CartImportanceModel, DEFAULT_MAX_DEPTH, DEFAULT_MIN_SAMPLES_LEAF};
use crate::error::{PrepError, PrepResult};
use crate::report::{PipelineSummary, StageRecord};
use crate::utils::{create_progress_bar, finish_with_success};

fn default_constant_threshold() -> f64 {
    DEFAULT_CONSTANT_THRESHOLD
}

fn default_k() -> usize {
    DEFAULT_K
}

fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

fn default_min_samples_leaf() -> usize {
    DEFAULT_MIN_SAMPLES_LEAF
}

/// One pipeline stage and its parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum StageConfig {
    DropDuplicateRows,
    DropNearConstantColumns {
        #[serde(default = "default_constant_threshold")]
        threshold: f64,
        #[serde(default)]
        exclude: Vec<String>,
    },
    FillMissing {
        #[serde(default)]
        strategy: FillStrategy,
        #[serde(default)]
        exclude: Vec<String>,
    },
    CompactNumericStorage {
        #[serde(default)]
        exclude: Vec<String>,
    },
    LabelEncode {
        column: String,
    },
    FrequencyEncode {
        column: String,
    },
    OneHotEncode {
        columns: Vec<String>,
    },
    ElapsedTimeFeatures {
        column: String,
    },
    CalendarTimeFeatures {
        column: String,
    },
    VarianceThreshold {
        #[serde(default)]
        threshold: f64,
    },
    SelectKBest {
        #[serde(default = "default_k")]
        k: usize,
    },
    TreeBased {
        #[serde(default)]
        threshold: Option<f64>,
        #[serde(default = "default_max_depth")]
        max_depth: usize,
        #[serde(default = "default_min_samples_leaf")]
        min_samples_leaf: usize,
    },
}

impl StageConfig {
    pub fn name(&self) -> &'static str {
        match self {
            StageConfig::DropDuplicateRows => "drop_duplicate_rows",
            StageConfig::DropNearConstantColumns { .. } => "drop_near_constant_columns",
            StageConfig::FillMissing { .. } => "fill_missing",
            StageConfig::CompactNumericStorage { .. } => "compact_numeric_storage",
            StageConfig::LabelEncode { .. } => "label_encode",
            StageConfig::FrequencyEncode { .. } => "frequency_encode",
            StageConfig::OneHotEncode { .. } => "one_hot_encode",
            StageConfig::ElapsedTimeFeatures { .. } => "elapsed_time_features",
            StageConfig::CalendarTimeFeatures { .. } => "calendar_time_features",
            StageConfig::VarianceThreshold { .. } => "variance_threshold",
            StageConfig::SelectKBest { .. } => "select_k_best",
            StageConfig::TreeBased { .. } => "tree_based",
        }
    }

    /// Whether the stage selects among feature columns (and so must not see
    /// the target column)
    pub fn is_selection(&self) -> bool {
        matches!(
            self,
            StageConfig::VarianceThreshold { .. }
                | StageConfig::SelectKBest { .. }
                | StageConfig::TreeBased { .. }
        )
    }
}

/// A full pipeline run description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Target column: protected from cleaning drops and imputation, split off
    /// during selection, required by supervised selectors
    #[serde(default)]
    pub target: Option<String>,
    /// Show a progress bar over stages
    #[serde(default)]
    pub show_progress: bool,
    pub stages: Vec<StageConfig>,
}

impl PipelineConfig {
    pub fn from_json_str(json: &str) -> anyhow::Result<Self> {
        serde_json::from_str(json).context("Failed to parse pipeline configuration")
    }

    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read pipeline configuration: {}", path.display()))?;
        Self::from_json_str(&json)
            .with_context(|| format!("Invalid pipeline configuration: {}", path.display()))
    }
}

/// Result of a pipeline run
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub table: DataFrame,
    pub summary: PipelineSummary,
    /// Encodings fitted during the run, in stage order, for reuse on other
    /// tables
    pub encodings: Vec<EncodingState>,
}

/// Run every configured stage in order on a copy of `df`
pub fn run_pipeline(df: &DataFrame, config: &PipelineConfig) -> PrepResult<PipelineOutcome> {
    if let Some(target) = &config.target {
        require_column(df, target)?;
    }

    let mut table = df.clone();
    let mut summary = PipelineSummary::new(df.height(), df.width());
    let mut encodings = Vec::new();

    let pb = config
        .show_progress
        .then(|| create_progress_bar(config.stages.len() as u64, "Running stages"));

    for stage in &config.stages {
        let start = Instant::now();
        if let Some(pb) = &pb {
            pb.set_message(stage.name());
        }

        let next = run_stage(&table, stage, config.target.as_deref(), &mut encodings)?;
        let record = StageRecord::between(stage.name(), &table, &next, start.elapsed());
        info!(
            stage = stage.name(),
            rows = next.height(),
            columns = next.width(),
            added = record.added_columns.len(),
            dropped = record.dropped_columns.len(),
            "Stage complete"
        );
        summary.push(record);
        table = next;

        if let Some(pb) = &pb {
            pb.inc(1);
        }
    }

    if let Some(pb) = &pb {
        finish_with_success(pb, "Pipeline complete");
    }

    summary.finish(table.height(), table.width());
    Ok(PipelineOutcome {
        table,
        summary,
        encodings,
    })
}

/// Exclusion list with the target column added
fn with_target<'a>(exclude: &'a [String], target: Option<&'a str>) -> Vec<&'a str> {
    exclude
        .iter()
        .map(String::as_str)
        .chain(target)
        .collect()
}

fn run_stage(
    df: &DataFrame,
    stage: &StageConfig,
    target: Option<&str>,
    encodings: &mut Vec<EncodingState>,
) -> PrepResult<DataFrame> {
    match stage {
        StageConfig::DropDuplicateRows => drop_duplicate_rows(df),
        StageConfig::DropNearConstantColumns { threshold, exclude } => {
            drop_near_constant_columns(df, *threshold, &with_target(exclude, target))
        }
        StageConfig::FillMissing { strategy, exclude } => {
            fill_missing(df, *strategy, &with_target(exclude, target))
        }
        StageConfig::CompactNumericStorage { exclude } => {
            let exclude: Vec<&str> = exclude.iter().map(String::as_str).collect();
            compact_numeric_storage(df, &exclude)
        }
        StageConfig::LabelEncode { column } => {
            let encoding = LabelEncoding::fit(df, column)?;
            let out = encoding.apply(df)?;
            encodings.push(EncodingState::Label(encoding));
            Ok(out)
        }
        StageConfig::FrequencyEncode { column } => {
            let encoding = FrequencyEncoding::fit(df, column)?;
            let out = encoding.apply(df)?;
            encodings.push(EncodingState::Frequency(encoding));
            Ok(out)
        }
        StageConfig::OneHotEncode { columns } => {
            let columns: Vec<&str> = columns.iter().map(String::as_str).collect();
            let encoding = OneHotEncoding::fit(df, &columns)?;
            let out = encoding.apply(df)?;
            encodings.push(EncodingState::OneHot(encoding));
            Ok(out)
        }
        StageConfig::ElapsedTimeFeatures { column } => derive_elapsed_time_features(df, column),
        StageConfig::CalendarTimeFeatures { column } => derive_calendar_time_features(df, column),
        _ => run_selection(df, stage, target),
    }
}

/// Run a selector on the feature columns only, then put the target column
/// back where it was
fn run_selection(df: &DataFrame, stage: &StageConfig, target: Option<&str>) -> PrepResult<DataFrame> {
    let (features, target_column) = match target {
        Some(name) => {
            let column = require_column(df, name)?.clone();
            (df.drop(name)?, Some(column))
        }
        None => (df.clone(), None),
    };

    let labels = || -> PrepResult<Vec<f64>> {
        let column = target_column.as_ref().ok_or_else(|| {
            PrepError::invalid(format!("stage '{}' needs a target column", stage.name()))
        })?;
        target_vector(column)
    };

    let selected = match stage {
        StageConfig::VarianceThreshold { threshold } => {
            variance_threshold_select(&features, *threshold)?
        }
        StageConfig::SelectKBest { k } => {
            select_k_best_univariate(&features, &labels()?, *k, &AnovaFTest)?
        }
        StageConfig::TreeBased {
            threshold,
            max_depth,
            min_samples_leaf,
        } => {
            let mut model = CartImportanceModel::new(*max_depth, *min_samples_leaf);
            tree_based_select(&features, &labels()?, &mut model, *threshold)?
        }
        other => {
            return Err(PrepError::invalid(format!(
                "stage '{}' is not a selection stage",
                other.name()
            )))
        }
    };

    match (target, target_column) {
        (Some(name), Some(column)) => reattach_target(df, selected, name, column),
        _ => Ok(selected),
    }
}

fn reattach_target(
    original: &DataFrame,
    mut selected: DataFrame,
    target: &str,
    column: Column,
) -> PrepResult<DataFrame> {
    let names = column_names(original);
    let kept = column_names(&selected);
    let position = names
        .iter()
        .take_while(|name| name.as_str() != target)
        .filter(|name| kept.contains(name))
        .count();

    selected.insert_column(position, column)?;
    Ok(selected)
}
