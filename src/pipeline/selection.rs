//! Feature selection: variance threshold, univariate k-best and
//! model-importance based pruning
//!
//! Every selector builds a keep/drop mask for the columns, applies it at once
//! and returns the narrowed copy. Masks are never retained.

use polars::prelude::*;
use rayon::prelude::*;
use tracing::debug;

use super::cleaning::median;
use super::columns::{column_kind, column_names, column_to_f64_vec, ColumnKind};
use super::scoring::{check_target_len, FeatureMatrix, ScoreFunction};
use super::tree::ImportanceModel;
use crate::error::{PrepError, PrepResult};

/// Default number of columns kept by [`select_k_best_univariate`]
pub const DEFAULT_K: usize = 50;

/// Keep the columns whose mask entry is true, in their original order
fn apply_mask(df: &DataFrame, mask: &[bool]) -> PrepResult<DataFrame> {
    let keep: Vec<String> = column_names(df)
        .into_iter()
        .zip(mask.iter())
        .filter(|(_, keep)| **keep)
        .map(|(name, _)| name)
        .collect();

    if keep.len() == df.width() {
        return Ok(df.clone());
    }
    Ok(df.select(keep)?)
}

fn require_all_numeric(df: &DataFrame, operation: &str) -> PrepResult<()> {
    if let Some(col) = df
        .get_columns()
        .iter()
        .find(|col| column_kind(col) != ColumnKind::Numeric)
    {
        return Err(PrepError::invalid(format!(
            "{} requires numeric columns, '{}' is {}",
            operation,
            col.name(),
            col.dtype()
        )));
    }
    Ok(())
}

/// Population variance of each column, ignoring missing values.
///
/// Columns holding one repeated value report exactly zero despite rounding.
/// Columns with no values report NaN.
pub fn analyze_column_variances(df: &DataFrame) -> PrepResult<Vec<(String, f64)>> {
    require_all_numeric(df, "variance selection")?;

    df.get_columns()
        .par_iter()
        .map(|col| -> PrepResult<(String, f64)> {
            let values: Vec<f64> = column_to_f64_vec(col)?
                .into_iter()
                .flatten()
                .filter(|v| !v.is_nan())
                .collect();
            Ok((col.name().to_string(), population_variance(&values)))
        })
        .collect()
}

fn population_variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let (min, max) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    if max == min {
        return 0.0;
    }

    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n
}

/// Columns whose variance is at or below `threshold` (or undefined)
pub fn get_low_variance_features(variances: &[(String, f64)], threshold: f64) -> Vec<String> {
    variances
        .iter()
        .filter(|(_, v)| v.is_nan() || *v <= threshold)
        .map(|(name, _)| name.clone())
        .collect()
}

/// Drop numeric columns with variance <= `threshold`.
///
/// Fails with `InvalidInput` if any column is not numeric.
pub fn variance_threshold_select(df: &DataFrame, threshold: f64) -> PrepResult<DataFrame> {
    let variances = analyze_column_variances(df)?;
    if df.height() == 0 {
        return Ok(df.clone());
    }

    let mask: Vec<bool> = variances
        .iter()
        .map(|(_, v)| !v.is_nan() && *v > threshold)
        .collect();

    debug!(
        dropped = ?get_low_variance_features(&variances, threshold),
        threshold,
        "Variance threshold selection"
    );
    apply_mask(df, &mask)
}

/// Mask keeping the `k` highest scores. Scores are ranked with a stable
/// ascending sort and the last `k` taken, so later columns win ties; NaN
/// ranks lowest.
pub fn top_k_mask(scores: &[f64], k: usize) -> Vec<bool> {
    let cleaned: Vec<f64> = scores
        .iter()
        .map(|s| if s.is_nan() { f64::NEG_INFINITY } else { *s })
        .collect();

    let mut order: Vec<usize> = (0..cleaned.len()).collect();
    order.sort_by(|&a, &b| cleaned[a].total_cmp(&cleaned[b]));

    let mut mask = vec![false; scores.len()];
    for &i in order.iter().rev().take(k) {
        mask[i] = true;
    }
    mask
}

/// Keep the `k` columns scoring highest against `target`, in original order.
///
/// Fails with `InvalidInput` when `k` exceeds the column count or a column is
/// not numeric, and with `ShapeMismatch` when `target` does not have one
/// entry per row.
pub fn select_k_best_univariate(
    df: &DataFrame,
    target: &[f64],
    k: usize,
    scorer: &dyn ScoreFunction,
) -> PrepResult<DataFrame> {
    if k > df.width() {
        return Err(PrepError::invalid(format!(
            "k = {} exceeds the {} available column(s)",
            k,
            df.width()
        )));
    }
    check_target_len(target, df.height())?;

    let features = FeatureMatrix::from_frame(df)?;
    let scores = scorer.score(&features, target)?;
    if scores.len() != df.width() {
        return Err(PrepError::ShapeMismatch {
            expected: df.width(),
            actual: scores.len(),
        });
    }

    let mask = top_k_mask(&scores, k);
    debug!(k, columns = df.width(), "Univariate k-best selection");
    apply_mask(df, &mask)
}

/// Keep columns whose model importance is at least `threshold`, or at least
/// the median importance when no threshold is given.
///
/// The model is fitted on `df`/`target` only if it has no importances yet.
pub fn tree_based_select(
    df: &DataFrame,
    target: &[f64],
    model: &mut dyn ImportanceModel,
    threshold: Option<f64>,
) -> PrepResult<DataFrame> {
    check_target_len(target, df.height())?;

    let importances = match model.feature_importances() {
        Some(importances) => importances,
        None => {
            let features = FeatureMatrix::from_frame(df)?;
            model.fit(&features, target)?;
            model.feature_importances().ok_or_else(|| {
                PrepError::invalid("model reported no feature importances after fitting")
            })?
        }
    };

    if importances.len() != df.width() {
        return Err(PrepError::ShapeMismatch {
            expected: df.width(),
            actual: importances.len(),
        });
    }
    if importances.is_empty() {
        return Ok(df.clone());
    }

    let cutoff = match threshold {
        Some(t) => t,
        None => median(&importances).unwrap_or(f64::NAN),
    };
    let mask: Vec<bool> = importances.iter().map(|&imp| imp >= cutoff).collect();

    debug!(cutoff, kept = mask.iter().filter(|k| **k).count(), "Tree-based selection");
    apply_mask(df, &mask)
}
