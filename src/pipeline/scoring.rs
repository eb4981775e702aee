//! Numeric feature matrices, target vectors and univariate scoring
//!
//! [`ScoreFunction`] is the seam for statistical tests used by
//! `select_k_best_univariate`. [`AnovaFTest`] is the built-in provider.

use std::collections::HashMap;

use polars::prelude::*;

use super::columns::{column_kind, column_to_f64_vec, column_to_string_vec, ColumnKind};
use crate::error::{PrepError, PrepResult};

/// Column-major numeric view of a table. Missing values are NaN.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    names: Vec<String>,
    columns: Vec<Vec<f64>>,
    n_rows: usize,
}

impl FeatureMatrix {
    /// Build from named columns of equal length
    pub fn new(names: Vec<String>, columns: Vec<Vec<f64>>) -> PrepResult<Self> {
        if names.len() != columns.len() {
            return Err(PrepError::ShapeMismatch {
                expected: names.len(),
                actual: columns.len(),
            });
        }
        let n_rows = columns.first().map(|c| c.len()).unwrap_or(0);
        if let Some(bad) = columns.iter().find(|c| c.len() != n_rows) {
            return Err(PrepError::ShapeMismatch {
                expected: n_rows,
                actual: bad.len(),
            });
        }
        Ok(Self {
            names,
            columns,
            n_rows,
        })
    }

    /// Convert every column of `df`; fails on any non-numeric column
    pub fn from_frame(df: &DataFrame) -> PrepResult<Self> {
        let mut names = Vec::with_capacity(df.width());
        let mut columns = Vec::with_capacity(df.width());

        for col in df.get_columns() {
            if column_kind(col) != ColumnKind::Numeric {
                return Err(PrepError::invalid(format!(
                    "column '{}' is not numeric ({})",
                    col.name(),
                    col.dtype()
                )));
            }
            names.push(col.name().to_string());
            columns.push(
                column_to_f64_vec(col)?
                    .into_iter()
                    .map(|v| v.unwrap_or(f64::NAN))
                    .collect(),
            );
        }

        Ok(Self {
            names,
            columns,
            n_rows: df.height(),
        })
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_features(&self) -> usize {
        self.columns.len()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn column(&self, index: usize) -> &[f64] {
        &self.columns[index]
    }

    pub fn columns(&self) -> &[Vec<f64>] {
        &self.columns
    }

    pub fn has_missing(&self) -> bool {
        self.columns.iter().any(|c| c.iter().any(|v| v.is_nan()))
    }
}

/// Build a class-label vector from a target column.
///
/// Numeric targets are used as-is; other targets are label encoded in
/// first-occurrence order. Missing targets are rejected.
pub fn target_vector(col: &Column) -> PrepResult<Vec<f64>> {
    if col.null_count() > 0 {
        return Err(PrepError::invalid(format!(
            "target column '{}' contains {} missing value(s)",
            col.name(),
            col.null_count()
        )));
    }

    if column_kind(col) == ColumnKind::Numeric {
        return Ok(column_to_f64_vec(col)?.into_iter().flatten().collect());
    }

    let mut codes: HashMap<String, f64> = HashMap::new();
    let values = column_to_string_vec(col)?;
    Ok(values
        .into_iter()
        .flatten()
        .map(|v| {
            let next = codes.len() as f64;
            *codes.entry(v).or_insert(next)
        })
        .collect())
}

/// Fail with `ShapeMismatch` unless the target has one entry per row
pub fn check_target_len(target: &[f64], n_rows: usize) -> PrepResult<()> {
    if target.len() != n_rows {
        return Err(PrepError::ShapeMismatch {
            expected: n_rows,
            actual: target.len(),
        });
    }
    Ok(())
}

/// Map class labels to dense indices 0..n_classes in first-occurrence order
pub(crate) fn encode_classes(target: &[f64]) -> PrepResult<(Vec<usize>, usize)> {
    let mut index: HashMap<u64, usize> = HashMap::new();
    let mut classes = Vec::with_capacity(target.len());

    for &label in target {
        if label.is_nan() {
            return Err(PrepError::invalid("target contains NaN labels"));
        }
        // -0.0 and 0.0 are the same class
        let key = if label == 0.0 { 0u64 } else { label.to_bits() };
        let next = index.len();
        classes.push(*index.entry(key).or_insert(next));
    }

    Ok((classes, index.len()))
}

/// Per-column score used to rank features against a target
pub trait ScoreFunction {
    /// One score per feature column, higher is better
    fn score(&self, features: &FeatureMatrix, target: &[f64]) -> PrepResult<Vec<f64>>;
}

impl<F> ScoreFunction for F
where
    F: Fn(&FeatureMatrix, &[f64]) -> PrepResult<Vec<f64>>,
{
    fn score(&self, features: &FeatureMatrix, target: &[f64]) -> PrepResult<Vec<f64>> {
        self(features, target)
    }
}

/// One-way ANOVA F-value of each feature across the target classes.
///
/// Constant features produce NaN (zero between- and within-class spread).
#[derive(Debug, Clone, Copy, Default)]
pub struct AnovaFTest;

impl ScoreFunction for AnovaFTest {
    fn score(&self, features: &FeatureMatrix, target: &[f64]) -> PrepResult<Vec<f64>> {
        check_target_len(target, features.n_rows())?;
        if features.has_missing() {
            return Err(PrepError::invalid(
                "ANOVA F-test cannot score features with missing values",
            ));
        }

        let (classes, n_classes) = encode_classes(target)?;
        let n = features.n_rows();
        if n_classes < 2 {
            return Err(PrepError::invalid(
                "ANOVA F-test needs at least two target classes",
            ));
        }
        if n <= n_classes {
            return Err(PrepError::invalid(format!(
                "ANOVA F-test needs more rows ({}) than classes ({})",
                n, n_classes
            )));
        }

        let mut class_sizes = vec![0usize; n_classes];
        for &c in &classes {
            class_sizes[c] += 1;
        }

        let df_between = (n_classes - 1) as f64;
        let df_within = (n - n_classes) as f64;

        Ok(features
            .columns()
            .iter()
            .map(|values| {
                let mut class_sums = vec![0.0f64; n_classes];
                let mut sum = 0.0;
                let mut sum_sq = 0.0;
                for (&x, &c) in values.iter().zip(classes.iter()) {
                    class_sums[c] += x;
                    sum += x;
                    sum_sq += x * x;
                }

                let correction = sum * sum / n as f64;
                let ss_total = sum_sq - correction;
                let ss_between: f64 = class_sums
                    .iter()
                    .zip(class_sizes.iter())
                    .map(|(&s, &size)| s * s / size as f64)
                    .sum::<f64>()
                    - correction;
                let ss_within = ss_total - ss_between;

                (ss_between / df_between) / (ss_within / df_within)
            })
            .collect())
    }
}
