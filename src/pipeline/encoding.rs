//! Categorical encodings: label, frequency and one-hot
//!
//! Each encoding comes in two forms. The stateless functions
//! ([`label_encode`], [`frequency_encode`], [`one_hot_encode`]) rebuild their
//! mapping from whatever table they are given, so encoding a train and a test
//! split separately yields independent mappings. The fitted states
//! ([`LabelEncoding`], [`FrequencyEncoding`], [`OneHotEncoding`]) separate
//! `fit` from `apply` so one mapping can be reused across tables.

use std::collections::{HashMap, HashSet};

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::columns::{
    column_kind, column_to_string_vec, distinct_in_order, require_column, ColumnKind,
};
use crate::error::{PrepError, PrepResult};

/// Code assigned to missing values and categories unseen at fit time
pub const UNSEEN_LABEL: i64 = -1;

/// Suffix of the label-encoded output column
pub const LABEL_SUFFIX: &str = "_lbl";

/// Suffix of the frequency-encoded output column
pub const FREQUENCY_SUFFIX: &str = "_freq";

/// Fitted label encoding: category -> position in first-occurrence order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelEncoding {
    pub column: String,
    pub categories: Vec<String>,
}

impl LabelEncoding {
    /// Build the mapping from the distinct non-missing values of `column`
    pub fn fit(df: &DataFrame, column: &str) -> PrepResult<Self> {
        let values = column_to_string_vec(require_column(df, column)?)?;
        let categories = distinct_in_order(&values);
        debug!(column, categories = categories.len(), "Fitted label encoding");

        Ok(Self {
            column: column.to_string(),
            categories,
        })
    }

    pub fn output_name(&self) -> String {
        format!("{}{}", self.column, LABEL_SUFFIX)
    }

    /// Code for a single value
    pub fn code_of(&self, value: Option<&str>) -> i64 {
        value
            .and_then(|v| self.categories.iter().position(|c| c == v))
            .map(|i| i as i64)
            .unwrap_or(UNSEEN_LABEL)
    }

    /// Add `<column>_lbl` to a copy of `df`
    pub fn apply(&self, df: &DataFrame) -> PrepResult<DataFrame> {
        let values = column_to_string_vec(require_column(df, &self.column)?)?;
        let lookup: HashMap<&str, i64> = self
            .categories
            .iter()
            .enumerate()
            .map(|(i, c)| (c.as_str(), i as i64))
            .collect();

        let codes: Vec<i64> = values
            .iter()
            .map(|v| {
                v.as_deref()
                    .and_then(|s| lookup.get(s).copied())
                    .unwrap_or(UNSEEN_LABEL)
            })
            .collect();

        let mut out = df.clone();
        out.with_column(Column::new(self.output_name().into(), codes))?;
        Ok(out)
    }
}

/// Fitted frequency encoding: category -> share of non-missing rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrequencyEncoding {
    pub column: String,
    /// (category, frequency) in first-occurrence order
    pub frequencies: Vec<(String, f64)>,
}

impl FrequencyEncoding {
    pub fn fit(df: &DataFrame, column: &str) -> PrepResult<Self> {
        let values = column_to_string_vec(require_column(df, column)?)?;

        let mut counts: HashMap<&str, usize> = HashMap::new();
        let mut order: Vec<&str> = Vec::new();
        for value in values.iter().flatten() {
            let count = counts.entry(value.as_str()).or_insert_with(|| {
                order.push(value.as_str());
                0
            });
            *count += 1;
        }

        let total: usize = counts.values().sum();
        let frequencies = order
            .into_iter()
            .map(|category| {
                let freq = counts[category] as f64 / total as f64;
                (category.to_string(), freq)
            })
            .collect();

        Ok(Self {
            column: column.to_string(),
            frequencies,
        })
    }

    pub fn output_name(&self) -> String {
        format!("{}{}", self.column, FREQUENCY_SUFFIX)
    }

    /// Add `<column>_freq` to a copy of `df`; missing and unseen values get 0
    pub fn apply(&self, df: &DataFrame) -> PrepResult<DataFrame> {
        let values = column_to_string_vec(require_column(df, &self.column)?)?;
        let lookup: HashMap<&str, f64> = self
            .frequencies
            .iter()
            .map(|(c, f)| (c.as_str(), *f))
            .collect();

        let encoded: Vec<f64> = values
            .iter()
            .map(|v| {
                v.as_deref()
                    .and_then(|s| lookup.get(s).copied())
                    .unwrap_or(0.0)
            })
            .collect();

        let mut out = df.clone();
        out.with_column(Column::new(self.output_name().into(), encoded))?;
        Ok(out)
    }
}

/// Categories observed for one one-hot encoded column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OneHotColumn {
    pub column: String,
    pub categories: Vec<String>,
}

impl OneHotColumn {
    pub fn indicator_names(&self) -> Vec<String> {
        self.categories
            .iter()
            .map(|c| format!("{}_{}", self.column, c))
            .collect()
    }
}

/// Fitted one-hot encoding for one or more columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OneHotEncoding {
    pub columns: Vec<OneHotColumn>,
}

impl OneHotEncoding {
    /// Collect the distinct non-missing categories of each column. Numeric
    /// columns order categories by value, all others lexicographically.
    pub fn fit(df: &DataFrame, columns: &[&str]) -> PrepResult<Self> {
        if columns.is_empty() {
            return Err(PrepError::invalid(
                "one-hot encoding needs at least one column",
            ));
        }

        let mut seen = HashSet::new();
        let mut fitted = Vec::with_capacity(columns.len());
        for &name in columns {
            if !seen.insert(name) {
                return Err(PrepError::invalid(format!(
                    "column '{}' listed more than once for one-hot encoding",
                    name
                )));
            }

            let col = require_column(df, name)?;
            let mut categories = distinct_in_order(&column_to_string_vec(col)?);
            if column_kind(col) == ColumnKind::Numeric {
                categories.sort_by(|a, b| {
                    let a: f64 = a.parse().unwrap_or(f64::NAN);
                    let b: f64 = b.parse().unwrap_or(f64::NAN);
                    a.total_cmp(&b)
                });
            } else {
                categories.sort();
            }

            debug!(column = name, categories = categories.len(), "Fitted one-hot encoding");
            fitted.push(OneHotColumn {
                column: name.to_string(),
                categories,
            });
        }

        Ok(Self { columns: fitted })
    }

    /// Replace each encoded column with its indicator columns, appended after
    /// the untouched columns. Missing and unseen values yield all zeros.
    pub fn apply(&self, df: &DataFrame) -> PrepResult<DataFrame> {
        let mut encoded_values = Vec::with_capacity(self.columns.len());
        for fitted in &self.columns {
            encoded_values.push(column_to_string_vec(require_column(df, &fitted.column)?)?);
        }

        let originals: Vec<String> = self.columns.iter().map(|c| c.column.clone()).collect();
        let mut out = df.drop_many(&originals);

        for (fitted, values) in self.columns.iter().zip(encoded_values.iter()) {
            for (category, name) in fitted.categories.iter().zip(fitted.indicator_names()) {
                if out.get_column_index(&name).is_some() {
                    return Err(PrepError::invalid(format!(
                        "indicator column '{}' already exists",
                        name
                    )));
                }

                let indicator: Vec<u8> = values
                    .iter()
                    .map(|v| u8::from(v.as_deref() == Some(category.as_str())))
                    .collect();
                out.with_column(Column::new(name.into(), indicator))?;
            }
        }

        Ok(out)
    }
}

/// Any fitted encoding, for storing a set of encodings together
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EncodingState {
    Label(LabelEncoding),
    Frequency(FrequencyEncoding),
    OneHot(OneHotEncoding),
}

impl EncodingState {
    pub fn apply(&self, df: &DataFrame) -> PrepResult<DataFrame> {
        match self {
            EncodingState::Label(enc) => enc.apply(df),
            EncodingState::Frequency(enc) => enc.apply(df),
            EncodingState::OneHot(enc) => enc.apply(df),
        }
    }
}

/// Apply fitted encodings in order
pub fn apply_encodings(df: &DataFrame, encodings: &[EncodingState]) -> PrepResult<DataFrame> {
    let mut out = df.clone();
    for encoding in encodings {
        out = encoding.apply(&out)?;
    }
    Ok(out)
}

/// Add `<column>_lbl`: distinct values in first-occurrence order map to
/// 0, 1, 2, ...; missing values map to -1. The mapping is rebuilt from `df`.
pub fn label_encode(df: &DataFrame, column: &str) -> PrepResult<DataFrame> {
    LabelEncoding::fit(df, column)?.apply(df)
}

/// Add `<column>_freq`: the share of non-missing rows holding each row's
/// value. Missing values get 0. The frequencies are rebuilt from `df`.
pub fn frequency_encode(df: &DataFrame, column: &str) -> PrepResult<DataFrame> {
    FrequencyEncoding::fit(df, column)?.apply(df)
}

/// Replace each listed column with one 0/1 indicator column per observed
/// category. The categories are rebuilt from `df`.
pub fn one_hot_encode(df: &DataFrame, columns: &[&str]) -> PrepResult<DataFrame> {
    OneHotEncoding::fit(df, columns)?.apply(df)
}
