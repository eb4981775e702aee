//! Column kind detection and value extraction shared by all stages

use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{PrepError, PrepResult};

/// Declared kind of a column, derived from its storage dtype
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnKind {
    /// Integer or floating point storage
    Numeric,
    /// String or categorical storage
    Categorical,
    /// Anything else (booleans, temporal types, nested types)
    Other,
}

impl ColumnKind {
    pub fn of(dtype: &DataType) -> Self {
        if dtype.is_primitive_numeric() {
            ColumnKind::Numeric
        } else if matches!(dtype, DataType::String | DataType::Categorical(_, _)) {
            ColumnKind::Categorical
        } else {
            ColumnKind::Other
        }
    }
}

/// Kind of a single column
pub fn column_kind(col: &Column) -> ColumnKind {
    ColumnKind::of(col.dtype())
}

/// Whether a dtype stores integers
pub fn is_integer_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
    )
}

/// Look up a column, mapping absence to `ColumnNotFound`
pub fn require_column<'a>(df: &'a DataFrame, name: &str) -> PrepResult<&'a Column> {
    df.column(name)
        .map_err(|_| PrepError::ColumnNotFound(name.to_string()))
}

/// Whether `name` appears in an exclusion list. Unknown names in the list
/// are simply never matched.
pub fn is_excluded(name: &str, exclude: &[&str]) -> bool {
    exclude.iter().any(|e| *e == name)
}

/// Convert a column to a Vec of Option<String> for value comparison.
///
/// Nulls and float NaN become `None`. Other floats use the shortest
/// round-trip rendering so two distinct values never share a key, with
/// `-0.0` and `0.0` sharing one.
pub fn column_to_string_vec(col: &Column) -> PrepResult<Vec<Option<String>>> {
    let values: Vec<Option<String>> = match col.dtype() {
        DataType::String => col
            .str()?
            .into_iter()
            .map(|v| v.map(|s| s.to_string()))
            .collect(),
        DataType::Int8 | DataType::Int16 | DataType::Int32 | DataType::Int64 => {
            let cast = col.cast(&DataType::Int64)?;
            cast.i64()?
                .into_iter()
                .map(|v| v.map(|n| n.to_string()))
                .collect()
        }
        DataType::UInt8 | DataType::UInt16 | DataType::UInt32 | DataType::UInt64 => {
            let cast = col.cast(&DataType::UInt64)?;
            cast.u64()?
                .into_iter()
                .map(|v| v.map(|n| n.to_string()))
                .collect()
        }
        DataType::Float32 | DataType::Float64 => {
            let cast = col.cast(&DataType::Float64)?;
            cast.f64()?
                .into_iter()
                .map(|v| v.and_then(float_key))
                .collect()
        }
        DataType::Boolean => col
            .bool()?
            .into_iter()
            .map(|v| v.map(|b| b.to_string()))
            .collect(),
        _ => {
            let cast = col.cast(&DataType::String)?;
            cast.str()?
                .into_iter()
                .map(|v| v.map(|s| s.to_string()))
                .collect()
        }
    };

    Ok(values)
}

fn float_key(n: f64) -> Option<String> {
    if n.is_nan() {
        None
    } else if n == 0.0 {
        Some("0".to_string())
    } else {
        Some(format!("{}", n))
    }
}

/// Extract a numeric column as f64 values, nulls as `None`
pub fn column_to_f64_vec(col: &Column) -> PrepResult<Vec<Option<f64>>> {
    let float_col = col.cast(&DataType::Float64)?;
    Ok(float_col.f64()?.into_iter().collect())
}

/// Distinct non-missing values in first-occurrence order
pub fn distinct_in_order(values: &[Option<String>]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    values
        .iter()
        .flatten()
        .filter(|v| seen.insert(v.as_str()))
        .cloned()
        .collect()
}

/// Names of all columns, owned
pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names().iter().map(|s| s.to_string()).collect()
}
