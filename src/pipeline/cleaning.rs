//! Data cleaning: duplicate rows, near-constant columns, missing values and
//! numeric storage compaction

use std::collections::{HashMap, HashSet};
use std::convert::Infallible;
use std::str::FromStr;

use polars::prelude::*;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::columns::{
    column_kind, column_to_f64_vec, column_to_string_vec, is_excluded, is_integer_dtype,
    ColumnKind,
};
use crate::error::{PrepError, PrepResult};

/// Default top-value frequency above which a column counts as near-constant
pub const DEFAULT_CONSTANT_THRESHOLD: f64 = 0.95;

/// Value written into missing cells of categorical columns
pub const MISSING_CATEGORY: &str = "Missing";

/// Remove rows that exactly repeat an earlier row across all columns.
///
/// The first occurrence is kept and retained rows keep their relative order.
/// Missing values compare equal to each other.
pub fn drop_duplicate_rows(df: &DataFrame) -> PrepResult<DataFrame> {
    if df.height() == 0 || df.width() == 0 {
        return Ok(df.clone());
    }

    let columns: Vec<Vec<Option<String>>> = df
        .get_columns()
        .par_iter()
        .map(column_to_string_vec)
        .collect::<PrepResult<_>>()?;

    let mut seen: HashSet<Vec<Option<&str>>> = HashSet::with_capacity(df.height());
    let keep: Vec<bool> = (0..df.height())
        .map(|row| {
            let key: Vec<Option<&str>> = columns.iter().map(|c| c[row].as_deref()).collect();
            seen.insert(key)
        })
        .collect();

    let removed = keep.iter().filter(|k| !**k).count();
    if removed == 0 {
        return Ok(df.clone());
    }

    debug!(removed, "Dropping duplicate rows");
    let mask = Series::new("keep".into(), keep);
    Ok(df.filter(mask.bool()?)?)
}

/// Value-distribution statistics used to detect near-constant columns
#[derive(Debug, Clone, Serialize)]
pub struct ConstancyStats {
    pub feature_name: String,
    /// Distinct values, with missing counted as one value
    pub distinct_values: usize,
    /// Share of rows holding the most common value (missing included)
    pub top_frequency: f64,
}

/// Compute distinct-value counts and top-value frequencies for every column
/// not in `exclude`, in column order.
pub fn analyze_near_constant_columns(
    df: &DataFrame,
    exclude: &[&str],
) -> PrepResult<Vec<ConstancyStats>> {
    let height = df.height();
    if height == 0 {
        return Ok(Vec::new());
    }

    df.get_columns()
        .par_iter()
        .filter(|col| !is_excluded(col.name().as_str(), exclude))
        .map(|col| -> PrepResult<ConstancyStats> {
            let mut counts: HashMap<Option<String>, usize> = HashMap::new();
            for value in column_to_string_vec(col)? {
                *counts.entry(value).or_insert(0) += 1;
            }
            let top = counts.values().copied().max().unwrap_or(0);

            Ok(ConstancyStats {
                feature_name: col.name().to_string(),
                distinct_values: counts.len(),
                top_frequency: top as f64 / height as f64,
            })
        })
        .collect()
}

/// Columns that hold at most one distinct value, or whose top value
/// frequency is strictly above `threshold`
pub fn get_near_constant_features(stats: &[ConstancyStats], threshold: f64) -> Vec<String> {
    stats
        .iter()
        .filter(|s| s.distinct_values <= 1 || s.top_frequency > threshold)
        .map(|s| s.feature_name.clone())
        .collect()
}

/// Drop columns that are constant or dominated by a single value
pub fn drop_near_constant_columns(
    df: &DataFrame,
    threshold: f64,
    exclude: &[&str],
) -> PrepResult<DataFrame> {
    if df.height() == 0 || df.width() == 0 {
        return Ok(df.clone());
    }

    let stats = analyze_near_constant_columns(df, exclude)?;
    let to_drop = get_near_constant_features(&stats, threshold);

    if to_drop.is_empty() {
        return Ok(df.clone());
    }

    debug!(columns = ?to_drop, threshold, "Dropping near-constant columns");
    Ok(df.drop_many(&to_drop))
}

/// Statistic used to impute missing numeric values
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum FillStrategy {
    #[default]
    Median,
    Mean,
}

impl std::fmt::Display for FillStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FillStrategy::Median => write!(f, "median"),
            FillStrategy::Mean => write!(f, "mean"),
        }
    }
}

/// Anything other than "median" selects the mean.
impl FromStr for FillStrategy {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("median") {
            Ok(FillStrategy::Median)
        } else {
            Ok(FillStrategy::Mean)
        }
    }
}

impl From<String> for FillStrategy {
    fn from(s: String) -> Self {
        match s.parse() {
            Ok(strategy) => strategy,
            Err(never) => match never {},
        }
    }
}

/// Replace missing values: numeric columns with their median or mean,
/// every other column with [`MISSING_CATEGORY`]. Float NaN counts as
/// missing. Excluded columns are left as they are, missing values included.
///
/// Boolean and temporal columns come back as string columns, since
/// [`MISSING_CATEGORY`] cannot be stored in their original dtype.
pub fn fill_missing(
    df: &DataFrame,
    strategy: FillStrategy,
    exclude: &[&str],
) -> PrepResult<DataFrame> {
    let mut out = df.clone();

    for col in df.get_columns() {
        if is_excluded(col.name().as_str(), exclude) {
            continue;
        }
        let missing = missing_count(col)?;
        if missing == 0 {
            continue;
        }

        let filled = match column_kind(col) {
            ColumnKind::Numeric => fill_numeric(col, strategy)?,
            ColumnKind::Categorical | ColumnKind::Other => fill_categorical(col)?,
        };

        debug!(
            column = col.name().as_str(),
            filled = missing,
            %strategy,
            "Filled missing values"
        );
        out.with_column(filled)?;
    }

    Ok(out)
}

/// Nulls plus NaN cells in float columns
fn missing_count(col: &Column) -> PrepResult<usize> {
    let nan_count = match col.dtype() {
        DataType::Float32 | DataType::Float64 => column_to_f64_vec(col)?
            .into_iter()
            .flatten()
            .filter(|v| v.is_nan())
            .count(),
        _ => 0,
    };
    Ok(col.null_count() + nan_count)
}

/// Imputation statistic of a numeric column
#[derive(Debug, Clone, Copy, PartialEq)]
enum FillValue {
    Whole(i128),
    Fractional(f64),
}

fn fill_numeric(col: &Column, strategy: FillStrategy) -> PrepResult<Column> {
    let dtype = col.dtype();
    let fill = if is_integer_dtype(dtype) {
        integer_statistic(&integer_values(col)?, strategy)
    } else {
        let present: Vec<f64> = column_to_f64_vec(col)?
            .into_iter()
            .flatten()
            .filter(|v| !v.is_nan())
            .collect();
        let statistic = match strategy {
            FillStrategy::Median => median(&present),
            FillStrategy::Mean => mean(&present),
        };
        statistic.map(FillValue::Fractional)
    };
    // An all-missing column has no statistic to impute from
    let fill = fill.unwrap_or_else(|| {
        warn!(
            column = col.name().as_str(),
            "Column has no values to impute from, filling with 0"
        );
        FillValue::Whole(0)
    });

    match fill {
        FillValue::Whole(value) if is_integer_dtype(dtype) => fill_integer(col, value),
        FillValue::Whole(value) => fill_float(col, value as f64),
        FillValue::Fractional(value) => fill_float(col, value),
    }
}

fn is_unsigned_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::UInt8 | DataType::UInt16 | DataType::UInt32 | DataType::UInt64
    )
}

/// Present values of an integer column, widened without loss
fn integer_values(col: &Column) -> PrepResult<Vec<i128>> {
    if is_unsigned_dtype(col.dtype()) {
        let cast = col.cast(&DataType::UInt64)?;
        Ok(cast.u64()?.into_iter().flatten().map(i128::from).collect())
    } else {
        let cast = col.cast(&DataType::Int64)?;
        Ok(cast.i64()?.into_iter().flatten().map(i128::from).collect())
    }
}

/// Exact median or mean of integer values. Whole results stay integral so
/// values beyond 2^53 are not rounded through f64.
fn integer_statistic(values: &[i128], strategy: FillStrategy) -> Option<FillValue> {
    if values.is_empty() {
        return None;
    }
    let (sum, count) = match strategy {
        FillStrategy::Median => {
            let mut sorted = values.to_vec();
            sorted.sort_unstable();
            let mid = sorted.len() / 2;
            if sorted.len() % 2 == 0 {
                (sorted[mid - 1] + sorted[mid], 2)
            } else {
                (sorted[mid], 1)
            }
        }
        FillStrategy::Mean => (values.iter().sum::<i128>(), values.len() as i128),
    };

    if sum % count == 0 {
        Some(FillValue::Whole(sum / count))
    } else {
        Some(FillValue::Fractional(sum as f64 / count as f64))
    }
}

/// Fill nulls in native integer storage, leaving present values untouched
fn fill_integer(col: &Column, value: i128) -> PrepResult<Column> {
    let out_of_range = || {
        PrepError::invalid(format!(
            "fill value {} does not fit column '{}'",
            value,
            col.name()
        ))
    };

    let dtype = col.dtype();
    let filled: Series = if is_unsigned_dtype(dtype) {
        let value = u64::try_from(value).map_err(|_| out_of_range())?;
        let cast = col.cast(&DataType::UInt64)?;
        cast.u64()?.fill_null_with_values(value)?.into_series()
    } else {
        let value = i64::try_from(value).map_err(|_| out_of_range())?;
        let cast = col.cast(&DataType::Int64)?;
        cast.i64()?.fill_null_with_values(value)?.into_series()
    };

    Ok(Column::from(filled).cast(dtype)?)
}

/// Fill nulls and NaN through f64. Float32 storage is kept, integer
/// storage widens to Float64.
fn fill_float(col: &Column, value: f64) -> PrepResult<Column> {
    let filled: Vec<f64> = column_to_f64_vec(col)?
        .into_iter()
        .map(|v| match v {
            Some(n) if !n.is_nan() => n,
            _ => value,
        })
        .collect();
    let column = Column::new(col.name().clone(), filled);

    if matches!(col.dtype(), DataType::Float32) {
        Ok(column.cast(&DataType::Float32)?)
    } else {
        Ok(column)
    }
}

fn fill_categorical(col: &Column) -> PrepResult<Column> {
    let filled: Vec<String> = column_to_string_vec(col)?
        .into_iter()
        .map(|v| v.unwrap_or_else(|| MISSING_CATEGORY.to_string()))
        .collect();
    Ok(Column::new(col.name().clone(), filled))
}

/// Median of the given values (mean of the middle pair for even counts)
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Arithmetic mean of the given values
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Narrow every numeric column not in `exclude` to the smallest dtype of the
/// same family (signed, unsigned or float) that holds all of its values
/// exactly. Storage is never widened.
pub fn compact_numeric_storage(df: &DataFrame, exclude: &[&str]) -> PrepResult<DataFrame> {
    let mut out = df.clone();

    for col in df.get_columns() {
        if column_kind(col) != ColumnKind::Numeric || is_excluded(col.name().as_str(), exclude) {
            continue;
        }

        if let Some(narrow) = narrowest_dtype(col)? {
            debug!(
                column = col.name().as_str(),
                from = %col.dtype(),
                to = %narrow,
                "Compacting numeric storage"
            );
            out.with_column(col.cast(&narrow)?)?;
        }
    }

    debug!(
        before_bytes = df.estimated_size(),
        after_bytes = out.estimated_size(),
        "Numeric storage compacted"
    );

    Ok(out)
}

/// Bit width of a numeric dtype
fn dtype_bits(dtype: &DataType) -> usize {
    match dtype {
        DataType::Int8 | DataType::UInt8 => 8,
        DataType::Int16 | DataType::UInt16 => 16,
        DataType::Int32 | DataType::UInt32 | DataType::Float32 => 32,
        DataType::Int64 | DataType::UInt64 | DataType::Float64 => 64,
        _ => usize::MAX,
    }
}

fn narrowest_signed(min: i64, max: i64) -> DataType {
    if min >= i8::MIN as i64 && max <= i8::MAX as i64 {
        DataType::Int8
    } else if min >= i16::MIN as i64 && max <= i16::MAX as i64 {
        DataType::Int16
    } else if min >= i32::MIN as i64 && max <= i32::MAX as i64 {
        DataType::Int32
    } else {
        DataType::Int64
    }
}

fn narrowest_unsigned(max: u64) -> DataType {
    if max <= u8::MAX as u64 {
        DataType::UInt8
    } else if max <= u16::MAX as u64 {
        DataType::UInt16
    } else if max <= u32::MAX as u64 {
        DataType::UInt32
    } else {
        DataType::UInt64
    }
}

/// Smallest lossless dtype for a numeric column, or `None` when the current
/// dtype is already the narrowest
fn narrowest_dtype(col: &Column) -> PrepResult<Option<DataType>> {
    let current = col.dtype();
    let candidate = match current {
        DataType::Int8 | DataType::Int16 | DataType::Int32 | DataType::Int64 => {
            let cast = col.cast(&DataType::Int64)?;
            let (min, max) = cast
                .i64()?
                .into_iter()
                .flatten()
                .fold((0i64, 0i64), |(lo, hi), v| (lo.min(v), hi.max(v)));
            narrowest_signed(min, max)
        }
        DataType::UInt8 | DataType::UInt16 | DataType::UInt32 | DataType::UInt64 => {
            let cast = col.cast(&DataType::UInt64)?;
            let max = cast.u64()?.into_iter().flatten().max().unwrap_or(0);
            narrowest_unsigned(max)
        }
        DataType::Float64 => {
            let cast = col.cast(&DataType::Float64)?;
            let fits_f32 = cast
                .f64()?
                .into_iter()
                .flatten()
                .all(|v| v.is_nan() || (v as f32) as f64 == v);
            if fits_f32 {
                DataType::Float32
            } else {
                DataType::Float64
            }
        }
        _ => return Ok(None),
    };

    if dtype_bits(&candidate) < dtype_bits(current) {
        Ok(Some(candidate))
    } else {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_strategy_parsing() {
        assert_eq!("median".parse::<FillStrategy>().unwrap(), FillStrategy::Median);
        assert_eq!("mean".parse::<FillStrategy>().unwrap(), FillStrategy::Mean);
        // Unknown strategies fall back to the mean
        assert_eq!("mode".parse::<FillStrategy>().unwrap(), FillStrategy::Mean);
    }

    #[test]
    fn test_fill_strategy_deserializes_leniently() {
        let strategy: FillStrategy = serde_json::from_str("\"most_frequent\"").unwrap();
        assert_eq!(strategy, FillStrategy::Mean);
        let strategy: FillStrategy = serde_json::from_str("\"median\"").unwrap();
        assert_eq!(strategy, FillStrategy::Median);
    }

    #[test]
    fn test_median_even_and_odd() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 2.0, 3.0]), Some(2.5));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn test_integer_statistic_stays_exact() {
        let big = 9_007_199_254_740_993i128;
        assert_eq!(
            integer_statistic(&[big, big], FillStrategy::Median),
            Some(FillValue::Whole(big))
        );
        assert_eq!(
            integer_statistic(&[1, 2], FillStrategy::Median),
            Some(FillValue::Fractional(1.5))
        );
        assert_eq!(
            integer_statistic(&[1, 2, 6], FillStrategy::Mean),
            Some(FillValue::Whole(3))
        );
        assert_eq!(integer_statistic(&[], FillStrategy::Mean), None);
    }

    #[test]
    fn test_missing_count_includes_nan() {
        let df = df! { "x" => [Some(1.0f64), Some(f64::NAN), None] }.unwrap();
        assert_eq!(missing_count(df.column("x").unwrap()).unwrap(), 2);
    }

    #[test]
    fn test_mean() {
        assert_eq!(mean(&[1.0, 2.0, 6.0]), Some(3.0));
        assert_eq!(mean(&[]), None);
    }

    #[test]
    fn test_narrowest_signed_boundaries() {
        assert_eq!(narrowest_signed(-128, 127), DataType::Int8);
        assert_eq!(narrowest_signed(-129, 0), DataType::Int16);
        assert_eq!(narrowest_signed(0, 40_000), DataType::Int32);
        assert_eq!(narrowest_signed(0, i64::MAX), DataType::Int64);
    }

    #[test]
    fn test_narrowest_unsigned_boundaries() {
        assert_eq!(narrowest_unsigned(255), DataType::UInt8);
        assert_eq!(narrowest_unsigned(256), DataType::UInt16);
        assert_eq!(narrowest_unsigned(u64::MAX), DataType::UInt64);
    }

    #[test]
    fn test_float_that_needs_f64_stays_wide() {
        let df = df! { "x" => [0.1f64, 0.2] }.unwrap();
        assert_eq!(narrowest_dtype(df.column("x").unwrap()).unwrap(), None);
    }

    #[test]
    fn test_float_exact_in_f32_narrows() {
        let df = df! { "x" => [0.5f64, 1.25, -3.0] }.unwrap();
        assert_eq!(
            narrowest_dtype(df.column("x").unwrap()).unwrap(),
            Some(DataType::Float32)
        );
    }

    #[test]
    fn test_constancy_stats_count_missing_as_value() {
        let df = df! {
            "a" => [Some(1i32), None, None, None],
        }
        .unwrap();
        let stats = analyze_near_constant_columns(&df, &[]).unwrap();
        assert_eq!(stats[0].distinct_values, 2);
        assert!((stats[0].top_frequency - 0.75).abs() < 1e-12);
    }
}
