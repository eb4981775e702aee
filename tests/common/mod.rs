//! Shared test utilities and fixture generators
#![allow(dead_code)]

use polars::prelude::*;
use std::path::PathBuf;
use tempfile::TempDir;

/// Create a small transaction table with known characteristics
///
/// This DataFrame includes:
/// - `isFraud`: Binary target column (0/1)
/// - `TransactionDT`: Seconds since a reference point
/// - `TransactionAmt`: Numeric feature with two missing values
/// - `ProductCD`: Categorical feature
/// - `card4`: Categorical feature with one missing value
/// - `constant_flag`: Single repeated value (always near-constant)
/// - `dist`: Integer feature that fits in a narrower type
pub fn create_transaction_dataframe() -> DataFrame {
    df! {
        "isFraud" => [0i64, 0, 1, 0, 1, 0, 0, 1],
        "TransactionDT" => [86_400i64, 86_401, 90_000, 172_800, 200_000, 259_200, 300_000, 345_600],
        "TransactionAmt" => [Some(68.5f64), Some(29.0), None, Some(59.0), Some(50.0), None, Some(49.0), Some(159.0)],
        "ProductCD" => ["W", "W", "C", "W", "H", "W", "R", "C"],
        "card4" => [Some("discover"), Some("mastercard"), Some("visa"), None, Some("visa"), Some("visa"), Some("mastercard"), Some("visa")],
        "constant_flag" => [1i32; 8],
        "dist" => [19i64, 0, 287, 14, 0, 36, 0, 19],
    }
    .unwrap()
}

/// Create a numeric-only table where feature relevance to `target` is known
pub fn create_selection_dataframe() -> DataFrame {
    df! {
        "target" => [0i32, 0, 0, 0, 0, 1, 1, 1, 1, 1],
        "separator" => [1.0f64, 1.5, 2.0, 2.5, 3.0, 8.0, 8.5, 9.0, 9.5, 10.0],
        "weak" => [1.0f64, 2.0, 1.0, 3.0, 2.0, 2.0, 3.0, 2.0, 4.0, 3.0],
        "noise" => [5.0f64, 8.0, 2.0, 9.0, 1.0, 3.0, 7.0, 4.0, 6.0, 0.0],
        "constant" => [5.0f64; 10],
    }
    .unwrap()
}

/// Create a larger test DataFrame for performance/stress tests
pub fn create_large_test_dataframe(rows: usize, cols: usize) -> DataFrame {
    use rand::Rng;
    let mut rng = rand::thread_rng();

    let mut columns: Vec<Column> = Vec::with_capacity(cols + 1);

    let target: Vec<i32> = (0..rows).map(|_| rng.gen_range(0..2)).collect();
    columns.push(Column::new("target".into(), target));

    for i in 0..cols {
        let values: Vec<Option<f64>> = (0..rows)
            .map(|_| {
                if rng.gen_bool(0.05) {
                    None
                } else {
                    Some(rng.gen::<f64>())
                }
            })
            .collect();
        columns.push(Column::new(format!("feature_{}", i).into(), values));
    }

    DataFrame::new(columns).unwrap()
}

/// Create a temporary directory with a test CSV file
pub fn create_temp_csv(df: &mut DataFrame) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let csv_path = temp_dir.path().join("test_data.csv");

    let mut file = std::fs::File::create(&csv_path).unwrap();
    CsvWriter::new(&mut file).finish(df).unwrap();

    (temp_dir, csv_path)
}

/// Create a temporary directory with a test Parquet file
pub fn create_temp_parquet(df: &mut DataFrame) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let parquet_path = temp_dir.path().join("test_data.parquet");

    let file = std::fs::File::create(&parquet_path).unwrap();
    ParquetWriter::new(file).finish(df).unwrap();

    (temp_dir, parquet_path)
}

/// Column names in order, as owned strings
pub fn names(df: &DataFrame) -> Vec<String> {
    df.get_column_names().iter().map(|s| s.to_string()).collect()
}

/// Assert that a DataFrame has expected shape
pub fn assert_shape(df: &DataFrame, expected_rows: usize, expected_cols: usize) {
    let (rows, cols) = df.shape();
    assert_eq!(rows, expected_rows, "Row count mismatch: expected {}, got {}", expected_rows, rows);
    assert_eq!(cols, expected_cols, "Column count mismatch: expected {}, got {}", expected_cols, cols);
}

/// Assert that a DataFrame contains specific columns
pub fn assert_has_columns(df: &DataFrame, expected_cols: &[&str]) {
    let actual_cols = names(df);
    for col in expected_cols {
        assert!(
            actual_cols.contains(&col.to_string()),
            "Missing expected column: '{}'. Actual columns: {:?}",
            col,
            actual_cols
        );
    }
}

/// Assert that a DataFrame does NOT contain specific columns
pub fn assert_missing_columns(df: &DataFrame, unexpected_cols: &[&str]) {
    let actual_cols = names(df);
    for col in unexpected_cols {
        assert!(
            !actual_cols.contains(&col.to_string()),
            "Unexpected column still present: '{}'",
            col
        );
    }
}

/// Values of a numeric column as f64 (missing values as None)
pub fn f64_values(df: &DataFrame, name: &str) -> Vec<Option<f64>> {
    let col = df.column(name).unwrap().cast(&DataType::Float64).unwrap();
    col.f64().unwrap().into_iter().collect()
}
