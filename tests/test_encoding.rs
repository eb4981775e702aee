//! Integration tests for categorical encodings and time-derived features

use polars::prelude::*;
use tabprep::pipeline::*;
use tabprep::PrepError;

#[path = "common/mod.rs"]
mod common;

use common::*;

fn i64_values(df: &DataFrame, name: &str) -> Vec<Option<i64>> {
    let col = df.column(name).unwrap().cast(&DataType::Int64).unwrap();
    col.i64().unwrap().into_iter().collect()
}

// ============================================================================
// Label encoding
// ============================================================================

#[test]
fn test_label_encode_first_occurrence_codes() {
    let df = create_transaction_dataframe();
    let out = label_encode(&df, "ProductCD").unwrap();

    // W, W, C, W, H, W, R, C
    assert_eq!(
        i64_values(&out, "ProductCD_lbl"),
        vec![Some(0), Some(0), Some(1), Some(0), Some(2), Some(0), Some(3), Some(1)]
    );
    assert_has_columns(&out, &["ProductCD"]);
}

#[test]
fn test_label_encode_missing_maps_to_minus_one() {
    let df = create_transaction_dataframe();
    let out = label_encode(&df, "card4").unwrap();
    let codes = i64_values(&out, "card4_lbl");

    assert_eq!(codes[3], Some(-1));
    assert!(codes.iter().all(|c| c.is_some()));
}

#[test]
fn test_label_encode_unknown_column() {
    let df = create_transaction_dataframe();
    assert!(matches!(
        label_encode(&df, "missing_col"),
        Err(PrepError::ColumnNotFound(name)) if name == "missing_col"
    ));
}

#[test]
fn test_stateless_encoding_is_deterministic() {
    let df = create_transaction_dataframe();
    let first = label_encode(&df, "card4").unwrap();
    let second = label_encode(&df, "card4").unwrap();
    assert!(first.equals_missing(&second));
}

#[test]
fn test_stateless_encoding_diverges_across_tables() {
    let train = df! { "card" => ["visa", "amex", "visa"] }.unwrap();
    let test = df! { "card" => ["amex", "visa"] }.unwrap();

    let train_out = label_encode(&train, "card").unwrap();
    let test_out = label_encode(&test, "card").unwrap();

    // "amex" is 1 in train but 0 in test: mappings are rebuilt per call
    assert_eq!(i64_values(&train_out, "card_lbl")[1], Some(1));
    assert_eq!(i64_values(&test_out, "card_lbl")[0], Some(0));
}

#[test]
fn test_fitted_label_encoding_is_consistent_across_tables() {
    let train = df! { "card" => ["visa", "amex", "visa"] }.unwrap();
    let test = df! { "card" => ["amex", "discover", "visa"] }.unwrap();

    let encoding = LabelEncoding::fit(&train, "card").unwrap();
    let out = encoding.apply(&test).unwrap();
    assert_eq!(i64_values(&out, "card_lbl"), vec![Some(1), Some(-1), Some(0)]);
}

// ============================================================================
// Frequency encoding
// ============================================================================

#[test]
fn test_frequency_encode_values() {
    let df = df! { "p" => [Some("a"), Some("b"), Some("a"), None, Some("a")] }.unwrap();
    let out = frequency_encode(&df, "p").unwrap();

    assert_eq!(
        f64_values(&out, "p_freq"),
        vec![Some(0.75), Some(0.25), Some(0.75), Some(0.0), Some(0.75)]
    );
}

#[test]
fn test_frequencies_sum_to_one() {
    let df = create_transaction_dataframe();
    let encoding = FrequencyEncoding::fit(&df, "card4").unwrap();
    let sum: f64 = encoding.frequencies.iter().map(|(_, f)| f).sum();
    assert!((sum - 1.0).abs() < 1e-12);
}

#[test]
fn test_fitted_frequency_unseen_is_zero() {
    let train = df! { "p" => ["a", "b"] }.unwrap();
    let test = df! { "p" => ["c", "a"] }.unwrap();

    let out = FrequencyEncoding::fit(&train, "p").unwrap().apply(&test).unwrap();
    assert_eq!(f64_values(&out, "p_freq"), vec![Some(0.0), Some(0.5)]);
}

// ============================================================================
// One-hot encoding
// ============================================================================

#[test]
fn test_one_hot_replaces_column_with_indicators() {
    let df = create_transaction_dataframe();
    let out = one_hot_encode(&df, &["ProductCD"]).unwrap();

    assert_missing_columns(&out, &["ProductCD"]);
    assert_has_columns(&out, &["ProductCD_C", "ProductCD_H", "ProductCD_R", "ProductCD_W"]);
    assert_eq!(out.width(), df.width() - 1 + 4);
    assert_eq!(out.column("ProductCD_W").unwrap().dtype(), &DataType::UInt8);
}

#[test]
fn test_one_hot_rows_sum_to_one_or_zero() {
    let df = create_transaction_dataframe();
    let encoding = OneHotEncoding::fit(&df, &["card4"]).unwrap();
    let out = encoding.apply(&df).unwrap();

    let indicators = encoding.columns[0].indicator_names();
    for row in 0..out.height() {
        let total: f64 = indicators
            .iter()
            .map(|name| f64_values(&out, name)[row].unwrap())
            .sum();
        // Row 3 holds a missing card
        let expected = if row == 3 { 0.0 } else { 1.0 };
        assert_eq!(total, expected, "row {}", row);
    }
}

#[test]
fn test_one_hot_numeric_categories() {
    let df = df! { "n" => [10i32, 2, 10, 1] }.unwrap();
    let out = one_hot_encode(&df, &["n"]).unwrap();
    assert_eq!(names(&out), vec!["n_1", "n_2", "n_10"]);
}

#[test]
fn test_one_hot_float_nan_is_missing_and_signed_zero_is_one_category() {
    let df = df! { "x" => [-0.0f64, 0.0, f64::NAN, 1.5] }.unwrap();
    let out = one_hot_encode(&df, &["x"]).unwrap();

    assert_eq!(names(&out), vec!["x_0", "x_1.5"]);
    assert_eq!(
        f64_values(&out, "x_0"),
        vec![Some(1.0), Some(1.0), Some(0.0), Some(0.0)]
    );
    assert_eq!(
        f64_values(&out, "x_1.5"),
        vec![Some(0.0), Some(0.0), Some(0.0), Some(1.0)]
    );
}

#[test]
fn test_label_encode_float_nan_and_signed_zero() {
    let df = df! { "x" => [f64::NAN, -0.0, 0.0, 2.0] }.unwrap();
    let out = label_encode(&df, "x").unwrap();
    assert_eq!(
        i64_values(&out, "x_lbl"),
        vec![Some(-1), Some(0), Some(0), Some(1)]
    );
}

#[test]
fn test_one_hot_errors() {
    let df = create_transaction_dataframe();
    assert!(matches!(one_hot_encode(&df, &[]), Err(PrepError::InvalidInput(_))));
    assert!(matches!(
        one_hot_encode(&df, &["ghost"]),
        Err(PrepError::ColumnNotFound(_))
    ));
}

#[test]
fn test_encoding_states_apply_in_order() {
    let train = df! {
        "card" => ["visa", "amex", "visa"],
        "product" => ["W", "C", "W"],
    }
    .unwrap();
    let states = vec![
        EncodingState::Label(LabelEncoding::fit(&train, "card").unwrap()),
        EncodingState::OneHot(OneHotEncoding::fit(&train, &["product"]).unwrap()),
    ];

    let test = df! {
        "card" => ["amex"],
        "product" => ["H"],
    }
    .unwrap();
    let out = apply_encodings(&test, &states).unwrap();

    assert_eq!(names(&out), vec!["card", "card_lbl", "product_C", "product_W"]);
    assert_eq!(i64_values(&out, "card_lbl"), vec![Some(1)]);
    assert_eq!(f64_values(&out, "product_C"), vec![Some(0.0)]);
    assert_eq!(f64_values(&out, "product_W"), vec![Some(0.0)]);
}

// ============================================================================
// Time features
// ============================================================================

#[test]
fn test_elapsed_features_ranges() {
    let df = create_transaction_dataframe();
    let out = derive_elapsed_time_features(&df, "TransactionDT").unwrap();

    for hour in i64_values(&out, "TransactionDT_hour") {
        assert!((0..24).contains(&hour.unwrap()));
    }
    for weekday in i64_values(&out, "TransactionDT_weekday") {
        assert!((0..7).contains(&weekday.unwrap()));
    }
    assert_eq!(i64_values(&out, "TransactionDT_day")[0], Some(1));
    assert_eq!(i64_values(&out, "TransactionDT_hour")[2], Some(1));
}

#[test]
fn test_adding_a_day_shifts_day_only() {
    let base = df! { "t" => [3_600.0f64, 50_000.0, 600_000.5] }.unwrap();
    let shifted = df! { "t" => [90_000.0f64, 136_400.0, 686_400.5] }.unwrap();

    let a = derive_elapsed_time_features(&base, "t").unwrap();
    let b = derive_elapsed_time_features(&shifted, "t").unwrap();

    for (da, db) in i64_values(&a, "t_day").iter().zip(i64_values(&b, "t_day")) {
        assert_eq!(da.unwrap() + 1, db.unwrap());
    }
    assert_eq!(i64_values(&a, "t_hour"), i64_values(&b, "t_hour"));
}

#[test]
fn test_elapsed_features_integer_column_beyond_f64_precision() {
    // One second before a day boundary, past 2^54
    let seconds = 208_499_982_749i64 * 86_400 - 1;
    let df = df! { "t" => [Some(seconds), None, Some(90_000)] }.unwrap();
    let out = derive_elapsed_time_features(&df, "t").unwrap();

    assert_eq!(i64_values(&out, "t_day"), vec![Some(208_499_982_748), None, Some(1)]);
    assert_eq!(i64_values(&out, "t_hour"), vec![Some(23), None, Some(1)]);
    assert_eq!(i64_values(&out, "t_weekday"), vec![Some(1), None, Some(1)]);
}

#[test]
fn test_calendar_features() {
    let df = df! { "ts" => [Some(1_615_734_566i64), None] }.unwrap();
    let out = derive_calendar_time_features(&df, "ts").unwrap();

    assert_eq!(i64_values(&out, "ts_hour_of_day"), vec![Some(15), None]);
    assert_eq!(i64_values(&out, "ts_day_of_month"), vec![Some(14), None]);
    assert_eq!(i64_values(&out, "ts_month"), vec![Some(3), None]);
}

#[test]
fn test_time_features_reject_text_column() {
    let df = create_transaction_dataframe();
    assert!(matches!(
        derive_time_features(&df, "ProductCD", TimeSemantics::ElapsedSeconds),
        Err(PrepError::InvalidInput(_))
    ));
}
