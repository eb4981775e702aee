//! Tabprep: Tabular Preprocessing Library
//!
//! Cleaning, categorical encoding, time-feature derivation and feature
//! selection over polars DataFrames, composable into a configured pipeline.

pub mod error;
pub mod pipeline;
pub mod report;
pub mod utils;

pub use error::{PrepError, PrepResult};
