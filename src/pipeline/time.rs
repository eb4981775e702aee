//! Time-derived features from a numeric seconds column
//!
//! The same field admits two readings, kept as separate operations:
//! - elapsed seconds since an arbitrary reference point ([`derive_elapsed_time_features`])
//! - Unix epoch seconds converted through the calendar ([`derive_calendar_time_features`])

use chrono::{DateTime, Datelike, Timelike};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::columns::{
    column_kind, column_to_f64_vec, is_integer_dtype, require_column, ColumnKind,
};
use crate::error::{PrepError, PrepResult};

pub const SECONDS_PER_DAY: f64 = 86_400.0;
pub const SECONDS_PER_HOUR: f64 = 3_600.0;
pub const DAYS_PER_WEEK: i64 = 7;

/// How a seconds column is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeSemantics {
    /// Seconds since an arbitrary reference, not tied to a calendar
    ElapsedSeconds,
    /// Unix epoch seconds (UTC)
    Calendar,
}

impl std::fmt::Display for TimeSemantics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimeSemantics::ElapsedSeconds => write!(f, "elapsed_seconds"),
            TimeSemantics::Calendar => write!(f, "calendar"),
        }
    }
}

/// Features derived under the elapsed-seconds reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElapsedParts {
    pub day: i64,
    /// 0..=23
    pub hour: i64,
    /// 0..=6, not aligned to any real weekday
    pub weekday: i64,
}

impl ElapsedParts {
    /// Split a seconds value; `None` for non-finite input
    pub fn from_seconds(seconds: f64) -> Option<Self> {
        if !seconds.is_finite() {
            return None;
        }
        let day = seconds.div_euclid(SECONDS_PER_DAY) as i64;
        let hour = seconds.rem_euclid(SECONDS_PER_DAY).div_euclid(SECONDS_PER_HOUR) as i64;
        Some(Self::from_day_and_hour(day, hour))
    }

    /// Split an integer seconds value without going through f64
    pub fn from_whole_seconds(seconds: i64) -> Self {
        let per_day = SECONDS_PER_DAY as i64;
        let day = seconds.div_euclid(per_day);
        let hour = seconds.rem_euclid(per_day) / SECONDS_PER_HOUR as i64;
        Self::from_day_and_hour(day, hour)
    }

    fn from_day_and_hour(day: i64, hour: i64) -> Self {
        Self {
            day,
            hour,
            weekday: day.rem_euclid(DAYS_PER_WEEK),
        }
    }
}

/// Features derived under the calendar reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarParts {
    pub hour_of_day: i64,
    pub day_of_month: i64,
    pub month: i64,
}

impl CalendarParts {
    /// Convert Unix epoch seconds (fractions truncated toward the past).
    /// `None` for non-finite input or timestamps outside the calendar range.
    pub fn from_epoch_seconds(seconds: f64) -> Option<Self> {
        if !seconds.is_finite() {
            return None;
        }
        Self::from_whole_epoch_seconds(seconds.floor() as i64)
    }

    /// Convert integer Unix epoch seconds; `None` outside the calendar range
    pub fn from_whole_epoch_seconds(seconds: i64) -> Option<Self> {
        let timestamp = DateTime::from_timestamp(seconds, 0)?;
        Some(Self {
            hour_of_day: timestamp.hour() as i64,
            day_of_month: timestamp.day() as i64,
            month: timestamp.month() as i64,
        })
    }
}

/// Derive features with the chosen reading of `column`
pub fn derive_time_features(
    df: &DataFrame,
    column: &str,
    semantics: TimeSemantics,
) -> PrepResult<DataFrame> {
    match semantics {
        TimeSemantics::ElapsedSeconds => derive_elapsed_time_features(df, column),
        TimeSemantics::Calendar => derive_calendar_time_features(df, column),
    }
}

/// Add `<column>_day`, `<column>_hour` and `<column>_weekday`, reading the
/// column as seconds elapsed since an arbitrary reference. Missing inputs
/// give missing outputs.
pub fn derive_elapsed_time_features(df: &DataFrame, column: &str) -> PrepResult<DataFrame> {
    let seconds = seconds_values(df, column)?;
    let parts: Vec<Option<ElapsedParts>> = seconds
        .iter()
        .map(|v| v.and_then(Seconds::elapsed_parts))
        .collect();

    let day: Vec<Option<i64>> = parts.iter().map(|p| p.map(|p| p.day)).collect();
    let hour: Vec<Option<i64>> = parts.iter().map(|p| p.map(|p| p.hour)).collect();
    let weekday: Vec<Option<i64>> = parts.iter().map(|p| p.map(|p| p.weekday)).collect();

    debug!(column, semantics = %TimeSemantics::ElapsedSeconds, "Deriving time features");
    let mut out = df.clone();
    out.with_column(Column::new(format!("{}_day", column).into(), day))?;
    out.with_column(Column::new(format!("{}_hour", column).into(), hour))?;
    out.with_column(Column::new(format!("{}_weekday", column).into(), weekday))?;
    Ok(out)
}

/// Add `<column>_hour_of_day`, `<column>_day_of_month` and `<column>_month`,
/// reading the column as Unix epoch seconds in UTC. Missing inputs give
/// missing outputs; timestamps outside the calendar range are rejected.
pub fn derive_calendar_time_features(df: &DataFrame, column: &str) -> PrepResult<DataFrame> {
    let seconds = seconds_values(df, column)?;
    let mut parts: Vec<Option<CalendarParts>> = Vec::with_capacity(seconds.len());
    for value in seconds {
        let part = match value {
            Some(Seconds::Whole(v)) => Some(CalendarParts::from_whole_epoch_seconds(v).ok_or_else(
                || outside_calendar_range(&v.to_string(), column),
            )?),
            Some(Seconds::Fractional(v)) if v.is_finite() => {
                Some(CalendarParts::from_epoch_seconds(v).ok_or_else(|| {
                    outside_calendar_range(&v.to_string(), column)
                })?)
            }
            _ => None,
        };
        parts.push(part);
    }

    let hour: Vec<Option<i64>> = parts.iter().map(|p| p.map(|p| p.hour_of_day)).collect();
    let day: Vec<Option<i64>> = parts.iter().map(|p| p.map(|p| p.day_of_month)).collect();
    let month: Vec<Option<i64>> = parts.iter().map(|p| p.map(|p| p.month)).collect();

    debug!(column, semantics = %TimeSemantics::Calendar, "Deriving time features");
    let mut out = df.clone();
    out.with_column(Column::new(format!("{}_hour_of_day", column).into(), hour))?;
    out.with_column(Column::new(format!("{}_day_of_month", column).into(), day))?;
    out.with_column(Column::new(format!("{}_month", column).into(), month))?;
    Ok(out)
}

fn outside_calendar_range(value: &str, column: &str) -> PrepError {
    PrepError::invalid(format!(
        "value {} in column '{}' is outside the calendar range",
        value, column
    ))
}

/// One reading of a seconds column. Integer storage stays integral so
/// values beyond 2^53 keep their exact day and hour.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Seconds {
    Whole(i64),
    Fractional(f64),
}

impl Seconds {
    fn elapsed_parts(self) -> Option<ElapsedParts> {
        match self {
            Seconds::Whole(v) => Some(ElapsedParts::from_whole_seconds(v)),
            Seconds::Fractional(v) => ElapsedParts::from_seconds(v),
        }
    }
}

fn seconds_values(df: &DataFrame, column: &str) -> PrepResult<Vec<Option<Seconds>>> {
    let col = require_column(df, column)?;
    if column_kind(col) != ColumnKind::Numeric {
        return Err(PrepError::invalid(format!(
            "time column '{}' must be numeric seconds, found {}",
            column,
            col.dtype()
        )));
    }

    let values = match col.dtype() {
        DataType::UInt64 => {
            let cast = col.cast(&DataType::UInt64)?;
            cast.u64()?
                .into_iter()
                .map(|v| {
                    v.map(|n| match i64::try_from(n) {
                        Ok(whole) => Seconds::Whole(whole),
                        Err(_) => Seconds::Fractional(n as f64),
                    })
                })
                .collect()
        }
        dtype if is_integer_dtype(dtype) => {
            let cast = col.cast(&DataType::Int64)?;
            cast.i64()?
                .into_iter()
                .map(|v| v.map(Seconds::Whole))
                .collect()
        }
        _ => column_to_f64_vec(col)?
            .into_iter()
            .map(|v| v.map(Seconds::Fractional))
            .collect(),
    };
    Ok(values)
}
