//! Pipeline summary report generation

use std::fmt;
use std::time::Duration;

use comfy_table::{presets::UTF8_FULL_CONDENSED, Attribute, Cell, Color, Table};
use console::style;
use polars::prelude::DataFrame;
use serde::Serialize;

use crate::pipeline::column_names;

/// What one stage did to the table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageRecord {
    pub stage: String,
    pub rows_before: usize,
    pub rows_after: usize,
    pub columns_before: usize,
    pub columns_after: usize,
    pub added_columns: Vec<String>,
    pub dropped_columns: Vec<String>,
    #[serde(serialize_with = "serialize_millis", rename = "elapsed_ms")]
    pub elapsed: Duration,
}

fn millis(d: Duration) -> f64 {
    d.as_nanos() as f64 / 1e6
}

fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(millis(*d))
}

impl StageRecord {
    /// Compare the tables before and after a stage
    pub fn between(stage: &str, before: &DataFrame, after: &DataFrame, elapsed: Duration) -> Self {
        let before_names = column_names(before);
        let after_names = column_names(after);

        Self {
            stage: stage.to_string(),
            rows_before: before.height(),
            rows_after: after.height(),
            columns_before: before.width(),
            columns_after: after.width(),
            added_columns: after_names
                .iter()
                .filter(|name| !before_names.contains(name))
                .cloned()
                .collect(),
            dropped_columns: before_names
                .iter()
                .filter(|name| !after_names.contains(name))
                .cloned()
                .collect(),
            elapsed,
        }
    }

    pub fn rows_removed(&self) -> usize {
        self.rows_before.saturating_sub(self.rows_after)
    }
}

/// Summary of a full pipeline run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PipelineSummary {
    pub initial_rows: usize,
    pub initial_columns: usize,
    pub final_rows: usize,
    pub final_columns: usize,
    pub stages: Vec<StageRecord>,
}

impl PipelineSummary {
    pub fn new(initial_rows: usize, initial_columns: usize) -> Self {
        Self {
            initial_rows,
            initial_columns,
            final_rows: initial_rows,
            final_columns: initial_columns,
            stages: Vec::new(),
        }
    }

    pub fn push(&mut self, record: StageRecord) {
        self.final_rows = record.rows_after;
        self.final_columns = record.columns_after;
        self.stages.push(record);
    }

    pub fn finish(&mut self, final_rows: usize, final_columns: usize) {
        self.final_rows = final_rows;
        self.final_columns = final_columns;
    }

    /// Every column dropped by any stage, in stage order
    pub fn dropped_columns(&self) -> Vec<String> {
        self.stages
            .iter()
            .flat_map(|s| s.dropped_columns.iter().cloned())
            .collect()
    }

    pub fn added_columns(&self) -> Vec<String> {
        self.stages
            .iter()
            .flat_map(|s| s.added_columns.iter().cloned())
            .collect()
    }

    pub fn total_elapsed(&self) -> Duration {
        self.stages.iter().map(|s| s.elapsed).sum()
    }

    /// Per-stage table with a totals row
    pub fn to_table(&self) -> Table {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL_CONDENSED);
        table.set_header(vec![
            Cell::new("Stage").add_attribute(Attribute::Bold),
            Cell::new("Rows").add_attribute(Attribute::Bold),
            Cell::new("Columns").add_attribute(Attribute::Bold),
            Cell::new("Added").add_attribute(Attribute::Bold),
            Cell::new("Dropped").add_attribute(Attribute::Bold),
            Cell::new("Time").add_attribute(Attribute::Bold),
        ]);

        for record in &self.stages {
            table.add_row(vec![
                Cell::new(&record.stage),
                Cell::new(format!("{} → {}", record.rows_before, record.rows_after)).fg(
                    if record.rows_removed() > 0 {
                        Color::Yellow
                    } else {
                        Color::White
                    },
                ),
                Cell::new(format!("{} → {}", record.columns_before, record.columns_after)),
                Cell::new(record.added_columns.len()).fg(if record.added_columns.is_empty() {
                    Color::White
                } else {
                    Color::Cyan
                }),
                Cell::new(record.dropped_columns.len()).fg(if record.dropped_columns.is_empty() {
                    Color::White
                } else {
                    Color::Red
                }),
                Cell::new(format!("{:.1} ms", millis(record.elapsed))),
            ]);
        }

        table.add_row(vec![
            Cell::new("✅ Total").add_attribute(Attribute::Bold),
            Cell::new(format!("{} → {}", self.initial_rows, self.final_rows))
                .fg(Color::Green)
                .add_attribute(Attribute::Bold),
            Cell::new(format!("{} → {}", self.initial_columns, self.final_columns))
                .fg(Color::Green)
                .add_attribute(Attribute::Bold),
            Cell::new(self.added_columns().len()),
            Cell::new(self.dropped_columns().len()),
            Cell::new(format!("{:.1} ms", millis(self.total_elapsed()))),
        ]);

        table
    }

    /// Render the heading, stage table and dropped-column list
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "\n    {} {}\n",
            style("📋").cyan(),
            style("PIPELINE SUMMARY").white().bold()
        ));
        out.push_str(&format!("    {}\n\n", style("─".repeat(50)).dim()));

        for line in self.to_table().to_string().lines() {
            out.push_str(&format!("    {}\n", line));
        }

        let with_drops: Vec<&StageRecord> = self
            .stages
            .iter()
            .filter(|s| !s.dropped_columns.is_empty())
            .collect();
        if !with_drops.is_empty() {
            out.push_str(&format!(
                "\n    {} {}\n",
                style("📝").cyan(),
                style("DROPPED COLUMNS").white().bold()
            ));
            out.push_str(&format!("    {}\n", style("─".repeat(50)).dim()));

            for record in with_drops {
                out.push_str(&format!(
                    "\n      {} {}:\n",
                    style(&record.stage).yellow(),
                    style(format!("({})", record.dropped_columns.len())).dim()
                ));
                for column in &record.dropped_columns {
                    out.push_str(&format!("        {} {}\n", style("•").dim(), column));
                }
            }
        }

        out
    }

    pub fn display(&self) {
        println!("{}", self.render());
    }
}

impl fmt::Display for PipelineSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render())
    }
}
