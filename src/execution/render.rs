//! Bounded text form of an execution outcome, suitable for a model prompt.

use std::fmt;

use indexmap::IndexMap;

use super::{
    value::{Series, Value},
    ExecutionResult,
};
use crate::data::{Scalar, Table};

/// Tables longer than this are cut, with a notice carrying the full count.
pub const MAX_RENDERED_ROWS: usize = 50;

pub const EMPTY_TABLE_SENTINEL: &str = "No results found (empty DataFrame)";

fn null_marker(kind: &str) -> &'static str {
    match kind {
        "int" | "float" | "bool" | "null" => "NaN",
        "timestamp" => "NaT",
        _ => "None",
    }
}

fn dtype(kind: &str) -> &'static str {
    match kind {
        "int" => "int64",
        "float" => "float64",
        "bool" => "bool",
        "timestamp" => "datetime64[ns]",
        _ => "object",
    }
}

/// Index column, then right-aligned fields separated by two spaces.
pub fn render_table(table: &Table) -> String {
    let columns = table.columns();
    let markers: Vec<&str> = columns.iter().map(|c| null_marker(table.column_kind(c))).collect();

    let mut cells: Vec<Vec<String>> = Vec::with_capacity(table.len() + 1);
    let mut header = vec![String::new()];
    header.extend(columns.iter().cloned());
    cells.push(header);
    for (i, row) in table.rows().iter().enumerate() {
        let mut line = vec![i.to_string()];
        line.extend(row.iter().zip(&markers).map(|(v, marker)| match v {
            Scalar::Null => marker.to_string(),
            other => other.to_string(),
        }));
        cells.push(line);
    }

    let widths: Vec<usize> = (0..=columns.len())
        .map(|c| cells.iter().map(|r| r[c].chars().count()).max().unwrap_or(0))
        .collect();

    cells
        .iter()
        .map(|r| {
            let mut line = format!("{:<width$}", r[0], width = widths[0]);
            for (cell, width) in r.iter().zip(&widths).skip(1) {
                line.push_str("  ");
                line.push_str(&format!("{:>width$}", cell, width = *width));
            }
            line.trim_end().to_string()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_series(series: &Series) -> String {
    let kind = series
        .values
        .iter()
        .find(|v| !v.is_null())
        .map(Scalar::kind)
        .unwrap_or("null");
    let footer = match &series.name {
        Some(name) => format!("Name: {}, dtype: {}", name, dtype(kind)),
        None => format!("dtype: {}", dtype(kind)),
    };
    if series.is_empty() {
        return format!("Series([], {})", footer);
    }

    let marker = null_marker(kind);
    let labels: Vec<String> = series.index.iter().map(|l| l.to_string()).collect();
    let values: Vec<String> = series
        .values
        .iter()
        .map(|v| match v {
            Scalar::Null => marker.to_string(),
            other => other.to_string(),
        })
        .collect();
    let lw = labels.iter().map(|l| l.chars().count()).max().unwrap_or(0);
    let vw = values.iter().map(|v| v.chars().count()).max().unwrap_or(0);

    let mut out: Vec<String> = labels
        .iter()
        .zip(&values)
        .map(|(l, v)| format!("{:<lw$}    {:>vw$}", l, v, lw = lw, vw = vw))
        .collect();
    out.push(footer);
    out.join("\n")
}

pub fn render_mapping(mapping: &IndexMap<String, Scalar>) -> String {
    let entries = mapping
        .iter()
        .map(|(k, v)| format!("{}: {}", Scalar::Str(k.clone()).repr(), v.repr()))
        .collect::<Vec<_>>();
    format!("{{{}}}", entries.join(", "))
}

pub fn render_value(value: &Value) -> String {
    match value {
        Value::Table(t) if t.is_empty() => EMPTY_TABLE_SENTINEL.to_string(),
        Value::Table(t) if t.len() > MAX_RENDERED_ROWS => format!(
            "DataFrame with {} rows. First {} rows:\n{}",
            t.len(),
            MAX_RENDERED_ROWS,
            render_table(&t.head(MAX_RENDERED_ROWS))
        ),
        Value::Table(t) => render_table(t),
        Value::Series(s) => render_series(s),
        Value::Mapping(m) => render_mapping(m),
        Value::Scalar(s) => s.to_string(),
    }
}

impl fmt::Display for ExecutionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.value, &self.error) {
            (Some(value), _) if self.success => f.write_str(&render_value(value)),
            (_, Some(error)) => write!(f, "Error: {}", error),
            _ => write!(f, "Error: {}", super::ExecError::MissingResult),
        }
    }
}
