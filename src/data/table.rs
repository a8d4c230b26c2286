//! In-memory relation: named columns over row-major scalar cells.

use std::{
    cmp::Ordering,
    fmt,
    hash::{Hash, Hasher},
};

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Formats accepted wherever a string has to stand in for a timestamp.
const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d.%m.%Y"];

/// A single cell value.
#[derive(Debug, Clone)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Timestamp(NaiveDateTime),
}

impl Scalar {
    /// Runtime kind name, used in diagnostics and type errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Scalar::Null => "null",
            Scalar::Bool(_) => "bool",
            Scalar::Int(_) => "int",
            Scalar::Float(_) => "float",
            Scalar::Str(_) => "str",
            Scalar::Timestamp(_) => "timestamp",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Scalar::Bool(_) | Scalar::Int(_) | Scalar::Float(_))
    }

    /// Numeric view; booleans count as 0/1.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Scalar::Int(i) => Some(*i as f64),
            Scalar::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Timestamp view; strings are parsed with the accepted date formats.
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            Scalar::Timestamp(ts) => Some(*ts),
            Scalar::Str(s) => parse_timestamp(s),
            _ => None,
        }
    }

    /// Literal form used inside mappings: strings are quoted.
    pub fn repr(&self) -> String {
        match self {
            Scalar::Str(s) => format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'")),
            Scalar::Timestamp(_) => format!("Timestamp('{}')", self),
            other => other.to_string(),
        }
    }

    /// Total order used for sorting and group keys: nulls last, numbers
    /// numerically, then strings, timestamps.
    pub fn total_cmp(&self, other: &Scalar) -> Ordering {
        fn rank(s: &Scalar) -> u8 {
            match s {
                Scalar::Bool(_) | Scalar::Int(_) | Scalar::Float(_) => 0,
                Scalar::Str(_) => 1,
                Scalar::Timestamp(_) => 2,
                Scalar::Null => 3,
            }
        }
        match (self, other) {
            (Scalar::Int(a), Scalar::Int(b)) => a.cmp(b),
            (Scalar::Str(a), Scalar::Str(b)) => a.cmp(b),
            (Scalar::Timestamp(a), Scalar::Timestamp(b)) => a.cmp(b),
            (a, b) if a.is_numeric() && b.is_numeric() => {
                let (x, y) = (a.as_f64().unwrap_or(f64::NAN), b.as_f64().unwrap_or(f64::NAN));
                x.total_cmp(&y)
            }
            (a, b) => rank(a).cmp(&rank(b)),
        }
    }
}

impl PartialEq for Scalar {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Scalar::Null, Scalar::Null) => true,
            (Scalar::Bool(a), Scalar::Bool(b)) => a == b,
            (Scalar::Int(a), Scalar::Int(b)) => a == b,
            (Scalar::Float(a), Scalar::Float(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Scalar::Int(i), Scalar::Float(f)) | (Scalar::Float(f), Scalar::Int(i)) => {
                integral_float(*f) == Some(*i)
            }
            (Scalar::Str(a), Scalar::Str(b)) => a == b,
            (Scalar::Timestamp(a), Scalar::Timestamp(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Scalar {}

/// Ints and integral floats share a hash so mixed numeric keys still match.
impl Hash for Scalar {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Scalar::Null => 0u8.hash(state),
            Scalar::Bool(b) => {
                1u8.hash(state);
                b.hash(state)
            }
            Scalar::Int(i) => {
                2u8.hash(state);
                i.hash(state)
            }
            Scalar::Float(f) => match integral_float(*f) {
                Some(i) => {
                    2u8.hash(state);
                    i.hash(state)
                }
                None => {
                    3u8.hash(state);
                    let bits = if f.is_nan() { f64::NAN.to_bits() } else { f.to_bits() };
                    bits.hash(state)
                }
            },
            Scalar::Str(s) => {
                4u8.hash(state);
                s.hash(state)
            }
            Scalar::Timestamp(ts) => {
                5u8.hash(state);
                ts.hash(state)
            }
        }
    }
}

/// The exact integer a float holds, if any.
fn integral_float(f: f64) -> Option<i64> {
    const LIMIT: f64 = 9_223_372_036_854_775_808.0; // 2^63
    (f.fract() == 0.0 && f >= -LIMIT && f < LIMIT).then(|| f as i64)
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => write!(f, "None"),
            Scalar::Bool(true) => write!(f, "True"),
            Scalar::Bool(false) => write!(f, "False"),
            Scalar::Int(i) => write!(f, "{}", i),
            Scalar::Float(x) => write!(f, "{}", format_float(*x)),
            Scalar::Str(s) => write!(f, "{}", s),
            Scalar::Timestamp(ts) => {
                if ts.num_seconds_from_midnight() == 0 && ts.nanosecond() == 0 {
                    write!(f, "{}", ts.format("%Y-%m-%d"))
                } else {
                    write!(f, "{}", ts.format("%Y-%m-%d %H:%M:%S"))
                }
            }
        }
    }
}

/// Floats always carry a fractional part (`240.0`, not `240`).
pub fn format_float(x: f64) -> String {
    if x.is_nan() {
        "NaN".to_string()
    } else if x.is_infinite() {
        if x > 0.0 { "inf".to_string() } else { "-inf".to_string() }
    } else if x.fract() == 0.0 && x.abs() < 1e16 {
        format!("{:.1}", x)
    } else {
        format!("{}", x)
    }
}

/// Parse a date or date-time string; dates map to midnight.
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    for fmt in TIMESTAMP_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(ts);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return d.and_hms_opt(0, 0, 0);
        }
    }
    None
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinKind {
    #[default]
    Inner,
    Left,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TableError {
    #[error("column '{column}' not found; available: {available}")]
    MissingColumn { column: String, available: String },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Scalar>>,
}

impl Table {
    /// Rows shorter than the header are padded with nulls, longer ones cut.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Scalar>>) -> Self {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut r| {
                r.resize(width, Scalar::Null);
                r
            })
            .collect();
        Self { columns, rows }
    }

    pub fn empty(columns: Vec<String>) -> Self {
        Self { columns, rows: Vec::new() }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Scalar>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn require_column(&self, name: &str) -> Result<usize, TableError> {
        self.column_index(name).ok_or_else(|| TableError::MissingColumn {
            column: name.to_string(),
            available: self.columns.join(", "),
        })
    }

    pub fn column_values(&self, name: &str) -> Result<impl Iterator<Item = &Scalar>, TableError> {
        let idx = self.require_column(name)?;
        Ok(self.rows.iter().map(move |r| &r[idx]))
    }

    /// Kind of the first non-null cell, or `null` for an all-null column.
    pub fn column_kind(&self, name: &str) -> &'static str {
        self.column_values(name)
            .ok()
            .and_then(|mut vals| vals.find(|v| !v.is_null()).map(Scalar::kind))
            .unwrap_or("null")
    }

    pub fn head(&self, n: usize) -> Table {
        Table {
            columns: self.columns.clone(),
            rows: self.rows.iter().take(n).cloned().collect(),
        }
    }

    /// Append a column, or replace it when the name already exists.
    pub fn with_column(mut self, name: &str, values: Vec<Scalar>) -> Table {
        debug_assert_eq!(values.len(), self.rows.len());
        match self.column_index(name) {
            Some(idx) => {
                for (row, v) in self.rows.iter_mut().zip(values) {
                    row[idx] = v;
                }
            }
            None => {
                self.columns.push(name.to_string());
                for (row, v) in self.rows.iter_mut().zip(values) {
                    row.push(v);
                }
            }
        }
        self
    }

    /// Rewrite every cell of one column in place.
    pub fn try_map_column<E, F>(&mut self, name: &str, mut f: F) -> Result<(), E>
    where
        F: FnMut(&Scalar) -> Result<Scalar, E>,
        E: From<TableError>,
    {
        let idx = self.require_column(name)?;
        for row in self.rows.iter_mut() {
            row[idx] = f(&row[idx])?;
        }
        Ok(())
    }

    /// Join on equally named key columns. Key columns appear once (from the
    /// left side); other clashing names get `_x` / `_y` suffixes. Null keys
    /// never match.
    pub fn join(&self, right: &Table, on: &[String], how: JoinKind) -> Result<Table, TableError> {
        Ok(self.plan_join(right, on)?.build(how))
    }

    /// Index the right side without materializing any output rows.
    pub fn plan_join<'a>(&'a self, right: &'a Table, on: &[String]) -> Result<JoinPlan<'a>, TableError> {
        let left_keys = on
            .iter()
            .map(|k| self.require_column(k))
            .collect::<Result<Vec<_>, _>>()?;
        let right_keys = on
            .iter()
            .map(|k| right.require_column(k))
            .collect::<Result<Vec<_>, _>>()?;

        let mut index: IndexMap<Vec<Scalar>, Vec<usize>> = IndexMap::new();
        for (pos, row) in right.rows.iter().enumerate() {
            if let Some(key) = row_key(row, &right_keys) {
                index.entry(key).or_default().push(pos);
            }
        }

        Ok(JoinPlan {
            left: self,
            right,
            left_keys,
            right_keys,
            index,
        })
    }
}

fn row_key(row: &[Scalar], keys: &[usize]) -> Option<Vec<Scalar>> {
    let key: Vec<Scalar> = keys.iter().map(|&k| row[k].clone()).collect();
    (!key.iter().any(Scalar::is_null)).then_some(key)
}

/// A join whose right side is indexed; the output size is known before
/// any row is built.
pub struct JoinPlan<'a> {
    left: &'a Table,
    right: &'a Table,
    left_keys: Vec<usize>,
    right_keys: Vec<usize>,
    index: IndexMap<Vec<Scalar>, Vec<usize>>,
}

impl JoinPlan<'_> {
    fn matches(&self, row: &[Scalar]) -> Option<&Vec<usize>> {
        row_key(row, &self.left_keys).and_then(|key| self.index.get(&key))
    }

    /// Rows `build(how)` will produce.
    pub fn output_len(&self, how: JoinKind) -> usize {
        self.left
            .rows
            .iter()
            .map(|row| match self.matches(row) {
                Some(positions) => positions.len(),
                None if how == JoinKind::Left => 1,
                None => 0,
            })
            .fold(0usize, usize::saturating_add)
    }

    pub fn build(&self, how: JoinKind) -> Table {
        let (left, right) = (self.left, self.right);
        let right_rest: Vec<usize> = (0..right.columns.len())
            .filter(|i| !self.right_keys.contains(i))
            .collect();

        let mut columns = Vec::with_capacity(left.columns.len() + right_rest.len());
        for (i, c) in left.columns.iter().enumerate() {
            let clashes = !self.left_keys.contains(&i) && right_rest.iter().any(|&j| &right.columns[j] == c);
            columns.push(if clashes { format!("{}_x", c) } else { c.clone() });
        }
        for &j in &right_rest {
            let c = &right.columns[j];
            let clashes = left
                .columns
                .iter()
                .enumerate()
                .any(|(i, lc)| lc == c && !self.left_keys.contains(&i));
            columns.push(if clashes { format!("{}_y", c) } else { c.clone() });
        }

        let mut rows = Vec::new();
        for row in &left.rows {
            match self.matches(row) {
                Some(positions) => {
                    for &p in positions {
                        let mut out = row.clone();
                        out.extend(right_rest.iter().map(|&j| right.rows[p][j].clone()));
                        rows.push(out);
                    }
                }
                None if how == JoinKind::Left => {
                    let mut out = row.clone();
                    out.extend(std::iter::repeat(Scalar::Null).take(right_rest.len()));
                    rows.push(out);
                }
                None => {}
            }
        }

        Table { columns, rows }
    }
}
