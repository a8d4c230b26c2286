//! Runtime values produced by the interpreter.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::data::{Scalar, Table};

/// A one-dimensional labeled sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub name: Option<String>,
    pub index: Vec<Scalar>,
    pub values: Vec<Scalar>,
}

impl Series {
    pub fn new(name: Option<String>, index: Vec<Scalar>, values: Vec<Scalar>) -> Self {
        debug_assert_eq!(index.len(), values.len());
        Self { name, index, values }
    }

    /// Positional labels `0..n`.
    pub fn positional(name: Option<String>, values: Vec<Scalar>) -> Self {
        let index = (0..values.len() as i64).map(Scalar::Int).collect();
        Self { name, index, values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn head(&self, n: usize) -> Series {
        Series {
            name: self.name.clone(),
            index: self.index.iter().take(n).cloned().collect(),
            values: self.values.iter().take(n).cloned().collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Table(Arc<Table>),
    Series(Series),
    /// Ordered name → scalar, e.g. `{client, total}`.
    Mapping(IndexMap<String, Scalar>),
    Scalar(Scalar),
}

impl Value {
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Table(_) => "table",
            Value::Series(_) => "series",
            Value::Mapping(_) => "mapping",
            Value::Scalar(s) => s.kind(),
        }
    }
}

impl From<Table> for Value {
    fn from(t: Table) -> Self {
        Value::Table(Arc::new(t))
    }
}

impl From<Scalar> for Value {
    fn from(s: Scalar) -> Self {
        Value::Scalar(s)
    }
}

impl From<Series> for Value {
    fn from(s: Series) -> Self {
        Value::Series(s)
    }
}
