//! The query algebra: a closed, JSON-encoded program format.
//!
//! A program is an ordered list of `let` statements. Table-level operations
//! are tagged by `"op"`; per-row expressions use single-key objects such as
//! `{"eq": [{"col": "country"}, {"lit": "UK"}]}`.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use super::ExecError;
use crate::data::JoinKind;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Program {
    pub statements: Vec<Statement>,
}

impl Program {
    pub fn parse(code: &str) -> Result<Self, ExecError> {
        let code = code.trim();
        if code.is_empty() {
            return Err(ExecError::Syntax("empty program".into()));
        }
        serde_json::from_str(code).map_err(|e| ExecError::Syntax(e.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Statement {
    #[serde(rename = "let")]
    pub name: String,
    pub expr: Expr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Expr {
    Ref {
        name: String,
    },
    Literal {
        value: Json,
    },
    Filter {
        input: Box<Expr>,
        #[serde(rename = "where")]
        predicate: RowExpr,
    },
    Select {
        input: Box<Expr>,
        columns: Vec<String>,
    },
    Derive {
        input: Box<Expr>,
        column: String,
        value: RowExpr,
    },
    Rename {
        input: Box<Expr>,
        columns: IndexMap<String, String>,
    },
    Sort {
        input: Box<Expr>,
        /// Ignored for series except for the first key's direction.
        #[serde(default)]
        by: Vec<SortKey>,
    },
    Head {
        input: Box<Expr>,
        n: usize,
    },
    Distinct {
        input: Box<Expr>,
        #[serde(default)]
        columns: Option<Vec<String>>,
    },
    Join {
        left: Box<Expr>,
        right: Box<Expr>,
        on: Vec<String>,
        #[serde(default)]
        how: JoinKind,
    },
    Group {
        input: Box<Expr>,
        by: Vec<String>,
        aggregates: Vec<Aggregate>,
    },
    Aggregate {
        input: Box<Expr>,
        column: String,
        func: AggFunc,
    },
    Column {
        input: Box<Expr>,
        name: String,
    },
    GroupSeries {
        input: Box<Expr>,
        by: Vec<String>,
        column: String,
        func: AggFunc,
    },
    ValueCounts {
        input: Box<Expr>,
        column: String,
    },
    Mapping {
        entries: IndexMap<String, Expr>,
    },
    Call {
        func: String,
        #[serde(default)]
        args: Vec<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortKey {
    pub column: String,
    #[serde(default)]
    pub descending: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aggregate {
    pub column: String,
    pub func: AggFunc,
    /// Output column name; defaults to `column`.
    #[serde(default)]
    pub alias: Option<String>,
}

impl Aggregate {
    pub fn output_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.column)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggFunc {
    Sum,
    Mean,
    Min,
    Max,
    Count,
    Nunique,
    First,
}

/// Per-row expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowExpr {
    Col(String),
    Lit(Json),
    Eq(Box<RowExpr>, Box<RowExpr>),
    Ne(Box<RowExpr>, Box<RowExpr>),
    Lt(Box<RowExpr>, Box<RowExpr>),
    Le(Box<RowExpr>, Box<RowExpr>),
    Gt(Box<RowExpr>, Box<RowExpr>),
    Ge(Box<RowExpr>, Box<RowExpr>),
    And(Vec<RowExpr>),
    Or(Vec<RowExpr>),
    Not(Box<RowExpr>),
    IsNull(Box<RowExpr>),
    In(Box<RowExpr>, Vec<Json>),
    Contains(Box<RowExpr>, String),
    Add(Box<RowExpr>, Box<RowExpr>),
    Sub(Box<RowExpr>, Box<RowExpr>),
    Mul(Box<RowExpr>, Box<RowExpr>),
    Div(Box<RowExpr>, Box<RowExpr>),
    Year(Box<RowExpr>),
    Month(Box<RowExpr>),
}

impl RowExpr {
    /// Every column name this expression reads.
    pub fn columns(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_columns(&mut out);
        out
    }

    /// Nodes in this expression tree, the per-row evaluation cost.
    pub fn node_count(&self) -> usize {
        1 + match self {
            RowExpr::Col(_) | RowExpr::Lit(_) => 0,
            RowExpr::Eq(a, b)
            | RowExpr::Ne(a, b)
            | RowExpr::Lt(a, b)
            | RowExpr::Le(a, b)
            | RowExpr::Gt(a, b)
            | RowExpr::Ge(a, b)
            | RowExpr::Add(a, b)
            | RowExpr::Sub(a, b)
            | RowExpr::Mul(a, b)
            | RowExpr::Div(a, b) => a.node_count() + b.node_count(),
            RowExpr::And(xs) | RowExpr::Or(xs) => xs.iter().map(RowExpr::node_count).sum(),
            RowExpr::Not(x)
            | RowExpr::IsNull(x)
            | RowExpr::In(x, _)
            | RowExpr::Contains(x, _)
            | RowExpr::Year(x)
            | RowExpr::Month(x) => x.node_count(),
        }
    }

    fn collect_columns<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            RowExpr::Col(c) => out.push(c),
            RowExpr::Lit(_) => {}
            RowExpr::Eq(a, b)
            | RowExpr::Ne(a, b)
            | RowExpr::Lt(a, b)
            | RowExpr::Le(a, b)
            | RowExpr::Gt(a, b)
            | RowExpr::Ge(a, b)
            | RowExpr::Add(a, b)
            | RowExpr::Sub(a, b)
            | RowExpr::Mul(a, b)
            | RowExpr::Div(a, b) => {
                a.collect_columns(out);
                b.collect_columns(out);
            }
            RowExpr::And(xs) | RowExpr::Or(xs) => xs.iter().for_each(|x| x.collect_columns(out)),
            RowExpr::Not(x)
            | RowExpr::IsNull(x)
            | RowExpr::In(x, _)
            | RowExpr::Contains(x, _)
            | RowExpr::Year(x)
            | RowExpr::Month(x) => x.collect_columns(out),
        }
    }
}
