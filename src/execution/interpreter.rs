//! Tree-walking evaluator for [`Program`]s.
//!
//! Every evaluated node and every row an operation visits costs one step.
//! Bindings are shared, never mutated; each operation builds a new value.

use std::{cmp::Ordering, collections::HashSet, sync::Arc};

use indexmap::IndexMap;

use super::{
    functions::{sort_series, Builtin},
    ops::{aggregate, arith, date_part, scalar_cmp, scalar_eq, scalar_from_json, truthy, ArithOp, DatePart},
    program::{Aggregate, Expr, Program, RowExpr, SortKey},
    value::{Series, Value},
    ExecError,
};
use crate::data::{Bindings, Scalar, Table};

pub(crate) const RESULT_NAME: &str = "result";

pub(crate) struct Interpreter<'a> {
    bindings: &'a Bindings,
    locals: IndexMap<String, Value>,
    limit: u64,
    used: u64,
}

impl<'a> Interpreter<'a> {
    pub(crate) fn new(bindings: &'a Bindings, limit: u64) -> Self {
        Self {
            bindings,
            locals: IndexMap::new(),
            limit,
            used: 0,
        }
    }

    pub(crate) fn steps_used(&self) -> u64 {
        self.used
    }

    pub(crate) fn run(&mut self, program: &Program) -> Result<Value, ExecError> {
        for statement in &program.statements {
            self.charge(1)?;
            let value = self.eval(&statement.expr)?;
            self.locals.insert(statement.name.clone(), value);
        }
        self.locals
            .swap_remove(RESULT_NAME)
            .ok_or(ExecError::MissingResult)
    }

    fn charge(&mut self, steps: u64) -> Result<(), ExecError> {
        self.used = self.used.saturating_add(steps);
        if self.used > self.limit {
            return Err(ExecError::StepBudget(self.limit));
        }
        Ok(())
    }

    /// A row expression costs one step per node per row.
    fn charge_rows(&mut self, rows: usize, e: &RowExpr) -> Result<(), ExecError> {
        self.charge((rows as u64).saturating_mul(e.node_count() as u64))
    }

    fn lookup(&self, name: &str) -> Result<Value, ExecError> {
        if let Some(v) = self.locals.get(name) {
            return Ok(v.clone());
        }
        self.bindings
            .get(name)
            .map(|t| Value::Table(Arc::clone(t)))
            .ok_or_else(|| ExecError::undefined(name))
    }

    fn table(&mut self, input: &Expr, op: &str) -> Result<Arc<Table>, ExecError> {
        match self.eval(input)? {
            Value::Table(t) => Ok(t),
            other => Err(ExecError::Type(format!(
                "{} expects a table, got {}",
                op,
                other.kind()
            ))),
        }
    }

    fn eval(&mut self, expr: &Expr) -> Result<Value, ExecError> {
        self.charge(1)?;
        match expr {
            Expr::Ref { name } => self.lookup(name),
            Expr::Literal { value } => Ok(Value::Scalar(scalar_from_json(value)?)),
            Expr::Filter { input, predicate } => {
                let table = self.table(input, "filter")?;
                check_columns(&table, predicate)?;
                self.charge_rows(table.len(), predicate)?;
                let mut rows = Vec::new();
                for row in table.rows() {
                    if truthy(&eval_row(&table, row, predicate)?)? {
                        rows.push(row.clone());
                    }
                }
                Ok(Table::new(table.columns().to_vec(), rows).into())
            }
            Expr::Select { input, columns } => {
                let table = self.table(input, "select")?;
                let idx = columns
                    .iter()
                    .map(|c| table.require_column(c))
                    .collect::<Result<Vec<_>, _>>()?;
                self.charge(table.len() as u64)?;
                let rows = table
                    .rows()
                    .iter()
                    .map(|r| idx.iter().map(|&i| r[i].clone()).collect())
                    .collect();
                Ok(Table::new(columns.clone(), rows).into())
            }
            Expr::Derive { input, column, value } => {
                let table = self.table(input, "derive")?;
                check_columns(&table, value)?;
                self.charge_rows(table.len(), value)?;
                let values = table
                    .rows()
                    .iter()
                    .map(|r| eval_row(&table, r, value))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Arc::unwrap_or_clone(table).with_column(column, values).into())
            }
            Expr::Rename { input, columns } => {
                let table = self.table(input, "rename")?;
                for old in columns.keys() {
                    table.require_column(old)?;
                }
                let names = table
                    .columns()
                    .iter()
                    .map(|c| columns.get(c).cloned().unwrap_or_else(|| c.clone()))
                    .collect();
                Ok(Table::new(names, table.rows().to_vec()).into())
            }
            Expr::Sort { input, by } => match self.eval(input)? {
                Value::Table(table) => {
                    let keys = by
                        .iter()
                        .map(|k| table.require_column(&k.column).map(|i| (i, k.descending)))
                        .collect::<Result<Vec<_>, _>>()?;
                    self.charge(table.len() as u64)?;
                    let mut rows = table.rows().to_vec();
                    rows.sort_by(|a, b| compare_rows(a, b, &keys));
                    Ok(Table::new(table.columns().to_vec(), rows).into())
                }
                Value::Series(series) => {
                    self.charge(series.len() as u64)?;
                    let descending = by.first().map(|k: &SortKey| k.descending).unwrap_or(false);
                    Ok(sort_series(series, descending).into())
                }
                other => Err(ExecError::Type(format!(
                    "sort expects a table or series, got {}",
                    other.kind()
                ))),
            },
            Expr::Head { input, n } => match self.eval(input)? {
                Value::Table(t) => Ok(t.head(*n).into()),
                Value::Series(s) => Ok(s.head(*n).into()),
                other => Err(ExecError::Type(format!(
                    "head expects a table or series, got {}",
                    other.kind()
                ))),
            },
            Expr::Distinct { input, columns } => {
                let table = self.table(input, "distinct")?;
                let names = columns.clone().unwrap_or_else(|| table.columns().to_vec());
                let idx = names
                    .iter()
                    .map(|c| table.require_column(c))
                    .collect::<Result<Vec<_>, _>>()?;
                self.charge(table.len() as u64)?;
                let mut seen = HashSet::new();
                let mut rows = Vec::new();
                for row in table.rows() {
                    let projected: Vec<Scalar> = idx.iter().map(|&i| row[i].clone()).collect();
                    if seen.insert(projected.clone()) {
                        rows.push(projected);
                    }
                }
                Ok(Table::new(names, rows).into())
            }
            Expr::Join { left, right, on, how } => {
                let l = self.table(left, "join")?;
                let r = self.table(right, "join")?;
                self.charge((l.len() + r.len()) as u64)?;
                let plan = l.plan_join(&r, on)?;
                self.charge(plan.output_len(*how) as u64)?;
                Ok(plan.build(*how).into())
            }
            Expr::Group { input, by, aggregates } => {
                let table = self.table(input, "group")?;
                Ok(self.group(&table, by, aggregates)?.into())
            }
            Expr::Aggregate { input, column, func } => {
                let table = self.table(input, "aggregate")?;
                self.charge(table.len() as u64)?;
                let values: Vec<&Scalar> = table.column_values(column)?.collect();
                Ok(aggregate(*func, &values)?.into())
            }
            Expr::Column { input, name } => {
                let table = self.table(input, "column")?;
                self.charge(table.len() as u64)?;
                let values = table.column_values(name)?.cloned().collect();
                Ok(Series::positional(Some(name.clone()), values).into())
            }
            Expr::GroupSeries { input, by, column, func } => {
                let table = self.table(input, "group_series")?;
                let agg = Aggregate {
                    column: column.clone(),
                    func: *func,
                    alias: None,
                };
                let grouped = self.group(&table, by, std::slice::from_ref(&agg))?;
                let width = by.len();
                let (index, values) = grouped
                    .rows()
                    .iter()
                    .map(|r| (group_label(&r[..width]), r[width].clone()))
                    .unzip();
                Ok(Series::new(Some(column.clone()), index, values).into())
            }
            Expr::ValueCounts { input, column } => {
                let table = self.table(input, "value_counts")?;
                self.charge(table.len() as u64)?;
                let mut counts: IndexMap<Scalar, i64> = IndexMap::new();
                for v in table.column_values(column)? {
                    if !v.is_null() {
                        *counts.entry(v.clone()).or_insert(0) += 1;
                    }
                }
                let mut pairs: Vec<(Scalar, i64)> = counts.into_iter().collect();
                pairs.sort_by(|a, b| b.1.cmp(&a.1));
                let (index, values) = pairs.into_iter().map(|(k, n)| (k, Scalar::Int(n))).unzip();
                Ok(Series::new(Some("count".into()), index, values).into())
            }
            Expr::Mapping { entries } => {
                let mut out = IndexMap::with_capacity(entries.len());
                for (name, e) in entries {
                    match self.eval(e)? {
                        Value::Scalar(s) => {
                            out.insert(name.clone(), s);
                        }
                        other => {
                            return Err(ExecError::Type(format!(
                                "mapping entry '{}' must be a scalar, got {}",
                                name,
                                other.kind()
                            )))
                        }
                    }
                }
                Ok(Value::Mapping(out))
            }
            Expr::Call { func, args } => {
                let builtin = Builtin::lookup(func)?;
                let args = args
                    .iter()
                    .map(|a| self.eval(a))
                    .collect::<Result<Vec<_>, _>>()?;
                builtin.call(args)
            }
        }
    }

    /// Group by key columns (sorted, null keys dropped), one row per group.
    fn group(&mut self, table: &Table, by: &[String], aggregates: &[Aggregate]) -> Result<Table, ExecError> {
        if by.is_empty() {
            return Err(ExecError::Value("group requires at least one key column".into()));
        }
        let keys = by
            .iter()
            .map(|c| table.require_column(c))
            .collect::<Result<Vec<_>, _>>()?;
        let targets = aggregates
            .iter()
            .map(|a| table.require_column(&a.column))
            .collect::<Result<Vec<_>, _>>()?;
        self.charge(table.len() as u64)?;

        let mut groups: IndexMap<Vec<Scalar>, Vec<usize>> = IndexMap::new();
        for (pos, row) in table.rows().iter().enumerate() {
            let key: Vec<Scalar> = keys.iter().map(|&k| row[k].clone()).collect();
            if key.iter().any(Scalar::is_null) {
                continue;
            }
            groups.entry(key).or_default().push(pos);
        }
        groups.sort_by(|a, _, b, _| compare_keys(a, b));

        let mut rows = Vec::with_capacity(groups.len());
        for (key, members) in groups {
            let mut row = key;
            for (agg, &col) in aggregates.iter().zip(&targets) {
                let values: Vec<&Scalar> = members.iter().map(|&m| &table.rows()[m][col]).collect();
                row.push(aggregate(agg.func, &values)?);
            }
            rows.push(row);
        }
        let mut columns = by.to_vec();
        columns.extend(aggregates.iter().map(|a| a.output_name().to_string()));
        Ok(Table::new(columns, rows))
    }
}

fn group_label(key: &[Scalar]) -> Scalar {
    match key {
        [single] => single.clone(),
        many => Scalar::Str(format!(
            "({})",
            many.iter().map(Scalar::repr).collect::<Vec<_>>().join(", ")
        )),
    }
}

fn compare_keys(a: &[Scalar], b: &[Scalar]) -> Ordering {
    a.iter()
        .zip(b)
        .map(|(x, y)| x.total_cmp(y))
        .find(|o| *o != Ordering::Equal)
        .unwrap_or(Ordering::Equal)
}

/// Nulls sort last whichever direction is requested.
fn compare_rows(a: &[Scalar], b: &[Scalar], keys: &[(usize, bool)]) -> Ordering {
    for &(i, descending) in keys {
        let ord = match (a[i].is_null(), b[i].is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            _ if descending => b[i].total_cmp(&a[i]),
            _ => a[i].total_cmp(&b[i]),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

fn check_columns(table: &Table, e: &RowExpr) -> Result<(), ExecError> {
    for c in e.columns() {
        table.require_column(c)?;
    }
    Ok(())
}

fn compare(table: &Table, row: &[Scalar], a: &RowExpr, b: &RowExpr, symbol: &str, accept: fn(Ordering) -> bool) -> Result<Scalar, ExecError> {
    let (x, y) = (eval_row(table, row, a)?, eval_row(table, row, b)?);
    Ok(Scalar::Bool(scalar_cmp(&x, &y, symbol)?.map(accept).unwrap_or(false)))
}

fn eval_row(table: &Table, row: &[Scalar], e: &RowExpr) -> Result<Scalar, ExecError> {
    let arithmetic = |op, a: &RowExpr, b: &RowExpr| -> Result<Scalar, ExecError> {
        arith(op, &eval_row(table, row, a)?, &eval_row(table, row, b)?)
    };
    match e {
        RowExpr::Col(c) => Ok(row[table.require_column(c)?].clone()),
        RowExpr::Lit(v) => scalar_from_json(v),
        RowExpr::Eq(a, b) => Ok(Scalar::Bool(scalar_eq(&eval_row(table, row, a)?, &eval_row(table, row, b)?)?)),
        RowExpr::Ne(a, b) => {
            let (x, y) = (eval_row(table, row, a)?, eval_row(table, row, b)?);
            if x.is_null() || y.is_null() {
                return Ok(Scalar::Bool(false));
            }
            Ok(Scalar::Bool(!scalar_eq(&x, &y)?))
        }
        RowExpr::Lt(a, b) => compare(table, row, a, b, "<", |o| o == Ordering::Less),
        RowExpr::Le(a, b) => compare(table, row, a, b, "<=", |o| o != Ordering::Greater),
        RowExpr::Gt(a, b) => compare(table, row, a, b, ">", |o| o == Ordering::Greater),
        RowExpr::Ge(a, b) => compare(table, row, a, b, ">=", |o| o != Ordering::Less),
        RowExpr::And(xs) => {
            for x in xs {
                if !truthy(&eval_row(table, row, x)?)? {
                    return Ok(Scalar::Bool(false));
                }
            }
            Ok(Scalar::Bool(true))
        }
        RowExpr::Or(xs) => {
            for x in xs {
                if truthy(&eval_row(table, row, x)?)? {
                    return Ok(Scalar::Bool(true));
                }
            }
            Ok(Scalar::Bool(false))
        }
        RowExpr::Not(x) => Ok(Scalar::Bool(!truthy(&eval_row(table, row, x)?)?)),
        RowExpr::IsNull(x) => Ok(Scalar::Bool(eval_row(table, row, x)?.is_null())),
        RowExpr::In(x, options) => {
            let v = eval_row(table, row, x)?;
            for o in options {
                if scalar_eq(&v, &scalar_from_json(o)?)? {
                    return Ok(Scalar::Bool(true));
                }
            }
            Ok(Scalar::Bool(false))
        }
        RowExpr::Contains(x, needle) => match eval_row(table, row, x)? {
            Scalar::Null => Ok(Scalar::Bool(false)),
            Scalar::Str(s) => Ok(Scalar::Bool(s.to_lowercase().contains(&needle.to_lowercase()))),
            other => Err(ExecError::Type(format!(
                "contains expects a string, got {}",
                other.kind()
            ))),
        },
        RowExpr::Add(a, b) => arithmetic(ArithOp::Add, a, b),
        RowExpr::Sub(a, b) => arithmetic(ArithOp::Sub, a, b),
        RowExpr::Mul(a, b) => arithmetic(ArithOp::Mul, a, b),
        RowExpr::Div(a, b) => arithmetic(ArithOp::Div, a, b),
        RowExpr::Year(x) => date_part(DatePart::Year, &eval_row(table, row, x)?),
        RowExpr::Month(x) => date_part(DatePart::Month, &eval_row(table, row, x)?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: &str) -> Scalar {
        Scalar::Str(v.to_string())
    }

    fn bindings() -> Bindings {
        let clients = Table::new(
            vec!["client_id".into(), "client_name".into(), "country".into()],
            vec![
                vec![s("C1"), s("Acme Corp"), s("UK")],
                vec![s("C2"), s("Bright Ltd"), s("US")],
                vec![s("C3"), s("Cobalt Plc"), s("UK")],
            ],
        );
        let sales = Table::new(
            vec!["client_name".into(), "line_total".into()],
            vec![
                vec![s("Acme Corp"), Scalar::Float(100.0)],
                vec![s("Bright Ltd"), Scalar::Float(50.0)],
                vec![s("Acme Corp"), Scalar::Float(25.5)],
                vec![Scalar::Null, Scalar::Float(7.0)],
            ],
        );
        let mut b = Bindings::new();
        b.insert("clients".into(), Arc::new(clients));
        b.insert("sales".into(), Arc::new(sales));
        b
    }

    fn run(code: &str) -> Result<Value, ExecError> {
        let b = bindings();
        let program = Program::parse(code)?;
        Interpreter::new(&b, 10_000).run(&program)
    }

    fn table(v: Value) -> Arc<Table> {
        match v {
            Value::Table(t) => t,
            other => panic!("expected table, got {:?}", other),
        }
    }

    #[test]
    fn test_filter_and_select() {
        let v = run(r#"[{"let": "result", "expr": {"op": "select",
            "input": {"op": "filter", "input": {"op": "ref", "name": "clients"},
                      "where": {"eq": [{"col": "country"}, {"lit": "UK"}]}},
            "columns": ["client_name"]}}]"#)
        .unwrap();
        let t = table(v);
        assert_eq!(t.rows(), &[vec![s("Acme Corp")], vec![s("Cobalt Plc")]][..]);
    }

    #[test]
    fn test_locals_chain_and_shadow_bindings() {
        let v = run(r#"[
            {"let": "clients", "expr": {"op": "head", "input": {"op": "ref", "name": "clients"}, "n": 1}},
            {"let": "result", "expr": {"op": "call", "func": "len", "args": [{"op": "ref", "name": "clients"}]}}
        ]"#)
        .unwrap();
        assert_eq!(v, Value::Scalar(Scalar::Int(1)));
    }

    #[test]
    fn test_group_sorts_keys_and_drops_null_keys() {
        let v = run(r#"[{"let": "result", "expr": {"op": "group",
            "input": {"op": "ref", "name": "sales"}, "by": ["client_name"],
            "aggregates": [{"column": "line_total", "func": "sum", "alias": "total"}]}}]"#)
        .unwrap();
        let t = table(v);
        assert_eq!(t.columns(), &["client_name".to_string(), "total".to_string()][..]);
        assert_eq!(
            t.rows(),
            &[vec![s("Acme Corp"), Scalar::Float(125.5)], vec![s("Bright Ltd"), Scalar::Float(50.0)]][..]
        );
    }

    #[test]
    fn test_group_series_then_idxmax() {
        let v = run(r#"[
            {"let": "totals", "expr": {"op": "group_series", "input": {"op": "ref", "name": "sales"},
                                       "by": ["client_name"], "column": "line_total", "func": "sum"}},
            {"let": "result", "expr": {"op": "mapping", "entries": {
                "client": {"op": "call", "func": "idxmax", "args": [{"op": "ref", "name": "totals"}]},
                "total": {"op": "call", "func": "max", "args": [{"op": "ref", "name": "totals"}]}}}}
        ]"#)
        .unwrap();
        match v {
            Value::Mapping(m) => {
                assert_eq!(m["client"], s("Acme Corp"));
                assert_eq!(m["total"], Scalar::Float(125.5));
            }
            other => panic!("expected mapping, got {:?}", other),
        }
    }

    #[test]
    fn test_value_counts_descending() {
        let v = run(r#"[{"let": "result", "expr": {"op": "value_counts",
            "input": {"op": "ref", "name": "clients"}, "column": "country"}}]"#)
        .unwrap();
        match v {
            Value::Series(series) => {
                assert_eq!(series.index, vec![s("UK"), s("US")]);
                assert_eq!(series.values, vec![Scalar::Int(2), Scalar::Int(1)]);
            }
            other => panic!("expected series, got {:?}", other),
        }
    }

    #[test]
    fn test_sort_descending_nulls_last() {
        let v = run(r#"[{"let": "result", "expr": {"op": "sort",
            "input": {"op": "ref", "name": "sales"},
            "by": [{"column": "client_name", "descending": true}]}}]"#)
        .unwrap();
        let names: Vec<Scalar> = table(v).column_values("client_name").unwrap().cloned().collect();
        assert_eq!(names, vec![s("Bright Ltd"), s("Acme Corp"), s("Acme Corp"), Scalar::Null]);
    }

    #[test]
    fn test_missing_result_and_unknown_names() {
        let err = run(r#"[{"let": "x", "expr": {"op": "literal", "value": 1}}]"#).unwrap_err();
        assert_eq!(err, ExecError::MissingResult);

        let err = run(r#"[{"let": "result", "expr": {"op": "ref", "name": "os"}}]"#).unwrap_err();
        assert_eq!(err.to_string(), "NameError: name 'os' is not defined");

        let err = run(r#"[{"let": "result", "expr": {"op": "call", "func": "eval",
            "args": [{"op": "literal", "value": "1+1"}]}}]"#)
        .unwrap_err();
        assert_eq!(err.category(), "NameError");
    }

    #[test]
    fn test_unknown_column_is_key_error() {
        let err = run(r#"[{"let": "result", "expr": {"op": "filter", "input": {"op": "ref", "name": "clients"},
            "where": {"eq": [{"col": "region"}, {"lit": "EU"}]}}}]"#)
        .unwrap_err();
        assert_eq!(err.category(), "KeyError");
        assert!(err.to_string().contains("region"));
    }

    #[test]
    fn test_step_budget_is_enforced() {
        let b = bindings();
        let program = Program::parse(
            r#"[{"let": "result", "expr": {"op": "filter", "input": {"op": "ref", "name": "sales"},
                "where": {"is_null": {"col": "client_name"}}}}]"#,
        )
        .unwrap();
        let err = Interpreter::new(&b, 3).run(&program).unwrap_err();
        assert_eq!(err, ExecError::StepBudget(3));

        let mut interp = Interpreter::new(&b, 100);
        interp.run(&program).unwrap();
        // statement, filter and ref nodes, then is_null(col) over 4 rows
        assert_eq!(interp.steps_used(), 1 + 2 + 4 * 2);
    }

    #[test]
    fn test_row_expression_cost_grows_with_depth() {
        let b = bindings();
        let steps = |predicate: &str| {
            let code = format!(
                r#"[{{"let": "result", "expr": {{"op": "filter", "input": {{"op": "ref", "name": "sales"}},
                    "where": {}}}}}]"#,
                predicate
            );
            let mut interp = Interpreter::new(&b, 10_000);
            interp.run(&Program::parse(&code).unwrap()).unwrap();
            interp.steps_used()
        };
        let shallow = steps(r#"{"is_null": {"col": "client_name"}}"#);
        let deep = steps(
            r#"{"and": [{"gt": [{"col": "line_total"}, {"lit": 10}]},
                        {"not": {"is_null": {"col": "client_name"}}}]}"#,
        );
        // and(gt(col, lit), not(is_null(col))) is 7 nodes against 2
        assert_eq!(deep - shallow, 4 * (7 - 2));
    }

    #[test]
    fn test_join_output_is_charged_before_it_is_built() {
        let rows = (0..3000).map(|i| vec![Scalar::Int(1), Scalar::Int(i)]).collect();
        let mut b = Bindings::new();
        b.insert("t".into(), Arc::new(Table::new(vec!["k".into(), "v".into()], rows)));
        let program = Program::parse(
            r#"[{"let": "result", "expr": {"op": "join", "left": {"op": "ref", "name": "t"},
                "right": {"op": "ref", "name": "t"}, "on": ["k"], "how": "inner"}}]"#,
        )
        .unwrap();
        let mut interp = Interpreter::new(&b, 10_000);
        assert_eq!(interp.run(&program).unwrap_err(), ExecError::StepBudget(10_000));
        // the full 3000 x 3000 output was charged in one go
        assert!(interp.steps_used() >= 9_000_000);
    }

    #[test]
    fn test_group_merges_int_and_float_keys() {
        let t = Table::new(
            vec!["k".into(), "n".into()],
            vec![
                vec![Scalar::Int(1), Scalar::Int(10)],
                vec![Scalar::Float(1.0), Scalar::Int(5)],
                vec![Scalar::Float(2.5), Scalar::Int(1)],
            ],
        );
        let mut b = Bindings::new();
        b.insert("t".into(), Arc::new(t));
        let program = Program::parse(
            r#"[{"let": "result", "expr": {"op": "group", "input": {"op": "ref", "name": "t"},
                "by": ["k"], "aggregates": [{"column": "n", "func": "sum"}]}}]"#,
        )
        .unwrap();
        let grouped = table(Interpreter::new(&b, 1_000).run(&program).unwrap());
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped.rows()[0][1], Scalar::Int(15));
    }

    #[test]
    fn test_bindings_are_not_mutated() {
        let b = bindings();
        let program = Program::parse(
            r#"[{"let": "result", "expr": {"op": "derive", "input": {"op": "ref", "name": "sales"},
                "column": "line_total", "value": {"mul": [{"col": "line_total"}, {"lit": 2}]}}}]"#,
        )
        .unwrap();
        Interpreter::new(&b, 1_000).run(&program).unwrap();
        assert_eq!(b["sales"].rows()[0][1], Scalar::Float(100.0));
    }
}
