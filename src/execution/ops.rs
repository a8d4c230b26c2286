//! Scalar semantics shared by row expressions, aggregates and builtins.

use std::{cmp::Ordering, collections::HashSet};

use chrono::Datelike;
use serde_json::Value as Json;

use super::{program::AggFunc, ExecError};
use crate::data::{table::parse_timestamp, Scalar};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl ArithOp {
    fn symbol(self) -> &'static str {
        match self {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
            ArithOp::Mul => "*",
            ArithOp::Div => "/",
        }
    }
}

pub(crate) fn scalar_from_json(v: &Json) -> Result<Scalar, ExecError> {
    match v {
        Json::Null => Ok(Scalar::Null),
        Json::Bool(b) => Ok(Scalar::Bool(*b)),
        Json::Number(n) => match n.as_i64() {
            Some(i) => Ok(Scalar::Int(i)),
            None => n
                .as_f64()
                .map(Scalar::Float)
                .ok_or_else(|| ExecError::Value(format!("unsupported number literal {}", n))),
        },
        Json::String(s) => Ok(Scalar::Str(s.clone())),
        Json::Array(_) => Err(ExecError::Type("literal must be a scalar, got array".into())),
        Json::Object(_) => Err(ExecError::Type("literal must be a scalar, got object".into())),
    }
}

fn timestamp_from_str(s: &str) -> Result<chrono::NaiveDateTime, ExecError> {
    parse_timestamp(s).ok_or_else(|| ExecError::Value(format!("cannot compare a date with '{}'", s)))
}

/// Equality with null never matching and numeric kinds compared by value.
pub(crate) fn scalar_eq(a: &Scalar, b: &Scalar) -> Result<bool, ExecError> {
    Ok(match (a, b) {
        (Scalar::Null, _) | (_, Scalar::Null) => false,
        (Scalar::Int(x), Scalar::Int(y)) => x == y,
        (Scalar::Str(x), Scalar::Str(y)) => x == y,
        (Scalar::Timestamp(x), Scalar::Timestamp(y)) => x == y,
        (Scalar::Timestamp(x), Scalar::Str(s)) | (Scalar::Str(s), Scalar::Timestamp(x)) => {
            timestamp_from_str(s)? == *x
        }
        (x, y) if x.is_numeric() && y.is_numeric() => x.as_f64() == y.as_f64(),
        _ => false,
    })
}

/// Ordering for `<`-style comparisons. `None` when either side is null.
pub(crate) fn scalar_cmp(a: &Scalar, b: &Scalar, symbol: &str) -> Result<Option<Ordering>, ExecError> {
    Ok(match (a, b) {
        (Scalar::Null, _) | (_, Scalar::Null) => None,
        (Scalar::Int(x), Scalar::Int(y)) => Some(x.cmp(y)),
        (Scalar::Str(x), Scalar::Str(y)) => Some(x.cmp(y)),
        (Scalar::Timestamp(x), Scalar::Timestamp(y)) => Some(x.cmp(y)),
        (Scalar::Timestamp(x), Scalar::Str(s)) => Some(x.cmp(&timestamp_from_str(s)?)),
        (Scalar::Str(s), Scalar::Timestamp(y)) => Some(timestamp_from_str(s)?.cmp(y)),
        (x, y) if x.is_numeric() && y.is_numeric() => {
            let (x, y) = (x.as_f64().unwrap_or(f64::NAN), y.as_f64().unwrap_or(f64::NAN));
            x.partial_cmp(&y)
        }
        (x, y) => {
            return Err(ExecError::Type(format!(
                "'{}' not supported between instances of '{}' and '{}'",
                symbol,
                x.kind(),
                y.kind()
            )))
        }
    })
}

/// Predicate result to bool; null counts as false.
pub(crate) fn truthy(s: &Scalar) -> Result<bool, ExecError> {
    match s {
        Scalar::Bool(b) => Ok(*b),
        Scalar::Null => Ok(false),
        other => Err(ExecError::Type(format!(
            "condition must be boolean, got {}",
            other.kind()
        ))),
    }
}

pub(crate) fn arith(op: ArithOp, a: &Scalar, b: &Scalar) -> Result<Scalar, ExecError> {
    if a.is_null() || b.is_null() {
        return Ok(Scalar::Null);
    }
    match (op, a, b) {
        (ArithOp::Add, Scalar::Str(x), Scalar::Str(y)) => return Ok(Scalar::Str(format!("{}{}", x, y))),
        (ArithOp::Sub, Scalar::Timestamp(x), Scalar::Timestamp(y)) => {
            return Ok(Scalar::Int((*x - *y).num_days()))
        }
        (ArithOp::Add | ArithOp::Sub | ArithOp::Mul, Scalar::Int(x), Scalar::Int(y)) => {
            let checked = match op {
                ArithOp::Add => x.checked_add(*y),
                ArithOp::Sub => x.checked_sub(*y),
                _ => x.checked_mul(*y),
            };
            if let Some(v) = checked {
                return Ok(Scalar::Int(v));
            }
        }
        _ => {}
    }
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => match op {
            ArithOp::Add => Ok(Scalar::Float(x + y)),
            ArithOp::Sub => Ok(Scalar::Float(x - y)),
            ArithOp::Mul => Ok(Scalar::Float(x * y)),
            ArithOp::Div if y == 0.0 => Err(ExecError::ZeroDivision),
            ArithOp::Div => Ok(Scalar::Float(x / y)),
        },
        _ => Err(ExecError::Type(format!(
            "unsupported operand type(s) for {}: '{}' and '{}'",
            op.symbol(),
            a.kind(),
            b.kind()
        ))),
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum DatePart {
    Year,
    Month,
}

pub(crate) fn date_part(part: DatePart, s: &Scalar) -> Result<Scalar, ExecError> {
    let ts = match s {
        Scalar::Null => return Ok(Scalar::Null),
        other => other.as_timestamp().ok_or_else(|| {
            ExecError::Type(format!("expected a date, got {} '{}'", other.kind(), other))
        })?,
    };
    Ok(Scalar::Int(match part {
        DatePart::Year => ts.year() as i64,
        DatePart::Month => ts.month() as i64,
    }))
}

/// Position of the first minimum/maximum among non-null values.
pub(crate) fn extreme_position(values: &[&Scalar], max: bool) -> Result<Option<usize>, ExecError> {
    let symbol = if max { ">" } else { "<" };
    let mut best: Option<usize> = None;
    for (i, v) in values.iter().enumerate() {
        if v.is_null() {
            continue;
        }
        best = match best {
            None => Some(i),
            Some(b) => {
                let ord = scalar_cmp(v, values[b], symbol)?;
                let better = match ord {
                    Some(Ordering::Greater) => max,
                    Some(Ordering::Less) => !max,
                    _ => false,
                };
                Some(if better { i } else { b })
            }
        };
    }
    Ok(best)
}

fn sum(values: &[&Scalar]) -> Result<Scalar, ExecError> {
    let mut int_total: Option<i64> = Some(0);
    let mut float_total = 0.0f64;
    let mut saw_float = false;
    for v in values {
        match v {
            Scalar::Int(i) => int_total = int_total.and_then(|t| t.checked_add(*i)),
            Scalar::Bool(b) => int_total = int_total.and_then(|t| t.checked_add(*b as i64)),
            Scalar::Float(_) => saw_float = true,
            other => {
                return Err(ExecError::Type(format!("cannot sum values of kind {}", other.kind())))
            }
        }
        float_total += v.as_f64().unwrap_or(0.0);
    }
    Ok(match int_total {
        Some(t) if !saw_float => Scalar::Int(t),
        _ => Scalar::Float(float_total),
    })
}

/// Column/series reduction. Nulls are skipped; `count` counts non-null.
pub(crate) fn aggregate(func: AggFunc, values: &[&Scalar]) -> Result<Scalar, ExecError> {
    let present: Vec<&Scalar> = values.iter().copied().filter(|v| !v.is_null()).collect();
    match func {
        AggFunc::Count => Ok(Scalar::Int(present.len() as i64)),
        AggFunc::Nunique => {
            let distinct: HashSet<&Scalar> = present.iter().copied().collect();
            Ok(Scalar::Int(distinct.len() as i64))
        }
        AggFunc::First => Ok(present.first().map(|v| (*v).clone()).unwrap_or(Scalar::Null)),
        AggFunc::Sum => sum(&present),
        AggFunc::Mean => {
            if present.is_empty() {
                return Ok(Scalar::Null);
            }
            let total = sum(&present)?.as_f64().unwrap_or(0.0);
            Ok(Scalar::Float(total / present.len() as f64))
        }
        AggFunc::Min | AggFunc::Max => {
            let pos = extreme_position(&present, func == AggFunc::Max)?;
            Ok(pos.map(|p| present[p].clone()).unwrap_or(Scalar::Null))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: &str) -> Scalar {
        Scalar::Str(v.to_string())
    }

    #[test]
    fn test_eq_with_nulls_and_mixed_numbers() {
        assert!(!scalar_eq(&Scalar::Null, &Scalar::Null).unwrap());
        assert!(scalar_eq(&Scalar::Int(2), &Scalar::Float(2.0)).unwrap());
        assert!(!scalar_eq(&s("2"), &Scalar::Int(2)).unwrap());
    }

    #[test]
    fn test_timestamp_compares_with_date_string() {
        let ts = Scalar::Timestamp(parse_timestamp("2024-03-15").unwrap());
        assert_eq!(scalar_cmp(&ts, &s("2024-03-01"), ">=").unwrap(), Some(Ordering::Greater));
        assert!(scalar_eq(&ts, &s("2024-03-15")).unwrap());
        assert_eq!(scalar_cmp(&ts, &s("March"), "<").unwrap_err().category(), "ValueError");
    }

    #[test]
    fn test_mismatched_ordering_is_type_error() {
        let err = scalar_cmp(&s("a"), &Scalar::Int(1), "<").unwrap_err();
        assert_eq!(
            err.to_string(),
            "TypeError: '<' not supported between instances of 'str' and 'int'"
        );
    }

    #[test]
    fn test_arith() {
        assert_eq!(arith(ArithOp::Mul, &Scalar::Int(2), &Scalar::Int(3)).unwrap(), Scalar::Int(6));
        assert_eq!(
            arith(ArithOp::Mul, &Scalar::Int(2), &Scalar::Float(100.0)).unwrap(),
            Scalar::Float(200.0)
        );
        assert_eq!(arith(ArithOp::Div, &Scalar::Int(1), &Scalar::Int(0)).unwrap_err(), ExecError::ZeroDivision);
        assert!(arith(ArithOp::Add, &Scalar::Null, &Scalar::Int(1)).unwrap().is_null());
        assert_eq!(arith(ArithOp::Sub, &s("a"), &Scalar::Int(1)).unwrap_err().category(), "TypeError");
    }

    #[test]
    fn test_aggregates_skip_nulls() {
        let vals = [Scalar::Int(1), Scalar::Null, Scalar::Float(2.5), Scalar::Int(1)];
        let refs: Vec<&Scalar> = vals.iter().collect();
        assert_eq!(aggregate(AggFunc::Sum, &refs).unwrap(), Scalar::Float(4.5));
        assert_eq!(aggregate(AggFunc::Count, &refs).unwrap(), Scalar::Int(3));
        assert_eq!(aggregate(AggFunc::Nunique, &refs).unwrap(), Scalar::Int(2));
        assert_eq!(aggregate(AggFunc::Max, &refs).unwrap(), Scalar::Float(2.5));
        assert_eq!(aggregate(AggFunc::Mean, &refs).unwrap(), Scalar::Float(1.5));
        assert!(aggregate(AggFunc::Min, &[]).unwrap().is_null());
        assert_eq!(aggregate(AggFunc::Sum, &[]).unwrap(), Scalar::Int(0));
    }

    #[test]
    fn test_date_part() {
        let ts = Scalar::Timestamp(parse_timestamp("2024-07-09").unwrap());
        assert_eq!(date_part(DatePart::Year, &ts).unwrap(), Scalar::Int(2024));
        assert_eq!(date_part(DatePart::Month, &ts).unwrap(), Scalar::Int(7));
        assert_eq!(date_part(DatePart::Year, &Scalar::Int(3)).unwrap_err().category(), "TypeError");
    }
}
