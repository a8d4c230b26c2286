//! The fixed function table reachable through `{"op": "call"}`.
//! Any other name is undefined inside a program.

use super::{
    ops::{aggregate, extreme_position, truthy},
    program::AggFunc,
    value::{Series, Value},
    ExecError,
};
use crate::data::Scalar;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Builtin {
    Len,
    Sum,
    Min,
    Max,
    Mean,
    Abs,
    Round,
    Sorted,
    Str,
    Int,
    Float,
    Bool,
    Idxmax,
    Idxmin,
    Nunique,
}

const BUILTINS: &[(&str, Builtin)] = &[
    ("len", Builtin::Len),
    ("sum", Builtin::Sum),
    ("min", Builtin::Min),
    ("max", Builtin::Max),
    ("mean", Builtin::Mean),
    ("abs", Builtin::Abs),
    ("round", Builtin::Round),
    ("sorted", Builtin::Sorted),
    ("str", Builtin::Str),
    ("int", Builtin::Int),
    ("float", Builtin::Float),
    ("bool", Builtin::Bool),
    ("idxmax", Builtin::Idxmax),
    ("idxmin", Builtin::Idxmin),
    ("nunique", Builtin::Nunique),
];

/// Names callable from a program, in documentation order.
pub fn allowed_functions() -> impl Iterator<Item = &'static str> {
    BUILTINS.iter().map(|(name, _)| *name)
}

impl Builtin {
    pub(crate) fn lookup(name: &str) -> Result<Self, ExecError> {
        BUILTINS
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, b)| *b)
            .ok_or_else(|| ExecError::undefined(name))
    }

    fn name(self) -> &'static str {
        BUILTINS
            .iter()
            .find(|(_, b)| *b == self)
            .map(|(n, _)| *n)
            .unwrap_or("?")
    }

    pub(crate) fn call(self, mut args: Vec<Value>) -> Result<Value, ExecError> {
        match self {
            Builtin::Min | Builtin::Max if args.len() > 1 => {
                let scalars = args
                    .iter()
                    .map(|a| match a {
                        Value::Scalar(s) => Ok(s),
                        other => Err(ExecError::Type(format!(
                            "{}() arguments must be scalars, got {}",
                            self.name(),
                            other.kind()
                        ))),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                let pos = extreme_position(&scalars, self == Builtin::Max)?;
                Ok(Value::Scalar(pos.map(|p| scalars[p].clone()).unwrap_or(Scalar::Null)))
            }
            Builtin::Round => {
                if args.is_empty() || args.len() > 2 {
                    return Err(ExecError::Type(format!(
                        "round() takes 1 or 2 arguments ({} given)",
                        args.len()
                    )));
                }
                let ndigits = match args.get(1) {
                    None => None,
                    Some(Value::Scalar(Scalar::Int(n))) => Some(*n),
                    Some(other) => {
                        return Err(ExecError::Type(format!(
                            "round() ndigits must be an int, got {}",
                            other.kind()
                        )))
                    }
                };
                match args.swap_remove(0) {
                    Value::Scalar(s) => Ok(Value::Scalar(round(&s, ndigits)?)),
                    Value::Series(series) => {
                        let values = series
                            .values
                            .iter()
                            .map(|v| round(v, Some(ndigits.unwrap_or(0))))
                            .collect::<Result<Vec<_>, _>>()?;
                        Ok(Value::Series(Series { values, ..series }))
                    }
                    other => Err(ExecError::Type(format!("cannot round a {}", other.kind()))),
                }
            }
            _ => {
                if args.len() != 1 {
                    return Err(ExecError::Type(format!(
                        "{}() takes exactly one argument ({} given)",
                        self.name(),
                        args.len()
                    )));
                }
                self.call_unary(args.swap_remove(0))
            }
        }
    }

    fn call_unary(self, arg: Value) -> Result<Value, ExecError> {
        match self {
            Builtin::Len => len(&arg),
            Builtin::Sum => reduce(self, AggFunc::Sum, arg),
            Builtin::Min => reduce(self, AggFunc::Min, arg),
            Builtin::Max => reduce(self, AggFunc::Max, arg),
            Builtin::Mean => reduce(self, AggFunc::Mean, arg),
            Builtin::Nunique => reduce(self, AggFunc::Nunique, arg),
            Builtin::Abs => match arg {
                Value::Scalar(Scalar::Null) => Ok(Scalar::Null.into()),
                Value::Scalar(Scalar::Int(i)) => Ok(Scalar::Int(i.saturating_abs()).into()),
                Value::Scalar(Scalar::Float(f)) => Ok(Scalar::Float(f.abs()).into()),
                other => Err(ExecError::Type(format!(
                    "bad operand type for abs(): '{}'",
                    other.kind()
                ))),
            },
            Builtin::Sorted => match arg {
                Value::Series(series) => Ok(sort_series(series, false).into()),
                other => Err(ExecError::Type(format!("sorted() expects a series, got {}", other.kind()))),
            },
            Builtin::Idxmax | Builtin::Idxmin => match arg {
                Value::Series(series) => {
                    let refs: Vec<&Scalar> = series.values.iter().collect();
                    let pos = extreme_position(&refs, self == Builtin::Idxmax)?;
                    pos.map(|p| Value::Scalar(series.index[p].clone())).ok_or_else(|| {
                        ExecError::Value(format!(
                            "attempt to get {} of an empty sequence",
                            if self == Builtin::Idxmax { "argmax" } else { "argmin" }
                        ))
                    })
                }
                other => Err(ExecError::Type(format!(
                    "{}() expects a series, got {}",
                    self.name(),
                    other.kind()
                ))),
            },
            Builtin::Str => match arg {
                Value::Scalar(s) => Ok(Scalar::Str(s.to_string()).into()),
                other => Err(ExecError::Type(format!("str() expects a scalar, got {}", other.kind()))),
            },
            Builtin::Int => match arg {
                Value::Scalar(Scalar::Int(i)) => Ok(Scalar::Int(i).into()),
                Value::Scalar(Scalar::Bool(b)) => Ok(Scalar::Int(b as i64).into()),
                Value::Scalar(Scalar::Float(f)) if f.is_finite() => Ok(Scalar::Int(f.trunc() as i64).into()),
                Value::Scalar(Scalar::Str(s)) => s.trim().parse::<i64>().map(|i| Scalar::Int(i).into()).map_err(|_| {
                    ExecError::Value(format!("invalid literal for int() with base 10: '{}'", s))
                }),
                other => Err(ExecError::Type(format!("int() cannot convert {}", other.kind()))),
            },
            Builtin::Float => match arg {
                Value::Scalar(s) if s.is_numeric() => Ok(Scalar::Float(s.as_f64().unwrap_or(0.0)).into()),
                Value::Scalar(Scalar::Str(s)) => s.trim().parse::<f64>().map(|f| Scalar::Float(f).into()).map_err(|_| {
                    ExecError::Value(format!("could not convert string to float: '{}'", s))
                }),
                other => Err(ExecError::Type(format!("float() cannot convert {}", other.kind()))),
            },
            Builtin::Bool => match arg {
                Value::Scalar(Scalar::Str(s)) => Ok(Scalar::Bool(!s.is_empty()).into()),
                Value::Scalar(s) if s.is_numeric() => Ok(Scalar::Bool(s.as_f64() != Some(0.0)).into()),
                Value::Scalar(s) => Ok(Scalar::Bool(truthy(&s).unwrap_or(true)).into()),
                Value::Mapping(m) => Ok(Scalar::Bool(!m.is_empty()).into()),
                other => Err(ExecError::Value(format!(
                    "the truth value of a {} is ambiguous",
                    other.kind()
                ))),
            },
            Builtin::Round => self.call(vec![arg]),
        }
    }
}

fn len(arg: &Value) -> Result<Value, ExecError> {
    let n = match arg {
        Value::Table(t) => t.len(),
        Value::Series(s) => s.len(),
        Value::Mapping(m) => m.len(),
        Value::Scalar(Scalar::Str(s)) => s.chars().count(),
        other => {
            return Err(ExecError::Type(format!(
                "object of type '{}' has no len()",
                other.kind()
            )))
        }
    };
    Ok(Scalar::Int(n as i64).into())
}

fn reduce(builtin: Builtin, func: AggFunc, arg: Value) -> Result<Value, ExecError> {
    match arg {
        Value::Series(series) => {
            let refs: Vec<&Scalar> = series.values.iter().collect();
            Ok(aggregate(func, &refs)?.into())
        }
        other => Err(ExecError::Type(format!(
            "{}() expects a series, got {}",
            builtin.name(),
            other.kind()
        ))),
    }
}

fn round(s: &Scalar, ndigits: Option<i64>) -> Result<Scalar, ExecError> {
    match (s, ndigits) {
        (Scalar::Null, _) => Ok(Scalar::Null),
        (Scalar::Int(i), _) => Ok(Scalar::Int(*i)),
        (Scalar::Float(f), None) => Ok(Scalar::Int(f.round_ties_even() as i64)),
        (Scalar::Float(f), Some(n)) => {
            let factor = 10f64.powi(n.clamp(-300, 300) as i32);
            Ok(Scalar::Float((f * factor).round_ties_even() / factor))
        }
        (other, _) => Err(ExecError::Type(format!(
            "type {} doesn't define __round__",
            other.kind()
        ))),
    }
}

/// Stable sort by value, nulls last.
pub(crate) fn sort_series(series: Series, descending: bool) -> Series {
    let mut pairs: Vec<(Scalar, Scalar)> = series.index.into_iter().zip(series.values).collect();
    pairs.sort_by(|(_, a), (_, b)| match (a.is_null(), b.is_null()) {
        (true, true) => std::cmp::Ordering::Equal,
        (true, false) => std::cmp::Ordering::Greater,
        (false, true) => std::cmp::Ordering::Less,
        _ if descending => b.total_cmp(a),
        _ => a.total_cmp(b),
    });
    let (index, values) = pairs.into_iter().unzip();
    Series { name: series.name, index, values }
}
