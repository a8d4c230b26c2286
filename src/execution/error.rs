use thiserror::Error;

use crate::data::TableError;

/// Every way a generated program can fail. Rendered as `Category: message`
/// so the text can be fed back to a model verbatim.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExecError {
    #[error("Code did not produce a 'result' variable")]
    MissingResult,

    #[error("SyntaxError: {0}")]
    Syntax(String),

    #[error("NameError: {0}")]
    Name(String),

    #[error("KeyError: {0}")]
    Key(String),

    #[error("TypeError: {0}")]
    Type(String),

    #[error("ValueError: {0}")]
    Value(String),

    #[error("ZeroDivisionError: division by zero")]
    ZeroDivision,

    #[error("StepBudgetExceeded: execution exceeded its budget of {0} steps")]
    StepBudget(u64),
}

impl ExecError {
    pub fn category(&self) -> &'static str {
        match self {
            ExecError::MissingResult => "MissingResult",
            ExecError::Syntax(_) => "SyntaxError",
            ExecError::Name(_) => "NameError",
            ExecError::Key(_) => "KeyError",
            ExecError::Type(_) => "TypeError",
            ExecError::Value(_) => "ValueError",
            ExecError::ZeroDivision => "ZeroDivisionError",
            ExecError::StepBudget(_) => "StepBudgetExceeded",
        }
    }

    pub(crate) fn undefined(name: &str) -> Self {
        ExecError::Name(format!("name '{}' is not defined", name))
    }
}

impl From<TableError> for ExecError {
    fn from(e: TableError) -> Self {
        ExecError::Key(e.to_string())
    }
}
