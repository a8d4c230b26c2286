//! Restricted executor: runs a generated program against fixed table
//! bindings and reports a structured outcome.

use std::sync::Arc;

use tracing::debug;

use crate::data::{Bindings, Table};

mod error;
mod functions;
mod interpreter;
mod ops;
pub mod program;
pub mod render;
pub mod value;

pub use error::ExecError;
pub use functions::allowed_functions;
pub use program::Program;
pub use render::{render_value, EMPTY_TABLE_SENTINEL, MAX_RENDERED_ROWS};
pub use value::{Series, Value};

use interpreter::Interpreter;

pub const DEFAULT_STEP_BUDGET: u64 = 1_000_000;

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionResult {
    pub success: bool,
    pub value: Option<Value>,
    pub error: Option<String>,
    pub value_kind: String,
}

impl ExecutionResult {
    pub fn success(value: Value) -> Self {
        Self {
            success: true,
            value_kind: value.kind().to_string(),
            value: Some(value),
            error: None,
        }
    }

    pub fn failure(error: ExecError) -> Self {
        Self {
            success: false,
            value: None,
            error: Some(error.to_string()),
            value_kind: String::new(),
        }
    }
}

pub struct Executor {
    bindings: Bindings,
    step_budget: u64,
}

impl Executor {
    pub fn new(bindings: Bindings) -> Self {
        Self {
            bindings,
            step_budget: DEFAULT_STEP_BUDGET,
        }
    }

    pub fn with_step_budget(mut self, steps: u64) -> Self {
        self.step_budget = steps;
        self
    }

    pub fn bindings(&self) -> impl Iterator<Item = (&str, &Arc<Table>)> {
        self.bindings.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Never panics or propagates: every fault becomes a failed result.
    pub fn execute(&self, code: &str) -> ExecutionResult {
        let program = match Program::parse(code) {
            Ok(p) => p,
            Err(e) => {
                debug!(error = %e, "program rejected");
                return ExecutionResult::failure(e);
            }
        };
        let mut interpreter = Interpreter::new(&self.bindings, self.step_budget);
        let outcome = interpreter.run(&program);
        let steps = interpreter.steps_used();
        match outcome {
            Ok(value) => {
                debug!(steps, kind = value.kind(), "program executed");
                ExecutionResult::success(value)
            }
            Err(e) => {
                debug!(steps, error = %e, "program failed");
                ExecutionResult::failure(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Scalar;

    fn executor() -> Executor {
        let t = Table::new(
            vec!["quantity".into(), "unit_price".into()],
            vec![vec![Scalar::Int(2), Scalar::Float(100.0)]],
        );
        let mut b = Bindings::new();
        b.insert("line_items".into(), Arc::new(t));
        Executor::new(b)
    }

    #[test]
    fn test_success_carries_kind() {
        let r = executor().execute(
            r#"[{"let": "result", "expr": {"op": "aggregate", "input": {"op": "ref", "name": "line_items"},
                "column": "unit_price", "func": "sum"}}]"#,
        );
        assert!(r.success);
        assert_eq!(r.value_kind, "float");
        assert!(r.error.is_none());
    }

    #[test]
    fn test_failure_has_no_value() {
        let r = executor().execute("not json at all");
        assert!(!r.success);
        assert!(r.value.is_none());
        assert_eq!(r.value_kind, "");
        assert!(r.error.unwrap().starts_with("SyntaxError: "));
    }

    #[test]
    fn test_budget_override() {
        let r = executor().with_step_budget(1).execute(
            r#"[{"let": "result", "expr": {"op": "ref", "name": "line_items"}}]"#,
        );
        assert_eq!(
            r.error.as_deref(),
            Some("StepBudgetExceeded: execution exceeded its budget of 1 steps")
        );
    }

    #[test]
    fn test_missing_result_message() {
        let r = executor().execute(r#"[{"let": "answer", "expr": {"op": "literal", "value": 3}}]"#);
        assert_eq!(r.error.as_deref(), Some("Code did not produce a 'result' variable"));
        assert_eq!(r.to_string(), "Error: Code did not produce a 'result' variable");
    }
}
