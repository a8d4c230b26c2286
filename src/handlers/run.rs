//! Execute a program file directly, no model involved.

use std::{fs, path::Path};

use anyhow::{bail, Context, Result};

use crate::{agent::extract_code, execution::Executor, printer::TextPrinter};

pub fn run(executor: &Executor, path: &Path) -> Result<()> {
    let text = fs::read_to_string(path).with_context(|| format!("failed to read program {}", path.display()))?;
    let result = executor.execute(&extract_code(&text));
    if result.success {
        TextPrinter { color: None }.print(&result.to_string());
        Ok(())
    } else {
        TextPrinter { color: Some("red") }.print(&result.to_string());
        bail!("program failed")
    }
}
