pub mod ask;
pub mod repl;
pub mod run;
pub mod schema;

/// The one line printed when a question cannot be answered at all.
pub fn fatal_message(e: &anyhow::Error) -> String {
    format!("I encountered an error: {:#}", e)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{anyhow, Context};

    #[test]
    fn test_fatal_message_includes_cause_chain() {
        let e = Err::<(), _>(anyhow!("connection refused"))
            .context("program generation failed")
            .unwrap_err();
        assert_eq!(
            fatal_message(&e),
            "I encountered an error: program generation failed: connection refused"
        );
    }
}
