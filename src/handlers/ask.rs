//! One-shot question.

use anyhow::{bail, Result};

use crate::{
    agent::ChatAgent,
    llm::CompletionBackend,
    printer::{print_response, ShowOptions},
};

pub async fn run<B: CompletionBackend>(agent: &ChatAgent<B>, question: &str, show: ShowOptions) -> Result<()> {
    if question.trim().is_empty() {
        bail!("Provide a question as an argument or via stdin");
    }
    let response = agent.ask_with_retry(question.trim()).await?;
    print_response(&response, show);
    Ok(())
}
