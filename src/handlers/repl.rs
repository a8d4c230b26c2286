//! Interactive question loop over stdin.

use std::io::{self, BufRead, Write};

use anyhow::Result;
use is_terminal::IsTerminal;
use owo_colors::OwoColorize;
use tracing::error;

use crate::{
    agent::ChatAgent,
    llm::CompletionBackend,
    printer::{print_response, ShowOptions, TextPrinter},
};

const EXIT_WORDS: &[&str] = &["exit", "quit", "exit()", "quit()"];

pub async fn run<B: CompletionBackend>(agent: &ChatAgent<B>, init_question: Option<&str>, show: ShowOptions) -> Result<()> {
    let interactive = io::stdin().is_terminal();
    if interactive {
        TextPrinter { color: Some("magenta") }.print("Ask about clients, invoices and line items. Type 'exit' to quit.");
    }

    if let Some(q) = init_question.filter(|q| !q.trim().is_empty()) {
        answer(agent, q, show).await;
    }

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        if interactive {
            print!("{} ", ">>>".magenta());
            io::stdout().flush()?;
        }
        let Some(line) = lines.next() else { break };
        let line = line?;
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if EXIT_WORDS.contains(&question.to_ascii_lowercase().as_str()) {
            break;
        }
        answer(agent, question, show).await;
    }
    Ok(())
}

/// Failures are reported and the loop carries on.
async fn answer<B: CompletionBackend>(agent: &ChatAgent<B>, question: &str, show: ShowOptions) {
    match agent.ask_with_retry(question).await {
        Ok(response) => print_response(&response, show),
        Err(e) => {
            error!(error = %e, "question failed");
            TextPrinter { color: Some("red") }.print(&super::fatal_message(&e));
        }
    }
}
