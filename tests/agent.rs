mod common;

use std::{collections::VecDeque, sync::Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use invoice_agent::{
    agent::{AgentOptions, ChatAgent},
    cache::ProgramCache,
    llm::{ChatMessage, ChatOptions, CompletionBackend},
};

const UK_PROGRAM: &str = r#"[{"let": "result", "expr": {"op": "select",
    "input": {"op": "filter", "input": {"op": "ref", "name": "clients"},
              "where": {"eq": [{"col": "country"}, {"lit": "UK"}]}},
    "columns": ["client_name", "country"]}}]"#;

const BROKEN_PROGRAM: &str = r#"[{"let": "result", "expr": {"op": "ref", "name": "customers"}}]"#;

/// Replies from a fixed script and records every request.
#[derive(Default)]
struct ScriptedBackend {
    replies: Mutex<VecDeque<String>>,
    requests: Mutex<Vec<(Vec<ChatMessage>, ChatOptions)>>,
}

impl ScriptedBackend {
    fn new(replies: &[&str]) -> Self {
        Self {
            replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
            requests: Mutex::default(),
        }
    }

    fn requests(&self) -> Vec<(Vec<ChatMessage>, ChatOptions)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionBackend for ScriptedBackend {
    async fn complete(&self, messages: Vec<ChatMessage>, opts: ChatOptions) -> Result<String> {
        self.requests.lock().unwrap().push((messages, opts));
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| anyhow!("script exhausted"))
    }
}

fn options() -> AgentOptions {
    AgentOptions {
        temperature: 0.7,
        ..AgentOptions::default()
    }
}

#[tokio::test]
async fn answers_from_fenced_program() -> Result<()> {
    let fenced = format!("Here is the program:\n```json\n{}\n```", UK_PROGRAM);
    let backend = ScriptedBackend::new(&[&fenced, "Acme Corp and Cobalt Retail are in the UK."]);
    let agent = ChatAgent::new(backend, &common::context(), options());

    let response = agent.ask("Which clients are based in the UK?").await?;
    assert_eq!(response.answer, "Acme Corp and Cobalt Retail are in the UK.");
    assert_eq!(response.generated_code, UK_PROGRAM);
    assert!(response.execution_result.success);
    assert_eq!(response.attempts, 1);
    Ok(())
}

#[tokio::test]
async fn generation_is_deterministic_and_formatting_sees_result() -> Result<()> {
    let backend = ScriptedBackend::new(&[UK_PROGRAM, "answer"]);
    let agent = ChatAgent::new(backend, &common::context(), options());
    agent.ask("Which clients are based in the UK?").await?;

    let requests = agent_backend_requests(&agent);
    assert_eq!(requests.len(), 2);
    let (gen_messages, gen_opts) = &requests[0];
    assert_eq!(gen_opts.temperature, 0.0);
    assert!(gen_messages[0].content.contains("## Table: merged"));
    assert!(gen_messages[1].content.contains("Which clients are based in the UK?"));

    let (fmt_messages, fmt_opts) = &requests[1];
    assert_eq!(fmt_opts.temperature, 0.7);
    assert!(fmt_messages[1].content.contains("Cobalt Retail"));
    assert!(fmt_messages[1].content.starts_with("User Question: Which clients are based in the UK?"));
    Ok(())
}

#[tokio::test]
async fn failed_execution_skips_formatting() -> Result<()> {
    let backend = ScriptedBackend::new(&[BROKEN_PROGRAM]);
    let agent = ChatAgent::new(backend, &common::context(), options());

    let response = agent.ask("List all customers").await?;
    assert!(!response.execution_result.success);
    assert_eq!(
        response.answer,
        "I encountered an error while processing your question: NameError: name 'customers' is not defined\n\n\
         Please try rephrasing your question."
    );
    assert_eq!(agent_backend_requests(&agent).len(), 1);
    Ok(())
}

#[tokio::test]
async fn retry_returns_first_success() -> Result<()> {
    let backend = ScriptedBackend::new(&[BROKEN_PROGRAM, UK_PROGRAM, "two UK clients"]);
    let agent = ChatAgent::new(backend, &common::context(), options());

    let response = agent.ask_with_retry("Which clients are based in the UK?").await?;
    assert!(response.execution_result.success);
    assert_eq!(response.attempts, 2);
    assert_eq!(response.answer, "two UK clients");

    // Identical resubmission by default.
    let requests = agent_backend_requests(&agent);
    assert_eq!(requests[0].0, requests[1].0);
    Ok(())
}

#[tokio::test]
async fn retry_gives_up_after_max_retries() -> Result<()> {
    let backend = ScriptedBackend::new(&[BROKEN_PROGRAM, BROKEN_PROGRAM, BROKEN_PROGRAM, UK_PROGRAM]);
    let agent = ChatAgent::new(backend, &common::context(), options());

    let response = agent.ask_with_retry("List all customers").await?;
    assert!(!response.execution_result.success);
    assert_eq!(response.attempts, 3);
    assert_eq!(agent_backend_requests(&agent).len(), 3);
    Ok(())
}

#[tokio::test]
async fn retry_with_feedback_sends_previous_error() -> Result<()> {
    let backend = ScriptedBackend::new(&[BROKEN_PROGRAM, UK_PROGRAM, "ok"]);
    let opts = AgentOptions {
        retry_with_feedback: true,
        ..options()
    };
    let agent = ChatAgent::new(backend, &common::context(), opts);

    agent.ask_with_retries("Which clients are based in the UK?", 1).await?;
    let requests = agent_backend_requests(&agent);
    let retry_prompt = &requests[1].0[1].content;
    assert!(retry_prompt.contains("NameError: name 'customers' is not defined"));
    Ok(())
}

#[tokio::test]
async fn backend_errors_propagate() -> Result<()> {
    let agent = ChatAgent::new(ScriptedBackend::new(&[]), &common::context(), options());
    let err = agent.ask("anything").await.unwrap_err();
    assert!(format!("{:#}", err).contains("script exhausted"));
    Ok(())
}

#[tokio::test]
async fn successful_programs_are_cached() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let backend = ScriptedBackend::new(&[UK_PROGRAM, "first", "second"]);
    let agent = ChatAgent::new(backend, &common::context(), options())
        .with_cache(ProgramCache::new(dir.path().to_path_buf(), 10), "test");

    let first = agent.ask("Which clients are based in the UK?").await?;
    let second = agent.ask("Which clients are based in the UK?").await?;
    assert_eq!(first.generated_code, second.generated_code);
    assert_eq!(second.answer, "second");
    // generation, formatting, formatting: the second program came from the cache
    assert_eq!(agent_backend_requests(&agent).len(), 3);
    Ok(())
}

fn agent_backend_requests(agent: &ChatAgent<ScriptedBackend>) -> Vec<(Vec<ChatMessage>, ChatOptions)> {
    agent.backend().requests()
}
