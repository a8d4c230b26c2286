//! Question → program → execution → prose.

use std::sync::OnceLock;

use anyhow::{Context, Result};
use regex::Regex;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::{
    cache::ProgramCache,
    config::Config,
    data::DataContext,
    execution::{ExecutionResult, Executor, DEFAULT_STEP_BUDGET},
    llm::{ChatOptions, CompletionBackend},
    prompt,
};

#[derive(Debug, Clone, PartialEq)]
pub struct AgentOptions {
    pub model: String,
    /// Used for the formatting call; generation always runs at 0.
    pub temperature: f32,
    pub max_tokens: u32,
    pub max_retries: usize,
    pub retry_with_feedback: bool,
    pub step_budget: u64,
}

impl Default for AgentOptions {
    fn default() -> Self {
        Self {
            model: "gpt-4o".into(),
            temperature: 0.0,
            max_tokens: 5000,
            max_retries: 2,
            retry_with_feedback: false,
            step_budget: DEFAULT_STEP_BUDGET,
        }
    }
}

impl AgentOptions {
    pub fn from_config(cfg: &Config) -> Self {
        let d = Self::default();
        Self {
            model: cfg.get("DEFAULT_MODEL").unwrap_or(d.model),
            temperature: cfg.get_f32("TEMPERATURE").unwrap_or(d.temperature),
            max_tokens: cfg
                .get("MAX_COMPLETION_TOKENS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(d.max_tokens),
            max_retries: cfg.get_usize("MAX_RETRIES").unwrap_or(d.max_retries),
            retry_with_feedback: cfg.get_bool("RETRY_WITH_FEEDBACK"),
            step_budget: cfg.get_u64("EXECUTION_STEP_BUDGET").unwrap_or(d.step_budget),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub answer: String,
    pub generated_code: String,
    pub execution_result: ExecutionResult,
    pub question: String,
    pub attempts: usize,
}

/// First fenced block (any info string such as `json` is dropped), else the trimmed text.
pub fn extract_code(raw: &str) -> String {
    static FENCE: OnceLock<Option<Regex>> = OnceLock::new();
    let fence = FENCE.get_or_init(|| Regex::new(r"(?s)```[ \t]*[\w+-]*[ \t]*\r?\n?(.*?)```").ok());
    match fence.as_ref().and_then(|re| re.captures(raw)).and_then(|c| c.get(1)) {
        Some(m) => m.as_str().trim().to_string(),
        None => raw.trim().to_string(),
    }
}

pub fn failure_answer(error: &str) -> String {
    format!(
        "I encountered an error while processing your question: {}\n\nPlease try rephrasing your question.",
        error
    )
}

pub struct ChatAgent<B> {
    backend: B,
    executor: Executor,
    schema: String,
    options: AgentOptions,
    cache: Option<(ProgramCache, String)>,
}

impl<B: CompletionBackend> ChatAgent<B> {
    pub fn new(backend: B, ctx: &DataContext, options: AgentOptions) -> Self {
        let executor = Executor::new(ctx.bindings()).with_step_budget(options.step_budget);
        Self {
            backend,
            executor,
            schema: prompt::schema_description(ctx),
            options,
            cache: None,
        }
    }

    /// `scope` separates entries produced against different endpoints.
    pub fn with_cache(mut self, cache: ProgramCache, scope: impl Into<String>) -> Self {
        self.cache = Some((cache, scope.into()));
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn options(&self) -> &AgentOptions {
        &self.options
    }

    /// One pass: generate, execute, format.
    pub async fn ask(&self, question: &str) -> Result<ChatResponse> {
        let span = info_span!("question", correlation_id = %Uuid::new_v4());
        self.attempt(question, None).instrument(span).await
    }

    pub async fn ask_with_retry(&self, question: &str) -> Result<ChatResponse> {
        self.ask_with_retries(question, self.options.max_retries).await
    }

    /// Re-asks on execution failure; returns the first success or the last failure.
    pub async fn ask_with_retries(&self, question: &str, max_retries: usize) -> Result<ChatResponse> {
        let span = info_span!("question", correlation_id = %Uuid::new_v4());
        self.retry_loop(question, max_retries).instrument(span).await
    }

    async fn retry_loop(&self, question: &str, max_retries: usize) -> Result<ChatResponse> {
        let mut feedback: Option<String> = None;
        let mut attempt = 0;
        loop {
            attempt += 1;
            let mut response = self.attempt(question, feedback.as_deref()).await?;
            response.attempts = attempt;
            if response.execution_result.success || attempt > max_retries {
                if !response.execution_result.success {
                    warn!(attempts = attempt, "giving up after repeated execution failures");
                }
                return Ok(response);
            }
            info!(attempt, error = ?response.execution_result.error, "execution failed, retrying");
            if self.options.retry_with_feedback {
                feedback = response.execution_result.error.clone();
            }
        }
    }

    async fn attempt(&self, question: &str, previous_error: Option<&str>) -> Result<ChatResponse> {
        let cache_key = match (&self.cache, previous_error) {
            (Some((cache, scope)), None) => Some(cache.key_for(scope, &self.options.model, &self.schema, question)),
            _ => None,
        };
        let cached = match (&self.cache, &cache_key) {
            (Some((cache, _)), Some(key)) => cache.get(key),
            _ => None,
        };

        let generated_code = match cached {
            Some(code) => {
                info!("using cached program");
                code
            }
            None => {
                let messages = prompt::code_generation_messages(&self.schema, question, previous_error);
                let raw = self
                    .backend
                    .complete(messages, self.chat_options(0.0))
                    .await
                    .context("program generation failed")?;
                extract_code(&raw)
            }
        };

        let execution_result = self.executor.execute(&generated_code);
        if let (Some((cache, _)), Some(key)) = (&self.cache, &cache_key) {
            if execution_result.success {
                if let Err(e) = cache.set(key, &generated_code) {
                    warn!(error = %e, "could not store program in cache");
                }
            } else {
                cache.invalidate(key);
            }
        }

        let answer = if execution_result.success {
            info!(kind = %execution_result.value_kind, "program executed");
            let messages = prompt::formatting_messages(question, &execution_result.to_string());
            self.backend
                .complete(messages, self.chat_options(self.options.temperature))
                .await
                .context("answer formatting failed")?
        } else {
            let error = execution_result.error.as_deref().unwrap_or_default();
            info!(error, "program failed");
            failure_answer(error)
        };

        Ok(ChatResponse {
            answer,
            generated_code,
            execution_result,
            question: question.to_string(),
            attempts: 1,
        })
    }

    fn chat_options(&self, temperature: f32) -> ChatOptions {
        ChatOptions {
            model: self.options.model.clone(),
            temperature,
            max_tokens: self.options.max_tokens,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_code_prefers_first_fence() {
        let raw = "Here you go:\n```json\n[{\"let\": \"result\"}]\n```\nand\n```\nignored\n```";
        assert_eq!(extract_code(raw), "[{\"let\": \"result\"}]");
        assert_eq!(extract_code("```\n[1]\n```"), "[1]");
        assert_eq!(extract_code("  [2]  \n"), "[2]");
    }

    #[test]
    fn test_extract_code_drops_any_fence_tag() {
        assert_eq!(extract_code("```python\n[3]\n```"), "[3]");
        assert_eq!(extract_code("```jsonc\r\n[4]\r\n```"), "[4]");
        assert_eq!(extract_code("``` json-lines\n[5]\n```"), "[5]");
    }

    #[test]
    fn test_failure_answer_text() {
        assert_eq!(
            failure_answer("KeyError: x"),
            "I encountered an error while processing your question: KeyError: x\n\nPlease try rephrasing your question."
        );
    }

    #[test]
    fn test_default_options() {
        let o = AgentOptions::default();
        assert_eq!(o.max_retries, 2);
        assert_eq!(o.max_tokens, 5000);
        assert!(!o.retry_with_feedback);
    }
}
