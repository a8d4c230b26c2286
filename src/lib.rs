//! Natural-language questions over invoice data.
//!
//! A model turns each question into a program in a small JSON query algebra;
//! [`execution::Executor`] runs it against the loaded tables and the result
//! is rendered to text for a second model call that phrases the answer.

pub mod agent;
pub mod cache;
pub mod cli;
pub mod config;
pub mod data;
pub mod execution;
pub mod handlers;
pub mod llm;
pub mod logging;
pub mod printer;
pub mod prompt;
