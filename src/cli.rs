use std::path::PathBuf;

use clap::{ArgGroup, Parser};

#[derive(Parser, Debug, Clone)]
#[command(name = "invoice-agent", about = "Ask questions about invoice data in plain language", version)]
#[command(group(ArgGroup::new("mode").args(["repl", "run", "schema"]).multiple(false)))]
#[command(group(ArgGroup::new("md_switch").args(["md", "no_md"]).multiple(false)))]
pub struct Cli {
    /// The question to answer. Read from stdin when piped.
    #[arg(value_name = "QUESTION")]
    pub question: Option<String>,

    /// Directory holding Clients, Invoices and InvoiceLineItems (.xlsx or .csv).
    #[arg(long = "data-dir", value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Large language model to use.
    #[arg(long)]
    pub model: Option<String>,

    /// Randomness of the formatted answer. Program generation always uses 0.
    #[arg(long, value_parser = clap::value_parser!(f32))]
    pub temperature: Option<f32>,

    /// Re-ask this many times when the generated program fails.
    #[arg(long = "max-retries")]
    pub max_retries: Option<usize>,

    /// Print the generated program.
    #[arg(long = "show-code")]
    pub show_code: bool,

    /// Print the normalized execution result.
    #[arg(long = "show-result")]
    pub show_result: bool,

    /// Render the answer as Markdown.
    #[arg(long)]
    pub md: bool,
    /// Print the answer as plain text.
    #[arg(long = "no-md")]
    pub no_md: bool,

    /// Do not reuse or store generated programs.
    #[arg(long = "no-cache")]
    pub no_cache: bool,

    /// Start an interactive question loop.
    #[arg(long)]
    pub repl: bool,

    /// Execute a program file directly, without a model call.
    #[arg(long, value_name = "FILE")]
    pub run: Option<PathBuf>,

    /// Print the schema of the loaded tables.
    #[arg(long)]
    pub schema: bool,
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }
}
