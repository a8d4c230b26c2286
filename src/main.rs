use std::io::{self, Read};

use anyhow::{Context, Result};
use is_terminal::IsTerminal;

use invoice_agent::{
    agent::{AgentOptions, ChatAgent},
    cache::ProgramCache,
    cli::Cli,
    config::Config,
    data,
    execution::Executor,
    handlers,
    llm::LlmClient,
    logging,
    printer::ShowOptions,
};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("{}", handlers::fatal_message(&e));
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let args = Cli::parse();

    // CLI overrides config
    let mut cfg = Config::load();
    if let Some(dir) = &args.data_dir {
        cfg.set("DATA_DIR", dir.to_string_lossy());
    }
    if let Some(model) = &args.model {
        cfg.set("DEFAULT_MODEL", model.as_str());
    }
    if let Some(t) = args.temperature {
        cfg.set("TEMPERATURE", t.to_string());
    }
    if let Some(n) = args.max_retries {
        cfg.set("MAX_RETRIES", n.to_string());
    }
    logging::init(&cfg);

    let markdown = if args.no_md {
        false
    } else if args.md {
        true
    } else {
        cfg.get_bool("PRETTIFY_MARKDOWN")
    };
    let show = ShowOptions {
        markdown,
        show_code: args.show_code,
        show_result: args.show_result,
    };

    let data_dir = cfg.data_dir();
    let ctx = data::load_data(&data_dir)
        .with_context(|| format!("failed to load data from {}", data_dir.display()))?;

    if let Some(path) = &args.run {
        let budget = cfg.get_u64("EXECUTION_STEP_BUDGET").unwrap_or(invoice_agent::execution::DEFAULT_STEP_BUDGET);
        let executor = Executor::new(ctx.bindings()).with_step_budget(budget);
        return handlers::run::run(&executor, path);
    }
    if args.schema {
        return handlers::schema::run(&invoice_agent::prompt::schema_description(&ctx), markdown);
    }

    // stdin handling (pipe support)
    let mut question_from_stdin = String::new();
    let stdin_is_tty = io::stdin().is_terminal();
    if !stdin_is_tty && !args.repl {
        io::stdin().read_to_string(&mut question_from_stdin)?;
    }
    let arg_question = args.question.clone().unwrap_or_default();
    let question = match (question_from_stdin.trim().is_empty(), arg_question.trim().is_empty()) {
        (false, false) => format!("{}\n\n{}", question_from_stdin.trim(), arg_question),
        (false, true) => question_from_stdin,
        _ => arg_question,
    };

    let client = LlmClient::from_config(&cfg)?;
    let scope = client.base_url().to_string();
    let mut agent = ChatAgent::new(client, &ctx, AgentOptions::from_config(&cfg));
    if !args.no_cache {
        agent = agent.with_cache(ProgramCache::from_config(&cfg), scope);
    }

    if args.repl {
        handlers::repl::run(&agent, Some(question.as_str()), show).await
    } else {
        handlers::ask::run(&agent, &question, show).await
    }
}
