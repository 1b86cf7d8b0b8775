//! Carelink - Post-Discharge Care Assistant
//!
//! Main entry point for the CLI application.

use std::path::PathBuf;

use clap::Parser;
use carelink::cli::Session;
use carelink::core::logging;
use carelink::{AppContext, Config, Repl};

/// Carelink - Post-Discharge Care Assistant
#[derive(Parser, Debug)]
#[command(name = "carelink")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Chat model used by both agents (must support tool calling)
    #[arg(long, short = 'm')]
    model: Option<String>,

    /// Patient data JSON file
    #[arg(long)]
    data: Option<PathBuf>,

    /// Nephrology reference text file
    #[arg(long)]
    reference: Option<PathBuf>,

    /// Maximum agent steps per user turn
    #[arg(long)]
    max_steps: Option<usize>,

    /// Enable debug output
    #[arg(long, short = 'd')]
    debug: bool,

    /// Disable web search for the clinical agent
    #[arg(long)]
    no_search: bool,

    /// Single prompt mode (non-interactive)
    #[arg(long, short = 'p')]
    prompt: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Build configuration
    let mut config = Config::load();

    // Apply CLI overrides
    if let Some(model) = args.model {
        config.models.chat = model;
    }

    if let Some(data) = args.data {
        config.data.patient_data = data;
    }

    if let Some(reference) = args.reference {
        config.data.reference_file = reference;
    }

    if let Some(max_steps) = args.max_steps {
        config.agent.max_steps = max_steps;
    }

    if args.debug {
        config.agent.debug = true;
    }

    if args.no_search {
        config.search.enabled = false;
    }

    let _log_guard = logging::init(&config.logging, config.agent.debug);

    // Single prompt mode
    if let Some(prompt) = args.prompt {
        let context = AppContext::from_config(config);
        context.initialize().await?;

        let mut session = Session::new(context)?;
        println!("{}", session.send(&prompt).await);
        return Ok(());
    }

    // Interactive REPL mode
    let mut repl = Repl::with_config(config)?;
    repl.run().await?;

    Ok(())
}
