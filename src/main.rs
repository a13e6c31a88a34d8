#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions
)]

use anyhow::{Context, Result};
use clap::Parser;
use codebuddy::acp::AcpServer;
use codebuddy::cli::{Cli, run_repl};
use codebuddy::{Agent, AgentContext, Config};
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

fn log_level(config: &Config, verbose: bool) -> Level {
    if verbose {
        return Level::DEBUG;
    }
    config.log_level.parse().unwrap_or(Level::INFO)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load_or_init()?,
    };

    // stdout carries the ACP wire, so logs always go to stderr.
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level(&config, cli.verbose))
        .with_writer(std::io::stderr)
        .with_ansi(!cli.acp)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    tracing::info!(
        provider = %config.provider,
        model = config.resolved_model(),
        acp = cli.acp,
        "starting codebuddy"
    );

    let system_prompt = config.system_prompt()?;
    let context = Arc::new(AgentContext::from_config(&config));
    let agent = Arc::new(Agent::new(context, system_prompt));

    let result = if cli.acp {
        AcpServer::new(Arc::clone(&agent), config.resolved_model())
            .serve_stdio()
            .await
    } else {
        let working_dir = std::env::current_dir().context("Could not read working directory")?;
        run_repl(Arc::clone(&agent), working_dir).await
    };

    agent.shutdown().await;
    result
}
