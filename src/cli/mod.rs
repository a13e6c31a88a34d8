pub mod repl;

use clap::Parser;
use std::path::PathBuf;

pub use repl::run_repl;

/// `codebuddy` - a conversational coding agent.
#[derive(Parser, Debug)]
#[command(name = "codebuddy")]
#[command(version)]
#[command(about = "A coding agent for the terminal and ACP editors.", long_about = None)]
pub struct Cli {
    /// Speak the Agent Client Protocol on stdin/stdout instead of running the REPL
    #[arg(long)]
    pub acp: bool,

    /// Config file to use instead of ~/.codebuddy/config.toml
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long)]
    pub verbose: bool,
}
