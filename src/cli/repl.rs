use crate::agent::{Agent, CliUpdateSink, PromptBlock, StopReason, UpdateSink};
use anyhow::Result;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

const SEPARATOR: &str = "------------------------------------------------------------";

#[derive(Debug, PartialEq, Eq)]
enum ReplInput {
    Quit,
    Skip,
    Prompt(String),
}

fn classify(line: &str) -> ReplInput {
    let trimmed = line.trim();
    if trimmed.eq_ignore_ascii_case("quit") {
        ReplInput::Quit
    } else if trimmed.is_empty() {
        ReplInput::Skip
    } else {
        ReplInput::Prompt(trimmed.to_string())
    }
}

fn prompt_user() -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{SEPARATOR}")?;
    write!(stdout, "[You]: ")?;
    stdout.flush()?;
    Ok(())
}

/// Interactive loop on a single session rooted at `working_dir`.
///
/// Ctrl-C during a turn cancels it; at the prompt it exits.
pub async fn run_repl(agent: Arc<Agent>, working_dir: PathBuf) -> Result<()> {
    let session = agent.create_session(working_dir, None).await?;
    let session_id = session.id().to_string();
    let sink: Arc<dyn UpdateSink> = Arc::new(CliUpdateSink);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("Agent ready. Type 'quit' to exit.");
    loop {
        prompt_user()?;
        let line = tokio::select! {
            line = lines.next_line() => line?,
            signal = tokio::signal::ctrl_c() => {
                signal?;
                println!();
                None
            }
        };
        let Some(line) = line else {
            break;
        };

        let text = match classify(&line) {
            ReplInput::Quit => {
                println!("Goodbye!");
                break;
            }
            ReplInput::Skip => continue,
            ReplInput::Prompt(text) => text,
        };

        let input = [PromptBlock::text(text)];
        let turn = agent.submit_turn(&session_id, &input, Arc::clone(&sink));
        tokio::pin!(turn);
        let outcome = loop {
            tokio::select! {
                outcome = &mut turn => break outcome,
                signal = tokio::signal::ctrl_c() => {
                    signal?;
                    agent.cancel_turn(&session_id)?;
                    println!("[Cancelling...]");
                }
            }
        };

        match outcome {
            Ok(outcome) if outcome.stop_reason == StopReason::Cancelled => {
                println!("[Turn cancelled]");
            }
            Ok(_) => {}
            Err(e) => {
                tracing::error!(session_id = %session_id, "turn failed: {e}");
                println!("[Error]: {e}");
            }
        }
    }

    agent.delete_session(&session_id);
    Ok(())
}
