//! Thin control surface over the workflow engine.
//!
//! Sessions live under `.triad/sessions/`, config under `.triad/config.toml`.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use triad::core::types::TerminalReason;
use triad::engine::{RunOutcome, RunRequest, WorkflowEngine};
use triad::exit_codes;
use triad::io::config::load_config;
use triad::io::reasoner::CommandReasoner;
use triad::io::session_store::FileSessionStore;
use triad::logging;

#[derive(Parser)]
#[command(
    name = "triad",
    version,
    about = "Bounded plan/produce/evaluate workflow runner"
)]
struct Cli {
    /// Base state directory.
    #[arg(long, default_value = ".triad")]
    state_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a workflow for a goal until it reaches a terminal state.
    Run {
        /// The top-level objective text.
        #[arg(long)]
        goal: String,
        /// Resume an existing session instead of creating a new one.
        #[arg(long)]
        session: Option<String>,
    },
    /// Print the stored session record as JSON.
    Session { id: String },
    /// Delete a session record (idempotent).
    Delete { id: String },
}

fn main() -> ExitCode {
    logging::init();
    match run() {
        Ok(code) => ExitCode::from(code as u8),
        Err(err) => {
            eprintln!("{err:#}");
            ExitCode::from(exit_codes::INVALID as u8)
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let store = FileSessionStore::new(cli.state_dir.join("sessions"))?;
    match cli.command {
        Command::Run { goal, session } => cmd_run(&cli.state_dir, &store, goal, session),
        Command::Session { id } => cmd_session(&store, &id),
        Command::Delete { id } => cmd_delete(&store, &id),
    }
}

fn cmd_run(
    state_dir: &std::path::Path,
    store: &FileSessionStore,
    goal: String,
    session: Option<String>,
) -> Result<i32> {
    let config = load_config(&state_dir.join("config.toml"))?;
    let reasoner = CommandReasoner::new(config.reasoner.command.clone())?;
    let engine = WorkflowEngine::new(store, &reasoner, config);

    let outcome = engine.run(&RunRequest {
        goal,
        session_id: session,
        ..RunRequest::default()
    })?;
    print_outcome(&outcome)?;

    Ok(match outcome.terminal() {
        Some(TerminalReason::Completed) | None => exit_codes::OK,
        Some(TerminalReason::Exhausted) => exit_codes::EXHAUSTED,
        Some(TerminalReason::Failed { .. }) => exit_codes::FAILED,
    })
}

fn cmd_session(store: &FileSessionStore, id: &str) -> Result<i32> {
    match store.get(id)? {
        Some(session) => {
            let mut payload =
                serde_json::to_string_pretty(&session).context("serialize session")?;
            payload.push('\n');
            print!("{payload}");
            Ok(exit_codes::OK)
        }
        None => {
            eprintln!("session '{id}' not found");
            Ok(exit_codes::NOT_FOUND)
        }
    }
}

fn cmd_delete(store: &FileSessionStore, id: &str) -> Result<i32> {
    store.delete(id)?;
    Ok(exit_codes::OK)
}

fn print_outcome(outcome: &RunOutcome) -> Result<()> {
    let payload = serde_json::json!({
        "session_id": outcome.session_id,
        "terminal": outcome.state.terminal,
        "task_reports": outcome.reports,
        "state": outcome.state,
    });
    let mut buf = serde_json::to_string_pretty(&payload).context("serialize outcome")?;
    buf.push('\n');
    print!("{buf}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_run_with_goal() {
        let cli = Cli::parse_from(["triad", "run", "--goal", "build two endpoints"]);
        assert!(matches!(cli.command, Command::Run { goal, session: None } if goal == "build two endpoints"));
    }

    #[test]
    fn parse_run_with_session_resume() {
        let cli = Cli::parse_from(["triad", "run", "--goal", "g", "--session", "sess-1"]);
        let Command::Run { session, .. } = cli.command else {
            panic!("expected run");
        };
        assert_eq!(session.as_deref(), Some("sess-1"));
    }

    #[test]
    fn parse_session_and_delete() {
        let cli = Cli::parse_from(["triad", "session", "sess-2"]);
        assert!(matches!(cli.command, Command::Session { id } if id == "sess-2"));

        let cli = Cli::parse_from(["triad", "delete", "sess-2"]);
        assert!(matches!(cli.command, Command::Delete { id } if id == "sess-2"));
    }
}
