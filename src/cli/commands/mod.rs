//! cli::commands
//!
//! Subcommand dispatch and handlers.
//!
//! # Architecture
//!
//! Each handler receives a fully assembled [`Session`] and:
//! 1. Feeds it input (stdin lines, or the line given on the command line)
//! 2. Lets the session's pipeline run and present each line
//! 3. Chooses the process exit code
//!
//! Handlers never run commands outside the session.

mod completion;
mod export;
mod repl;
mod run;

pub use completion::completion;
pub use export::export;
pub use repl::repl;
pub use run::{join_line, plan, run_line};

use std::process::ExitCode;

use anyhow::Result;

use crate::cli::args::Command;
use crate::engine::Session;

/// Dispatch a subcommand to its handler.
pub async fn dispatch(command: Command, session: Session) -> Result<ExitCode> {
    match command {
        Command::Repl => repl(session).await,
        Command::Run { line } => run_line(session, &join_line(&line)).await,
        Command::Plan { line } => plan(&session, &join_line(&line)).await,
        Command::Export => export(&session),
        Command::Completion { shell } => {
            completion(shell)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
