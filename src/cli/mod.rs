//! cli
//!
//! Command-line interface layer for shellx.
//!
//! # Responsibilities
//!
//! - Parse command-line arguments and global flags
//! - Load configuration and assemble the [`Session`]
//! - Delegate to subcommand handlers
//!
//! # Architecture
//!
//! The CLI layer is thin. It parses arguments via clap, layers the config
//! file and flags (defaults < config file < flags), and hands a ready
//! session to a handler. Every input line flows through the session's
//! pipeline; handlers only read lines and choose exit codes.

pub mod args;
pub mod commands;

pub use args::{Cli, Command, Shell};

use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context as _, Result};
use tracing::debug;

use crate::builtins::register_builtins;
use crate::core::config::Config;
use crate::engine::registry::{load_definitions_file, CommandRegistry};
use crate::engine::{CommandContext, Pipeline, Session};
use crate::ui::present::Presenter;

/// Run the CLI application.
///
/// This is the main entry point called from `main.rs` once logging is set up.
pub async fn run(cli: Cli) -> Result<ExitCode> {
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let session = build_session(&cli, &config)?;
    commands::dispatch(cli.command.unwrap_or(Command::Repl), session).await
}

/// Assemble a session from the config file and global flags.
pub fn build_session(cli: &Cli, config: &Config) -> Result<Session> {
    let cwd = start_dir(cli.cwd.as_ref())?;

    let mut presentation = config.presentation();
    if let Some(mode) = cli.mode {
        presentation = presentation.with_mode(mode);
    }
    if cli.no_color || !std::io::stdout().is_terminal() {
        presentation.colors = false;
    }

    let mut registry = CommandRegistry::new();
    register_builtins(&mut registry)?;
    if let Some(path) = config.definitions_path() {
        let defs = load_definitions_file(&path)
            .with_context(|| format!("failed to load command definitions from {}", path.display()))?;
        debug!(count = defs.len(), path = %path.display(), "loaded command definitions");
        registry.register_all(defs)?;
    }

    let mut context = CommandContext::new(cwd);
    context.home_dir = dirs::home_dir();

    let pipeline = Pipeline::new()
        .with_timeout(config.timeout())
        .interruptible(true);

    Ok(Session::new(registry, Presenter::new(presentation), context).with_pipeline(pipeline))
}

fn start_dir(requested: Option<&PathBuf>) -> Result<PathBuf> {
    let current = std::env::current_dir().context("cannot determine the current directory")?;
    let dir = match requested {
        Some(dir) if dir.is_absolute() => dir.clone(),
        Some(dir) => current.join(dir),
        None => return Ok(current),
    };
    if !dir.is_dir() {
        anyhow::bail!("--cwd is not a directory: {}", dir.display());
    }
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::present::PresentationMode;
    use clap::Parser;
    use tempfile::TempDir;

    #[test]
    fn flags_override_config() {
        let temp = TempDir::new().unwrap();
        let cwd = temp.path().to_string_lossy().into_owned();
        let cli = Cli::try_parse_from(["shellx", "--cwd", &cwd, "--mode", "compact", "--no-color"]).unwrap();
        let session = build_session(&cli, &Config::default()).unwrap();
        assert_eq!(session.mode(), PresentationMode::Compact);
        assert!(!session.presenter().config().colors);
        assert_eq!(session.current_dir(), temp.path());
        assert!(session.registry().contains("lsx"));
    }

    #[test]
    fn missing_cwd_rejected() {
        let cli = Cli::try_parse_from(["shellx", "--cwd", "/definitely/not/here"]).unwrap();
        assert!(build_session(&cli, &Config::default()).is_err());
    }
}
