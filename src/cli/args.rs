//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--cwd <path>`: Start the session in that directory
//! - `--mode <mode>`: Initial presentation mode
//! - `--no-color`: Disable ANSI colors
//! - `--debug`: Enable debug logging
//! - `--config <file>`: Load this config file instead of the default locations

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::ui::present::PresentationMode;

/// shellx - An interactive shell with a staged command pipeline
#[derive(Parser, Debug)]
#[command(name = "shellx")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Start the session in this directory
    #[arg(long, global = true)]
    pub cwd: Option<PathBuf>,

    /// Initial presentation mode (default, compact, detailed, json, minimal)
    #[arg(long, global = true)]
    pub mode: Option<PresentationMode>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Load configuration from this file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the interactive shell (the default)
    #[command(
        name = "repl",
        long_about = "Start the interactive shell.\n\n\
            Lines are read from stdin one at a time and run through the command \
            pipeline. Lines starting with ':' are session controls. The session \
            ends at end of input or after 'exit'.",
        after_help = "\
SESSION CONTROLS:
    :mode                 show the current and available presentation modes
    :mode json            switch presentation mode
    :plan lsx src -l      preview the execution plan without running it"
    )]
    Repl,

    /// Run one command line and exit
    #[command(
        name = "run",
        long_about = "Run one command line through the pipeline and exit.\n\n\
            The exit status is non-zero when the command produces an error.",
        after_help = "\
EXAMPLES:
    shellx run 'lsx --long'
    shellx --mode json run 'info Cargo.toml'"
    )]
    Run {
        /// The command line, quoted as one argument or as separate words
        #[arg(required = true, num_args = 1.., trailing_var_arg = true, allow_hyphen_values = true)]
        line: Vec<String>,
    },

    /// Print the execution plan of a command line as JSON without running it
    Plan {
        #[arg(required = true, num_args = 1.., trailing_var_arg = true, allow_hyphen_values = true)]
        line: Vec<String>,
    },

    /// Print every registered command definition as JSON
    Export,

    /// Generate shell completion scripts
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Supported shells for completion
#[derive(clap::ValueEnum, Debug, Clone, Copy)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}
