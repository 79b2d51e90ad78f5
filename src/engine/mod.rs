//! engine
//!
//! Orchestrates the command lifecycle: Parse -> Intent -> Validate -> Plan ->
//! Execute -> Present.
//!
//! # Architecture
//!
//! The engine is the central coordinator for every shellx command:
//!
//! 1. **Parse**: Tokenize the line and bind flags and parameters
//! 2. **Intent**: Normalize into action, targets and options
//! 3. **Validate**: Reject bad input before any side effect
//! 4. **Plan**: Produce an inspectable, previewable plan
//! 5. **Execute**: Run the plan against the host collaborators
//! 6. **Present**: Render the Output for the active presentation mode
//!
//! Commands customise Intent, Validate, Plan and Execute through their
//! [`CommandDefinition`]; the [`Pipeline`] owns the ordering and converts
//! every failure into an error Output.
//!
//! # Invariants
//!
//! - Stages run once each, in order, per input line
//! - Only Execute causes side effects or changes session state
//! - A failing Validate never reaches Execute
//! - The session never terminates because a command failed
//!
//! # Example
//!
//! ```ignore
//! use shellx::engine::{CommandContext, Pipeline};
//!
//! let ctx = CommandContext::new("/home/me");
//! let outcome = Pipeline::new().run("lsx -l", &def, &ctx, &presenter, &mut out).await?;
//! ```

pub mod command;
pub mod exec;
pub mod intent;
pub mod parse;
pub mod plan;
pub mod registry;
pub mod rollback;
pub mod runner;
pub mod session;
pub mod trace;
pub mod validate;

pub use command::{
    file_operation, with_confirmation, with_dry_run, CommandBuilder, CommandDefinition,
    DefinitionError, FlagDefinition, ParameterDefinition,
};
pub use exec::{default_execute, ExecutionContext};
pub use intent::CommandIntent;
pub use parse::{parse, tokenize, ParsedInput};
pub use plan::{ExecutionPlan, ExecutionStep, PlanError};
pub use registry::{CommandRegistry, RegistryError};
pub use rollback::{RollbackError, RollbackResult};
pub use runner::{Pipeline, PipelineError, RunOutcome};
pub use session::{LineResult, Session};
pub use trace::{EventKind, ExecutionEvent, ExecutionTrace};
pub use validate::ValidationResult;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::host::{resolve_path, Host};
use crate::ui::present::PresentationMode;

/// Read-only session state handed to every stage of one run.
///
/// Execute receives a copy inside its
/// [`ExecutionContext`](exec::ExecutionContext); changes made there are
/// applied to the session only after a successful run.
#[derive(Debug, Clone)]
pub struct CommandContext {
    /// Directory relative paths resolve against.
    pub current_dir: PathBuf,
    /// Home directory, for `~` expansion.
    pub home_dir: Option<PathBuf>,
    /// Active presentation mode.
    pub mode: PresentationMode,
    /// Filesystem, process and environment collaborators.
    pub host: Host,
    /// The session's registered commands, for discovery commands like `help`.
    pub commands: Arc<CommandRegistry>,
}

impl CommandContext {
    /// Context rooted at `current_dir` with the local host.
    pub fn new(current_dir: impl Into<PathBuf>) -> Self {
        Self {
            current_dir: current_dir.into(),
            home_dir: None,
            mode: PresentationMode::Default,
            host: Host::local(),
            commands: Arc::new(CommandRegistry::new()),
        }
    }

    pub fn with_home(mut self, home: impl Into<PathBuf>) -> Self {
        self.home_dir = Some(home.into());
        self
    }

    pub fn with_mode(mut self, mode: PresentationMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_host(mut self, host: Host) -> Self {
        self.host = host;
        self
    }

    pub fn with_commands(mut self, commands: Arc<CommandRegistry>) -> Self {
        self.commands = commands;
        self
    }

    /// Resolve `target` against the current directory.
    pub fn resolve_path(&self, target: &str) -> PathBuf {
        resolve_path(&self.current_dir, self.home_dir.as_deref(), target)
    }

    pub fn current_dir(&self) -> &Path {
        &self.current_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_home_and_relative() {
        let ctx = CommandContext::new("/work").with_home("/home/me");
        assert_eq!(ctx.resolve_path("~/notes"), PathBuf::from("/home/me/notes"));
        assert_eq!(ctx.resolve_path("../etc"), PathBuf::from("/etc"));
        assert_eq!(ctx.mode, PresentationMode::Default);
    }
}
