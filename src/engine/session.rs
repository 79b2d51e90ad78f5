//! engine::session
//!
//! One interactive session: the registry, the pipeline, the presenter and
//! the session state (current directory, presentation mode).
//!
//! # Architecture
//!
//! [`Session::handle_line`] is the dispatch point for every input line:
//!
//! ```text
//! ""            -> nothing
//! ":mode ..."   -> switch or show the presentation mode
//! ":plan ..."   -> dry-run the rest of the line, show the plan
//! "<cmd> ..."   -> registry lookup, then Pipeline::run
//! ```
//!
//! Lines are handled one at a time; a run completes before the next line is
//! read, so session state needs no locking. Session changes requested by
//! Execute are applied only after a successful run.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use super::parse::{command_name, tokenize};
use super::plan::ExecutionPlan;
use super::registry::CommandRegistry;
use super::runner::{Pipeline, PipelineError, RunOutcome};
use super::CommandContext;
use crate::core::output::{CommandOutput, ErrorData};
use crate::core::value::Value;
use crate::ui::output::write_block;
use crate::ui::present::{PresentationMode, Presenter};

/// What a line did.
#[derive(Debug)]
pub enum LineResult {
    /// Blank line.
    Empty,
    /// A `:` control line was handled.
    Control(CommandOutput),
    /// The first word named no registered command.
    Unknown(CommandOutput),
    /// A command ran through the pipeline.
    Command(RunOutcome),
}

impl LineResult {
    pub fn output(&self) -> Option<&CommandOutput> {
        match self {
            LineResult::Empty => None,
            LineResult::Control(output) | LineResult::Unknown(output) => Some(output),
            LineResult::Command(outcome) => Some(&outcome.output),
        }
    }

    /// Whether the line ended in an error Output.
    pub fn is_error(&self) -> bool {
        self.output().map_or(false, CommandOutput::is_error)
    }
}

/// An interactive session.
#[derive(Debug)]
pub struct Session {
    registry: Arc<CommandRegistry>,
    pipeline: Pipeline,
    presenter: Presenter,
    context: CommandContext,
    running: bool,
}

impl Session {
    pub fn new(registry: CommandRegistry, presenter: Presenter, context: CommandContext) -> Self {
        let context = context.with_mode(presenter.mode());
        Self {
            registry: Arc::new(registry),
            pipeline: Pipeline::new(),
            presenter,
            context,
            running: true,
        }
    }

    pub fn with_pipeline(mut self, pipeline: Pipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    /// Mutable access for late registration (definitions files, embedders).
    pub fn registry_mut(&mut self) -> &mut CommandRegistry {
        Arc::make_mut(&mut self.registry)
    }

    pub fn presenter(&self) -> &Presenter {
        &self.presenter
    }

    pub fn context(&self) -> &CommandContext {
        &self.context
    }

    pub fn current_dir(&self) -> &Path {
        &self.context.current_dir
    }

    pub fn mode(&self) -> PresentationMode {
        self.presenter.mode()
    }

    /// False once a command asked the session to end.
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Switch the presentation mode for subsequent output.
    pub fn set_mode(&mut self, mode: PresentationMode) {
        self.presenter.set_mode(mode);
        self.context.mode = mode;
    }

    /// Prompt text: `shellx <dir>> `, prefixed with the mode when it is not
    /// the default.
    pub fn prompt(&self) -> String {
        let dir = display_dir(&self.context.current_dir, self.context.home_dir.as_deref());
        match self.mode() {
            PresentationMode::Default => format!("shellx {}> ", dir),
            mode => format!("[{}] shellx {}> ", mode, dir),
        }
    }

    /// Command names completing the first word of `line`.
    pub fn complete(&self, line: &str) -> Vec<String> {
        let trimmed = line.trim_start();
        if trimmed.contains(char::is_whitespace) {
            return Vec::new();
        }
        self.registry
            .command_names()
            .into_iter()
            .filter(|name| name.starts_with(trimmed))
            .collect()
    }

    /// Handle one input line, writing rendered output to `out`.
    pub async fn handle_line(
        &mut self,
        line: &str,
        out: &mut dyn Write,
    ) -> Result<LineResult, PipelineError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(LineResult::Empty);
        }

        if let Some(control) = line.strip_prefix(':') {
            let output = self.control(control).await;
            self.present(&output, out)?;
            return Ok(LineResult::Control(output));
        }

        let Some(name) = command_name(line) else {
            return Ok(LineResult::Empty);
        };
        let Some(def) = self.registry.get(&name) else {
            debug!(command = %name, "unknown command");
            let output = self.unknown_command(&name);
            self.present(&output, out)?;
            return Ok(LineResult::Unknown(output));
        };

        let ctx = self.context.clone().with_commands(Arc::clone(&self.registry));
        let outcome = self
            .pipeline
            .run(line, def, &ctx, &self.presenter, out)
            .await?;

        if let Some(dir) = &outcome.changes.current_dir {
            debug!(dir = %dir.display(), "changing directory");
            self.context.current_dir = dir.clone();
        }
        if outcome.changes.exit {
            self.running = false;
        }
        Ok(LineResult::Command(outcome))
    }

    /// Dry-run `line` against the registered command it names.
    pub async fn dry_run(&self, line: &str) -> Result<ExecutionPlan, PipelineError> {
        let name = command_name(line).unwrap_or_default();
        let def = self
            .registry
            .get(&name)
            .ok_or_else(|| PipelineError::UnknownCommand(name.clone()))?;
        let ctx = self.context.clone().with_commands(Arc::clone(&self.registry));
        self.pipeline.dry_run(line, def, &ctx).await
    }

    fn present(&self, output: &CommandOutput, out: &mut dyn Write) -> Result<(), PipelineError> {
        write_block(out, &self.presenter.render(output))?;
        Ok(())
    }

    async fn control(&mut self, line: &str) -> CommandOutput {
        let tokens = tokenize(line);
        match tokens.first().map(String::as_str) {
            Some("mode") => self.mode_control(tokens.get(1).map(String::as_str)),
            Some("plan") => {
                let rest = line.trim_start().strip_prefix("plan").unwrap_or_default().trim();
                self.plan_control(rest).await
            }
            _ => CommandOutput::error_with(
                ErrorData::new(format!("Unknown control command: :{}", line))
                    .with_suggestions(vec![":mode [name]".to_string(), ":plan <command>".to_string()]),
            ),
        }
    }

    fn mode_control(&mut self, requested: Option<&str>) -> CommandOutput {
        let Some(requested) = requested else {
            return CommandOutput::text(format!(
                "Current mode: {}\nAvailable modes: {}",
                self.mode(),
                PresentationMode::names().join(", ")
            ));
        };

        match requested.parse::<PresentationMode>() {
            Ok(mode) => {
                self.set_mode(mode);
                debug!(%mode, "presentation mode changed");
                CommandOutput::success(format!("Presentation mode set to: {}", mode))
            }
            Err(_) => CommandOutput::error(format!(
                "Invalid mode. Available modes: {}",
                PresentationMode::names().join(", ")
            )),
        }
    }

    async fn plan_control(&self, line: &str) -> CommandOutput {
        let Some(name) = command_name(line) else {
            return CommandOutput::error("Usage: :plan <command> [args]");
        };
        let Some(def) = self.registry.get(&name) else {
            return self.unknown_command(&name);
        };

        let ctx = self.context.clone().with_commands(Arc::clone(&self.registry));
        match self.pipeline.dry_run(line, def, &ctx).await {
            Ok(plan) => {
                let rows = plan
                    .steps
                    .iter()
                    .map(|step| {
                        vec![
                            Value::from(step.id.clone()),
                            Value::from(step.action.clone()),
                            Value::from(step.description.clone()),
                            Value::from(step.dependencies.join(", ")),
                        ]
                    })
                    .collect();
                let headers = ["Step", "Action", "Description", "Depends On"]
                    .iter()
                    .map(|h| h.to_string())
                    .collect();
                let description = if plan.reversible {
                    format!("{} step(s), reversible", plan.step_count())
                } else {
                    format!("{} step(s)", plan.step_count())
                };
                CommandOutput::table(headers, rows)
                    .with_title(format!("Execution Plan: {}", def.name))
                    .with_description(description)
            }
            Err(err) => CommandOutput::error(err.to_string()),
        }
    }

    fn unknown_command(&self, name: &str) -> CommandOutput {
        let mut data = ErrorData::new(format!("Unknown command: {}", name));
        let suggestions = self.registry.suggest(name);
        if suggestions.is_empty() {
            data = data.with_details("Type 'help' to see available commands");
        } else {
            data = data.with_suggestions(suggestions);
        }
        CommandOutput::error_with(data)
    }
}

fn display_dir(dir: &Path, home: Option<&Path>) -> String {
    if let Some(rest) = home.and_then(|home| dir.strip_prefix(home).ok()) {
        if rest.as_os_str().is_empty() {
            return "~".to_string();
        }
        return PathBuf::from("~").join(rest).display().to_string();
    }
    dir.display().to_string()
}
