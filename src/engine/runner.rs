//! engine::runner
//!
//! The pipeline runner: the single entry point for command execution.
//!
//! # Architecture
//!
//! Every input line for a resolved command flows through [`Pipeline::run`]:
//!
//! ```text
//! Parse -> Intent -> Validate -> Plan -> Execute -> Present
//! ```
//!
//! Stages run strictly in order, once each. A run ends in one of three ways:
//!
//! 1. Present of the executed Output
//! 2. Present of a validation error (Execute never runs)
//! 3. Present of an error Output converted from a failure at any stage
//!
//! [`Pipeline::dry_run`] stops after Plan and hands the plan back instead.
//!
//! # Invariants
//!
//! - A failing validation prevents Execute
//! - Validation warnings are presented before Execute starts
//! - The session survives every command failure; only sink write errors
//!   escape as [`PipelineError`] from `run`
//! - Execute is raced against the deadline and Ctrl-C; on either, the run's
//!   cancellation token is cancelled
//!
//! # Example
//!
//! ```ignore
//! let pipeline = Pipeline::new().with_timeout(Some(Duration::from_secs(30)));
//! let outcome = pipeline.run("lsx -l src", &def, &ctx, &presenter, &mut stdout).await?;
//! assert!(outcome.executed);
//! ```

use std::fmt;
use std::io::Write;
use std::time::{Duration, Instant};

use chrono::Utc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use super::command::{CommandDefinition, Stage};
use super::exec::{default_execute, ExecutionContext, SessionChanges};
use super::intent::{default_intent, CommandIntent};
use super::parse::parse;
use super::plan::{default_plan, ExecutionPlan, PlanError};
use super::rollback::rollback_completed;
use super::trace::{EventKind, ExecutionEvent, ExecutionTrace};
use super::validate::{default_validate, ValidationResult};
use super::CommandContext;
use crate::core::output::{CommandOutput, ErrorData, OutputMetadata};
use crate::ui::output::write_block;
use crate::ui::present::Presenter;

/// A pipeline stage, for logging and error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Parse,
    Intent,
    Validate,
    Plan,
    Execute,
    Present,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::Parse => "parse",
            PipelineStage::Intent => "intent",
            PipelineStage::Validate => "validate",
            PipelineStage::Plan => "plan",
            PipelineStage::Execute => "execute",
            PipelineStage::Present => "present",
        };
        f.write_str(name)
    }
}

/// Errors from the pipeline runner.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Writing rendered output failed.
    #[error("failed to write output: {0}")]
    Io(#[from] std::io::Error),

    /// Validation rejected the intent (dry-run only).
    #[error("{0}")]
    Validation(String),

    /// A stage callback failed (dry-run only).
    #[error("{stage} stage failed: {message}")]
    Stage {
        stage: PipelineStage,
        message: String,
    },

    /// The plan broke the dependency invariant (dry-run only).
    #[error("invalid plan: {0}")]
    Plan(#[from] PlanError),

    /// No registered command has this name (session dry-run only).
    #[error("Unknown command: {0}")]
    UnknownCommand(String),
}

/// Everything a run produced.
#[derive(Debug)]
pub struct RunOutcome {
    /// The presented Output, with run metadata attached.
    pub output: CommandOutput,
    pub trace: ExecutionTrace,
    /// The plan Execute received, if the run got that far.
    pub plan: Option<ExecutionPlan>,
    /// Whether Execute ran.
    pub executed: bool,
    /// Session changes requested by a successful Execute.
    pub changes: SessionChanges,
}

enum ExecuteOutcome {
    Finished(anyhow::Result<CommandOutput>),
    TimedOut(Duration),
    Interrupted,
}

/// Staged command pipeline.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    timeout: Option<Duration>,
    interruptible: bool,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deadline for the Execute stage.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Cancel Execute on Ctrl-C.
    pub fn interruptible(mut self, interruptible: bool) -> Self {
        self.interruptible = interruptible;
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Run one line for `def` and present the result to `out`.
    pub async fn run(
        &self,
        line: &str,
        def: &CommandDefinition,
        ctx: &CommandContext,
        presenter: &Presenter,
        out: &mut dyn Write,
    ) -> Result<RunOutcome, PipelineError> {
        let started = Instant::now();
        let mut trace = ExecutionTrace::new();
        debug!(run_id = %trace.run_id, command = %def.name, "pipeline run");

        let mut outcome = match self.prepare(line, def, ctx, presenter, out, &mut trace).await? {
            Prepared::Ready(plan) => self.execute(def, plan, ctx, trace).await,
            Prepared::Stopped(output) => RunOutcome {
                output,
                trace,
                plan: None,
                executed: false,
                changes: SessionChanges::default(),
            },
        };

        let timestamp = outcome
            .output
            .metadata
            .as_ref()
            .and_then(|m| m.timestamp)
            .unwrap_or_else(Utc::now);
        outcome.output = outcome.output.with_metadata(OutputMetadata {
            duration: Some(started.elapsed().as_millis() as u64),
            timestamp: Some(timestamp),
            ..OutputMetadata::default()
        });

        debug!(stage = %PipelineStage::Present, tag = outcome.output.tag(), "presenting");
        if !outcome.output.is_empty_text() {
            write_block(out, &presenter.render(&outcome.output))?;
        }
        Ok(outcome)
    }

    /// Parse through Plan, presenting validation warnings on the way.
    async fn prepare(
        &self,
        line: &str,
        def: &CommandDefinition,
        ctx: &CommandContext,
        presenter: &Presenter,
        out: &mut dyn Write,
        trace: &mut ExecutionTrace,
    ) -> Result<Prepared, PipelineError> {
        debug!(stage = %PipelineStage::Parse, "entering stage");
        let parsed = parse(line, def);

        debug!(stage = %PipelineStage::Intent, "entering stage");
        let intent = match resolve_intent(def, &parsed) {
            Ok(intent) => intent,
            Err(err) => return Ok(Prepared::Stopped(failure(PipelineStage::Intent, err, trace))),
        };

        debug!(stage = %PipelineStage::Validate, "entering stage");
        let validation = match validate_intent(def, &intent, ctx).await {
            Ok(validation) => validation,
            Err(err) => return Ok(Prepared::Stopped(failure(PipelineStage::Validate, err, trace))),
        };
        if !validation.valid {
            debug!(error = validation.error_message(), "validation failed");
            return Ok(Prepared::Stopped(CommandOutput::error(validation.error_message())));
        }
        for warning in &validation.warnings {
            warn!(command = %def.name, "{}", warning);
            trace.push(ExecutionEvent::new(EventKind::Warning, warning.clone()));
            write_block(out, &presenter.render(&CommandOutput::warning(warning.clone())))?;
        }

        debug!(stage = %PipelineStage::Plan, "entering stage");
        let plan = match build_plan(def, &intent, ctx) {
            Ok(plan) => plan,
            Err(err) => return Ok(Prepared::Stopped(failure(PipelineStage::Plan, err, trace))),
        };
        if let Err(err) = plan.check_dependencies() {
            return Ok(Prepared::Stopped(failure(PipelineStage::Plan, err.into(), trace)));
        }
        debug!(steps = plan.step_count(), digest = %plan.digest(), "plan ready");

        Ok(Prepared::Ready(plan))
    }

    async fn execute(
        &self,
        def: &CommandDefinition,
        plan: ExecutionPlan,
        ctx: &CommandContext,
        trace: ExecutionTrace,
    ) -> RunOutcome {
        debug!(stage = %PipelineStage::Execute, "entering stage");
        let cancel = CancellationToken::new();
        let mut exec_ctx = ExecutionContext::with_trace(ctx.clone(), cancel.clone(), trace);
        if let Some(timeout) = self.timeout {
            exec_ctx = exec_ctx.with_deadline(timeout);
        }

        let data = match self.execute_guarded(def, &plan, &mut exec_ctx, &cancel).await {
            ExecuteOutcome::Finished(Ok(output)) => {
                let (trace, changes) = exec_ctx.finish();
                return RunOutcome {
                    output,
                    trace,
                    plan: Some(plan),
                    executed: true,
                    changes,
                };
            }
            ExecuteOutcome::Finished(Err(err)) => {
                error!(command = %def.name, error = %err, "execution failed");
                ErrorData::new(err.to_string()).with_stack(format!("{:?}", err))
            }
            ExecuteOutcome::TimedOut(after) => {
                let message = format!("Command timed out after {}ms", after.as_millis());
                error!(command = %def.name, "{}", message);
                exec_ctx.emit(ExecutionEvent::new(EventKind::Error, message.clone()));
                ErrorData::new(message).with_code("TIMEOUT")
            }
            ExecuteOutcome::Interrupted => {
                let message = "Command cancelled".to_string();
                exec_ctx.emit(ExecutionEvent::new(EventKind::Error, message.clone()));
                ErrorData::new(message).with_code("CANCELLED")
            }
        };

        let data = if plan.reversible {
            let rollback = rollback_completed(&plan, &mut exec_ctx).await;
            if rollback.is_empty() {
                data
            } else {
                data.with_details(rollback.summary())
            }
        } else {
            data
        };
        let output = CommandOutput::error_with(data);

        // Failed runs never change the session.
        let (trace, _) = exec_ctx.finish();
        RunOutcome {
            output,
            trace,
            plan: Some(plan),
            executed: true,
            changes: SessionChanges::default(),
        }
    }

    async fn execute_guarded(
        &self,
        def: &CommandDefinition,
        plan: &ExecutionPlan,
        ctx: &mut ExecutionContext,
        cancel: &CancellationToken,
    ) -> ExecuteOutcome {
        let timeout = self.timeout;
        let interruptible = self.interruptible;

        let deadline = async {
            match timeout {
                Some(after) => tokio::time::sleep(after).await,
                None => std::future::pending::<()>().await,
            }
        };
        let interrupt = async {
            if interruptible && tokio::signal::ctrl_c().await.is_ok() {
                return;
            }
            std::future::pending::<()>().await
        };

        tokio::select! {
            result = default_execute(def, plan, ctx) => ExecuteOutcome::Finished(result),
            _ = deadline => {
                cancel.cancel();
                ExecuteOutcome::TimedOut(timeout.unwrap_or_default())
            }
            _ = interrupt => {
                cancel.cancel();
                ExecuteOutcome::Interrupted
            }
        }
    }

    /// Parse, Intent, Validate and Plan without executing or presenting.
    ///
    /// The returned plan is the one a live run would execute, marked
    /// `dry_run`.
    pub async fn dry_run(
        &self,
        line: &str,
        def: &CommandDefinition,
        ctx: &CommandContext,
    ) -> Result<ExecutionPlan, PipelineError> {
        let parsed = parse(line, def);
        let intent = resolve_intent(def, &parsed).map_err(|err| stage_error(PipelineStage::Intent, err))?;

        let validation = validate_intent(def, &intent, ctx)
            .await
            .map_err(|err| stage_error(PipelineStage::Validate, err))?;
        if !validation.valid {
            return Err(PipelineError::Validation(validation.error_message().to_string()));
        }

        let mut plan = build_plan(def, &intent, ctx).map_err(|err| stage_error(PipelineStage::Plan, err))?;
        plan.check_dependencies()?;
        plan.dry_run = true;
        debug!(command = %def.name, steps = plan.step_count(), "dry run planned");
        Ok(plan)
    }
}

enum Prepared {
    Ready(ExecutionPlan),
    Stopped(CommandOutput),
}

fn resolve_intent(
    def: &CommandDefinition,
    parsed: &super::parse::ParsedInput,
) -> anyhow::Result<CommandIntent> {
    match &def.intent {
        Stage::Custom(resolve) => resolve(parsed),
        Stage::Default => Ok(default_intent(parsed)),
    }
}

async fn validate_intent(
    def: &CommandDefinition,
    intent: &CommandIntent,
    ctx: &CommandContext,
) -> anyhow::Result<ValidationResult> {
    match &def.validate {
        Stage::Custom(validate) => validate(intent, ctx).await,
        Stage::Default => Ok(default_validate(intent, &def.parameters)),
    }
}

fn build_plan(
    def: &CommandDefinition,
    intent: &CommandIntent,
    ctx: &CommandContext,
) -> anyhow::Result<ExecutionPlan> {
    match &def.plan {
        Stage::Custom(plan) => plan(intent, ctx),
        Stage::Default => Ok(default_plan(intent, def)),
    }
}

fn stage_error(stage: PipelineStage, err: anyhow::Error) -> PipelineError {
    PipelineError::Stage {
        stage,
        message: format!("{:#}", err),
    }
}

/// Convert a stage failure into an error Output.
fn failure(stage: PipelineStage, err: anyhow::Error, trace: &mut ExecutionTrace) -> CommandOutput {
    error!(%stage, error = %err, "stage failed");
    trace.push(ExecutionEvent::new(EventKind::Error, err.to_string()));
    CommandOutput::error_with(ErrorData::new(err.to_string()).with_stack(format!("{:?}", err)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::output::OutputBody;
    use crate::engine::command::ParameterDefinition;
    use crate::engine::plan::ExecutionStep;
    use crate::ui::present::PresentationConfig;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn presenter() -> Presenter {
        Presenter::new(PresentationConfig::plain())
    }

    fn ctx() -> CommandContext {
        CommandContext::new("/work")
    }

    async fn run(pipeline: &Pipeline, line: &str, def: &CommandDefinition) -> (RunOutcome, String) {
        let mut out = Vec::new();
        let outcome = pipeline
            .run(line, def, &ctx(), &presenter(), &mut out)
            .await
            .unwrap();
        (outcome, String::from_utf8(out).unwrap())
    }

    fn counting(name: &str, calls: &Arc<AtomicUsize>) -> crate::engine::command::CommandBuilder {
        let calls = Arc::clone(calls);
        CommandDefinition::builder(name).on_execute(move |_, _| {
            calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async { Ok(CommandOutput::success("ran")) })
        })
    }

    mod stages {
        use super::*;

        #[tokio::test]
        async fn required_parameter_blocks_execute() {
            let calls = Arc::new(AtomicUsize::new(0));
            let def = counting("touch", &calls)
                .parameter(ParameterDefinition::path("path", "").required())
                .build()
                .unwrap();

            let (outcome, text) = run(&Pipeline::new(), "touch", &def).await;
            assert_eq!(calls.load(Ordering::SeqCst), 0);
            assert!(!outcome.executed);
            assert_eq!(
                outcome.output.error_message(),
                Some("Required parameter 'path' is missing")
            );
            assert_eq!(text, "[ERROR]: Required parameter 'path' is missing\n");
        }

        #[tokio::test]
        async fn success_runs_once_and_attaches_duration() {
            let calls = Arc::new(AtomicUsize::new(0));
            let def = counting("go", &calls).build().unwrap();
            let (outcome, text) = run(&Pipeline::new(), "go", &def).await;
            assert_eq!(calls.load(Ordering::SeqCst), 1);
            assert!(outcome.executed);
            let meta = outcome.output.metadata.as_ref().unwrap();
            assert!(meta.duration.is_some());
            assert!(meta.timestamp.is_some());
            assert_eq!(text, "[OK] ran\n");
        }

        #[tokio::test]
        async fn warnings_presented_before_execute() {
            let def = CommandDefinition::builder("warn")
                .on_validate(|_, _| Box::pin(async { Ok(ValidationResult::ok().with_warning("careful")) }))
                .on_execute(|_, ctx| {
                    ctx.info("executing");
                    Box::pin(async { Ok(CommandOutput::text("after")) })
                })
                .build()
                .unwrap();
            let (outcome, text) = run(&Pipeline::new(), "warn", &def).await;
            assert_eq!(text, "[WARN] careful\nafter\n");
            assert_eq!(outcome.trace.events[0].kind, EventKind::Warning);
            assert_eq!(outcome.trace.events[1].message, "executing");
        }

        #[tokio::test]
        async fn empty_text_not_presented() {
            let def = CommandDefinition::builder("quiet")
                .handler(|_, _| Ok(()))
                .build()
                .unwrap();
            let (outcome, text) = run(&Pipeline::new(), "quiet", &def).await;
            assert!(outcome.output.is_empty_text());
            assert!(text.is_empty());
        }

        #[tokio::test]
        async fn not_implemented_error() {
            let def = CommandDefinition::builder("stub").build().unwrap();
            let (_, text) = run(&Pipeline::new(), "stub", &def).await;
            assert_eq!(text, "[ERROR]: Command execution not implemented\n");
        }
    }

    mod failures {
        use super::*;

        #[tokio::test]
        async fn execute_error_becomes_output() {
            let def = CommandDefinition::builder("fail")
                .on_execute(|_, _| Box::pin(async { Err(anyhow::anyhow!("disk full")) }))
                .build()
                .unwrap();
            let (outcome, text) = run(&Pipeline::new(), "fail", &def).await;
            assert!(outcome.executed);
            assert_eq!(text, "[ERROR]: disk full\n");
            match &outcome.output.body {
                OutputBody::Error(data) => assert!(data.stack.as_deref().unwrap().contains("disk full")),
                other => panic!("unexpected body {:?}", other),
            }
        }

        #[tokio::test]
        async fn intent_error_stops_before_validate() {
            let validated = Arc::new(AtomicUsize::new(0));
            let counter = Arc::clone(&validated);
            let def = CommandDefinition::builder("bad")
                .on_intent(|_| anyhow::bail!("cannot resolve"))
                .on_validate(move |_, _| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Box::pin(async { Ok(ValidationResult::ok()) })
                })
                .build()
                .unwrap();
            let (outcome, _) = run(&Pipeline::new(), "bad", &def).await;
            assert_eq!(validated.load(Ordering::SeqCst), 0);
            assert_eq!(outcome.output.error_message(), Some("cannot resolve"));
            assert!(!outcome.executed);
        }

        #[tokio::test]
        async fn forward_dependency_rejected() {
            let def = CommandDefinition::builder("plan")
                .on_plan(|_, _| {
                    Ok(ExecutionPlan::new().with_step(ExecutionStep::new("a", "x", "A").depends_on("b")))
                })
                .on_execute(|_, _| Box::pin(async { Ok(CommandOutput::text("nope")) }))
                .build()
                .unwrap();
            let (outcome, _) = run(&Pipeline::new(), "plan", &def).await;
            assert!(!outcome.executed);
            assert!(outcome.output.error_message().unwrap().contains("'b'"));
        }

        #[tokio::test]
        async fn reversible_plan_rolls_back() {
            let undone = Arc::new(AtomicUsize::new(0));
            let counter = Arc::clone(&undone);
            let def = CommandDefinition::builder("mv")
                .on_plan(move |_, _| {
                    let counter = Arc::clone(&counter);
                    Ok(ExecutionPlan::new()
                        .with_step(ExecutionStep::new("move", "rename", "Move").with_rollback(move || {
                            counter.fetch_add(1, Ordering::SeqCst);
                            Box::pin(async { Ok(()) })
                        }))
                        .with_step(ExecutionStep::new("log", "write", "Log").depends_on("move"))
                        .reversible(true))
                })
                .on_execute(|_, ctx| {
                    ctx.step_started("move");
                    ctx.step_completed("move");
                    ctx.step_started("log");
                    ctx.step_failed("log", "no space");
                    Box::pin(async { Err(anyhow::anyhow!("log failed")) })
                })
                .build()
                .unwrap();
            let (outcome, text) = run(&Pipeline::new(), "mv", &def).await;
            assert_eq!(undone.load(Ordering::SeqCst), 1);
            assert_eq!(text, "[ERROR]: log failed\nRolled back 1 steps successfully\n");
            assert!(outcome.trace.events.iter().any(|e| e.message == "Rolled back step 'move'"));
        }

        #[tokio::test]
        async fn timeout_cancels() {
            let def = CommandDefinition::builder("slow")
                .on_execute(|_, ctx| {
                    let token = ctx.cancellation().clone();
                    Box::pin(async move {
                        token.cancelled().await;
                        Ok(CommandOutput::text("cancelled late"))
                    })
                })
                .build()
                .unwrap();
            let pipeline = Pipeline::new().with_timeout(Some(Duration::from_millis(20)));
            let (outcome, text) = run(&pipeline, "slow", &def).await;
            assert_eq!(text, "[ERROR] [TIMEOUT]: Command timed out after 20ms\n");
            assert!(outcome.changes.is_empty());
        }

        #[tokio::test]
        async fn timeout_rolls_back_completed_steps() {
            let undone = Arc::new(AtomicUsize::new(0));
            let counter = Arc::clone(&undone);
            let def = CommandDefinition::builder("mv")
                .on_plan(move |_, _| {
                    let counter = Arc::clone(&counter);
                    Ok(ExecutionPlan::new()
                        .with_step(ExecutionStep::new("move", "rename", "Move").with_rollback(move || {
                            counter.fetch_add(1, Ordering::SeqCst);
                            Box::pin(async { Ok(()) })
                        }))
                        .reversible(true))
                })
                .on_execute(|_, ctx| {
                    ctx.step_started("move");
                    ctx.step_completed("move");
                    let token = ctx.cancellation().clone();
                    Box::pin(async move {
                        token.cancelled().await;
                        Ok(CommandOutput::text("cancelled late"))
                    })
                })
                .build()
                .unwrap();
            let pipeline = Pipeline::new().with_timeout(Some(Duration::from_millis(20)));
            let (outcome, text) = run(&pipeline, "mv", &def).await;
            assert_eq!(undone.load(Ordering::SeqCst), 1);
            assert_eq!(
                text,
                "[ERROR] [TIMEOUT]: Command timed out after 20ms\nRolled back 1 steps successfully\n"
            );
            assert!(outcome.trace.events.iter().any(|e| e.message == "Rolled back step 'move'"));
        }

        #[tokio::test]
        async fn failed_run_drops_directory_change() {
            let def = CommandDefinition::builder("cd")
                .on_execute(|_, ctx| {
                    ctx.change_dir(PathBuf::from("/tmp"));
                    Box::pin(async { Err(anyhow::anyhow!("late failure")) })
                })
                .build()
                .unwrap();
            let (outcome, _) = run(&Pipeline::new(), "cd", &def).await;
            assert!(outcome.changes.current_dir.is_none());
        }
    }

    mod dry_run {
        use super::*;

        #[tokio::test]
        async fn matches_live_plan() {
            let calls = Arc::new(AtomicUsize::new(0));
            let def = counting("copy", &calls)
                .string_param("src", "")
                .string_param("dst", "")
                .bool_flag("force", "", Some("f"))
                .build()
                .unwrap();
            let pipeline = Pipeline::new();

            let dry = pipeline.dry_run("copy a b -f", &def, &ctx()).await.unwrap();
            assert_eq!(calls.load(Ordering::SeqCst), 0);
            assert!(dry.dry_run);

            let (outcome, _) = run(&pipeline, "copy a b -f", &def).await;
            let live = outcome.plan.unwrap();
            assert!(!live.dry_run);
            assert_eq!(live.steps, dry.steps);
            assert_eq!(live.reversible, dry.reversible);
            assert_eq!(live.digest(), dry.digest());
        }

        #[tokio::test]
        async fn validation_failure_is_error() {
            let def = CommandDefinition::builder("rm")
                .parameter(ParameterDefinition::path("path", "").required())
                .build()
                .unwrap();
            let err = Pipeline::new().dry_run("rm", &def, &ctx()).await.unwrap_err();
            assert_eq!(err.to_string(), "Required parameter 'path' is missing");
        }

        #[tokio::test]
        async fn plan_error_surfaces() {
            let def = CommandDefinition::builder("x")
                .on_plan(|_, _| anyhow::bail!("no plan"))
                .build()
                .unwrap();
            let err = Pipeline::new().dry_run("x", &def, &ctx()).await.unwrap_err();
            assert_eq!(err.to_string(), "plan stage failed: no plan");
        }
    }
}
