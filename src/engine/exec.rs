//! engine::exec
//!
//! The Execute stage: execution context and default executor.
//!
//! # Architecture
//!
//! Execute is the only stage allowed to cause side effects or mutate
//! session state. It receives the plan and an [`ExecutionContext`], which
//! carries:
//!
//! - a snapshot of the [`CommandContext`] (directory, mode, collaborators)
//! - the run's [`ExecutionTrace`], the sole channel for progress reporting
//! - a [`CancellationToken`] and optional deadline, honoured cooperatively
//!   by collaborators
//! - pending session changes (directory, exit), applied after the run
//!
//! # Invariants
//!
//! - Execute code never renders; it emits events and returns an Output
//! - Session state changes are recorded on the context, never applied
//!   directly, so a failed or cancelled run leaves the session untouched
//!
//! # Example
//!
//! ```ignore
//! let mut ctx = ExecutionContext::new(command_ctx, CancellationToken::new());
//! ctx.info("Reading directory");
//! let output = default_execute(&def, &plan, &mut ctx).await?;
//! ```

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::command::{CommandDefinition, Execution};
use super::plan::ExecutionPlan;
use super::trace::{EventKind, ExecutionEvent, ExecutionTrace, StepStatus};
use super::CommandContext;
use crate::core::output::CommandOutput;
use crate::core::value::Value;
use crate::host::{self, Host};
use crate::ui::present::PresentationMode;

/// Mutable state available to the Execute stage of one run.
#[derive(Debug)]
pub struct ExecutionContext {
    context: CommandContext,
    trace: ExecutionTrace,
    cancel: CancellationToken,
    deadline: Option<Instant>,
    changes: SessionChanges,
}

/// Session state changes requested by Execute.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionChanges {
    /// New current directory.
    pub current_dir: Option<PathBuf>,
    /// End the session after presenting.
    pub exit: bool,
}

impl SessionChanges {
    pub fn is_empty(&self) -> bool {
        self.current_dir.is_none() && !self.exit
    }
}

impl ExecutionContext {
    pub fn new(context: CommandContext, cancel: CancellationToken) -> Self {
        Self::with_trace(context, cancel, ExecutionTrace::new())
    }

    /// Continue an existing trace (the runner starts it at Parse).
    pub fn with_trace(context: CommandContext, cancel: CancellationToken, trace: ExecutionTrace) -> Self {
        Self {
            context,
            trace,
            cancel,
            deadline: None,
            changes: SessionChanges::default(),
        }
    }

    pub fn with_deadline(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    pub fn context(&self) -> &CommandContext {
        &self.context
    }

    pub fn current_dir(&self) -> &Path {
        &self.context.current_dir
    }

    pub fn home_dir(&self) -> Option<&Path> {
        self.context.home_dir.as_deref()
    }

    pub fn mode(&self) -> PresentationMode {
        self.context.mode
    }

    pub fn host(&self) -> &Host {
        &self.context.host
    }

    /// Resolve a user-supplied path against the current directory.
    pub fn resolve_path(&self, target: &str) -> PathBuf {
        host::resolve_path(self.current_dir(), self.home_dir(), target)
    }

    /// Change the session's current directory once this run succeeds.
    ///
    /// Later steps of the same run observe the new directory.
    pub fn change_dir(&mut self, dir: PathBuf) {
        self.context.current_dir = dir.clone();
        self.changes.current_dir = Some(dir);
    }

    pub fn next_dir(&self) -> Option<&Path> {
        self.changes.current_dir.as_deref()
    }

    /// Ask the session to end once this run succeeds.
    pub fn request_exit(&mut self) {
        self.changes.exit = true;
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline, if one is set.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    pub fn trace(&self) -> &ExecutionTrace {
        &self.trace
    }

    pub fn trace_mut(&mut self) -> &mut ExecutionTrace {
        &mut self.trace
    }

    /// Append an event to the trace, mirroring it to the log.
    pub fn emit(&mut self, event: ExecutionEvent) {
        match event.kind {
            EventKind::Debug | EventKind::Progress => debug!(kind = ?event.kind, "{}", event.message),
            EventKind::Info => info!("{}", event.message),
            EventKind::Warning => warn!("{}", event.message),
            EventKind::Error => error!("{}", event.message),
        }
        self.trace.push(event);
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.emit(ExecutionEvent::new(EventKind::Info, message));
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.emit(ExecutionEvent::new(EventKind::Warning, message));
    }

    pub fn debug(&mut self, message: impl Into<String>) {
        self.emit(ExecutionEvent::new(EventKind::Debug, message));
    }

    /// Progress event carrying `{current, total}`.
    pub fn progress(&mut self, message: impl Into<String>, current: u64, total: u64) {
        let data = Value::Object(
            [
                ("current".to_string(), Value::from(current)),
                ("total".to_string(), Value::from(total)),
            ]
            .into_iter()
            .collect(),
        );
        self.emit(ExecutionEvent::new(EventKind::Progress, message).with_data(data));
    }

    pub fn step_started(&mut self, step_id: &str) {
        self.trace.step_started(step_id);
    }

    pub fn step_completed(&mut self, step_id: &str) {
        self.trace.step_completed(step_id);
    }

    pub fn step_failed(&mut self, step_id: &str, error: impl Into<String>) {
        self.trace.step_failed(step_id, error);
    }

    pub fn step_skipped(&mut self, step_id: &str) {
        self.trace.step_skipped(step_id);
    }

    pub fn step_status(&self, step_id: &str) -> Option<StepStatus> {
        self.trace.step_status(step_id)
    }

    /// Split into the trace and the requested session changes.
    pub fn finish(self) -> (ExecutionTrace, SessionChanges) {
        (self.trace, self.changes)
    }
}

/// Execute a plan with the definition's execution strategy.
///
/// A legacy handler receives the positional targets carried by the first
/// step and yields an empty text output.
pub async fn default_execute(
    def: &CommandDefinition,
    plan: &ExecutionPlan,
    ctx: &mut ExecutionContext,
) -> anyhow::Result<CommandOutput> {
    match &def.execution {
        Execution::Custom(execute) => execute(plan, ctx).await,
        Execution::Handler(handler) => {
            let args = plan
                .steps
                .first()
                .and_then(|step| step.param("targets"))
                .map(Value::to_string_list)
                .unwrap_or_default();
            handler(&args, ctx)?;
            Ok(CommandOutput::text(""))
        }
        Execution::NotImplemented => Ok(CommandOutput::error("Command execution not implemented")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::intent::CommandIntent;
    use crate::engine::plan::default_plan;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    fn context() -> ExecutionContext {
        ExecutionContext::new(CommandContext::new("/work"), CancellationToken::new())
    }

    mod context {
        use super::*;

        #[test]
        fn resolve_relative() {
            let ctx = context();
            assert_eq!(ctx.resolve_path("src"), PathBuf::from("/work/src"));
            assert_eq!(ctx.resolve_path("/abs"), PathBuf::from("/abs"));
        }

        #[test]
        fn change_dir_recorded() {
            let mut ctx = context();
            assert!(ctx.next_dir().is_none());
            ctx.change_dir(PathBuf::from("/tmp"));
            assert_eq!(ctx.current_dir(), Path::new("/tmp"));
            assert_eq!(ctx.resolve_path("x"), PathBuf::from("/tmp/x"));
            let (_, changes) = ctx.finish();
            assert_eq!(changes.current_dir, Some(PathBuf::from("/tmp")));
            assert!(!changes.exit);
        }

        #[test]
        fn events_reach_trace() {
            let mut ctx = context();
            ctx.info("a");
            ctx.warn("b");
            ctx.debug("c");
            ctx.progress("d", 1, 4);
            let kinds: Vec<EventKind> = ctx.trace().events.iter().map(|e| e.kind).collect();
            assert_eq!(
                kinds,
                vec![EventKind::Info, EventKind::Warning, EventKind::Debug, EventKind::Progress]
            );
            let data = ctx.trace().events[3].data.clone().unwrap();
            assert_eq!(data.as_object().unwrap()["total"], Value::from(4));
        }

        #[test]
        fn cancellation_visible() {
            let ctx = context();
            assert!(!ctx.is_cancelled());
            ctx.cancellation().cancel();
            assert!(ctx.is_cancelled());
        }

        #[test]
        fn deadline_remaining() {
            let ctx = context().with_deadline(Duration::from_secs(60));
            assert!(ctx.remaining().unwrap() <= Duration::from_secs(60));
            assert!(context().remaining().is_none());
        }

        #[test]
        fn step_status_passthrough() {
            let mut ctx = context();
            ctx.step_started("a");
            ctx.step_completed("a");
            assert_eq!(ctx.step_status("a"), Some(StepStatus::Completed));
        }
    }

    mod default_executor {
        use super::*;

        #[tokio::test]
        async fn not_implemented() {
            let def = CommandDefinition::builder("x").build().unwrap();
            let plan = default_plan(&CommandIntent::new("x"), &def);
            let output = default_execute(&def, &plan, &mut context()).await.unwrap();
            assert_eq!(output.error_message(), Some("Command execution not implemented"));
        }

        #[tokio::test]
        async fn handler_gets_targets() {
            let seen = Arc::new(Mutex::new(Vec::new()));
            let captured = Arc::clone(&seen);
            let def = CommandDefinition::builder("echo")
                .handler(move |args, ctx| {
                    ctx.info(args.join(" "));
                    captured.lock().unwrap().extend(args.iter().cloned());
                    Ok(())
                })
                .build()
                .unwrap();
            let mut intent = CommandIntent::new("echo");
            intent.targets = vec!["a".into(), "b".into()];
            let plan = default_plan(&intent, &def);

            let mut ctx = context();
            let output = default_execute(&def, &plan, &mut ctx).await.unwrap();
            assert!(output.is_empty_text());
            assert_eq!(*seen.lock().unwrap(), vec!["a", "b"]);
            assert_eq!(ctx.trace().events[0].message, "a b");
        }

        #[tokio::test]
        async fn custom_executor_runs() {
            let calls = Arc::new(AtomicUsize::new(0));
            let counter = Arc::clone(&calls);
            let def = CommandDefinition::builder("x")
                .on_execute(move |plan, _ctx| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    let steps = plan.step_count();
                    Box::pin(async move { Ok(CommandOutput::text(format!("{} steps", steps))) })
                })
                .build()
                .unwrap();
            let plan = default_plan(&CommandIntent::new("x"), &def);
            let output = default_execute(&def, &plan, &mut context()).await.unwrap();
            assert_eq!(calls.load(Ordering::SeqCst), 1);
            assert_eq!(serde_json::to_value(&output).unwrap()["data"], "1 steps");
        }

        #[tokio::test]
        async fn handler_error_propagates() {
            let def = CommandDefinition::builder("x")
                .handler(|_, _| anyhow::bail!("boom"))
                .build()
                .unwrap();
            let plan = default_plan(&CommandIntent::new("x"), &def);
            let err = default_execute(&def, &plan, &mut context()).await.unwrap_err();
            assert_eq!(err.to_string(), "boom");
        }
    }
}
