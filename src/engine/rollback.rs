//! Rollback of completed steps after an execution failure.
//!
//! When Execute fails on a reversible plan, the rollback hooks of the steps
//! the trace records as `completed` are run in reverse completion order.
//! Every hook runs even if an earlier one failed; each outcome is recorded
//! as an event in the trace.
//!
//! Steps without a hook are skipped silently. Steps that never completed
//! are left alone: they either did not start or cleaned up after
//! themselves when they failed.

use thiserror::Error;
use tracing::info;

use super::exec::ExecutionContext;
use super::plan::ExecutionPlan;
use super::trace::{EventKind, ExecutionEvent};

/// Errors from rollback hooks.
#[derive(Debug, Error)]
pub enum RollbackError {
    /// A hook returned an error.
    #[error("rollback of step '{step}' failed: {message}")]
    HookFailed { step: String, message: String },
}

/// Result of a rollback attempt.
#[derive(Debug)]
pub struct RollbackResult {
    /// Steps whose hooks succeeded.
    pub rolled_back: Vec<String>,
    /// Steps whose hooks failed.
    pub failed: Vec<(String, RollbackError)>,
    /// Whether every hook succeeded.
    pub complete: bool,
}

impl Default for RollbackResult {
    fn default() -> Self {
        Self::new()
    }
}

impl RollbackResult {
    pub fn new() -> Self {
        Self {
            rolled_back: vec![],
            failed: vec![],
            complete: true,
        }
    }

    pub fn record_success(&mut self, step: String) {
        self.rolled_back.push(step);
    }

    pub fn record_failure(&mut self, step: String, error: RollbackError) {
        self.failed.push((step, error));
        self.complete = false;
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }

    /// Whether any hook ran at all.
    pub fn is_empty(&self) -> bool {
        self.rolled_back.is_empty() && self.failed.is_empty()
    }

    pub fn summary(&self) -> String {
        if self.complete {
            format!("Rolled back {} steps successfully", self.rolled_back.len())
        } else {
            format!(
                "Partial rollback: {} succeeded, {} failed",
                self.rolled_back.len(),
                self.failed.len()
            )
        }
    }
}

/// Undo the completed steps of `plan`.
///
/// Hooks are awaited one at a time, newest first.
pub async fn rollback_completed(plan: &ExecutionPlan, ctx: &mut ExecutionContext) -> RollbackResult {
    let mut result = RollbackResult::new();

    let completed: Vec<String> = ctx
        .trace()
        .completed_steps()
        .into_iter()
        .rev()
        .map(str::to_string)
        .collect();

    for step_id in completed {
        let Some(hook) = plan.step(&step_id).and_then(|s| s.rollback.clone()) else {
            continue;
        };

        info!(step = %step_id, "rolling back step");
        match hook().await {
            Ok(()) => {
                ctx.emit(ExecutionEvent::new(
                    EventKind::Info,
                    format!("Rolled back step '{}'", step_id),
                ));
                result.record_success(step_id);
            }
            Err(err) => {
                let error = RollbackError::HookFailed {
                    step: step_id.clone(),
                    message: format!("{:#}", err),
                };
                ctx.emit(ExecutionEvent::new(EventKind::Error, error.to_string()));
                result.record_failure(step_id, error);
            }
        }
    }

    result
}
