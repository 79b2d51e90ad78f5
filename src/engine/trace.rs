//! engine::trace
//!
//! Per-run record of events and step status.
//!
//! Execute-stage code reports progress only by emitting events into the
//! trace; it never renders. The trace is returned with the run result for
//! inspection and feeds the duration line of the `detailed` mode.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::core::value::Value;

/// Event severity/kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Info,
    Warning,
    Error,
    Progress,
    Debug,
}

/// One emitted event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ExecutionEvent {
    pub fn new(kind: EventKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            timestamp: Utc::now(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: impl Into<Value>) -> Self {
        self.data = Some(data.into());
        self
    }
}

/// Lifecycle of one plan step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

/// Status record for one plan step.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepTrace {
    pub step_id: String,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    pub status: StepStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Everything recorded during one pipeline run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionTrace {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub steps: Vec<StepTrace>,
    pub events: Vec<ExecutionEvent>,
    #[serde(skip)]
    clock: Instant,
}

impl Default for ExecutionTrace {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionTrace {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            steps: Vec::new(),
            events: Vec::new(),
            clock: Instant::now(),
        }
    }

    /// Time since the run started.
    pub fn elapsed(&self) -> Duration {
        self.clock.elapsed()
    }

    pub fn push(&mut self, event: ExecutionEvent) {
        self.events.push(event);
    }

    pub fn events_of(&self, kind: EventKind) -> impl Iterator<Item = &ExecutionEvent> {
        self.events.iter().filter(move |e| e.kind == kind)
    }

    fn step_mut(&mut self, step_id: &str) -> Option<&mut StepTrace> {
        self.steps.iter_mut().rev().find(|s| s.step_id == step_id)
    }

    pub fn step_started(&mut self, step_id: &str) {
        self.steps.push(StepTrace {
            step_id: step_id.to_string(),
            started_at: Utc::now(),
            ended_at: None,
            status: StepStatus::Running,
            error: None,
        });
    }

    fn finish_step(&mut self, step_id: &str, status: StepStatus, error: Option<String>) {
        let now = Utc::now();
        match self.step_mut(step_id) {
            Some(step) => {
                step.status = status;
                step.ended_at = Some(now);
                step.error = error;
            }
            None => self.steps.push(StepTrace {
                step_id: step_id.to_string(),
                started_at: now,
                ended_at: Some(now),
                status,
                error,
            }),
        }
    }

    pub fn step_completed(&mut self, step_id: &str) {
        self.finish_step(step_id, StepStatus::Completed, None);
    }

    pub fn step_failed(&mut self, step_id: &str, error: impl Into<String>) {
        self.finish_step(step_id, StepStatus::Failed, Some(error.into()));
    }

    pub fn step_skipped(&mut self, step_id: &str) {
        self.finish_step(step_id, StepStatus::Skipped, None);
    }

    pub fn step_status(&self, step_id: &str) -> Option<StepStatus> {
        self.steps
            .iter()
            .rev()
            .find(|s| s.step_id == step_id)
            .map(|s| s.status)
    }

    /// Ids of completed steps, in completion order.
    pub fn completed_steps(&self) -> Vec<&str> {
        self.steps
            .iter()
            .filter(|s| s.status == StepStatus::Completed)
            .map(|s| s.step_id.as_str())
            .collect()
    }
}
