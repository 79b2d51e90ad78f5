//! engine::plan
//!
//! Execution plans: ordered, inspectable steps.
//!
//! # Architecture
//!
//! A plan is produced by the Plan stage and consumed by Execute. It can be
//! previewed without side effects (dry-run), which is why it is plain data
//! apart from the optional per-step rollback hooks.
//!
//! # Invariants
//!
//! - Step ids are unique within a plan
//! - Every dependency names an earlier step (no forward or cyclic edges)
//! - Dependencies are informational; steps run in plan order
//!
//! # Example
//!
//! ```
//! use shellx::engine::plan::{ExecutionPlan, ExecutionStep};
//!
//! let plan = ExecutionPlan::new()
//!     .with_step(ExecutionStep::new("fetch", "git", "Fetch remote"))
//!     .with_step(ExecutionStep::new("merge", "git", "Merge").depends_on("fetch"));
//!
//! assert!(plan.check_dependencies().is_ok());
//! assert!(plan.digest().starts_with("sha256:"));
//! ```

use std::collections::{BTreeMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Serialize;
use sha2::{Digest, Sha256};

use super::command::{Callback, CommandDefinition};
use super::intent::CommandIntent;
use crate::core::value::Value;

/// Future returned by a rollback hook.
pub type RollbackFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;

/// Undo hook attached to a step.
pub type RollbackFn = dyn Fn() -> RollbackFuture + Send + Sync;

/// One step of a plan.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionStep {
    pub id: String,
    pub action: String,
    pub description: String,
    pub params: BTreeMap<String, Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
    #[serde(skip)]
    pub rollback: Option<Callback<RollbackFn>>,
}

impl PartialEq for ExecutionStep {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.action == other.action
            && self.description == other.description
            && self.params == other.params
            && self.dependencies == other.dependencies
            && self.rollback.is_some() == other.rollback.is_some()
    }
}

impl ExecutionStep {
    pub fn new(id: impl Into<String>, action: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            action: action.into(),
            description: description.into(),
            params: BTreeMap::new(),
            dependencies: Vec::new(),
            rollback: None,
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn with_params(mut self, params: BTreeMap<String, Value>) -> Self {
        self.params = params;
        self
    }

    pub fn depends_on(mut self, id: impl Into<String>) -> Self {
        self.dependencies.push(id.into());
        self
    }

    pub fn with_rollback<F>(mut self, f: F) -> Self
    where
        F: Fn() -> RollbackFuture + Send + Sync + 'static,
    {
        self.rollback = Some(Callback::from_arc(Arc::new(f)));
        self
    }

    pub fn param(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }
}

/// Estimated effect of running a plan.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpactAssessment {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files_affected: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes_changed: Option<u64>,
    pub destructive: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// An ordered sequence of steps.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionPlan {
    pub steps: Vec<ExecutionStep>,
    pub reversible: bool,
    pub dry_run: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_impact: Option<ImpactAssessment>,
}

impl ExecutionPlan {
    /// Create an empty, irreversible plan.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_step(mut self, step: ExecutionStep) -> Self {
        self.steps.push(step);
        self
    }

    pub fn with_steps(mut self, steps: impl IntoIterator<Item = ExecutionStep>) -> Self {
        self.steps.extend(steps);
        self
    }

    pub fn reversible(mut self, reversible: bool) -> Self {
        self.reversible = reversible;
        self
    }

    pub fn with_impact(mut self, impact: ImpactAssessment) -> Self {
        self.estimated_impact = Some(impact);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    pub fn step(&self, id: &str) -> Option<&ExecutionStep> {
        self.steps.iter().find(|s| s.id == id)
    }

    /// Check step id uniqueness and that dependencies point backwards.
    pub fn check_dependencies(&self) -> Result<(), PlanError> {
        let mut seen: HashSet<&str> = HashSet::new();
        for step in &self.steps {
            for dep in &step.dependencies {
                if !seen.contains(dep.as_str()) {
                    return Err(PlanError::InvalidDependency {
                        step: step.id.clone(),
                        dependency: dep.clone(),
                    });
                }
            }
            if !seen.insert(step.id.as_str()) {
                return Err(PlanError::DuplicateStep(step.id.clone()));
            }
        }
        Ok(())
    }

    /// Content digest over steps and reversibility (`dry_run` excluded).
    pub fn digest(&self) -> String {
        let canonical = serde_json::json!({
            "steps": self.steps,
            "reversible": self.reversible,
        });
        let mut hasher = Sha256::new();
        hasher.update(canonical.to_string().as_bytes());
        format!("sha256:{}", hex::encode(hasher.finalize()))
    }

    /// Human-readable outline of the plan.
    pub fn preview(&self) -> String {
        if self.is_empty() {
            return "No steps".to_string();
        }

        let mut lines = Vec::with_capacity(self.steps.len());
        for (i, step) in self.steps.iter().enumerate() {
            let mut line = format!("  {}. [{}] {}", i + 1, step.id, step.description);
            if !step.dependencies.is_empty() {
                line.push_str(&format!(" (after {})", step.dependencies.join(", ")));
            }
            lines.push(line);
        }
        if self.reversible {
            lines.push("  (reversible)".to_string());
        }
        lines.join("\n")
    }
}

/// Errors from plan generation.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum PlanError {
    /// A dependency does not name an earlier step.
    #[error("step '{step}' depends on '{dependency}', which is not an earlier step")]
    InvalidDependency { step: String, dependency: String },

    /// Two steps share an id.
    #[error("duplicate step id '{0}'")]
    DuplicateStep(String),
}

/// Default planner.
///
/// A statically composed command expands into one step per sub-command,
/// each depending on the previous one. Otherwise a single `execute` step
/// carries the intent's options, plus the targets under `targets` when no
/// option already uses that name.
pub fn default_plan(intent: &CommandIntent, def: &CommandDefinition) -> ExecutionPlan {
    if !def.compose.is_empty() {
        let steps = def.compose.iter().enumerate().map(|(index, step)| {
            let mut planned = ExecutionStep::new(
                format!("step-{}", index),
                step.command.clone(),
                format!("Execute {}", step.command),
            )
            .with_params(step.args.clone());
            if index > 0 {
                planned = planned.depends_on(format!("step-{}", index - 1));
            }
            planned
        });
        return ExecutionPlan::new().with_steps(steps);
    }

    let mut params = intent.options.clone();
    params
        .entry("targets".to_string())
        .or_insert_with(|| Value::from(intent.targets.clone()));

    ExecutionPlan::new().with_step(
        ExecutionStep::new("execute", intent.action.clone(), format!("Execute {}", def.name))
            .with_params(params),
    )
}
