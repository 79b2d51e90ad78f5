//! engine::command
//!
//! Command definitions: the registration surface for command authors.
//!
//! # Architecture
//!
//! A [`CommandDefinition`] is an immutable record describing a command's
//! identity, its parameter/flag schema and, optionally, custom behaviour for
//! the Intent, Validate, Plan and Execute stages. Each overridable stage is a
//! [`Stage`]: either the engine's default behaviour or a custom callback, so
//! the runner dispatches with a `match` instead of scattered null checks.
//!
//! Definitions are assembled with [`CommandBuilder`] and frozen by
//! [`CommandBuilder::build`], which enforces schema invariants up front.
//!
//! # Invariants
//!
//! - Parameter names are unique; flag names and short forms are unique
//! - Short flags are exactly one character
//! - A `choice` parameter declares its choices
//! - An `array` parameter, if any, is the last parameter
//!
//! # Example
//!
//! ```
//! use shellx::engine::command::{CommandDefinition, ParameterDefinition};
//!
//! let def = CommandDefinition::builder("touch")
//!     .description("Create an empty file")
//!     .category("filesystem")
//!     .parameter(ParameterDefinition::path("path", "File to create").required())
//!     .bool_flag("force", "Overwrite existing files", Some("f"))
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(def.usage, "touch");
//! assert!(def.find_flag("force").is_some());
//! ```

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::future::Future;
use std::ops::Deref;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::exec::ExecutionContext;
use super::intent::CommandIntent;
use super::parse::ParsedInput;
use super::plan::ExecutionPlan;
use super::validate::{default_validate, ValidationResult};
use super::CommandContext;
use crate::core::output::CommandOutput;
use crate::core::value::Value;

/// Future returned by a custom validator.
pub type ValidateFuture<'a> =
    Pin<Box<dyn Future<Output = anyhow::Result<ValidationResult>> + Send + 'a>>;

/// Future returned by a custom executor.
pub type ExecuteFuture<'a> = Pin<Box<dyn Future<Output = anyhow::Result<CommandOutput>> + Send + 'a>>;

/// Custom intent resolver.
pub type IntentFn = dyn Fn(&ParsedInput) -> anyhow::Result<CommandIntent> + Send + Sync;

/// Custom validator.
pub type ValidateFn =
    dyn for<'a> Fn(&'a CommandIntent, &'a CommandContext) -> ValidateFuture<'a> + Send + Sync;

/// Custom planner.
pub type PlanFn =
    dyn Fn(&CommandIntent, &CommandContext) -> anyhow::Result<ExecutionPlan> + Send + Sync;

/// Custom executor.
pub type ExecuteFn = dyn for<'a> Fn(&'a ExecutionPlan, &'a mut ExecutionContext) -> ExecuteFuture<'a>
    + Send
    + Sync;

/// Legacy-style handler: positional args in, side effects out.
pub type HandlerFn = dyn Fn(&[String], &mut ExecutionContext) -> anyhow::Result<()> + Send + Sync;

/// Per-parameter validator.
pub type ParamValidateFn = dyn Fn(&Value) -> ValidationResult + Send + Sync;

/// Per-parameter transform applied after type coercion.
pub type ParamTransformFn = dyn Fn(Value) -> Value + Send + Sync;

/// A shared, opaque callback.
pub struct Callback<F: ?Sized>(Arc<F>);

impl<F: ?Sized> Callback<F> {
    pub fn from_arc(f: Arc<F>) -> Self {
        Callback(f)
    }
}

impl<F: ?Sized> Clone for Callback<F> {
    fn clone(&self) -> Self {
        Callback(Arc::clone(&self.0))
    }
}

impl<F: ?Sized> fmt::Debug for Callback<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<callback>")
    }
}

impl<F: ?Sized> Deref for Callback<F> {
    type Target = F;

    fn deref(&self) -> &F {
        &self.0
    }
}

/// Strategy for one overridable pipeline stage.
pub enum Stage<F: ?Sized> {
    /// Use the engine's default behaviour.
    Default,
    /// Use a command-supplied callback.
    Custom(Callback<F>),
}

impl<F: ?Sized> Stage<F> {
    pub fn is_custom(&self) -> bool {
        matches!(self, Stage::Custom(_))
    }
}

impl<F: ?Sized> Default for Stage<F> {
    fn default() -> Self {
        Stage::Default
    }
}

impl<F: ?Sized> Clone for Stage<F> {
    fn clone(&self) -> Self {
        match self {
            Stage::Default => Stage::Default,
            Stage::Custom(cb) => Stage::Custom(cb.clone()),
        }
    }
}

impl<F: ?Sized> fmt::Debug for Stage<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Default => f.write_str("Default"),
            Stage::Custom(_) => f.write_str("Custom"),
        }
    }
}

impl Stage<IntentFn> {
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&ParsedInput) -> anyhow::Result<CommandIntent> + Send + Sync + 'static,
    {
        Stage::Custom(Callback(Arc::new(f)))
    }
}

impl Stage<ValidateFn> {
    pub fn custom<F>(f: F) -> Self
    where
        F: for<'a> Fn(&'a CommandIntent, &'a CommandContext) -> ValidateFuture<'a>
            + Send
            + Sync
            + 'static,
    {
        Stage::Custom(Callback(Arc::new(f)))
    }
}

impl Stage<PlanFn> {
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&CommandIntent, &CommandContext) -> anyhow::Result<ExecutionPlan>
            + Send
            + Sync
            + 'static,
    {
        Stage::Custom(Callback(Arc::new(f)))
    }
}

/// How the Execute stage runs for a command.
#[derive(Clone, Default)]
pub enum Execution {
    /// Neither an executor nor a handler was supplied.
    #[default]
    NotImplemented,
    /// Legacy handler; produces an empty text output.
    Handler(Callback<HandlerFn>),
    /// Custom executor producing an output.
    Custom(Callback<ExecuteFn>),
}

impl Execution {
    pub fn custom<F>(f: F) -> Self
    where
        F: for<'a> Fn(&'a ExecutionPlan, &'a mut ExecutionContext) -> ExecuteFuture<'a>
            + Send
            + Sync
            + 'static,
    {
        Execution::Custom(Callback(Arc::new(f)))
    }

    pub fn handler<F>(f: F) -> Self
    where
        F: Fn(&[String], &mut ExecutionContext) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Execution::Handler(Callback(Arc::new(f)))
    }
}

impl fmt::Debug for Execution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Execution::NotImplemented => f.write_str("NotImplemented"),
            Execution::Handler(_) => f.write_str("Handler"),
            Execution::Custom(_) => f.write_str("Custom"),
        }
    }
}

/// Semantic type of a positional parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    String,
    Number,
    Boolean,
    Path,
    Choice,
    Array,
}

impl ParameterType {
    pub fn as_str(self) -> &'static str {
        match self {
            ParameterType::String => "string",
            ParameterType::Number => "number",
            ParameterType::Boolean => "boolean",
            ParameterType::Path => "path",
            ParameterType::Choice => "choice",
            ParameterType::Array => "array",
        }
    }
}

/// A declared positional parameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ParameterType,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<String>,
    #[serde(skip)]
    pub validate: Option<Callback<ParamValidateFn>>,
    #[serde(skip)]
    pub transform: Option<Callback<ParamTransformFn>>,
}

impl ParameterDefinition {
    pub fn new(name: impl Into<String>, kind: ParameterType, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            description: description.into(),
            required: false,
            default: None,
            choices: Vec::new(),
            validate: None,
            transform: None,
        }
    }

    pub fn string(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(name, ParameterType::String, description)
    }

    pub fn path(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(name, ParameterType::Path, description)
    }

    pub fn number(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(name, ParameterType::Number, description)
    }

    pub fn boolean(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(name, ParameterType::Boolean, description)
    }

    pub fn array(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(name, ParameterType::Array, description)
    }

    pub fn choice<S: Into<String>>(
        name: impl Into<String>,
        description: impl Into<String>,
        choices: impl IntoIterator<Item = S>,
    ) -> Self {
        let mut param = Self::new(name, ParameterType::Choice, description);
        param.choices = choices.into_iter().map(Into::into).collect();
        param
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn with_validator<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value) -> ValidationResult + Send + Sync + 'static,
    {
        self.validate = Some(Callback(Arc::new(f)));
        self
    }

    pub fn with_transform<F>(mut self, f: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.transform = Some(Callback(Arc::new(f)));
        self
    }
}

/// Value type of a flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlagType {
    Boolean,
    String,
    Number,
}

impl FlagType {
    pub fn as_str(self) -> &'static str {
        match self {
            FlagType::Boolean => "boolean",
            FlagType::String => "string",
            FlagType::Number => "number",
        }
    }
}

/// A declared flag (`--name` or `-x`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlagDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type")]
    pub kind: FlagType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl FlagDefinition {
    pub fn new(
        name: impl Into<String>,
        kind: FlagType,
        short: Option<&str>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            short: short.map(str::to_string),
            description: description.into(),
            kind,
            default: None,
        }
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn is_boolean(&self) -> bool {
        self.kind == FlagType::Boolean
    }
}

/// A usage example shown in help.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandExample {
    pub description: String,
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

/// One sub-command in a statically composed command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComposableStep {
    pub command: String,
    #[serde(default)]
    pub args: BTreeMap<String, Value>,
}

impl ComposableStep {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: BTreeMap::new(),
        }
    }

    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.args.insert(key.into(), value.into());
        self
    }
}

/// Errors from assembling a definition.
#[derive(Debug, Error, PartialEq)]
pub enum DefinitionError {
    #[error("command name is required")]
    EmptyName,

    #[error("duplicate parameter '{0}'")]
    DuplicateParameter(String),

    #[error("duplicate flag '{0}'")]
    DuplicateFlag(String),

    #[error("duplicate short flag '-{0}'")]
    DuplicateShortFlag(String),

    #[error("short flag '{0}' must be a single character")]
    InvalidShortFlag(String),

    #[error("choice parameter '{0}' declares no choices")]
    MissingChoices(String),

    #[error("array parameter '{0}' must be the last parameter")]
    ArrayNotLast(String),
}

/// An immutable command definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub usage: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<ParameterDefinition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flags: Vec<FlagDefinition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub examples: Vec<CommandExample>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip)]
    pub compose: Vec<ComposableStep>,
    #[serde(skip)]
    pub intent: Stage<IntentFn>,
    #[serde(skip)]
    pub validate: Stage<ValidateFn>,
    #[serde(skip)]
    pub plan: Stage<PlanFn>,
    #[serde(skip)]
    pub execution: Execution,
}

impl CommandDefinition {
    /// Start building a definition.
    pub fn builder(name: impl Into<String>) -> CommandBuilder {
        CommandBuilder::new(name)
    }

    /// Category, defaulting to `general`.
    pub fn category_or_default(&self) -> &str {
        self.category.as_deref().unwrap_or("general")
    }

    pub fn find_flag(&self, name: &str) -> Option<&FlagDefinition> {
        self.flags.iter().find(|f| f.name == name)
    }

    pub fn find_short_flag(&self, short: &str) -> Option<&FlagDefinition> {
        self.flags.iter().find(|f| f.short.as_deref() == Some(short))
    }

    pub fn find_parameter(&self, name: &str) -> Option<&ParameterDefinition> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Every string this definition answers to.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.aliases.iter().map(String::as_str))
    }

    /// Check the schema invariants.
    pub fn check(&self) -> Result<(), DefinitionError> {
        if self.name.trim().is_empty() {
            return Err(DefinitionError::EmptyName);
        }

        let mut seen = HashSet::new();
        for (index, param) in self.parameters.iter().enumerate() {
            if !seen.insert(param.name.as_str()) {
                return Err(DefinitionError::DuplicateParameter(param.name.clone()));
            }
            if param.kind == ParameterType::Choice && param.choices.is_empty() {
                return Err(DefinitionError::MissingChoices(param.name.clone()));
            }
            if param.kind == ParameterType::Array && index + 1 != self.parameters.len() {
                return Err(DefinitionError::ArrayNotLast(param.name.clone()));
            }
        }

        let mut names = HashSet::new();
        let mut shorts = HashSet::new();
        for flag in &self.flags {
            if !names.insert(flag.name.as_str()) {
                return Err(DefinitionError::DuplicateFlag(flag.name.clone()));
            }
            if let Some(short) = &flag.short {
                if short.chars().count() != 1 {
                    return Err(DefinitionError::InvalidShortFlag(short.clone()));
                }
                if !shorts.insert(short.as_str()) {
                    return Err(DefinitionError::DuplicateShortFlag(short.clone()));
                }
            }
        }

        Ok(())
    }
}

/// Fluent builder for [`CommandDefinition`].
pub struct CommandBuilder {
    def: CommandDefinition,
    handler: Option<Callback<HandlerFn>>,
    executor: Option<Callback<ExecuteFn>>,
}

impl CommandBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            def: CommandDefinition {
                name: name.into(),
                aliases: Vec::new(),
                description: String::new(),
                usage: String::new(),
                category: None,
                parameters: Vec::new(),
                flags: Vec::new(),
                examples: Vec::new(),
                tags: Vec::new(),
                compose: Vec::new(),
                intent: Stage::Default,
                validate: Stage::Default,
                plan: Stage::Default,
                execution: Execution::NotImplemented,
            },
            handler: None,
            executor: None,
        }
    }

    pub fn aliases<S: Into<String>>(mut self, aliases: impl IntoIterator<Item = S>) -> Self {
        self.def.aliases = aliases.into_iter().map(Into::into).collect();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.def.description = description.into();
        self
    }

    pub fn usage(mut self, usage: impl Into<String>) -> Self {
        self.def.usage = usage.into();
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.def.category = Some(category.into());
        self
    }

    pub fn parameter(mut self, param: ParameterDefinition) -> Self {
        self.def.parameters.push(param);
        self
    }

    pub fn string_param(self, name: &str, description: &str) -> Self {
        self.parameter(ParameterDefinition::string(name, description))
    }

    pub fn path_param(self, name: &str, description: &str) -> Self {
        self.parameter(ParameterDefinition::path(name, description))
    }

    pub fn number_param(self, name: &str, description: &str) -> Self {
        self.parameter(ParameterDefinition::number(name, description))
    }

    pub fn choice_param(self, name: &str, description: &str, choices: &[&str]) -> Self {
        self.parameter(ParameterDefinition::choice(
            name,
            description,
            choices.iter().copied(),
        ))
    }

    pub fn array_param(self, name: &str, description: &str) -> Self {
        self.parameter(ParameterDefinition::array(name, description))
    }

    pub fn flag(mut self, flag: FlagDefinition) -> Self {
        self.def.flags.push(flag);
        self
    }

    /// Boolean flag defaulting to `false`.
    pub fn bool_flag(self, name: &str, description: &str, short: Option<&str>) -> Self {
        self.flag(FlagDefinition::new(name, FlagType::Boolean, short, description).with_default(false))
    }

    pub fn string_flag(
        self,
        name: &str,
        description: &str,
        short: Option<&str>,
        default: Option<&str>,
    ) -> Self {
        let mut flag = FlagDefinition::new(name, FlagType::String, short, description);
        flag.default = default.map(Value::from);
        self.flag(flag)
    }

    pub fn number_flag(
        self,
        name: &str,
        description: &str,
        short: Option<&str>,
        default: Option<f64>,
    ) -> Self {
        let mut flag = FlagDefinition::new(name, FlagType::Number, short, description);
        flag.default = default.map(Value::from);
        self.flag(flag)
    }

    pub fn on_intent<F>(mut self, f: F) -> Self
    where
        F: Fn(&ParsedInput) -> anyhow::Result<CommandIntent> + Send + Sync + 'static,
    {
        self.def.intent = Stage::<IntentFn>::custom(f);
        self
    }

    pub fn on_validate<F>(mut self, f: F) -> Self
    where
        F: for<'a> Fn(&'a CommandIntent, &'a CommandContext) -> ValidateFuture<'a>
            + Send
            + Sync
            + 'static,
    {
        self.def.validate = Stage::<ValidateFn>::custom(f);
        self
    }

    pub fn on_plan<F>(mut self, f: F) -> Self
    where
        F: Fn(&CommandIntent, &CommandContext) -> anyhow::Result<ExecutionPlan>
            + Send
            + Sync
            + 'static,
    {
        self.def.plan = Stage::<PlanFn>::custom(f);
        self
    }

    pub fn on_execute<F>(mut self, f: F) -> Self
    where
        F: for<'a> Fn(&'a ExecutionPlan, &'a mut ExecutionContext) -> ExecuteFuture<'a>
            + Send
            + Sync
            + 'static,
    {
        self.executor = Some(Callback(Arc::new(f)));
        self
    }

    pub fn handler<F>(mut self, f: F) -> Self
    where
        F: Fn(&[String], &mut ExecutionContext) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.handler = Some(Callback(Arc::new(f)));
        self
    }

    pub fn compose(mut self, steps: Vec<ComposableStep>) -> Self {
        self.def.compose = steps;
        self
    }

    pub fn example(mut self, description: &str, command: &str, output: Option<&str>) -> Self {
        self.def.examples.push(CommandExample {
            description: description.to_string(),
            command: command.to_string(),
            output: output.map(str::to_string),
        });
        self
    }

    pub fn tags<S: Into<String>>(mut self, tags: impl IntoIterator<Item = S>) -> Self {
        self.def.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Freeze the definition.
    ///
    /// A custom executor takes precedence over a legacy handler.
    pub fn build(self) -> Result<CommandDefinition, DefinitionError> {
        let mut def = self.def;
        if def.usage.is_empty() {
            def.usage = def.name.clone();
        }
        def.execution = match (self.executor, self.handler) {
            (Some(executor), _) => Execution::Custom(executor),
            (None, Some(handler)) => Execution::Handler(handler),
            (None, None) => Execution::NotImplemented,
        };
        def.check()?;
        Ok(def)
    }
}

/// Require confirmation unless `--force`/`--yes` is given.
///
/// Adds `--force/-f` and `--yes/-y`. The wrapped validator runs the original
/// validation first; when that passes and neither flag is set, validation
/// still passes but carries a confirmation warning.
pub fn with_confirmation<M>(mut def: CommandDefinition, message: M) -> CommandDefinition
where
    M: Fn(&CommandIntent) -> String + Send + Sync + 'static,
{
    def.flags.push(
        FlagDefinition::new("force", FlagType::Boolean, Some("f"), "Skip confirmation")
            .with_default(false),
    );
    def.flags.push(
        FlagDefinition::new("yes", FlagType::Boolean, Some("y"), "Auto-confirm").with_default(false),
    );

    let original = def.validate.clone();
    let parameters = def.parameters.clone();
    let message = Arc::new(message);

    def.validate = Stage::<ValidateFn>::custom(move |intent, ctx| {
        let original = original.clone();
        let parameters = parameters.clone();
        let message = Arc::clone(&message);
        Box::pin(async move {
            let result = match &original {
                Stage::Custom(validate) => validate(intent, ctx).await?,
                Stage::Default => default_validate(intent, &parameters),
            };
            if !result.valid {
                return Ok(result);
            }

            let forced = intent.flag("force") || intent.flag("yes");
            if forced {
                return Ok(result);
            }
            Ok(result.with_warning(format!(
                "This action requires confirmation: {}",
                message(intent)
            )))
        })
    });
    def
}

/// Add a `--dry-run/-n` flag.
pub fn with_dry_run(mut def: CommandDefinition) -> CommandDefinition {
    def.flags.push(
        FlagDefinition::new(
            "dry-run",
            FlagType::Boolean,
            Some("n"),
            "Show what would be done without making changes",
        )
        .with_default(false),
    );
    def
}

/// Build a filesystem command taking one required `path`.
///
/// The executor resolves the path against the current directory before
/// calling `op`.
pub fn file_operation<F>(
    name: &str,
    description: &str,
    op: F,
) -> Result<CommandDefinition, DefinitionError>
where
    F: for<'a> Fn(PathBuf, &'a mut ExecutionContext) -> ExecuteFuture<'a> + Send + Sync + 'static,
{
    let op = Arc::new(op);
    CommandDefinition::builder(name)
        .description(description)
        .usage(format!("{} <path>", name))
        .category("filesystem")
        .parameter(ParameterDefinition::path("path", "Target file or directory path").required())
        .on_validate(|intent, _ctx| {
            Box::pin(async move {
                if intent.targets.first().map_or(true, |t| t.is_empty()) {
                    return Ok(ValidationResult::fail("Path is required"));
                }
                Ok(ValidationResult::ok())
            })
        })
        .on_execute(move |plan, ctx| {
            let op = Arc::clone(&op);
            Box::pin(async move {
                let target = plan
                    .steps
                    .first()
                    .and_then(|step| {
                        step.params
                            .get("path")
                            .map(|v| v.to_string())
                            .or_else(|| {
                                step.params
                                    .get("targets")
                                    .and_then(|t| t.to_string_list().into_iter().next())
                            })
                    })
                    .ok_or_else(|| anyhow::anyhow!("Path is required"))?;
                let full = ctx.resolve_path(&target);
                op(full, ctx).await
            })
        })
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    mod builder {
        use super::*;

        #[test]
        fn usage_defaults_to_name() {
            let def = CommandDefinition::builder("greet").build().unwrap();
            assert_eq!(def.usage, "greet");
            assert_eq!(def.description, "");
            assert_eq!(def.category_or_default(), "general");
        }

        #[test]
        fn bool_flag_defaults_false() {
            let def = CommandDefinition::builder("x")
                .bool_flag("all", "Show all", Some("a"))
                .build()
                .unwrap();
            let flag = def.find_short_flag("a").unwrap();
            assert_eq!(flag.name, "all");
            assert_eq!(flag.default, Some(Value::Bool(false)));
        }

        #[test]
        fn executor_wins_over_handler() {
            let def = CommandDefinition::builder("x")
                .handler(|_, _| Ok(()))
                .on_execute(|_, _| Box::pin(async { Ok(CommandOutput::text("custom")) }))
                .build()
                .unwrap();
            assert!(matches!(def.execution, Execution::Custom(_)));
        }

        #[test]
        fn handler_only() {
            let def = CommandDefinition::builder("x")
                .handler(|_, _| Ok(()))
                .build()
                .unwrap();
            assert!(matches!(def.execution, Execution::Handler(_)));
        }

        #[test]
        fn names_include_aliases() {
            let def = CommandDefinition::builder("lsx")
                .aliases(["dir", "list"])
                .build()
                .unwrap();
            let names: Vec<&str> = def.names().collect();
            assert_eq!(names, vec!["lsx", "dir", "list"]);
        }
    }

    mod invariants {
        use super::*;

        #[test]
        fn empty_name() {
            let err = CommandDefinition::builder(" ").build().unwrap_err();
            assert_eq!(err, DefinitionError::EmptyName);
        }

        #[test]
        fn duplicate_parameter() {
            let err = CommandDefinition::builder("x")
                .string_param("a", "")
                .string_param("a", "")
                .build()
                .unwrap_err();
            assert_eq!(err, DefinitionError::DuplicateParameter("a".into()));
        }

        #[test]
        fn duplicate_short_flag() {
            let err = CommandDefinition::builder("x")
                .bool_flag("all", "", Some("a"))
                .bool_flag("any", "", Some("a"))
                .build()
                .unwrap_err();
            assert_eq!(err, DefinitionError::DuplicateShortFlag("a".into()));
        }

        #[test]
        fn long_short_flag() {
            let err = CommandDefinition::builder("x")
                .bool_flag("all", "", Some("al"))
                .build()
                .unwrap_err();
            assert_eq!(err, DefinitionError::InvalidShortFlag("al".into()));
        }

        #[test]
        fn choice_without_choices() {
            let err = CommandDefinition::builder("x")
                .choice_param("mode", "", &[])
                .build()
                .unwrap_err();
            assert_eq!(err, DefinitionError::MissingChoices("mode".into()));
        }

        #[test]
        fn array_must_be_last() {
            let err = CommandDefinition::builder("x")
                .array_param("files", "")
                .string_param("dest", "")
                .build()
                .unwrap_err();
            assert_eq!(err, DefinitionError::ArrayNotLast("files".into()));
        }
    }

    mod wrappers {
        use super::*;

        #[test]
        fn confirmation_adds_flags() {
            let def = CommandDefinition::builder("rm").build().unwrap();
            let def = with_confirmation(def, |_| "delete".to_string());
            assert!(def.find_flag("force").is_some());
            assert_eq!(def.find_short_flag("y").unwrap().name, "yes");
            assert!(def.validate.is_custom());
            assert!(def.check().is_ok());
        }

        #[test]
        fn dry_run_adds_flag() {
            let def = with_dry_run(CommandDefinition::builder("mv").build().unwrap());
            assert_eq!(def.find_short_flag("n").unwrap().name, "dry-run");
        }

        #[test]
        fn file_operation_shape() {
            let def = file_operation("cat", "Show a file", |path, _ctx| {
                Box::pin(async move { Ok(CommandOutput::text(path.display().to_string())) })
            })
            .unwrap();
            assert_eq!(def.usage, "cat <path>");
            assert_eq!(def.category.as_deref(), Some("filesystem"));
            assert!(def.find_parameter("path").unwrap().required);
            assert!(matches!(def.execution, Execution::Custom(_)));
        }
    }

    mod serde_shape {
        use super::*;

        #[test]
        fn closures_are_not_exported() {
            let def = CommandDefinition::builder("x")
                .parameter(ParameterDefinition::string("name", "Name").required())
                .handler(|_, _| Ok(()))
                .build()
                .unwrap();
            let json = serde_json::to_value(&def).unwrap();
            assert_eq!(json["name"], "x");
            assert_eq!(json["parameters"][0]["type"], "string");
            assert_eq!(json["parameters"][0]["required"], true);
            assert!(json.get("execution").is_none());
            assert!(json.get("compose").is_none());
        }

        #[test]
        fn import_minimal_shape() {
            let def: CommandDefinition =
                serde_json::from_str(r#"{"name":"hello","flags":[{"name":"loud","type":"boolean"}]}"#)
                    .unwrap();
            assert_eq!(def.name, "hello");
            assert!(def.find_flag("loud").unwrap().is_boolean());
            assert!(matches!(def.execution, Execution::NotImplemented));
        }
    }
}
