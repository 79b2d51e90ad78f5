//! builtins::system
//!
//! Environment inspection, `git` passthrough and session exit.

use std::sync::Arc;

use crate::core::output::{CommandOutput, ErrorData, KeyValuePair};
use crate::core::value::Value;
use crate::engine::command::{CommandDefinition, DefinitionError};
use crate::engine::exec::ExecutionContext;
use crate::engine::intent::CommandIntent;
use crate::engine::parse::tokenize;
use crate::engine::plan::ExecutionPlan;

pub fn env() -> Result<CommandDefinition, DefinitionError> {
    CommandDefinition::builder("env")
        .description("Show environment information")
        .usage("env [--all]")
        .category("system")
        .bool_flag("all", "Show all environment variables", Some("a"))
        .on_execute(|plan, ctx| {
            let all = plan
                .steps
                .first()
                .and_then(|step| step.param("all"))
                .map_or(false, Value::is_truthy);
            let output = if all { all_variables(ctx) } else { summary(ctx) };
            Box::pin(async move { Ok(output) })
        })
        .build()
}

fn all_variables(ctx: &ExecutionContext) -> CommandOutput {
    let vars = ctx.host().env.vars();
    let count = vars.len();
    let pairs = vars
        .into_iter()
        .map(|(key, value)| KeyValuePair::new(key, value))
        .collect();
    CommandOutput::key_value(pairs).with_title(format!("Environment Variables ({})", count))
}

fn summary(ctx: &ExecutionContext) -> CommandOutput {
    let env = Arc::clone(&ctx.host().env);
    let var = |name: &str| env.var(name).unwrap_or_else(|| "unknown".to_string());
    let home = env
        .home_dir()
        .or_else(|| ctx.home_dir().map(|h| h.to_path_buf()))
        .map(|h| h.display().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    CommandOutput::key_value(vec![
        KeyValuePair::new("Platform", env.platform()),
        KeyValuePair::new("Architecture", env.arch()),
        KeyValuePair::new("Working Directory", ctx.current_dir().display().to_string()),
        KeyValuePair::new("Home Directory", home),
        KeyValuePair::new("Shell", var("SHELL")),
        KeyValuePair::new("User", env.var("USER").or_else(|| env.var("USERNAME")).unwrap_or_else(|| "unknown".into())),
        KeyValuePair::new("Terminal", var("TERM")),
    ])
    .with_title("Environment")
}

pub fn git() -> Result<CommandDefinition, DefinitionError> {
    CommandDefinition::builder("git")
        .description("Run git in the current directory")
        .usage("git <command> [options]")
        .category("system")
        .example("Show working tree status", "git status --short", None)
        // Every token after the command word goes to git unchanged, flags included.
        .on_intent(|input| {
            let mut intent = CommandIntent::new("git");
            intent.targets = tokenize(&input.raw).into_iter().skip(1).collect();
            Ok(intent)
        })
        .on_execute(|plan, ctx| Box::pin(run_git(plan, ctx)))
        .build()
}

async fn run_git(plan: &ExecutionPlan, ctx: &mut ExecutionContext) -> anyhow::Result<CommandOutput> {
    let args = plan
        .steps
        .first()
        .and_then(|step| step.param("targets"))
        .map(Value::to_string_list)
        .unwrap_or_default();
    if args.is_empty() {
        return Ok(CommandOutput::text("Usage: git <command> [options]"));
    }

    let runner = Arc::clone(&ctx.host().process);
    let cwd = ctx.current_dir().to_path_buf();
    let cancel = ctx.cancellation().clone();
    ctx.debug(format!("git {}", args.join(" ")));

    let output = match runner.run("git", &args, &cwd, &cancel).await {
        Ok(output) => output,
        Err(err) => {
            return Ok(CommandOutput::error_with(
                ErrorData::new(format!("git: {}", err)).with_code(err.code()),
            ))
        }
    };

    let stderr = output.stderr.trim_end();
    if !output.success() {
        let mut error = ErrorData::new(format!("git exited with status {}", output.status));
        if !stderr.is_empty() {
            error = error.with_details(stderr);
        }
        return Ok(CommandOutput::error_with(error));
    }
    if !stderr.is_empty() {
        ctx.info(stderr);
    }
    Ok(CommandOutput::text(output.stdout.trim_end()))
}

pub fn exit() -> Result<CommandDefinition, DefinitionError> {
    CommandDefinition::builder("exit")
        .aliases(["bye"])
        .description("Exit the shell")
        .category("system")
        .on_execute(|_, ctx| {
            ctx.request_exit();
            Box::pin(async { Ok(CommandOutput::text("Goodbye!")) })
        })
        .build()
}
