//! builtins::files
//!
//! Filesystem commands: `pwd`, `cd`, `lsx`, `info`, `cat`, `search`, `du`.
//!
//! All filesystem access goes through the context's
//! [`FileSystem`](crate::host::FileSystem) collaborator.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use chrono::{DateTime, Local, Utc};

use crate::core::output::{CommandOutput, ErrorData, KeyValuePair, TreeNode, ValueFormat};
use crate::core::value::Value;
use crate::engine::command::{file_operation, CommandDefinition, DefinitionError, ParameterDefinition};
use crate::engine::exec::ExecutionContext;
use crate::engine::intent::CommandIntent;
use crate::engine::plan::{ExecutionPlan, ExecutionStep};
use crate::engine::validate::ValidationResult;
use crate::host::{DirEntry, EntryKind, FileSystem};
use crate::ui::format::format_bytes;

/// Directory levels expanded below the listed directory in tree mode.
const TREE_DEPTH: usize = 3;

/// Width the plain listing wraps at.
const GRID_WIDTH: usize = 80;

/// Rows shown by `du`.
const DU_ROWS: usize = 20;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// `rwxr-xr-x` rendering of Unix permission bits.
pub fn format_permissions(mode: Option<u32>) -> String {
    const PERMS: [&str; 8] = ["---", "--x", "-w-", "-wx", "r--", "r-x", "rw-", "rwx"];
    match mode {
        Some(mode) => [6, 3, 0]
            .iter()
            .map(|shift| PERMS[((mode >> shift) & 7) as usize])
            .collect(),
        None => "?".to_string(),
    }
}

fn visible(entries: Vec<DirEntry>, all: bool) -> Vec<DirEntry> {
    entries.into_iter().filter(|e| all || !e.is_hidden()).collect()
}

pub(super) fn step_flag(plan: &ExecutionPlan, name: &str) -> bool {
    plan.steps
        .first()
        .and_then(|step| step.param(name))
        .map_or(false, Value::is_truthy)
}

pub fn pwd() -> Result<CommandDefinition, DefinitionError> {
    CommandDefinition::builder("pwd")
        .description("Show current directory")
        .category("filesystem")
        .on_execute(|_, ctx| {
            let dir = ctx.current_dir().display().to_string();
            Box::pin(async move { Ok(CommandOutput::text(dir)) })
        })
        .build()
}

pub fn cd() -> Result<CommandDefinition, DefinitionError> {
    CommandDefinition::builder("cd")
        .description("Change directory")
        .usage("cd [directory]")
        .category("filesystem")
        .path_param("directory", "Directory to change to (default: home)")
        .on_validate(|intent, ctx| {
            Box::pin(async move {
                let target = cd_target(intent, ctx.home_dir.as_deref());
                let path = ctx.resolve_path(&target);
                let shown = intent.targets.first().cloned().unwrap_or(target);
                Ok(match ctx.host.fs.metadata(&path).await {
                    Ok(meta) if meta.kind == EntryKind::Directory => ValidationResult::ok(),
                    Ok(_) => ValidationResult::fail(format!("cd: Not a directory: {}", shown)),
                    Err(err) if err.is_not_found() => {
                        ValidationResult::fail(format!("cd: No such file or directory: {}", shown))
                    }
                    Err(err) => ValidationResult::fail(format!("cd: {}", err)),
                })
            })
        })
        .on_plan(|intent, ctx| {
            let target = cd_target(intent, ctx.home_dir.as_deref());
            let path = ctx.resolve_path(&target);
            Ok(ExecutionPlan::new().with_step(
                ExecutionStep::new("chdir", "chdir", "Change the current directory")
                    .with_param("path", path.display().to_string()),
            ))
        })
        .on_execute(|plan, ctx| {
            let path = plan
                .steps
                .first()
                .and_then(|step| step.param("path"))
                .map(|p| PathBuf::from(p.to_string()));
            if let Some(path) = path {
                ctx.change_dir(path);
            }
            Box::pin(async { Ok(CommandOutput::text("")) })
        })
        .build()
}

fn cd_target(intent: &CommandIntent, home: Option<&Path>) -> String {
    match intent.targets.first().map(String::as_str) {
        None | Some("") | Some("~") => home
            .map(|h| h.display().to_string())
            .unwrap_or_else(|| ".".to_string()),
        Some(target) => target.to_string(),
    }
}

pub fn lsx() -> Result<CommandDefinition, DefinitionError> {
    CommandDefinition::builder("lsx")
        .aliases(["dir", "list"])
        .description("List directory contents with rich output")
        .usage("lsx [path] [--tree] [--long] [--all]")
        .category("filesystem")
        .parameter(ParameterDefinition::path("path", "Directory to list").with_default("."))
        .bool_flag("tree", "Display as tree structure", Some("t"))
        .bool_flag("long", "Show detailed information", Some("l"))
        .bool_flag("all", "Include hidden files", Some("a"))
        .example("List the current directory", "lsx", None)
        .example("Show src as a tree", "lsx src --tree", None)
        .tags(["ls", "files", "directory"])
        .on_intent(|input| {
            let target = input
                .parameters
                .get("path")
                .map(Value::to_string)
                .filter(|p| !p.is_empty())
                .unwrap_or_else(|| ".".to_string());
            let mut intent = CommandIntent::new("list");
            intent.targets = vec![target];
            for flag in ["tree", "long", "all"] {
                let set = input.flags.get(flag).map_or(false, Value::is_truthy);
                intent.options.insert(flag.to_string(), Value::Bool(set));
            }
            Ok(intent)
        })
        .on_validate(|intent, ctx| {
            Box::pin(async move {
                let target = intent.targets.first().cloned().unwrap_or_else(|| ".".to_string());
                let path = ctx.resolve_path(&target);
                Ok(match ctx.host.fs.metadata(&path).await {
                    Ok(meta) if meta.kind == EntryKind::Directory => ValidationResult::ok(),
                    Ok(_) => ValidationResult::fail(format!("'{}' is not a directory", target)),
                    Err(err) if err.is_not_found() => {
                        ValidationResult::fail(format!("Directory not found: {}", target))
                    }
                    Err(err) => ValidationResult::fail(err.to_string()),
                })
            })
        })
        .on_plan(|intent, ctx| {
            let target = intent.targets.first().map(String::as_str).unwrap_or(".");
            let mut params = intent.options.clone();
            params.insert(
                "path".to_string(),
                Value::from(ctx.resolve_path(target).display().to_string()),
            );
            Ok(ExecutionPlan::new().with_step(
                ExecutionStep::new("read-dir", "readdir", "Read directory contents").with_params(params),
            ))
        })
        .on_execute(|plan, ctx| Box::pin(list_directory(plan, ctx)))
        .build()
}

async fn list_directory(plan: &ExecutionPlan, ctx: &mut ExecutionContext) -> anyhow::Result<CommandOutput> {
    let path = plan
        .steps
        .first()
        .and_then(|step| step.param("path"))
        .map(|p| PathBuf::from(p.to_string()))
        .unwrap_or_else(|| ctx.current_dir().to_path_buf());
    let (tree, long, all) = (step_flag(plan, "tree"), step_flag(plan, "long"), step_flag(plan, "all"));

    ctx.info(format!("Reading directory: {}", path.display()));
    let fs = Arc::clone(&ctx.host().fs);
    let entries = visible(fs.read_dir(&path).await?, all);

    if entries.is_empty() {
        return Ok(CommandOutput::text("(empty directory)"));
    }

    if tree {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let children = tree_children(fs.as_ref(), path.clone(), entries, all, 0).await;
        let root = TreeNode::directory(name).with_children(children);
        return Ok(CommandOutput::tree(root).with_title(format!("Directory: {}", path.display())));
    }

    if long {
        let mut rows = Vec::with_capacity(entries.len());
        for entry in &entries {
            let row = match fs.metadata(&path.join(&entry.name)).await {
                Ok(meta) => vec![
                    Value::from(if meta.kind == EntryKind::Directory { "d" } else { "-" }),
                    Value::from(format_permissions(meta.mode)),
                    Value::from(meta.size),
                    Value::from(
                        meta.modified
                            .map(|d| d.with_timezone(&Local).format("%Y-%m-%d").to_string())
                            .unwrap_or_default(),
                    ),
                    Value::from(entry.name.clone()),
                ],
                Err(_) => vec![
                    Value::from("?"),
                    Value::from("?"),
                    Value::from("?"),
                    Value::from("?"),
                    Value::from(entry.name.clone()),
                ],
            };
            rows.push(row);
        }
        let headers = ["Type", "Permissions", "Size", "Modified", "Name"]
            .iter()
            .map(|h| h.to_string())
            .collect();
        return Ok(CommandOutput::table(headers, rows));
    }

    Ok(CommandOutput::text(grid(entries)))
}

/// Directories first, then files, packed into columns.
fn grid(mut entries: Vec<DirEntry>) -> String {
    entries.sort_by(|a, b| b.is_dir().cmp(&a.is_dir()).then_with(|| a.name.cmp(&b.name)));

    let cell = entries.iter().map(|e| e.name.chars().count()).max().unwrap_or(0) + 3;
    let columns = (GRID_WIDTH / cell).max(1);

    entries
        .chunks(columns)
        .map(|row| {
            row.iter()
                .map(|entry| {
                    let name = if entry.is_dir() {
                        format!("{}/", entry.name)
                    } else {
                        entry.name.clone()
                    };
                    format!("{:<width$}", name, width = cell)
                })
                .collect::<String>()
                .trim_end()
                .to_string()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn tree_children<'a>(
    fs: &'a dyn FileSystem,
    dir: PathBuf,
    entries: Vec<DirEntry>,
    all: bool,
    depth: usize,
) -> BoxFuture<'a, Vec<TreeNode>> {
    Box::pin(async move {
        let mut nodes = Vec::with_capacity(entries.len());
        for entry in entries {
            if !entry.is_dir() {
                nodes.push(TreeNode::file(entry.name));
                continue;
            }
            let mut node = TreeNode::directory(entry.name.clone());
            if depth < TREE_DEPTH {
                let sub = dir.join(&entry.name);
                if let Ok(children) = fs.read_dir(&sub).await {
                    node.children = tree_children(fs, sub, visible(children, all), all, depth + 1).await;
                }
            }
            nodes.push(node);
        }
        nodes
    })
}

fn date_value(date: Option<DateTime<Utc>>) -> Value {
    Value::from(date.map(|d| d.to_rfc3339()))
}

pub fn info() -> Result<CommandDefinition, DefinitionError> {
    file_operation("info", "Show detailed file or directory information", |path, ctx| {
        Box::pin(async move {
            let fs = Arc::clone(&ctx.host().fs);
            let meta = match fs.metadata(&path).await {
                Ok(meta) => meta,
                Err(err) => {
                    return Ok(CommandOutput::error_with(
                        ErrorData::new(format!("Cannot access '{}'", path.display())).with_code(err.code()),
                    ))
                }
            };
            let pairs = vec![
                KeyValuePair::new("Path", path.display().to_string()),
                KeyValuePair::new("Type", meta.kind.label()),
                KeyValuePair::formatted("Size", meta.size, ValueFormat::Bytes),
                KeyValuePair::formatted("Created", date_value(meta.created), ValueFormat::Date),
                KeyValuePair::formatted("Modified", date_value(meta.modified), ValueFormat::Date),
                KeyValuePair::formatted("Accessed", date_value(meta.accessed), ValueFormat::Date),
                KeyValuePair::new("Permissions", format_permissions(meta.mode)),
                KeyValuePair::new("Is Symbolic Link", meta.is_symlink),
            ];
            Ok(CommandOutput::key_value(pairs).with_title("File Information"))
        })
    })
}

pub fn cat() -> Result<CommandDefinition, DefinitionError> {
    file_operation("cat", "View file content", |path, ctx| {
        Box::pin(async move {
            let fs = Arc::clone(&ctx.host().fs);
            match fs.read_to_string(&path).await {
                Ok(content) => Ok(CommandOutput::text(content.trim_end_matches('\n').to_string())),
                Err(err) => Ok(CommandOutput::error_with(
                    ErrorData::new(format!("Cannot read '{}'", path.display())).with_code(err.code()),
                )),
            }
        })
    })
}

pub fn search() -> Result<CommandDefinition, DefinitionError> {
    CommandDefinition::builder("search")
        .aliases(["find", "grep"])
        .description("Search for files or content")
        .usage("search <pattern> [file|content] [path] [--recursive]")
        .category("filesystem")
        .parameter(ParameterDefinition::string("pattern", "Search pattern").required())
        .parameter(
            ParameterDefinition::choice("type", "Search type", ["file", "content"]).with_default("file"),
        )
        .parameter(ParameterDefinition::path("path", "Directory to search in").with_default("."))
        .bool_flag("recursive", "Search recursively", Some("r"))
        .example("Find files named like config", "search config -r", None)
        .tags(["find", "grep"])
        .on_execute(|plan, ctx| Box::pin(search_files(plan, ctx)))
        .build()
}

async fn search_files(plan: &ExecutionPlan, ctx: &mut ExecutionContext) -> anyhow::Result<CommandOutput> {
    let step = plan
        .steps
        .first()
        .ok_or_else(|| anyhow::anyhow!("search plan has no steps"))?;
    let pattern = step.param("pattern").map(Value::to_string).unwrap_or_default();
    let by_content = step.param("type").map_or(false, |t| t.to_string() == "content");
    let root = ctx.resolve_path(&step.param("path").map(Value::to_string).unwrap_or_else(|| ".".into()));
    let recursive = step_flag(plan, "recursive");

    ctx.info(format!("Searching {} for '{}'", root.display(), pattern));
    let fs = Arc::clone(&ctx.host().fs);
    let needle = pattern.to_lowercase();
    let mut matches: Vec<(String, &'static str)> = Vec::new();
    let mut pending = vec![root.clone()];

    while let Some(dir) = pending.pop() {
        if ctx.is_cancelled() {
            anyhow::bail!("search cancelled");
        }
        let Ok(entries) = fs.read_dir(&dir).await else {
            continue;
        };
        for entry in visible(entries, false) {
            let full = dir.join(&entry.name);
            let relative = full.strip_prefix(&root).unwrap_or(&full).display().to_string();
            if entry.is_dir() {
                if !by_content && entry.name.to_lowercase().contains(&needle) {
                    matches.push((relative, "directory"));
                }
                if recursive {
                    pending.push(full);
                }
            } else if by_content {
                if let Ok(content) = fs.read_to_string(&full).await {
                    if content.to_lowercase().contains(&needle) {
                        matches.push((relative, "file"));
                    }
                }
            } else if entry.name.to_lowercase().contains(&needle) {
                matches.push((relative, "file"));
            }
        }
    }

    if matches.is_empty() {
        return Ok(CommandOutput::info(format!("No matches found for '{}'", pattern)));
    }
    matches.sort();
    let count = matches.len();
    let rows = matches
        .into_iter()
        .map(|(path, kind)| vec![Value::from(path), Value::from(kind)])
        .collect();
    Ok(
        CommandOutput::table(vec!["Path".to_string(), "Type".to_string()], rows)
            .with_title(format!("Search Results ({} matches)", count)),
    )
}

pub fn du() -> Result<CommandDefinition, DefinitionError> {
    CommandDefinition::builder("du")
        .description("Show disk usage for directory")
        .usage("du [path]")
        .category("filesystem")
        .parameter(ParameterDefinition::path("path", "Directory to analyze").with_default("."))
        .on_execute(|plan, ctx| Box::pin(disk_usage(plan, ctx)))
        .build()
}

async fn disk_usage(plan: &ExecutionPlan, ctx: &mut ExecutionContext) -> anyhow::Result<CommandOutput> {
    let target = plan
        .steps
        .first()
        .and_then(|step| step.param("path"))
        .map(Value::to_string)
        .unwrap_or_else(|| ".".to_string());
    let root = ctx.resolve_path(&target);
    let fs = Arc::clone(&ctx.host().fs);

    let entries = visible(fs.read_dir(&root).await?, false);
    let mut sizes = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        ctx.progress(format!("Measuring {}", entry.name), index as u64 + 1, entries.len() as u64);
        let size = entry_size(fs.as_ref(), root.join(&entry.name), entry.is_dir()).await;
        sizes.push((entry.name.clone(), size));
    }

    if sizes.is_empty() {
        return Ok(CommandOutput::text("(empty directory)"));
    }
    sizes.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    let total: u64 = sizes.iter().map(|(_, size)| size).sum();

    let rows = sizes
        .iter()
        .take(DU_ROWS)
        .map(|(name, size)| vec![Value::from(name.clone()), Value::from(format_bytes(*size as f64))])
        .collect();
    Ok(CommandOutput::composite(vec![
        CommandOutput::table(vec!["Name".to_string(), "Size".to_string()], rows),
        CommandOutput::key_value(vec![
            KeyValuePair::formatted("Total", total, ValueFormat::Bytes),
            KeyValuePair::new("Items", sizes.len()),
        ]),
    ]))
}

/// Size of a file, or the summed size of a directory's visible contents.
fn entry_size<'a>(fs: &'a dyn FileSystem, path: PathBuf, is_dir: bool) -> BoxFuture<'a, u64> {
    Box::pin(async move {
        if !is_dir {
            return fs.metadata(&path).await.map(|m| m.size).unwrap_or(0);
        }
        let Ok(entries) = fs.read_dir(&path).await else {
            return 0;
        };
        let mut total = 0;
        for entry in visible(entries, false) {
            total += entry_size(fs, path.join(&entry.name), entry.is_dir()).await;
        }
        total
    })
}
