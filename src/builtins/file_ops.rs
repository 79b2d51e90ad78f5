//! builtins::file_ops
//!
//! Commands that change the filesystem: `mkdir`, `touch`, `rm`, `rmdir`, `mv`.
//!
//! `rm` and `mv` accept `--dry-run/-n`; `rm` also asks for confirmation
//! through a validation warning unless `--force` or `--yes` is given. `mv`
//! plans a reversible move whose rollback renames the entry back.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::core::output::{CommandOutput, ErrorData};
use crate::core::value::Value;
use crate::engine::command::{
    file_operation, with_confirmation, with_dry_run, CommandDefinition, DefinitionError,
    ParameterDefinition,
};
use crate::engine::exec::ExecutionContext;
use crate::engine::plan::{ExecutionPlan, ExecutionStep, ImpactAssessment};
use crate::engine::validate::ValidationResult;
use crate::host::EntryKind;

use super::files::step_flag;

fn step_path(plan: &ExecutionPlan, step: &str, key: &str) -> anyhow::Result<PathBuf> {
    plan.step(step)
        .and_then(|s| s.param(key))
        .map(|v| PathBuf::from(v.to_string()))
        .ok_or_else(|| anyhow::anyhow!("{} step has no '{}'", step, key))
}

pub fn mkdir() -> Result<CommandDefinition, DefinitionError> {
    file_operation("mkdir", "Create a directory", |path, ctx| {
        Box::pin(async move {
            let fs = Arc::clone(&ctx.host().fs);
            Ok(match fs.create_dir(&path).await {
                Ok(()) => CommandOutput::success(format!("Created directory: {}", path.display())),
                Err(err) => CommandOutput::error_with(
                    ErrorData::new(format!("Cannot create directory '{}'", path.display()))
                        .with_code(err.code())
                        .with_details(err.to_string()),
                ),
            })
        })
    })
}

/// Creates missing files; existing files keep their contents.
pub fn touch() -> Result<CommandDefinition, DefinitionError> {
    file_operation("touch", "Create an empty file", |path, ctx| {
        Box::pin(async move {
            let fs = Arc::clone(&ctx.host().fs);
            if fs.metadata(&path).await.is_ok() {
                return Ok(CommandOutput::info(format!("File already exists: {}", path.display())));
            }
            Ok(match fs.write(&path, b"").await {
                Ok(()) => CommandOutput::success(format!("Created file: {}", path.display())),
                Err(err) => CommandOutput::error_with(
                    ErrorData::new(format!("Cannot create file '{}'", path.display()))
                        .with_code(err.code())
                        .with_details(err.to_string()),
                ),
            })
        })
    })
}

pub fn rmdir() -> Result<CommandDefinition, DefinitionError> {
    file_operation("rmdir", "Remove an empty directory", |path, ctx| {
        Box::pin(async move {
            let fs = Arc::clone(&ctx.host().fs);
            Ok(match fs.remove_dir(&path).await {
                Ok(()) => CommandOutput::success(format!("Removed directory: {}", path.display())),
                Err(err) => CommandOutput::error_with(
                    ErrorData::new(format!("Cannot remove directory '{}'", path.display()))
                        .with_code(err.code())
                        .with_details(err.to_string()),
                ),
            })
        })
    })
}

pub fn rm() -> Result<CommandDefinition, DefinitionError> {
    let def = CommandDefinition::builder("rm")
        .description("Remove a file, or a directory with --recursive")
        .usage("rm <path> [--recursive] [--force]")
        .category("filesystem")
        .parameter(ParameterDefinition::path("path", "File or directory to remove").required())
        .bool_flag("recursive", "Remove directories and their contents", Some("r"))
        .example("Delete a file", "rm notes.txt", None)
        .example("Delete a directory tree without confirmation", "rm -rf build", None)
        .tags(["delete", "remove"])
        .on_validate(|intent, ctx| {
            Box::pin(async move {
                let Some(target) = intent.string("path").filter(|t| !t.is_empty()) else {
                    return Ok(ValidationResult::fail("Required parameter 'path' is missing"));
                };
                let path = ctx.resolve_path(&target);
                Ok(match ctx.host.fs.metadata(&path).await {
                    Ok(meta) if meta.kind == EntryKind::Directory && !intent.flag("recursive") => {
                        ValidationResult::fail(format!(
                            "'{}' is a directory. Use 'rm -r' or 'rmdir'.",
                            target
                        ))
                    }
                    Ok(_) => ValidationResult::ok(),
                    Err(err) if err.is_not_found() => {
                        ValidationResult::fail(format!("rm: No such file or directory: {}", target))
                    }
                    Err(err) => ValidationResult::fail(format!("rm: {}", err)),
                })
            })
        })
        .on_plan(|intent, ctx| {
            let target = intent.string("path").unwrap_or_default();
            let mut params = intent.options.clone();
            params.insert(
                "path".to_string(),
                Value::from(ctx.resolve_path(&target).display().to_string()),
            );
            let action = if intent.flag("recursive") { "remove-all" } else { "remove" };
            Ok(ExecutionPlan::new()
                .with_step(ExecutionStep::new("remove", action, format!("Remove {}", target)).with_params(params))
                .with_impact(ImpactAssessment {
                    files_affected: Some(1),
                    destructive: true,
                    ..ImpactAssessment::default()
                }))
        })
        .on_execute(|plan, ctx| Box::pin(remove(plan, ctx)))
        .build()?;

    Ok(with_dry_run(with_confirmation(def, |intent| {
        format!("permanently delete '{}'", intent.string("path").unwrap_or_default())
    })))
}

async fn remove(plan: &ExecutionPlan, ctx: &mut ExecutionContext) -> anyhow::Result<CommandOutput> {
    let path = step_path(plan, "remove", "path")?;
    let recursive = step_flag(plan, "recursive");

    if step_flag(plan, "dry-run") {
        return Ok(CommandOutput::info(format!("Would remove: {}", path.display())));
    }

    let fs = Arc::clone(&ctx.host().fs);
    let recursive = recursive
        && fs
            .metadata(&path)
            .await
            .is_ok_and(|meta| meta.kind == EntryKind::Directory);
    ctx.step_started("remove");
    let result = if recursive {
        fs.remove_dir_all(&path).await
    } else {
        fs.remove_file(&path).await
    };
    if let Err(err) = result {
        ctx.step_failed("remove", err.to_string());
        return Err(err.into());
    }
    ctx.step_completed("remove");

    Ok(CommandOutput::success(if recursive {
        format!("Recursively removed: {}", path.display())
    } else {
        format!("Removed: {}", path.display())
    }))
}

pub fn mv() -> Result<CommandDefinition, DefinitionError> {
    let def = CommandDefinition::builder("mv")
        .aliases(["rename"])
        .description("Move or rename a file or directory")
        .usage("mv <source> <destination>")
        .category("filesystem")
        .parameter(ParameterDefinition::path("source", "Entry to move").required())
        .parameter(ParameterDefinition::path("destination", "New path").required())
        .example("Rename a file", "mv draft.md post.md", None)
        .tags(["move", "rename"])
        .on_validate(|intent, ctx| {
            Box::pin(async move {
                let source = intent.string("source").unwrap_or_default();
                let destination = intent.string("destination").unwrap_or_default();
                let fs = &ctx.host.fs;
                if let Err(err) = fs.metadata(&ctx.resolve_path(&source)).await {
                    return Ok(if err.is_not_found() {
                        ValidationResult::fail(format!("mv: No such file or directory: {}", source))
                    } else {
                        ValidationResult::fail(format!("mv: {}", err))
                    });
                }
                Ok(match fs.metadata(&ctx.resolve_path(&destination)).await {
                    Ok(_) => ValidationResult::fail(format!("mv: Destination already exists: {}", destination)),
                    Err(err) if err.is_not_found() => ValidationResult::ok(),
                    Err(err) => ValidationResult::fail(format!("mv: {}", err)),
                })
            })
        })
        .on_plan(|intent, ctx| {
            let from = ctx.resolve_path(&intent.string("source").unwrap_or_default());
            let to = ctx.resolve_path(&intent.string("destination").unwrap_or_default());
            let fs = Arc::clone(&ctx.host.fs);
            let (undo_from, undo_to) = (to.clone(), from.clone());

            let mut params = intent.options.clone();
            params.insert("from".to_string(), Value::from(from.display().to_string()));
            params.insert("to".to_string(), Value::from(to.display().to_string()));

            Ok(ExecutionPlan::new()
                .with_step(
                    ExecutionStep::new("move", "rename", format!("Move {} to {}", from.display(), to.display()))
                        .with_params(params)
                        .with_rollback(move || {
                            let fs = Arc::clone(&fs);
                            let (from, to) = (undo_from.clone(), undo_to.clone());
                            Box::pin(async move { fs.rename(&from, &to).await.map_err(anyhow::Error::from) })
                        }),
                )
                .with_step(
                    ExecutionStep::new("verify", "stat", "Check the moved entry")
                        .with_param("path", to.display().to_string())
                        .depends_on("move"),
                )
                .reversible(true)
                .with_impact(ImpactAssessment {
                    files_affected: Some(1),
                    ..ImpactAssessment::default()
                }))
        })
        .on_execute(|plan, ctx| Box::pin(move_entry(plan, ctx)))
        .build()?;

    Ok(with_dry_run(def))
}

async fn move_entry(plan: &ExecutionPlan, ctx: &mut ExecutionContext) -> anyhow::Result<CommandOutput> {
    let from = step_path(plan, "move", "from")?;
    let to = step_path(plan, "move", "to")?;

    if step_flag(plan, "dry-run") {
        return Ok(CommandOutput::info(format!(
            "Would move: {} -> {}",
            from.display(),
            to.display()
        )));
    }

    let fs = Arc::clone(&ctx.host().fs);
    ctx.step_started("move");
    if let Err(err) = fs.rename(&from, &to).await {
        ctx.step_failed("move", err.to_string());
        return Err(err.into());
    }
    ctx.step_completed("move");

    ctx.step_started("verify");
    if let Err(err) = fs.metadata(&to).await {
        ctx.step_failed("verify", err.to_string());
        anyhow::bail!("'{}' is missing after the move", display_name(&to));
    }
    ctx.step_completed("verify");

    Ok(CommandOutput::success(format!(
        "Moved: {} -> {}",
        from.display(),
        to.display()
    )))
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::runner::Pipeline;
    use crate::engine::CommandContext;
    use crate::host::{DirEntry, EntryMetadata, FileSystem, Host, HostError, LocalFileSystem};
    use crate::ui::present::{PresentationConfig, Presenter};
    use async_trait::async_trait;
    use tempfile::TempDir;

    async fn run_in(dir: &Path, host: Option<Host>, def: &CommandDefinition, line: &str) -> String {
        let mut ctx = CommandContext::new(dir);
        if let Some(host) = host {
            ctx = ctx.with_host(host);
        }
        let mut out = Vec::new();
        Pipeline::new()
            .run(line, def, &ctx, &Presenter::new(PresentationConfig::plain()), &mut out)
            .await
            .unwrap();
        String::from_utf8(out).unwrap()
    }

    mod create {
        use super::*;

        #[tokio::test]
        async fn mkdir_then_touch() {
            let temp = TempDir::new().unwrap();
            let dir = temp.path().join("notes");

            let text = run_in(temp.path(), None, &mkdir().unwrap(), "mkdir notes").await;
            assert_eq!(text, format!("[OK] Created directory: {}\n", dir.display()));
            assert!(dir.is_dir());

            let text = run_in(temp.path(), None, &touch().unwrap(), "touch notes/a.txt").await;
            assert_eq!(text, format!("[OK] Created file: {}\n", dir.join("a.txt").display()));
            assert!(dir.join("a.txt").is_file());
        }

        #[tokio::test]
        async fn mkdir_existing_reports_code() {
            let temp = TempDir::new().unwrap();
            std::fs::create_dir(temp.path().join("d")).unwrap();
            let text = run_in(temp.path(), None, &mkdir().unwrap(), "mkdir d").await;
            assert!(text.starts_with("[ERROR] [EEXIST]: Cannot create directory"));
        }

        #[tokio::test]
        async fn touch_keeps_contents() {
            let temp = TempDir::new().unwrap();
            std::fs::write(temp.path().join("f"), "keep").unwrap();
            let text = run_in(temp.path(), None, &touch().unwrap(), "touch f").await;
            assert!(text.starts_with("[INFO] File already exists"));
            assert_eq!(std::fs::read_to_string(temp.path().join("f")).unwrap(), "keep");
        }
    }

    mod removal {
        use super::*;

        #[tokio::test]
        async fn rm_warns_without_force() {
            let temp = TempDir::new().unwrap();
            let file = temp.path().join("f.txt");
            std::fs::write(&file, "x").unwrap();

            let text = run_in(temp.path(), None, &rm().unwrap(), "rm f.txt").await;
            assert_eq!(
                text,
                format!(
                    "[WARN] This action requires confirmation: permanently delete 'f.txt'\n[OK] Removed: {}\n",
                    file.display()
                )
            );
            assert!(!file.exists());
        }

        #[tokio::test]
        async fn rm_directory_needs_recursive() {
            let temp = TempDir::new().unwrap();
            std::fs::create_dir_all(temp.path().join("build/out")).unwrap();

            let text = run_in(temp.path(), None, &rm().unwrap(), "rm build").await;
            assert_eq!(text, "[ERROR]: 'build' is a directory. Use 'rm -r' or 'rmdir'.\n");
            assert!(temp.path().join("build").exists());

            let text = run_in(temp.path(), None, &rm().unwrap(), "rm -rf build").await;
            assert!(text.starts_with("[OK] Recursively removed"));
            assert!(!temp.path().join("build").exists());
        }

        #[tokio::test]
        async fn rm_dry_run_keeps_file() {
            let temp = TempDir::new().unwrap();
            let file = temp.path().join("f.txt");
            std::fs::write(&file, "x").unwrap();

            let text = run_in(temp.path(), None, &rm().unwrap(), "rm f.txt -n -y").await;
            assert_eq!(text, format!("[INFO] Would remove: {}\n", file.display()));
            assert!(file.exists());
        }

        #[tokio::test]
        async fn rm_missing() {
            let temp = TempDir::new().unwrap();
            let text = run_in(temp.path(), None, &rm().unwrap(), "rm ghost -f").await;
            assert_eq!(text, "[ERROR]: rm: No such file or directory: ghost\n");
        }

        #[tokio::test]
        async fn rmdir_refuses_non_empty() {
            let temp = TempDir::new().unwrap();
            std::fs::create_dir_all(temp.path().join("d/e")).unwrap();
            let text = run_in(temp.path(), None, &rmdir().unwrap(), "rmdir d").await;
            assert!(text.starts_with("[ERROR]"));
            assert!(temp.path().join("d").exists());

            let text = run_in(temp.path(), None, &rmdir().unwrap(), "rmdir d/e").await;
            assert!(text.starts_with("[OK] Removed directory"));
        }

        #[test]
        fn rm_flags() {
            let def = rm().unwrap();
            for short in ["r", "f", "y", "n"] {
                assert!(def.find_short_flag(short).is_some(), "missing -{}", short);
            }
        }
    }

    mod moving {
        use super::*;

        /// Local filesystem that never reports `lost` as present.
        struct LosesPath {
            lost: PathBuf,
        }

        #[async_trait]
        impl FileSystem for LosesPath {
            async fn read_dir(&self, path: &Path) -> Result<Vec<DirEntry>, HostError> {
                LocalFileSystem.read_dir(path).await
            }

            async fn metadata(&self, path: &Path) -> Result<EntryMetadata, HostError> {
                if path == self.lost {
                    return Err(HostError::Io {
                        path: path.to_path_buf(),
                        source: std::io::Error::from(std::io::ErrorKind::NotFound),
                    });
                }
                LocalFileSystem.metadata(path).await
            }

            async fn read_to_string(&self, path: &Path) -> Result<String, HostError> {
                LocalFileSystem.read_to_string(path).await
            }

            async fn create_dir(&self, path: &Path) -> Result<(), HostError> {
                LocalFileSystem.create_dir(path).await
            }

            async fn write(&self, path: &Path, contents: &[u8]) -> Result<(), HostError> {
                LocalFileSystem.write(path, contents).await
            }

            async fn remove_file(&self, path: &Path) -> Result<(), HostError> {
                LocalFileSystem.remove_file(path).await
            }

            async fn remove_dir(&self, path: &Path) -> Result<(), HostError> {
                LocalFileSystem.remove_dir(path).await
            }

            async fn remove_dir_all(&self, path: &Path) -> Result<(), HostError> {
                LocalFileSystem.remove_dir_all(path).await
            }

            async fn rename(&self, from: &Path, to: &Path) -> Result<(), HostError> {
                LocalFileSystem.rename(from, to).await
            }
        }

        #[tokio::test]
        async fn mv_renames() {
            let temp = TempDir::new().unwrap();
            std::fs::write(temp.path().join("draft.md"), "x").unwrap();

            let text = run_in(temp.path(), None, &mv().unwrap(), "mv draft.md post.md").await;
            assert_eq!(
                text,
                format!(
                    "[OK] Moved: {} -> {}\n",
                    temp.path().join("draft.md").display(),
                    temp.path().join("post.md").display()
                )
            );
            assert!(temp.path().join("post.md").is_file());
        }

        #[tokio::test]
        async fn mv_refuses_existing_destination() {
            let temp = TempDir::new().unwrap();
            std::fs::write(temp.path().join("a"), "a").unwrap();
            std::fs::write(temp.path().join("b"), "b").unwrap();

            let text = run_in(temp.path(), None, &mv().unwrap(), "mv a b").await;
            assert_eq!(text, "[ERROR]: mv: Destination already exists: b\n");
            assert_eq!(std::fs::read_to_string(temp.path().join("b")).unwrap(), "b");
        }

        #[tokio::test]
        async fn failed_verify_moves_back() {
            let temp = TempDir::new().unwrap();
            std::fs::write(temp.path().join("a"), "a").unwrap();
            let host = Host {
                fs: Arc::new(LosesPath {
                    lost: temp.path().join("b"),
                }),
                ..Host::local()
            };

            let text = run_in(temp.path(), Some(host), &mv().unwrap(), "mv a b").await;
            assert_eq!(
                text,
                "[ERROR]: 'b' is missing after the move\nRolled back 1 steps successfully\n"
            );
            assert!(temp.path().join("a").is_file());
            assert!(!temp.path().join("b").exists());
        }

        #[tokio::test]
        async fn mv_plan_is_reversible() {
            let temp = TempDir::new().unwrap();
            std::fs::write(temp.path().join("a"), "a").unwrap();
            let ctx = CommandContext::new(temp.path());

            let plan = Pipeline::new().dry_run("mv a b", &mv().unwrap(), &ctx).await.unwrap();
            assert!(plan.reversible);
            assert_eq!(plan.steps[0].id, "move");
            assert!(plan.steps[0].rollback.is_some());
            assert_eq!(plan.steps[1].dependencies, vec!["move".to_string()]);
            assert!(temp.path().join("a").exists());
        }
    }
}
