//! host::local
//!
//! Collaborators backed by the real OS (tokio fs and process).

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::SystemTime;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{
    DirEntry, EntryKind, EntryMetadata, Environment, FileSystem, HostError, ProcessOutput,
    ProcessRunner,
};

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> HostError + '_ {
    move |source| HostError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn kind_of(file_type: std::fs::FileType) -> EntryKind {
    if file_type.is_dir() {
        EntryKind::Directory
    } else if file_type.is_file() {
        EntryKind::File
    } else if file_type.is_symlink() {
        EntryKind::Symlink
    } else {
        EntryKind::Other
    }
}

fn timestamp(time: std::io::Result<SystemTime>) -> Option<DateTime<Utc>> {
    time.ok().map(DateTime::<Utc>::from)
}

#[cfg(unix)]
fn mode_of(meta: &std::fs::Metadata) -> Option<u32> {
    use std::os::unix::fs::PermissionsExt;
    Some(meta.permissions().mode())
}

#[cfg(not(unix))]
fn mode_of(_meta: &std::fs::Metadata) -> Option<u32> {
    None
}

/// Filesystem via `tokio::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileSystem;

#[async_trait]
impl FileSystem for LocalFileSystem {
    async fn read_dir(&self, path: &Path) -> Result<Vec<DirEntry>, HostError> {
        let mut reader = tokio::fs::read_dir(path).await.map_err(io_error(path))?;
        let mut entries = Vec::new();
        while let Some(entry) = reader.next_entry().await.map_err(io_error(path))? {
            let kind = match entry.file_type().await {
                Ok(ft) => kind_of(ft),
                Err(_) => EntryKind::Other,
            };
            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                kind,
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn metadata(&self, path: &Path) -> Result<EntryMetadata, HostError> {
        let meta = tokio::fs::metadata(path).await.map_err(io_error(path))?;
        let is_symlink = tokio::fs::symlink_metadata(path)
            .await
            .map(|m| m.file_type().is_symlink())
            .unwrap_or(false);

        Ok(EntryMetadata {
            kind: kind_of(meta.file_type()),
            size: meta.len(),
            created: timestamp(meta.created()),
            modified: timestamp(meta.modified()),
            accessed: timestamp(meta.accessed()),
            mode: mode_of(&meta),
            is_symlink,
        })
    }

    async fn read_to_string(&self, path: &Path) -> Result<String, HostError> {
        tokio::fs::read_to_string(path).await.map_err(io_error(path))
    }

    async fn create_dir(&self, path: &Path) -> Result<(), HostError> {
        debug!(path = %path.display(), "creating directory");
        tokio::fs::create_dir(path).await.map_err(io_error(path))
    }

    async fn write(&self, path: &Path, contents: &[u8]) -> Result<(), HostError> {
        debug!(path = %path.display(), bytes = contents.len(), "writing file");
        tokio::fs::write(path, contents).await.map_err(io_error(path))
    }

    async fn remove_file(&self, path: &Path) -> Result<(), HostError> {
        debug!(path = %path.display(), "removing file");
        tokio::fs::remove_file(path).await.map_err(io_error(path))
    }

    async fn remove_dir(&self, path: &Path) -> Result<(), HostError> {
        debug!(path = %path.display(), "removing directory");
        tokio::fs::remove_dir(path).await.map_err(io_error(path))
    }

    async fn remove_dir_all(&self, path: &Path) -> Result<(), HostError> {
        debug!(path = %path.display(), "removing directory tree");
        tokio::fs::remove_dir_all(path).await.map_err(io_error(path))
    }

    async fn rename(&self, from: &Path, to: &Path) -> Result<(), HostError> {
        debug!(from = %from.display(), to = %to.display(), "renaming");
        tokio::fs::rename(from, to).await.map_err(io_error(from))
    }
}

/// Process runner via `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalProcessRunner;

#[async_trait]
impl ProcessRunner for LocalProcessRunner {
    async fn run(
        &self,
        program: &str,
        args: &[String],
        cwd: &Path,
        cancel: &CancellationToken,
    ) -> Result<ProcessOutput, HostError> {
        debug!(program, ?args, cwd = %cwd.display(), "spawning process");

        let child = Command::new(program)
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| HostError::Spawn {
                program: program.to_string(),
                source,
            })?;

        let output = tokio::select! {
            output = child.wait_with_output() => output.map_err(|source| HostError::Spawn {
                program: program.to_string(),
                source,
            })?,
            _ = cancel.cancelled() => return Err(HostError::Cancelled),
        };

        Ok(ProcessOutput {
            status: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Environment of the current process.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalEnvironment;

impl Environment for LocalEnvironment {
    fn vars(&self) -> Vec<(String, String)> {
        let mut vars: Vec<(String, String)> = std::env::vars_os()
            .map(|(k, v)| (k.to_string_lossy().into_owned(), v.to_string_lossy().into_owned()))
            .collect();
        vars.sort();
        vars
    }

    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }

    fn home_dir(&self) -> Option<PathBuf> {
        dirs::home_dir()
    }

    fn platform(&self) -> &str {
        std::env::consts::OS
    }

    fn arch(&self) -> &str {
        std::env::consts::ARCH
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    mod filesystem {
        use super::*;

        #[tokio::test]
        async fn read_dir_sorted_with_kinds() {
            let temp = TempDir::new().unwrap();
            std::fs::write(temp.path().join("b.txt"), "b").unwrap();
            std::fs::create_dir(temp.path().join("a")).unwrap();

            let entries = LocalFileSystem.read_dir(temp.path()).await.unwrap();
            assert_eq!(entries.len(), 2);
            assert_eq!(entries[0].name, "a");
            assert!(entries[0].is_dir());
            assert_eq!(entries[1].kind, EntryKind::File);
        }

        #[tokio::test]
        async fn metadata_size() {
            let temp = TempDir::new().unwrap();
            let file = temp.path().join("f");
            std::fs::write(&file, "12345").unwrap();

            let meta = LocalFileSystem.metadata(&file).await.unwrap();
            assert_eq!(meta.kind, EntryKind::File);
            assert_eq!(meta.size, 5);
            assert!(meta.modified.is_some());
            assert!(!meta.is_symlink);
        }

        #[tokio::test]
        async fn missing_path_is_enoent() {
            let temp = TempDir::new().unwrap();
            let err = LocalFileSystem
                .metadata(&temp.path().join("missing"))
                .await
                .unwrap_err();
            assert!(err.is_not_found());
        }

        #[tokio::test]
        async fn read_to_string_roundtrip() {
            let temp = TempDir::new().unwrap();
            let file = temp.path().join("f");
            std::fs::write(&file, "hello").unwrap();
            assert_eq!(LocalFileSystem.read_to_string(&file).await.unwrap(), "hello");
        }

        #[tokio::test]
        async fn create_rename_remove() {
            let temp = TempDir::new().unwrap();
            let dir = temp.path().join("d");
            let file = dir.join("f");
            let moved = temp.path().join("g");

            LocalFileSystem.create_dir(&dir).await.unwrap();
            LocalFileSystem.write(&file, b"").await.unwrap();
            assert!(file.is_file());

            LocalFileSystem.rename(&file, &moved).await.unwrap();
            assert!(!file.exists());
            assert!(moved.is_file());

            LocalFileSystem.remove_file(&moved).await.unwrap();
            LocalFileSystem.remove_dir(&dir).await.unwrap();
            assert!(!dir.exists());
        }

        #[tokio::test]
        async fn create_existing_dir_is_eexist() {
            let temp = TempDir::new().unwrap();
            let err = LocalFileSystem.create_dir(temp.path()).await.unwrap_err();
            assert_eq!(err.code(), "EEXIST");
        }

        #[tokio::test]
        async fn remove_dir_all_removes_tree() {
            let temp = TempDir::new().unwrap();
            let dir = temp.path().join("a");
            std::fs::create_dir_all(dir.join("b")).unwrap();
            std::fs::write(dir.join("b/c"), "c").unwrap();

            LocalFileSystem.remove_dir_all(&dir).await.unwrap();
            assert!(!dir.exists());
        }
    }

    mod process {
        use super::*;

        #[cfg(unix)]
        #[tokio::test]
        async fn captures_stdout_and_status() {
            let temp = TempDir::new().unwrap();
            let out = LocalProcessRunner
                .run(
                    "sh",
                    &["-c".to_string(), "echo hi; exit 3".to_string()],
                    temp.path(),
                    &CancellationToken::new(),
                )
                .await
                .unwrap();
            assert_eq!(out.stdout.trim(), "hi");
            assert_eq!(out.status, 3);
            assert!(!out.success());
        }

        #[cfg(unix)]
        #[tokio::test]
        async fn cancelled_token_stops_process() {
            let temp = TempDir::new().unwrap();
            let token = CancellationToken::new();
            token.cancel();
            let err = LocalProcessRunner
                .run("sleep", &["5".to_string()], temp.path(), &token)
                .await
                .unwrap_err();
            assert!(matches!(err, HostError::Cancelled));
        }

        #[tokio::test]
        async fn missing_program_is_spawn_error() {
            let temp = TempDir::new().unwrap();
            let err = LocalProcessRunner
                .run(
                    "definitely-not-a-real-program-xyz",
                    &[],
                    temp.path(),
                    &CancellationToken::new(),
                )
                .await
                .unwrap_err();
            assert!(matches!(err, HostError::Spawn { .. }));
        }
    }

    mod environment {
        use super::*;

        #[test]
        fn vars_are_sorted() {
            let vars = LocalEnvironment.vars();
            let mut sorted = vars.clone();
            sorted.sort();
            assert_eq!(vars, sorted);
            assert!(!LocalEnvironment.platform().is_empty());
        }
    }
}
