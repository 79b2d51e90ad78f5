//! host
//!
//! External collaborators: filesystem, process execution and environment.
//!
//! # Architecture
//!
//! The engine never touches the OS directly. Commands reach the outside
//! world through the [`Host`] bundle carried on the command context, so
//! tests and embedders can substitute their own implementations. The
//! [`local`] module provides the tokio-backed defaults.
//!
//! Long-running collaborator calls take a [`CancellationToken`] and must
//! stop promptly once it is cancelled.

pub mod local;

pub use local::{LocalEnvironment, LocalFileSystem, LocalProcessRunner};

use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Errors from collaborator calls.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to run '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("operation cancelled")]
    Cancelled,
}

impl HostError {
    /// Short machine-readable code, as shown in error outputs.
    pub fn code(&self) -> &'static str {
        match self {
            HostError::Io { source, .. } | HostError::Spawn { source, .. } => match source.kind() {
                std::io::ErrorKind::NotFound => "ENOENT",
                std::io::ErrorKind::PermissionDenied => "EACCES",
                std::io::ErrorKind::AlreadyExists => "EEXIST",
                _ => "EIO",
            },
            HostError::Cancelled => "CANCELLED",
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.code() == "ENOENT"
    }
}

/// Kind of a filesystem entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    Symlink,
    Other,
}

impl EntryKind {
    pub fn label(&self) -> &'static str {
        match self {
            EntryKind::File => "File",
            EntryKind::Directory => "Directory",
            EntryKind::Symlink => "Symbolic Link",
            EntryKind::Other => "Other",
        }
    }
}

/// A directory listing entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub kind: EntryKind,
}

impl DirEntry {
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    pub fn is_hidden(&self) -> bool {
        self.name.starts_with('.')
    }
}

/// Metadata for one path.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryMetadata {
    pub kind: EntryKind,
    pub size: u64,
    pub created: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
    pub accessed: Option<DateTime<Utc>>,
    /// Unix permission bits, when the platform has them.
    pub mode: Option<u32>,
    pub is_symlink: bool,
}

/// Output of a finished external process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

/// Filesystem access.
#[async_trait]
pub trait FileSystem: Send + Sync {
    async fn read_dir(&self, path: &Path) -> Result<Vec<DirEntry>, HostError>;

    async fn metadata(&self, path: &Path) -> Result<EntryMetadata, HostError>;

    async fn read_to_string(&self, path: &Path) -> Result<String, HostError>;

    /// Create one directory; the parent must exist.
    async fn create_dir(&self, path: &Path) -> Result<(), HostError>;

    /// Create or truncate a file with `contents`.
    async fn write(&self, path: &Path, contents: &[u8]) -> Result<(), HostError>;

    async fn remove_file(&self, path: &Path) -> Result<(), HostError>;

    /// Remove an empty directory.
    async fn remove_dir(&self, path: &Path) -> Result<(), HostError>;

    async fn remove_dir_all(&self, path: &Path) -> Result<(), HostError>;

    async fn rename(&self, from: &Path, to: &Path) -> Result<(), HostError>;
}

/// External process execution.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(
        &self,
        program: &str,
        args: &[String],
        cwd: &Path,
        cancel: &CancellationToken,
    ) -> Result<ProcessOutput, HostError>;
}

/// Process environment and platform facts.
pub trait Environment: Send + Sync {
    /// All variables, sorted by name.
    fn vars(&self) -> Vec<(String, String)>;

    fn var(&self, name: &str) -> Option<String>;

    fn home_dir(&self) -> Option<PathBuf>;

    fn platform(&self) -> &str;

    fn arch(&self) -> &str;
}

/// The set of collaborators available to commands.
#[derive(Clone)]
pub struct Host {
    pub fs: Arc<dyn FileSystem>,
    pub process: Arc<dyn ProcessRunner>,
    pub env: Arc<dyn Environment>,
}

impl Host {
    /// The real OS.
    pub fn local() -> Self {
        Self {
            fs: Arc::new(LocalFileSystem),
            process: Arc::new(LocalProcessRunner),
            env: Arc::new(LocalEnvironment),
        }
    }
}

impl Default for Host {
    fn default() -> Self {
        Self::local()
    }
}

impl fmt::Debug for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Host").finish_non_exhaustive()
    }
}

/// Resolve `target` against `base`, expanding a leading `~` and folding
/// `.`/`..` lexically.
pub fn resolve_path(base: &Path, home: Option<&Path>, target: &str) -> PathBuf {
    let joined = match (target, home) {
        ("~", Some(home)) => home.to_path_buf(),
        (t, Some(home)) if t.starts_with("~/") => home.join(&t[2..]),
        (t, _) => base.join(t),
    };

    let mut out = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    mod paths {
        use super::*;

        #[test]
        fn relative_joins_base() {
            assert_eq!(
                resolve_path(Path::new("/work"), None, "src"),
                PathBuf::from("/work/src")
            );
        }

        #[test]
        fn absolute_replaces_base() {
            assert_eq!(
                resolve_path(Path::new("/work"), None, "/etc"),
                PathBuf::from("/etc")
            );
        }

        #[test]
        fn parent_folds() {
            assert_eq!(
                resolve_path(Path::new("/work/a"), None, "../b/./c"),
                PathBuf::from("/work/b/c")
            );
        }

        #[test]
        fn root_parent_stays_root() {
            assert_eq!(resolve_path(Path::new("/"), None, ".."), PathBuf::from("/"));
        }

        #[test]
        fn home_expansion() {
            let home = Path::new("/home/me");
            assert_eq!(resolve_path(Path::new("/x"), Some(home), "~"), PathBuf::from("/home/me"));
            assert_eq!(
                resolve_path(Path::new("/x"), Some(home), "~/docs"),
                PathBuf::from("/home/me/docs")
            );
        }
    }

    mod errors {
        use super::*;

        #[test]
        fn codes() {
            let err = HostError::Io {
                path: PathBuf::from("/nope"),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            };
            assert_eq!(err.code(), "ENOENT");
            assert!(err.is_not_found());
            assert!(err.to_string().starts_with("/nope"));
            assert_eq!(HostError::Cancelled.code(), "CANCELLED");
        }
    }
}
