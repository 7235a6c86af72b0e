//! Sandbox workspace: the mutable filesystem and process host the runner acts on.
//!
//! [`Workspace`] is the seam. [`LocalWorkspace`] roots everything in a
//! directory on the local machine.

mod local;

pub use local::LocalWorkspace;

use crate::errors::WorkspaceError;
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::stream::BoxStream;
use std::collections::BTreeMap;
use std::path::Path;

/// Exported files, keyed by root-relative path with `/` separators.
pub type FileTree = BTreeMap<String, String>;

/// A spawned process: its merged stdout/stderr and its eventual exit code.
pub struct ProcessHandle {
    pub output: BoxStream<'static, String>,
    /// Dropping this before it resolves kills the process.
    pub exit: BoxFuture<'static, std::io::Result<i32>>,
}

#[async_trait]
pub trait Workspace: Send + Sync {
    /// Directory all relative paths resolve against.
    fn root(&self) -> &Path;

    async fn read_file(&self, path: &str) -> Result<String, WorkspaceError>;

    /// Replace `path` with `content`, creating parent directories as needed.
    async fn write_file(&self, path: &str, content: &str) -> Result<(), WorkspaceError>;

    async fn readdir(&self, path: &str) -> Result<Vec<String>, WorkspaceError>;

    async fn mkdir(&self, path: &str) -> Result<(), WorkspaceError>;

    async fn spawn(
        &self,
        command: &str,
        args: &[String],
        cwd: &str,
    ) -> Result<ProcessHandle, WorkspaceError>;

    /// Collect every text file under `path`, skipping entries named in `excludes`.
    async fn export(&self, path: &str, excludes: &[String]) -> Result<FileTree, WorkspaceError>;
}
