use super::{FileTree, ProcessHandle, Workspace};
use crate::errors::WorkspaceError;
use async_trait::async_trait;
use futures::{FutureExt, StreamExt};
use std::path::{Component, Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::debug;
use walkdir::WalkDir;

/// Workspace rooted at a local directory.
#[derive(Debug, Clone)]
pub struct LocalWorkspace {
    root: PathBuf,
}

impl LocalWorkspace {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Map a workspace path onto the local filesystem.
    ///
    /// A leading `/` means the workspace root. `..` is rejected.
    pub fn resolve(&self, path: &str) -> Result<PathBuf, WorkspaceError> {
        let mut resolved = self.root.clone();
        for component in Path::new(path.trim_start_matches('/')).components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(WorkspaceError::PathEscapesRoot {
                        path: path.to_string(),
                    });
                }
            }
        }
        Ok(resolved)
    }

    fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> WorkspaceError + '_ {
        move |source| WorkspaceError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

#[async_trait]
impl Workspace for LocalWorkspace {
    fn root(&self) -> &Path {
        &self.root
    }

    async fn read_file(&self, path: &str) -> Result<String, WorkspaceError> {
        let full = self.resolve(path)?;
        tokio::fs::read_to_string(&full)
            .await
            .map_err(Self::io_error(&full))
    }

    async fn write_file(&self, path: &str, content: &str) -> Result<(), WorkspaceError> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(Self::io_error(parent))?;
        }
        tokio::fs::write(&full, content)
            .await
            .map_err(Self::io_error(&full))
    }

    async fn readdir(&self, path: &str) -> Result<Vec<String>, WorkspaceError> {
        let full = self.resolve(path)?;
        let mut entries = tokio::fs::read_dir(&full)
            .await
            .map_err(Self::io_error(&full))?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(Self::io_error(&full))? {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
        names.sort();
        Ok(names)
    }

    async fn mkdir(&self, path: &str) -> Result<(), WorkspaceError> {
        let full = self.resolve(path)?;
        tokio::fs::create_dir_all(&full)
            .await
            .map_err(Self::io_error(&full))
    }

    async fn spawn(
        &self,
        command: &str,
        args: &[String],
        cwd: &str,
    ) -> Result<ProcessHandle, WorkspaceError> {
        let dir = self.resolve(cwd)?;
        debug!(command, ?args, dir = %dir.display(), "Spawning process");

        let mut child = Command::new(command)
            .args(args)
            .current_dir(&dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| WorkspaceError::Spawn {
                command: command.to_string(),
                source,
            })?;

        let (tx, rx) = mpsc::unbounded_channel::<String>();
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_lines(stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_lines(stderr, tx.clone()));
        }
        drop(tx);

        let output = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|line| (line, rx))
        })
        .boxed();

        let exit = async move {
            let status = child.wait().await?;
            Ok(status.code().unwrap_or(-1))
        }
        .boxed();

        Ok(ProcessHandle { output, exit })
    }

    async fn export(&self, path: &str, excludes: &[String]) -> Result<FileTree, WorkspaceError> {
        let start = self.resolve(path)?;
        let root = self.root.clone();
        let excludes = excludes.to_vec();

        let walk_root = start.clone();
        tokio::task::spawn_blocking(move || collect_tree(&root, &walk_root, &excludes))
            .await
            .map_err(|e| WorkspaceError::Io {
                path: start,
                source: std::io::Error::other(e),
            })?
    }
}

async fn forward_lines<R>(reader: R, tx: mpsc::UnboundedSender<String>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    // Keep reading after the receiver is gone so the child never sees a
    // closed pipe.
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                while matches!(buf.last(), Some(b'\n' | b'\r')) {
                    buf.pop();
                }
                let mut line = String::from_utf8_lossy(&buf).into_owned();
                line.push('\n');
                let _ = tx.send(line);
            }
            Err(e) => {
                debug!(error = %e, "Stopped reading process output");
                break;
            }
        }
    }
}

fn collect_tree(root: &Path, start: &Path, excludes: &[String]) -> Result<FileTree, WorkspaceError> {
    let mut tree = FileTree::new();
    let walker = WalkDir::new(start)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0
                || !excludes
                    .iter()
                    .any(|ex| entry.file_name().to_string_lossy() == ex.as_str())
        });

    for entry in walker {
        let entry = entry.map_err(|e| WorkspaceError::Io {
            path: e.path().map(Path::to_path_buf).unwrap_or_else(|| start.to_path_buf()),
            source: std::io::Error::other(e.to_string()),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }

        let bytes = std::fs::read(entry.path()).map_err(|source| WorkspaceError::Io {
            path: entry.path().to_path_buf(),
            source,
        })?;
        let Ok(text) = String::from_utf8(bytes) else {
            debug!(path = %entry.path().display(), "Skipping non-UTF-8 file in export");
            continue;
        };

        let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
        let key = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        tree.insert(key, text);
    }
    Ok(tree)
}
