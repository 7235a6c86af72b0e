//! Typed error hierarchy for the workbench pipeline.
//!
//! Four enums cover the four places an action can go wrong:
//! - `QuickEditError`: fuzzy in-place replacement failures
//! - `WorkspaceError`: sandbox filesystem and process host failures
//! - `ActionError`: anything that turns a single action into `error`
//! - `VersionError`: snapshot export and version persistence failures
//!
//! None of these escape the queue. The runner records them as data
//! (action status, failed-action entries) or logs them.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from the quick-edit resolver.
#[derive(Debug, Error)]
pub enum QuickEditError {
    #[error("Quick edit for {file_path} is missing its from/to text")]
    MissingFromTo { file_path: String },

    #[error("Text to replace was not found in {file_path}")]
    TextNotFound { file_path: String },

    #[error("Could not build whitespace-tolerant pattern for {file_path}: {source}")]
    InvalidPattern {
        file_path: String,
        #[source]
        source: regex::Error,
    },
}

/// Errors from the sandbox workspace.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("Path {path} escapes the workspace root")]
    PathEscapesRoot { path: String },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to spawn {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

/// Errors that fail a single action.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error(transparent)]
    Workspace(#[from] WorkspaceError),

    #[error(transparent)]
    QuickEdit(#[from] QuickEditError),

    #[error("Shell action has no command after tokenization")]
    EmptyCommand,

    #[error("Command exited with non-zero code {exit_code}")]
    NonZeroExit { exit_code: i32 },

    #[error("Command timed out after {secs} seconds")]
    Timeout { secs: u64 },

    #[error("Failed to wait for command: {0}")]
    Wait(#[source] std::io::Error),
}

/// Errors from recording a version at artifact close.
#[derive(Debug, Error)]
pub enum VersionError {
    #[error("Workspace export failed: {0}")]
    Export(#[from] WorkspaceError),

    #[error("Workspace export timed out after {secs} seconds")]
    ExportTimeout { secs: u64 },

    #[error("Failed to serialize file tree: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to persist version: {0}")]
    Persist(#[source] anyhow::Error),
}
