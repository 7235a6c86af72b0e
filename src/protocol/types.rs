//! Artifact and action data as materialized by the parser.

use serde::{Deserialize, Serialize};

/// Reference to a persisted workspace snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRef {
    pub version_id: String,
    pub version_number: u32,
}

/// One logical unit of change inside an assistant message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactData {
    pub id: String,
    pub message_id: String,
    pub title: String,
    /// True when the artifact comes from a replayed message rather than a live stream.
    pub is_initial: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<VersionRef>,
}

/// Per-variant payload of an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ActionKind {
    /// Full replacement of `file_path` with the action content.
    File { file_path: String },
    /// The action content is a command line.
    Shell,
    /// Partial in-place edit of `file_path`.
    QuickEdit {
        file_path: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        to: Option<String>,
    },
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::File { .. } => "file",
            ActionKind::Shell => "shell",
            ActionKind::QuickEdit { .. } => "quick-edit",
        }
    }

    pub fn file_path(&self) -> Option<&str> {
        match self {
            ActionKind::File { file_path } | ActionKind::QuickEdit { file_path, .. } => {
                Some(file_path)
            }
            ActionKind::Shell => None,
        }
    }
}

/// One discrete operation inside an artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionData {
    pub id: String,
    pub message_id: String,
    pub artifact_id: String,
    pub title: String,
    /// Raw literal payload between the opening and closing action tags.
    pub content: String,
    #[serde(flatten)]
    pub kind: ActionKind,
}

/// Execution status of an action. Moves from `Pending` exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    #[default]
    Pending,
    Success,
    Error,
}

impl ActionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Error)
    }
}

impl std::fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionStatus::Pending => write!(f, "pending"),
            ActionStatus::Success => write!(f, "success"),
            ActionStatus::Error => write!(f, "error"),
        }
    }
}
