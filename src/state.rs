//! Session state for artifacts, actions, and failures.
//!
//! `WorkbenchState` is owned by the host and shared with the runner. All
//! mutation goes through its methods. Action status only ever moves out of
//! `Pending`, never back.

use crate::protocol::{ActionData, ActionStatus, ArtifactData, VersionRef};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::Mutex;

pub type SharedState = Arc<Mutex<WorkbenchState>>;

#[derive(Debug, Clone, Serialize)]
pub struct ArtifactState {
    pub data: ArtifactData,
    pub closed: bool,
    /// True while the workspace is being exported for a new version.
    pub is_saving: bool,
    pub version: Option<VersionRef>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActionState {
    pub data: ActionData,
    pub status: ActionStatus,
    pub is_initial: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Captured shell output, ANSI codes stripped.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub output: String,
}

/// A failed action kept for inspection or manual retry.
#[derive(Debug, Clone, Serialize)]
pub struct FailedAction {
    pub message_id: String,
    pub action: ActionData,
    pub error: String,
    pub failed_at: DateTime<Utc>,
}

impl FailedAction {
    pub fn new(action: &ActionData, error: impl std::fmt::Display) -> Self {
        Self {
            message_id: action.message_id.clone(),
            action: action.clone(),
            error: error.to_string(),
            failed_at: Utc::now(),
        }
    }
}

#[derive(Debug, Default)]
pub struct WorkbenchState {
    artifacts: HashMap<String, ArtifactState>,
    artifact_order: Vec<String>,
    actions: HashMap<String, ActionState>,
    action_order: Vec<String>,
    failed_actions: HashMap<String, Vec<FailedAction>>,
    parsed_files: BTreeMap<String, String>,
}

impl WorkbenchState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedState {
        Arc::new(Mutex::new(Self::new()))
    }

    /// Register an artifact. Re-registering an existing id is a no-op.
    pub fn add_artifact(&mut self, data: ArtifactData) {
        if self.artifacts.contains_key(&data.id) {
            return;
        }
        self.artifact_order.push(data.id.clone());
        self.artifacts.insert(
            data.id.clone(),
            ArtifactState {
                version: data.version.clone(),
                data,
                closed: false,
                is_saving: false,
            },
        );
    }

    pub fn close_artifact(&mut self, id: &str) -> bool {
        match self.artifacts.get_mut(id) {
            Some(artifact) => {
                artifact.closed = true;
                true
            }
            None => false,
        }
    }

    pub fn set_saving(&mut self, id: &str, saving: bool) {
        if let Some(artifact) = self.artifacts.get_mut(id) {
            artifact.is_saving = saving;
        }
    }

    pub fn attach_version(&mut self, id: &str, version: VersionRef) {
        if let Some(artifact) = self.artifacts.get_mut(id) {
            artifact.version = Some(version);
        }
    }

    pub fn artifact(&self, id: &str) -> Option<&ArtifactState> {
        self.artifacts.get(id)
    }

    /// Artifacts in the order they were opened.
    pub fn artifacts(&self) -> impl Iterator<Item = &ArtifactState> {
        self.artifact_order
            .iter()
            .filter_map(|id| self.artifacts.get(id))
    }

    /// Register an action. Re-registering an existing id is a no-op.
    pub fn add_action(&mut self, data: ActionData, status: ActionStatus, is_initial: bool) {
        if self.actions.contains_key(&data.id) {
            return;
        }
        self.action_order.push(data.id.clone());
        self.actions.insert(
            data.id.clone(),
            ActionState {
                data,
                status,
                is_initial,
                error: None,
                output: String::new(),
            },
        );
    }

    /// Replace the data of a still-pending action with its closed form.
    pub fn update_action_data(&mut self, data: ActionData) {
        if let Some(action) = self.actions.get_mut(&data.id)
            && action.status == ActionStatus::Pending
        {
            action.data = data;
        }
    }

    /// Settle a pending action. Returns false if it was unknown or already settled.
    pub fn complete_action(&mut self, id: &str, status: ActionStatus, error: Option<String>) -> bool {
        match self.actions.get_mut(id) {
            Some(action) if action.status == ActionStatus::Pending && status.is_terminal() => {
                action.status = status;
                action.error = error;
                true
            }
            _ => false,
        }
    }

    pub fn append_output(&mut self, id: &str, chunk: &str) {
        if let Some(action) = self.actions.get_mut(id) {
            action.output.push_str(chunk);
        }
    }

    pub fn action(&self, id: &str) -> Option<&ActionState> {
        self.actions.get(id)
    }

    /// Actions in the order they were opened.
    pub fn actions(&self) -> impl Iterator<Item = &ActionState> {
        self.action_order.iter().filter_map(|id| self.actions.get(id))
    }

    pub fn record_failure(&mut self, failure: FailedAction) {
        self.failed_actions
            .entry(failure.message_id.clone())
            .or_default()
            .push(failure);
    }

    pub fn failed_actions(&self, message_id: &str) -> &[FailedAction] {
        self.failed_actions
            .get(message_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn all_failed_actions(&self) -> impl Iterator<Item = &FailedAction> {
        self.failed_actions.values().flatten()
    }

    /// Remove and return the failures of one message, e.g. to retry them.
    pub fn take_failed_actions(&mut self, message_id: &str) -> Vec<FailedAction> {
        self.failed_actions.remove(message_id).unwrap_or_default()
    }

    pub fn update_parsed_file(&mut self, path: &str, content: &str) {
        self.parsed_files
            .insert(path.to_string(), content.to_string());
    }

    pub fn parsed_file(&self, path: &str) -> Option<&str> {
        self.parsed_files.get(path).map(String::as_str)
    }

    pub fn parsed_files(&self) -> &BTreeMap<String, String> {
        &self.parsed_files
    }
}
