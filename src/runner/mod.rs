//! Sequential dispatcher that applies queued parser events to the workspace.
//!
//! [`ActionRunner::drain`] is the only consumer of the queue. At most one
//! drain pass runs at a time; within a pass items are handled strictly in
//! order, each awaited to completion before the next is claimed. Failures are
//! recorded in [`WorkbenchState`](crate::state::WorkbenchState) and never escape the pass.

pub mod quick_edit;
pub mod shell;
mod sink;

pub use quick_edit::{QuickEdit, apply_quick_edit};
pub use shell::{strip_ansi, tokenize_command};
pub use sink::{NullSink, OutputSink, TracingSink};

use crate::errors::{ActionError, VersionError};
use crate::parser::ParserEvent;
use crate::protocol::{ActionData, ActionKind, ActionStatus, ArtifactData, VersionRef};
use crate::queue::{QueueItem, SharedQueue};
use crate::state::{FailedAction, SharedState};
use crate::versions::{NewVersion, VersionStore};
use crate::workspace::Workspace;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Runner knobs resolved from configuration.
#[derive(Debug, Clone)]
pub struct RunnerSettings {
    pub project_id: String,
    pub shell_timeout: Duration,
    pub export_timeout: Duration,
    pub export_excludes: Vec<String>,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            project_id: "default".to_string(),
            shell_timeout: Duration::from_secs(120),
            export_timeout: Duration::from_secs(30),
            export_excludes: vec![
                "node_modules".to_string(),
                ".git".to_string(),
                ".workbench".to_string(),
            ],
        }
    }
}

pub struct ActionRunner {
    state: SharedState,
    queue: SharedQueue,
    workspace: Arc<dyn Workspace>,
    versions: Arc<dyn VersionStore>,
    sink: Arc<dyn OutputSink>,
    settings: RunnerSettings,
    is_processing: AtomicBool,
    retries: AtomicU32,
}

impl ActionRunner {
    pub fn new(
        state: SharedState,
        queue: SharedQueue,
        workspace: Arc<dyn Workspace>,
        versions: Arc<dyn VersionStore>,
        settings: RunnerSettings,
    ) -> Self {
        Self {
            state,
            queue,
            workspace,
            versions,
            sink: Arc::new(TracingSink),
            settings,
            is_processing: AtomicBool::new(false),
            retries: AtomicU32::new(0),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn OutputSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn settings(&self) -> &RunnerSettings {
        &self.settings
    }

    pub fn is_processing(&self) -> bool {
        self.is_processing.load(Ordering::Acquire)
    }

    /// Process every unclaimed item in FIFO order.
    ///
    /// Returns immediately with 0 if another pass is already running; that
    /// pass will pick up anything enqueued meanwhile. Returns the number of
    /// items this call handled.
    pub async fn drain(&self) -> usize {
        let mut handled = 0;
        loop {
            if self
                .is_processing
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                return handled;
            }

            loop {
                let next = self.queue.lock().await.claim_next();
                let Some(item) = next else {
                    break;
                };
                self.process(item).await;
                handled += 1;
            }

            self.is_processing.store(false, Ordering::Release);

            // An enqueue racing with the flag reset would otherwise sit until
            // the next push.
            if !self.queue.lock().await.has_pending() {
                return handled;
            }
        }
    }

    /// Process a single queue item by id. Returns false if it was unknown,
    /// already processed, or claimed by a running drain.
    pub async fn process_item(&self, id: Uuid) -> bool {
        let claimed = self.queue.lock().await.claim(id);
        match claimed {
            Some(item) => {
                self.process(item).await;
                true
            }
            None => false,
        }
    }

    /// Re-run a failed action under a fresh id.
    ///
    /// The original action keeps its `error` status. Returns the id of the new
    /// attempt, or `None` if no failure is recorded for `action_id`.
    pub async fn retry(&self, action_id: &str) -> Option<String> {
        let failure = {
            let mut state = self.state.lock().await;
            let message_id = state
                .all_failed_actions()
                .find(|f| f.action.id == action_id)
                .map(|f| f.message_id.clone())?;
            let (mut matching, rest): (Vec<_>, Vec<_>) = state
                .take_failed_actions(&message_id)
                .into_iter()
                .partition(|f| f.action.id == action_id);
            for other in rest {
                state.record_failure(other);
            }
            matching.pop()?
        };

        let attempt = self.retries.fetch_add(1, Ordering::Relaxed) + 1;
        let mut action = failure.action;
        action.id = format!("{}:retry-{}", action_id, attempt);
        let retry_id = action.id.clone();
        info!(action_id, retry_id = %retry_id, "Retrying failed action");

        {
            let mut queue = self.queue.lock().await;
            queue.push(ParserEvent::ActionOpen { action: action.clone() }, false);
            queue.push(ParserEvent::ActionClose { action }, false);
        }
        self.drain().await;
        Some(retry_id)
    }

    /// Retry every recorded failure of one message, in the order they failed.
    pub async fn retry_failed(&self, message_id: &str) -> Vec<String> {
        let ids: Vec<String> = self
            .state
            .lock()
            .await
            .failed_actions(message_id)
            .iter()
            .map(|f| f.action.id.clone())
            .collect();

        let mut retried = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(retry_id) = self.retry(&id).await {
                retried.push(retry_id);
            }
        }
        retried
    }

    async fn process(&self, item: QueueItem) {
        let id = item.id;
        let kind = (item.item_type(), item.callback_type());
        let closing = match &item.event {
            ParserEvent::ArtifactClose { artifact } => Some(artifact.id.clone()),
            _ => None,
        };
        if AssertUnwindSafe(self.handle(item))
            .catch_unwind()
            .await
            .is_err()
        {
            error!(item_id = %id, ?kind, "Queue item handler panicked");
            if let Some(artifact_id) = closing {
                self.state.lock().await.set_saving(&artifact_id, false);
            }
        }
        self.queue.lock().await.mark_processed(id);
    }

    async fn handle(&self, item: QueueItem) {
        let is_initial = item.is_initial;
        match item.event {
            ParserEvent::ArtifactOpen { artifact } => {
                debug!(artifact_id = %artifact.id, title = %artifact.title, "Artifact opened");
                self.state.lock().await.add_artifact(artifact);
            }
            ParserEvent::ArtifactClose { artifact } => {
                self.on_artifact_close(artifact, is_initial).await;
            }
            ParserEvent::ActionOpen { action } => {
                let status = if is_initial {
                    ActionStatus::Success
                } else {
                    ActionStatus::Pending
                };
                debug!(action_id = %action.id, kind = action.kind.as_str(), %status, "Action opened");
                self.state.lock().await.add_action(action, status, is_initial);
            }
            ParserEvent::ActionClose { action } => {
                if !is_initial {
                    self.on_action_close(action).await;
                }
            }
        }
    }

    async fn on_artifact_close(&self, artifact: ArtifactData, is_initial: bool) {
        {
            let mut state = self.state.lock().await;
            if !state.close_artifact(&artifact.id) {
                state.add_artifact(artifact.clone());
                state.close_artifact(&artifact.id);
            }
            if is_initial {
                return;
            }
            state.set_saving(&artifact.id, true);
        }

        let result = self.record_version(&artifact.message_id).await;

        let mut state = self.state.lock().await;
        state.set_saving(&artifact.id, false);
        match result {
            Ok(version) => {
                info!(
                    artifact_id = %artifact.id,
                    version = version.version_number,
                    "Recorded workspace version"
                );
                state.attach_version(&artifact.id, version);
            }
            Err(e) => {
                error!(artifact_id = %artifact.id, error = %e, "Failed to record workspace version");
            }
        }
    }

    async fn record_version(&self, message_id: &str) -> Result<VersionRef, VersionError> {
        let limit = self.settings.export_timeout;
        let tree = tokio::time::timeout(
            limit,
            self.workspace.export("", &self.settings.export_excludes),
        )
        .await
        .map_err(|_| VersionError::ExportTimeout {
            secs: limit.as_secs(),
        })??;

        let files_string = serde_json::to_string(&tree)?;
        self.versions
            .create_version(NewVersion {
                project_id: self.settings.project_id.clone(),
                message_key: message_id.to_string(),
                files_string,
            })
            .await
            .map_err(VersionError::Persist)
    }

    async fn on_action_close(&self, action: ActionData) {
        {
            let mut state = self.state.lock().await;
            match state.action(&action.id).map(|a| a.status) {
                Some(ActionStatus::Pending) => state.update_action_data(action.clone()),
                Some(status) => {
                    debug!(action_id = %action.id, %status, "Action already settled, skipping");
                    return;
                }
                None => state.add_action(action.clone(), ActionStatus::Pending, false),
            }
        }

        let mut captured = String::new();
        let result = self.execute(&action, &mut captured).await;

        let mut state = self.state.lock().await;
        if !captured.is_empty() {
            state.append_output(&action.id, &captured);
        }
        match result {
            Ok(()) => {
                info!(action_id = %action.id, kind = action.kind.as_str(), "Action succeeded");
                state.complete_action(&action.id, ActionStatus::Success, None);
            }
            Err(e) => {
                warn!(action_id = %action.id, kind = action.kind.as_str(), error = %e, "Action failed");
                state.complete_action(&action.id, ActionStatus::Error, Some(e.to_string()));
                state.record_failure(FailedAction::new(&action, &e));
            }
        }
    }

    async fn execute(&self, action: &ActionData, captured: &mut String) -> Result<(), ActionError> {
        match &action.kind {
            ActionKind::File { file_path } => {
                self.workspace.write_file(file_path, &action.content).await?;
                self.index_file(file_path, &action.content).await;
            }
            ActionKind::QuickEdit {
                file_path,
                from,
                to,
            } => {
                let edit = QuickEdit::new(file_path, from.as_deref(), to.as_deref())?;
                let current = self.workspace.read_file(file_path).await?;
                let updated = edit.apply(&current)?;
                self.workspace.write_file(file_path, &updated).await?;
                self.index_file(file_path, &updated).await;
            }
            ActionKind::Shell => {
                let exit_code = shell::run_shell(
                    self.workspace.as_ref(),
                    self.sink.as_ref(),
                    &action.id,
                    &action.content,
                    self.settings.shell_timeout,
                    captured,
                )
                .await?;
                if exit_code != 0 {
                    return Err(ActionError::NonZeroExit { exit_code });
                }
            }
        }
        Ok(())
    }

    async fn index_file(&self, path: &str, content: &str) {
        self.state.lock().await.update_parsed_file(path, content);
    }
}
