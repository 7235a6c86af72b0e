//! Host-facing facade wiring parser → queue → runner.
//!
//! The host feeds the full text of a message part each time it grows and
//! renders the returned literal text; effects are applied before
//! `push_chunk` returns.

use crate::config::WorkbenchConfig;
use crate::parser::{ParseOutput, PlaceholderFn, StreamingMessageParser, default_placeholder};
use crate::protocol::{TagGrammar, VersionRef};
use crate::queue::{ActionQueue, SharedQueue, spawn_sweeper};
use crate::runner::{ActionRunner, OutputSink, RunnerSettings, TracingSink};
use crate::state::{SharedState, WorkbenchState};
use crate::versions::VersionStore;
use crate::workspace::Workspace;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;
use uuid::Uuid;

pub struct WorkbenchOptions {
    pub grammar: TagGrammar,
    pub runner: RunnerSettings,
    pub purge_threshold: usize,
    pub purge_interval: Duration,
    pub sink: Arc<dyn OutputSink>,
    pub placeholder: PlaceholderFn,
}

impl Default for WorkbenchOptions {
    fn default() -> Self {
        Self {
            grammar: TagGrammar::default(),
            runner: RunnerSettings::default(),
            purge_threshold: 50,
            purge_interval: Duration::from_millis(5000),
            sink: Arc::new(TracingSink),
            placeholder: Box::new(default_placeholder),
        }
    }
}

impl WorkbenchOptions {
    pub fn from_config(config: &WorkbenchConfig) -> Self {
        Self {
            grammar: config.grammar(),
            runner: config.runner_settings(),
            purge_threshold: config.purge_threshold(),
            purge_interval: config.purge_interval(),
            ..Self::default()
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn OutputSink>) -> Self {
        self.sink = sink;
        self
    }
}

/// One session's pipeline. Must be created inside a tokio runtime.
pub struct Workbench {
    parser: StreamingMessageParser,
    queue: SharedQueue,
    state: SharedState,
    runner: Arc<ActionRunner>,
    sweeper: JoinHandle<()>,
}

impl Workbench {
    pub fn new(
        options: WorkbenchOptions,
        workspace: Arc<dyn Workspace>,
        versions: Arc<dyn VersionStore>,
    ) -> Self {
        let state = WorkbenchState::shared();
        let queue = ActionQueue::shared();
        let sweeper = spawn_sweeper(&queue, options.purge_threshold, options.purge_interval);
        let runner = ActionRunner::new(
            state.clone(),
            queue.clone(),
            workspace,
            versions,
            options.runner,
        )
        .with_sink(options.sink);

        Self {
            parser: StreamingMessageParser::new(options.grammar)
                .with_placeholder(options.placeholder),
            queue,
            state,
            runner: Arc::new(runner),
            sweeper,
        }
    }

    /// Parse the current text of a message part, apply any completed
    /// events, and return the literal text to render for this call.
    pub async fn push_chunk(
        &mut self,
        message_id: &str,
        message_part_id: &str,
        text: &str,
        is_initial: bool,
        version: Option<VersionRef>,
    ) -> String {
        let ParseOutput { literal, events } =
            self.parser
                .parse(message_id, message_part_id, text, is_initial, version);
        if !events.is_empty() {
            debug!(message_id, count = events.len(), "Enqueuing parser events");
            self.queue.lock().await.extend(events, is_initial);
            self.runner.drain().await;
        }
        literal
    }

    /// Parse without applying anything; events are queued for a later `drain`.
    pub async fn enqueue(
        &mut self,
        message_id: &str,
        message_part_id: &str,
        text: &str,
        is_initial: bool,
    ) -> (String, Vec<Uuid>) {
        let ParseOutput { literal, events } =
            self.parser
                .parse(message_id, message_part_id, text, is_initial, None);
        let ids = self.queue.lock().await.extend(events, is_initial);
        (literal, ids)
    }

    pub async fn drain(&self) -> usize {
        self.runner.drain().await
    }

    /// Forget all parser progress and drop processed queue items.
    ///
    /// Artifact and action state is kept for the host to inspect.
    pub async fn reset(&mut self) {
        self.parser.reset();
        let removed = self.queue.lock().await.purge_processed();
        debug!(removed, "Workbench reset");
    }

    pub fn parser(&self) -> &StreamingMessageParser {
        &self.parser
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    pub fn queue(&self) -> &SharedQueue {
        &self.queue
    }

    pub fn runner(&self) -> &Arc<ActionRunner> {
        &self.runner
    }
}

impl Drop for Workbench {
    fn drop(&mut self) {
        self.sweeper.abort();
    }
}
