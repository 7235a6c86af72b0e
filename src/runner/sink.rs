//! Destinations for shell output.

use tracing::info;

/// Receives shell output as it streams, one chunk (usually a line) at a time.
pub trait OutputSink: Send + Sync {
    fn write(&self, action_id: &str, chunk: &str);
}

/// Emits each chunk as a `tracing` event under `workbench::shell`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl OutputSink for TracingSink {
    fn write(&self, action_id: &str, chunk: &str) {
        info!(target: "workbench::shell", action_id, "{}", chunk.trim_end());
    }
}

/// Discards output.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl OutputSink for NullSink {
    fn write(&self, _action_id: &str, _chunk: &str) {}
}
