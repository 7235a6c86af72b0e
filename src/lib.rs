//! Workbench: turns streamed LLM output into file writes, in-place edits,
//! and shell commands against a sandboxed project, recording a version of
//! the project each time an artifact completes.

pub mod config;
pub mod errors;
pub mod parser;
pub mod protocol;
pub mod queue;
pub mod runner;
pub mod state;
pub mod versions;
pub mod workbench;
pub mod workspace;

pub use workbench::{Workbench, WorkbenchOptions};
