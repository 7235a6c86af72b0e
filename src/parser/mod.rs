//! Incremental parser for the artifact/action tag protocol.
//!
//! The parser is fed the *growing* text of one message part, call after call,
//! and returns only what is new since the previous call:
//!
//! - literal text, with each artifact-open tag replaced by a placeholder element
//! - structural events (`ArtifactOpen`, `ActionOpen`, `ActionClose`, `ArtifactClose`)
//!   in document order
//!
//! It performs no I/O. Callers enqueue the returned events for the runner.

mod state;
mod stream;

pub use state::MessageParseState;
pub use stream::{
    ParseOutput, ParserEvent, PlaceholderFn, StreamingMessageParser, default_placeholder,
};
