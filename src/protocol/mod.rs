//! Tag protocol shared by the parser and the runner.
//!
//! The model streams text containing artifacts and actions:
//!
//! ```text
//! <workbenchArtifact title="Landing page">
//!   <workbenchAction type="file" filePath="src/app.ts">export {}</workbenchAction>
//!   <workbenchAction type="shell">npm install</workbenchAction>
//!   <workbenchAction type="quick-edit" filePath="src/app.ts">
//!     <from>export {}</from><to>export default 1</to>
//!   </workbenchAction>
//! </workbenchArtifact>
//! ```
//!
//! Attribute values are `name="value"` and never contain `"`.

mod grammar;
mod types;

pub use grammar::{
    DEFAULT_ACTION_TAG, DEFAULT_ACTION_TITLE, DEFAULT_ARTIFACT_TAG, DEFAULT_ARTIFACT_TITLE,
    TagEnd, TagGrammar, extract_body_edit, find_tag_end, parse_attributes, partial_prefix_len,
};
pub use types::{ActionData, ActionKind, ActionStatus, ArtifactData, VersionRef};
