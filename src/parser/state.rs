use crate::protocol::{ActionData, ArtifactData};

/// Cursor and nesting state for one in-flight message part.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageParseState {
    /// Byte offset into the message text already consumed. Never decreases.
    pub position: usize,
    pub inside_artifact: bool,
    pub inside_action: bool,
    pub current_artifact: Option<ArtifactData>,
    /// The open action, content still empty until its closing tag is seen.
    pub current_action: Option<ActionData>,
    /// Raw `content="..."` attribute of the open action.
    pub(crate) content_attribute: String,
    pub(crate) artifact_count: usize,
    pub(crate) action_count: usize,
}

impl MessageParseState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Describe every broken nesting invariant. Empty when consistent.
    pub fn inconsistencies(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.inside_artifact != self.current_artifact.is_some() {
            problems.push(format!(
                "inside_artifact={} but current_artifact is {}",
                self.inside_artifact,
                if self.current_artifact.is_some() { "set" } else { "unset" }
            ));
        }
        if self.inside_action != self.current_action.is_some() {
            problems.push(format!(
                "inside_action={} but current_action is {}",
                self.inside_action,
                if self.current_action.is_some() { "set" } else { "unset" }
            ));
        }
        if self.inside_action && !self.inside_artifact {
            problems.push("inside_action without inside_artifact".to_string());
        }
        problems
    }
}
