//! The streaming message parser.

use super::state::MessageParseState;
use crate::protocol::{
    ActionData, ActionKind, ArtifactData, DEFAULT_ACTION_TITLE, DEFAULT_ARTIFACT_TITLE, TagEnd,
    TagGrammar, VersionRef, extract_body_edit, find_tag_end, parse_attributes,
    partial_prefix_len,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Structural event discovered in the message text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ParserEvent {
    ArtifactOpen { artifact: ArtifactData },
    ArtifactClose { artifact: ArtifactData },
    ActionOpen { action: ActionData },
    ActionClose { action: ActionData },
}

impl ParserEvent {
    pub fn message_id(&self) -> &str {
        match self {
            ParserEvent::ArtifactOpen { artifact } | ParserEvent::ArtifactClose { artifact } => {
                &artifact.message_id
            }
            ParserEvent::ActionOpen { action } | ParserEvent::ActionClose { action } => {
                &action.message_id
            }
        }
    }
}

/// Result of one `parse` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseOutput {
    /// Literal text discovered since the previous call.
    pub literal: String,
    /// Events discovered since the previous call, in document order.
    pub events: Vec<ParserEvent>,
}

/// Builds the inert element that stands in for an artifact in the literal output.
pub type PlaceholderFn = Box<dyn Fn(&ArtifactData) -> String + Send + Sync>;

/// Self-describing marker carrying the artifact id and title.
///
/// Attribute values are HTML-escaped.
pub fn default_placeholder(artifact: &ArtifactData) -> String {
    format!(
        r#"<div class="__workbenchArtifact__" data-artifact-id="{}" data-message-id="{}" data-title="{}"></div>"#,
        escape_attribute(&artifact.id),
        escape_attribute(&artifact.message_id),
        escape_attribute(&artifact.title)
    )
}

fn escape_attribute(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Per-message-part incremental scanner.
///
/// Calling `parse` repeatedly with the same growing string is safe: parsing
/// resumes from the stored cursor, so nothing is emitted twice.
pub struct StreamingMessageParser {
    grammar: TagGrammar,
    placeholder: PlaceholderFn,
    states: HashMap<String, MessageParseState>,
}

impl Default for StreamingMessageParser {
    fn default() -> Self {
        Self::new(TagGrammar::default())
    }
}

impl StreamingMessageParser {
    pub fn new(grammar: TagGrammar) -> Self {
        Self {
            grammar,
            placeholder: Box::new(default_placeholder),
            states: HashMap::new(),
        }
    }

    /// Replace the placeholder factory used for artifact-open tags.
    pub fn with_placeholder(mut self, placeholder: PlaceholderFn) -> Self {
        self.placeholder = placeholder;
        self
    }

    pub fn grammar(&self) -> &TagGrammar {
        &self.grammar
    }

    pub fn state(&self, message_part_id: &str) -> Option<&MessageParseState> {
        self.states.get(message_part_id)
    }

    /// Forget every message part (e.g. when the host navigates away).
    pub fn reset(&mut self) {
        self.states.clear();
    }

    /// Parse the current full text of `message_part_id`.
    ///
    /// `version` is attached to artifacts of replayed messages that already
    /// have a persisted snapshot.
    pub fn parse(
        &mut self,
        message_id: &str,
        message_part_id: &str,
        input: &str,
        is_initial: bool,
        version: Option<VersionRef>,
    ) -> ParseOutput {
        let mut state = self
            .states
            .get(message_part_id)
            .cloned()
            .unwrap_or_default();

        for problem in state.inconsistencies() {
            warn!(message_part_id, "Parser state inconsistency: {}", problem);
        }

        let mut output = ParseOutput::default();

        if state.position > input.len() || !input.is_char_boundary(state.position) {
            warn!(
                message_part_id,
                position = state.position,
                len = input.len(),
                "Input does not extend the previously parsed text; ignoring"
            );
            return output;
        }

        let ctx = ScanContext {
            message_id,
            message_part_id,
            is_initial,
            version,
        };
        let mut i = state.position;

        loop {
            if state.inside_action {
                let Some(rel) = input[i..].find(self.grammar.action_close()) else {
                    break;
                };
                let body = &input[i..i + rel];
                if let Some(action) = self.close_action(&mut state, body) {
                    debug!(action_id = %action.id, kind = action.kind.as_str(), "action close");
                    output.events.push(ParserEvent::ActionClose { action });
                }
                i += rel + self.grammar.action_close().len();
            } else if state.inside_artifact {
                let rest = &input[i..];
                let open_at = rest.find(self.grammar.action_open());
                let close_at = rest.find(self.grammar.artifact_close());

                match (open_at, close_at) {
                    (Some(open), close) if close.is_none_or(|c| open < c) => {
                        let tag_start = i + open;
                        let name_end = tag_start + self.grammar.action_open().len();
                        match find_tag_end(input, name_end) {
                            TagEnd::Complete(end) => {
                                let action = self.open_action(&mut state, &ctx, &input[name_end..end]);
                                debug!(action_id = %action.id, kind = action.kind.as_str(), "action open");
                                output.events.push(ParserEvent::ActionOpen { action });
                                i = end + 1;
                            }
                            TagEnd::Incomplete => {
                                i = tag_start;
                                break;
                            }
                            TagEnd::NotATag => i = tag_start + 1,
                        }
                    }
                    (_, Some(close)) => {
                        state.inside_artifact = false;
                        if let Some(artifact) = state.current_artifact.take() {
                            debug!(artifact_id = %artifact.id, "artifact close");
                            output.events.push(ParserEvent::ArtifactClose { artifact });
                        }
                        i += close + self.grammar.artifact_close().len();
                    }
                    _ => {
                        let hold = partial_prefix_len(
                            rest,
                            &[self.grammar.action_open(), self.grammar.artifact_close()],
                        );
                        i = input.len() - hold;
                        break;
                    }
                }
            } else {
                let rest = &input[i..];
                let Some(open) = rest.find(self.grammar.artifact_open()) else {
                    let hold = partial_prefix_len(rest, &[self.grammar.artifact_open()]);
                    let end = input.len() - hold;
                    output.literal.push_str(&input[i..end]);
                    i = end;
                    break;
                };

                let tag_start = i + open;
                let name_end = tag_start + self.grammar.artifact_open().len();
                match find_tag_end(input, name_end) {
                    TagEnd::Complete(end) => {
                        output.literal.push_str(&input[i..tag_start]);
                        let artifact = self.open_artifact(&mut state, &ctx, &input[name_end..end]);
                        debug!(artifact_id = %artifact.id, title = %artifact.title, "artifact open");
                        output.literal.push_str(&(self.placeholder)(&artifact));
                        output.events.push(ParserEvent::ArtifactOpen { artifact });
                        i = end + 1;
                    }
                    TagEnd::Incomplete => {
                        output.literal.push_str(&input[i..tag_start]);
                        i = tag_start;
                        break;
                    }
                    TagEnd::NotATag => {
                        output.literal.push_str(&input[i..=tag_start]);
                        i = tag_start + 1;
                    }
                }
            }
        }

        state.position = i;
        self.states.insert(message_part_id.to_string(), state);
        output
    }

    fn open_artifact(
        &self,
        state: &mut MessageParseState,
        ctx: &ScanContext<'_>,
        tag_body: &str,
    ) -> ArtifactData {
        let attrs = parse_attributes(tag_body);
        state.artifact_count += 1;

        let artifact = ArtifactData {
            id: format!("{}:artifact-{}", ctx.message_part_id, state.artifact_count),
            message_id: ctx.message_id.to_string(),
            title: attrs
                .get("title")
                .cloned()
                .unwrap_or_else(|| DEFAULT_ARTIFACT_TITLE.to_string()),
            is_initial: ctx.is_initial,
            version: ctx.version.clone(),
        };

        state.inside_artifact = true;
        state.current_artifact = Some(artifact.clone());
        artifact
    }

    fn open_action(
        &self,
        state: &mut MessageParseState,
        ctx: &ScanContext<'_>,
        tag_body: &str,
    ) -> ActionData {
        let mut attrs = parse_attributes(tag_body);
        state.action_count += 1;

        let file_path = attrs.remove("filePath").unwrap_or_default();
        let kind = match attrs.get("type").map(String::as_str) {
            Some("file") => ActionKind::File { file_path },
            Some("quick-edit") => ActionKind::QuickEdit {
                file_path,
                from: attrs.remove("from"),
                to: attrs.remove("to"),
            },
            _ => ActionKind::Shell,
        };

        let artifact_id = state
            .current_artifact
            .as_ref()
            .map(|a| a.id.clone())
            .unwrap_or_default();

        let action = ActionData {
            id: format!("{}:action-{}", ctx.message_part_id, state.action_count),
            message_id: ctx.message_id.to_string(),
            artifact_id,
            title: attrs
                .remove("title")
                .unwrap_or_else(|| DEFAULT_ACTION_TITLE.to_string()),
            content: String::new(),
            kind,
        };

        state.content_attribute = attrs.remove("content").unwrap_or_default();
        state.inside_action = true;
        state.current_action = Some(action.clone());
        action
    }

    fn close_action(&self, state: &mut MessageParseState, body: &str) -> Option<ActionData> {
        state.inside_action = false;
        let content_attribute = std::mem::take(&mut state.content_attribute);
        let mut action = state.current_action.take()?;

        action.content = if body.is_empty() {
            content_attribute
        } else {
            body.to_string()
        };

        if let ActionKind::QuickEdit { from, to, .. } = &mut action.kind
            && (from.is_none() || to.is_none())
        {
            let (body_from, body_to) = extract_body_edit(&action.content);
            if from.is_none() {
                *from = body_from;
            }
            if to.is_none() {
                *to = body_to;
            }
        }

        Some(action)
    }
}

struct ScanContext<'a> {
    message_id: &'a str,
    message_part_id: &'a str,
    is_initial: bool,
    version: Option<VersionRef>,
}
