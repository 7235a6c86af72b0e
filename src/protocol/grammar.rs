//! Tag names, attribute parsing, and tag-boundary helpers.

use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

pub const DEFAULT_ARTIFACT_TAG: &str = "workbenchArtifact";
pub const DEFAULT_ACTION_TAG: &str = "workbenchAction";

pub const DEFAULT_ARTIFACT_TITLE: &str = "Untitled artifact";
pub const DEFAULT_ACTION_TITLE: &str = "Untitled action";

static ATTRIBUTE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"([A-Za-z_][\w-]*)\s*=\s*"([^"]*)""#).unwrap());

static FROM_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<from>(.*?)</from>").unwrap());

static TO_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<to>(.*?)</to>").unwrap());

/// Opening and closing sequences for artifact and action tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagGrammar {
    artifact_tag: String,
    action_tag: String,
    artifact_open: String,
    artifact_close: String,
    action_open: String,
    action_close: String,
}

impl TagGrammar {
    pub fn new(artifact_tag: impl Into<String>, action_tag: impl Into<String>) -> Self {
        let artifact_tag = artifact_tag.into();
        let action_tag = action_tag.into();
        Self {
            artifact_open: format!("<{}", artifact_tag),
            artifact_close: format!("</{}>", artifact_tag),
            action_open: format!("<{}", action_tag),
            action_close: format!("</{}>", action_tag),
            artifact_tag,
            action_tag,
        }
    }

    pub fn artifact_tag(&self) -> &str {
        &self.artifact_tag
    }

    pub fn action_tag(&self) -> &str {
        &self.action_tag
    }

    /// Opening sequence without the terminating `>`, e.g. `<workbenchArtifact`.
    pub fn artifact_open(&self) -> &str {
        &self.artifact_open
    }

    pub fn artifact_close(&self) -> &str {
        &self.artifact_close
    }

    /// Opening sequence without the terminating `>`, e.g. `<workbenchAction`.
    pub fn action_open(&self) -> &str {
        &self.action_open
    }

    pub fn action_close(&self) -> &str {
        &self.action_close
    }
}

impl Default for TagGrammar {
    fn default() -> Self {
        Self::new(DEFAULT_ARTIFACT_TAG, DEFAULT_ACTION_TAG)
    }
}

/// Where an opening tag ends, as seen from the current buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagEnd {
    /// Byte index of the terminating `>`.
    Complete(usize),
    /// The buffer ends before the tag does. Wait for more input.
    Incomplete,
    /// The opening sequence is the prefix of some other name (`<workbenchArtifactX`).
    NotATag,
}

/// Locate the `>` that closes an opening tag whose name ends at `after_name`.
///
/// Quote-aware: a `>` inside an attribute value does not end the tag.
pub fn find_tag_end(input: &str, after_name: usize) -> TagEnd {
    let bytes = input.as_bytes();
    let Some(&first) = bytes.get(after_name) else {
        return TagEnd::Incomplete;
    };
    if first != b'>' && first != b'/' && !first.is_ascii_whitespace() {
        return TagEnd::NotATag;
    }

    let mut in_quote = false;
    for (offset, &byte) in bytes[after_name..].iter().enumerate() {
        match byte {
            b'"' => in_quote = !in_quote,
            b'>' if !in_quote => return TagEnd::Complete(after_name + offset),
            _ => {}
        }
    }
    TagEnd::Incomplete
}

/// Length of the longest proper prefix of any `tags` entry that `text` ends with.
///
/// Used to hold back a tag split across chunks (`...<workbenchArt`).
pub fn partial_prefix_len(text: &str, tags: &[&str]) -> usize {
    tags.iter()
        .map(|tag| {
            (1..tag.len())
                .rev()
                .find(|&k| text.ends_with(&tag[..k]))
                .unwrap_or(0)
        })
        .max()
        .unwrap_or(0)
}

/// Parse `name="value"` pairs out of the inside of an opening tag.
///
/// The first occurrence of a name wins.
pub fn parse_attributes(tag_body: &str) -> HashMap<String, String> {
    let mut attrs = HashMap::new();
    for cap in ATTRIBUTE_REGEX.captures_iter(tag_body) {
        if let (Some(name), Some(value)) = (cap.get(1), cap.get(2)) {
            attrs
                .entry(name.as_str().to_string())
                .or_insert_with(|| value.as_str().to_string());
        }
    }
    attrs
}

/// Pull `<from>…</from>` and `<to>…</to>` out of a quick-edit action body.
pub fn extract_body_edit(body: &str) -> (Option<String>, Option<String>) {
    let grab = |re: &Regex| {
        re.captures(body)
            .and_then(|cap| cap.get(1))
            .map(|m| m.as_str().to_string())
    };
    (grab(&FROM_REGEX), grab(&TO_REGEX))
}
