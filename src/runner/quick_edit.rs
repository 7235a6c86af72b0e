//! Fuzzy in-place text replacement.
//!
//! Two phases: an exact first-occurrence replacement, then a
//! whitespace-tolerant regex that replaces every match.

use crate::errors::QuickEditError;
use regex::{NoExpand, Regex};

/// Build a regex source that matches `from` with any whitespace run in place
/// of each whitespace run. `None` if `from` is only whitespace.
pub fn whitespace_pattern(from: &str) -> Option<String> {
    let collapsed = from.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return None;
    }
    Some(regex::escape(&collapsed).replace(' ', r"\s+"))
}

/// A validated edit: both sides are present.
#[derive(Debug, Clone, Copy)]
pub struct QuickEdit<'a> {
    file_path: &'a str,
    from: &'a str,
    to: &'a str,
}

impl<'a> QuickEdit<'a> {
    pub fn new(
        file_path: &'a str,
        from: Option<&'a str>,
        to: Option<&'a str>,
    ) -> Result<Self, QuickEditError> {
        match (from, to) {
            (Some(from), Some(to)) => Ok(Self {
                file_path,
                from,
                to,
            }),
            _ => Err(QuickEditError::MissingFromTo {
                file_path: file_path.to_string(),
            }),
        }
    }

    /// Apply the edit to `content`.
    ///
    /// An edit that leaves the content unchanged means `from` no longer
    /// matches the file and is reported as `TextNotFound`.
    pub fn apply(&self, content: &str) -> Result<String, QuickEditError> {
        if !self.from.is_empty() && content.contains(self.from) {
            return Ok(content.replacen(self.from, self.to, 1));
        }

        let not_found = || QuickEditError::TextNotFound {
            file_path: self.file_path.to_string(),
        };

        let pattern = whitespace_pattern(self.from).ok_or_else(not_found)?;
        let re = Regex::new(&pattern).map_err(|source| QuickEditError::InvalidPattern {
            file_path: self.file_path.to_string(),
            source,
        })?;

        let replaced = re.replace_all(content, NoExpand(self.to));
        if replaced == content {
            return Err(not_found());
        }
        Ok(replaced.into_owned())
    }
}

/// Validate `from`/`to` and apply the edit in one step.
pub fn apply_quick_edit(
    content: &str,
    from: Option<&str>,
    to: Option<&str>,
    file_path: &str,
) -> Result<String, QuickEditError> {
    QuickEdit::new(file_path, from, to)?.apply(content)
}
