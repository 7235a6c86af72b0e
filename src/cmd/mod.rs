//! CLI command implementations.
//!
//! | Module     | Commands handled |
//! |------------|------------------|
//! | `parse`    | `Parse`          |
//! | `apply`    | `Apply`          |
//! | `versions` | `Versions`       |
//! | `config`   | `Config`         |

pub mod apply;
pub mod config;
pub mod parse;
pub mod versions;

pub use apply::cmd_apply;
pub use config::cmd_config;
pub use parse::cmd_parse;
pub use versions::cmd_versions;

use anyhow::{Context, Result};
use std::path::Path;

/// A transcript read from disk, with the ids the parser keys it by.
pub struct Transcript {
    pub message_id: String,
    pub text: String,
}

impl Transcript {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read transcript: {}", path.display()))?;
        let message_id = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "transcript".to_string());
        Ok(Self { message_id, text })
    }

    pub fn part_id(&self) -> String {
        format!("{}-0", self.message_id)
    }

    /// Growing prefixes of the text, as a streaming host would see them.
    pub fn prefixes(&self, chunk_size: usize) -> Vec<&str> {
        prefixes(&self.text, chunk_size)
    }
}

/// Split `text` into cumulative prefixes roughly `chunk_size` bytes apart,
/// never cutting inside a character. `chunk_size == 0` yields the whole text.
pub fn prefixes(text: &str, chunk_size: usize) -> Vec<&str> {
    if chunk_size == 0 || text.is_empty() {
        return vec![text];
    }

    let mut out = Vec::new();
    let mut end = 0;
    while end < text.len() {
        end = (end + chunk_size).min(text.len());
        while !text.is_char_boundary(end) {
            end += 1;
        }
        out.push(&text[..end]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefixes_whole_text() {
        assert_eq!(prefixes("abc", 0), vec!["abc"]);
        assert_eq!(prefixes("", 4), vec![""]);
    }

    #[test]
    fn test_prefixes_grow_to_full_text() {
        assert_eq!(prefixes("abcde", 2), vec!["ab", "abcd", "abcde"]);
    }

    #[test]
    fn test_prefixes_respect_char_boundaries() {
        let text = "aé€b";
        for prefix in prefixes(text, 1) {
            assert!(text.starts_with(prefix));
        }
        assert_eq!(prefixes(text, 1).last(), Some(&text));
    }
}
