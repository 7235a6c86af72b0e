//! Configuration for the workbench pipeline.
//!
//! Settings are read from `.workbench/workbench.toml` and layered
//! file → environment → CLI.
//!
//! ```toml
//! [workbench]
//! project_id = "landing-page"
//!
//! [runner]
//! shell_timeout_secs = 120
//! export_timeout_secs = 30
//!
//! [queue]
//! purge_threshold = 50
//! purge_interval_ms = 5000
//!
//! [export]
//! excludes = ["node_modules", ".git", ".workbench"]
//!
//! [grammar]
//! artifact_tag = "workbenchArtifact"
//! action_tag = "workbenchAction"
//! ```

use crate::protocol::{DEFAULT_ACTION_TAG, DEFAULT_ARTIFACT_TAG, TagGrammar};
use crate::runner::RunnerSettings;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const WORKBENCH_DIR: &str = ".workbench";
pub const CONFIG_FILE: &str = "workbench.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkbenchSection {
    /// Defaults to the project directory name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunnerSection {
    #[serde(default = "default_shell_timeout_secs")]
    pub shell_timeout_secs: u64,
    #[serde(default = "default_export_timeout_secs")]
    pub export_timeout_secs: u64,
}

fn default_shell_timeout_secs() -> u64 {
    120
}

fn default_export_timeout_secs() -> u64 {
    30
}

impl Default for RunnerSection {
    fn default() -> Self {
        Self {
            shell_timeout_secs: default_shell_timeout_secs(),
            export_timeout_secs: default_export_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSection {
    /// Processed items tolerated before the sweeper purges them.
    #[serde(default = "default_purge_threshold")]
    pub purge_threshold: usize,
    #[serde(default = "default_purge_interval_ms")]
    pub purge_interval_ms: u64,
}

fn default_purge_threshold() -> usize {
    50
}

fn default_purge_interval_ms() -> u64 {
    5000
}

impl Default for QueueSection {
    fn default() -> Self {
        Self {
            purge_threshold: default_purge_threshold(),
            purge_interval_ms: default_purge_interval_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportSection {
    /// File or directory names skipped when snapshotting the workspace.
    #[serde(default = "default_excludes")]
    pub excludes: Vec<String>,
}

fn default_excludes() -> Vec<String> {
    vec![
        "node_modules".to_string(),
        ".git".to_string(),
        WORKBENCH_DIR.to_string(),
    ]
}

impl Default for ExportSection {
    fn default() -> Self {
        Self {
            excludes: default_excludes(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrammarSection {
    #[serde(default = "default_artifact_tag")]
    pub artifact_tag: String,
    #[serde(default = "default_action_tag")]
    pub action_tag: String,
}

fn default_artifact_tag() -> String {
    DEFAULT_ARTIFACT_TAG.to_string()
}

fn default_action_tag() -> String {
    DEFAULT_ACTION_TAG.to_string()
}

impl Default for GrammarSection {
    fn default() -> Self {
        Self {
            artifact_tag: default_artifact_tag(),
            action_tag: default_action_tag(),
        }
    }
}

/// Contents of `workbench.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkbenchToml {
    #[serde(default)]
    pub workbench: WorkbenchSection,
    #[serde(default)]
    pub runner: RunnerSection,
    #[serde(default)]
    pub queue: QueueSection,
    #[serde(default)]
    pub export: ExportSection,
    #[serde(default)]
    pub grammar: GrammarSection,
}

impl WorkbenchToml {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse workbench.toml")
    }

    /// Load `workbench.toml` from `workbench_dir`, or defaults if it doesn't exist.
    pub fn load_or_default(workbench_dir: &Path) -> Result<Self> {
        let config_path = workbench_dir.join(CONFIG_FILE);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize workbench.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Apply `WORKBENCH_*` overrides read through `lookup`.
    ///
    /// Unparseable numbers are ignored.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(id) = lookup("WORKBENCH_PROJECT_ID").filter(|id| !id.trim().is_empty()) {
            self.workbench.project_id = Some(id);
        }
        if let Some(secs) = lookup("WORKBENCH_SHELL_TIMEOUT").and_then(|v| v.trim().parse().ok()) {
            self.runner.shell_timeout_secs = secs;
        }
        if let Some(secs) = lookup("WORKBENCH_EXPORT_TIMEOUT").and_then(|v| v.trim().parse().ok())
        {
            self.runner.export_timeout_secs = secs;
        }
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.runner.shell_timeout_secs == 0 {
            warnings.push("shell_timeout_secs is 0: every shell action will time out".to_string());
        }
        if self.runner.export_timeout_secs == 0 {
            warnings.push(
                "export_timeout_secs is 0: no version will ever be recorded".to_string(),
            );
        }
        if self.queue.purge_interval_ms == 0 {
            warnings.push("purge_interval_ms must be greater than 0".to_string());
        }

        for (name, tag) in [
            ("artifact_tag", &self.grammar.artifact_tag),
            ("action_tag", &self.grammar.action_tag),
        ] {
            if !is_valid_tag_name(tag) {
                warnings.push(format!(
                    "Invalid {} '{}': must start with a letter and contain only letters, digits, '-' or '_'",
                    name, tag
                ));
            }
        }
        if self.grammar.artifact_tag == self.grammar.action_tag {
            warnings.push("artifact_tag and action_tag must differ".to_string());
        }
        if self
            .grammar
            .artifact_tag
            .starts_with(self.grammar.action_tag.as_str())
            || self
                .grammar
                .action_tag
                .starts_with(self.grammar.artifact_tag.as_str())
        {
            warnings.push(format!(
                "Tag names '{}' and '{}' overlap: one is a prefix of the other",
                self.grammar.artifact_tag, self.grammar.action_tag
            ));
        }

        if let Some(id) = &self.workbench.project_id
            && (id.is_empty() || id.contains(['/', '\\']) || id == "." || id == "..")
        {
            warnings.push(format!(
                "Invalid project_id '{}': must be a non-empty single path segment",
                id
            ));
        }

        warnings
    }
}

fn is_valid_tag_name(tag: &str) -> bool {
    let mut chars = tag.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Configuration resolved against a project directory.
#[derive(Debug, Clone)]
pub struct WorkbenchConfig {
    pub project_dir: PathBuf,
    pub workbench_dir: PathBuf,
    pub toml: WorkbenchToml,
    /// CLI override: verbose mode
    pub verbose: bool,
}

impl WorkbenchConfig {
    /// Load configuration for `project_dir` (file → environment).
    pub fn new(project_dir: PathBuf) -> Result<Self> {
        let mut config = Self::without_env(project_dir)?;
        config.toml.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load configuration from the project's file only.
    pub fn without_env(project_dir: PathBuf) -> Result<Self> {
        let project_dir = project_dir
            .canonicalize()
            .context("Failed to resolve project directory")?;
        let workbench_dir = project_dir.join(WORKBENCH_DIR);
        let toml = WorkbenchToml::load_or_default(&workbench_dir)?;

        Ok(Self {
            project_dir,
            workbench_dir,
            toml,
            verbose: false,
        })
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn config_file(&self) -> PathBuf {
        self.workbench_dir.join(CONFIG_FILE)
    }

    pub fn versions_dir(&self) -> PathBuf {
        self.workbench_dir.join("versions")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.workbench_dir.join("logs")
    }

    /// Project id (file/env → project directory name → "default").
    pub fn project_id(&self) -> String {
        self.toml
            .workbench
            .project_id
            .clone()
            .or_else(|| {
                self.project_dir
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
            })
            .unwrap_or_else(|| "default".to_string())
    }

    pub fn grammar(&self) -> TagGrammar {
        TagGrammar::new(&self.toml.grammar.artifact_tag, &self.toml.grammar.action_tag)
    }

    pub fn runner_settings(&self) -> RunnerSettings {
        RunnerSettings {
            project_id: self.project_id(),
            shell_timeout: Duration::from_secs(self.toml.runner.shell_timeout_secs),
            export_timeout: Duration::from_secs(self.toml.runner.export_timeout_secs),
            export_excludes: self.toml.export.excludes.clone(),
        }
    }

    pub fn purge_threshold(&self) -> usize {
        self.toml.queue.purge_threshold
    }

    pub fn purge_interval(&self) -> Duration {
        Duration::from_millis(self.toml.queue.purge_interval_ms.max(1))
    }

    pub fn validate(&self) -> Vec<String> {
        self.toml.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let toml = WorkbenchToml::default();
        assert_eq!(toml.runner.shell_timeout_secs, 120);
        assert_eq!(toml.runner.export_timeout_secs, 30);
        assert_eq!(toml.queue.purge_threshold, 50);
        assert_eq!(toml.queue.purge_interval_ms, 5000);
        assert_eq!(toml.export.excludes, vec!["node_modules", ".git", ".workbench"]);
        assert_eq!(toml.grammar.artifact_tag, "workbenchArtifact");
        assert!(toml.validate().is_empty());
    }

    #[test]
    fn test_parse_partial_file_keeps_defaults() {
        let toml = WorkbenchToml::parse(
            r#"
[workbench]
project_id = "landing"

[runner]
shell_timeout_secs = 10
"#,
        )
        .unwrap();
        assert_eq!(toml.workbench.project_id.as_deref(), Some("landing"));
        assert_eq!(toml.runner.shell_timeout_secs, 10);
        assert_eq!(toml.runner.export_timeout_secs, 30);
        assert_eq!(toml.queue, QueueSection::default());
    }

    #[test]
    fn test_parse_empty() {
        assert_eq!(WorkbenchToml::parse("").unwrap(), WorkbenchToml::default());
    }

    #[test]
    fn test_parse_invalid() {
        let err = WorkbenchToml::parse("[runner\nshell").unwrap_err();
        assert!(err.to_string().contains("workbench.toml"));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        let mut toml = WorkbenchToml::default();
        toml.grammar.artifact_tag = "boltArtifact".to_string();
        toml.save(&path).unwrap();

        assert_eq!(WorkbenchToml::load(&path).unwrap(), toml);
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let dir = tempdir().unwrap();
        let toml = WorkbenchToml::load_or_default(dir.path()).unwrap();
        assert_eq!(toml, WorkbenchToml::default());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("WORKBENCH_PROJECT_ID", "from-env"),
            ("WORKBENCH_SHELL_TIMEOUT", "5"),
            ("WORKBENCH_EXPORT_TIMEOUT", "not-a-number"),
        ]
        .into_iter()
        .collect();
        let mut toml = WorkbenchToml::default();
        toml.apply_env_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(toml.workbench.project_id.as_deref(), Some("from-env"));
        assert_eq!(toml.runner.shell_timeout_secs, 5);
        assert_eq!(toml.runner.export_timeout_secs, 30);
    }

    #[test]
    fn test_validate_warnings() {
        let mut toml = WorkbenchToml::default();
        toml.runner.shell_timeout_secs = 0;
        toml.grammar.action_tag = "workbenchArtifact".to_string();
        toml.workbench.project_id = Some("../x".to_string());
        let warnings = toml.validate();

        assert!(warnings.iter().any(|w| w.contains("shell_timeout_secs")));
        assert!(warnings.iter().any(|w| w.contains("must differ")));
        assert!(warnings.iter().any(|w| w.contains("project_id")));
    }

    #[test]
    fn test_validate_rejects_bad_tag_names() {
        let mut toml = WorkbenchToml::default();
        toml.grammar.artifact_tag = "1bad tag".to_string();
        assert!(toml.validate().iter().any(|w| w.contains("artifact_tag")));
    }

    #[test]
    fn test_validate_rejects_overlapping_tags() {
        let mut toml = WorkbenchToml::default();
        toml.grammar.artifact_tag = "art".to_string();
        toml.grammar.action_tag = "artAction".to_string();
        assert!(toml.validate().iter().any(|w| w.contains("overlap")));
    }

    #[test]
    fn test_config_resolves_paths_and_project_id() {
        let dir = tempdir().unwrap();
        let project = dir.path().join("my-site");
        std::fs::create_dir_all(&project).unwrap();

        let config = WorkbenchConfig::without_env(project.clone()).unwrap();
        assert_eq!(config.project_id(), "my-site");
        assert!(config.versions_dir().ends_with(".workbench/versions"));
        assert!(config.config_file().ends_with(".workbench/workbench.toml"));

        let settings = config.runner_settings();
        assert_eq!(settings.project_id, "my-site");
        assert_eq!(settings.shell_timeout, Duration::from_secs(120));
        assert_eq!(config.grammar(), TagGrammar::default());
    }

    #[test]
    fn test_config_reads_project_file() {
        let dir = tempdir().unwrap();
        let workbench_dir = dir.path().join(WORKBENCH_DIR);
        std::fs::create_dir_all(&workbench_dir).unwrap();
        std::fs::write(
            workbench_dir.join(CONFIG_FILE),
            "[workbench]\nproject_id = \"p\"\n[grammar]\nartifact_tag = \"A\"\naction_tag = \"B\"\n",
        )
        .unwrap();

        let config = WorkbenchConfig::without_env(dir.path().to_path_buf()).unwrap();
        assert_eq!(config.project_id(), "p");
        assert_eq!(config.grammar(), TagGrammar::new("A", "B"));
    }

    #[test]
    fn test_config_missing_project_dir() {
        let dir = tempdir().unwrap();
        assert!(WorkbenchConfig::without_env(dir.path().join("missing")).is_err());
    }
}
