//! Integration tests for the workbench CLI
//!
//! These tests drive the binary end to end against temporary project
//! directories.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Helper to create a workbench Command
fn workbench() -> Command {
    cargo_bin_cmd!("workbench")
}

/// Helper to create a temporary project directory
fn create_temp_project() -> TempDir {
    TempDir::new().unwrap()
}

/// Helper to write a transcript next to (not inside) the project
fn write_transcript(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

fn project_in(dir: &TempDir) -> PathBuf {
    let project = dir.path().join("project");
    fs::create_dir_all(&project).unwrap();
    project
}

fn apply_transcript(project: &Path, transcript: &Path) -> assert_cmd::assert::Assert {
    workbench()
        .arg("--project-dir")
        .arg(project)
        .arg("apply")
        .arg(transcript)
        .env_remove("WORKBENCH_PROJECT_ID")
        .assert()
}

const LANDING: &str = r#"Sure, here it is.
<workbenchArtifact title="Landing page">
<workbenchAction type="file" filePath="src/index.html"><h1>Hello</h1></workbenchAction>
<workbenchAction type="quick-edit" filePath="src/index.html" from="Hello" to="Hi there"></workbenchAction>
</workbenchArtifact>
Let me know what else you need."#;

// =============================================================================
// Basic CLI Tests
// =============================================================================

mod cli_basics {
    use super::*;

    #[test]
    fn test_workbench_help() {
        workbench()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("apply"));
    }

    #[test]
    fn test_workbench_version() {
        workbench().arg("--version").assert().success();
    }

    #[test]
    fn test_unknown_subcommand_fails() {
        workbench().arg("frobnicate").assert().failure();
    }
}

// =============================================================================
// Parse Tests
// =============================================================================

mod parse {
    use super::*;

    #[test]
    fn test_parse_prints_literal_and_events() {
        let dir = create_temp_project();
        let transcript = write_transcript(&dir, "m1.txt", LANDING);

        workbench()
            .current_dir(dir.path())
            .arg("parse")
            .arg(&transcript)
            .assert()
            .success()
            .stdout(predicate::str::contains("Sure, here it is."))
            .stdout(predicate::str::contains("__workbenchArtifact__"))
            .stdout(predicate::str::contains("Events (6)"))
            .stdout(predicate::str::contains("<h1>Hello</h1>").not());
    }

    #[test]
    fn test_parse_chunked_matches_whole() {
        let dir = create_temp_project();
        let transcript = write_transcript(&dir, "m1.txt", LANDING);

        let whole = workbench()
            .current_dir(dir.path())
            .args(["parse", "--json"])
            .arg(&transcript)
            .output()
            .unwrap();
        let chunked = workbench()
            .current_dir(dir.path())
            .args(["parse", "--json", "--chunk-size", "3"])
            .arg(&transcript)
            .output()
            .unwrap();

        assert!(whole.status.success());
        assert_eq!(whole.stdout, chunked.stdout);
    }

    #[test]
    fn test_parse_json_lines() {
        let dir = create_temp_project();
        let transcript = write_transcript(&dir, "m1.txt", LANDING);

        let output = workbench()
            .current_dir(dir.path())
            .args(["parse", "--json"])
            .arg(&transcript)
            .output()
            .unwrap();
        let stdout = String::from_utf8(output.stdout).unwrap();
        let events: Vec<serde_json::Value> = stdout
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();

        assert_eq!(events.len(), 7);
        assert_eq!(events[0]["event"], "artifact_open");
        assert_eq!(events[0]["artifact"]["title"], "Landing page");
        assert_eq!(events[2]["event"], "action_close");
        assert_eq!(events[2]["action"]["content"], "<h1>Hello</h1>");
        assert_eq!(events[6]["event"], "literal");
    }

    #[test]
    fn test_parse_missing_transcript() {
        let dir = create_temp_project();
        workbench()
            .current_dir(dir.path())
            .args(["parse", "missing.txt"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Failed to read transcript"));
    }
}

// =============================================================================
// Apply Tests
// =============================================================================

mod apply {
    use super::*;

    #[test]
    fn test_apply_writes_and_edits_files() {
        let dir = create_temp_project();
        let project = project_in(&dir);
        let transcript = write_transcript(&dir, "m1.txt", LANDING);

        apply_transcript(&project, &transcript)
            .success()
            .stdout(predicate::str::contains("Landing page"))
            .stdout(predicate::str::contains("2 action(s) applied"));

        assert_eq!(
            fs::read_to_string(project.join("src/index.html")).unwrap(),
            "<h1>Hi there</h1>"
        );
        assert!(project.join(".workbench/versions/project/v0001.json").exists());
    }

    #[test]
    fn test_apply_chunked() {
        let dir = create_temp_project();
        let project = project_in(&dir);
        let transcript = write_transcript(&dir, "m1.txt", LANDING);

        workbench()
            .arg("--project-dir")
            .arg(&project)
            .args(["apply", "--chunk-size", "7"])
            .arg(&transcript)
            .assert()
            .success();

        assert_eq!(
            fs::read_to_string(project.join("src/index.html")).unwrap(),
            "<h1>Hi there</h1>"
        );
    }

    #[test]
    fn test_apply_initial_does_not_execute() {
        let dir = create_temp_project();
        let project = project_in(&dir);
        let transcript = write_transcript(&dir, "m1.txt", LANDING);

        workbench()
            .arg("--project-dir")
            .arg(&project)
            .args(["apply", "--initial"])
            .arg(&transcript)
            .assert()
            .success();

        assert!(!project.join("src/index.html").exists());
        assert!(!project.join(".workbench/versions").exists());
    }

    #[test]
    fn test_apply_reports_failed_quick_edit() {
        let dir = create_temp_project();
        let project = project_in(&dir);
        let transcript = write_transcript(
            &dir,
            "m2.txt",
            r#"<workbenchArtifact title="Fix"><workbenchAction type="quick-edit" filePath="a.txt" from="x" to="y"></workbenchAction></workbenchArtifact>"#,
        );
        fs::write(project.join("a.txt"), "nothing to see").unwrap();

        apply_transcript(&project, &transcript)
            .failure()
            .stdout(predicate::str::contains("1 of 1 action(s) failed"))
            .stderr(predicate::str::contains("1 action(s) failed"));

        assert_eq!(fs::read_to_string(project.join("a.txt")).unwrap(), "nothing to see");
    }

    #[cfg(unix)]
    #[test]
    fn test_apply_shell_failure_does_not_stop_later_actions() {
        let dir = create_temp_project();
        let project = project_in(&dir);
        let transcript = write_transcript(
            &dir,
            "m3.txt",
            r#"<workbenchArtifact title="Setup">
<workbenchAction type="shell">false</workbenchAction>
<workbenchAction type="shell">touch made-by-shell.txt</workbenchAction>
</workbenchArtifact>"#,
        );

        apply_transcript(&project, &transcript)
            .failure()
            .stdout(predicate::str::contains("non-zero code"));

        assert!(project.join("made-by-shell.txt").exists());
    }

    #[test]
    fn test_apply_rejects_path_escape() {
        let dir = create_temp_project();
        let project = project_in(&dir);
        let transcript = write_transcript(
            &dir,
            "m4.txt",
            r#"<workbenchArtifact title="Bad"><workbenchAction type="file" filePath="../escaped.txt">x</workbenchAction></workbenchArtifact>"#,
        );

        apply_transcript(&project, &transcript).failure();
        assert!(!dir.path().join("escaped.txt").exists());
    }
}

// =============================================================================
// Versions Tests
// =============================================================================

mod versions {
    use super::*;

    #[test]
    fn test_versions_empty() {
        let dir = create_temp_project();
        let project = project_in(&dir);

        workbench()
            .arg("--project-dir")
            .arg(&project)
            .arg("versions")
            .env_remove("WORKBENCH_PROJECT_ID")
            .assert()
            .success()
            .stdout(predicate::str::contains("No versions recorded"));
    }

    #[test]
    fn test_versions_lists_applied_artifacts() {
        let dir = create_temp_project();
        let project = project_in(&dir);
        let transcript = write_transcript(&dir, "m1.txt", LANDING);
        apply_transcript(&project, &transcript).success();
        apply_transcript(&project, &transcript).success();

        workbench()
            .arg("--project-dir")
            .arg(&project)
            .arg("versions")
            .env_remove("WORKBENCH_PROJECT_ID")
            .assert()
            .success()
            .stdout(predicate::str::contains("v1"))
            .stdout(predicate::str::contains("v2"))
            .stdout(predicate::str::contains("m1"));
    }
}

// =============================================================================
// Config Tests
// =============================================================================

mod config {
    use super::*;

    #[test]
    fn test_config_show_defaults() {
        let dir = create_temp_project();

        workbench()
            .current_dir(dir.path())
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("No workbench.toml found"))
            .stdout(predicate::str::contains("shell_timeout_secs = 120"));
    }

    #[test]
    fn test_config_init_creates_toml() {
        let dir = create_temp_project();

        workbench()
            .current_dir(dir.path())
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Created workbench.toml"));

        let content = fs::read_to_string(dir.path().join(".workbench/workbench.toml")).unwrap();
        assert!(content.contains("[runner]"));
        assert!(content.contains("workbenchArtifact"));
    }

    #[test]
    fn test_config_init_does_not_overwrite() {
        let dir = create_temp_project();
        fs::create_dir_all(dir.path().join(".workbench")).unwrap();
        fs::write(
            dir.path().join(".workbench/workbench.toml"),
            "[runner]\nshell_timeout_secs = 5\n",
        )
        .unwrap();

        workbench()
            .current_dir(dir.path())
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("already exists"));

        let content = fs::read_to_string(dir.path().join(".workbench/workbench.toml")).unwrap();
        assert!(content.contains("shell_timeout_secs = 5"));
    }

    #[test]
    fn test_config_validate_no_config() {
        let dir = create_temp_project();

        workbench()
            .current_dir(dir.path())
            .args(["config", "validate"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Using defaults"));
    }

    #[test]
    fn test_config_validate_with_warnings() {
        let dir = create_temp_project();
        fs::create_dir_all(dir.path().join(".workbench")).unwrap();
        fs::write(
            dir.path().join(".workbench/workbench.toml"),
            "[grammar]\nartifact_tag = \"same\"\naction_tag = \"same\"\n",
        )
        .unwrap();

        workbench()
            .current_dir(dir.path())
            .args(["config", "validate"])
            .assert()
            .success()
            .stdout(predicate::str::contains("must differ"));
    }

    #[test]
    fn test_custom_grammar_is_used() {
        let dir = create_temp_project();
        let project = project_in(&dir);
        fs::create_dir_all(project.join(".workbench")).unwrap();
        fs::write(
            project.join(".workbench/workbench.toml"),
            "[grammar]\nartifact_tag = \"boltArtifact\"\naction_tag = \"boltAction\"\n",
        )
        .unwrap();
        let transcript = write_transcript(
            &dir,
            "m5.txt",
            r#"<boltArtifact title="t"><boltAction type="file" filePath="b.txt">bolt</boltAction></boltArtifact>"#,
        );

        apply_transcript(&project, &transcript).success();
        assert_eq!(fs::read_to_string(project.join("b.txt")).unwrap(), "bolt");
    }
}
