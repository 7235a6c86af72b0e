//! Shell action execution.

use super::sink::OutputSink;
use crate::errors::ActionError;
use crate::workspace::{ProcessHandle, Workspace};
use futures::StreamExt;
use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::debug;

/// How long to keep reading already-buffered output once the command exits.
const OUTPUT_GRACE: Duration = Duration::from_millis(200);

// CSI sequences, OSC sequences (BEL or ST terminated), and two-byte escapes
static ANSI_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\x1b\[[0-?]*[ -/]*[@-~]|\x1b\][^\x07\x1b]*(?:\x07|\x1b\\)|\x1b[@-Z\\-_]").unwrap()
});

pub fn strip_ansi(text: &str) -> String {
    ANSI_REGEX.replace_all(text, "").into_owned()
}

/// Split a command line into program and arguments.
///
/// Newlines and tabs separate tokens like spaces; empty tokens are dropped.
/// There is no quoting.
pub fn tokenize_command(content: &str) -> Vec<String> {
    content
        .split([' ', '\n', '\t', '\r'])
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

/// Run `content` in the workspace root and return its exit code.
///
/// Output is stripped of ANSI codes, forwarded to `sink`, and appended to
/// `captured` as it arrives, so partial output survives a timeout.
pub async fn run_shell(
    workspace: &dyn Workspace,
    sink: &dyn OutputSink,
    action_id: &str,
    content: &str,
    limit: Duration,
    captured: &mut String,
) -> Result<i32, ActionError> {
    let mut tokens = tokenize_command(content).into_iter();
    let command = tokens.next().ok_or(ActionError::EmptyCommand)?;
    let args: Vec<String> = tokens.collect();
    debug!(action_id, command = %command, ?args, "Running shell action");

    let run = async {
        let ProcessHandle {
            mut output,
            mut exit,
        } = workspace.spawn(&command, &args, "").await?;

        // The exit code ends the action; background children may hold the
        // output pipes open long after the command itself has returned.
        let mut output_open = true;
        let exit_code = loop {
            tokio::select! {
                chunk = output.next(), if output_open => match chunk {
                    Some(chunk) => forward(sink, action_id, &chunk, captured),
                    None => output_open = false,
                },
                status = &mut exit => {
                    let code = status.map_err(ActionError::Wait)?;
                    if output_open {
                        let _ = tokio::time::timeout(OUTPUT_GRACE, async {
                            while let Some(chunk) = output.next().await {
                                forward(sink, action_id, &chunk, captured);
                            }
                        })
                        .await;
                    }
                    break code;
                }
            }
        };
        Ok::<_, ActionError>(exit_code)
    };

    match tokio::time::timeout(limit, run).await {
        Ok(result) => result,
        Err(_) => Err(ActionError::Timeout {
            secs: limit.as_secs(),
        }),
    }
}

fn forward(sink: &dyn OutputSink, action_id: &str, chunk: &str, captured: &mut String) {
    let clean = strip_ansi(chunk);
    sink.write(action_id, &clean);
    captured.push_str(&clean);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::sink::NullSink;
    use crate::workspace::LocalWorkspace;
    use tempfile::tempdir;

    #[test]
    fn test_tokenize_drops_empty_tokens() {
        assert_eq!(
            tokenize_command("  npm   install\n--save\tlodash \n"),
            vec!["npm", "install", "--save", "lodash"]
        );
    }

    #[test]
    fn test_tokenize_empty() {
        assert!(tokenize_command(" \n\t").is_empty());
    }

    #[test]
    fn test_strip_ansi() {
        assert_eq!(strip_ansi("\x1b[32mok\x1b[0m done"), "ok done");
        assert_eq!(strip_ansi("\x1b[2K\x1b[1Gprogress"), "progress");
        assert_eq!(strip_ansi("\x1b]0;title\x07text"), "text");
        assert_eq!(strip_ansi("plain"), "plain");
    }

    #[tokio::test]
    async fn test_empty_command_is_error() {
        let dir = tempdir().unwrap();
        let ws = LocalWorkspace::new(dir.path());
        let mut captured = String::new();
        let err = run_shell(&ws, &NullSink, "a", "\n ", Duration::from_secs(5), &mut captured)
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::EmptyCommand));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_captures_output_and_exit_code() {
        let dir = tempdir().unwrap();
        let ws = LocalWorkspace::new(dir.path());
        let mut captured = String::new();
        let code = run_shell(&ws, &NullSink, "a", "echo hello", Duration::from_secs(5), &mut captured)
            .await
            .unwrap();
        assert_eq!(code, 0);
        assert_eq!(captured, "hello\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_non_zero_exit_code_is_returned() {
        let dir = tempdir().unwrap();
        let ws = LocalWorkspace::new(dir.path());
        let mut captured = String::new();
        let code = run_shell(&ws, &NullSink, "a", "false", Duration::from_secs(5), &mut captured)
            .await
            .unwrap();
        assert_ne!(code, 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout() {
        let dir = tempdir().unwrap();
        let ws = LocalWorkspace::new(dir.path());
        let mut captured = String::new();
        let err = run_shell(&ws, &NullSink, "a", "sleep 10", Duration::from_millis(100), &mut captured)
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::Timeout { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_background_child_does_not_hold_action_open() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("serve.sh"), "echo started\nsleep 5 &\nexit 0\n").unwrap();
        let ws = LocalWorkspace::new(dir.path());
        let mut captured = String::new();
        let started = std::time::Instant::now();
        let code = run_shell(&ws, &NullSink, "a", "sh serve.sh", Duration::from_secs(2), &mut captured)
            .await
            .unwrap();
        assert_eq!(code, 0);
        assert_eq!(captured, "started\n");
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_invalid_utf8_output_is_kept_lossily() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("out.sh"),
            "printf 'caf\\351\\n'\necho after\nhead -c 300000 /dev/zero | tr '\\0' a\nexit 0\n",
        )
        .unwrap();
        let ws = LocalWorkspace::new(dir.path());
        let mut captured = String::new();
        let code = run_shell(&ws, &NullSink, "a", "sh out.sh", Duration::from_secs(5), &mut captured)
            .await
            .unwrap();
        assert_eq!(code, 0);
        assert!(captured.starts_with("caf\u{FFFD}\nafter\n"));
        assert_eq!(captured.len(), "caf\u{FFFD}\nafter\n".len() + 300_001);
    }

    #[tokio::test]
    async fn test_spawn_failure_is_workspace_error() {
        let dir = tempdir().unwrap();
        let ws = LocalWorkspace::new(dir.path());
        let mut captured = String::new();
        let err = run_shell(
            &ws,
            &NullSink,
            "a",
            "no-such-binary-for-workbench-tests",
            Duration::from_secs(5),
            &mut captured,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ActionError::Workspace(_)));
    }
}
