//! Transcript application: `workbench apply`.

use anyhow::{Result, bail};
use console::style;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use workbench::config::WorkbenchConfig;
use workbench::protocol::ActionStatus;
use workbench::runner::OutputSink;
use workbench::state::WorkbenchState;
use workbench::versions::FileVersionStore;
use workbench::{Workbench, WorkbenchOptions};
use workbench::workspace::LocalWorkspace;

use super::Transcript;
use crate::Cli;

/// Echoes shell output to stdout, dimmed and indented.
struct ConsoleSink;

impl OutputSink for ConsoleSink {
    fn write(&self, _action_id: &str, chunk: &str) {
        let mut stdout = std::io::stdout().lock();
        for line in chunk.lines() {
            let _ = writeln!(stdout, "    {}", style(line).dim());
        }
    }
}

pub async fn cmd_apply(
    cli: &Cli,
    project_dir: &Path,
    transcript: &Path,
    chunk_size: usize,
    initial: bool,
) -> Result<()> {
    let config = WorkbenchConfig::new(project_dir.to_path_buf())?.with_verbose(cli.verbose);
    for warning in config.validate() {
        eprintln!("{} {}", style("warning:").yellow(), warning);
    }
    let transcript = Transcript::load(transcript)?;
    let part_id = transcript.part_id();

    let workspace = Arc::new(LocalWorkspace::new(&config.project_dir));
    let versions = Arc::new(FileVersionStore::new(config.versions_dir()));
    let options = WorkbenchOptions::from_config(&config).with_sink(Arc::new(ConsoleSink));
    let mut workbench = Workbench::new(options, workspace, versions);

    for prefix in transcript.prefixes(chunk_size) {
        workbench
            .push_chunk(&transcript.message_id, &part_id, prefix, initial, None)
            .await;
    }

    let state = workbench.state().lock().await;
    print_summary(&state);

    let failed = state.all_failed_actions().count();
    if failed > 0 {
        bail!("{} action(s) failed", failed);
    }
    Ok(())
}

fn print_summary(state: &WorkbenchState) {
    println!();
    for artifact in state.artifacts() {
        let version = artifact
            .version
            .as_ref()
            .map(|v| format!(" (version {})", v.version_number))
            .unwrap_or_default();
        println!(
            "{} {}{}",
            style("▸").cyan(),
            style(&artifact.data.title).bold(),
            style(version).dim()
        );

        for action in state
            .actions()
            .filter(|a| a.data.artifact_id == artifact.data.id)
        {
            let marker = match action.status {
                ActionStatus::Success => style("✓").green(),
                ActionStatus::Error => style("✗").red(),
                ActionStatus::Pending => style("…").yellow(),
            };
            let target = action
                .data
                .kind
                .file_path()
                .map(str::to_string)
                .unwrap_or_else(|| action.data.content.trim().to_string());
            println!("  {} {:<10} {}", marker, action.data.kind.as_str(), target);
            if let Some(error) = &action.error {
                println!("    {}", style(error).red());
            }
        }
    }

    let total = state.actions().count();
    let failed = state
        .actions()
        .filter(|a| a.status == ActionStatus::Error)
        .count();
    println!();
    if failed == 0 {
        println!("{} {} action(s) applied", style("Done:").green().bold(), total);
    } else {
        println!(
            "{} {} of {} action(s) failed",
            style("Failed:").red().bold(),
            failed,
            total
        );
    }
}
