//! Parser dry run: `workbench parse`.

use anyhow::{Context, Result};
use console::style;
use serde_json::json;
use std::path::Path;
use workbench::config::WorkbenchConfig;
use workbench::parser::{ParserEvent, StreamingMessageParser};

use super::Transcript;

pub fn cmd_parse(project_dir: &Path, transcript: &Path, chunk_size: usize, json: bool) -> Result<()> {
    let config = WorkbenchConfig::new(project_dir.to_path_buf())?;
    let transcript = Transcript::load(transcript)?;
    let part_id = transcript.part_id();

    let mut parser = StreamingMessageParser::new(config.grammar());
    let mut literal = String::new();
    let mut events = Vec::new();
    for prefix in transcript.prefixes(chunk_size) {
        let out = parser.parse(&transcript.message_id, &part_id, prefix, false, None);
        literal.push_str(&out.literal);
        events.extend(out.events);
    }

    if json {
        for event in &events {
            println!(
                "{}",
                serde_json::to_string(event).context("Failed to serialize event")?
            );
        }
        println!("{}", json!({ "event": "literal", "text": literal }));
        return Ok(());
    }

    println!("{}", literal);
    println!();
    println!("{}", style(format!("Events ({})", events.len())).bold());
    for event in &events {
        println!("  {}", describe(event));
    }
    Ok(())
}

fn describe(event: &ParserEvent) -> String {
    match event {
        ParserEvent::ArtifactOpen { artifact } => {
            format!("artifact-open  {} \"{}\"", artifact.id, artifact.title)
        }
        ParserEvent::ArtifactClose { artifact } => format!("artifact-close {}", artifact.id),
        ParserEvent::ActionOpen { action } => format!(
            "action-open    {} {}{}",
            action.id,
            action.kind.as_str(),
            action
                .kind
                .file_path()
                .map(|p| format!(" {}", p))
                .unwrap_or_default()
        ),
        ParserEvent::ActionClose { action } => format!(
            "action-close   {} ({} bytes)",
            action.id,
            action.content.len()
        ),
    }
}
