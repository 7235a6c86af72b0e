//! Version listing: `workbench versions`.

use anyhow::Result;
use console::style;
use std::path::Path;
use workbench::config::WorkbenchConfig;
use workbench::versions::{FileVersionStore, VersionStore};
use workbench::workspace::FileTree;

pub async fn cmd_versions(project_dir: &Path) -> Result<()> {
    let config = WorkbenchConfig::new(project_dir.to_path_buf())?;
    let project_id = config.project_id();
    let store = FileVersionStore::new(config.versions_dir());
    let versions = store.list_versions(&project_id).await?;

    if versions.is_empty() {
        println!("No versions recorded for project '{}'.", project_id);
        return Ok(());
    }

    println!();
    println!("{}", style(format!("Versions of '{}'", project_id)).bold());
    println!();
    for version in &versions {
        let files = serde_json::from_str::<FileTree>(&version.files_string)
            .map(|tree| tree.len().to_string())
            .unwrap_or_else(|_| "?".to_string());
        println!(
            "  v{:<4} {}  {}  {} file(s)  {}",
            version.version_number,
            style(version.created_at.format("%Y-%m-%d %H:%M:%S")).dim(),
            version.message_key,
            files,
            style(&version.version_id).dim()
        );
    }
    println!();
    Ok(())
}
