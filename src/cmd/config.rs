//! Configuration view and validation commands: `workbench config`.

use anyhow::Result;
use workbench::config::{CONFIG_FILE, WORKBENCH_DIR, WorkbenchConfig, WorkbenchToml};

use super::super::ConfigCommands;

pub fn cmd_config(project_dir: &std::path::Path, command: Option<ConfigCommands>) -> Result<()> {
    let workbench_dir = project_dir.join(WORKBENCH_DIR);
    let config_path = workbench_dir.join(CONFIG_FILE);

    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("Workbench Configuration");
            println!("=======================");
            println!();

            let toml = if config_path.exists() {
                println!("Config file: {}", config_path.display());
                WorkbenchToml::load(&config_path)?
            } else {
                println!("No workbench.toml found at {}", config_path.display());
                println!("Using default configuration.");
                WorkbenchToml::default()
            };
            println!();
            print_toml(&toml);

            // Effective values (including env overrides)
            let config = WorkbenchConfig::new(project_dir.to_path_buf())?;
            let settings = config.runner_settings();
            println!("Effective values (with env overrides):");
            println!("  project_id = \"{}\"", settings.project_id);
            println!("  shell_timeout_secs = {}", settings.shell_timeout.as_secs());
            println!("  export_timeout_secs = {}", settings.export_timeout.as_secs());
            println!("  versions_dir = \"{}\"", config.versions_dir().display());
            println!();

            if !config_path.exists() {
                println!("Run 'workbench config init' to create a workbench.toml file.");
                println!();
            }
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            if !config_path.exists() {
                println!("No workbench.toml found. Using defaults (valid).");
                return Ok(());
            }

            let toml = WorkbenchToml::load(&config_path)?;
            let warnings = toml.validate();

            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
            println!();
        }
        Some(ConfigCommands::Init) => {
            if config_path.exists() {
                println!("workbench.toml already exists at {}", config_path.display());
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }

            if !workbench_dir.exists() {
                std::fs::create_dir_all(&workbench_dir)?;
            }

            WorkbenchToml::default().save(&config_path)?;

            println!("Created workbench.toml at {}", config_path.display());
            println!();
            println!("You can now customize:");
            println!("  - [workbench] project_id");
            println!("  - [runner] shell_timeout_secs, export_timeout_secs");
            println!("  - [grammar] artifact_tag, action_tag");
            println!();
        }
    }

    Ok(())
}

fn print_toml(toml: &WorkbenchToml) {
    if let Some(id) = &toml.workbench.project_id {
        println!("[workbench]");
        println!("  project_id = \"{}\"", id);
        println!();
    }

    println!("[runner]");
    println!("  shell_timeout_secs = {}", toml.runner.shell_timeout_secs);
    println!("  export_timeout_secs = {}", toml.runner.export_timeout_secs);
    println!();

    println!("[queue]");
    println!("  purge_threshold = {}", toml.queue.purge_threshold);
    println!("  purge_interval_ms = {}", toml.queue.purge_interval_ms);
    println!();

    println!("[export]");
    println!("  excludes = {:?}", toml.export.excludes);
    println!();

    println!("[grammar]");
    println!("  artifact_tag = \"{}\"", toml.grammar.artifact_tag);
    println!("  action_tag = \"{}\"", toml.grammar.action_tag);
    println!();
}
