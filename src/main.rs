use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

mod cmd;

#[derive(Parser)]
#[command(name = "workbench")]
#[command(version, about = "Apply LLM-authored artifacts to a sandboxed project")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    /// Also write logs to a daily-rotated file in this directory
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the streaming parser over a transcript and print what it emits
    Parse {
        /// File holding the assistant message text
        transcript: PathBuf,

        /// Feed the transcript in growing prefixes of this many bytes (0 = all at once)
        #[arg(long, default_value = "0")]
        chunk_size: usize,

        /// Print events as JSON lines
        #[arg(long)]
        json: bool,
    },
    /// Apply a transcript's actions to the project directory
    Apply {
        /// File holding the assistant message text
        transcript: PathBuf,

        /// Feed the transcript in growing prefixes of this many bytes (0 = all at once)
        #[arg(long, default_value = "0")]
        chunk_size: usize,

        /// Treat the transcript as a replayed message: register, don't execute
        #[arg(long)]
        initial: bool,
    },
    /// List recorded workspace versions
    Versions,
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Initialize a default workbench.toml file
    Init,
}

fn init_tracing(verbose: bool, log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let stderr_layer = fmt::layer().with_writer(std::io::stderr).with_target(false);

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(dir, "workbench.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to initialize logging")?;

    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = init_tracing(cli.verbose, cli.log_dir.as_deref())?;

    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    match &cli.command {
        Commands::Parse {
            transcript,
            chunk_size,
            json,
        } => cmd::cmd_parse(&project_dir, transcript, *chunk_size, *json)?,
        Commands::Apply {
            transcript,
            chunk_size,
            initial,
        } => cmd::cmd_apply(&cli, &project_dir, transcript, *chunk_size, *initial).await?,
        Commands::Versions => cmd::cmd_versions(&project_dir).await?,
        Commands::Config { command } => cmd::cmd_config(&project_dir, command.clone())?,
    }

    Ok(())
}
