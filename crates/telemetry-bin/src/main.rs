//! attempt-replay - feed recorded gameplay answers through the batching pipeline.

mod replay;
mod session;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use telemetry_config_and_utils::{init_logging, Config, Paths};

/// attempt-replay command-line interface.
#[derive(Parser)]
#[command(name = "attempt-replay")]
#[command(about = "Replay gameplay answer attempts through the batching pipeline")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error). Defaults to the config file value
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Base directory for config and logs. Defaults to ~/.attempt-outbox
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay JSON-lines attempts from a file or stdin
    Replay(replay::ReplayArgs),
    /// Print the effective configuration
    ShowConfig,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let paths = match cli.base_dir {
        Some(base) => Paths::with_base_dir(base),
        None => Paths::new()?,
    };
    let config = Config::load(&paths)?;

    let level = cli.log_level.unwrap_or_else(|| config.log_level.clone());
    init_logging(&paths, "attempt-replay", &level);

    match cli.command {
        Commands::Replay(args) => {
            let summary = replay::run_replay(&config, args).await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Commands::ShowConfig => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
