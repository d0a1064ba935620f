mod cmd;
mod error;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use event_archiver::ArchiveConfig;

pub use error::CliError;

#[derive(Parser)]
#[command(name = "event-archiver", version, about = "Archive workspace events into hourly log files")]
pub struct Cli {
    /// Path to the JSON config file
    #[arg(long, global = true, default_value = "config.json", env = "ARCHIVER_CONFIG")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Archive live events read from stdin, one JSON object per line
    LogEvents,
    /// Import channel histories read from stdin, one batch per line
    LogHistory,
    /// Print the ids of files referenced by archived events
    ListFiles(RootArgs),
    /// Summarize an archive root
    Stats(RootArgs),
}

#[derive(Args, Clone, Debug)]
pub struct RootArgs {
    /// Read the history archive instead of the live event archive
    #[arg(long)]
    pub history: bool,
}

impl RootArgs {
    fn root<'a>(&self, config: &'a ArchiveConfig) -> &'a std::path::Path {
        if self.history {
            config.history_root()
        } else {
            &config.log_path
        }
    }
}

pub async fn run(cli: Cli) -> Result<(), CliError> {
    let config = ArchiveConfig::load(&cli.config)?;
    tracing::info!(config = %cli.config.display(), "loaded config");

    match cli.command {
        Commands::LogEvents => cmd::log_events(&config).await,
        Commands::LogHistory => cmd::log_history(&config).await,
        Commands::ListFiles(args) => cmd::list_files(args.root(&config)).await,
        Commands::Stats(args) => cmd::stats(args.root(&config)),
    }
}
