//! Event Archiver - Binary Entry Point
//!
//! This is the main entry point for the event-archiver binary.

mod cli;

use clap::Parser;
use cli::Cli;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!(error = %e, "failed to start runtime");
            std::process::exit(1);
        }
    };

    let result = runtime.block_on(cli::run(cli));
    // A blocked stdin read must not keep the process alive
    runtime.shutdown_background();

    if let Err(e) = result {
        tracing::error!(error = %e, "archiver failed");
        std::process::exit(1);
    }
}
