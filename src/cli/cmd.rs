use std::path::Path;

use event_archiver::archive::{ArchiveStats, StatsCollector};
use event_archiver::config::ensure_writable;
use event_archiver::feed;
use event_archiver::files::{self, ManifestSink};
use event_archiver::history;
use event_archiver::shutdown::Shutdown;
use event_archiver::{ArchiveConfig, LogWriter, ReplayPipeline};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::wrappers::LinesStream;
use tracing::info;

use super::CliError;

fn stdin_lines() -> LinesStream<BufReader<tokio::io::Stdin>> {
    LinesStream::new(BufReader::new(tokio::io::stdin()).lines())
}

pub async fn log_events(config: &ArchiveConfig) -> Result<(), CliError> {
    ensure_writable(&config.log_path)?;
    info!(root = %config.log_path.display(), "archiving live events");

    let mut writer = LogWriter::with_config(config.writer_config(&config.log_path));
    let shutdown = Shutdown::new(writer.stop_signal());
    shutdown.install_signal_handler()?;

    feed::run(stdin_lines(), &mut writer, &shutdown).await?;
    Ok(())
}

pub async fn log_history(config: &ArchiveConfig) -> Result<(), CliError> {
    let root = config.history_root();
    ensure_writable(root)?;
    info!(root = %root.display(), "importing history");

    let mut writer = LogWriter::with_config(config.writer_config(root));
    let shutdown = Shutdown::new(writer.stop_signal());
    shutdown.install_signal_handler()?;

    let totals = history::run(stdin_lines(), &mut writer, &shutdown).await?;

    info!(
        "TOTAL MESSAGES: {} ({} new){}",
        totals.seen,
        totals.new,
        if totals.interrupted { ", interrupted" } else { "" }
    );
    Ok(())
}

pub async fn list_files(root: &Path) -> Result<(), CliError> {
    let pipeline = ReplayPipeline::new(root);
    let mut sink = ManifestSink::new(tokio::io::stdout());

    let summary = files::fetch_all(&pipeline, &mut sink).await?;
    sink.flush().await?;

    info!(
        events = summary.events,
        references = summary.references,
        unique = summary.unique,
        "listed file references"
    );
    Ok(())
}

pub fn stats(root: &Path) -> Result<(), CliError> {
    let stats = StatsCollector::new(root).collect()?;
    print_stats(root, &stats);
    Ok(())
}

fn print_stats(root: &Path, stats: &ArchiveStats) {
    println!("Archive: {}", root.display());
    println!("  Files:     {}", stats.file_count);
    println!("  Size:      {}", ArchiveStats::format_size(stats.total_size));
    println!("  Events:    {}", stats.event_count);
    if stats.malformed_lines > 0 {
        println!("  Malformed: {}", stats.malformed_lines);
    }
    if let (Some(first), Some(last)) = (&stats.first_file, &stats.last_file) {
        println!("  Range:     {} .. {}", first.display(), last.display());
    }
    if !stats.events_by_type.is_empty() {
        println!("  By type:");
        for (kind, count) in &stats.events_by_type {
            println!("    {:<32} {}", kind, count);
        }
    }
}
