//! Event Archiver
//!
//! Archives a messaging workspace's event stream as hourly JSON-lines files
//! and replays them in chronological order.
//!
//! # Features
//!
//! - **Hourly Partitions**: `<root>/YYYY-MM/YYYY-MM-DD_HH.log`, UTC
//! - **One Open File**: rollover closes the previous hour before opening the next
//! - **Backpressure**: buffered appends report a full buffer instead of blocking
//! - **Dedup**: optional per-process suppression of already written records
//! - **Replay**: lazy, ordered stream over every archived event
//!
//! # Modules
//!
//! - `archive`: Log writer, partitioner, dedup index, walker, replay, stats
//! - `types`: The `Event` record
//! - `config`: JSON configuration loading and validation
//! - `feed`: Live event feed archiving
//! - `history`: History import with synthesized identity keys
//! - `files`: File references handed to an attachment downloader
//! - `shutdown`: Termination signal wiring
//!
//! # Example
//!
//! ```no_run
//! use event_archiver::{Event, LogWriter, ReplayPipeline, WriteOptions};
//!
//! # async fn demo() -> event_archiver::ArchiveResult<()> {
//! let mut writer = LogWriter::new("/srv/archive/events");
//! let event = Event::from_json_line(r#"{"type":"message","ts":"1700000000.000100"}"#)?;
//! writer.write(&event, WriteOptions::default())?;
//! writer.close()?;
//!
//! ReplayPipeline::new("/srv/archive/events")
//!     .replay(|event| async move {
//!         println!("{}", event.friendly_type());
//!         Ok::<_, std::io::Error>(())
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod archive;
pub mod config;
pub mod feed;
pub mod files;
pub mod history;
pub mod shutdown;
pub mod types;

// Re-export commonly used items at crate root
pub use archive::{
    ArchiveError, ArchiveResult, LogWriter, PartitionKey, ReplayPipeline, ReplayedEvent, StopSignal,
    WriteOptions, WriteOutcome, WriterConfig,
};
pub use config::{ArchiveConfig, ConfigError};
pub use types::Event;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
