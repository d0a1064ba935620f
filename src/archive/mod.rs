//! Archive Module
//!
//! This module provides the event archiving core:
//! - `LogWriter`: Routes events into hourly JSONL files with dedup and backpressure
//! - `ReplayPipeline`: Streams archived events back in chronological order
//! - `StatsCollector`: Collects statistics about a log root
//!
//! # Architecture
//!
//! ```text
//! Write Path:
//! ┌─────────┐    ┌─────────────┐    ┌───────────────┐    ┌──────────────────────────┐
//! │  Event  │───►│ DedupIndex  │───►│ PartitionKey  │───►│ AppendSink               │
//! │         │    │ (_history_id│    │ (ts -> hour)  │    │ YYYY-MM/YYYY-MM-DD_HH.log│
//! └─────────┘    └─────────────┘    └───────────────┘    └──────────────────────────┘
//!
//! Read Path (Replay):
//! ┌───────────────┐    ┌──────────────┐    ┌─────────────────┐
//! │ walk log root │───►│ sort paths   │───►│ decode line by  │───► handler(event).await
//! │               │    │ (= by hour)  │    │ line, lazily    │
//! └───────────────┘    └──────────────┘    └─────────────────┘
//! ```

mod dedup;
mod error;
mod partition;
mod replay;
mod sink;
mod stats;
mod writer;

pub mod walker;

pub use dedup::DedupIndex;
pub use error::{ArchiveError, ArchiveResult};
pub use partition::{PartitionKey, LOG_EXTENSION};
pub use replay::{ReplayPipeline, ReplaySummary, ReplayedEvent};
pub use sink::{AppendSink, Pressure, DEFAULT_HIGH_WATER_MARK};
pub use stats::{ArchiveStats, StatsCollector};
pub use writer::{LogWriter, StopSignal, WriteOptions, WriteOutcome, WriterConfig};
