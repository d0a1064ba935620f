//! Attachment references
//!
//! Replays the archive and hands every file referenced by an event to a
//! [`FileSink`], the boundary to the attachment downloader. Each file id is
//! handed over once per run; a file the service no longer has is counted,
//! not treated as an error.

use std::collections::HashSet;
use std::error::Error as StdError;
use std::future::Future;

use futures::{pin_mut, StreamExt};
use serde_json::Value;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

use crate::archive::{ArchiveError, ArchiveResult, ReplayPipeline};
use crate::types::Event;

pub type FetchError = Box<dyn StdError + Send + Sync>;

/// A file referenced by an archived event
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileRef {
    pub id: String,
}

impl FileRef {
    /// File ids found in `file_id`, `file.id` and `files[].id`
    pub fn from_event(event: &Event) -> Vec<FileRef> {
        let mut refs = Vec::new();
        let mut push = |value: Option<&Value>| {
            if let Some(id) = value.and_then(Value::as_str).filter(|id| !id.is_empty()) {
                if !refs.iter().any(|r: &FileRef| r.id == id) {
                    refs.push(FileRef { id: id.to_string() });
                }
            }
        };

        push(event.get("file_id"));
        push(event.get("file").and_then(|f| f.get("id")));
        if let Some(files) = event.get("files").and_then(Value::as_array) {
            for file in files {
                push(file.get("id"));
            }
        }
        refs
    }
}

/// Per-file result reported by a sink
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Fetched,
    NotFound,
}

/// Consumer of file references
pub trait FileSink {
    fn fetch(&mut self, file: &FileRef) -> impl Future<Output = Result<FetchOutcome, FetchError>>;
}

/// Writes one file id per line, for an external downloader to pick up
pub struct ManifestSink<W> {
    out: W,
}

impl<W: AsyncWrite + Unpin> ManifestSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub async fn flush(&mut self) -> std::io::Result<()> {
        self.out.flush().await
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: AsyncWrite + Unpin> FileSink for ManifestSink<W> {
    async fn fetch(&mut self, file: &FileRef) -> Result<FetchOutcome, FetchError> {
        self.out.write_all(file.id.as_bytes()).await?;
        self.out.write_all(b"\n").await?;
        Ok(FetchOutcome::Fetched)
    }
}

/// Totals of a file run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilesSummary {
    pub events: usize,
    pub references: usize,
    pub unique: usize,
    pub fetched: usize,
    pub not_found: usize,
}

/// Replay the archive and hand each referenced file to `sink` once
///
/// A sink error ends the run as [`ArchiveError::Handler`].
pub async fn fetch_all<S: FileSink>(pipeline: &ReplayPipeline, sink: &mut S) -> ArchiveResult<FilesSummary> {
    let mut summary = FilesSummary::default();
    let mut seen = HashSet::new();

    let events = pipeline.events();
    pin_mut!(events);
    while let Some(item) = events.next().await {
        let replayed = item?;
        summary.events += 1;

        for file in FileRef::from_event(&replayed.event) {
            summary.references += 1;
            if !seen.insert(file.id.clone()) {
                continue;
            }
            summary.unique += 1;

            match sink.fetch(&file).await.map_err(ArchiveError::Handler)? {
                FetchOutcome::Fetched => {
                    debug!(file = %file.id, "file handed over");
                    summary.fetched += 1;
                }
                FetchOutcome::NotFound => {
                    info!(file = %file.id, "file not found");
                    summary.not_found += 1;
                }
            }
        }
    }

    info!(
        events = summary.events,
        files = summary.unique,
        not_found = summary.not_found,
        "file references processed"
    );
    Ok(summary)
}
