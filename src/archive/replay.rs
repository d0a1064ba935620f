//! Replay pipeline
//!
//! Streams archived events back out of a log root: files in sorted
//! (chronological) order, lines in file order, one event at a time. The
//! stream is lazy, so a consumer that awaits work between items holds back
//! decoding of the next line until that work is done.

use std::error::Error as StdError;
use std::future::Future;
use std::path::{Path, PathBuf};

use async_stream::try_stream;
use futures::{pin_mut, Stream, StreamExt};
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

use super::error::{ArchiveError, ArchiveResult};
use super::walker;
use crate::types::Event;

/// An event together with where it was read from
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayedEvent {
    pub path: PathBuf,
    /// 1-based line number within `path`
    pub line: usize,
    pub event: Event,
}

/// Totals of a completed replay
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub files: usize,
    pub events: usize,
}

/// Sequential reader over every log file under a root
#[derive(Debug, Clone)]
pub struct ReplayPipeline {
    root: PathBuf,
}

impl ReplayPipeline {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Files to replay, in replay order
    pub fn files(&self) -> ArchiveResult<Vec<PathBuf>> {
        walker::list_sorted(&self.root)
    }

    /// Lazy stream of decoded events
    ///
    /// Empty lines are skipped. The first malformed line (bad JSON, a
    /// non-object, or invalid UTF-8) yields
    /// [`ArchiveError::Decode`] and ends the stream. Each call starts over
    /// from the first file.
    pub fn events(&self) -> impl Stream<Item = ArchiveResult<ReplayedEvent>> + '_ {
        try_stream! {
            let files = self.files()?;
            for path in files {
                debug!(path = %path.display(), "replaying log");
                let file = File::open(&path)
                    .await
                    .map_err(|e| ArchiveError::storage(&path, e))?;
                // Split on raw bytes so invalid UTF-8 surfaces as a decode
                // error with its line number
                let mut segments = BufReader::new(file).split(b'\n');
                let mut line_no = 0usize;

                while let Some(segment) = segments
                    .next_segment()
                    .await
                    .map_err(|e| ArchiveError::storage(&path, e))?
                {
                    line_no += 1;
                    let line = segment.strip_suffix(b"\r").unwrap_or(&segment[..]);
                    if line.is_empty() {
                        continue;
                    }
                    let event = Event::from_json_slice(line).map_err(|source| ArchiveError::Decode {
                        path: path.clone(),
                        line: line_no,
                        source,
                    })?;
                    yield ReplayedEvent {
                        path: path.clone(),
                        line: line_no,
                        event,
                    };
                }
            }
        }
    }

    /// Feed every archived event to `handler`, one at a time
    ///
    /// The handler's future is awaited to completion before the next line is
    /// decoded. A handler error stops the replay.
    pub async fn replay<F, Fut, E>(&self, mut handler: F) -> ArchiveResult<ReplaySummary>
    where
        F: FnMut(Event) -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        let mut summary = ReplaySummary::default();
        let mut last_path: Option<PathBuf> = None;

        let events = self.events();
        pin_mut!(events);
        while let Some(item) = events.next().await {
            let replayed = item?;
            if last_path.as_ref() != Some(&replayed.path) {
                summary.files += 1;
                last_path = Some(replayed.path);
            }
            handler(replayed.event)
                .await
                .map_err(|e| ArchiveError::Handler(e.into()))?;
            summary.events += 1;
        }

        info!(
            root = %self.root.display(),
            files = summary.files,
            events = summary.events,
            "replay complete"
        );
        Ok(summary)
    }
}
