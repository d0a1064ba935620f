//! Live event feed
//!
//! The real-time socket client pipes events to us as JSON lines. Only event
//! types worth keeping are archived; everything else is ignored. A line the
//! client got wrong (bad JSON or invalid UTF-8) is logged and skipped. Only a
//! failing input stream ends the run with an error.

use std::io;

use futures::{pin_mut, Stream, StreamExt};
use tracing::{debug, error, info, warn};

use crate::archive::{ArchiveError, ArchiveResult, LogWriter, WriteOptions, WriteOutcome};
use crate::shutdown::Shutdown;
use crate::types::Event;

/// Event types archived from the live feed
pub const ARCHIVED_EVENT_TYPES: &[&str] = &[
    "message",
    "reaction_added",
    "reaction_removed",
    "channel_created",
    "channel_joined",
    "channel_left",
    "channel_deleted",
    "channel_rename",
    "group_joined",
    "group_left",
    "group_rename",
    "team_join",
    "channel_archive",
    "channel_unarchive",
    "group_archive",
    "group_unarchive",
    "emoji_changed",
    "file_change",
    "file_comment_added",
    "file_comment_deleted",
    "file_comment_edited",
    "file_created",
    "file_deleted",
    "file_public",
    "file_shared",
    "file_unshared",
    "member_joined_channel",
    "member_left_channel",
    "user_change",
];

pub fn is_archived_type(kind: &str) -> bool {
    ARCHIVED_EVENT_TYPES.contains(&kind)
}

/// What to do with one feed line
#[derive(Debug, Clone, PartialEq)]
pub enum FeedLine {
    Archive(Event),
    /// Valid event of a type we do not keep
    Ignore(String),
    /// Not a JSON object
    Reject(String),
}

pub fn classify(line: &str) -> FeedLine {
    match Event::from_json_line(line) {
        Ok(event) => match event.kind() {
            Some(kind) if is_archived_type(kind) => FeedLine::Archive(event),
            _ => FeedLine::Ignore(event.friendly_type()),
        },
        Err(e) => FeedLine::Reject(e.to_string()),
    }
}

/// Line counts of a feed run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedSummary {
    pub received: usize,
    pub archived: usize,
    pub ignored: usize,
    pub rejected: usize,
}

/// Archive a live feed until it ends or a stop is requested
///
/// The writer is shut down (stopped and closed) before this returns, also
/// when a storage or input error ends the run early.
pub async fn run<S>(lines: S, writer: &mut LogWriter, shutdown: &Shutdown) -> ArchiveResult<FeedSummary>
where
    S: Stream<Item = io::Result<String>>,
{
    let result = pump(lines, writer, shutdown).await;
    let summary = writer.finish(result)?;

    info!(
        received = summary.received,
        archived = summary.archived,
        ignored = summary.ignored,
        rejected = summary.rejected,
        "feed closed"
    );
    Ok(summary)
}

async fn pump<S>(lines: S, writer: &mut LogWriter, shutdown: &Shutdown) -> ArchiveResult<FeedSummary>
where
    S: Stream<Item = io::Result<String>>,
{
    let mut summary = FeedSummary::default();
    pin_mut!(lines);

    loop {
        let next = tokio::select! {
            biased;
            _ = shutdown.requested() => {
                info!("stop requested, closing feed");
                break;
            }
            next = lines.next() => next,
        };

        let line = match next {
            Some(Ok(line)) => line,
            Some(Err(e)) if e.kind() == io::ErrorKind::InvalidData => {
                warn!(error = %e, "rejecting undecodable feed line");
                summary.received += 1;
                summary.rejected += 1;
                continue;
            }
            Some(Err(e)) => {
                error!(error = %e, "feed read failed");
                return Err(ArchiveError::Input(e));
            }
            None => {
                info!("feed ended");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        summary.received += 1;

        match classify(&line) {
            FeedLine::Archive(event) => match writer.write(&event, WriteOptions::default())? {
                WriteOutcome::Stopped => break,
                WriteOutcome::PersistedBufferFull => {
                    summary.archived += 1;
                    writer.drain()?;
                }
                _ => summary.archived += 1,
            },
            FeedLine::Ignore(label) => {
                debug!(event = %label, "ignoring event type");
                summary.ignored += 1;
            }
            FeedLine::Reject(reason) => {
                warn!(reason = %reason, "rejecting malformed feed line");
                summary.rejected += 1;
            }
        }
    }

    Ok(summary)
}
