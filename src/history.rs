//! History import
//!
//! The history fetch collaborator pages through every channel's message
//! history (and the replies of each thread) and hands us one
//! [`ChannelHistory`] per channel. Here each message gets a synthesized
//! identity key and is written with dedup enabled, so overlapping pages and
//! repeated runs within one process do not produce duplicate lines.
//!
//! Batches arrive one per line. A batch that does not decode is logged and
//! skipped; the import goes on with the next one.

use std::collections::HashMap;
use std::io;

use futures::{pin_mut, Stream, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::archive::{ArchiveError, ArchiveResult, LogWriter, WriteOptions, WriteOutcome};
use crate::shutdown::Shutdown;
use crate::types::Event;

/// Subtype given to plain thread replies
pub const REPLY_SUBTYPE: &str = "_message_replied";

/// Channel metadata as returned by the conversation listing
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChannelInfo {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Counterpart user of a direct message
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub is_im: bool,
    #[serde(default)]
    pub is_private: bool,
}

impl ChannelInfo {
    /// `#general`, `!private-team`, `@U123`
    pub fn label(&self) -> String {
        let prefix = if self.is_im {
            '@'
        } else if self.is_private {
            '!'
        } else {
            '#'
        };
        let name = self
            .name
            .as_deref()
            .or(self.user.as_deref())
            .unwrap_or(&self.id);
        format!("{}{}", prefix, name)
    }
}

/// One channel's fetched history
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelHistory {
    pub channel: ChannelInfo,
    #[serde(default)]
    pub messages: Vec<Event>,
    /// Thread replies keyed by the parent's `thread_ts`
    #[serde(default)]
    pub replies: HashMap<String, Vec<Event>>,
}

/// Message counts for one channel or a whole run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelStats {
    /// Messages seen, including thread replies but not broadcasts
    pub seen: usize,
    /// Of those, how many were newly written
    pub new: usize,
    /// The writer was stopped before the channel was finished
    pub interrupted: bool,
}

impl ChannelStats {
    pub fn merge(&mut self, other: ChannelStats) {
        self.seen += other.seen;
        self.new += other.new;
        self.interrupted |= other.interrupted;
    }
}

/// Identity key of a history message
///
/// `channel|ts|user`, plus `|thread_ts=<ts>` for thread replies and
/// `|edited=<ts>` for edited messages, so each edit and each reply is a
/// distinct record while re-fetches of the same one collide.
pub fn history_id(channel_id: &str, message: &Event, in_thread: bool) -> String {
    let field = |key: &str| value_text(message.get(key));

    let mut id = [channel_id.to_string(), field("ts"), field("user")].join("|");
    if in_thread {
        id.push_str("|thread_ts=");
        id.push_str(&field("thread_ts"));
    }
    if let Some(edited) = message.get("edited") {
        id.push_str("|edited=");
        id.push_str(&value_text(edited.get("ts")));
    }
    id
}

/// Render a scalar JSON field for an identity key; missing renders empty
fn value_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Whether a message starts a thread with replies to fetch
///
/// Broadcast replies carry `thread_ts` but no `reply_count`.
fn has_replies(message: &Event) -> bool {
    message.get("thread_ts").is_some()
        && message
            .get("reply_count")
            .and_then(Value::as_u64)
            .is_some_and(|count| count > 0)
}

/// Writes fetched history through a [`LogWriter`] with dedup
pub struct HistoryImporter<'a> {
    writer: &'a mut LogWriter,
    totals: ChannelStats,
}

impl<'a> HistoryImporter<'a> {
    pub fn new(writer: &'a mut LogWriter) -> Self {
        Self {
            writer,
            totals: ChannelStats::default(),
        }
    }

    /// Counts accumulated over every imported channel
    pub fn totals(&self) -> ChannelStats {
        self.totals
    }

    /// Import one channel's messages and thread replies
    pub fn import_channel(&mut self, history: &ChannelHistory) -> ArchiveResult<ChannelStats> {
        let label = history.channel.label();
        info!(channel = %label, "importing channel");

        let mut stats = ChannelStats::default();
        for message in &history.messages {
            let mut message = message.clone();
            message.set_identity_key(history_id(&history.channel.id, &message, false));

            let outcome = self.write(&message)?;
            if outcome == WriteOutcome::Stopped {
                stats.interrupted = true;
                break;
            }
            // Pages occasionally overlap, so more messages can be seen than are new
            stats.seen += 1;
            if outcome.is_persisted() {
                stats.new += 1;
            }

            if has_replies(&message) && self.import_thread(history, &message, &mut stats)? {
                stats.interrupted = true;
                break;
            }
        }

        info!(
            channel = %label,
            messages = stats.seen,
            new = stats.new,
            interrupted = stats.interrupted,
            "channel done"
        );
        self.totals.merge(stats);
        Ok(stats)
    }

    /// Returns `true` if the writer was stopped mid-thread
    fn import_thread(
        &mut self,
        history: &ChannelHistory,
        parent: &Event,
        stats: &mut ChannelStats,
    ) -> ArchiveResult<bool> {
        let thread_ts = value_text(parent.get("thread_ts"));
        let Some(replies) = history.replies.get(&thread_ts) else {
            warn!(channel = %history.channel.label(), thread_ts = %thread_ts, "thread replies missing from batch");
            return Ok(false);
        };

        debug!(
            thread = %preview(parent.get_str("text").unwrap_or_default()),
            replies = replies.len(),
            "importing thread"
        );

        for reply in replies {
            let mut reply = reply.clone();
            reply.set_identity_key(history_id(&history.channel.id, &reply, true));

            // Subtyped replies (thread broadcasts) already came through the
            // channel history, so they are written but not counted
            let counted = reply.subtype().is_none();
            if counted {
                reply.set_subtype(REPLY_SUBTYPE);
            }

            let outcome = self.write(&reply)?;
            if outcome == WriteOutcome::Stopped {
                return Ok(true);
            }
            if counted {
                stats.seen += 1;
                if outcome.is_persisted() {
                    stats.new += 1;
                }
            }
        }
        Ok(false)
    }

    /// Write with dedup, draining the sink whenever it reports a full buffer
    fn write(&mut self, event: &Event) -> ArchiveResult<WriteOutcome> {
        let outcome = self.writer.write(event, WriteOptions::dedup())?;
        if outcome.is_buffer_full() {
            self.writer.drain()?;
        }
        Ok(outcome)
    }
}

/// Import `ChannelHistory` lines until the input ends or a stop is requested
///
/// The writer is shut down before this returns. Returns the totals over
/// every imported channel.
pub async fn run<S>(lines: S, writer: &mut LogWriter, shutdown: &Shutdown) -> ArchiveResult<ChannelStats>
where
    S: Stream<Item = io::Result<String>>,
{
    let result = import_lines(lines, writer, shutdown).await;
    writer.finish(result)
}

async fn import_lines<S>(lines: S, writer: &mut LogWriter, shutdown: &Shutdown) -> ArchiveResult<ChannelStats>
where
    S: Stream<Item = io::Result<String>>,
{
    let mut importer = HistoryImporter::new(writer);
    pin_mut!(lines);

    loop {
        let next = tokio::select! {
            biased;
            _ = shutdown.requested() => break,
            next = lines.next() => next,
        };

        let line = match next {
            Some(Ok(line)) => line,
            Some(Err(e)) if e.kind() == io::ErrorKind::InvalidData => {
                warn!(error = %e, "skipping undecodable history batch");
                continue;
            }
            Some(Err(e)) => {
                error!(error = %e, "history read failed");
                return Err(ArchiveError::Input(e));
            }
            None => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let history: ChannelHistory = match serde_json::from_str(&line) {
            Ok(history) => history,
            Err(e) => {
                warn!(error = %e, "skipping malformed history batch");
                continue;
            }
        };
        let stats = importer.import_channel(&history)?;
        info!("messages: {} ({} new)", stats.seen, stats.new);
        if stats.interrupted {
            break;
        }
    }

    Ok(importer.totals())
}

fn preview(text: &str) -> String {
    if text.chars().count() > 45 {
        let head: String = text.chars().take(42).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;
    use tokio::io::{AsyncBufReadExt, BufReader};
    use tokio_stream::wrappers::LinesStream;

    fn event(value: Value) -> Event {
        Event::from_value(value).unwrap()
    }

    fn read_all(root: &std::path::Path) -> Vec<Event> {
        crate::archive::walker::list_sorted(root)
            .unwrap()
            .iter()
            .flat_map(|p| {
                fs::read_to_string(p)
                    .unwrap()
                    .lines()
                    .map(|l| Event::from_json_line(l).unwrap())
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    #[test]
    fn test_history_id() {
        let message = event(json!({"type": "message", "ts": "1700000000.000100", "user": "U1"}));
        assert_eq!(history_id("C1", &message, false), "C1|1700000000.000100|U1");

        let reply = event(json!({
            "ts": "1700000100.000100",
            "user": "U2",
            "thread_ts": "1700000000.000100",
            "edited": {"user": "U2", "ts": "1700000200.000000"}
        }));
        assert_eq!(
            history_id("C1", &reply, true),
            "C1|1700000100.000100|U2|thread_ts=1700000000.000100|edited=1700000200.000000"
        );

        let anonymous = event(json!({"ts": "1.0", "subtype": "bot_message"}));
        assert_eq!(history_id("C1", &anonymous, false), "C1|1.0|");
    }

    #[test]
    fn test_channel_label() {
        let mut channel = ChannelInfo {
            id: "C1".to_string(),
            name: Some("general".to_string()),
            ..Default::default()
        };
        assert_eq!(channel.label(), "#general");

        channel.is_private = true;
        assert_eq!(channel.label(), "!general");

        let dm = ChannelInfo {
            id: "D1".to_string(),
            user: Some("U9".to_string()),
            is_im: true,
            ..Default::default()
        };
        assert_eq!(dm.label(), "@U9");
    }

    #[test]
    fn test_import_counts_and_threads() {
        let temp_dir = TempDir::new().unwrap();
        let mut writer = LogWriter::new(temp_dir.path());

        let history: ChannelHistory = serde_json::from_value(json!({
            "channel": {"id": "C1", "name": "general"},
            "messages": [
                {"type": "message", "ts": "1700000000.000100", "user": "U1", "text": "hi",
                 "thread_ts": "1700000000.000100", "reply_count": 2},
                {"type": "message", "ts": "1700000050.000100", "user": "U2", "text": "yo"},
                {"type": "message", "ts": "1700000050.000100", "user": "U2", "text": "yo"}
            ],
            "replies": {
                "1700000000.000100": [
                    {"type": "message", "ts": "1700000000.000100", "user": "U1", "text": "hi",
                     "thread_ts": "1700000000.000100", "reply_count": 2},
                    {"type": "message", "ts": "1700000010.000100", "user": "U3", "text": "reply",
                     "thread_ts": "1700000000.000100"},
                    {"type": "message", "subtype": "thread_broadcast", "ts": "1700000020.000100",
                     "user": "U3", "thread_ts": "1700000000.000100"}
                ]
            }
        }))
        .unwrap();

        let mut importer = HistoryImporter::new(&mut writer);
        let stats = importer.import_channel(&history).unwrap();

        // 3 messages + 2 un-subtyped replies seen; the duplicate page entry is not new
        assert_eq!(stats.seen, 5);
        assert_eq!(stats.new, 4);
        assert!(!stats.interrupted);
        assert_eq!(importer.totals(), stats);

        // Importing the same batch again in the same run writes nothing new
        let again = importer.import_channel(&history).unwrap();
        assert_eq!(again.new, 0);
        assert_eq!(importer.totals().seen, 10);

        writer.close().unwrap();
        let written = read_all(temp_dir.path());
        assert_eq!(written.len(), 5);

        let replied: Vec<_> = written
            .iter()
            .filter(|e| e.subtype() == Some(REPLY_SUBTYPE))
            .collect();
        assert_eq!(replied.len(), 2);
        assert!(written.iter().all(|e| e.identity_key().is_some()));
    }

    #[test]
    fn test_stopped_writer_interrupts_import() {
        let temp_dir = TempDir::new().unwrap();
        let mut writer = LogWriter::new(temp_dir.path());
        writer.stop();

        let history: ChannelHistory = serde_json::from_value(json!({
            "channel": {"id": "C1"},
            "messages": [{"type": "message", "ts": "1700000000.000100", "user": "U1"}]
        }))
        .unwrap();

        let stats = HistoryImporter::new(&mut writer).import_channel(&history).unwrap();
        assert!(stats.interrupted);
        assert_eq!(stats.new, 0);
        assert!(read_all(temp_dir.path()).is_empty());
    }

    fn batch(channel: &str, ts: &str) -> String {
        json!({
            "channel": {"id": channel},
            "messages": [{"type": "message", "ts": ts, "user": "U1"}]
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_run_skips_bad_batches() {
        let temp_dir = TempDir::new().unwrap();
        let mut writer = LogWriter::new(temp_dir.path());
        let shutdown = Shutdown::new(writer.stop_signal());

        let mut input = Vec::new();
        input.extend_from_slice(batch("C1", "1700000000.000100").as_bytes());
        input.extend_from_slice(b"\n{\"channel\":\"\xff\"}\nnot json\n\n");
        input.extend_from_slice(batch("C2", "1700000001.000100").as_bytes());
        input.push(b'\n');
        let lines = LinesStream::new(BufReader::new(&input[..]).lines());

        let totals = run(lines, &mut writer, &shutdown).await.unwrap();

        assert_eq!(totals.seen, 2);
        assert_eq!(totals.new, 2);
        assert!(writer.is_stopped());
        assert_eq!(read_all(temp_dir.path()).len(), 2);
    }

    #[tokio::test]
    async fn test_run_read_failure_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let mut writer = LogWriter::new(temp_dir.path());
        let shutdown = Shutdown::new(writer.stop_signal());

        let items = vec![
            Ok(batch("C1", "1700000000.000100")),
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "fetcher went away")),
        ];
        let err = run(futures::stream::iter(items), &mut writer, &shutdown)
            .await
            .unwrap_err();

        assert!(matches!(err, ArchiveError::Input(_)));
        assert_eq!(read_all(temp_dir.path()).len(), 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_reports_failed_final_flush() {
        if !std::path::Path::new("/dev/full").exists() {
            return;
        }
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir_all(temp_dir.path().join("2023-11")).unwrap();
        std::os::unix::fs::symlink(
            "/dev/full",
            temp_dir.path().join("2023-11").join("2023-11-14_22.log"),
        )
        .unwrap();

        let mut writer = LogWriter::new(temp_dir.path());
        let shutdown = Shutdown::new(writer.stop_signal());
        let items = vec![Ok::<_, io::Error>(batch("C1", "1700000000.000100"))];

        let err = run(futures::stream::iter(items), &mut writer, &shutdown)
            .await
            .unwrap_err();
        assert!(matches!(err, ArchiveError::Storage { .. }));
    }

    #[test]
    fn test_preview_truncates() {
        assert_eq!(preview("short"), "short");
        let long = "x".repeat(50);
        assert_eq!(preview(&long), format!("{}...", "x".repeat(42)));
    }
}
