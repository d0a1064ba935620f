//! Log writer - the stateful core of the archiver
//!
//! Routes each event to its hourly file, keeping exactly one file open at a
//! time. A write for a different partition closes the current file before the
//! next one is opened, so files are filled in call order.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use super::dedup::DedupIndex;
use super::error::{ArchiveError, ArchiveResult};
use super::partition::PartitionKey;
use super::sink::{AppendSink, Pressure, DEFAULT_HIGH_WATER_MARK};
use crate::types::Event;

/// Configuration for a LogWriter
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Root directory holding the `YYYY-MM` month directories
    pub root: PathBuf,
    /// Buffered bytes at which writes report backpressure
    pub high_water_mark: usize,
    /// fsync each hour file when it is closed
    pub sync_on_close: bool,
}

impl WriterConfig {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            high_water_mark: DEFAULT_HIGH_WATER_MARK,
            sync_on_close: false,
        }
    }

    pub fn with_high_water_mark(mut self, bytes: usize) -> Self {
        self.high_water_mark = bytes;
        self
    }

    pub fn with_sync_on_close(mut self, enabled: bool) -> Self {
        self.sync_on_close = enabled;
        self
    }
}

/// Per-write options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteOptions {
    /// Skip events whose identity key was already written by this writer
    pub avoid_duplicates: bool,
}

impl WriteOptions {
    pub fn dedup() -> Self {
        Self {
            avoid_duplicates: true,
        }
    }
}

/// Result of a single write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Event accepted
    Persisted,
    /// Event accepted, but the sink is over its high-water mark and the
    /// caller should [`LogWriter::drain`] before writing more
    PersistedBufferFull,
    /// Identity key already written in this run
    Duplicate,
    /// Writer was stopped; event dropped
    Stopped,
}

impl WriteOutcome {
    /// `true` if this call persisted the event
    pub fn is_persisted(self) -> bool {
        matches!(self, WriteOutcome::Persisted | WriteOutcome::PersistedBufferFull)
    }

    pub fn is_buffer_full(self) -> bool {
        self == WriteOutcome::PersistedBufferFull
    }
}

/// Cloneable stop flag shared between a writer and a signal handler
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Hourly-rotating JSONL writer
pub struct LogWriter {
    config: WriterConfig,
    sink: Option<AppendSink>,
    current: Option<PartitionKey>,
    dedup: DedupIndex,
    stop: StopSignal,
}

impl LogWriter {
    /// Create a writer for `root` with default settings
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self::with_config(WriterConfig::new(root))
    }

    pub fn with_config(config: WriterConfig) -> Self {
        Self {
            config,
            sink: None,
            current: None,
            dedup: DedupIndex::new(),
            stop: StopSignal::new(),
        }
    }

    pub fn config(&self) -> &WriterConfig {
        &self.config
    }

    pub fn root(&self) -> &Path {
        &self.config.root
    }

    /// Partition of the open file, if any
    pub fn current_partition(&self) -> Option<&PartitionKey> {
        self.current.as_ref()
    }

    /// Path of the open file, if any
    pub fn current_path(&self) -> Option<&Path> {
        self.sink.as_ref().map(AppendSink::path)
    }

    /// Number of identity keys recorded so far
    pub fn dedup_len(&self) -> usize {
        self.dedup.len()
    }

    /// Handle that stops this writer from another thread
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    pub fn stop(&self) {
        self.stop.stop();
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_stopped()
    }

    /// Append an event to its hourly file
    ///
    /// Filesystem failures are returned as [`ArchiveError::Storage`] and are
    /// not retried.
    pub fn write(&mut self, event: &Event, options: WriteOptions) -> ArchiveResult<WriteOutcome> {
        let label = event.friendly_type();

        if self.is_stopped() {
            warn!(event = %label, "skipping event, writer stopped");
            return Ok(WriteOutcome::Stopped);
        }

        let identity = event.identity_key();
        if options.avoid_duplicates {
            if let Some(key) = identity {
                if self.dedup.contains(key) {
                    debug!(event = %label, identity = key, "skipping duplicate event");
                    return Ok(WriteOutcome::Duplicate);
                }
            }
        }

        let partition = PartitionKey::for_event(event);
        if self.current.as_ref() != Some(&partition) {
            self.close()?;
        }

        let line = event.to_json_line()?;
        let sink = match self.sink.take() {
            Some(sink) => sink,
            None => self.open(partition)?,
        };
        let sink = self.sink.insert(sink);

        debug!(partition = %sink.path().display(), event = %label, "writing event");
        let pressure = sink.append_line(&line);

        if let Some(key) = identity {
            self.dedup.insert(key);
        }

        match pressure {
            Pressure::Ready => Ok(WriteOutcome::Persisted),
            Pressure::Full => {
                warn!(
                    partition = %sink.path().display(),
                    buffered = sink.buffered(),
                    "log buffer full, caller should drain"
                );
                Ok(WriteOutcome::PersistedBufferFull)
            }
        }
    }

    /// Hand buffered bytes of the open file to the OS
    pub fn drain(&mut self) -> ArchiveResult<()> {
        match self.sink.as_mut() {
            Some(sink) => sink.drain(),
            None => Ok(()),
        }
    }

    /// Flush and release the open file, if any
    pub fn close(&mut self) -> ArchiveResult<()> {
        let partition = self.current.take();
        if let Some(sink) = self.sink.take() {
            if let Some(partition) = partition {
                info!(partition = %partition, "closing log");
            }
            sink.close()?;
        }
        Ok(())
    }

    /// Stop accepting writes, then close the open file
    pub fn shutdown(&mut self) -> ArchiveResult<()> {
        self.stop();
        self.close()
    }

    /// Shut down at the end of a run that produced `result`
    ///
    /// A close failure is returned when the run itself succeeded; when the
    /// run already failed its error wins and the close failure is logged.
    pub fn finish<T>(&mut self, result: ArchiveResult<T>) -> ArchiveResult<T> {
        let closed = self.shutdown();
        match (result, closed) {
            (Ok(value), closed) => closed.map(|()| value),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(close_err)) => {
                error!(error = %close_err, "failed to close log after error");
                Err(e)
            }
        }
    }

    fn open(&mut self, partition: PartitionKey) -> ArchiveResult<AppendSink> {
        info!(partition = %partition, "opening log");

        let dir = partition.dir_in(&self.config.root);
        fs::create_dir_all(&dir).map_err(|e| ArchiveError::storage(&dir, e))?;

        let sink = AppendSink::open(partition.path_in(&self.config.root), self.config.high_water_mark)?
            .sync_on_close(self.config.sync_on_close);

        self.current = Some(partition);
        Ok(sink)
    }
}

impl Drop for LogWriter {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            error!(error = %e, "failed to close log on drop");
        }
    }
}
