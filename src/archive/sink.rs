//! Append sink
//!
//! Owns one log file opened in append mode plus an in-memory write buffer.
//! Appends never block on the file: bytes accumulate in the buffer until the
//! caller drains it, and once the buffer reaches the high-water mark every
//! append reports [`Pressure::Full`]. Bytes are written out in the order they
//! were appended, on [`AppendSink::drain`] or [`AppendSink::close`].

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::error::{ArchiveError, ArchiveResult};

/// Default buffer size at which appends start reporting backpressure
pub const DEFAULT_HIGH_WATER_MARK: usize = 16 * 1024;

/// Buffer state after an append
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pressure {
    /// Below the high-water mark
    Ready,
    /// At or above the high-water mark; drain before appending more
    Full,
}

#[derive(Debug)]
pub struct AppendSink {
    path: PathBuf,
    file: File,
    buffer: Vec<u8>,
    high_water_mark: usize,
    sync_on_close: bool,
}

impl AppendSink {
    /// Open `path` for appending, creating it if needed
    pub fn open(path: impl AsRef<Path>, high_water_mark: usize) -> ArchiveResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| ArchiveError::storage(&path, e))?;

        Ok(Self {
            path,
            file,
            buffer: Vec::with_capacity(high_water_mark.min(DEFAULT_HIGH_WATER_MARK)),
            high_water_mark: high_water_mark.max(1),
            sync_on_close: false,
        })
    }

    /// fsync the file when it is closed
    pub fn sync_on_close(mut self, enabled: bool) -> Self {
        self.sync_on_close = enabled;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes appended but not yet handed to the file
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn high_water_mark(&self) -> usize {
        self.high_water_mark
    }

    /// Buffer `line` followed by `\n`
    pub fn append_line(&mut self, line: &str) -> Pressure {
        self.buffer.extend_from_slice(line.as_bytes());
        self.buffer.push(b'\n');
        self.pressure()
    }

    pub fn pressure(&self) -> Pressure {
        if self.buffer.len() >= self.high_water_mark {
            Pressure::Full
        } else {
            Pressure::Ready
        }
    }

    /// Write all buffered bytes to the file
    pub fn drain(&mut self) -> ArchiveResult<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        self.file
            .write_all(&self.buffer)
            .map_err(|e| ArchiveError::storage(&self.path, e))?;
        debug!(path = %self.path.display(), bytes = self.buffer.len(), "drained log buffer");
        self.buffer.clear();
        Ok(())
    }

    /// Drain, flush and release the file handle
    pub fn close(mut self) -> ArchiveResult<()> {
        self.drain()?;
        self.file
            .flush()
            .map_err(|e| ArchiveError::storage(&self.path, e))?;
        if self.sync_on_close {
            self.file
                .sync_all()
                .map_err(|e| ArchiveError::storage(&self.path, e))?;
        }
        Ok(())
    }
}
