//! Archive Statistics
//!
//! Provides statistics about a log root:
//! - File and byte counts
//! - Event counts by friendly type
//! - First and last hour files
//!
//! Unlike replay, collecting stats never fails on bad data; malformed lines
//! are counted instead.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use super::error::{ArchiveError, ArchiveResult};
use super::walker;
use crate::types::Event;

/// Statistics about an archive root
#[derive(Debug, Clone, Default)]
pub struct ArchiveStats {
    /// Number of log files
    pub file_count: usize,
    /// Total size of log files in bytes
    pub total_size: u64,
    /// Number of decodable events
    pub event_count: usize,
    /// Lines that failed to decode
    pub malformed_lines: usize,
    /// Events by `type[.subtype]`
    pub events_by_type: BTreeMap<String, usize>,
    /// Earliest log file, relative to the root
    pub first_file: Option<PathBuf>,
    /// Latest log file, relative to the root
    pub last_file: Option<PathBuf>,
}

impl ArchiveStats {
    /// Byte count scaled to B, KB, MB or GB for the `stats` report
    pub fn format_size(bytes: u64) -> String {
        const KB: u64 = 1024;
        const MB: u64 = KB * 1024;
        const GB: u64 = MB * 1024;

        if bytes >= GB {
            format!("{:.2} GB", bytes as f64 / GB as f64)
        } else if bytes >= MB {
            format!("{:.2} MB", bytes as f64 / MB as f64)
        } else if bytes >= KB {
            format!("{:.2} KB", bytes as f64 / KB as f64)
        } else {
            format!("{} B", bytes)
        }
    }
}

/// Collector for archive statistics
pub struct StatsCollector {
    root: PathBuf,
}

impl StatsCollector {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Collect all statistics
    pub fn collect(&self) -> ArchiveResult<ArchiveStats> {
        let mut stats = ArchiveStats::default();
        let files = walker::list_sorted(&self.root)?;

        for path in &files {
            let size = fs::metadata(path)
                .map_err(|e| ArchiveError::storage(path, e))?
                .len();
            stats.file_count += 1;
            stats.total_size += size;
            self.analyze_file(path, &mut stats)?;
        }

        stats.first_file = files.first().map(|p| self.relative(p));
        stats.last_file = files.last().map(|p| self.relative(p));

        Ok(stats)
    }

    /// Count events in one file
    fn analyze_file(&self, path: &Path, stats: &mut ArchiveStats) -> ArchiveResult<()> {
        let file = File::open(path).map_err(|e| ArchiveError::storage(path, e))?;
        let reader = BufReader::new(file);

        for segment in reader.split(b'\n') {
            let segment = segment.map_err(|e| ArchiveError::storage(path, e))?;
            let line = segment.strip_suffix(b"\r").unwrap_or(&segment[..]);
            if line.is_empty() {
                continue;
            }

            match Event::from_json_slice(line) {
                Ok(event) => {
                    stats.event_count += 1;
                    *stats.events_by_type.entry(event.friendly_type()).or_insert(0) += 1;
                }
                Err(_) => stats.malformed_lines += 1,
            }
        }

        Ok(())
    }

    fn relative(&self, path: &Path) -> PathBuf {
        path.strip_prefix(&self.root).unwrap_or(path).to_path_buf()
    }
}
