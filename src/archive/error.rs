//! Error types for the archive core

use std::io;
use std::path::{Path, PathBuf};

/// Result type for archive operations
pub type ArchiveResult<T> = Result<T, ArchiveError>;

/// Errors raised by the log writer and the replay pipeline
///
/// Every variant is fatal for the current run. Backpressure is not an
/// error; it is reported through [`WriteOutcome`](super::WriteOutcome).
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    /// Filesystem failure opening, writing, listing or closing a log file
    #[error("storage error at {}: {source}", path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Malformed JSON line encountered during replay
    #[error("malformed event at {}:{line}: {source}", path.display())]
    Decode {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    /// Event could not be serialized to a log line
    #[error("failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),

    /// The inbound line stream failed for a reason other than bad data
    #[error("failed to read input: {0}")]
    Input(#[source] io::Error),

    /// The replay handler reported a failure
    #[error("replay handler failed: {0}")]
    Handler(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ArchiveError {
    pub(crate) fn storage(path: impl AsRef<Path>, source: io::Error) -> Self {
        ArchiveError::Storage {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}
