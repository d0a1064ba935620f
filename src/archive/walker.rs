//! Directory walker
//!
//! Lists every regular file below the log root. The order walkdir yields
//! entries in is not relied upon; callers sort.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::error::{ArchiveError, ArchiveResult};

/// All regular files under `root`, recursively
///
/// A missing root is treated as an empty archive.
pub fn list_files(root: &Path) -> ArchiveResult<Vec<PathBuf>> {
    if !root.exists() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            let source = e
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::other("filesystem loop detected"));
            ArchiveError::storage(path, source)
        })?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }

    Ok(files)
}

/// [`list_files`] sorted lexicographically, which for
/// `YYYY-MM/YYYY-MM-DD_HH.log` paths is chronological order
pub fn list_sorted(root: &Path) -> ArchiveResult<Vec<PathBuf>> {
    let mut files = list_files(root)?;
    files.sort();
    Ok(files)
}
