//! Configuration loading
//!
//! The archiver reads a JSON file with camelCase keys:
//!
//! ```json
//! {
//!   "token": "xoxb-...",
//!   "logPath": "/srv/archive/events",
//!   "fileStoragePath": "/srv/archive/files",
//!   "historyPath": "/srv/archive/history",
//!   "highWaterMark": 16384,
//!   "syncOnClose": false
//! }
//! ```
//!
//! `token`, `logPath` and `fileStoragePath` are required and the paths must
//! be existing directories. Everything else is optional.

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::archive::{WriterConfig, DEFAULT_HIGH_WATER_MARK};

/// Errors raised while loading configuration; all are fatal at startup
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("config key missing: \"{0}\"")]
    MissingKey(&'static str),

    #[error("config.{key} must be a directory: {}", path.display())]
    NotADirectory { key: &'static str, path: PathBuf },

    #[error("directory is not writable: {}: {source}", path.display())]
    NotWritable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawConfig {
    token: Option<String>,
    log_path: Option<PathBuf>,
    file_storage_path: Option<PathBuf>,
    history_path: Option<PathBuf>,
    high_water_mark: Option<usize>,
    sync_on_close: Option<bool>,
}

/// Validated archiver configuration
#[derive(Clone)]
pub struct ArchiveConfig {
    /// Messaging service credential, handed to the fetch collaborators
    pub token: String,
    /// Root of the live event archive
    pub log_path: PathBuf,
    /// Root of attachment storage
    pub file_storage_path: PathBuf,
    /// Root of the history archive; falls back to `log_path`
    pub history_path: Option<PathBuf>,
    pub high_water_mark: usize,
    pub sync_on_close: bool,
}

impl fmt::Debug for ArchiveConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArchiveConfig")
            .field("token", &"<redacted>")
            .field("log_path", &self.log_path)
            .field("file_storage_path", &self.file_storage_path)
            .field("history_path", &self.history_path)
            .field("high_water_mark", &self.high_water_mark)
            .field("sync_on_close", &self.sync_on_close)
            .finish()
    }
}

impl ArchiveConfig {
    /// Read and validate the config file at `path`
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&content)
    }

    /// Parse and validate config JSON
    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = serde_json::from_str(content)?;

        let token = raw
            .token
            .filter(|t| !t.is_empty())
            .ok_or(ConfigError::MissingKey("token"))?;
        let log_path = required_path(raw.log_path, "logPath")?;
        let file_storage_path = required_path(raw.file_storage_path, "fileStoragePath")?;
        let history_path = raw.history_path.filter(|p| !p.as_os_str().is_empty());

        ensure_directory(&log_path, "logPath")?;
        ensure_directory(&file_storage_path, "fileStoragePath")?;
        if let Some(history_path) = &history_path {
            ensure_directory(history_path, "historyPath")?;
        }

        Ok(Self {
            token,
            log_path,
            file_storage_path,
            history_path,
            high_water_mark: raw.high_water_mark.unwrap_or(DEFAULT_HIGH_WATER_MARK),
            sync_on_close: raw.sync_on_close.unwrap_or(false),
        })
    }

    /// Root used by history imports
    pub fn history_root(&self) -> &Path {
        self.history_path.as_deref().unwrap_or(&self.log_path)
    }

    /// Writer settings for a log root
    pub fn writer_config(&self, root: &Path) -> WriterConfig {
        WriterConfig::new(root)
            .with_high_water_mark(self.high_water_mark)
            .with_sync_on_close(self.sync_on_close)
    }
}

fn required_path(value: Option<PathBuf>, key: &'static str) -> Result<PathBuf, ConfigError> {
    value
        .filter(|p| !p.as_os_str().is_empty())
        .ok_or(ConfigError::MissingKey(key))
}

fn ensure_directory(path: &Path, key: &'static str) -> Result<(), ConfigError> {
    if path.is_dir() {
        Ok(())
    } else {
        Err(ConfigError::NotADirectory {
            key,
            path: path.to_path_buf(),
        })
    }
}

/// Confirm write access to `dir` by creating and removing a probe file
pub fn ensure_writable(dir: &Path) -> Result<(), ConfigError> {
    let probe = dir.join(format!(".write-probe-{}", std::process::id()));
    let not_writable = |source| ConfigError::NotWritable {
        path: dir.to_path_buf(),
        source,
    };

    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&probe)
        .map_err(not_writable)?;
    fs::remove_file(&probe).map_err(not_writable)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn dirs() -> (TempDir, PathBuf, PathBuf) {
        let temp_dir = TempDir::new().unwrap();
        let logs = temp_dir.path().join("logs");
        let files = temp_dir.path().join("files");
        fs::create_dir_all(&logs).unwrap();
        fs::create_dir_all(&files).unwrap();
        (temp_dir, logs, files)
    }

    #[test]
    fn test_valid_config() {
        let (_temp_dir, logs, files) = dirs();
        let content = json!({
            "token": "secret-token",
            "logPath": logs,
            "fileStoragePath": files,
            "highWaterMark": 1024
        })
        .to_string();

        let config = ArchiveConfig::from_json_str(&content).unwrap();
        assert_eq!(config.log_path, logs);
        assert_eq!(config.history_root(), logs.as_path());
        assert_eq!(config.high_water_mark, 1024);
        assert!(!config.sync_on_close);
        assert!(!format!("{:?}", config).contains("secret-token"));

        let writer_config = config.writer_config(config.history_root());
        assert_eq!(writer_config.high_water_mark, 1024);
    }

    #[test]
    fn test_missing_key() {
        let (_temp_dir, logs, _files) = dirs();
        let content = json!({"token": "t", "logPath": logs}).to_string();

        let err = ArchiveConfig::from_json_str(&content).unwrap_err();
        assert!(matches!(err, ConfigError::MissingKey("fileStoragePath")));
        assert_eq!(err.to_string(), "config key missing: \"fileStoragePath\"");
    }

    #[test]
    fn test_empty_token_is_missing() {
        let (_temp_dir, logs, files) = dirs();
        let content = json!({"token": "", "logPath": logs, "fileStoragePath": files}).to_string();

        let err = ArchiveConfig::from_json_str(&content).unwrap_err();
        assert!(matches!(err, ConfigError::MissingKey("token")));
    }

    #[test]
    fn test_path_must_be_directory() {
        let (temp_dir, logs, _files) = dirs();
        let not_dir = temp_dir.path().join("plain.txt");
        fs::write(&not_dir, "x").unwrap();
        let content = json!({"token": "t", "logPath": logs, "fileStoragePath": not_dir}).to_string();

        let err = ArchiveConfig::from_json_str(&content).unwrap_err();
        assert!(matches!(err, ConfigError::NotADirectory { key: "fileStoragePath", .. }));
    }

    #[test]
    fn test_history_path_override() {
        let (temp_dir, logs, files) = dirs();
        let history = temp_dir.path().join("history");
        fs::create_dir_all(&history).unwrap();
        let content = json!({
            "token": "t",
            "logPath": logs,
            "fileStoragePath": files,
            "historyPath": history
        })
        .to_string();

        let config = ArchiveConfig::from_json_str(&content).unwrap();
        assert_eq!(config.history_root(), history.as_path());
    }

    #[test]
    fn test_load_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let err = ArchiveConfig::load(temp_dir.path().join("config.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_ensure_writable() {
        let (_temp_dir, logs, _files) = dirs();
        ensure_writable(&logs).unwrap();
        assert_eq!(fs::read_dir(&logs).unwrap().count(), 0);

        let err = ensure_writable(&logs.join("missing")).unwrap_err();
        assert!(matches!(err, ConfigError::NotWritable { .. }));
    }
}
