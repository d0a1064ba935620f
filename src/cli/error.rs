use event_archiver::{ArchiveError, ConfigError};

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Archive(#[from] ArchiveError),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("signal: {0}")]
    Signal(#[from] ctrlc::Error),
}
