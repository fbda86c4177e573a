use std::{io, path::PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The history is empty, so there is nothing to pick from.
    #[error("no history")]
    NoHistory,

    /// The picked display string does not match any stored entry.
    #[error("no history entry matches {0:?}")]
    NoMatch(String),

    #[error("history storage {path:?}: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// No usable clipboard tool for this session.
    #[error("clipboard backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("picker failed: {0:#}")]
    Picker(anyhow::Error),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    pub fn storage(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::Storage {
            path: path.into(),
            source,
        }
    }

    /// Process exit status for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::NoHistory | Error::NoMatch(_) | Error::Config(_) => 1,
            Error::Storage { .. } | Error::BackendUnavailable(_) | Error::Picker(_) => 2,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
