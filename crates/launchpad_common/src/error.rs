//! Error types for Launchpad.
//!
//! One enum for the whole library. The host decides what is fatal:
//! network and manifest failures are recovered locally, integrity failures
//! end the update attempt only, filesystem failures inside the swap agent
//! end that process.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LaunchpadError>;

#[derive(Error, Debug)]
pub enum LaunchpadError {
    #[error("Network failure for {target}: {reason}")]
    Network { target: String, reason: String },

    #[error("Integrity failure for {}: expected {expected}, got {actual}", path.display())]
    Integrity {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("Filesystem failure at {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Manifest error: {0}")]
    Manifest(String),

    #[error("Usage error: {0}")]
    Usage(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("Task failed: {0}")]
    Task(String),
}

/// Coarse classification used for logging and exit handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Network,
    Integrity,
    Filesystem,
    Manifest,
    Usage,
    Config,
    Catalog,
    Task,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Integrity => "integrity",
            Self::Filesystem => "filesystem",
            Self::Manifest => "manifest",
            Self::Usage => "usage",
            Self::Config => "config",
            Self::Catalog => "catalog",
            Self::Task => "task",
        }
    }
}

impl LaunchpadError {
    pub fn network(target: impl Into<String>, reason: impl ToString) -> Self {
        Self::Network {
            target: target.into(),
            reason: reason.to_string(),
        }
    }

    pub fn filesystem(path: impl AsRef<Path>, source: io::Error) -> Self {
        Self::Filesystem {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Network { .. } => ErrorKind::Network,
            Self::Integrity { .. } => ErrorKind::Integrity,
            Self::Filesystem { .. } => ErrorKind::Filesystem,
            Self::Manifest(_) => ErrorKind::Manifest,
            Self::Usage(_) => ErrorKind::Usage,
            Self::Config(_) => ErrorKind::Config,
            Self::Catalog(_) => ErrorKind::Catalog,
            Self::Task(_) => ErrorKind::Task,
        }
    }

    /// Whether the host keeps running normally after this error
    pub fn is_recoverable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Network | ErrorKind::Manifest)
    }
}
