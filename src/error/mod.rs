//! Error types for the task store.

pub mod unified;

pub use unified::{ErrorCategory, RecoverySuggestion};

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Primary error type for all store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error ({context}) at {}: {source}", path.display())]
    Io {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "Timed out acquiring lock {} after {attempts} attempts; if no writer is running, delete the lock file",
        path.display()
    )]
    LockTimeout { path: PathBuf, attempts: u32 },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl StoreError {
    /// Wrap an I/O error with the operation and file it concerns.
    pub fn io(context: &'static str, path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            context,
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Configuration(_) => ErrorCategory::Configuration,
            Self::Io { .. } => ErrorCategory::Filesystem,
            Self::LockTimeout { .. } => ErrorCategory::LockContention,
            Self::Serialization(_) => ErrorCategory::Serialization,
            Self::InvalidArgument(_) => ErrorCategory::InvalidInput,
        }
    }

    /// Whether retrying the whole operation later may succeed.
    ///
    /// Filesystem errors are not considered transient.
    pub fn is_retryable(&self) -> bool {
        matches!(self.category(), ErrorCategory::LockContention)
    }

    /// Suggest recovery actions.
    pub fn recovery_suggestion(&self) -> RecoverySuggestion {
        match self.category() {
            ErrorCategory::LockContention => RecoverySuggestion::RemoveWedgedLock,
            ErrorCategory::Filesystem => RecoverySuggestion::CheckPermissions,
            ErrorCategory::Configuration => RecoverySuggestion::CheckConfiguration,
            ErrorCategory::Serialization | ErrorCategory::InvalidInput => {
                RecoverySuggestion::FixInput
            }
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, StoreError>;
