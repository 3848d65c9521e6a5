//! Error classification and recovery hints.

use strum::{Display, IntoStaticStr};

/// Broad error category for routing recovery logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorCategory {
    Filesystem,
    LockContention,
    Serialization,
    Configuration,
    InvalidInput,
}

/// Suggested recovery action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum RecoverySuggestion {
    /// Another writer holds the lock; if none is running, delete the `.lock` file.
    #[strum(to_string = "retry later, or delete the lock file if no writer is running")]
    RemoveWedgedLock,
    #[strum(to_string = "check file permissions and free disk space")]
    CheckPermissions,
    #[strum(to_string = "check configuration file and environment variables")]
    CheckConfiguration,
    #[strum(to_string = "fix the supplied input")]
    FixInput,
}
