//! Convenience re-exports for common use.

pub use crate::config::{StoreConfig, StorePaths};
pub use crate::error::{Result, StoreError};
pub use crate::store::{LockPolicy, SaveResult, TaskService, WarningSink};
pub use crate::types::{SessionEntry, TaskStore, CURRENT_STORE_VERSION};
