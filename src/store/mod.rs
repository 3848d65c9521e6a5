//! Persistent session/task store shared across processes.
//!
//! Callers [`load`](TaskService::load) a snapshot, mutate it in memory and
//! [`save`](TaskService::save) it. Saving takes the cross-process lock,
//! re-reads the file, merges the candidate onto it field by field, and
//! atomically replaces the file before releasing the lock. Loading never
//! takes the lock; the atomic rename keeps readers from seeing partial writes.

pub mod loader;
pub mod lock;
pub mod merge;
pub mod service;
pub mod writer;

pub use loader::{JsonStoreLoader, StoreLoader};
pub use lock::{LockGuard, LockInfo, LockManager, LockPolicy, LockStatus};
pub use merge::merge_stores;
pub use service::{SaveResult, TaskService};

use std::sync::Arc;

/// Callback receiving non-fatal diagnostics (corrupt files, migrations,
/// reclaimed locks).
pub type WarningSink = Arc<dyn Fn(&str) + Send + Sync>;

pub(crate) fn emit_warning(sink: Option<&WarningSink>, message: &str) {
    tracing::warn!("{message}");
    if let Some(sink) = sink {
        sink(message);
    }
}
