//! Store service: the public `load` / `save` API.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{LoadDefaults, StoreConfig, StorePaths};
use crate::error::{Result, StoreError};
use crate::types::TaskStore;

use super::loader::{JsonStoreLoader, StoreLoader};
use super::lock::{lock_path_for, LockManager, LockPolicy, LockStatus};
use super::merge::merge_stores;
use super::writer::write_json_atomic;
use super::WarningSink;

/// Outcome of [`TaskService::save`].
#[derive(Debug, Clone, PartialEq)]
pub struct SaveResult {
    /// The merged document as written. Callers should continue from this
    /// rather than from the store they passed in.
    pub store: TaskStore,
}

/// Loads and durably saves the task store.
///
/// # Example
/// ```no_run
/// use taskstore::config::StoreConfig;
/// use taskstore::store::TaskService;
/// use taskstore::types::SessionEntry;
///
/// # async fn example() -> taskstore::error::Result<()> {
/// let service = TaskService::new(StoreConfig::discover()?);
/// let mut store = service.load(None).await;
/// store.insert("attempt-1", SessionEntry::for_agent("implementor"));
/// let saved = service.save(&store).await?.store;
/// assert!(saved.get("attempt-1").is_some());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct TaskService {
    paths: StorePaths,
    defaults: LoadDefaults,
    loader: Arc<dyn StoreLoader>,
    locks: LockManager,
    on_warning: Option<WarningSink>,
}

impl std::fmt::Debug for TaskService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskService")
            .field("paths", &self.paths)
            .field("defaults", &self.defaults)
            .field("locks", &self.locks)
            .field("on_warning", &self.on_warning.as_ref().map(|_| ".."))
            .finish()
    }
}

impl TaskService {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            paths: config.paths,
            defaults: config.defaults,
            loader: Arc::new(JsonStoreLoader),
            locks: LockManager::new(config.lock),
            on_warning: None,
        }
    }

    /// Replace the store loader.
    pub fn with_loader(mut self, loader: Arc<dyn StoreLoader>) -> Self {
        self.loader = loader;
        self
    }

    /// Service-wide warning sink, used by saves and by loads without their own.
    pub fn with_warning_sink(mut self, sink: WarningSink) -> Self {
        self.locks = self.locks.with_warning_sink(Some(sink.clone()));
        self.on_warning = Some(sink);
        self
    }

    pub fn with_lock_policy(self, policy: LockPolicy) -> Self {
        let locks = LockManager::new(policy).with_warning_sink(self.on_warning.clone());
        Self { locks, ..self }
    }

    pub fn paths(&self) -> &StorePaths {
        &self.paths
    }

    /// File that saves write to, if any.
    pub fn target_file(&self) -> Option<&Path> {
        self.paths.target_file()
    }

    /// Lock file guarding the target file, if any.
    pub fn lock_path(&self) -> Option<PathBuf> {
        self.target_file().map(lock_path_for)
    }

    /// Best-effort snapshot of the store. Never fails.
    ///
    /// `on_warning` overrides the service-wide sink for this call.
    pub async fn load(&self, on_warning: Option<WarningSink>) -> TaskStore {
        let sink = on_warning.or_else(|| self.on_warning.clone());
        self.loader
            .load(&self.paths, &self.defaults, sink.as_ref())
            .await
    }

    /// Merge `store` onto the latest on-disk state and persist the result.
    ///
    /// With no target file configured this returns `store` unchanged.
    pub async fn save(&self, store: &TaskStore) -> Result<SaveResult> {
        let Some(target) = self.target_file().map(Path::to_path_buf) else {
            return Ok(SaveResult {
                store: store.clone(),
            });
        };

        self.ensure_parent_dir(&target).await?;

        let lock_path = lock_path_for(&target);
        let guard = self.locks.acquire(&lock_path).await?;
        let result = self.merge_and_write(&target, store).await;
        guard.release().await;

        Ok(SaveResult { store: result? })
    }

    /// Critical section: must only run while holding the lock.
    async fn merge_and_write(&self, target: &Path, incoming: &TaskStore) -> Result<TaskStore> {
        let disk = self
            .loader
            .load(&self.paths, &self.defaults, self.on_warning.as_ref())
            .await;
        let merged = merge_stores(&disk, incoming);
        write_json_atomic(target, &merged).await?;

        tracing::debug!(
            target = %target.display(),
            disk_sessions = disk.len(),
            incoming_sessions = incoming.len(),
            merged_sessions = merged.len(),
            "store saved"
        );
        Ok(merged)
    }

    /// Create the parent directory of the store file.
    ///
    /// The store file itself only ever appears through the rename under the
    /// lock; until then loads keep falling back to the legacy file.
    async fn ensure_parent_dir(&self, target: &Path) -> Result<()> {
        let Some(parent) = target.parent() else {
            return Ok(());
        };
        if parent.as_os_str().is_empty() {
            return Ok(());
        }
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|err| StoreError::io("create store directory", parent, err))
    }

    /// Describe the current lock file, if one exists.
    pub async fn lock_status(&self) -> Result<Option<LockStatus>> {
        match self.lock_path() {
            Some(path) => self.locks.inspect(&path).await,
            None => Ok(None),
        }
    }

    /// Remove the lock file.
    ///
    /// Without `force`, only a lock that acquisition would reclaim anyway is
    /// removed. Returns whether a file was removed.
    pub async fn clear_lock(&self, force: bool) -> Result<bool> {
        let Some(path) = self.lock_path() else {
            return Ok(false);
        };
        if force {
            self.locks.force_clear(&path).await
        } else {
            self.locks.reclaim_stale(&path).await
        }
    }
}
