//! Cross-process lock backed by an exclusively created `<file>.lock`.
//!
//! The existence of the lock file is the mutex. Its JSON payload
//! (`pid`, `timestamp`, `host`) only serves stale-lock decisions: a lock
//! older than [`LockPolicy::stale_after`] whose recorded process is gone (or
//! whose payload is unreadable) is removed before the next create attempt.
//!
//! A recorded PID that was reused by an unrelated live process reads as
//! "still held"; such a lock is only cleared by
//! [`LockManager::force_clear`] or by hand.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

use crate::error::{Result, StoreError};

use super::{emit_warning, WarningSink};

/// Suffix appended to the store file name to form the lock file name.
pub const LOCK_SUFFIX: &str = ".lock";

/// Lock acquisition policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockPolicy {
    /// Maximum number of create attempts (including the first).
    pub max_attempts: u32,
    /// Age after which a lock file becomes a reclamation candidate.
    pub stale_after: Duration,
    /// Lower bound of the randomized wait between attempts.
    pub min_backoff: Duration,
    /// Upper bound of the randomized wait between attempts.
    pub max_backoff: Duration,
}

impl Default for LockPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            stale_after: Duration::from_secs(30),
            min_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_millis(150),
        }
    }
}

impl LockPolicy {
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(StoreError::Configuration(
                "lock max_attempts must be at least 1".to_string(),
            ));
        }
        if self.min_backoff > self.max_backoff {
            return Err(StoreError::Configuration(format!(
                "lock min_backoff ({:?}) exceeds max_backoff ({:?})",
                self.min_backoff, self.max_backoff
            )));
        }
        Ok(())
    }

    /// Uniformly jittered wait in `[min_backoff, max_backoff]`.
    pub fn backoff(&self) -> Duration {
        if self.min_backoff >= self.max_backoff {
            return self.min_backoff;
        }
        rand::thread_rng().gen_range(self.min_backoff..=self.max_backoff)
    }
}

/// Diagnostic payload stored in the lock file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockInfo {
    #[serde(default)]
    pub pid: Option<u32>,
    /// Acquisition time, epoch milliseconds.
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub host: Option<String>,
}

impl LockInfo {
    /// Payload describing the current process.
    pub fn current() -> Self {
        Self {
            pid: Some(std::process::id()),
            timestamp: Some(chrono::Utc::now().timestamp_millis()),
            host: Some(current_hostname()),
        }
    }
}

/// Snapshot of an existing lock file, for diagnostics and manual clearing.
#[derive(Debug, Clone)]
pub struct LockStatus {
    pub path: PathBuf,
    pub age: Duration,
    /// `None` when the payload could not be read or parsed.
    pub info: Option<LockInfo>,
    /// `None` when no PID is recorded.
    pub holder_alive: Option<bool>,
    pub stale: bool,
}

impl LockStatus {
    /// Whether the acquisition path would remove this lock.
    pub fn reclaimable(&self) -> bool {
        self.stale && self.holder_alive != Some(true)
    }
}

/// Path of the lock file guarding `target`.
pub fn lock_path_for(target: &Path) -> PathBuf {
    with_suffix(target, LOCK_SUFFIX)
}

pub(crate) fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

/// A held lock. Dropping it removes the lock file; prefer [`LockGuard::release`]
/// on async paths.
#[derive(Debug)]
pub struct LockGuard {
    path: PathBuf,
    file: Option<tokio::fs::File>,
    released: bool,
}

impl LockGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Close the handle and delete the lock file.
    pub async fn release(mut self) {
        self.released = true;
        drop(self.file.take());
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => tracing::debug!(lock = %self.path.display(), "lock released"),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                tracing::warn!(lock = %self.path.display(), "lock file vanished before release");
            }
            Err(err) => {
                tracing::warn!(lock = %self.path.display(), error = %err, "failed to remove lock file");
            }
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        drop(self.file.take());
        let _ = std::fs::remove_file(&self.path);
        tracing::debug!(lock = %self.path.display(), "lock released on drop");
    }
}

/// Acquires and reclaims lock files according to a [`LockPolicy`].
#[derive(Clone, Default)]
pub struct LockManager {
    policy: LockPolicy,
    on_warning: Option<WarningSink>,
}

impl std::fmt::Debug for LockManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockManager")
            .field("policy", &self.policy)
            .field("on_warning", &self.on_warning.as_ref().map(|_| ".."))
            .finish()
    }
}

impl LockManager {
    pub fn new(policy: LockPolicy) -> Self {
        Self {
            policy,
            on_warning: None,
        }
    }

    pub fn with_warning_sink(mut self, sink: Option<WarningSink>) -> Self {
        self.on_warning = sink;
        self
    }

    pub fn policy(&self) -> &LockPolicy {
        &self.policy
    }

    /// Acquire the lock at `lock_path`, retrying with jittered backoff.
    ///
    /// Each attempt first reclaims a stale lock, then tries an exclusive
    /// create. Failing with anything but "already exists" is fatal.
    pub async fn acquire(&self, lock_path: &Path) -> Result<LockGuard> {
        let max_attempts = self.policy.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            self.reclaim_stale(lock_path).await?;

            if let Some(guard) = self.try_create(lock_path).await? {
                tracing::debug!(lock = %lock_path.display(), attempt, "lock acquired");
                return Ok(guard);
            }

            if attempt < max_attempts {
                let wait = self.policy.backoff();
                tracing::trace!(
                    lock = %lock_path.display(),
                    attempt,
                    max_attempts,
                    wait_ms = wait.as_millis() as u64,
                    "lock busy, backing off"
                );
                tokio::time::sleep(wait).await;
            }
        }

        tracing::warn!(lock = %lock_path.display(), attempts = max_attempts, "lock acquisition timed out");
        Err(StoreError::LockTimeout {
            path: lock_path.to_path_buf(),
            attempts: max_attempts,
        })
    }

    /// One exclusive-create attempt. `Ok(None)` means the lock is held elsewhere.
    async fn try_create(&self, lock_path: &Path) -> Result<Option<LockGuard>> {
        let mut file = match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(lock_path)
            .await
        {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::AlreadyExists => return Ok(None),
            Err(err) => return Err(StoreError::io("create lock file", lock_path, err)),
        };

        let payload = serde_json::to_vec(&LockInfo::current())?;
        let written = async {
            file.write_all(&payload).await?;
            file.flush().await
        }
        .await;

        // The guard owns the file from here, so a failed payload write still
        // removes the lock on return.
        let guard = LockGuard {
            path: lock_path.to_path_buf(),
            file: Some(file),
            released: false,
        };
        match written {
            Ok(()) => Ok(Some(guard)),
            Err(err) => Err(StoreError::io("write lock payload", lock_path, err)),
        }
    }

    /// Remove the lock at `lock_path` if it is stale and its holder is gone.
    ///
    /// Returns whether a lock file was removed.
    pub async fn reclaim_stale(&self, lock_path: &Path) -> Result<bool> {
        let Some(status) = self.inspect(lock_path).await? else {
            return Ok(false);
        };
        if !status.stale {
            return Ok(false);
        }
        if status.holder_alive == Some(true) {
            tracing::debug!(
                lock = %lock_path.display(),
                age_secs = status.age.as_secs(),
                pid = ?status.info.as_ref().and_then(|i| i.pid),
                "stale lock holder still alive, not reclaiming"
            );
            return Ok(false);
        }

        match tokio::fs::remove_file(lock_path).await {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(false),
            Err(err) => return Err(StoreError::io("remove stale lock", lock_path, err)),
        }

        let pid = status
            .info
            .as_ref()
            .and_then(|i| i.pid)
            .map(|pid| pid.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        emit_warning(
            self.on_warning.as_ref(),
            &format!(
                "Reclaimed stale lock file (age: {}s, pid: {pid})",
                status.age.as_secs_f64().round() as u64
            ),
        );
        Ok(true)
    }

    /// Describe the lock file at `lock_path`, or `None` if there is none.
    pub async fn inspect(&self, lock_path: &Path) -> Result<Option<LockStatus>> {
        let metadata = match tokio::fs::metadata(lock_path).await {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(StoreError::io("stat lock file", lock_path, err)),
        };
        let modified = metadata
            .modified()
            .map_err(|err| StoreError::io("read lock mtime", lock_path, err))?;
        let age = SystemTime::now()
            .duration_since(modified)
            .unwrap_or_default();

        let info = match tokio::fs::read(lock_path).await {
            Ok(raw) => serde_json::from_slice::<LockInfo>(&raw).ok(),
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(_) => None,
        };
        let holder_alive = info.as_ref().and_then(|i| i.pid).map(is_process_alive);

        Ok(Some(LockStatus {
            path: lock_path.to_path_buf(),
            age,
            info,
            holder_alive,
            stale: age > self.policy.stale_after,
        }))
    }

    /// Remove the lock file regardless of age or holder. Operator escape hatch
    /// for a wedged lock.
    pub async fn force_clear(&self, lock_path: &Path) -> Result<bool> {
        match tokio::fs::remove_file(lock_path).await {
            Ok(()) => {
                emit_warning(
                    self.on_warning.as_ref(),
                    &format!("Force-removed lock file {}", lock_path.display()),
                );
                Ok(true)
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(StoreError::io("remove lock file", lock_path, err)),
        }
    }
}

/// Probe whether `pid` names a running process without signalling it.
pub fn is_process_alive(pid: u32) -> bool {
    #[cfg(unix)]
    {
        let Ok(pid) = libc::pid_t::try_from(pid) else {
            return false;
        };
        if pid <= 0 {
            return false;
        }
        // Signal 0 only checks existence; EPERM means it exists under another user.
        let result = unsafe { libc::kill(pid, 0) };
        result == 0 || std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
    }

    #[cfg(not(unix))]
    {
        let _ = pid;
        true
    }
}

fn current_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".into())
}
