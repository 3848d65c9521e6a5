//! Configuration system (layered: code > env > config file > defaults).

pub mod file;

pub use file::ConfigFile;

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::StoreError;
use crate::store::lock::LockPolicy;

/// Directory marking a workspace root.
pub const WORKSPACE_MARKER: &str = ".genie";

/// Store file location relative to the workspace root.
pub const DEFAULT_TASKS_FILE: &str = ".genie/state/tasks.json";

/// Workspace-level config file relative to the workspace root.
pub const WORKSPACE_CONFIG_FILE: &str = ".genie/taskstore.toml";

/// Executor assigned to entries that name none.
pub const DEFAULT_EXECUTOR: &str = "OPENCODE";

const ENV_FILE: &str = "TASKSTORE_FILE";
const ENV_LEGACY_FILE: &str = "TASKSTORE_LEGACY_FILE";
const ENV_DEFAULT_EXECUTOR: &str = "TASKSTORE_DEFAULT_EXECUTOR";
const ENV_LOCK_ATTEMPTS: &str = "TASKSTORE_LOCK_ATTEMPTS";
const ENV_STALE_LOCK_SECS: &str = "TASKSTORE_STALE_LOCK_SECS";

/// Candidate locations of the backing file.
///
/// The write target is the first of `tasks_file`, `sessions_file`,
/// `legacy_sessions_file` that is set. With none set, saving is a no-op.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorePaths {
    pub tasks_file: Option<PathBuf>,
    /// Older name for `tasks_file`.
    pub sessions_file: Option<PathBuf>,
    /// Read when `tasks_file` does not exist yet.
    pub legacy_sessions_file: Option<PathBuf>,
}

impl StorePaths {
    pub fn for_file(path: impl Into<PathBuf>) -> Self {
        Self {
            tasks_file: Some(path.into()),
            ..Self::default()
        }
    }

    /// File that `save` writes to.
    pub fn target_file(&self) -> Option<&Path> {
        self.tasks_file
            .as_deref()
            .or(self.sessions_file.as_deref())
            .or(self.legacy_sessions_file.as_deref())
    }

    /// File that a load prefers before falling back to the legacy one.
    pub fn preferred_file(&self) -> Option<&Path> {
        self.tasks_file.as_deref().or(self.sessions_file.as_deref())
    }
}

/// Defaults applied to entries by the loader.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadDefaults {
    pub executor: Option<String>,
}

impl LoadDefaults {
    pub fn executor_or_default(&self) -> &str {
        self.executor.as_deref().unwrap_or(DEFAULT_EXECUTOR)
    }
}

/// Resolved configuration for a [`crate::store::TaskService`].
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub workspace_root: PathBuf,
    pub paths: StorePaths,
    pub defaults: LoadDefaults,
    pub lock: LockPolicy,
}

impl StoreConfig {
    /// Built-in defaults for a workspace, without reading files or env.
    pub fn new(workspace_root: impl Into<PathBuf>) -> Self {
        let workspace_root = workspace_root.into();
        Self {
            paths: StorePaths::for_file(workspace_root.join(DEFAULT_TASKS_FILE)),
            workspace_root,
            defaults: LoadDefaults::default(),
            lock: LockPolicy::default(),
        }
    }

    /// Config backed by a single explicit file.
    pub fn for_file(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let workspace_root = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Self {
            workspace_root,
            paths: StorePaths::for_file(path),
            defaults: LoadDefaults::default(),
            lock: LockPolicy::default(),
        }
    }

    /// Config with no backing file: `save` becomes a no-op.
    pub fn in_memory() -> Self {
        Self {
            workspace_root: PathBuf::from("."),
            paths: StorePaths::default(),
            defaults: LoadDefaults::default(),
            lock: LockPolicy::default(),
        }
    }

    /// Discover the workspace from the current directory and apply all layers.
    pub fn discover() -> Result<Self, StoreError> {
        let cwd = std::env::current_dir()
            .map_err(|err| StoreError::io("resolve current directory", ".", err))?;
        Self::from_workspace(find_workspace_root(&cwd))
    }

    /// Defaults, then the config file, then the environment.
    pub fn from_workspace(workspace_root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        let mut config = Self::new(workspace_root);
        if let Some(path) = config.config_file_path() {
            if let Some(file) = ConfigFile::load(&path)? {
                tracing::debug!(path = %path.display(), "applying config file");
                file.apply(&mut config);
            }
        }
        config.apply_env()?;
        config.lock.validate()?;
        Ok(config)
    }

    /// Config file to read: the workspace one if present, else the user one.
    pub fn config_file_path(&self) -> Option<PathBuf> {
        let workspace = self.workspace_root.join(WORKSPACE_CONFIG_FILE);
        if workspace.exists() {
            return Some(workspace);
        }
        user_config_file()
    }

    /// Overlay values from process environment variables.
    pub fn apply_env(&mut self) -> Result<(), StoreError> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Overlay values from an arbitrary variable lookup.
    pub fn apply_env_from(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), StoreError> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(path) = get(ENV_FILE) {
            self.paths.tasks_file = Some(self.resolve(path));
        }
        if let Some(path) = get(ENV_LEGACY_FILE) {
            self.paths.legacy_sessions_file = Some(self.resolve(path));
        }
        if let Some(executor) = get(ENV_DEFAULT_EXECUTOR) {
            self.defaults.executor = Some(executor);
        }
        if let Some(raw) = get(ENV_LOCK_ATTEMPTS) {
            self.lock.max_attempts = parse_env(ENV_LOCK_ATTEMPTS, &raw)?;
        }
        if let Some(raw) = get(ENV_STALE_LOCK_SECS) {
            self.lock.stale_after = Duration::from_secs(parse_env(ENV_STALE_LOCK_SECS, &raw)?);
        }
        Ok(())
    }

    pub fn with_tasks_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.paths.tasks_file = Some(path.into());
        self
    }

    pub fn with_lock_policy(mut self, policy: LockPolicy) -> Self {
        self.lock = policy;
        self
    }

    pub fn with_default_executor(mut self, executor: impl Into<String>) -> Self {
        self.defaults.executor = Some(executor.into());
        self
    }

    /// Resolve a possibly relative path against the workspace root.
    pub fn resolve(&self, path: impl Into<PathBuf>) -> PathBuf {
        let path = path.into();
        if path.is_absolute() {
            path
        } else {
            self.workspace_root.join(path)
        }
    }
}

/// Nearest ancestor of `start` containing a `.genie` directory, else `start`.
pub fn find_workspace_root(start: &Path) -> PathBuf {
    start
        .ancestors()
        .find(|dir| dir.join(WORKSPACE_MARKER).is_dir())
        .unwrap_or(start)
        .to_path_buf()
}

fn user_config_file() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "taskstore")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

fn parse_env<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, StoreError> {
    raw.parse().map_err(|_| {
        StoreError::Configuration(format!("Invalid value for {key}: {raw:?}"))
    })
}
