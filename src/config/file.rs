//! TOML configuration file layer.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::StoreError;

use super::StoreConfig;

/// On-disk shape of `taskstore.toml`.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default)]
    pub paths: PathsSection,
    #[serde(default)]
    pub defaults: DefaultsSection,
    #[serde(default)]
    pub lock: LockSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PathsSection {
    pub tasks_file: Option<PathBuf>,
    pub legacy_sessions_file: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DefaultsSection {
    pub executor: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LockSection {
    pub max_attempts: Option<u32>,
    pub stale_after_secs: Option<u64>,
    pub min_backoff_ms: Option<u64>,
    pub max_backoff_ms: Option<u64>,
}

impl ConfigFile {
    /// Read a config file. Returns `None` if it does not exist.
    pub fn load(path: &Path) -> Result<Option<Self>, StoreError> {
        let raw = match fs::read_to_string(path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(StoreError::io("read config file", path, err)),
        };
        toml::from_str(&raw).map(Some).map_err(|err| {
            StoreError::Configuration(format!("Failed to parse {}: {err}", path.display()))
        })
    }

    /// Overlay every value present in this file onto `config`.
    pub fn apply(self, config: &mut StoreConfig) {
        if let Some(path) = self.paths.tasks_file {
            config.paths.tasks_file = Some(config.resolve(path));
        }
        if let Some(path) = self.paths.legacy_sessions_file {
            config.paths.legacy_sessions_file = Some(config.resolve(path));
        }
        if let Some(executor) = self.defaults.executor {
            config.defaults.executor = Some(executor);
        }
        if let Some(attempts) = self.lock.max_attempts {
            config.lock.max_attempts = attempts;
        }
        if let Some(secs) = self.lock.stale_after_secs {
            config.lock.stale_after = Duration::from_secs(secs);
        }
        if let Some(ms) = self.lock.min_backoff_ms {
            config.lock.min_backoff = Duration::from_millis(ms);
        }
        if let Some(ms) = self.lock.max_backoff_ms {
            config.lock.max_backoff = Duration::from_millis(ms);
        }
    }
}
