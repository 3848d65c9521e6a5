//! Tests for layered store configuration.

use std::path::Path;
use std::sync::{Mutex, OnceLock};
use std::time::Duration;

use tempfile::TempDir;

use taskstore::config::{StoreConfig, WORKSPACE_CONFIG_FILE};
use taskstore::error::StoreError;
use taskstore::store::TaskService;
use taskstore::types::{SessionEntry, TaskStore};

static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

const CONFIG_ENV_VARS: [&str; 5] = [
    "TASKSTORE_FILE",
    "TASKSTORE_LEGACY_FILE",
    "TASKSTORE_DEFAULT_EXECUTOR",
    "TASKSTORE_LOCK_ATTEMPTS",
    "TASKSTORE_STALE_LOCK_SECS",
];

struct EnvGuard {
    saved: Vec<(String, Option<String>)>,
}

impl EnvGuard {
    fn capture(keys: &[&str]) -> Self {
        let saved = keys
            .iter()
            .map(|key| ((*key).to_string(), std::env::var(key).ok()))
            .collect();
        Self { saved }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, value) in &self.saved {
            match value {
                Some(v) => std::env::set_var(key, v),
                None => std::env::remove_var(key),
            }
        }
    }
}

fn env_lock_guard() -> std::sync::MutexGuard<'static, ()> {
    ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn clean_env() -> EnvGuard {
    let guard = EnvGuard::capture(&CONFIG_ENV_VARS);
    for key in CONFIG_ENV_VARS {
        std::env::remove_var(key);
    }
    guard
}

fn workspace_with_config(toml: &str) -> TempDir {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir_all(dir.path().join(".genie")).unwrap();
    std::fs::write(dir.path().join(WORKSPACE_CONFIG_FILE), toml).unwrap();
    dir
}

#[test]
fn from_workspace_uses_defaults_without_file_or_env() {
    let _env_lock = env_lock_guard();
    let _env_guard = clean_env();
    let dir = workspace_with_config("");

    let config = StoreConfig::from_workspace(dir.path()).unwrap();

    assert_eq!(
        config.paths.tasks_file.as_deref(),
        Some(dir.path().join(".genie/state/tasks.json").as_path())
    );
    assert_eq!(config.lock.max_attempts, 10);
    assert_eq!(config.lock.stale_after, Duration::from_secs(30));
}

#[test]
fn env_takes_precedence_over_config_file() {
    let _env_lock = env_lock_guard();
    let _env_guard = clean_env();
    let dir = workspace_with_config(
        "[paths]\ntasks_file = \"file.json\"\n\n[lock]\nmax_attempts = 4\nstale_after_secs = 60\n",
    );

    std::env::set_var("TASKSTORE_FILE", "env.json");
    std::env::set_var("TASKSTORE_LOCK_ATTEMPTS", "7");

    let config = StoreConfig::from_workspace(dir.path()).unwrap();

    assert_eq!(
        config.paths.tasks_file.as_deref(),
        Some(dir.path().join("env.json").as_path())
    );
    assert_eq!(config.lock.max_attempts, 7);
    // Untouched by env, so the file value stands.
    assert_eq!(config.lock.stale_after, Duration::from_secs(60));
}

#[test]
fn zero_lock_attempts_fail_validation() {
    let _env_lock = env_lock_guard();
    let _env_guard = clean_env();
    let dir = workspace_with_config("");

    std::env::set_var("TASKSTORE_LOCK_ATTEMPTS", "0");

    let err = StoreConfig::from_workspace(dir.path()).unwrap_err();
    assert!(matches!(err, StoreError::Configuration(_)));
}

#[test]
fn malformed_config_file_is_reported() {
    let _env_lock = env_lock_guard();
    let _env_guard = clean_env();
    let dir = workspace_with_config("[lock\nmax_attempts = ");

    let err = StoreConfig::from_workspace(dir.path()).unwrap_err();
    match err {
        StoreError::Configuration(message) => assert!(message.contains("taskstore.toml")),
        other => panic!("expected configuration error, got {other:?}"),
    }
}

#[tokio::test]
async fn configured_default_executor_is_applied_on_load() {
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("tasks.json");
    let config = StoreConfig::for_file(&target).with_default_executor("claude-code");
    let service = TaskService::new(config);

    let mut store = TaskStore::new();
    store.insert("s1", SessionEntry::for_agent("implementor"));
    service.save(&store).await.unwrap();

    let loaded = service.load(None).await;
    assert_eq!(loaded.get("s1").unwrap().executor(), Some("CLAUDE_CODE"));
}

#[tokio::test]
async fn legacy_sessions_carry_into_the_tasks_file_on_save() {
    let _env_lock = env_lock_guard();
    let _env_guard = clean_env();
    let dir = workspace_with_config("[paths]\nlegacy_sessions_file = \".genie/state/agents/sessions.json\"\n");
    let legacy = dir.path().join(".genie/state/agents/sessions.json");
    std::fs::create_dir_all(legacy.parent().unwrap()).unwrap();
    std::fs::write(
        &legacy,
        r#"{"version": 4, "sessions": {"old": {"agent": "legacy"}}}"#,
    )
    .unwrap();

    let service = TaskService::new(StoreConfig::from_workspace(dir.path()).unwrap());
    assert_eq!(
        service.target_file(),
        Some(dir.path().join(".genie/state/tasks.json").as_path())
    );

    let mut store = service.load(None).await;
    assert_eq!(store.get("old").unwrap().agent(), Some("legacy"));
    store.insert("new", SessionEntry::for_agent("fresh"));
    service.save(&store).await.unwrap();

    let raw: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(service.target_file().unwrap()).unwrap(),
    )
    .unwrap();
    assert_eq!(raw["sessions"]["old"]["agent"], "legacy");
    assert_eq!(raw["sessions"]["new"]["agent"], "fresh");
    assert!(Path::new(&legacy).exists());
}
