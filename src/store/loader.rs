//! Store loading: parse the backing file into a [`TaskStore`], never failing.
//!
//! Missing files yield an empty store. Corrupt files yield an empty store
//! plus a warning. Legacy documents (v2, v3) are migrated to the current
//! schema in memory; nothing is written back by loading.

use std::path::Path;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::config::{LoadDefaults, StorePaths};
use crate::types::{fields, SessionEntry, TaskStore, CURRENT_STORE_VERSION};

use super::{emit_warning, WarningSink};

/// Source of store snapshots.
///
/// Implementations must be side-effect free and must not fail: problems are
/// reported through `on_warning` and a default store is returned instead.
#[async_trait]
pub trait StoreLoader: Send + Sync {
    async fn load(
        &self,
        paths: &StorePaths,
        defaults: &LoadDefaults,
        on_warning: Option<&WarningSink>,
    ) -> TaskStore;
}

/// Default loader for the JSON document format.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonStoreLoader;

#[async_trait]
impl StoreLoader for JsonStoreLoader {
    async fn load(
        &self,
        paths: &StorePaths,
        defaults: &LoadDefaults,
        on_warning: Option<&WarningSink>,
    ) -> TaskStore {
        let store = match resolve_read_path(paths).await {
            Some(path) => read_store(path, on_warning).await,
            None => TaskStore::new(),
        };
        apply_entry_defaults(store, defaults)
    }
}

/// Preferred file if it exists, else an existing legacy file.
async fn resolve_read_path(paths: &StorePaths) -> Option<&Path> {
    let preferred = paths.preferred_file();
    if let Some(path) = preferred {
        if exists(path).await {
            return Some(path);
        }
    }
    if let Some(legacy) = paths.legacy_sessions_file.as_deref() {
        if exists(legacy).await {
            tracing::debug!(path = %legacy.display(), "reading legacy sessions file");
            return Some(legacy);
        }
    }
    None
}

async fn exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

async fn read_store(path: &Path, on_warning: Option<&WarningSink>) -> TaskStore {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return TaskStore::new(),
        Err(err) => {
            emit_warning(
                on_warning,
                &format!("Could not read {}: {err}", path.display()),
            );
            return TaskStore::new();
        }
    };
    if raw.trim().is_empty() {
        return TaskStore::new();
    }
    match serde_json::from_str::<Value>(&raw) {
        Ok(value) => normalize_document(value, on_warning),
        Err(err) => {
            emit_warning(
                on_warning,
                &format!("Could not parse JSON from {}: {err}", path.display()),
            );
            TaskStore::new()
        }
    }
}

/// Map any parsed document onto the current schema.
pub fn normalize_document(value: Value, on_warning: Option<&WarningSink>) -> TaskStore {
    let Value::Object(mut doc) = value else {
        emit_warning(on_warning, "Store document is not a JSON object; starting empty");
        return TaskStore::new();
    };
    let Some(Value::Object(sessions)) = doc.remove("sessions") else {
        return TaskStore::new();
    };
    let version = doc
        .get("version")
        .and_then(Value::as_u64)
        .and_then(|v| u32::try_from(v).ok())
        .filter(|v| *v > 0);

    match version {
        Some(version) if version >= CURRENT_STORE_VERSION => TaskStore {
            version: Some(version),
            sessions: object_entries(sessions).collect(),
        },
        Some(version) => {
            let mut migrated = TaskStore::new();
            for (key, entry) in object_entries(sessions) {
                // v3 keyed entries by friendly name and kept the real id in `sessionId`.
                let id = match entry.get_str(fields::SESSION_ID) {
                    Some(id) if !id.is_empty() => id.to_string(),
                    _ => key,
                };
                migrated.insert(id, entry);
            }
            warn_migrated(on_warning, migrated.len(), &format!("v{version}"));
            migrated
        }
        None => {
            let mut migrated = TaskStore::new();
            migrated.sessions = object_entries(sessions).collect();
            warn_migrated(on_warning, migrated.len(), "v2");
            migrated
        }
    }
}

fn object_entries(
    sessions: Map<String, Value>,
) -> impl Iterator<Item = (String, SessionEntry)> {
    sessions.into_iter().filter_map(|(id, entry)| match entry {
        Value::Object(map) => Some((id, SessionEntry::from(map))),
        _ => None,
    })
}

fn warn_migrated(on_warning: Option<&WarningSink>, count: usize, from: &str) {
    emit_warning(
        on_warning,
        &format!(
            "Migrated {count} task(s) from {from} to v{CURRENT_STORE_VERSION}. \
             Tasks can be viewed/resumed/stopped using their IDs. \
             Some metadata (taskId/projectId) may be incomplete for migrated tasks."
        ),
    );
}

/// Fill `mode`/`preset` from each other and normalize `executor`.
pub fn apply_entry_defaults(mut store: TaskStore, defaults: &LoadDefaults) -> TaskStore {
    let default_executor = normalize_executor_key(defaults.executor_or_default())
        .unwrap_or_else(|| crate::config::DEFAULT_EXECUTOR.to_string());

    for entry in store.sessions.values_mut() {
        let mode = non_empty(entry, fields::MODE);
        let preset = non_empty(entry, fields::PRESET);
        if mode.is_none() {
            if let Some(preset) = preset.clone() {
                entry.set(fields::MODE, preset);
            }
        }
        if preset.is_none() {
            if let Some(mode) = mode {
                entry.set(fields::PRESET, mode);
            }
        }

        let executor = entry
            .executor()
            .and_then(normalize_executor_key)
            .unwrap_or_else(|| default_executor.clone());
        entry.set(fields::EXECUTOR, executor);
    }
    store
}

fn non_empty(entry: &SessionEntry, key: &str) -> Option<String> {
    entry
        .get_str(key)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Canonical executor key: trimmed, upper-case, `-` replaced by `_`.
pub fn normalize_executor_key(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.to_ascii_uppercase().replace('-', "_"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    fn collecting_sink() -> (WarningSink, Arc<Mutex<Vec<String>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = seen.clone();
        let sink: WarningSink = Arc::new(move |msg: &str| {
            sink_seen.lock().unwrap().push(msg.to_string());
        });
        (sink, seen)
    }

    #[test]
    fn current_documents_are_taken_as_is() {
        let (sink, seen) = collecting_sink();
        let store = normalize_document(
            json!({"version": 4, "sessions": {"a": {"agent": "x"}, "bad": 3}}),
            Some(&sink),
        );
        assert_eq!(store.version, Some(4));
        assert_eq!(store.len(), 1);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn newer_versions_are_preserved() {
        let store = normalize_document(json!({"version": 9, "sessions": {}}), None);
        assert_eq!(store.version, Some(9));
    }

    #[test]
    fn v3_entries_are_rekeyed_by_session_id() {
        let (sink, seen) = collecting_sink();
        let store = normalize_document(
            json!({
                "version": 3,
                "sessions": {
                    "friendly": {"agent": "plan", "sessionId": "attempt-1"},
                    "no-id": {"agent": "review"}
                }
            }),
            Some(&sink),
        );
        assert_eq!(store.version, Some(CURRENT_STORE_VERSION));
        assert_eq!(store.get("attempt-1").unwrap().agent(), Some("plan"));
        assert_eq!(store.get("no-id").unwrap().agent(), Some("review"));
        let warnings = seen.lock().unwrap();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].starts_with("Migrated 2 task(s) from v3 to v4"));
    }

    #[test]
    fn unversioned_documents_migrate_as_v2() {
        let (sink, seen) = collecting_sink();
        let store = normalize_document(json!({"sessions": {"a": {"agent": "x"}}}), Some(&sink));
        assert_eq!(store.version, Some(CURRENT_STORE_VERSION));
        assert_eq!(store.get("a").unwrap().agent(), Some("x"));
        assert!(seen.lock().unwrap()[0].contains("from v2"));
    }

    #[test]
    fn documents_without_sessions_become_empty() {
        let store = normalize_document(json!({"version": 4}), None);
        assert_eq!(store, TaskStore::new());
        let store = normalize_document(json!([1, 2]), None);
        assert_eq!(store, TaskStore::new());
    }

    #[test]
    fn entry_defaults_mirror_mode_and_preset_and_normalize_executor() {
        let mut store = TaskStore::new();
        store.insert("a", SessionEntry::new().with("preset", "careful"));
        store.insert("b", SessionEntry::new().with("mode", "fast").with("executor", " claude-code "));
        let store = apply_entry_defaults(store, &LoadDefaults::default());

        let a = store.get("a").unwrap();
        assert_eq!(a.get_str("mode"), Some("careful"));
        assert_eq!(a.executor(), Some("OPENCODE"));
        let b = store.get("b").unwrap();
        assert_eq!(b.get_str("preset"), Some("fast"));
        assert_eq!(b.executor(), Some("CLAUDE_CODE"));
    }

    #[test]
    fn configured_default_executor_is_used() {
        let mut store = TaskStore::new();
        store.insert("a", SessionEntry::for_agent("x"));
        let defaults = LoadDefaults {
            executor: Some("codex".to_string()),
        };
        let store = apply_entry_defaults(store, &defaults);
        assert_eq!(store.get("a").unwrap().executor(), Some("CODEX"));
    }

    #[tokio::test]
    async fn corrupt_file_falls_back_to_default_with_warning() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tasks.json");
        std::fs::write(&path, "{\"version\": 4, \"sessions\": {").unwrap();
        let (sink, seen) = collecting_sink();

        let store = JsonStoreLoader
            .load(&StorePaths::for_file(&path), &LoadDefaults::default(), Some(&sink))
            .await;

        assert_eq!(store, TaskStore::new());
        let warnings = seen.lock().unwrap();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].starts_with("Could not parse JSON from"));
    }

    #[tokio::test]
    async fn empty_and_missing_files_load_silently() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tasks.json");
        let (sink, seen) = collecting_sink();
        let paths = StorePaths::for_file(&path);

        let missing = JsonStoreLoader.load(&paths, &LoadDefaults::default(), Some(&sink)).await;
        std::fs::write(&path, "  \n").unwrap();
        let empty = JsonStoreLoader.load(&paths, &LoadDefaults::default(), Some(&sink)).await;

        assert_eq!(missing, TaskStore::new());
        assert_eq!(empty, TaskStore::new());
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn legacy_file_is_read_when_preferred_is_absent() {
        let dir = TempDir::new().unwrap();
        let legacy = dir.path().join("sessions.json");
        std::fs::write(
            &legacy,
            r#"{"version": 4, "sessions": {"old": {"agent": "legacy", "executor": "OPENCODE"}}}"#,
        )
        .unwrap();
        let paths = StorePaths {
            tasks_file: Some(dir.path().join("tasks.json")),
            sessions_file: None,
            legacy_sessions_file: Some(legacy),
        };

        let store = JsonStoreLoader.load(&paths, &LoadDefaults::default(), None).await;
        assert_eq!(store.get("old").unwrap().agent(), Some("legacy"));
    }
}
