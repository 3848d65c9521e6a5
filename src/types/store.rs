//! The versioned store document.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::entry::SessionEntry;

/// Schema version written into new store files and returned for missing,
/// corrupt, or migrated ones.
pub const CURRENT_STORE_VERSION: u32 = 4;

/// The whole persisted document: `{ "version": n, "sessions": { id: entry } }`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskStore {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
    #[serde(default)]
    pub sessions: BTreeMap<String, SessionEntry>,
}

impl TaskStore {
    /// Empty store at the current schema version.
    pub fn new() -> Self {
        Self {
            version: Some(CURRENT_STORE_VERSION),
            sessions: BTreeMap::new(),
        }
    }

    pub fn with_version(version: u32) -> Self {
        Self {
            version: Some(version),
            sessions: BTreeMap::new(),
        }
    }

    pub fn get(&self, id: &str) -> Option<&SessionEntry> {
        self.sessions.get(id)
    }

    pub fn insert(&mut self, id: impl Into<String>, entry: SessionEntry) -> Option<SessionEntry> {
        self.sessions.insert(id.into(), entry)
    }

    /// Mutable access to an entry, creating an empty one if absent.
    pub fn entry_mut(&mut self, id: impl Into<String>) -> &mut SessionEntry {
        self.sessions.entry(id.into()).or_default()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Only the given sessions, keeping this store's version.
    ///
    /// Useful for saves that should touch a subset of entries.
    pub fn subset<'a>(&self, ids: impl IntoIterator<Item = &'a str>) -> Self {
        let sessions = ids
            .into_iter()
            .filter_map(|id| self.sessions.get(id).map(|e| (id.to_string(), e.clone())))
            .collect();
        Self {
            version: self.version,
            sessions,
        }
    }
}
