//! Session entry: an opaque record of fields for one agent run.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Well-known entry field names used by callers and the default loader.
pub mod fields {
    pub const AGENT: &str = "agent";
    pub const STATUS: &str = "status";
    pub const EXECUTOR: &str = "executor";
    pub const EXECUTOR_VARIANT: &str = "executorVariant";
    pub const MODE: &str = "mode";
    pub const PRESET: &str = "preset";
    pub const MODEL: &str = "model";
    pub const CREATED: &str = "created";
    pub const LAST_USED: &str = "lastUsed";
    pub const LAST_PROMPT: &str = "lastPrompt";
    pub const FORGE_URL: &str = "forgeUrl";
    pub const BACKGROUND: &str = "background";
    pub const SESSION_ID: &str = "sessionId";
}

/// A single session/task entry.
///
/// The store never interprets these fields; it only merges them key by key.
/// The accessors below are conveniences for callers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionEntry(Map<String, Value>);

impl SessionEntry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entry with only the `agent` field set.
    pub fn for_agent(agent: impl Into<String>) -> Self {
        Self::new().with(fields::AGENT, agent.into())
    }

    /// Builder-style field setter.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn agent(&self) -> Option<&str> {
        self.get_str(fields::AGENT)
    }

    pub fn status(&self) -> Option<&str> {
        self.get_str(fields::STATUS)
    }

    pub fn executor(&self) -> Option<&str> {
        self.get_str(fields::EXECUTOR)
    }

    pub fn last_used(&self) -> Option<&str> {
        self.get_str(fields::LAST_USED)
    }

    pub fn last_prompt(&self) -> Option<&str> {
        self.get_str(fields::LAST_PROMPT)
    }

    pub fn forge_url(&self) -> Option<&str> {
        self.get_str(fields::FORGE_URL)
    }

    pub fn background(&self) -> Option<bool> {
        self.0.get(fields::BACKGROUND).and_then(Value::as_bool)
    }

    /// Field-level overlay: every field of `other` overwrites the same field
    /// here; fields only present here are kept.
    pub fn overlay(&mut self, other: &SessionEntry) {
        for (key, value) in &other.0 {
            self.0.insert(key.clone(), value.clone());
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for SessionEntry {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for SessionEntry {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}
