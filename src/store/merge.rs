//! Merge of a caller's candidate store onto the freshest on-disk store.

use crate::types::{TaskStore, CURRENT_STORE_VERSION};

/// Merge `incoming` onto `base`.
///
/// - `version`: incoming if set, else base, else [`CURRENT_STORE_VERSION`].
/// - `sessions`: every base session is kept. Each session present in
///   `incoming` becomes base's fields overlaid with incoming's fields, so
///   fields only the base has survive and shared fields take incoming's value.
pub fn merge_stores(base: &TaskStore, incoming: &TaskStore) -> TaskStore {
    let mut merged = TaskStore {
        version: incoming
            .version
            .or(base.version)
            .or(Some(CURRENT_STORE_VERSION)),
        sessions: base.sessions.clone(),
    };

    for (id, entry) in &incoming.sessions {
        merged.sessions.entry(id.clone()).or_default().overlay(entry);
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SessionEntry;
    use pretty_assertions::assert_eq;

    #[test]
    fn disjoint_sessions_are_unioned() {
        let mut base = TaskStore::with_version(4);
        base.insert("s1", SessionEntry::for_agent("implementor"));
        let mut incoming = TaskStore::with_version(4);
        incoming.insert("s2", SessionEntry::for_agent("tests"));

        let merged = merge_stores(&base, &incoming);

        assert_eq!(merged.len(), 2);
        assert_eq!(merged.get("s1").unwrap().agent(), Some("implementor"));
        assert_eq!(merged.get("s2").unwrap().agent(), Some("tests"));
    }

    #[test]
    fn shared_session_merges_field_by_field() {
        let mut base = TaskStore::new();
        base.insert(
            "s1",
            SessionEntry::for_agent("implementor")
                .with("status", "running")
                .with("lastPrompt", "hello"),
        );
        let mut incoming = TaskStore::new();
        incoming.insert(
            "s1",
            SessionEntry::new()
                .with("status", "completed")
                .with("forgeUrl", "http://forge/1"),
        );

        let merged = merge_stores(&base, &incoming);

        let expected = SessionEntry::for_agent("implementor")
            .with("status", "completed")
            .with("lastPrompt", "hello")
            .with("forgeUrl", "http://forge/1");
        assert_eq!(merged.get("s1"), Some(&expected));
    }

    #[test]
    fn version_prefers_incoming_then_base_then_default() {
        let base = TaskStore::with_version(3);
        let incoming = TaskStore::with_version(7);
        assert_eq!(merge_stores(&base, &incoming).version, Some(7));
        assert_eq!(merge_stores(&base, &TaskStore::default()).version, Some(3));
        assert_eq!(
            merge_stores(&TaskStore::default(), &TaskStore::default()).version,
            Some(CURRENT_STORE_VERSION)
        );
    }

    #[test]
    fn sessions_absent_from_incoming_are_not_deleted() {
        let mut base = TaskStore::new();
        base.insert("keep", SessionEntry::for_agent("a"));
        let merged = merge_stores(&base, &TaskStore::new());
        assert!(merged.get("keep").is_some());
    }
}
