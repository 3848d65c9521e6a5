//! CLI command handlers.

use chrono::Utc;
use serde_json::Value;

use crate::error::{Result, StoreError};
use crate::store::TaskService;
use crate::types::{fields, SessionEntry, TaskStore};

/// Handle `taskstore list`.
pub async fn handle_list(service: &TaskService, json: bool) -> Result<()> {
    let store = service.load(None).await;
    if json {
        println!("{}", serde_json::to_string_pretty(&store)?);
        return Ok(());
    }
    if store.is_empty() {
        println!("No sessions.");
        return Ok(());
    }
    for (id, entry) in &store.sessions {
        println!(
            "{id}  {:<16} {:<12} {}",
            entry.agent().unwrap_or("-"),
            entry.status().unwrap_or("-"),
            entry.last_used().unwrap_or("-"),
        );
    }
    Ok(())
}

/// Handle `taskstore show <id>`.
pub async fn handle_show(service: &TaskService, id: &str) -> Result<()> {
    let store = service.load(None).await;
    let entry = store
        .get(id)
        .ok_or_else(|| StoreError::InvalidArgument(format!("Unknown session: {id}")))?;
    println!("{}", serde_json::to_string_pretty(entry)?);
    Ok(())
}

/// Handle `taskstore new`. Prints the new session id.
pub async fn handle_new(service: &TaskService, agent: &str, raw_fields: &[String]) -> Result<()> {
    let now = Utc::now().to_rfc3339();
    let mut entry = SessionEntry::for_agent(agent);
    for raw in raw_fields {
        let (key, value) = parse_field(raw)?;
        entry.set(key, value);
    }
    entry.set(fields::CREATED, now.clone());
    entry.set(fields::LAST_USED, now);

    let id = uuid::Uuid::new_v4().to_string();
    let mut incoming = TaskStore::default();
    incoming.insert(id.clone(), entry);
    service.save(&incoming).await?;
    println!("{id}");
    Ok(())
}

/// Handle `taskstore set <id> k=v...`.
///
/// Only the named fields (plus `lastUsed`) are sent, so concurrent updates to
/// other fields of the same session survive the merge.
pub async fn handle_set(service: &TaskService, id: &str, raw_fields: &[String]) -> Result<()> {
    let current = service.load(None).await;
    if current.get(id).is_none() {
        return Err(StoreError::InvalidArgument(format!("Unknown session: {id}")));
    }

    let mut patch = SessionEntry::new();
    for raw in raw_fields {
        let (key, value) = parse_field(raw)?;
        patch.set(key, value);
    }
    patch.set(fields::LAST_USED, Utc::now().to_rfc3339());

    let mut incoming = TaskStore::default();
    incoming.insert(id, patch);
    let merged = service.save(&incoming).await?.store;
    if let Some(entry) = merged.get(id) {
        println!("{}", serde_json::to_string_pretty(entry)?);
    }
    Ok(())
}

/// Handle `taskstore lock status`.
pub async fn handle_lock_status(service: &TaskService) -> Result<()> {
    let Some(status) = service.lock_status().await? else {
        println!("🔓 Not locked");
        return Ok(());
    };

    println!("🔒 Locked: {}", status.path.display());
    println!("   Age: {}s", status.age.as_secs());
    match &status.info {
        Some(info) => {
            let pid = info.pid.map(|p| p.to_string()).unwrap_or_else(|| "?".into());
            println!("   Holder: pid {pid} on {}", info.host.as_deref().unwrap_or("?"));
        }
        None => println!("   Holder: ⚠️  unreadable lock payload"),
    }
    let alive = match status.holder_alive {
        Some(true) => "alive",
        Some(false) => "not running",
        None => "unknown",
    };
    println!("   Process: {alive}");
    if status.reclaimable() {
        println!("   Stale: will be reclaimed by the next save");
    } else if status.stale {
        println!("   Stale: holder still alive; use `taskstore lock clear --force` if it is wedged");
    }
    Ok(())
}

/// Handle `taskstore lock clear`.
pub async fn handle_lock_clear(service: &TaskService, force: bool) -> Result<()> {
    if service.clear_lock(force).await? {
        println!("✅ Lock removed");
    } else if force {
        println!("Nothing to remove");
    } else {
        println!("Lock not removed (absent, fresh, or holder alive); pass --force to override");
    }
    Ok(())
}

/// Split `key=value`; the value is parsed as JSON, falling back to a string.
pub fn parse_field(raw: &str) -> Result<(String, Value)> {
    let (key, value) = raw.split_once('=').ok_or_else(|| {
        StoreError::InvalidArgument(format!("Expected key=value, got {raw:?}"))
    })?;
    let key = key.trim();
    if key.is_empty() {
        return Err(StoreError::InvalidArgument(format!(
            "Empty field name in {raw:?}"
        )));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}
