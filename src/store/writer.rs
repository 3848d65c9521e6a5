//! Atomic document replacement: write `<file>.tmp`, sync, rename over `<file>`.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::io::AsyncWriteExt;

use crate::error::{Result, StoreError};

use super::lock::with_suffix;

/// Suffix of the transient file written before the rename.
pub const TEMP_SUFFIX: &str = ".tmp";

/// Path of the temp file used when replacing `target`.
pub fn temp_path_for(target: &Path) -> PathBuf {
    with_suffix(target, TEMP_SUFFIX)
}

/// Serialize `value` as pretty JSON and atomically replace `target` with it.
pub async fn write_json_atomic<T: Serialize>(target: &Path, value: &T) -> Result<()> {
    let data = serde_json::to_vec_pretty(value)?;
    atomic_write(target, &data).await
}

/// Atomically replace `target` with `data`.
///
/// Readers opening `target` concurrently see either the previous or the new
/// complete contents. The temp file lives beside the target so the rename
/// stays within one filesystem. Errors are passed through unretried.
pub async fn atomic_write(target: &Path, data: &[u8]) -> Result<()> {
    let temp_path = temp_path_for(target);

    let write_result = async {
        let mut temp_file = tokio::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)
            .await?;
        temp_file.write_all(data).await?;
        temp_file.flush().await?;
        temp_file.sync_all().await
    }
    .await;

    if let Err(err) = write_result {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(StoreError::io("write temp file", &temp_path, err));
    }

    if let Err(err) = tokio::fs::rename(&temp_path, target).await {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(StoreError::io("rename temp file over target", target, err));
    }

    tracing::trace!(target = %target.display(), bytes = data.len(), "atomic write complete");
    Ok(())
}
