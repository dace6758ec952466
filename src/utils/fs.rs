use std::path::Path;

use tokio::fs;

use crate::error::Result;

/// Atomic publish: write to a temp sibling, sync, rename into place.
/// Every file another process may observe goes through this.
pub async fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, content).await?;

    let tmp_clone = tmp_path.clone();
    let sync_result = tokio::task::spawn_blocking(move || {
        std::fs::File::open(&tmp_clone).and_then(|file| file.sync_all())
    })
    .await;
    if let Ok(Err(e)) = sync_result {
        tracing::warn!(error = %e, "Failed to sync temp file to disk");
    }

    fs::rename(&tmp_path, path).await?;
    Ok(())
}

/// Seconds since the Unix epoch; used in worker directory and result file
/// names.
pub fn epoch_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_atomic_replaces_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        write_atomic(&path, "first").await.unwrap();
        write_atomic(&path, "second").await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "second");
        assert!(!path.with_extension("tmp").exists());
    }
}
