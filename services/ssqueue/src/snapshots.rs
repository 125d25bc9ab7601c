//! On-disk snapshot files.
//!
//! # Purpose
//! Stores whole-registry snapshots as timestamp-named files in one directory
//! and restores from the newest one at startup.
//!
//! # Key invariants and assumptions
//! - File names sort lexicographically in creation order (`ssq-<20-digit
//!   unix nanos>.snap`), so the greatest name is the latest snapshot.
//! - Writes go to a dot-prefixed temporary file first; a dot sorts before
//!   `ssq-`, so a leftover temporary file is never picked as latest.
//! - A consumed snapshot is deleted after a successful restore.
use anyhow::{Context, Result};
use ssqueue_core::Registry;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

const SNAPSHOT_PREFIX: &str = "ssq-";
const SNAPSHOT_SUFFIX: &str = ".snap";

#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Read the lexicographically greatest regular file in the directory.
    pub async fn load_latest(&self) -> Result<Option<(String, Vec<u8>)>> {
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .with_context(|| format!("read snapshot dir {}", self.dir.display()))?;

        let mut latest: Option<String> = None;
        while let Some(entry) = entries
            .next_entry()
            .await
            .with_context(|| format!("list snapshot dir {}", self.dir.display()))?
        {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if latest.as_ref().is_none_or(|current| name > *current) {
                latest = Some(name);
            }
        }

        let Some(name) = latest else {
            return Ok(None);
        };
        let path = self.dir.join(&name);
        let data = tokio::fs::read(&path)
            .await
            .with_context(|| format!("read snapshot file {}", path.display()))?;
        Ok(Some((name, data)))
    }

    /// Write `data` under a fresh timestamped name and return that name.
    pub async fn save(&self, data: &[u8]) -> Result<String> {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .context("system clock before unix epoch")?
            .as_nanos();
        let name = format!("{SNAPSHOT_PREFIX}{nanos:020}{SNAPSHOT_SUFFIX}");
        let path = self.dir.join(&name);
        let tmp = self.dir.join(format!(".{name}.tmp"));
        tokio::fs::write(&tmp, data)
            .await
            .with_context(|| format!("write snapshot file {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .with_context(|| format!("rename snapshot file to {}", path.display()))?;
        Ok(name)
    }

    pub async fn remove(&self, name: &str) -> Result<()> {
        let path = self.dir.join(name);
        tokio::fs::remove_file(&path)
            .await
            .with_context(|| format!("remove snapshot file {}", path.display()))
    }
}

/// Load the latest snapshot into `registry` and delete the consumed file.
pub async fn restore(store: &SnapshotStore, registry: &Registry) -> Result<()> {
    let Some((name, data)) = store
        .load_latest()
        .await
        .context("loading last snapshot failed")?
    else {
        tracing::info!(dir = %store.dir().display(), "no snapshots found");
        return Ok(());
    };

    let topics = registry
        .import_all(&data)
        .with_context(|| format!("restoring from snapshot {name} failed"))?;

    if let Err(err) = store.remove(&name).await {
        tracing::warn!(snapshot = %name, error = %err, "removing snapshot file failed");
    }
    tracing::info!(snapshot = %name, topics, "restored from snapshot");
    Ok(())
}

/// Write the registry's pending items to a new snapshot file, if any.
pub async fn persist(store: &SnapshotStore, registry: &Registry) -> Result<()> {
    let Some(data) = registry.export_all().context("creating snapshot failed")? else {
        tracing::info!("no data to snapshot");
        return Ok(());
    };
    let name = store.save(&data).await.context("saving snapshot failed")?;
    tracing::info!(snapshot = %name, bytes = data.len(), "saved snapshot");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn ready_registry() -> Registry {
        let registry = Registry::new();
        registry.startup();
        registry
    }

    #[tokio::test]
    async fn load_latest_picks_greatest_name_and_skips_dirs() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("ssq-001.snap"), b"old").expect("write");
        std::fs::write(dir.path().join("ssq-002.snap"), b"new").expect("write");
        std::fs::create_dir(dir.path().join("zzz")).expect("mkdir");

        let store = SnapshotStore::new(dir.path());
        let (name, data) = store.load_latest().await.expect("load").expect("some");
        assert_eq!(name, "ssq-002.snap");
        assert_eq!(data, b"new");
    }

    #[tokio::test]
    async fn load_latest_on_empty_dir_is_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SnapshotStore::new(dir.path());
        assert!(store.load_latest().await.expect("load").is_none());
    }

    #[tokio::test]
    async fn load_latest_on_missing_dir_errors() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SnapshotStore::new(dir.path().join("missing"));
        let err = store.load_latest().await.expect_err("missing dir");
        assert!(err.to_string().contains("read snapshot dir"));
    }

    #[tokio::test]
    async fn saved_names_sort_in_creation_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SnapshotStore::new(dir.path());
        let first = store.save(b"1").await.expect("save");
        tokio::time::sleep(Duration::from_millis(2)).await;
        let second = store.save(b"2").await.expect("save");
        assert!(second > first);
        assert!(first.starts_with(SNAPSHOT_PREFIX) && first.ends_with(SNAPSHOT_SUFFIX));
        let (latest, data) = store.load_latest().await.expect("load").expect("some");
        assert_eq!(latest, second);
        assert_eq!(data, b"2");
    }

    #[tokio::test]
    async fn persist_then_restore_round_trips_and_consumes_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SnapshotStore::new(dir.path());

        let source = ready_registry();
        let id = source.send("orders", "payload-1", None, true).expect("send");
        persist(&store, &source).await.expect("persist");
        assert_eq!(std::fs::read_dir(dir.path()).expect("ls").count(), 1);

        let target = Registry::new();
        restore(&store, &target).await.expect("restore");
        assert_eq!(std::fs::read_dir(dir.path()).expect("ls").count(), 0);

        let item = target.resolve("orders").try_pop().expect("item");
        assert_eq!(item.id(), id);
        assert_eq!(item.data(), "payload-1");
    }

    #[tokio::test]
    async fn persist_with_nothing_pending_writes_no_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SnapshotStore::new(dir.path());
        let registry = ready_registry();
        registry.resolve("quiet");
        persist(&store, &registry).await.expect("persist");
        assert_eq!(std::fs::read_dir(dir.path()).expect("ls").count(), 0);
    }

    #[tokio::test]
    async fn malformed_snapshot_is_reported_and_kept() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("ssq-1.snap"), br#"{"orders":"oops"}"#).expect("write");
        let store = SnapshotStore::new(dir.path());
        let registry = Registry::new();

        let err = restore(&store, &registry).await.expect_err("malformed");
        let text = format!("{err:#}");
        assert!(text.contains("ssq-1.snap"));
        assert!(text.contains("orders"));
        assert!(dir.path().join("ssq-1.snap").exists());
        assert!(!registry.contains_topic("orders"));
    }
}
