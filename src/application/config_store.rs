//! Configuration Store
//!
//! File-backed persistence for the configuration document. Writes replace
//! the whole file through a temp-file-and-rename so a crash mid-write never
//! leaves an unparseable document, and every read-modify-write is serialized
//! behind a single async lock.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::domain::{ConfigDocument, DocumentViolation};

/// Default dotfile location (tilde expanded at startup)
pub const DEFAULT_CONFIG_PATH: &str = "~/.bitvision.json";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Configuration not found at {0}")]
    NotFound(PathBuf),

    #[error("Configuration at {path} is corrupt: {reason}")]
    CorruptConfig { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(#[from] DocumentViolation),

    #[error("I/O failure on {path}: {reason}")]
    Io { path: PathBuf, reason: String },
}

impl StoreError {
    fn io(path: &Path, err: impl std::fmt::Display) -> Self {
        StoreError::Io {
            path: path.to_path_buf(),
            reason: err.to_string(),
        }
    }

    fn corrupt(path: &Path, err: impl std::fmt::Display) -> Self {
        StoreError::CorruptConfig {
            path: path.to_path_buf(),
            reason: err.to_string(),
        }
    }
}

/// Result of an atomic update
#[derive(Debug, Clone)]
pub struct UpdateOutcome<T> {
    /// Document as stored after the update
    pub document: ConfigDocument,
    /// Value returned by the mutator
    pub value: T,
    /// False when the mutation left the document unchanged and nothing was written
    pub written: bool,
}

#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    write_lock: Mutex<()>,
    writes: AtomicU64,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
            writes: AtomicU64::new(0),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of documents written or deleted through this store
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Read and parse the persisted document
    pub async fn load(&self) -> Result<ConfigDocument, StoreError> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StoreError::NotFound(self.path.clone()))
            }
            Err(e) if e.kind() == ErrorKind::InvalidData => {
                return Err(StoreError::corrupt(&self.path, e))
            }
            Err(e) => return Err(StoreError::io(&self.path, e)),
        };

        let document = ConfigDocument::from_json(&content)
            .map_err(|e| StoreError::corrupt(&self.path, e))?;
        document
            .validate_structure()
            .map_err(|e| StoreError::corrupt(&self.path, e))?;

        tracing::debug!("Configuration loaded from {}", self.path.display());
        Ok(document)
    }

    /// Load the document, falling back to defaults when none exists yet
    pub async fn load_or_default(&self) -> Result<ConfigDocument, StoreError> {
        match self.load().await {
            Ok(document) => Ok(document),
            Err(StoreError::NotFound(_)) => Ok(ConfigDocument::default()),
            Err(e) => Err(e),
        }
    }

    /// Replace the persisted document
    pub async fn save(&self, document: &ConfigDocument) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        document.validate_structure()?;
        self.write_document(document).await
    }

    /// Create the default document if none exists; returns true if created
    pub async fn ensure_exists(&self) -> Result<bool, StoreError> {
        let _guard = self.write_lock.lock().await;
        let exists = fs::try_exists(&self.path)
            .await
            .map_err(|e| StoreError::io(&self.path, e))?;
        if exists {
            return Ok(false);
        }

        tracing::info!("No configuration at {}, creating default", self.path.display());
        self.write_document(&ConfigDocument::default()).await?;
        Ok(true)
    }

    /// Read-modify-write at the current wall-clock time
    pub async fn update_atomic<T, E, F>(&self, mutator: F) -> Result<UpdateOutcome<T>, E>
    where
        F: FnOnce(&mut ConfigDocument) -> Result<T, E>,
        E: From<StoreError>,
    {
        self.update_atomic_at(Utc::now().timestamp(), mutator).await
    }

    /// Read-modify-write, validating the result as of `now`
    ///
    /// The mutator sees the current document (defaults when absent). If it
    /// errors, or the result breaks an invariant, nothing is written. A
    /// mutation that changes nothing is not written either.
    pub async fn update_atomic_at<T, E, F>(
        &self,
        now: i64,
        mutator: F,
    ) -> Result<UpdateOutcome<T>, E>
    where
        F: FnOnce(&mut ConfigDocument) -> Result<T, E>,
        E: From<StoreError>,
    {
        let _guard = self.write_lock.lock().await;

        let current = self.load_or_default().await?;
        let mut next = current.clone();
        let value = mutator(&mut next)?;

        if next == current {
            return Ok(UpdateOutcome {
                document: next,
                value,
                written: false,
            });
        }

        next.validate_transition(&current, now)
            .map_err(StoreError::from)?;
        self.write_document(&next).await?;

        Ok(UpdateOutcome {
            document: next,
            value,
            written: true,
        })
    }

    /// Delete the persisted document; deleting an absent document succeeds
    pub async fn clear(&self) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        match fs::remove_file(&self.path).await {
            Ok(()) => {
                self.writes.fetch_add(1, Ordering::SeqCst);
                tracing::info!("Configuration deleted: {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io(&self.path, e)),
        }
    }

    /// Write through a sibling temp file and rename over the target.
    /// Callers must hold `write_lock`.
    async fn write_document(&self, document: &ConfigDocument) -> Result<(), StoreError> {
        let json = document
            .to_json()
            .map_err(|e| StoreError::io(&self.path, e))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .await
                    .map_err(|e| StoreError::io(parent, e))?;
            }
        }

        let tmp = self.temp_path();
        if let Err(e) = write_and_sync(&tmp, json.as_bytes()).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(StoreError::io(&tmp, e));
        }
        if let Err(e) = fs::rename(&tmp, &self.path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(StoreError::io(&self.path, e));
        }

        self.writes.fetch_add(1, Ordering::SeqCst);
        tracing::debug!("Configuration written to {}", self.path.display());
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "config".to_string());
        self.path.with_file_name(format!(".{}.tmp", name))
    }
}

async fn write_and_sync(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AutotradeSettings, Credentials, TradeSide};
    use rust_decimal_macros::dec;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn store_in(dir: &Path) -> ConfigStore {
        ConfigStore::new(dir.join(".bitvision.json"))
    }

    #[tokio::test]
    async fn test_load_missing_is_not_found() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        assert!(matches!(store.load().await, Err(StoreError::NotFound(_))));
        assert_eq!(store.load_or_default().await.unwrap(), ConfigDocument::default());
    }

    #[tokio::test]
    async fn test_save_then_load_roundtrip() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());

        let doc = ConfigDocument {
            credentials: Credentials::new("k", "s", "p"),
            autotrade: AutotradeSettings::scheduled(dec!(0.5), TradeSide::Buy, 24, 1000),
        };
        store.save(&doc).await.unwrap();
        assert_eq!(store.load().await.unwrap(), doc);
    }

    #[tokio::test]
    async fn test_high_precision_amount_survives_reload() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());

        for amount in [dec!(0.1234567890123456789), dec!(79228162514264337593543950335)] {
            let doc = ConfigDocument {
                credentials: Credentials::new("k", "s", "p"),
                autotrade: AutotradeSettings::scheduled(amount, TradeSide::Sell, 1, 0),
            };
            store.save(&doc).await.unwrap();
            let loaded = store.load().await.unwrap();
            assert_eq!(loaded.autotrade.next_trade_amount.to_string(), amount.to_string());
        }
    }

    #[tokio::test]
    async fn test_save_of_loaded_document_is_stable() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        store.ensure_exists().await.unwrap();

        let before = std::fs::read_to_string(store.path()).unwrap();
        let loaded = store.load().await.unwrap();
        store.save(&loaded).await.unwrap();
        let after = std::fs::read_to_string(store.path()).unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_corrupt_file_reported() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        std::fs::write(store.path(), "{ invalid json }").unwrap();
        assert!(matches!(
            store.load().await,
            Err(StoreError::CorruptConfig { .. })
        ));
    }

    #[tokio::test]
    async fn test_schema_violation_reported_as_corrupt() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        std::fs::write(
            store.path(),
            r#"{"credentials": {"key": "", "secret": "", "passphrase": ""},
                "autotrade": {"enabled": true, "next-trade-timestamp-UTC": 0,
                "next-trade-amount": 0, "next-trade-side": ""}}"#,
        )
        .unwrap();
        assert!(matches!(
            store.load().await,
            Err(StoreError::CorruptConfig { .. })
        ));
    }

    #[tokio::test]
    async fn test_update_with_corrupt_file_leaves_it_alone() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        std::fs::write(store.path(), "not json").unwrap();

        let result = store
            .update_atomic_at::<_, StoreError, _>(0, |doc| {
                doc.credentials.key = "k".to_string();
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(StoreError::CorruptConfig { .. })));
        assert_eq!(std::fs::read_to_string(store.path()).unwrap(), "not json");
    }

    #[tokio::test]
    async fn test_ensure_exists_creates_once() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        assert!(store.ensure_exists().await.unwrap());
        assert!(!store.ensure_exists().await.unwrap());
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn test_update_creates_document_when_absent() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());

        let outcome = store
            .update_atomic_at::<_, StoreError, _>(0, |doc| {
                doc.credentials = Credentials::new("k", "s", "p");
                Ok(())
            })
            .await
            .unwrap();
        assert!(outcome.written);
        assert_eq!(store.load().await.unwrap().credentials.key, "k");
    }

    #[tokio::test]
    async fn test_unchanged_update_does_not_write() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());

        let outcome = store
            .update_atomic_at::<_, StoreError, _>(0, |_doc| Ok(()))
            .await
            .unwrap();
        assert!(!outcome.written);
        assert_eq!(store.write_count(), 0);
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn test_invalid_mutation_leaves_disk_unchanged() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        store.ensure_exists().await.unwrap();
        let before = std::fs::read_to_string(store.path()).unwrap();

        let result = store
            .update_atomic_at::<_, StoreError, _>(5000, |doc| {
                // schedule in the past
                doc.autotrade = AutotradeSettings::scheduled(dec!(1), TradeSide::Buy, 0, 10);
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(StoreError::ValidationFailed(_))));
        assert_eq!(std::fs::read_to_string(store.path()).unwrap(), before);
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn test_mutator_error_aborts_update() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());

        let result: Result<UpdateOutcome<()>, StoreError> = store
            .update_atomic_at(0, |doc| {
                doc.credentials.key = "half-applied".to_string();
                Err(StoreError::Io {
                    path: PathBuf::from("x"),
                    reason: "abort".to_string(),
                })
            })
            .await;
        assert!(result.is_err());
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn test_concurrent_updates_do_not_lose_writes() {
        let dir = tempdir().unwrap();
        let store = Arc::new(store_in(dir.path()));
        store.ensure_exists().await.unwrap();

        let mut tasks = Vec::new();
        for i in 0..20 {
            let store = Arc::clone(&store);
            tasks.push(tokio::spawn(async move {
                store
                    .update_atomic_at::<_, StoreError, _>(0, move |doc| {
                        doc.credentials.key.push_str(&format!("{},", i));
                        Ok(())
                    })
                    .await
                    .unwrap();
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let key = store.load().await.unwrap().credentials.key;
        assert_eq!(key.split(',').filter(|s| !s.is_empty()).count(), 20);
    }

    #[tokio::test]
    async fn test_clear_removes_document() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        store.ensure_exists().await.unwrap();

        store.clear().await.unwrap();
        assert!(matches!(store.load().await, Err(StoreError::NotFound(_))));
        // clearing again is fine
        store.clear().await.unwrap();
    }

    #[tokio::test]
    async fn test_no_temp_file_left_behind() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        store.ensure_exists().await.unwrap();

        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(entries, vec![".bitvision.json".to_string()]);
    }

    #[test]
    fn test_save_creates_parent_directories() {
        let dir = tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("nested").join("cfg.json"));
        tokio_test::block_on(store.save(&ConfigDocument::default())).unwrap();
        assert!(store.path().exists());
    }
}
