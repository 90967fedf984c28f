//! Credential Manager
//!
//! Reads and replaces the credentials section of the configuration document
//! and answers whether trading is authorized.

use std::sync::Arc;

use super::config_store::{ConfigStore, StoreError};
use super::log_sink::LogSink;
use crate::domain::Credentials;

pub type CredentialError = StoreError;

/// Warning shown before credentials are cleared
pub const CLEAR_CREDENTIALS_WARNING: &str =
    "Clearing credentials deletes the whole configuration, including any scheduled autotrade.";

#[derive(Debug, Clone)]
pub struct CredentialManager {
    store: Arc<ConfigStore>,
    log: LogSink,
}

impl CredentialManager {
    pub fn new(store: Arc<ConfigStore>, log: LogSink) -> Self {
        Self { store, log }
    }

    /// Current credentials; empty when no configuration exists yet
    pub async fn get_credentials(&self) -> Result<Credentials, CredentialError> {
        match self.store.load().await {
            Ok(doc) => Ok(doc.credentials),
            Err(StoreError::NotFound(_)) => Ok(Credentials::default()),
            Err(e) => {
                self.log.error(format!("Failed to read credentials: {}", e));
                Err(e)
            }
        }
    }

    /// True iff key, secret and passphrase are all non-empty
    ///
    /// An unreadable configuration counts as not authorized.
    pub async fn has_valid_credentials(&self) -> bool {
        self.get_credentials()
            .await
            .map(|creds| creds.is_valid())
            .unwrap_or(false)
    }

    /// Replace the credentials section, leaving autotrade untouched
    pub async fn set_credentials(&self, new_creds: Credentials) -> Result<(), CredentialError> {
        self.log.info("Saving credentials.");
        let valid = new_creds.is_valid();

        let result = self
            .store
            .update_atomic::<_, StoreError, _>(move |doc| {
                doc.credentials = new_creds;
                Ok(())
            })
            .await;

        match result {
            Ok(_) => {
                if valid {
                    self.log.info("Login success.");
                } else {
                    self.log.warn("Credentials saved but incomplete; trading stays disabled.");
                }
                Ok(())
            }
            Err(e) => {
                self.log.error(format!("Failed to save credentials: {}", e));
                Err(e)
            }
        }
    }

    /// Delete the configuration document, autotrade schedule included
    pub async fn clear_credentials(&self) -> Result<(), CredentialError> {
        self.log.warn(CLEAR_CREDENTIALS_WARNING);
        match self.store.clear().await {
            Ok(()) => {
                self.log.info(format!("{} successfully deleted.", self.store.path().display()));
                Ok(())
            }
            Err(e) => {
                self.log.error(format!("Failed to clear credentials: {}", e));
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AutotradeSettings, ConfigDocument, TradeSide};
    use rust_decimal_macros::dec;
    use tempfile::tempdir;

    fn manager(dir: &std::path::Path) -> (CredentialManager, Arc<ConfigStore>, LogSink) {
        let store = Arc::new(ConfigStore::new(dir.join(".bitvision.json")));
        let log = LogSink::default();
        (CredentialManager::new(Arc::clone(&store), log.clone()), store, log)
    }

    #[tokio::test]
    async fn test_missing_config_yields_empty_credentials() {
        let dir = tempdir().unwrap();
        let (creds, _, _) = manager(dir.path());
        assert_eq!(creds.get_credentials().await.unwrap(), Credentials::default());
        assert!(!creds.has_valid_credentials().await);
    }

    #[tokio::test]
    async fn test_set_then_valid() {
        let dir = tempdir().unwrap();
        let (creds, _, log) = manager(dir.path());

        creds.set_credentials(Credentials::new("k", "s", "p")).await.unwrap();
        assert!(creds.has_valid_credentials().await);
        assert!(log.contains("Login success."));
    }

    #[tokio::test]
    async fn test_set_keeps_autotrade_section() {
        let dir = tempdir().unwrap();
        let (creds, store, _) = manager(dir.path());

        let schedule = AutotradeSettings::scheduled(dec!(1), TradeSide::Sell, 1, 0);
        store
            .save(&ConfigDocument {
                credentials: Credentials::default(),
                autotrade: schedule.clone(),
            })
            .await
            .unwrap();

        creds.set_credentials(Credentials::new("k", "s", "p")).await.unwrap();
        assert_eq!(store.load().await.unwrap().autotrade, schedule);
    }

    #[tokio::test]
    async fn test_incomplete_credentials_saved_but_invalid() {
        let dir = tempdir().unwrap();
        let (creds, _, log) = manager(dir.path());

        creds.set_credentials(Credentials::new("k", "", "p")).await.unwrap();
        assert!(!creds.has_valid_credentials().await);
        assert!(log.contains("incomplete"));
    }

    #[tokio::test]
    async fn test_corrupt_config_is_not_authorized() {
        let dir = tempdir().unwrap();
        let (creds, store, log) = manager(dir.path());
        std::fs::write(store.path(), "garbage").unwrap();

        assert!(creds.get_credentials().await.is_err());
        assert!(!creds.has_valid_credentials().await);
        assert!(log.contains("Failed to read credentials"));
    }

    #[tokio::test]
    async fn test_clear_removes_everything() {
        let dir = tempdir().unwrap();
        let (creds, store, log) = manager(dir.path());
        creds.set_credentials(Credentials::new("k", "s", "p")).await.unwrap();

        creds.clear_credentials().await.unwrap();
        assert!(matches!(store.load().await, Err(StoreError::NotFound(_))));
        assert!(!creds.has_valid_credentials().await);
        assert!(log.contains("scheduled autotrade"));
    }
}
