//! OS credential store medium (Keychain, Credential Manager, kernel keyutils).
//!
//! Keyring calls are blocking IPC, so each one runs on the blocking pool.
//! Every write is read back through a fresh entry: a backend that accepts
//! writes but cannot return them (such as keyring's mock store) reports
//! `Unavailable` instead of a false success.

use async_trait::async_trait;
use keyring::Entry;

use super::{Storage, StorageError, StorageResult};

pub struct KeyringStorage {
    service: String,
}

impl KeyringStorage {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    /// Run `f` with a fresh entry for `key` on the blocking pool
    async fn with_entry<T, F>(&self, key: &str, f: F) -> StorageResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&str, &str) -> StorageResult<T> + Send + 'static,
    {
        let service = self.service.clone();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || f(&service, &key))
            .await
            .map_err(|e| StorageError::Unavailable(format!("keyring task failed: {}", e)))?
    }
}

fn read(service: &str, key: &str) -> StorageResult<Option<String>> {
    match Entry::new(service, key)?.get_password() {
        Ok(value) => Ok(Some(value)),
        Err(keyring::Error::NoEntry) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl Storage for KeyringStorage {
    fn name(&self) -> &'static str {
        "keyring"
    }

    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        self.with_entry(key, read).await
    }

    async fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let value = value.to_string();
        self.with_entry(key, move |service, key| {
            Entry::new(service, key)?.set_password(&value)?;
            if read(service, key)?.as_deref() == Some(value.as_str()) {
                Ok(())
            } else {
                Err(StorageError::Unavailable(
                    "credential store did not retain the written value".to_string(),
                ))
            }
        })
        .await
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.with_entry(key, |service, key| {
            match Entry::new(service, key)?.delete_credential() {
                Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
                Err(e) => Err(e.into()),
            }
        })
        .await
    }
}
