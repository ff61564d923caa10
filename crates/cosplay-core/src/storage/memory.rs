use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::{Storage, StorageError, StorageResult};

/// In-process storage. Clones share the same map, so a clone kept by the
/// caller sees everything written through the store (useful for simulating
/// a restart in tests).
#[derive(Clone, Default)]
pub struct MemoryStorage {
    entries: Arc<Mutex<HashMap<String, String>>>,
    unavailable: Arc<AtomicBool>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// A medium on which every operation fails, like storage blocked by
    /// browser privacy settings.
    pub fn unavailable() -> Self {
        let storage = Self::default();
        storage.set_available(false);
        storage
    }

    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    /// Direct read, bypassing the availability switch
    pub fn peek(&self, key: &str) -> Option<String> {
        self.entries.lock().ok()?.get(key).cloned()
    }

    fn with_entries<T>(
        &self,
        f: impl FnOnce(&mut HashMap<String, String>) -> T,
    ) -> StorageResult<T> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("memory storage disabled".to_string()));
        }
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| StorageError::Unavailable("memory storage poisoned".to_string()))?;
        Ok(f(&mut entries))
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        self.with_entries(|entries| entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.with_entries(|entries| {
            entries.insert(key.to_string(), value.to_string());
        })
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.with_entries(|entries| {
            entries.remove(key);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_clones_share_entries() {
        let storage = MemoryStorage::new();
        let handle = storage.clone();

        storage.set("user", "value").await.unwrap();
        assert_eq!(handle.get("user").await.unwrap().as_deref(), Some("value"));

        handle.delete("user").await.unwrap();
        assert!(storage.get("user").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unavailable_fails_every_operation() {
        let storage = MemoryStorage::unavailable();
        assert!(matches!(
            storage.get("user").await,
            Err(StorageError::Unavailable(_))
        ));
        assert!(storage.set("user", "v").await.is_err());
        assert!(storage.delete("user").await.is_err());

        storage.set_available(true);
        storage.set("user", "v").await.unwrap();
        assert_eq!(storage.peek("user").as_deref(), Some("v"));
    }
}
