//! Persisted key/value storage for the session record.
//!
//! This module provides:
//! - `Storage`: the async get/set/delete seam every medium implements
//! - `FileStorage`: JSON files in the application data directory
//! - `KeyringStorage`: the OS credential store
//! - `MemoryStorage`: in-process map, used in tests and as a last resort
//! - `SessionRepository`: primary/secondary fallback chain for the `"user"` record

mod file;
mod keychain;
mod memory;
mod repository;

pub use file::FileStorage;
pub use keychain::KeyringStorage;
pub use memory::MemoryStorage;
pub use repository::{SessionRepository, WriteReport, SESSION_KEY};

use async_trait::async_trait;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage medium unavailable: {0}")]
    Unavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Keyring error: {0}")]
    Keyring(#[from] keyring::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// A durable key/value medium. Every call is independently fallible.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Read the value stored under `key`, `None` if nothing is stored
    async fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Store `value` under `key`, replacing any previous value
    async fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Remove `key`. Removing a missing key succeeds.
    async fn delete(&self, key: &str) -> StorageResult<()>;
}
