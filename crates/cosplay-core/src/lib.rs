//! Core library for the cosplay generator client.
//!
//! Owns the authenticated session: who is signed in, how many generation
//! credits they have, where that is persisted, and how it is reconciled with
//! the remote credit authority.

pub mod api;
pub mod auth;
pub mod config;
pub mod storage;

pub use api::{ApiError, CreditAuthority, CreditClient};
pub use auth::{Session, SessionState, SessionStore};
pub use config::Config;
pub use storage::{
    FileStorage, KeyringStorage, MemoryStorage, SessionRepository, Storage, StorageError,
    WriteReport,
};
