//! Authentication state for the signed-in user.
//!
//! This module provides:
//! - `Session`: the signed-in user's identity and credit balance
//! - `SessionStore`: the observable, persisted source of truth for the session
//!
//! The store is constructed once at startup and handed to every consumer.

pub mod session;
pub mod store;

pub use session::{name_from_email, Session};
pub use store::{SessionState, SessionStore};
