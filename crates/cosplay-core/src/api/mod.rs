//! Remote credit authority client.
//!
//! This module provides the `CreditAuthority` trait and its HTTP
//! implementation `CreditClient`, which reads an account's credit balance
//! from `GET /v1/user/credits?email=<email>`.

pub mod client;
pub mod error;

pub use client::{CreditAuthority, CreditClient};
pub use error::ApiError;
