//! Client for the remote credit authority.
//!
//! The authority owns the true credit balance for each account. This client
//! only reads it; local credit changes are never pushed back.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client};
use serde::Deserialize;
use tracing::debug;

use super::ApiError;
use crate::config::Config;

/// Path of the credit balance endpoint, relative to the API base URL
const CREDITS_PATH: &str = "/v1/user/credits";

#[derive(Debug, Deserialize)]
struct CreditsResponse {
    credits: i64,
}

/// Source of truth for an account's credit balance
#[async_trait]
pub trait CreditAuthority: Send + Sync {
    async fn fetch_credits(&self, email: &str) -> Result<u32, ApiError>;
}

/// HTTP credit authority.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct CreditClient {
    client: Client,
    base_url: String,
}

impl CreditClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, ApiError> {
        Self::new(&config.api_base_url, config.request_timeout())
    }

    fn credits_url(&self) -> String {
        format!("{}{}", self.base_url, CREDITS_PATH)
    }

    fn parse_credits(body: &str) -> Result<u32, ApiError> {
        let parsed: CreditsResponse = serde_json::from_str(body)
            .map_err(|e| ApiError::InvalidResponse(format!("credits body: {}", e)))?;
        u32::try_from(parsed.credits).map_err(|_| {
            ApiError::InvalidResponse(format!("credits out of range: {}", parsed.credits))
        })
    }
}

#[async_trait]
impl CreditAuthority for CreditClient {
    async fn fetch_credits(&self, email: &str) -> Result<u32, ApiError> {
        let url = self.credits_url();

        let response = self
            .client
            .get(&url)
            .query(&[("email", email)])
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(ApiError::from_request)?;

        let status = response.status();
        let body = response.text().await.map_err(ApiError::from_request)?;
        if !status.is_success() {
            return Err(ApiError::from_status(status, &body));
        }

        let credits = Self::parse_credits(&body)?;
        debug!(email, credits, "Fetched remote credit balance");
        Ok(credits)
    }
}
