//! Application configuration management.
//!
//! Holds the credit authority URL and timeout, the credit default used when
//! the authority is unreachable at sign-in, and where the session is stored.
//!
//! Configuration is stored at `~/.config/cosplay-ai/config.json`.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Application name used for config/data directory paths and the keyring service
pub const APP_NAME: &str = "cosplay-ai";

/// Config file name
const CONFIG_FILE: &str = "config.json";

const DEFAULT_API_BASE_URL: &str = "https://api.cosplay.ai";

/// Short enough that a dead authority does not hold up sign-in or startup.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Credits granted when the authority cannot be reached at sign-in.
pub const DEFAULT_CREDITS: u32 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    pub default_credits: u32,
    pub storage_dir: Option<PathBuf>,
    pub keyring_service: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            default_credits: DEFAULT_CREDITS,
            storage_dir: None,
            keyring_service: APP_NAME.to_string(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            let config: Self = serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))?;
            config
                .validate()
                .with_context(|| format!("Invalid config file {}", path.display()))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Apply `COSPLAY_*` environment overrides on top of the file values
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(url) = lookup("COSPLAY_API_URL") {
            self.api_base_url = url;
        }
        if let Some(secs) = lookup("COSPLAY_REQUEST_TIMEOUT_SECS") {
            self.request_timeout_secs = secs
                .trim()
                .parse()
                .with_context(|| format!("Invalid COSPLAY_REQUEST_TIMEOUT_SECS: {}", secs))?;
        }
        if let Some(dir) = lookup("COSPLAY_DATA_DIR") {
            self.storage_dir = Some(PathBuf::from(dir));
        }
        self.validate()
    }

    /// Reject values that would make every request fail
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.request_timeout_secs > 0,
            "request_timeout_secs must be at least 1"
        );
        Ok(())
    }

    /// Timeout for credit fetches. A zero value set in code falls back to
    /// the default.
    pub fn request_timeout(&self) -> Duration {
        match self.request_timeout_secs {
            0 => Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            secs => Duration::from_secs(secs),
        }
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Directory holding the file-backed session record
    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.storage_dir {
            return Ok(dir.clone());
        }
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }
}
