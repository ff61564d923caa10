use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The signed-in user and their remaining generation credits.
///
/// Serialized as the JSON record stored under the `"user"` key.
/// `creditsSyncedAt` and `updatedAt` are optional so that records written
/// without them still load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Session {
    email: String,
    name: String,
    credits: u32,
    #[serde(
        rename = "creditsSyncedAt",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    credits_synced_at: Option<DateTime<Utc>>,
    #[serde(rename = "updatedAt", default, skip_serializing_if = "Option::is_none")]
    updated_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Create a session whose display name is the local-part of `email`.
    pub fn new(email: impl Into<String>, credits: u32) -> Self {
        let email = email.into();
        let name = name_from_email(&email).to_string();
        Self {
            email,
            name,
            credits,
            credits_synced_at: None,
            updated_at: None,
        }
    }

    /// Override the derived display name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Mark the credit balance as confirmed by the remote authority just now
    pub fn mark_synced(mut self) -> Self {
        self.credits_synced_at = Some(Utc::now());
        self
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn credits(&self) -> u32 {
        self.credits
    }

    pub fn credits_synced_at(&self) -> Option<DateTime<Utc>> {
        self.credits_synced_at
    }

    /// When this record was last written to storage
    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    /// Copy stamped with the current write time
    pub(crate) fn stamped(&self) -> Self {
        Self {
            updated_at: Some(Utc::now()),
            ..self.clone()
        }
    }

    /// Copy of this session with a new credit balance. The sync timestamp is
    /// kept: a local change does not count as remote confirmation.
    pub fn with_credits(&self, credits: u32) -> Self {
        Self {
            credits,
            ..self.clone()
        }
    }

    /// Copy of this session with a balance just confirmed by the remote authority
    pub fn reconciled(&self, credits: u32) -> Self {
        self.with_credits(credits).mark_synced()
    }

    /// Minutes since the last remote reconciliation, if there was one
    pub fn sync_age_minutes(&self) -> Option<i64> {
        self.credits_synced_at
            .map(|at| (Utc::now() - at).num_minutes())
    }

    /// Human-readable age of the credit balance ("5m ago", "never", ...)
    pub fn sync_age_display(&self) -> String {
        let minutes = match self.sync_age_minutes() {
            Some(m) => m,
            None => return "never".to_string(),
        };

        if minutes < 1 {
            // Also covers clock skew
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            let hours = minutes / 60;
            if minutes % 60 >= 30 {
                format!("{}h ago", hours + 1)
            } else {
                format!("{}h ago", hours)
            }
        } else {
            let days = minutes / 1440;
            if (minutes % 1440) / 60 >= 12 {
                format!("{}d ago", days + 1)
            } else {
                format!("{}d ago", days)
            }
        }
    }
}

/// Local-part of an email address, or the whole string if it has no `@`.
pub fn name_from_email(email: &str) -> &str {
    email.split('@').next().unwrap_or(email)
}
