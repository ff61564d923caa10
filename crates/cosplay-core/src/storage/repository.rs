//! Fallback chain over two storage media for the persisted session record.
//!
//! Writes and deletes go to both media; a failure on one never prevents the
//! other and is reported rather than raised. Every write is stamped, and
//! reads consult both media and keep the newest usable record, so a medium
//! that missed a write cannot resurrect stale data. A medium that fails,
//! is empty, or holds an unparseable record is skipped.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{Storage, StorageResult};
use crate::auth::Session;

/// Key under which the session record is stored on every medium
pub const SESSION_KEY: &str = "user";

/// What a medium holds under `SESSION_KEY`.
///
/// `SignedOut` is written in place of a deleted record when the other
/// medium failed to delete its copy.
#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum StoredRecord {
    Session(Session),
    SignedOut {
        #[serde(rename = "signedOutAt")]
        signed_out_at: DateTime<Utc>,
    },
}

impl StoredRecord {
    fn written_at(&self) -> Option<DateTime<Utc>> {
        match self {
            StoredRecord::Session(session) => session.updated_at(),
            StoredRecord::SignedOut { signed_out_at } => Some(*signed_out_at),
        }
    }
}

/// Outcome of a write or delete across both media
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteReport {
    pub succeeded: Vec<&'static str>,
    pub failed: Vec<&'static str>,
}

impl WriteReport {
    fn record(&mut self, medium: &'static str, result: &StorageResult<()>) {
        match result {
            Ok(()) => self.succeeded.push(medium),
            Err(_) => self.failed.push(medium),
        }
    }

    /// At least one medium holds the result
    pub fn is_durable(&self) -> bool {
        !self.succeeded.is_empty()
    }

    /// Every medium holds the result
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct SessionRepository {
    primary: Box<dyn Storage>,
    secondary: Box<dyn Storage>,
}

impl SessionRepository {
    pub fn new(
        primary: impl Storage + 'static,
        secondary: impl Storage + 'static,
    ) -> Self {
        Self {
            primary: Box::new(primary),
            secondary: Box::new(secondary),
        }
    }

    fn media(&self) -> [&dyn Storage; 2] {
        [self.primary.as_ref(), self.secondary.as_ref()]
    }

    async fn read(medium: &dyn Storage) -> Option<StoredRecord> {
        let raw = match medium.get(SESSION_KEY).await {
            Ok(Some(raw)) if !raw.trim().is_empty() => raw,
            Ok(_) => {
                debug!(medium = medium.name(), "No persisted session");
                return None;
            }
            Err(e) => {
                warn!(
                    medium = medium.name(),
                    error = %e,
                    "Failed to read persisted session"
                );
                return None;
            }
        };

        match serde_json::from_str::<StoredRecord>(&raw) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(
                    medium = medium.name(),
                    error = %e,
                    "Malformed persisted session record"
                );
                None
            }
        }
    }

    /// Load the persisted session, or `None` if no medium holds a usable record.
    ///
    /// The record with the latest write stamp wins; unstamped records are
    /// older than any stamped one, and ties go to the primary medium.
    pub async fn load(&self) -> Option<Session> {
        let (primary, secondary) = futures::join!(
            Self::read(self.primary.as_ref()),
            Self::read(self.secondary.as_ref())
        );

        let mut newest: Option<(&'static str, StoredRecord)> = None;
        for (medium, record) in self.media().into_iter().zip([primary, secondary]) {
            let Some(record) = record else { continue };
            let newer = match &newest {
                Some((_, best)) => record.written_at() > best.written_at(),
                None => true,
            };
            if newer {
                newest = Some((medium.name(), record));
            }
        }

        match newest? {
            (medium, StoredRecord::Session(session)) => {
                debug!(medium, email = session.email(), "Loaded persisted session");
                Some(session)
            }
            (medium, StoredRecord::SignedOut { signed_out_at }) => {
                debug!(medium, %signed_out_at, "Newest record is a sign-out");
                None
            }
        }
    }

    /// Write the session to both media.
    pub async fn save(&self, session: &Session) -> WriteReport {
        let mut report = WriteReport::default();
        let record = StoredRecord::Session(session.stamped());
        let contents = match serde_json::to_string(&record) {
            Ok(contents) => contents,
            Err(e) => {
                warn!(error = %e, "Failed to serialize session");
                report.failed = self.media().iter().map(|m| m.name()).collect();
                return report;
            }
        };

        let (primary, secondary) = futures::join!(
            self.primary.set(SESSION_KEY, &contents),
            self.secondary.set(SESSION_KEY, &contents)
        );
        self.finish("save", [primary, secondary], report)
    }

    /// Remove the session record from both media.
    ///
    /// If only one delete succeeds, that medium gets a sign-out marker so the
    /// copy left on the other medium is treated as outdated.
    pub async fn clear(&self) -> WriteReport {
        let (primary, secondary) = futures::join!(
            self.primary.delete(SESSION_KEY),
            self.secondary.delete(SESSION_KEY)
        );
        let deleted = [primary.is_ok(), secondary.is_ok()];
        let report = self.finish("clear", [primary, secondary], WriteReport::default());

        if deleted[0] != deleted[1] {
            self.mark_signed_out(deleted).await;
        }
        report
    }

    async fn mark_signed_out(&self, deleted: [bool; 2]) {
        let marker = StoredRecord::SignedOut {
            signed_out_at: Utc::now(),
        };
        let contents = match serde_json::to_string(&marker) {
            Ok(contents) => contents,
            Err(e) => {
                warn!(error = %e, "Failed to serialize sign-out marker");
                return;
            }
        };

        for (medium, deleted) in self.media().into_iter().zip(deleted) {
            if !deleted {
                continue;
            }
            if let Err(e) = medium.set(SESSION_KEY, &contents).await {
                warn!(
                    medium = medium.name(),
                    error = %e,
                    "Failed to write sign-out marker"
                );
            }
        }
    }

    fn finish(
        &self,
        operation: &'static str,
        results: [StorageResult<()>; 2],
        mut report: WriteReport,
    ) -> WriteReport {
        for (medium, result) in self.media().into_iter().zip(results) {
            if let Err(ref e) = result {
                warn!(
                    medium = medium.name(),
                    operation,
                    error = %e,
                    "Storage write failed"
                );
            }
            report.record(medium.name(), &result);
        }
        if !report.is_durable() {
            warn!(
                operation,
                "No storage medium accepted the session; change is in-memory only"
            );
        }
        report
    }
}
