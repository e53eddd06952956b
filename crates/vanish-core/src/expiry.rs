//! Expiry and consumption engine
//!
//! Decides whether a drop is still alive and performs cascading deletion when
//! it is not. Enforcement is lazy: every read path asks [`ExpiryEngine::check`]
//! before delivering. [`ExpiryEngine::sweep`] is the safety net that collects
//! drops, tokens and clearances nobody touched again.
//!
//! # Consumption intents
//!
//! Counters only move after a successful delivery, so what "used up" means
//! depends on what the caller is about to do:
//!
//! - [`Access::Scan`]: about to deliver content. An until-first-scan drop with
//!   one recorded scan is consumed.
//! - [`Access::Download`] and [`Access::Inspect`]: the first scan is the one
//!   that unlocked this viewer, so an until-first-scan drop is only consumed
//!   once a second scan has been recorded.
//!
//! - [`Access::Retrieve`]: opening a temporary URL. The download that issued
//!   it was already counted, so only the deadline applies.
//!
//! Scan and download ceilings are "count reached max" under every other
//! intent.

use serde::{Deserialize, Serialize};

use crate::{
    error::{DropError, StorageError},
    model::{DropRecord, ExpiryPolicy},
    storage::{DropStore, ObjectStore},
};

/// What the caller intends to do with a drop it is checking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// About to deliver content and count a scan
    Scan,
    /// About to issue download pointers and count a download
    Download,
    /// Read-only look (status checks, password verification, sweep)
    Inspect,
    /// Following a pointer issued by an already counted download; only the
    /// deadline applies
    Retrieve,
}

/// Why a drop stopped being retrievable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpiryReason {
    /// Wall-clock deadline passed
    DeadlinePassed,
    /// Until-first-scan drop was scanned
    FirstScanConsumed,
    /// Scan ceiling reached
    ScanLimitReached,
    /// Download ceiling reached
    DownloadLimitReached,
}

/// Whether `record` is expired at `now_ms` for the given intent.
///
/// Pure: looks at the record and the clock only.
pub fn expiry_reason(record: &DropRecord, now_ms: u64, access: Access) -> Option<ExpiryReason> {
    match record.expiry {
        ExpiryPolicy::At { expires_at_ms } if now_ms > expires_at_ms => {
            return Some(ExpiryReason::DeadlinePassed);
        },
        ExpiryPolicy::UntilFirstScan => {
            let consumed_at = match access {
                Access::Scan => 1,
                Access::Download | Access::Inspect => 2,
                Access::Retrieve => u64::MAX,
            };
            if record.scan_count >= consumed_at {
                return Some(ExpiryReason::FirstScanConsumed);
            }
        },
        ExpiryPolicy::At { .. } | ExpiryPolicy::Session => {},
    }

    if access == Access::Retrieve {
        return None;
    }

    if record.max_scans.is_some_and(|max| record.scan_count >= max) {
        return Some(ExpiryReason::ScanLimitReached);
    }
    if record.max_downloads.is_some_and(|max| record.download_count >= max) {
        return Some(ExpiryReason::DownloadLimitReached);
    }

    None
}

/// Totals from one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    /// Drops examined
    pub drops_checked: usize,
    /// Expired drops purged
    pub drops_purged: usize,
    /// Expired drops whose purge failed; retried next sweep
    pub purge_failures: usize,
    /// Expired tokens deleted
    pub tokens_removed: usize,
    /// Expired clearances deleted
    pub clearances_removed: usize,
    /// Expired tokens or clearances whose deletion failed; retried next sweep
    pub cleanup_failures: usize,
}

/// Enforces expiry and performs cascading deletion.
#[derive(Debug, Clone)]
pub struct ExpiryEngine<S, O> {
    store: S,
    objects: O,
}

impl<S: DropStore, O: ObjectStore> ExpiryEngine<S, O> {
    /// Engine over the given backends.
    pub fn new(store: S, objects: O) -> Self {
        Self { store, objects }
    }

    /// Lazy enforcement on an access path.
    ///
    /// Returns `Ok(())` if the drop is alive. Otherwise purges it and returns
    /// [`DropError::Expired`]. A purge that fails is logged and left to the
    /// sweep; the caller still sees `Expired`.
    pub fn check(&self, record: &DropRecord, now_ms: u64, access: Access) -> Result<(), DropError> {
        let Some(reason) = expiry_reason(record, now_ms, access) else {
            return Ok(());
        };

        let mut expired = record.clone();
        expired.expired_at_ms = Some(now_ms);
        if let Err(err) = self.purge(&expired, reason) {
            tracing::warn!(drop_id = %record.id, ?reason, error = %err, "purge of expired drop failed, leaving it to the sweep");
        }

        Err(DropError::Expired)
    }

    /// Cascading deletion: blobs first, then the record, then clearances.
    ///
    /// Blobs go first so a failure leaves the record in place for the next
    /// sweep to find. Idempotent: purging an already purged drop succeeds.
    pub fn purge(&self, record: &DropRecord, reason: ExpiryReason) -> Result<(), StorageError> {
        let keys = record.object_keys();
        if !keys.is_empty() {
            self.objects.delete(&keys)?;
        }

        let removed = self.store.delete_drop(record.id)?;

        if let Err(err) = self.store.delete_clearances(record.id) {
            tracing::warn!(drop_id = %record.id, error = %err, "failed to delete clearances");
        }

        if removed {
            tracing::info!(
                drop_id = %record.id,
                ?reason,
                objects = keys.len(),
                expired_at_ms = record.expired_at_ms,
                "drop purged"
            );
        }

        Ok(())
    }

    /// Delete a drop on request, with the same cascade as expiry.
    pub fn remove(&self, record: &DropRecord) -> Result<(), StorageError> {
        let keys = record.object_keys();
        if !keys.is_empty() {
            self.objects.delete(&keys)?;
        }
        if self.store.delete_drop(record.id)? {
            tracing::info!(drop_id = %record.id, objects = keys.len(), "drop deleted");
        }
        if let Err(err) = self.store.delete_clearances(record.id) {
            tracing::warn!(drop_id = %record.id, error = %err, "failed to delete clearances");
        }
        Ok(())
    }

    /// Periodic collection.
    ///
    /// Purges every drop that is expired for [`Access::Inspect`] and deletes
    /// expired tokens and clearances. A failing drop, token or clearance is
    /// counted and skipped; only failing to enumerate stops the sweep.
    pub fn sweep(&self, now_ms: u64) -> Result<SweepReport, StorageError> {
        let mut report = SweepReport::default();

        for id in self.store.list_drops()? {
            let record = match self.store.load_drop(id) {
                Ok(Some(record)) => record,
                Ok(None) => continue,
                Err(err) => {
                    tracing::warn!(drop_id = %id, error = %err, "sweep could not load drop");
                    report.purge_failures += 1;
                    continue;
                },
            };
            report.drops_checked += 1;

            let Some(reason) = expiry_reason(&record, now_ms, Access::Inspect) else {
                continue;
            };

            let mut expired = record;
            expired.expired_at_ms = Some(now_ms);
            match self.purge(&expired, reason) {
                Ok(()) => report.drops_purged += 1,
                Err(err) => {
                    tracing::warn!(drop_id = %id, error = %err, "sweep purge failed");
                    report.purge_failures += 1;
                },
            }
        }

        for token in self.store.list_tokens()? {
            if !token.is_expired(now_ms) {
                continue;
            }
            match self.store.delete_token(&token.token) {
                Ok(true) => report.tokens_removed += 1,
                Ok(false) => {},
                Err(err) => {
                    tracing::warn!(drop_id = %token.drop_id, error = %err, "sweep could not delete token");
                    report.cleanup_failures += 1;
                },
            }
        }

        for clearance in self.store.list_clearances()? {
            if !clearance.is_expired(now_ms) {
                continue;
            }
            match self.store.delete_clearance(clearance.drop_id, clearance.session) {
                Ok(true) => report.clearances_removed += 1,
                Ok(false) => {},
                Err(err) => {
                    tracing::warn!(drop_id = %clearance.drop_id, error = %err, "sweep could not delete clearance");
                    report.cleanup_failures += 1;
                },
            }
        }

        tracing::debug!(?report, "sweep finished");
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use vanish_crypto::{Envelope, KEY_SIZE, KeyMaterial};

    use super::*;
    use crate::model::{DropId, Payload, Protection};

    fn record(expiry: ExpiryPolicy) -> DropRecord {
        DropRecord {
            id: DropId::from_u128(1),
            owner: None,
            payload: Payload::Text {
                body: Envelope { iv: [0; 12], salt: [0; 16], ciphertext: vec![0; 16] },
            },
            protection: Protection::Standard { key: KeyMaterial::from_bytes([0; KEY_SIZE]) },
            expiry,
            max_scans: None,
            max_downloads: None,
            scan_count: 0,
            download_count: 0,
            password_hash: None,
            created_at_ms: 0,
            expired_at_ms: None,
        }
    }

    #[test]
    fn deadline_is_inclusive() {
        let r = record(ExpiryPolicy::At { expires_at_ms: 1_000 });

        assert_eq!(expiry_reason(&r, 1_000, Access::Scan), None);
        assert_eq!(expiry_reason(&r, 1_001, Access::Scan), Some(ExpiryReason::DeadlinePassed));
    }

    #[test]
    fn until_first_scan_depends_on_intent() {
        let mut r = record(ExpiryPolicy::UntilFirstScan);
        assert_eq!(expiry_reason(&r, 0, Access::Scan), None);

        r.scan_count = 1;
        assert_eq!(expiry_reason(&r, 0, Access::Scan), Some(ExpiryReason::FirstScanConsumed));
        assert_eq!(expiry_reason(&r, 0, Access::Download), None);
        assert_eq!(expiry_reason(&r, 0, Access::Inspect), None);

        r.scan_count = 2;
        assert_eq!(expiry_reason(&r, 0, Access::Inspect), Some(ExpiryReason::FirstScanConsumed));
    }

    #[test]
    fn ceilings_expire_when_reached() {
        let mut r = record(ExpiryPolicy::Session);
        r.max_scans = Some(3);
        r.scan_count = 2;
        assert_eq!(expiry_reason(&r, 0, Access::Scan), None);

        r.scan_count = 3;
        assert_eq!(expiry_reason(&r, 0, Access::Scan), Some(ExpiryReason::ScanLimitReached));

        let mut r = record(ExpiryPolicy::Session);
        r.max_downloads = Some(1);
        r.download_count = 1;
        assert_eq!(
            expiry_reason(&r, 0, Access::Download),
            Some(ExpiryReason::DownloadLimitReached)
        );
    }

    #[test]
    fn retrieve_only_honours_the_deadline() {
        let mut r = record(ExpiryPolicy::At { expires_at_ms: 1_000 });
        r.max_downloads = Some(1);
        r.download_count = 1;
        r.max_scans = Some(1);
        r.scan_count = 1;
        assert_eq!(expiry_reason(&r, 500, Access::Retrieve), None);
        assert_eq!(expiry_reason(&r, 1_001, Access::Retrieve), Some(ExpiryReason::DeadlinePassed));

        let mut r = record(ExpiryPolicy::UntilFirstScan);
        r.scan_count = 5;
        assert_eq!(expiry_reason(&r, 0, Access::Retrieve), None);
    }

    #[test]
    fn session_drop_without_ceilings_never_expires() {
        let mut r = record(ExpiryPolicy::Session);
        r.scan_count = u64::MAX;
        r.download_count = u64::MAX;

        assert_eq!(expiry_reason(&r, u64::MAX, Access::Scan), None);
    }
}
