//! Refresh-token ledger.
//!
//! A principal's live refresh tokens are kept as a bounded, insertion-ordered
//! history (oldest first). Ledger membership, not cryptographic validity, is
//! what makes a refresh token usable: a token evicted by the sliding window is
//! refused even though its signature still verifies.
//!
//! Rotation records the new token without revoking the presented one. The old
//! token stays honored until it slides out of the window, so two tabs that
//! refresh at the same time both succeed; the price is that a superseded token
//! remains replayable for up to `max_sessions` further rotations.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use hse_core::{Clock, ExpectedVersion, PrincipalId};

use crate::claims::Jti;
use crate::config::{AuthConfig, HistoryWriteMode};
use crate::error::AuthError;
use crate::principal::Principal;
use crate::store::{AccountStore, StoreError};
use crate::token::SignedRefreshToken;

pub const DEFAULT_MAX_SESSIONS: usize = 5;

/// Current on-disk format of [`TokenHistory::to_blob`].
pub const HISTORY_FORMAT_VERSION: u32 = 1;

/// One honored refresh token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshRecord {
    pub jti: Jti,
    /// Hex SHA-256 of the signed token; the token itself is never stored.
    pub token_hash: String,
    pub created_at: DateTime<Utc>,
}

impl RefreshRecord {
    pub fn for_token(token: &SignedRefreshToken, created_at: DateTime<Utc>) -> Self {
        Self {
            jti: token.jti().clone(),
            token_hash: hash_token(token.token()),
            created_at,
        }
    }

    fn matches(&self, token: &SignedRefreshToken) -> bool {
        &self.jti == token.jti() && self.token_hash == hash_token(token.token())
    }
}

fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HistoryBlobError {
    #[error("could not encode token history: {0}")]
    Encode(String),

    #[error("unsupported token history format version {0}")]
    UnsupportedVersion(u32),

    #[error("malformed token history: {0}")]
    Malformed(String),
}

#[derive(Serialize, Deserialize)]
struct HistoryEnvelope {
    version: u32,
    records: Vec<RefreshRecord>,
}

/// Ordered (oldest → newest) refresh-token history of one principal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenHistory {
    records: VecDeque<RefreshRecord>,
}

impl TokenHistory {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &RefreshRecord> {
        self.records.iter()
    }

    pub fn contains_jti(&self, jti: &Jti) -> bool {
        self.records.iter().any(|r| &r.jti == jti)
    }

    /// Whether this exact signed token is currently honored.
    pub fn contains(&self, token: &SignedRefreshToken) -> bool {
        self.records.iter().any(|r| r.matches(token))
    }

    /// Append `record` as the newest entry, then evict from the front until at
    /// most `capacity` remain. Returns the evicted records, oldest first.
    pub fn push_bounded(&mut self, record: RefreshRecord, capacity: usize) -> Vec<RefreshRecord> {
        self.records.push_back(record);
        let excess = self.records.len().saturating_sub(capacity);
        self.records.drain(..excess).collect()
    }

    /// Remove the record with `jti`. Absent is not an error.
    pub fn remove(&mut self, jti: &Jti) -> Option<RefreshRecord> {
        let idx = self.records.iter().position(|r| &r.jti == jti)?;
        self.records.remove(idx)
    }

    /// Drop every record; returns how many there were.
    pub fn clear(&mut self) -> usize {
        let n = self.records.len();
        self.records.clear();
        n
    }

    /// Drop records created before `cutoff`; returns how many were dropped.
    pub fn prune_created_before(&mut self, cutoff: DateTime<Utc>) -> usize {
        let before = self.records.len();
        self.records.retain(|r| r.created_at >= cutoff);
        before - self.records.len()
    }

    /// Versioned single-field encoding: `{"version":1,"records":[...]}`.
    pub fn to_blob(&self) -> Result<String, HistoryBlobError> {
        let envelope = HistoryEnvelope {
            version: HISTORY_FORMAT_VERSION,
            records: self.records.iter().cloned().collect(),
        };
        serde_json::to_string(&envelope).map_err(|e| HistoryBlobError::Encode(e.to_string()))
    }

    pub fn from_blob(blob: &str) -> Result<Self, HistoryBlobError> {
        let value: serde_json::Value =
            serde_json::from_str(blob).map_err(|e| HistoryBlobError::Malformed(e.to_string()))?;
        let version = value
            .get("version")
            .and_then(serde_json::Value::as_u64)
            .ok_or_else(|| HistoryBlobError::Malformed("missing version".to_string()))?;
        if version != u64::from(HISTORY_FORMAT_VERSION) {
            return Err(HistoryBlobError::UnsupportedVersion(
                u32::try_from(version).unwrap_or(u32::MAX),
            ));
        }
        let envelope: HistoryEnvelope =
            serde_json::from_value(value).map_err(|e| HistoryBlobError::Malformed(e.to_string()))?;
        Ok(Self {
            records: envelope.records.into(),
        })
    }
}

impl FromIterator<RefreshRecord> for TokenHistory {
    fn from_iter<I: IntoIterator<Item = RefreshRecord>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

/// Store-backed ledger operations.
///
/// Every mutation is a read-modify-write of the principal's whole history. In
/// [`HistoryWriteMode::CompareAndSwap`] the write carries the version that was
/// read and a concurrent writer surfaces as [`AuthError::Conflict`]; in
/// [`HistoryWriteMode::LastWriterWins`] the later write silently replaces the
/// earlier one, which can drop a concurrently recorded token.
#[derive(Clone)]
pub struct RefreshLedger {
    store: Arc<dyn AccountStore>,
    clock: Arc<dyn Clock>,
    capacity: usize,
    refresh_ttl: Duration,
    write_mode: HistoryWriteMode,
}

impl RefreshLedger {
    pub fn new(config: &AuthConfig, store: Arc<dyn AccountStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            capacity: config.max_sessions,
            refresh_ttl: config.refresh_token_ttl(),
            write_mode: config.history_write,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Record `token` as the newest entry of `principal`'s history and persist it.
    ///
    /// `principal` is the snapshot the caller read; its version guards the write.
    pub fn record(&self, principal: &Principal, token: &SignedRefreshToken) -> Result<TokenHistory, AuthError> {
        let now = self.clock.now();
        let mut history = principal.token_history.clone();

        let pruned = match now.checked_sub_signed(self.refresh_ttl) {
            Some(cutoff) => history.prune_created_before(cutoff),
            None => 0,
        };
        let evicted = history.push_bounded(RefreshRecord::for_token(token, now), self.capacity);
        for record in &evicted {
            tracing::debug!(principal_id = %principal.id, jti = %record.jti, "refresh token evicted from ledger");
        }

        self.save(principal.id, &history, self.write_mode.expected(principal.history_version))?;
        tracing::debug!(
            principal_id = %principal.id,
            jti = %token.jti(),
            sessions = history.len(),
            pruned,
            evicted = evicted.len(),
            "refresh token recorded"
        );
        Ok(history)
    }

    /// Whether `token` is still honored for `principal`.
    pub fn is_member(&self, principal: &Principal, token: &SignedRefreshToken) -> bool {
        token.principal_id() == principal.id && principal.token_history.contains(token)
    }

    /// Remove `token` from its principal's history. Idempotent; returns whether
    /// a record was removed.
    pub fn revoke(&self, principal_id: PrincipalId, token: &SignedRefreshToken) -> Result<bool, AuthError> {
        let principal = match self.store.load_principal_by_id(principal_id) {
            Ok(p) => p,
            Err(StoreError::NotFound) => return Ok(false),
            Err(e) => return Err(e.into()),
        };

        let mut history = principal.token_history.clone();
        if history.remove(token.jti()).is_none() {
            return Ok(false);
        }

        self.save(principal_id, &history, self.write_mode.expected(principal.history_version))?;
        tracing::info!(principal_id = %principal_id, jti = %token.jti(), "refresh token revoked");
        Ok(true)
    }

    /// Forget every refresh token of `principal_id`. Returns how many were live.
    ///
    /// Always writes unconditionally: a blanket revocation must not lose a race.
    pub fn revoke_all(&self, principal_id: PrincipalId) -> Result<usize, AuthError> {
        let principal = match self.store.load_principal_by_id(principal_id) {
            Ok(p) => p,
            Err(StoreError::NotFound) => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let revoked = principal.token_history.len();
        self.save(principal_id, &TokenHistory::default(), ExpectedVersion::Any)?;
        tracing::info!(principal_id = %principal_id, revoked, "all refresh tokens revoked");
        Ok(revoked)
    }

    fn save(&self, principal_id: PrincipalId, history: &TokenHistory, expected: ExpectedVersion) -> Result<u64, AuthError> {
        self.store
            .save_token_history(principal_id, history, expected)
            .map_err(|e| {
                if matches!(e, StoreError::Conflict(_)) {
                    tracing::warn!(principal_id = %principal_id, "token history write lost a concurrent update");
                }
                AuthError::from(e)
            })
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use proptest::prelude::*;

    use super::*;

    fn record(n: u32, created_at: DateTime<Utc>) -> RefreshRecord {
        RefreshRecord {
            jti: Jti::generate(),
            token_hash: format!("{n:064x}"),
            created_at,
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn sixth_record_evicts_the_oldest() {
        let mut history = TokenHistory::default();
        let records: Vec<_> = (0..6).map(|n| record(n, t0())).collect();

        for r in &records[..5] {
            assert!(history.push_bounded(r.clone(), 5).is_empty());
        }
        let evicted = history.push_bounded(records[5].clone(), 5);

        assert_eq!(evicted, vec![records[0].clone()]);
        assert_eq!(history.len(), 5);
        assert!(!history.contains_jti(&records[0].jti));
        let order: Vec<_> = history.iter().cloned().collect();
        assert_eq!(order, records[1..].to_vec());
    }

    #[test]
    fn remove_is_idempotent() {
        let mut history = TokenHistory::default();
        let r = record(1, t0());
        history.push_bounded(r.clone(), 5);

        assert_eq!(history.remove(&r.jti), Some(r.clone()));
        assert_eq!(history.remove(&r.jti), None);
        assert!(history.is_empty());
    }

    #[test]
    fn prune_drops_only_stale_records() {
        let mut history: TokenHistory = [
            record(1, t0() - Duration::days(8)),
            record(2, t0() - Duration::days(1)),
            record(3, t0()),
        ]
        .into_iter()
        .collect();

        assert_eq!(history.prune_created_before(t0() - Duration::days(7)), 1);
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn blob_round_trips_and_is_versioned() {
        let history: TokenHistory = (0..3).map(|n| record(n, t0())).collect();
        let blob = history.to_blob().unwrap();

        assert!(blob.starts_with("{\"version\":1,"));
        assert_eq!(TokenHistory::from_blob(&blob).unwrap(), history);
    }

    #[test]
    fn unknown_blob_versions_are_refused() {
        assert_eq!(
            TokenHistory::from_blob(r#"{"version":2,"records":[]}"#),
            Err(HistoryBlobError::UnsupportedVersion(2))
        );
        assert!(matches!(
            TokenHistory::from_blob(r#"[{"jti":"a"}]"#),
            Err(HistoryBlobError::Malformed(_))
        ));
        assert!(matches!(
            TokenHistory::from_blob("not json"),
            Err(HistoryBlobError::Malformed(_))
        ));
    }

    proptest! {
        #[test]
        fn window_keeps_the_newest_records_in_order(count in 0usize..40, capacity in 1usize..10) {
            let mut history = TokenHistory::default();
            let records: Vec<_> = (0..count as u32).map(|n| record(n, t0())).collect();
            let mut evicted = Vec::new();

            for r in &records {
                evicted.extend(history.push_bounded(r.clone(), capacity));
                prop_assert!(history.len() <= capacity);
            }

            let kept = count.min(capacity);
            let expected: Vec<_> = records[count - kept..].to_vec();
            let actual: Vec<_> = history.iter().cloned().collect();
            prop_assert_eq!(actual, expected);
            prop_assert_eq!(evicted, records[..count - kept].to_vec());
        }
    }
}
