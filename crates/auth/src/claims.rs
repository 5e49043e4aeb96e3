use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use hse_core::{PrincipalId, TenantId};

use crate::Role;

/// Random bytes behind every refresh-token identifier.
pub const JTI_BYTES: usize = 16;

/// Claims carried by a signed access token.
///
/// Never persisted; only trusted after the token has been verified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject / principal identifier.
    pub sub: PrincipalId,

    pub role: Role,

    /// Tenant context for the token (`None` for platform principals).
    pub tenant_id: Option<TenantId>,

    pub iss: String,

    #[serde(rename = "iat", with = "chrono::serde::ts_seconds")]
    pub issued_at: DateTime<Utc>,

    #[serde(rename = "exp", with = "chrono::serde::ts_seconds")]
    pub expires_at: DateTime<Utc>,
}

/// Claims carried by a signed refresh token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub sub: PrincipalId,

    /// Ledger key of this token.
    pub jti: Jti,

    pub iss: String,

    #[serde(rename = "iat", with = "chrono::serde::ts_seconds")]
    pub issued_at: DateTime<Utc>,

    #[serde(rename = "exp", with = "chrono::serde::ts_seconds")]
    pub expires_at: DateTime<Utc>,
}

/// Unique identifier of a refresh token (hex-encoded, 128 random bits).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Jti(String);

impl Jti {
    /// Draw a fresh identifier from the thread-local CSPRNG.
    pub fn generate() -> Self {
        let mut bytes = [0u8; JTI_BYTES];
        rand::rng().fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Jti {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Claims with a validity window.
pub trait TimeBounded {
    fn issued_at(&self) -> DateTime<Utc>;
    fn expires_at(&self) -> DateTime<Utc>;
}

impl TimeBounded for AccessClaims {
    fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }
}

impl TimeBounded for RefreshClaims {
    fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (issued_at is in the future)")]
    NotYetValid,

    #[error("invalid token time window (expires_at <= issued_at)")]
    InvalidTimeWindow,
}

/// Deterministically validate a claim window against `now`.
///
/// Signature verification happens before this, in [`TokenVerifier`](crate::TokenVerifier).
pub fn validate_claims<C: TimeBounded>(claims: &C, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
    validate_claims_with_leeway(claims, now, Duration::zero())
}

/// Like [`validate_claims`], but accepts an `issued_at` up to `leeway` ahead
/// of `now`. Expiry is never extended.
pub fn validate_claims_with_leeway<C: TimeBounded>(
    claims: &C,
    now: DateTime<Utc>,
    leeway: Duration,
) -> Result<(), TokenValidationError> {
    if claims.expires_at() <= claims.issued_at() {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    let latest_issue = now.checked_add_signed(leeway).unwrap_or(DateTime::<Utc>::MAX_UTC);
    if latest_issue < claims.issued_at() {
        return Err(TokenValidationError::NotYetValid);
    }
    if now >= claims.expires_at() {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}
