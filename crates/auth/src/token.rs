//! Token issuance and verification (HS256 JWTs).
//!
//! Access and refresh tokens are signed with distinct secrets. Expiry is checked
//! against the injected [`Clock`], not the wall clock, so `jsonwebtoken`'s own
//! `exp` check is disabled and
//! [`validate_claims_with_leeway`](crate::claims::validate_claims_with_leeway)
//! runs after the signature check. The configured leeway only covers an
//! `iat` slightly ahead of the verifier's clock.

use std::sync::Arc;

use chrono::{DateTime, SubsecRound, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use hse_core::{Clock, PrincipalId};

use crate::claims::{AccessClaims, Jti, RefreshClaims, TimeBounded, TokenValidationError, validate_claims_with_leeway};
use crate::config::{AuthConfig, ConfigError, SecretKind};
use crate::error::AuthError;
use crate::principal::Principal;

const ALGORITHM: Algorithm = Algorithm::HS256;

/// Which class of token (and therefore which secret) is meant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Why a token was not accepted.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TokenRejection {
    #[error("malformed token")]
    Malformed,

    #[error("bad signature")]
    BadSignature,

    #[error("token has expired")]
    Expired,

    #[error("token not yet valid")]
    NotYetValid,
}

impl From<TokenValidationError> for TokenRejection {
    fn from(value: TokenValidationError) -> Self {
        match value {
            TokenValidationError::Expired => TokenRejection::Expired,
            TokenValidationError::NotYetValid => TokenRejection::NotYetValid,
            TokenValidationError::InvalidTimeWindow => TokenRejection::Malformed,
        }
    }
}

impl From<jsonwebtoken::errors::Error> for TokenRejection {
    fn from(value: jsonwebtoken::errors::Error) -> Self {
        match value.kind() {
            ErrorKind::InvalidSignature => TokenRejection::BadSignature,
            ErrorKind::ExpiredSignature => TokenRejection::Expired,
            ErrorKind::ImmatureSignature => TokenRejection::NotYetValid,
            _ => TokenRejection::Malformed,
        }
    }
}

/// A refresh token together with its claims.
///
/// Only the issuer (at mint time) and the verifier (after a signature check)
/// construct this, so ledger operations never see claims from unverified input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedRefreshToken {
    token: String,
    claims: RefreshClaims,
}

impl SignedRefreshToken {
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn claims(&self) -> &RefreshClaims {
        &self.claims
    }

    pub fn jti(&self) -> &Jti {
        &self.claims.jti
    }

    pub fn principal_id(&self) -> PrincipalId {
        self.claims.sub
    }

    pub fn into_token(self) -> String {
        self.token
    }
}

/// Access + refresh tokens as handed to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Freshly minted pair, still carrying the refresh claims for the ledger.
#[derive(Debug, Clone)]
pub struct IssuedPair {
    pub access_token: String,
    pub refresh: SignedRefreshToken,
}

impl IssuedPair {
    pub fn into_pair(self) -> TokenPair {
        TokenPair {
            access_token: self.access_token,
            refresh_token: self.refresh.into_token(),
        }
    }
}

/// Claims of a verified token of either kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VerifiedClaims {
    Access(AccessClaims),
    Refresh(RefreshClaims),
}

struct KeyPair {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl KeyPair {
    fn from_secret(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }
}

/// Both signing keys, built once from validated configuration.
pub struct TokenKeys {
    access: KeyPair,
    refresh: KeyPair,
}

impl TokenKeys {
    pub fn from_config(config: &AuthConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            access: KeyPair::from_secret(config.secret(SecretKind::Access)?),
            refresh: KeyPair::from_secret(config.secret(SecretKind::Refresh)?),
        })
    }

    fn get(&self, kind: TokenKind) -> &KeyPair {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }
}

/// Mints signed access and refresh tokens.
#[derive(Clone)]
pub struct TokenIssuer {
    keys: Arc<TokenKeys>,
    issuer: String,
    access_ttl: chrono::Duration,
    refresh_ttl: chrono::Duration,
    clock: Arc<dyn Clock>,
}

impl TokenIssuer {
    pub fn new(config: &AuthConfig, keys: Arc<TokenKeys>, clock: Arc<dyn Clock>) -> Self {
        Self {
            keys,
            issuer: config.issuer.clone(),
            access_ttl: config.access_token_ttl(),
            refresh_ttl: config.refresh_token_ttl(),
            clock,
        }
    }

    /// JWT timestamps have second precision; truncate so claims survive a round trip.
    fn now(&self) -> DateTime<Utc> {
        self.clock.now().trunc_subsecs(0)
    }

    pub fn issue_access_token(&self, principal: &Principal) -> Result<String, AuthError> {
        let now = self.now();
        let claims = AccessClaims {
            sub: principal.id,
            role: principal.role,
            tenant_id: principal.tenant_id,
            iss: self.issuer.clone(),
            issued_at: now,
            expires_at: expiry(now, self.access_ttl)?,
        };
        self.sign(&claims, TokenKind::Access)
    }

    pub fn issue_refresh_token(&self, principal_id: PrincipalId) -> Result<SignedRefreshToken, AuthError> {
        let now = self.now();
        let claims = RefreshClaims {
            sub: principal_id,
            jti: Jti::generate(),
            iss: self.issuer.clone(),
            issued_at: now,
            expires_at: expiry(now, self.refresh_ttl)?,
        };
        let token = self.sign(&claims, TokenKind::Refresh)?;
        Ok(SignedRefreshToken { token, claims })
    }

    pub fn issue_token_pair(&self, principal: &Principal) -> Result<IssuedPair, AuthError> {
        Ok(IssuedPair {
            access_token: self.issue_access_token(principal)?,
            refresh: self.issue_refresh_token(principal.id)?,
        })
    }

    fn sign<C: Serialize>(&self, claims: &C, kind: TokenKind) -> Result<String, AuthError> {
        jsonwebtoken::encode(&Header::new(ALGORITHM), claims, &self.keys.get(kind).encoding)
            .map_err(|e| AuthError::Signing(e.to_string()))
    }
}

fn expiry(issued_at: DateTime<Utc>, ttl: chrono::Duration) -> Result<DateTime<Utc>, AuthError> {
    issued_at
        .checked_add_signed(ttl)
        .ok_or_else(|| AuthError::Signing("token expiry is out of range".to_string()))
}

/// Checks signature, issuer and validity window. Never consults the ledger.
#[derive(Clone)]
pub struct TokenVerifier {
    keys: Arc<TokenKeys>,
    issuer: String,
    leeway: chrono::Duration,
    clock: Arc<dyn Clock>,
}

impl TokenVerifier {
    pub fn new(config: &AuthConfig, keys: Arc<TokenKeys>, clock: Arc<dyn Clock>) -> Self {
        Self {
            keys,
            issuer: config.issuer.clone(),
            leeway: config.clock_skew_leeway(),
            clock,
        }
    }

    pub fn verify(&self, token: &str, kind: TokenKind) -> Result<VerifiedClaims, TokenRejection> {
        match kind {
            TokenKind::Access => self.verify_access(token).map(VerifiedClaims::Access),
            TokenKind::Refresh => self
                .verify_refresh(token)
                .map(|signed| VerifiedClaims::Refresh(signed.claims)),
        }
    }

    pub fn verify_access(&self, token: &str) -> Result<AccessClaims, TokenRejection> {
        let claims: AccessClaims = self.decode_signed(token, TokenKind::Access)?;
        validate_claims_with_leeway(&claims, self.clock.now(), self.leeway)?;
        Ok(claims)
    }

    pub fn verify_refresh(&self, token: &str) -> Result<SignedRefreshToken, TokenRejection> {
        let signed = self.verify_refresh_signature(token)?;
        validate_claims_with_leeway(&signed.claims, self.clock.now(), self.leeway)?;
        Ok(signed)
    }

    /// Signature and issuer check only; an expired token is still returned.
    ///
    /// Used for revocation, where removing an expired record is harmless.
    pub(crate) fn verify_refresh_signature(&self, token: &str) -> Result<SignedRefreshToken, TokenRejection> {
        let claims: RefreshClaims = self.decode_signed(token, TokenKind::Refresh)?;
        if claims.expires_at() <= claims.issued_at() {
            return Err(TokenRejection::Malformed);
        }
        Ok(SignedRefreshToken {
            token: token.to_string(),
            claims,
        })
    }

    fn decode_signed<C: DeserializeOwned>(&self, token: &str, kind: TokenKind) -> Result<C, TokenRejection> {
        let mut validation = Validation::new(ALGORITHM);
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["exp", "sub", "iss"]);
        validation.set_issuer(&[self.issuer.as_str()]);

        let data = jsonwebtoken::decode::<C>(token, &self.keys.get(kind).decoding, &validation)?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};
    use hse_core::{ManualClock, TenantId};

    use super::*;
    use crate::Role;

    const ACCESS: &str = "access-secret-access-secret-0123456789";
    const REFRESH: &str = "refresh-secret-refresh-secret-0123456789";

    fn fixture() -> (TokenIssuer, TokenVerifier, Arc<ManualClock>) {
        let config = AuthConfig::new(ACCESS, REFRESH);
        let keys = Arc::new(TokenKeys::from_config(&config).unwrap());
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 3, 1, 8, 30, 15).unwrap() + Duration::milliseconds(250),
        ));
        (
            TokenIssuer::new(&config, keys.clone(), clock.clone()),
            TokenVerifier::new(&config, keys, clock.clone()),
            clock,
        )
    }

    fn principal() -> Principal {
        Principal::new(
            PrincipalId::new(),
            "sm@acme.io",
            "Station Manager",
            Role::StationManager,
            Some(TenantId::new()),
            "unused",
        )
    }

    #[test]
    fn access_token_round_trips_claims() {
        let (issuer, verifier, clock) = fixture();
        let p = principal();

        let token = issuer.issue_access_token(&p).unwrap();
        let claims = verifier.verify_access(&token).unwrap();

        assert_eq!(claims.sub, p.id);
        assert_eq!(claims.role, Role::StationManager);
        assert_eq!(claims.tenant_id, p.tenant_id);
        assert_eq!(claims.issued_at, clock.now().trunc_subsecs(0));
        assert_eq!(claims.expires_at - claims.issued_at, Duration::hours(1));
    }

    #[test]
    fn refresh_token_round_trips_claims() {
        let (issuer, verifier, _) = fixture();
        let p = principal();

        let issued = issuer.issue_refresh_token(p.id).unwrap();
        let verified = verifier.verify_refresh(issued.token()).unwrap();

        assert_eq!(verified, issued);
        assert_eq!(verified.claims().expires_at - verified.claims().issued_at, Duration::days(7));
    }

    #[test]
    fn token_classes_do_not_cross_verify() {
        let (issuer, verifier, _) = fixture();
        let pair = issuer.issue_token_pair(&principal()).unwrap();

        assert_eq!(
            verifier.verify_refresh(&pair.access_token).unwrap_err(),
            TokenRejection::BadSignature
        );
        assert_eq!(
            verifier.verify_access(pair.refresh.token()).unwrap_err(),
            TokenRejection::BadSignature
        );
    }

    #[test]
    fn expiry_follows_the_injected_clock() {
        let (issuer, verifier, clock) = fixture();
        let token = issuer.issue_access_token(&principal()).unwrap();

        clock.advance(Duration::minutes(59));
        assert!(verifier.verify_access(&token).is_ok());

        clock.advance(Duration::minutes(1));
        assert_eq!(verifier.verify_access(&token).unwrap_err(), TokenRejection::Expired);
    }

    #[test]
    fn expired_refresh_token_still_passes_signature_only_check() {
        let (issuer, verifier, clock) = fixture();
        let issued = issuer.issue_refresh_token(PrincipalId::new()).unwrap();

        clock.advance(Duration::days(8));
        assert_eq!(verifier.verify_refresh(issued.token()).unwrap_err(), TokenRejection::Expired);
        assert_eq!(verifier.verify_refresh_signature(issued.token()).unwrap(), issued);
    }

    #[test]
    fn tampered_and_garbage_tokens_are_rejected() {
        let (issuer, verifier, _) = fixture();
        let token = issuer.issue_access_token(&principal()).unwrap();
        let other = issuer.issue_access_token(&principal()).unwrap();

        // Claims of one token under the signature of another.
        let (body, _) = token.rsplit_once('.').unwrap();
        let (_, signature) = other.rsplit_once('.').unwrap();
        let tampered = format!("{body}.{signature}");
        assert_eq!(verifier.verify_access(&tampered).unwrap_err(), TokenRejection::BadSignature);

        assert_eq!(verifier.verify_access("not.a.jwt").unwrap_err(), TokenRejection::Malformed);
        assert_eq!(verifier.verify_access("").unwrap_err(), TokenRejection::Malformed);
    }

    #[test]
    fn foreign_issuer_is_rejected() {
        let (_, verifier, clock) = fixture();
        let mut other = AuthConfig::new(ACCESS, REFRESH);
        other.issuer = "someone-else".to_string();
        let keys = Arc::new(TokenKeys::from_config(&other).unwrap());
        let foreign = TokenIssuer::new(&other, keys, clock);

        let token = foreign.issue_access_token(&principal()).unwrap();
        assert_eq!(verifier.verify_access(&token).unwrap_err(), TokenRejection::Malformed);
    }

    #[test]
    fn verify_by_kind_dispatches_to_the_right_secret() {
        let (issuer, verifier, _) = fixture();
        let pair = issuer.issue_token_pair(&principal()).unwrap();

        assert!(matches!(
            verifier.verify(&pair.access_token, TokenKind::Access),
            Ok(VerifiedClaims::Access(_))
        ));
        assert!(matches!(
            verifier.verify(pair.refresh.token(), TokenKind::Refresh),
            Ok(VerifiedClaims::Refresh(_))
        ));
    }
}
