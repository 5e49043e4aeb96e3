//! Session façade: the operations the request layer calls.
//!
//! Control flow per operation:
//! - login:   credential check → issue pair → ledger record
//! - refresh: verify refresh token → ledger membership → issue pair → ledger record
//! - logout:  verify refresh token signature → ledger revoke
//! - authorize: verify access token → permission resolution

use std::sync::Arc;

use serde::Serialize;

use hse_core::{Clock, PrincipalId, TenantId};

use crate::authorize::{self, Subject};
use crate::claims::AccessClaims;
use crate::config::{AuthConfig, ConfigError};
use crate::credential::verify_secret;
use crate::error::AuthError;
use crate::ledger::RefreshLedger;
use crate::principal::PrincipalPublicView;
use crate::resolver::{PermissionResolver, RoleTable};
use crate::store::{AccountStore, StoreError};
use crate::token::{TokenIssuer, TokenKeys, TokenPair, TokenVerifier};
use crate::Permission;

/// Successful login response.
#[derive(Debug, Clone, Serialize)]
pub struct LoginOutcome {
    #[serde(flatten)]
    pub tokens: TokenPair,
    pub user: PrincipalPublicView,
}

/// Token lifecycle and RBAC entry point.
///
/// Holds no mutable state of its own; all session state lives in the
/// [`AccountStore`], so the service can be shared freely across threads.
#[derive(Clone)]
pub struct SessionService {
    config: AuthConfig,
    store: Arc<dyn AccountStore>,
    issuer: TokenIssuer,
    verifier: TokenVerifier,
    ledger: RefreshLedger,
    resolver: PermissionResolver,
}

impl SessionService {
    /// Fails fast when the configuration is unusable (e.g. a missing secret).
    pub fn new(
        config: AuthConfig,
        store: Arc<dyn AccountStore>,
        clock: Arc<dyn Clock>,
        roles: Arc<RoleTable>,
    ) -> Result<Self, ConfigError> {
        let keys = Arc::new(TokenKeys::from_config(&config)?);
        Ok(Self {
            issuer: TokenIssuer::new(&config, keys.clone(), clock.clone()),
            verifier: TokenVerifier::new(&config, keys, clock.clone()),
            ledger: RefreshLedger::new(&config, store.clone(), clock),
            resolver: PermissionResolver::new(roles),
            store,
            config,
        })
    }

    pub fn issuer(&self) -> &TokenIssuer {
        &self.issuer
    }

    pub fn verifier(&self) -> &TokenVerifier {
        &self.verifier
    }

    pub fn ledger(&self) -> &RefreshLedger {
        &self.ledger
    }

    pub fn resolver(&self) -> &PermissionResolver {
        &self.resolver
    }

    pub fn login(&self, identifier: &str, secret: &str) -> Result<LoginOutcome, AuthError> {
        let principal = match self.store.load_principal(identifier) {
            Ok(p) => p,
            Err(StoreError::NotFound) => {
                tracing::info!("login rejected: invalid credentials");
                return Err(AuthError::InvalidCredentials);
            }
            Err(e) => return Err(e.into()),
        };

        if !verify_secret(secret, &principal.secret_hash) {
            tracing::info!(principal_id = %principal.id, "login rejected: invalid credentials");
            return Err(AuthError::InvalidCredentials);
        }

        if self.config.require_verified_email && !principal.email_verified {
            tracing::info!(principal_id = %principal.id, "login rejected: email not verified");
            return Err(AuthError::EmailNotVerified);
        }

        let issued = self.issuer.issue_token_pair(&principal)?;
        self.ledger.record(&principal, &issued.refresh)?;

        tracing::info!(
            principal_id = %principal.id,
            role = %principal.role,
            jti = %issued.refresh.jti(),
            "login succeeded"
        );

        Ok(LoginOutcome {
            tokens: issued.into_pair(),
            user: principal.public_view(),
        })
    }

    /// Rotate: mint a new pair for a refresh token the ledger still honors.
    ///
    /// The presented token is deliberately left in the ledger.
    pub fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let presented = self.verifier.verify_refresh(refresh_token).map_err(|reason| {
            tracing::debug!(?reason, "refresh rejected: token failed verification");
            AuthError::TokenInvalid(reason)
        })?;

        let principal = match self.store.load_principal_by_id(presented.principal_id()) {
            Ok(p) => p,
            Err(StoreError::NotFound) => {
                tracing::warn!(principal_id = %presented.principal_id(), "refresh rejected: principal no longer exists");
                return Err(AuthError::TokenNotRecognized);
            }
            Err(e) => return Err(e.into()),
        };

        if !self.ledger.is_member(&principal, &presented) {
            tracing::warn!(
                principal_id = %principal.id,
                jti = %presented.jti(),
                "refresh rejected: token not in ledger (revoked, evicted or replayed)"
            );
            return Err(AuthError::TokenNotRecognized);
        }

        let issued = self.issuer.issue_token_pair(&principal)?;
        self.ledger.record(&principal, &issued.refresh)?;

        tracing::info!(
            principal_id = %principal.id,
            old_jti = %presented.jti(),
            new_jti = %issued.refresh.jti(),
            "refresh token rotated"
        );
        Ok(issued.into_pair())
    }

    /// Revoke one refresh token. A token that does not verify, belongs to
    /// someone else, or is already gone leaves nothing to revoke.
    pub fn logout(&self, principal_id: PrincipalId, refresh_token: &str) -> Result<(), AuthError> {
        let presented = match self.verifier.verify_refresh_signature(refresh_token) {
            Ok(t) => t,
            Err(reason) => {
                tracing::debug!(principal_id = %principal_id, ?reason, "logout: token failed verification");
                return Ok(());
            }
        };

        if presented.principal_id() != principal_id {
            tracing::warn!(principal_id = %principal_id, "logout: token belongs to another principal");
            return Ok(());
        }

        self.ledger.revoke(principal_id, &presented)?;
        Ok(())
    }

    pub fn logout_all(&self, principal_id: PrincipalId) -> Result<(), AuthError> {
        self.ledger.revoke_all(principal_id)?;
        Ok(())
    }

    /// Verify an access token and check one permission. Returns the verified
    /// claims on success.
    pub fn authorize(&self, access_token: &str, required: Permission) -> Result<AccessClaims, AuthError> {
        self.authorize_with_tenant(access_token, required, None)
    }

    /// Like [`authorize`](Self::authorize), additionally requiring a
    /// tenant-bound principal to act inside `tenant_id`.
    pub fn authorize_in_tenant(
        &self,
        access_token: &str,
        required: Permission,
        tenant_id: TenantId,
    ) -> Result<AccessClaims, AuthError> {
        self.authorize_with_tenant(access_token, required, Some(tenant_id))
    }

    fn authorize_with_tenant(
        &self,
        access_token: &str,
        required: Permission,
        tenant_id: Option<TenantId>,
    ) -> Result<AccessClaims, AuthError> {
        let claims = self.verifier.verify_access(access_token).map_err(|reason| {
            tracing::debug!(?reason, "access token rejected");
            AuthError::TokenInvalid(reason)
        })?;

        let subject = Subject::from(&claims);
        authorize::authorize(&self.resolver, &subject, required, tenant_id).map_err(|e| {
            tracing::info!(principal_id = %claims.sub, role = %claims.role, error = %e, "authorization denied");
            AuthError::Unauthorized(e)
        })?;

        Ok(claims)
    }

    /// Call after the account store has persisted a new secret hash.
    pub fn password_changed(&self, principal_id: PrincipalId) -> Result<(), AuthError> {
        if self.config.revoke_sessions_on_password_change {
            tracing::info!(principal_id = %principal_id, "password changed; revoking sessions");
            self.ledger.revoke_all(principal_id)?;
        }
        Ok(())
    }

    /// Call after the account store has persisted a new role or tenant.
    ///
    /// Outstanding access tokens keep their old claims until they expire.
    pub fn role_changed(&self, principal_id: PrincipalId) -> Result<(), AuthError> {
        if self.config.revoke_sessions_on_role_change {
            tracing::info!(principal_id = %principal_id, "role changed; revoking sessions");
            self.ledger.revoke_all(principal_id)?;
        }
        Ok(())
    }
}
