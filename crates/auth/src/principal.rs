use serde::{Deserialize, Serialize};

use hse_core::{PrincipalId, TenantId};

use crate::Role;
use crate::authorize::Subject;
use crate::ledger::TokenHistory;

/// A user account as loaded from the account store.
///
/// The session layer only ever writes `token_history` back; every other field
/// is owned by the account store.
#[derive(Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: PrincipalId,
    pub email: String,
    pub name: String,
    pub role: Role,
    /// `None` denotes a platform-wide principal (super-administrator when `role == Admin`).
    pub tenant_id: Option<TenantId>,
    pub region: Option<String>,
    pub secret_hash: String,
    pub email_verified: bool,
    pub token_history: TokenHistory,
    /// Store revision of `token_history`, used for compare-and-swap writes.
    pub history_version: u64,
}

impl Principal {
    pub fn new(
        id: PrincipalId,
        email: impl Into<String>,
        name: impl Into<String>,
        role: Role,
        tenant_id: Option<TenantId>,
        secret_hash: impl Into<String>,
    ) -> Self {
        Self {
            id,
            email: normalize_identifier(&email.into()),
            name: name.into().trim().to_string(),
            role,
            tenant_id,
            region: None,
            secret_hash: secret_hash.into(),
            email_verified: false,
            token_history: TokenHistory::default(),
            history_version: 0,
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn verified(mut self) -> Self {
        self.email_verified = true;
        self
    }

    pub fn is_super_admin(&self) -> bool {
        Subject::from(self).is_super_admin()
    }

    pub fn public_view(&self) -> PrincipalPublicView {
        PrincipalPublicView {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            role: self.role,
            tenant_id: self.tenant_id,
            region: self.region.clone(),
            email_verified: self.email_verified,
        }
    }
}

impl core::fmt::Debug for Principal {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Principal")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("role", &self.role)
            .field("tenant_id", &self.tenant_id)
            .field("email_verified", &self.email_verified)
            .field("secret_hash", &"<redacted>")
            .field("sessions", &self.token_history.len())
            .field("history_version", &self.history_version)
            .finish()
    }
}

/// What callers outside the auth boundary may see of a principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrincipalPublicView {
    pub id: PrincipalId,
    pub name: String,
    pub email: String,
    pub role: Role,
    #[serde(rename = "organizationId")]
    pub tenant_id: Option<TenantId>,
    pub region: Option<String>,
    #[serde(rename = "isEmailVerified")]
    pub email_verified: bool,
}

/// Login identifiers are emails; compare them trimmed and lowercased.
pub fn normalize_identifier(identifier: &str) -> String {
    identifier.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_normalizes_email() {
        let p = Principal::new(
            PrincipalId::new(),
            "  Alice@Example.COM ",
            "Alice",
            Role::Viewer,
            Some(TenantId::new()),
            "hash",
        );
        assert_eq!(p.email, "alice@example.com");
        assert!(!p.email_verified);
    }

    #[test]
    fn super_admin_requires_admin_role_and_no_tenant() {
        let platform_admin =
            Principal::new(PrincipalId::new(), "root@hse.io", "Root", Role::Admin, None, "h");
        let tenant_admin = Principal::new(
            PrincipalId::new(),
            "admin@acme.io",
            "Admin",
            Role::Admin,
            Some(TenantId::new()),
            "h",
        );
        let platform_viewer =
            Principal::new(PrincipalId::new(), "v@hse.io", "V", Role::Viewer, None, "h");

        assert!(platform_admin.is_super_admin());
        assert!(!tenant_admin.is_super_admin());
        assert!(!platform_viewer.is_super_admin());
    }

    #[test]
    fn public_view_and_debug_never_expose_secret_hash() {
        let p = Principal::new(
            PrincipalId::new(),
            "bob@example.com",
            "Bob",
            Role::Auditor,
            Some(TenantId::new()),
            "$2b$04$secret-material",
        )
        .with_region("north")
        .verified();

        let json = serde_json::to_string(&p.public_view()).unwrap();
        assert!(!json.contains("secret-material"));
        assert!(json.contains("\"isEmailVerified\":true"));
        assert!(json.contains("\"organizationId\""));
        assert!(!format!("{p:?}").contains("secret-material"));
    }
}
