use serde::Serialize;
use thiserror::Error;

use hse_core::{PrincipalId, TenantId};

use crate::claims::AccessClaims;
use crate::principal::Principal;
use crate::resolver::PermissionResolver;
use crate::{Permission, Role};

/// The parts of an identity that authorization decisions depend on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subject {
    pub principal_id: PrincipalId,
    pub role: Role,
    pub tenant_id: Option<TenantId>,
}

impl Subject {
    pub fn is_super_admin(&self) -> bool {
        self.role == Role::Admin && self.tenant_id.is_none()
    }
}

impl From<&Principal> for Subject {
    fn from(value: &Principal) -> Self {
        Self {
            principal_id: value.id,
            role: value.role,
            tenant_id: value.tenant_id,
        }
    }
}

impl From<&AccessClaims> for Subject {
    fn from(value: &AccessClaims) -> Self {
        Self {
            principal_id: value.sub,
            role: value.role,
            tenant_id: value.tenant_id,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("tenant mismatch")]
    TenantMismatch,

    #[error("forbidden: missing permission '{0}'")]
    Forbidden(String),
}

/// Authorize `subject` for `required`, optionally inside `target_tenant`.
///
/// A tenant-bound subject may only act in its own tenant. Platform subjects
/// (no tenant) may act in any tenant their permissions allow.
///
/// - No IO
/// - No panics
pub fn authorize(
    resolver: &PermissionResolver,
    subject: &Subject,
    required: Permission,
    target_tenant: Option<TenantId>,
) -> Result<(), AuthzError> {
    if let (Some(own), Some(target)) = (subject.tenant_id, target_tenant) {
        if own != target {
            return Err(AuthzError::TenantMismatch);
        }
    }

    if resolver.authorize(subject, required) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(required.as_str().to_string()))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Authorization Explanation (Audit Trail)
// ─────────────────────────────────────────────────────────────────────────────

/// Detailed explanation of an authorization decision, for audit logs.
#[derive(Debug, Clone, Serialize)]
pub struct AuthorizationExplanation {
    pub required_permission: String,
    pub granted: bool,
    pub reason: String,
    pub subject: SubjectState,
    pub denial_reason: Option<DenialReason>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubjectState {
    pub principal_id: PrincipalId,
    pub role: Role,
    pub tenant_id: Option<TenantId>,
    pub super_admin: bool,
    pub effective_permissions: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DenialReason {
    pub kind: DenialKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialKind {
    TenantMismatch,
    UnmappedRole,
    MissingPermission,
}

/// Explain why [`authorize`] would allow or deny `required`.
pub fn explain_authorization(
    resolver: &PermissionResolver,
    subject: &Subject,
    required: Permission,
    target_tenant: Option<TenantId>,
) -> AuthorizationExplanation {
    let effective = resolver.permissions_for(subject);
    let state = SubjectState {
        principal_id: subject.principal_id,
        role: subject.role,
        tenant_id: subject.tenant_id,
        super_admin: subject.is_super_admin(),
        effective_permissions: effective.iter().map(|p| p.as_str().to_string()).collect(),
    };

    let denial = match authorize(resolver, subject, required, target_tenant) {
        Ok(()) => None,
        Err(AuthzError::TenantMismatch) => Some(DenialReason {
            kind: DenialKind::TenantMismatch,
            message: format!(
                "principal belongs to tenant {} but the request targets tenant {}",
                subject.tenant_id.map(|t| t.to_string()).unwrap_or_default(),
                target_tenant.map(|t| t.to_string()).unwrap_or_default(),
            ),
        }),
        Err(AuthzError::Forbidden(_)) if resolver.table().permissions(subject.role).is_none() => {
            Some(DenialReason {
                kind: DenialKind::UnmappedRole,
                message: format!("role '{}' has no entry in the role table", subject.role),
            })
        }
        Err(AuthzError::Forbidden(_)) => Some(DenialReason {
            kind: DenialKind::MissingPermission,
            message: format!("role '{}' does not grant '{}'", subject.role, required),
        }),
    };

    let reason = match &denial {
        Some(d) => d.message.clone(),
        None if state.super_admin => "platform super-administrator holds every permission".to_string(),
        None => format!("role '{}' grants '{}'", subject.role, required),
    };

    AuthorizationExplanation {
        required_permission: required.as_str().to_string(),
        granted: denial.is_none(),
        reason,
        subject: state,
        denial_reason: denial,
    }
}
