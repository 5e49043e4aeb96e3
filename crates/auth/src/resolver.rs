//! Role → permission resolution.
//!
//! The [`RoleTable`] is built once at startup and shared read-only (behind an
//! `Arc`) by every request; changing it requires a restart.

use std::collections::HashMap;
use std::sync::Arc;

use crate::authorize::Subject;
use crate::{Permission, PermissionSet, Role};

/// Static role → permission mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleTable {
    grants: HashMap<Role, PermissionSet>,
}

impl RoleTable {
    pub fn builder() -> RoleTableBuilder {
        RoleTableBuilder::default()
    }

    /// The platform's standard mapping. Total over [`Role::ALL`].
    pub fn standard() -> Self {
        use Permission::*;

        let read_all = [
            ViewStations,
            ViewAudits,
            ViewIncidents,
            ViewPermits,
            ViewContractors,
        ];

        Self::builder()
            .grant(
                Role::Admin,
                Permission::ALL.into_iter().filter(|p| *p != ManageTenants),
            )
            .grant(
                Role::ComplianceManager,
                read_all.into_iter().chain([
                    ManageStations,
                    ConductAudits,
                    ManageAudits,
                    ReportIncidents,
                    ManageIncidents,
                    ApprovePermits,
                    ManageContractors,
                    ViewAnalytics,
                ]),
            )
            .grant(
                Role::StationManager,
                read_all
                    .into_iter()
                    .chain([ReportIncidents, RequestPermits, ViewAnalytics]),
            )
            .grant(
                Role::Auditor,
                [
                    ViewStations,
                    ViewAudits,
                    ConductAudits,
                    ViewIncidents,
                    ReportIncidents,
                    ViewPermits,
                ],
            )
            .grant(
                Role::Contractor,
                [ViewStations, ViewPermits, RequestPermits, ReportIncidents],
            )
            .grant(Role::Viewer, read_all)
            .build()
    }

    pub fn permissions(&self, role: Role) -> Option<&PermissionSet> {
        self.grants.get(&role)
    }

    /// Every role has an entry (possibly empty).
    pub fn is_total(&self) -> bool {
        Role::ALL.iter().all(|r| self.grants.contains_key(r))
    }
}

#[derive(Debug, Default)]
pub struct RoleTableBuilder {
    grants: HashMap<Role, PermissionSet>,
}

impl RoleTableBuilder {
    /// Set (replace) the permissions of `role`.
    pub fn grant<I>(mut self, role: Role, permissions: I) -> Self
    where
        I: IntoIterator<Item = Permission>,
    {
        self.grants.insert(role, permissions.into_iter().collect());
        self
    }

    pub fn build(self) -> RoleTable {
        RoleTable { grants: self.grants }
    }
}

/// Answers "what may this subject do?".
#[derive(Debug, Clone)]
pub struct PermissionResolver {
    table: Arc<RoleTable>,
}

impl PermissionResolver {
    pub fn new(table: Arc<RoleTable>) -> Self {
        if !table.is_total() {
            tracing::warn!("role table is not total; unmapped roles resolve to no permissions");
        }
        Self { table }
    }

    pub fn table(&self) -> &RoleTable {
        &self.table
    }

    pub fn permissions_for(&self, subject: &Subject) -> PermissionSet {
        // The super-admin bypass precedes the table: narrowing the Admin entry
        // never affects platform administrators.
        if subject.is_super_admin() {
            return PermissionSet::all();
        }
        match self.table.permissions(subject.role) {
            Some(set) => set.clone(),
            None => PermissionSet::empty(),
        }
    }

    pub fn authorize(&self, subject: &Subject, permission: Permission) -> bool {
        self.permissions_for(subject).contains(permission)
    }
}
