use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Permission identifier.
///
/// Serialized as dotted `resource.action` names (e.g. `"incidents.report"`).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Permission {
    #[serde(rename = "stations.read")]
    ViewStations,
    #[serde(rename = "stations.write")]
    ManageStations,
    #[serde(rename = "audits.read")]
    ViewAudits,
    #[serde(rename = "audits.conduct")]
    ConductAudits,
    #[serde(rename = "audits.write")]
    ManageAudits,
    #[serde(rename = "incidents.read")]
    ViewIncidents,
    #[serde(rename = "incidents.report")]
    ReportIncidents,
    #[serde(rename = "incidents.write")]
    ManageIncidents,
    #[serde(rename = "permits.read")]
    ViewPermits,
    #[serde(rename = "permits.request")]
    RequestPermits,
    #[serde(rename = "permits.approve")]
    ApprovePermits,
    #[serde(rename = "contractors.read")]
    ViewContractors,
    #[serde(rename = "contractors.write")]
    ManageContractors,
    #[serde(rename = "analytics.read")]
    ViewAnalytics,
    #[serde(rename = "users.write")]
    ManageUsers,
    #[serde(rename = "organization.write")]
    ManageOrganization,
    /// Platform-level tenant administration. Only the super-administrator holds it.
    #[serde(rename = "platform.tenants.write")]
    ManageTenants,
}

impl Permission {
    pub const ALL: [Permission; 17] = [
        Permission::ViewStations,
        Permission::ManageStations,
        Permission::ViewAudits,
        Permission::ConductAudits,
        Permission::ManageAudits,
        Permission::ViewIncidents,
        Permission::ReportIncidents,
        Permission::ManageIncidents,
        Permission::ViewPermits,
        Permission::RequestPermits,
        Permission::ApprovePermits,
        Permission::ViewContractors,
        Permission::ManageContractors,
        Permission::ViewAnalytics,
        Permission::ManageUsers,
        Permission::ManageOrganization,
        Permission::ManageTenants,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::ViewStations => "stations.read",
            Permission::ManageStations => "stations.write",
            Permission::ViewAudits => "audits.read",
            Permission::ConductAudits => "audits.conduct",
            Permission::ManageAudits => "audits.write",
            Permission::ViewIncidents => "incidents.read",
            Permission::ReportIncidents => "incidents.report",
            Permission::ManageIncidents => "incidents.write",
            Permission::ViewPermits => "permits.read",
            Permission::RequestPermits => "permits.request",
            Permission::ApprovePermits => "permits.approve",
            Permission::ViewContractors => "contractors.read",
            Permission::ManageContractors => "contractors.write",
            Permission::ViewAnalytics => "analytics.read",
            Permission::ManageUsers => "users.write",
            Permission::ManageOrganization => "organization.write",
            Permission::ManageTenants => "platform.tenants.write",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Permission::ALL.into_iter().find(|p| p.as_str() == name)
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An ordered set of permissions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet(BTreeSet<Permission>);

impl PermissionSet {
    pub fn empty() -> Self {
        Self::default()
    }

    /// The universal set.
    pub fn all() -> Self {
        Permission::ALL.into_iter().collect()
    }

    pub fn contains(&self, permission: Permission) -> bool {
        self.0.contains(&permission)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Permission> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<Permission> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = Permission>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
