use core::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Role identifier used for RBAC.
///
/// The set of roles is fixed at compile time; what each role may do is decided
/// by the [`RoleTable`](crate::RoleTable) the process is started with.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Tenant administrator. With no tenant this is the platform super-administrator.
    Admin,
    ComplianceManager,
    StationManager,
    Auditor,
    Contractor,
    Viewer,
}

impl Role {
    pub const ALL: [Role; 6] = [
        Role::Admin,
        Role::ComplianceManager,
        Role::StationManager,
        Role::Auditor,
        Role::Contractor,
        Role::Viewer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::ComplianceManager => "compliance_manager",
            Role::StationManager => "station_manager",
            Role::Auditor => "auditor",
            Role::Contractor => "contractor",
            Role::Viewer => "viewer",
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown role '{0}'")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    /// Accepts `station_manager`, `station-manager` and `StationManager` spellings.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .flat_map(char::to_lowercase)
            .collect();

        Role::ALL
            .into_iter()
            .find(|role| role.as_str().replace('_', "") == normalized)
            .ok_or_else(|| UnknownRole(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_common_spellings() {
        assert_eq!("station_manager".parse::<Role>().unwrap(), Role::StationManager);
        assert_eq!("station-manager".parse::<Role>().unwrap(), Role::StationManager);
        assert_eq!("StationManager".parse::<Role>().unwrap(), Role::StationManager);
        assert_eq!(" ADMIN ".parse::<Role>().unwrap(), Role::Admin);
    }

    #[test]
    fn rejects_unknown_role() {
        let err = "janitor".parse::<Role>().unwrap_err();
        assert_eq!(err, UnknownRole("janitor".to_string()));
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&Role::ComplianceManager).unwrap();
        assert_eq!(json, "\"compliance_manager\"");
        let back: Role = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Role::ComplianceManager);
    }
}
