use core::str::FromStr;

use parish_core::DomainError;
use serde::{Deserialize, Serialize};

use crate::Role;

/// One of the six independent capability flags an identity can hold.
///
/// Flags are read directly off the identity; they are never inferred from the
/// role. A `Member` may hold `ManageGroups` if it was explicitly granted.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    ManageIdentities,
    ManageGroups,
    EditRecords,
    RecordAttendance,
    ManageAssessments,
    ViewReports,
}

impl Permission {
    pub const ALL: [Permission; 6] = [
        Permission::ManageIdentities,
        Permission::ManageGroups,
        Permission::EditRecords,
        Permission::RecordAttendance,
        Permission::ManageAssessments,
        Permission::ViewReports,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Permission::ManageIdentities => "manage_identities",
            Permission::ManageGroups => "manage_groups",
            Permission::EditRecords => "edit_records",
            Permission::RecordAttendance => "record_attendance",
            Permission::ManageAssessments => "manage_assessments",
            Permission::ViewReports => "view_reports",
        }
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = DomainError;

    /// Accepts snake_case, kebab-case and camelCase spellings.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .map(|c| c.to_ascii_lowercase())
            .collect();

        Permission::ALL
            .into_iter()
            .find(|p| p.as_str().replace('_', "") == normalized)
            .ok_or_else(|| DomainError::validation(format!("unknown permission '{}'", s.trim())))
    }
}

/// The full set of capability flags carried by an identity.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionSet {
    pub manage_identities: bool,
    pub manage_groups: bool,
    pub edit_records: bool,
    pub record_attendance: bool,
    pub manage_assessments: bool,
    pub view_reports: bool,
}

impl PermissionSet {
    pub const NONE: PermissionSet = PermissionSet {
        manage_identities: false,
        manage_groups: false,
        edit_records: false,
        record_attendance: false,
        manage_assessments: false,
        view_reports: false,
    };

    pub const ALL: PermissionSet = PermissionSet {
        manage_identities: true,
        manage_groups: true,
        edit_records: true,
        record_attendance: true,
        manage_assessments: true,
        view_reports: true,
    };

    /// Default flags applied when an identity is created with, or moved to, `role`.
    ///
    /// This is only a starting point: the stored set may diverge afterwards.
    pub const fn defaults_for(role: Role) -> PermissionSet {
        match role {
            Role::Owner | Role::Admin => PermissionSet::ALL,
            Role::Member => PermissionSet {
                edit_records: true,
                record_attendance: true,
                ..PermissionSet::NONE
            },
        }
    }

    pub const fn has(&self, permission: Permission) -> bool {
        match permission {
            Permission::ManageIdentities => self.manage_identities,
            Permission::ManageGroups => self.manage_groups,
            Permission::EditRecords => self.edit_records,
            Permission::RecordAttendance => self.record_attendance,
            Permission::ManageAssessments => self.manage_assessments,
            Permission::ViewReports => self.view_reports,
        }
    }

    pub fn set(&mut self, permission: Permission, granted: bool) {
        let flag = match permission {
            Permission::ManageIdentities => &mut self.manage_identities,
            Permission::ManageGroups => &mut self.manage_groups,
            Permission::EditRecords => &mut self.edit_records,
            Permission::RecordAttendance => &mut self.record_attendance,
            Permission::ManageAssessments => &mut self.manage_assessments,
            Permission::ViewReports => &mut self.view_reports,
        };
        *flag = granted;
    }

    pub fn with(mut self, permission: Permission) -> Self {
        self.set(permission, true);
        self
    }

    pub fn without(mut self, permission: Permission) -> Self {
        self.set(permission, false);
        self
    }

    /// Granted flags, in declaration order.
    pub fn granted(&self) -> Vec<Permission> {
        Permission::ALL.into_iter().filter(|p| self.has(*p)).collect()
    }
}
