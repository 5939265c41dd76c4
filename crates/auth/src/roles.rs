use core::str::FromStr;

use parish_core::DomainError;
use serde::{Deserialize, Serialize};

/// Role of an identity within its tenant.
///
/// Roles form a fixed three-level lattice: `Owner` ⊇ `Admin` ⊇ `Member`.
/// A holder satisfies a requirement when its rank is at least as privileged
/// as the required one. The legacy names (`church_admin`, `teacher`) are
/// accepted on input and never produced on output.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[serde(alias = "church_admin")]
    Owner,
    Admin,
    #[serde(alias = "teacher")]
    Member,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Owner, Role::Admin, Role::Member];

    /// Position in the lattice; lower is more privileged.
    const fn rank(self) -> u8 {
        match self {
            Role::Owner => 0,
            Role::Admin => 1,
            Role::Member => 2,
        }
    }

    /// Whether a holder of `self` passes a check for `required`.
    pub const fn satisfies(self, required: Role) -> bool {
        self.rank() <= required.rank()
    }

    /// `Owner` and `Admin` count towards the tenant's administrator floor.
    pub const fn is_administrative(self) -> bool {
        matches!(self, Role::Owner | Role::Admin)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::Admin => "admin",
            Role::Member => "member",
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "owner" | "church_admin" => Ok(Role::Owner),
            "admin" => Ok(Role::Admin),
            "member" | "teacher" => Ok(Role::Member),
            other => Err(DomainError::validation(format!(
                "unknown role '{other}' (expected owner, admin or member)"
            ))),
        }
    }
}
