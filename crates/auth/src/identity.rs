use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use parish_core::{IdentityId, TenantId};

use crate::{PermissionSet, Role};

/// The subject of a successfully validated access token.
///
/// This is all the credential store vouches for; tenant membership comes from
/// the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedIdentity {
    pub id: IdentityId,
    pub email: Option<String>,
    /// Expiry of the access token that proved this identity.
    pub expires_at: DateTime<Utc>,
}

/// A tenant directory row: one human operator and what they may do.
///
/// # Invariants
/// - An identity belongs to exactly one tenant.
/// - `permissions` is independent of `role` once stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: IdentityId,
    pub tenant_id: TenantId,
    pub email: String,
    pub display_name: String,
    pub role: Role,
    pub permissions: PermissionSet,
}

impl Profile {
    /// Counts towards the tenant's administrator floor.
    pub fn is_administrator_equivalent(&self) -> bool {
        self.role.is_administrative() || self.permissions.manage_identities
    }

    pub fn summary(&self) -> ProfileSummary {
        ProfileSummary {
            id: self.id,
            name: self.display_name.clone(),
            email: self.email.clone(),
            role: self.role,
        }
    }
}

/// Short description of an identity, used for UI confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSummary {
    pub id: IdentityId,
    pub name: String,
    pub email: String,
    pub role: Role,
}

/// Emails are matched case-insensitively and without surrounding whitespace.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
