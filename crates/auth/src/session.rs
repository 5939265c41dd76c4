//! Per-request session value.

use serde::{Deserialize, Serialize};

use parish_core::{IdentityId, TenantId};

use crate::{PermissionSet, Profile, Role, VerifiedIdentity};

/// Whether the request acts as someone other than its credential holder.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ImpersonationState {
    #[default]
    NotImpersonating,
    Impersonating {
        original_identity_id: IdentityId,
        original_name: String,
        impersonated_identity_id: IdentityId,
        impersonated_name: String,
    },
}

impl ImpersonationState {
    pub fn is_impersonating(&self) -> bool {
        matches!(self, ImpersonationState::Impersonating { .. })
    }

    pub fn original_identity_id(&self) -> Option<IdentityId> {
        match self {
            ImpersonationState::Impersonating {
                original_identity_id,
                ..
            } => Some(*original_identity_id),
            ImpersonationState::NotImpersonating => None,
        }
    }
}

/// A fully resolved request identity.
///
/// Built fresh for every request and never cached. While impersonating,
/// `profile` is the *target's* profile and every check reads from it.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    /// Who the access token belongs to.
    pub identity: VerifiedIdentity,
    /// Effective directory profile; `None` when the identity has no tenant.
    pub profile: Option<Profile>,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub impersonation: ImpersonationState,
}

impl Session {
    pub fn profile(&self) -> Option<&Profile> {
        self.profile.as_ref()
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.profile.as_ref().map(|p| p.tenant_id)
    }

    pub fn role(&self) -> Option<Role> {
        self.profile.as_ref().map(|p| p.role)
    }

    /// Effective permissions; empty when the identity has no profile.
    pub fn permissions(&self) -> PermissionSet {
        self.profile
            .as_ref()
            .map(|p| p.permissions)
            .unwrap_or(PermissionSet::NONE)
    }

    /// The identity every downstream operation is attributed to.
    pub fn effective_identity_id(&self) -> IdentityId {
        self.profile
            .as_ref()
            .map(|p| p.id)
            .unwrap_or(self.identity.id)
    }

    /// The directory id of the human actually at the keyboard.
    pub fn original_identity_id(&self) -> IdentityId {
        self.impersonation
            .original_identity_id()
            .unwrap_or_else(|| self.effective_identity_id())
    }

    pub fn view(&self) -> SessionView {
        let user = match &self.profile {
            Some(p) => UserView {
                id: p.id,
                email: Some(p.email.clone()),
                name: Some(p.display_name.clone()),
                role: Some(p.role),
                permissions: Some(p.permissions),
                tenant_id: Some(p.tenant_id),
            },
            None => UserView {
                id: self.identity.id,
                email: self.identity.email.clone(),
                name: None,
                role: None,
                permissions: None,
                tenant_id: None,
            },
        };

        let impersonation = match &self.impersonation {
            ImpersonationState::NotImpersonating => ImpersonationView::default(),
            ImpersonationState::Impersonating {
                original_identity_id,
                original_name,
                impersonated_identity_id,
                impersonated_name,
            } => ImpersonationView {
                is_impersonating: true,
                original_identity_id: Some(*original_identity_id),
                original_name: Some(original_name.clone()),
                impersonated_identity_id: Some(*impersonated_identity_id),
                impersonated_name: Some(impersonated_name.clone()),
            },
        };

        SessionView {
            user,
            impersonation,
        }
    }
}

// Tokens stay out of logs.
impl core::fmt::Debug for Session {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Session")
            .field("identity", &self.identity)
            .field("profile", &self.profile)
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("impersonation", &self.impersonation)
            .finish()
    }
}

/// Outbound shape of a session for the UI and other collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub user: UserView,
    pub impersonation: ImpersonationView,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: IdentityId,
    pub email: Option<String>,
    pub name: Option<String>,
    pub role: Option<Role>,
    pub permissions: Option<PermissionSet>,
    pub tenant_id: Option<TenantId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpersonationView {
    pub is_impersonating: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_identity_id: Option<IdentityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impersonated_identity_id: Option<IdentityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impersonated_name: Option<String>,
}
