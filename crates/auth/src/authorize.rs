//! Authorization guard: role and permission predicates over a resolved session.
//!
//! - No IO
//! - No panics
//! - Reads only the effective profile (the impersonated one, when impersonating)

use serde::Serialize;

use parish_core::{IdentityId, TenantId};

use crate::{AuthError, ImpersonationState, Permission, Profile, Role, Session};

/// Whether the session's effective role satisfies `required` in the role lattice.
///
/// Identities without a directory profile hold no role.
pub fn has_role(session: &Session, required: Role) -> bool {
    session.role().is_some_and(|held| held.satisfies(required))
}

/// Reads one flag off the effective profile. No role inference.
pub fn has_permission(session: &Session, permission: Permission) -> bool {
    session.permissions().has(permission)
}

/// Per-request authorization guard.
///
/// Wraps the (possibly absent) session produced by the resolver and answers
/// every role, permission and tenant question asked by protected operations.
#[derive(Debug, Clone, Default)]
pub struct Guard {
    session: Option<Session>,
}

impl Guard {
    pub fn new(session: Option<Session>) -> Self {
        Self { session }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    /// The resolved session, if any.
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn require_auth(&self) -> Result<&Session, AuthError> {
        self.session.as_ref().ok_or(AuthError::NotAuthenticated)
    }

    pub fn has_role(&self, required: Role) -> bool {
        self.session.as_ref().is_some_and(|s| has_role(s, required))
    }

    pub fn require_role(&self, required: Role) -> Result<&Session, AuthError> {
        let session = self.require_auth()?;
        if has_role(session, required) {
            Ok(session)
        } else {
            Err(AuthError::forbidden(format!("requires role '{required}'")))
        }
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| has_permission(s, permission))
    }

    /// Returns the effective profile when it holds `permission`.
    pub fn require_permission(&self, permission: Permission) -> Result<&Profile, AuthError> {
        let profile = self.current_profile()?;
        if profile.permissions.has(permission) {
            Ok(profile)
        } else {
            Err(AuthError::forbidden(format!(
                "missing permission '{permission}'"
            )))
        }
    }

    /// Effective directory profile; `NoTenant` when the identity has none.
    pub fn current_profile(&self) -> Result<&Profile, AuthError> {
        self.require_auth()?.profile().ok_or(AuthError::NoTenant)
    }

    pub fn current_tenant_id(&self) -> Result<TenantId, AuthError> {
        Ok(self.current_profile()?.tenant_id)
    }

    pub fn current_identity_id(&self) -> Result<IdentityId, AuthError> {
        Ok(self.require_auth()?.effective_identity_id())
    }

    /// Fails with `Forbidden` unless `tenant_id` is the caller's tenant.
    pub fn ensure_same_tenant(&self, tenant_id: TenantId) -> Result<(), AuthError> {
        if self.current_tenant_id()? == tenant_id {
            Ok(())
        } else {
            Err(AuthError::forbidden("cross-tenant access"))
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Authorization Explanation (Audit Trail)
// ─────────────────────────────────────────────────────────────────────────────

/// Detailed explanation of a permission decision.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationExplanation {
    pub required_permission: Permission,
    pub granted: bool,
    /// Human-readable reason for the decision.
    pub reason: String,
    pub identity_id: Option<IdentityId>,
    pub tenant_id: Option<TenantId>,
    pub role: Option<Role>,
    pub effective_permissions: Vec<Permission>,
    /// Set when the decision was taken on behalf of an impersonating owner.
    pub impersonated_by: Option<IdentityId>,
    pub denial_reason: Option<DenialReason>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DenialReason {
    pub kind: DenialKind,
    pub message: String,
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialKind {
    NotAuthenticated,
    NoTenant,
    MissingPermission,
}

/// Explain why `required` is (or would be) granted or denied for `session`.
pub fn explain_permission(
    session: Option<&Session>,
    required: Permission,
) -> AuthorizationExplanation {
    let Some(session) = session else {
        return AuthorizationExplanation {
            required_permission: required,
            granted: false,
            reason: "No authenticated session".to_string(),
            identity_id: None,
            tenant_id: None,
            role: None,
            effective_permissions: Vec::new(),
            impersonated_by: None,
            denial_reason: Some(DenialReason {
                kind: DenialKind::NotAuthenticated,
                message: "The request carried no valid access token".to_string(),
                suggestions: vec!["Sign in again to obtain a fresh access token".to_string()],
            }),
        };
    };

    let impersonated_by = session.impersonation.original_identity_id();

    let Some(profile) = session.profile() else {
        return AuthorizationExplanation {
            required_permission: required,
            granted: false,
            reason: "Authenticated identity has no tenant membership".to_string(),
            identity_id: Some(session.identity.id),
            tenant_id: None,
            role: None,
            effective_permissions: Vec::new(),
            impersonated_by,
            denial_reason: Some(DenialReason {
                kind: DenialKind::NoTenant,
                message: "No directory profile matches the authenticated identity".to_string(),
                suggestions: vec![
                    "Ask a tenant owner to add this email to the tenant directory".to_string(),
                ],
            }),
        };
    };

    let granted = profile.permissions.has(required);
    let mut reason = if granted {
        format!("Identity holds the '{required}' flag")
    } else {
        format!(
            "Identity does not hold the '{required}' flag (role '{}' does not imply flags)",
            profile.role
        )
    };
    if let ImpersonationState::Impersonating {
        original_name,
        impersonated_name,
        ..
    } = &session.impersonation
    {
        reason.push_str(&format!(
            "; decision uses {impersonated_name}'s flags while {original_name} is impersonating"
        ));
    }

    let denial_reason = (!granted).then(|| DenialReason {
        kind: DenialKind::MissingPermission,
        message: format!("Missing required permission: '{required}'"),
        suggestions: vec![format!(
            "Ask an identity administrator to grant '{required}' to {}",
            profile.display_name
        )],
    });

    AuthorizationExplanation {
        required_permission: required,
        granted,
        reason,
        identity_id: Some(profile.id),
        tenant_id: Some(profile.tenant_id),
        role: Some(profile.role),
        effective_permissions: profile.permissions.granted(),
        impersonated_by,
        denial_reason,
    }
}
