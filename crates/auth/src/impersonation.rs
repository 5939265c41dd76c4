//! Owner-only, same-tenant identity substitution.
//!
//! Starting an impersonation does not touch any server-side state: it yields a
//! [`MarkerUpdate`] which the transport adapter persists on the caller's side
//! (HttpOnly cookies). The resolver turns those markers back into an
//! [`ImpersonationState`](crate::ImpersonationState) on every request.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use parish_core::IdentityId;

use crate::resolver::within_deadline;
use crate::{AuthConfig, AuthError, Guard, ProfileSummary, Role, TenantDirectory};

/// The two correlated markers carried by a request.
///
/// Both must be present for impersonation to be considered at all.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImpersonationMarkers {
    /// Directory id of the owner who started the impersonation.
    pub original: Option<IdentityId>,
    /// Directory id of the identity being impersonated.
    pub target: Option<IdentityId>,
}

impl ImpersonationMarkers {
    pub fn new(original: IdentityId, target: IdentityId) -> Self {
        Self {
            original: Some(original),
            target: Some(target),
        }
    }

    /// `(original, target)` when both markers are present.
    pub fn pair(&self) -> Option<(IdentityId, IdentityId)> {
        self.original.zip(self.target)
    }

    pub fn is_partial(&self) -> bool {
        self.original.is_some() != self.target.is_some()
    }

    /// Apply a marker update the way a browser applies `Set-Cookie`.
    pub fn apply(&mut self, update: &MarkerUpdate) {
        *self = match update {
            MarkerUpdate::Set {
                original, target, ..
            } => ImpersonationMarkers::new(*original, *target),
            MarkerUpdate::Clear => ImpersonationMarkers::default(),
        };
    }
}

/// Instruction for the transport adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkerUpdate {
    /// Write both markers, replacing any previous pair.
    Set {
        original: IdentityId,
        target: IdentityId,
        expires_at: DateTime<Utc>,
    },
    /// Remove both markers.
    Clear,
}

impl MarkerUpdate {
    /// Remaining marker lifetime, clamped at zero. `None` for `Clear`.
    pub fn max_age(&self, now: DateTime<Utc>) -> Option<Duration> {
        match self {
            MarkerUpdate::Set { expires_at, .. } => {
                Some((*expires_at - now).to_std().unwrap_or(Duration::ZERO))
            }
            MarkerUpdate::Clear => None,
        }
    }
}

/// Result of a successful `start`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImpersonationStarted {
    pub target: ProfileSummary,
    pub markers: MarkerUpdate,
}

/// Starts and stops impersonation for the current request's caller.
#[derive(Clone)]
pub struct ImpersonationManager {
    directory: Arc<dyn TenantDirectory>,
    ttl: Duration,
    lookup_timeout: Duration,
}

impl ImpersonationManager {
    pub fn new(directory: Arc<dyn TenantDirectory>, config: &AuthConfig) -> Self {
        Self {
            directory,
            ttl: config.impersonation_ttl,
            lookup_timeout: config.lookup_timeout,
        }
    }

    /// Begin acting as `target_id`.
    ///
    /// The caller's *effective* role must be `Owner`: an owner who is already
    /// impersonating a lower role has to stop first. Starting again while
    /// impersonating an owner replaces the target (no nesting).
    #[tracing::instrument(skip_all, fields(target = %target_id))]
    pub async fn start(
        &self,
        guard: &Guard,
        target_id: IdentityId,
        now: DateTime<Utc>,
    ) -> Result<ImpersonationStarted, AuthError> {
        let session = guard.require_auth()?;
        let caller = guard.current_profile()?;
        if !guard.has_role(Role::Owner) {
            return Err(AuthError::forbidden("only tenant owners can impersonate"));
        }

        let original_id = session.original_identity_id();
        if target_id == original_id {
            return Err(AuthError::forbidden("cannot impersonate yourself"));
        }

        let target = within_deadline(self.lookup_timeout, self.directory.find_by_id(target_id))
            .await?
            .ok_or_else(|| AuthError::not_found("identity"))?;

        if target.tenant_id != caller.tenant_id {
            tracing::warn!(
                caller = %caller.id,
                tenant = %caller.tenant_id,
                target_tenant = %target.tenant_id,
                "cross-tenant impersonation attempt rejected"
            );
            return Err(AuthError::forbidden("target belongs to another tenant"));
        }

        let ttl = chrono::Duration::from_std(self.ttl).unwrap_or(chrono::Duration::hours(1));
        let expires_at = (now + ttl).min(session.identity.expires_at);

        tracing::info!(
            original = %original_id,
            target = %target.id,
            tenant = %target.tenant_id,
            %expires_at,
            "impersonation started"
        );

        Ok(ImpersonationStarted {
            target: target.summary(),
            markers: MarkerUpdate::Set {
                original: original_id,
                target: target.id,
                expires_at,
            },
        })
    }

    /// Stop impersonating. Always succeeds, even when nothing was active.
    pub fn stop(&self, guard: &Guard) -> MarkerUpdate {
        if let Some(session) = guard.session() {
            if session.impersonation.is_impersonating() {
                tracing::info!(
                    original = %session.original_identity_id(),
                    target = %session.effective_identity_id(),
                    "impersonation stopped"
                );
            }
        }
        MarkerUpdate::Clear
    }
}
