//! Session resolution: request credentials → [`Session`].
//!
//! Resolution is stateless and re-run on every request. The steps execute in a
//! fixed order because each depends on the previous one:
//!
//! 1. no access token → no session
//! 2. token rejected by the credential store → no session
//! 3. directory lookup of the verified identity (absent row → session without profile)
//! 4. impersonation markers, honoured only for an owner and a same-tenant target
//!
//! Only store failures (including deadline overruns) escape as errors.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parish_core::IdentityId;

use crate::{
    AuthConfig, AuthError, CredentialStore, ImpersonationMarkers, ImpersonationState, Profile,
    Role, Session, StoreError, TenantDirectory, VerifiedIdentity,
};

/// Everything a request carries that matters for authentication.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestCredentials {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub markers: ImpersonationMarkers,
}

impl RequestCredentials {
    pub fn bearer(access_token: impl Into<String>) -> Self {
        Self {
            access_token: Some(access_token.into()),
            ..Default::default()
        }
    }

    pub fn with_markers(mut self, markers: ImpersonationMarkers) -> Self {
        self.markers = markers;
        self
    }
}

/// Turns request credentials into a fully-qualified session.
///
/// Collaborators are injected; the resolver holds no per-request state and is
/// cheap to clone.
#[derive(Clone)]
pub struct SessionResolver {
    credentials: Arc<dyn CredentialStore>,
    directory: Arc<dyn TenantDirectory>,
    lookup_timeout: Duration,
}

impl SessionResolver {
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        directory: Arc<dyn TenantDirectory>,
        config: &AuthConfig,
    ) -> Self {
        Self {
            credentials,
            directory,
            lookup_timeout: config.lookup_timeout,
        }
    }

    /// Resolve the session for one request.
    ///
    /// `Ok(None)` is the normal "logged out" answer.
    pub async fn resolve(
        &self,
        request: &RequestCredentials,
    ) -> Result<Option<Session>, AuthError> {
        let Some(access_token) = request
            .access_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
        else {
            return Ok(None);
        };

        let verified = match self
            .call(self.credentials.validate(access_token))
            .await?
        {
            Some(v) => v,
            None => {
                tracing::debug!("access token rejected by credential store");
                return Ok(None);
            }
        };

        let original = self.lookup_original(&verified).await?;

        let mut session = Session {
            identity: verified,
            profile: original,
            access_token: access_token.to_string(),
            refresh_token: request.refresh_token.clone(),
            impersonation: ImpersonationState::NotImpersonating,
        };

        let Some(original) = session.profile.clone() else {
            tracing::debug!(identity = %session.identity.id, "authenticated identity has no directory profile");
            return Ok(Some(session));
        };

        let substituted = self
            .resolve_impersonation(&original, &request.markers)
            .await?;
        if let Some((target, state)) = substituted {
            session.profile = Some(target);
            session.impersonation = state;
        }

        Ok(Some(session))
    }

    async fn lookup_original(
        &self,
        verified: &VerifiedIdentity,
    ) -> Result<Option<Profile>, StoreError> {
        match verified.email.as_deref() {
            Some(email) => self.call(self.directory.find_by_email(email)).await,
            None => self.call(self.directory.find_by_id(verified.id)).await,
        }
    }

    /// Returns the substituted profile when the markers are honoured.
    ///
    /// Every reason to ignore the markers degrades to "not impersonating".
    async fn resolve_impersonation(
        &self,
        original: &Profile,
        markers: &ImpersonationMarkers,
    ) -> Result<Option<(Profile, ImpersonationState)>, StoreError> {
        let Some((marked_original, target_id)) = markers.pair() else {
            if markers.is_partial() {
                tracing::debug!(identity = %original.id, "ignoring incomplete impersonation markers");
            }
            return Ok(None);
        };

        if marked_original != original.id {
            tracing::warn!(
                identity = %original.id,
                marked_original = %marked_original,
                "impersonation markers belong to another identity; ignoring"
            );
            return Ok(None);
        }

        if !original.role.satisfies(Role::Owner) {
            tracing::warn!(
                identity = %original.id,
                role = %original.role,
                "impersonation markers presented by a non-owner; ignoring"
            );
            return Ok(None);
        }

        let Some(target) = self.lookup_target(target_id).await? else {
            tracing::warn!(
                identity = %original.id,
                target = %target_id,
                "impersonation target no longer exists; falling back to original identity"
            );
            return Ok(None);
        };

        if target.tenant_id != original.tenant_id {
            tracing::warn!(
                identity = %original.id,
                tenant = %original.tenant_id,
                target = %target.id,
                target_tenant = %target.tenant_id,
                "impersonation target is in another tenant; ignoring"
            );
            return Ok(None);
        }

        let state = ImpersonationState::Impersonating {
            original_identity_id: original.id,
            original_name: original.display_name.clone(),
            impersonated_identity_id: target.id,
            impersonated_name: target.display_name.clone(),
        };
        Ok(Some((target, state)))
    }

    async fn lookup_target(&self, target_id: IdentityId) -> Result<Option<Profile>, StoreError> {
        self.call(self.directory.find_by_id(target_id)).await
    }

    async fn call<T>(
        &self,
        fut: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        within_deadline(self.lookup_timeout, fut).await
    }
}

/// Run a store call under `deadline`; overruns become `StoreError::Timeout`.
pub(crate) async fn within_deadline<T>(
    deadline: Duration,
    fut: impl Future<Output = Result<T, StoreError>>,
) -> Result<T, StoreError> {
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => {
            if let Err(e) = &result {
                tracing::error!(error = %e, "store call failed");
            }
            result
        }
        Err(_) => {
            tracing::error!(?deadline, "store call timed out");
            Err(StoreError::Timeout(deadline))
        }
    }
}
