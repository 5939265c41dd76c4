//! Tenant-scoped identity administration.
//!
//! Every operation requires the caller's effective profile to hold
//! `manage_identities`, only ever touches identities of the caller's tenant,
//! and checks the administrator floor before writing.

pub mod policy;

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use parish_core::{DomainError, IdentityId, TenantId};

use crate::resolver::within_deadline;
use crate::{
    AuthConfig, AuthError, DirectoryWriter, Guard, Permission, PermissionSet, Profile, Role,
    Session, TenantDirectory, WriteOutcome, normalize_email,
};

/// Input for creating an identity in the caller's tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewIdentity {
    pub email: String,
    pub display_name: String,
    pub role: Role,
    /// Defaults to the role's permission set.
    #[serde(default)]
    pub permissions: Option<PermissionSet>,
}

/// Partial edit of an identity. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityChanges {
    #[serde(default)]
    pub display_name: Option<String>,
    /// A role change resets the flags to the new role's defaults unless
    /// `permissions` is supplied as well.
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub permissions: Option<PermissionSet>,
}

impl IdentityChanges {
    fn apply_to(&self, current: &Profile) -> Result<Profile, DomainError> {
        let mut next = current.clone();

        if let Some(name) = &self.display_name {
            next.display_name = validate_display_name(name)?;
        }
        if let Some(role) = self.role {
            next.role = role;
            if role != current.role {
                next.permissions = PermissionSet::defaults_for(role);
            }
        }
        if let Some(permissions) = self.permissions {
            next.permissions = permissions;
        }

        Ok(next)
    }
}

/// Identity CRUD for tenant administrators.
#[derive(Clone)]
pub struct IdentityAdministration {
    directory: Arc<dyn TenantDirectory>,
    writer: Arc<dyn DirectoryWriter>,
    lookup_timeout: Duration,
}

impl IdentityAdministration {
    pub fn new(
        directory: Arc<dyn TenantDirectory>,
        writer: Arc<dyn DirectoryWriter>,
        config: &AuthConfig,
    ) -> Self {
        Self {
            directory,
            writer,
            lookup_timeout: config.lookup_timeout,
        }
    }

    /// All identities of the caller's tenant.
    pub async fn list(&self, guard: &Guard) -> Result<Vec<Profile>, AuthError> {
        let actor = guard.require_permission(Permission::ManageIdentities)?;
        self.members(actor.tenant_id).await
    }

    #[tracing::instrument(skip_all)]
    pub async fn create(&self, guard: &Guard, new: NewIdentity) -> Result<Profile, AuthError> {
        let actor = guard.require_permission(Permission::ManageIdentities)?;
        policy::ensure_can_grant(actor, new.role)?;

        let email = validate_email(&new.email)?;
        let display_name = validate_display_name(&new.display_name)?;

        let existing =
            within_deadline(self.lookup_timeout, self.directory.find_by_email(&email)).await?;
        if existing.is_some() {
            return Err(AuthError::Conflict(format!("email '{email}' is already registered")));
        }

        let profile = Profile {
            id: IdentityId::new(),
            tenant_id: actor.tenant_id,
            email,
            display_name,
            role: new.role,
            permissions: new
                .permissions
                .unwrap_or_else(|| PermissionSet::defaults_for(new.role)),
        };

        within_deadline(self.lookup_timeout, self.writer.insert(&profile)).await?;
        audit(guard.session(), "identity created", &profile);
        Ok(profile)
    }

    #[tracing::instrument(skip_all, fields(target = %target_id))]
    pub async fn update(
        &self,
        guard: &Guard,
        target_id: IdentityId,
        changes: IdentityChanges,
    ) -> Result<Profile, AuthError> {
        let actor = guard.require_permission(Permission::ManageIdentities)?;
        let members = self.members(actor.tenant_id).await?;
        let current = find_member(&members, target_id)?;

        policy::ensure_not_outranked(actor, current)?;
        if let Some(role) = changes.role {
            policy::ensure_can_grant(actor, role)?;
        }

        let next = changes.apply_to(current)?;
        policy::ensure_administrator_retained(&members, target_id, Some(&next))?;

        let outcome = within_deadline(self.lookup_timeout, self.writer.update(&next)).await?;
        written(outcome)?;
        audit(guard.session(), "identity updated", &next);
        Ok(next)
    }

    #[tracing::instrument(skip_all, fields(target = %target_id))]
    pub async fn delete(&self, guard: &Guard, target_id: IdentityId) -> Result<(), AuthError> {
        let session = guard.require_auth()?;
        let actor = guard.require_permission(Permission::ManageIdentities)?;
        policy::ensure_not_self(
            &[session.effective_identity_id(), session.original_identity_id()],
            target_id,
        )?;

        let members = self.members(actor.tenant_id).await?;
        let current = find_member(&members, target_id)?;
        policy::ensure_not_outranked(actor, current)?;
        policy::ensure_administrator_retained(&members, target_id, None)?;

        let outcome = within_deadline(
            self.lookup_timeout,
            self.writer.delete(actor.tenant_id, target_id),
        )
        .await?;
        written(outcome)?;
        audit(guard.session(), "identity deleted", current);
        Ok(())
    }

    async fn members(&self, tenant_id: TenantId) -> Result<Vec<Profile>, AuthError> {
        Ok(within_deadline(self.lookup_timeout, self.directory.list_tenant(tenant_id)).await?)
    }
}

/// Identities of other tenants are reported as missing, not forbidden, so
/// their existence does not leak.
fn find_member(members: &[Profile], target_id: IdentityId) -> Result<&Profile, AuthError> {
    members
        .iter()
        .find(|p| p.id == target_id)
        .ok_or_else(|| AuthError::not_found("identity"))
}

/// Maps the writer's verdict; its floor check runs atomically with the write.
fn written(outcome: WriteOutcome) -> Result<(), AuthError> {
    match outcome {
        WriteOutcome::Applied => Ok(()),
        WriteOutcome::NotFound => Err(AuthError::not_found("identity")),
        WriteOutcome::LastAdministrator => Err(AuthError::LastAdministratorViolation),
    }
}

fn validate_email(email: &str) -> Result<String, DomainError> {
    let email = normalize_email(email);
    if email.is_empty() || !email.contains('@') {
        return Err(DomainError::validation("invalid email format"));
    }
    Ok(email)
}

fn validate_display_name(name: &str) -> Result<String, DomainError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(DomainError::validation("display name cannot be empty"));
    }
    Ok(name.to_string())
}

fn audit(session: Option<&Session>, action: &'static str, subject: &Profile) {
    let actor = session.map(Session::effective_identity_id);
    let impersonated_by = session.and_then(|s| s.impersonation.original_identity_id());
    tracing::info!(
        actor = ?actor,
        impersonated_by = ?impersonated_by,
        tenant = %subject.tenant_id,
        subject = %subject.id,
        role = %subject.role,
        "{action}"
    );
}
