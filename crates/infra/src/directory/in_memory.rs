use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use parish_auth::admin::policy::ensure_administrator_retained;
use parish_auth::{
    DirectoryWriter, Profile, StoreError, TenantDirectory, WriteOutcome, normalize_email,
};
use parish_core::{IdentityId, TenantId};

/// In-memory directory for tests/dev.
///
/// Emails are unique across all tenants, mirroring the `identities` table.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    inner: RwLock<HashMap<IdentityId, Profile>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a directory with profiles (duplicates by email are skipped).
    pub fn with_profiles(profiles: impl IntoIterator<Item = Profile>) -> Self {
        let directory = Self::new();
        if let Ok(mut inner) = directory.inner.write() {
            for mut profile in profiles {
                profile.email = normalize_email(&profile.email);
                if inner.values().any(|p| p.email == profile.email) {
                    tracing::warn!(email = %profile.email, "skipping duplicate seed profile");
                    continue;
                }
                inner.insert(profile.id, profile);
            }
        }
        directory
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, HashMap<IdentityId, Profile>>, StoreError> {
        self.inner
            .read()
            .map_err(|_| StoreError::unavailable("directory lock poisoned"))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<IdentityId, Profile>>, StoreError> {
        self.inner
            .write()
            .map_err(|_| StoreError::unavailable("directory lock poisoned"))
    }
}

#[async_trait]
impl TenantDirectory for InMemoryDirectory {
    async fn find_by_email(&self, email: &str) -> Result<Option<Profile>, StoreError> {
        let email = normalize_email(email);
        Ok(self.read()?.values().find(|p| p.email == email).cloned())
    }

    async fn find_by_id(&self, id: IdentityId) -> Result<Option<Profile>, StoreError> {
        Ok(self.read()?.get(&id).cloned())
    }

    async fn list_tenant(&self, tenant_id: TenantId) -> Result<Vec<Profile>, StoreError> {
        let mut members: Vec<Profile> = self
            .read()?
            .values()
            .filter(|p| p.tenant_id == tenant_id)
            .cloned()
            .collect();
        members.sort_by(|a, b| {
            a.display_name
                .cmp(&b.display_name)
                .then_with(|| a.email.cmp(&b.email))
        });
        Ok(members)
    }
}

#[async_trait]
impl DirectoryWriter for InMemoryDirectory {
    async fn insert(&self, profile: &Profile) -> Result<(), StoreError> {
        let mut inner = self.write()?;
        let email = normalize_email(&profile.email);
        if inner.contains_key(&profile.id) || inner.values().any(|p| p.email == email) {
            return Err(StoreError::Conflict(format!(
                "identity with email '{email}' already exists"
            )));
        }
        let mut stored = profile.clone();
        stored.email = email;
        inner.insert(stored.id, stored);
        Ok(())
    }

    async fn update(&self, profile: &Profile) -> Result<WriteOutcome, StoreError> {
        let mut inner = self.write()?;
        let email = normalize_email(&profile.email);
        if inner
            .values()
            .any(|p| p.id != profile.id && p.email == email)
        {
            return Err(StoreError::Conflict(format!(
                "identity with email '{email}' already exists"
            )));
        }
        if !inner
            .get(&profile.id)
            .is_some_and(|p| p.tenant_id == profile.tenant_id)
        {
            return Ok(WriteOutcome::NotFound);
        }

        let replacement = Profile {
            email,
            ..profile.clone()
        };
        // Checked under the write lock so concurrent edits see each other.
        let members = tenant_members(&inner, profile.tenant_id);
        if ensure_administrator_retained(&members, profile.id, Some(&replacement)).is_err() {
            return Ok(WriteOutcome::LastAdministrator);
        }

        inner.insert(replacement.id, replacement);
        Ok(WriteOutcome::Applied)
    }

    async fn delete(&self, tenant_id: TenantId, id: IdentityId) -> Result<WriteOutcome, StoreError> {
        let mut inner = self.write()?;
        if !inner.get(&id).is_some_and(|p| p.tenant_id == tenant_id) {
            return Ok(WriteOutcome::NotFound);
        }

        let members = tenant_members(&inner, tenant_id);
        if ensure_administrator_retained(&members, id, None).is_err() {
            return Ok(WriteOutcome::LastAdministrator);
        }

        inner.remove(&id);
        Ok(WriteOutcome::Applied)
    }
}

fn tenant_members(inner: &HashMap<IdentityId, Profile>, tenant_id: TenantId) -> Vec<Profile> {
    inner
        .values()
        .filter(|p| p.tenant_id == tenant_id)
        .cloned()
        .collect()
}
