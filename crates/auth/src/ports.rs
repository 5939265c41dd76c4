//! Collaborator contracts.
//!
//! The credential store and tenant directory are external systems; adapters
//! live in `parish-infra` and are injected as `Arc<dyn ...>`.

use async_trait::async_trait;

use parish_core::{IdentityId, TenantId};

use crate::{Profile, StoreError, VerifiedIdentity};

/// Issuer/verifier of opaque bearer tokens.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Validate an access token.
    ///
    /// `Ok(None)` means the token is malformed, forged or expired. `Err` is
    /// reserved for the store itself being unreachable.
    async fn validate(&self, access_token: &str) -> Result<Option<VerifiedIdentity>, StoreError>;
}

/// Read side of the identity → profile table.
#[async_trait]
pub trait TenantDirectory: Send + Sync {
    /// Lookup by normalized email.
    async fn find_by_email(&self, email: &str) -> Result<Option<Profile>, StoreError>;

    async fn find_by_id(&self, id: IdentityId) -> Result<Option<Profile>, StoreError>;

    /// All identities of one tenant, ordered by display name.
    async fn list_tenant(&self, tenant_id: TenantId) -> Result<Vec<Profile>, StoreError>;
}

/// Outcome of a guarded directory write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Applied,
    /// No row matched `(tenant_id, id)`.
    NotFound,
    /// The write would have left the tenant without an administrator-equivalent
    /// identity; nothing was changed.
    LastAdministrator,
}

/// Write side of the directory, used by identity administration.
///
/// Every write is keyed by tenant as well as id; adapters must not touch rows
/// of another tenant. `update` and `delete` re-check the administrator floor
/// ([`ensure_administrator_retained`](crate::admin::policy::ensure_administrator_retained))
/// against a snapshot of the tenant taken atomically with the write, so
/// concurrent mutations in one tenant are serialized.
#[async_trait]
pub trait DirectoryWriter: Send + Sync {
    /// Insert a new profile. Duplicate emails yield `StoreError::Conflict`.
    async fn insert(&self, profile: &Profile) -> Result<(), StoreError>;

    /// Replace an existing profile.
    async fn update(&self, profile: &Profile) -> Result<WriteOutcome, StoreError>;

    async fn delete(&self, tenant_id: TenantId, id: IdentityId) -> Result<WriteOutcome, StoreError>;
}
