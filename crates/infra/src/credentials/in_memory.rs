use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use parish_auth::{CredentialStore, StoreError, VerifiedIdentity, normalize_email};
use parish_core::IdentityId;

/// In-memory opaque token table.
///
/// Intended for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    tokens: RwLock<HashMap<String, VerifiedIdentity>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `token` for `identity` until `expires_at`.
    pub fn insert(
        &self,
        token: impl Into<String>,
        id: IdentityId,
        email: Option<&str>,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut tokens = self
            .tokens
            .write()
            .map_err(|_| StoreError::unavailable("lock poisoned"))?;
        tokens.insert(
            token.into(),
            VerifiedIdentity {
                id,
                email: email.map(normalize_email),
                expires_at,
            },
        );
        Ok(())
    }

    /// Mint a random token valid for `ttl`.
    pub fn issue(&self, id: IdentityId, email: Option<&str>, ttl: Duration) -> Result<String, StoreError> {
        let token = uuid::Uuid::now_v7().simple().to_string();
        self.insert(token.clone(), id, email, Utc::now() + ttl)?;
        Ok(token)
    }

    pub fn revoke(&self, token: &str) -> Result<(), StoreError> {
        let mut tokens = self
            .tokens
            .write()
            .map_err(|_| StoreError::unavailable("lock poisoned"))?;
        tokens.remove(token);
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn validate(&self, access_token: &str) -> Result<Option<VerifiedIdentity>, StoreError> {
        let tokens = self
            .tokens
            .read()
            .map_err(|_| StoreError::unavailable("lock poisoned"))?;

        Ok(tokens
            .get(access_token)
            .filter(|v| v.expires_at > Utc::now())
            .cloned())
    }
}
