//! HS256 JWT verification against a shared secret.
//!
//! Signature checking is delegated to `jsonwebtoken`; the time window is
//! checked by `parish_auth::validate_claims` so that expiry handling stays
//! deterministic and testable.

use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};

use parish_auth::{AccessClaims, CredentialStore, StoreError, VerifiedIdentity, validate_claims};

/// Credential store for access tokens signed with a shared HS256 secret.
pub struct JwtCredentialStore {
    decoding: DecodingKey,
    encoding: EncodingKey,
    validation: Validation,
}

impl JwtCredentialStore {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // The claim window is validated by `validate_claims`.
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        Self {
            decoding: DecodingKey::from_secret(secret),
            encoding: EncodingKey::from_secret(secret),
            validation,
        }
    }

    /// Sign claims with the store's secret (dev tooling and tests).
    pub fn issue(&self, claims: &AccessClaims) -> Result<String, jsonwebtoken::errors::Error> {
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
    }
}

#[async_trait]
impl CredentialStore for JwtCredentialStore {
    async fn validate(&self, access_token: &str) -> Result<Option<VerifiedIdentity>, StoreError> {
        let claims = match jsonwebtoken::decode::<AccessClaims>(
            access_token,
            &self.decoding,
            &self.validation,
        ) {
            Ok(data) => data.claims,
            Err(e) => {
                tracing::debug!(error = %e, "access token failed verification");
                return Ok(None);
            }
        };

        match validate_claims(&claims, Utc::now()) {
            Ok(verified) => Ok(Some(verified)),
            Err(e) => {
                tracing::debug!(identity = %claims.sub, error = %e, "access token claims rejected");
                Ok(None)
            }
        }
    }
}
