use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use parish_core::IdentityId;

use crate::VerifiedIdentity;

/// Access token claims model (transport-agnostic).
///
/// This is the minimal set of claims expected once a token has been decoded
/// and its signature verified by whatever credential adapter is in use.
/// Timestamps are Unix seconds, matching what identity providers emit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject / identity identifier.
    pub sub: IdentityId,

    /// Email of the subject, used to locate the directory profile.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Issued-at timestamp.
    pub iat: i64,

    /// Expiration timestamp.
    pub exp: i64,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (issued_at is in the future)")]
    NotYetValid,

    #[error("invalid token time window (expires_at <= issued_at)")]
    InvalidTimeWindow,

    #[error("token timestamp out of range")]
    InvalidTimestamp,
}

/// Deterministically validate access token claims.
///
/// Note: this validates the *claims* only. Signature verification / decoding is
/// outside this crate.
pub fn validate_claims(
    claims: &AccessClaims,
    now: DateTime<Utc>,
) -> Result<VerifiedIdentity, TokenValidationError> {
    let issued_at = timestamp(claims.iat)?;
    let expires_at = timestamp(claims.exp)?;

    if expires_at <= issued_at {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    if now < issued_at {
        return Err(TokenValidationError::NotYetValid);
    }
    if now >= expires_at {
        return Err(TokenValidationError::Expired);
    }

    Ok(VerifiedIdentity {
        id: claims.sub,
        email: claims
            .email
            .as_deref()
            .map(crate::normalize_email)
            .filter(|e| !e.is_empty()),
        expires_at,
    })
}

fn timestamp(secs: i64) -> Result<DateTime<Utc>, TokenValidationError> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or(TokenValidationError::InvalidTimestamp)
}
