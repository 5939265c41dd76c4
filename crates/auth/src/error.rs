use std::time::Duration;

use thiserror::Error;

use parish_core::DomainError;

/// Failure reported by a credential store or tenant directory adapter.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store call exceeded its {0:?} deadline")]
    Timeout(Duration),

    /// A uniqueness constraint rejected the write (e.g. duplicate email).
    #[error("conflict: {0}")]
    Conflict(String),
}

impl StoreError {
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }
}

/// Errors surfaced by the guard, impersonation and administration operations.
///
/// Session resolution never produces the authentication variants itself:
/// a bad token resolves to "no session". Only store failures escape it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No, invalid or expired credentials.
    #[error("authentication required")]
    NotAuthenticated,

    /// Authenticated, but the identity has no tenant membership.
    #[error("authenticated identity has no tenant membership")]
    NoTenant,

    /// Authenticated, but a role, permission or tenant check failed.
    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("operation would leave the tenant without an administrator")]
    LastAdministratorViolation,

    #[error("an identity cannot delete itself")]
    SelfDeletion,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
}

impl AuthError {
    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }
}

impl From<StoreError> for AuthError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Conflict(msg) => AuthError::Conflict(msg),
            other => AuthError::StoreUnavailable(other.to_string()),
        }
    }
}
