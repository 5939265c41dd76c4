//! Session resolution, tenant isolation and authorization.
//!
//! This crate is decoupled from HTTP and storage: collaborators
//! are reached through the traits in [`ports`], and transport state
//! (impersonation markers) comes in and goes out as plain values.

pub mod admin;
pub mod authorize;
pub mod claims;
pub mod config;
pub mod error;
pub mod identity;
pub mod impersonation;
pub mod permissions;
pub mod ports;
pub mod resolver;
pub mod roles;
pub mod session;

pub use admin::{IdentityAdministration, IdentityChanges, NewIdentity};
pub use authorize::{AuthorizationExplanation, Guard, explain_permission, has_permission, has_role};
pub use claims::{AccessClaims, TokenValidationError, validate_claims};
pub use config::AuthConfig;
pub use error::{AuthError, StoreError};
pub use identity::{Profile, ProfileSummary, VerifiedIdentity, normalize_email};
pub use impersonation::{ImpersonationManager, ImpersonationMarkers, ImpersonationStarted, MarkerUpdate};
pub use permissions::{Permission, PermissionSet};
pub use ports::{CredentialStore, DirectoryWriter, TenantDirectory, WriteOutcome};
pub use resolver::{RequestCredentials, SessionResolver};
pub use roles::Role;
pub use session::{ImpersonationState, ImpersonationView, Session, SessionView, UserView};
