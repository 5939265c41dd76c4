//! Credential store adapters.

pub mod in_memory;
pub mod jwt;

pub use in_memory::InMemoryCredentialStore;
pub use jwt::JwtCredentialStore;
