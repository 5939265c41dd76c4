//! Infrastructure layer: credential stores and tenant directories.
//!
//! Adapters implement the `parish-auth` ports and are injected as
//! `Arc<dyn Port>` by the binary.

pub mod credentials;
pub mod directory;


pub use credentials::{InMemoryCredentialStore, JwtCredentialStore};
pub use directory::{InMemoryDirectory, PostgresDirectory};
