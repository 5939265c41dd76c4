//! Authorization subsystem configuration.

use std::time::Duration;

/// Tunables for session resolution and impersonation.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Upper bound on impersonation marker lifetime (default: 1 hour).
    /// The markers never outlive the access token that started them.
    pub impersonation_ttl: Duration,
    /// Deadline for each credential/directory call (default: 5 seconds).
    pub lookup_timeout: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            impersonation_ttl: Duration::from_secs(60 * 60),
            lookup_timeout: Duration::from_secs(5),
        }
    }
}
