//! Process configuration read from the environment.

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

use parish_auth::AuthConfig;

const DEV_JWT_SECRET: &str = "dev-secret";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    /// Adds `Secure` to every cookie the API writes.
    pub secure_cookies: bool,
    /// Postgres directory when set, in-memory directory otherwise.
    pub database_url: Option<String>,
    pub auth: AuthConfig,
}

impl ApiConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (the environment in production).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind_addr = match lookup("PARISH_BIND_ADDR") {
            Some(raw) => raw.trim().parse().map_err(|e| ConfigError::Invalid {
                key: "PARISH_BIND_ADDR",
                message: format!("{e}"),
            })?,
            None => SocketAddr::from(([0, 0, 0, 0], 8080)),
        };

        let jwt_secret = match lookup("JWT_SECRET").filter(|s| !s.is_empty()) {
            Some(secret) => secret,
            None => {
                tracing::warn!("JWT_SECRET not set; using insecure dev default");
                DEV_JWT_SECRET.to_string()
            }
        };

        let secure_cookies = lookup("PARISH_ENV")
            .is_some_and(|env| env.trim().eq_ignore_ascii_case("production"));

        let database_url = lookup("DATABASE_URL").filter(|s| !s.trim().is_empty());

        let mut auth = AuthConfig::default();
        if let Some(secs) = parse_u64(&lookup, "PARISH_IMPERSONATION_TTL_SECS")? {
            auth.impersonation_ttl = Duration::from_secs(secs);
        }
        if let Some(ms) = parse_u64(&lookup, "PARISH_LOOKUP_TIMEOUT_MS")? {
            auth.lookup_timeout = Duration::from_millis(ms);
        }

        Ok(Self {
            bind_addr,
            jwt_secret,
            secure_cookies,
            database_url,
            auth,
        })
    }
}

fn parse_u64(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<u64>, ConfigError> {
    lookup(key)
        .map(|raw| {
            raw.trim().parse::<u64>().map_err(|e| ConfigError::Invalid {
                key,
                message: e.to_string(),
            })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(pairs: &[(&str, &str)]) -> Result<ApiConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ApiConfig::from_lookup(|k| vars.get(k).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let c = config(&[]).unwrap();
        assert_eq!(c.bind_addr.to_string(), "0.0.0.0:8080");
        assert_eq!(c.jwt_secret, DEV_JWT_SECRET);
        assert!(!c.secure_cookies);
        assert!(c.database_url.is_none());
        assert_eq!(c.auth.impersonation_ttl, Duration::from_secs(3600));
        assert_eq!(c.auth.lookup_timeout, Duration::from_secs(5));
    }

    #[test]
    fn production_enables_secure_cookies_and_overrides_apply() {
        let c = config(&[
            ("PARISH_ENV", "Production"),
            ("PARISH_BIND_ADDR", "127.0.0.1:9000"),
            ("PARISH_IMPERSONATION_TTL_SECS", "900"),
            ("PARISH_LOOKUP_TIMEOUT_MS", "250"),
            ("DATABASE_URL", "postgres://localhost/parish"),
        ])
        .unwrap();
        assert!(c.secure_cookies);
        assert_eq!(c.bind_addr.port(), 9000);
        assert_eq!(c.auth.impersonation_ttl, Duration::from_secs(900));
        assert_eq!(c.auth.lookup_timeout, Duration::from_millis(250));
        assert_eq!(c.database_url.as_deref(), Some("postgres://localhost/parish"));
    }

    #[test]
    fn malformed_numbers_are_rejected() {
        let err = config(&[("PARISH_LOOKUP_TIMEOUT_MS", "soon")]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                key: "PARISH_LOOKUP_TIMEOUT_MS",
                ..
            }
        ));
    }
}
