//! Cookie/header encoding of session credentials and impersonation markers.
//!
//! The access token may come from `Authorization: Bearer` or a cookie; the
//! refresh token and both impersonation markers only travel as cookies.

use axum::http::{HeaderMap, header};
use chrono::{DateTime, Utc};

use parish_auth::{ImpersonationMarkers, MarkerUpdate, RequestCredentials};
use parish_core::IdentityId;

pub const ACCESS_TOKEN_COOKIE: &str = "parish_access_token";
pub const REFRESH_TOKEN_COOKIE: &str = "parish_refresh_token";
pub const ORIGINAL_IDENTITY_COOKIE: &str = "parish_impersonation_original";
pub const TARGET_IDENTITY_COOKIE: &str = "parish_impersonation_target";

/// Read everything the resolver needs from the request headers.
pub fn request_credentials(headers: &HeaderMap) -> RequestCredentials {
    let access_token = extract_bearer(headers)
        .map(str::to_string)
        .or_else(|| parse_cookie(headers, ACCESS_TOKEN_COOKIE));

    RequestCredentials {
        access_token,
        refresh_token: parse_cookie(headers, REFRESH_TOKEN_COOKIE),
        markers: ImpersonationMarkers {
            original: parse_marker(headers, ORIGINAL_IDENTITY_COOKIE),
            target: parse_marker(headers, TARGET_IDENTITY_COOKIE),
        },
    }
}

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let token = headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")?
        .trim();
    (!token.is_empty()).then_some(token)
}

/// First value of cookie `name` across all `Cookie` headers.
pub fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|s| s.split(';'))
        .find_map(|part| {
            let (k, v) = part.trim().split_once('=')?;
            (k == name && !v.is_empty()).then(|| v.to_string())
        })
}

/// Unparseable marker values count as absent.
fn parse_marker(headers: &HeaderMap, name: &str) -> Option<IdentityId> {
    let raw = parse_cookie(headers, name)?;
    match raw.parse() {
        Ok(id) => Some(id),
        Err(e) => {
            tracing::debug!(cookie = name, error = %e, "ignoring malformed impersonation marker");
            None
        }
    }
}

/// Attributes applied to every cookie the API writes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CookiePolicy {
    pub secure: bool,
}

impl CookiePolicy {
    /// `Set-Cookie` values that persist `update` on the client.
    pub fn marker_cookies(&self, update: &MarkerUpdate, now: DateTime<Utc>) -> Vec<String> {
        match update {
            MarkerUpdate::Set {
                original, target, ..
            } => {
                let max_age = update.max_age(now).map(|d| d.as_secs()).unwrap_or(0);
                vec![
                    self.set_cookie(ORIGINAL_IDENTITY_COOKIE, &original.to_string(), max_age),
                    self.set_cookie(TARGET_IDENTITY_COOKIE, &target.to_string(), max_age),
                ]
            }
            MarkerUpdate::Clear => vec![
                self.clear_cookie(ORIGINAL_IDENTITY_COOKIE),
                self.clear_cookie(TARGET_IDENTITY_COOKIE),
            ],
        }
    }

    fn set_cookie(&self, name: &str, value: &str, max_age: u64) -> String {
        format!(
            "{name}={value}; Max-Age={max_age}; HttpOnly; SameSite=Lax; Path=/{}",
            self.secure_suffix()
        )
    }

    fn clear_cookie(&self, name: &str) -> String {
        format!(
            "{name}=; Max-Age=0; Expires=Thu, 01 Jan 1970 00:00:00 GMT; HttpOnly; SameSite=Lax; Path=/{}",
            self.secure_suffix()
        )
    }

    fn secure_suffix(&self) -> &'static str {
        if self.secure { "; Secure" } else { "" }
    }
}
