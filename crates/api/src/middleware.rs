use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use parish_auth::{Guard, SessionResolver};

use crate::app::errors;
use crate::transport;

#[derive(Clone)]
pub struct AuthState {
    pub resolver: SessionResolver,
}

/// Resolve the caller's session and attach a [`Guard`] to the request.
///
/// Runs on every route; a missing or rejected token yields an anonymous
/// guard. Only store failures abort the request.
pub async fn session_middleware(
    State(state): State<AuthState>,
    mut req: Request,
    next: Next,
) -> Response {
    let credentials = transport::request_credentials(req.headers());

    match state.resolver.resolve(&credentials).await {
        Ok(session) => {
            req.extensions_mut().insert(Guard::new(session));
            next.run(req).await
        }
        Err(e) => errors::auth_error_to_response(e),
    }
}

/// Reject requests without an authenticated session (401).
pub async fn require_session(req: Request, next: Next) -> Response {
    let authenticated = req
        .extensions()
        .get::<Guard>()
        .is_some_and(|g| g.require_auth().is_ok());

    if authenticated {
        next.run(req).await
    } else {
        errors::auth_error_to_response(parish_auth::AuthError::NotAuthenticated)
    }
}
