use axum::{
    Router,
    routing::{get, patch, post},
};

use crate::middleware;

pub mod identities;
pub mod impersonation;
pub mod system;

/// Router for all session-aware endpoints.
///
/// `GET /session` and `DELETE /impersonation` also answer anonymous callers;
/// everything else requires an authenticated session.
pub fn router() -> Router {
    let protected = Router::new()
        .route("/whoami", get(system::whoami))
        .route("/authz/explain", get(system::explain))
        .route(
            "/identities",
            get(identities::list).post(identities::create),
        )
        .route(
            "/identities/:id",
            patch(identities::update).delete(identities::delete),
        )
        .route_layer(axum::middleware::from_fn(middleware::require_session));

    Router::new()
        .route("/session", get(system::session))
        .route(
            "/impersonation",
            post(impersonation::start)
                // Only applies to `start`; `stop` clears leftover markers even
                // when the access token has expired.
                .route_layer(axum::middleware::from_fn(middleware::require_session))
                .delete(impersonation::stop),
        )
        .merge(protected)
}
