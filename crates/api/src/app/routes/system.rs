use axum::{
    Json,
    extract::{Extension, Query},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;

use parish_auth::{Guard, Permission, Session, explain_permission};

use crate::app::errors;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

/// GET /session - the caller's session view, `null` when logged out.
pub async fn session(Extension(guard): Extension<Guard>) -> impl IntoResponse {
    Json(serde_json::json!({
        "session": guard.session().map(Session::view),
    }))
}

/// GET /whoami - effective identity, tenant and role.
pub async fn whoami(Extension(guard): Extension<Guard>) -> axum::response::Response {
    let session = match guard.require_auth() {
        Ok(s) => s,
        Err(e) => return errors::auth_error_to_response(e),
    };

    Json(serde_json::json!({
        "identity_id": session.effective_identity_id().to_string(),
        "original_identity_id": session.original_identity_id().to_string(),
        "tenant_id": session.tenant_id().map(|t| t.to_string()),
        "role": session.role(),
        "permissions": session.permissions().granted(),
    }))
    .into_response()
}

#[derive(Debug, Deserialize)]
pub struct ExplainQuery {
    pub permission: String,
}

/// GET /authz/explain?permission=.. - why a permission is granted or denied.
pub async fn explain(
    Extension(guard): Extension<Guard>,
    Query(query): Query<ExplainQuery>,
) -> axum::response::Response {
    let permission: Permission = match query.permission.parse() {
        Ok(p) => p,
        Err(e) => {
            return errors::json_error(
                StatusCode::BAD_REQUEST,
                "invalid_permission",
                format!("{e}"),
            );
        }
    };

    Json(explain_permission(guard.session(), permission)).into_response()
}
