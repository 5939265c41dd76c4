use std::sync::Arc;

use axum::{
    Json,
    extract::Extension,
    http::{StatusCode, header},
    response::{AppendHeaders, IntoResponse},
};
use chrono::Utc;
use serde::Deserialize;

use parish_auth::Guard;
use parish_core::IdentityId;

use crate::app::{errors, services::AppServices};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartImpersonation {
    pub target_id: String,
}

/// POST /impersonation - start acting as another identity of the tenant.
pub async fn start(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(guard): Extension<Guard>,
    Json(body): Json<StartImpersonation>,
) -> axum::response::Response {
    let target_id: IdentityId = match body.target_id.parse() {
        Ok(id) => id,
        Err(e) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", format!("{e}"));
        }
    };

    let now = Utc::now();
    let started = match services.impersonation.start(&guard, target_id, now).await {
        Ok(s) => s,
        Err(e) => return errors::auth_error_to_response(e),
    };

    let cookies = services.cookies.marker_cookies(&started.markers, now);
    (
        StatusCode::OK,
        AppendHeaders(cookies.into_iter().map(|c| (header::SET_COOKIE, c))),
        Json(serde_json::json!({ "impersonating": started.target })),
    )
        .into_response()
}

/// DELETE /impersonation - stop impersonating; succeeds when nothing is active.
pub async fn stop(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(guard): Extension<Guard>,
) -> axum::response::Response {
    let update = services.impersonation.stop(&guard);
    let cookies = services.cookies.marker_cookies(&update, Utc::now());
    (
        StatusCode::OK,
        AppendHeaders(cookies.into_iter().map(|c| (header::SET_COOKIE, c))),
        Json(serde_json::json!({ "impersonating": null })),
    )
        .into_response()
}
