//! Tenant identity administration endpoints.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
};

use parish_auth::{Guard, IdentityChanges, NewIdentity};
use parish_core::IdentityId;

use crate::app::{errors, services::AppServices};

pub async fn list(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(guard): Extension<Guard>,
) -> axum::response::Response {
    match services.administration.list(&guard).await {
        Ok(identities) => Json(serde_json::json!({ "identities": identities })).into_response(),
        Err(e) => errors::auth_error_to_response(e),
    }
}

pub async fn create(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(guard): Extension<Guard>,
    Json(body): Json<NewIdentity>,
) -> axum::response::Response {
    match services.administration.create(&guard, body).await {
        Ok(profile) => (StatusCode::CREATED, Json(profile)).into_response(),
        Err(e) => errors::auth_error_to_response(e),
    }
}

pub async fn update(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(guard): Extension<Guard>,
    Path(id): Path<String>,
    Json(body): Json<IdentityChanges>,
) -> axum::response::Response {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.administration.update(&guard, id, body).await {
        Ok(profile) => Json(profile).into_response(),
        Err(e) => errors::auth_error_to_response(e),
    }
}

pub async fn delete(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(guard): Extension<Guard>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.administration.delete(&guard, id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::auth_error_to_response(e),
    }
}

fn parse_id(raw: &str) -> Result<IdentityId, axum::response::Response> {
    raw.parse()
        .map_err(|e| errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", format!("{e}")))
}
