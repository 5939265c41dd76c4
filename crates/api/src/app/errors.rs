use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use parish_auth::AuthError;

pub fn auth_error_to_response(err: AuthError) -> axum::response::Response {
    match err {
        AuthError::NotAuthenticated => json_error(
            StatusCode::UNAUTHORIZED,
            "not_authenticated",
            "authentication required",
        ),
        AuthError::NoTenant => json_error(
            StatusCode::FORBIDDEN,
            "no_tenant",
            "authenticated identity has no tenant membership",
        ),
        AuthError::Forbidden(msg) => json_error(StatusCode::FORBIDDEN, "forbidden", msg),
        AuthError::NotFound(what) => {
            json_error(StatusCode::NOT_FOUND, "not_found", format!("{what} not found"))
        }
        e @ AuthError::LastAdministratorViolation => {
            json_error(StatusCode::BAD_REQUEST, "last_administrator", e.to_string())
        }
        e @ AuthError::SelfDeletion => {
            json_error(StatusCode::BAD_REQUEST, "self_deletion", e.to_string())
        }
        AuthError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        AuthError::Domain(e) => {
            json_error(StatusCode::BAD_REQUEST, "validation_error", e.to_string())
        }
        AuthError::StoreUnavailable(detail) => {
            tracing::error!(%detail, "request failed on an unavailable store");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "store_unavailable",
                "identity services are temporarily unavailable",
            )
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_error_kind() {
        let cases = [
            (AuthError::NotAuthenticated, StatusCode::UNAUTHORIZED),
            (AuthError::NoTenant, StatusCode::FORBIDDEN),
            (AuthError::forbidden("x"), StatusCode::FORBIDDEN),
            (AuthError::not_found("identity"), StatusCode::NOT_FOUND),
            (AuthError::LastAdministratorViolation, StatusCode::BAD_REQUEST),
            (AuthError::SelfDeletion, StatusCode::BAD_REQUEST),
            (AuthError::Conflict("dup".into()), StatusCode::CONFLICT),
            (
                AuthError::StoreUnavailable("down".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(auth_error_to_response(err).status(), status);
        }
    }
}
