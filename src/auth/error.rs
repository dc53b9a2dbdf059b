use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Request-time authentication or authorization failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code}: {description}")]
pub struct AuthError {
    code: &'static str,
    description: &'static str,
    status: StatusCode,
}

#[derive(Debug, Serialize)]
struct AuthErrorBody {
    success: bool,
    error: u16,
    code: &'static str,
    message: &'static str,
}

impl AuthError {
    pub(crate) const fn new(code: &'static str, description: &'static str, status: StatusCode) -> Self {
        Self {
            code,
            description,
            status,
        }
    }

    pub fn code(&self) -> &'static str {
        self.code
    }

    pub fn description(&self) -> &'static str {
        self.description
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub(crate) const fn header_missing() -> Self {
        Self::new(
            "authorization_header_missing",
            "Authorization header is missing.",
            StatusCode::UNAUTHORIZED,
        )
    }

    pub(crate) const fn invalid_header(description: &'static str, status: StatusCode) -> Self {
        Self::new("invalid_header", description, status)
    }

    pub(crate) const fn unparsable_token() -> Self {
        Self::invalid_header(
            "Unable to parse authentication token.",
            StatusCode::BAD_REQUEST,
        )
    }

    pub(crate) const fn token_expired() -> Self {
        Self::new("token_expired", "Token expired.", StatusCode::UNAUTHORIZED)
    }

    pub(crate) const fn invalid_claims() -> Self {
        Self::new(
            "invalid_claims",
            "Incorrect claims. Please, check the audience and issuer.",
            StatusCode::UNAUTHORIZED,
        )
    }

    pub(crate) const fn not_authorized() -> Self {
        Self::new(
            "not_authorized",
            "Do not have permission.",
            StatusCode::FORBIDDEN,
        )
    }

    pub(crate) const fn jwks_unavailable() -> Self {
        Self::new(
            "jwks_unavailable",
            "Unable to load signing keys.",
            StatusCode::SERVICE_UNAVAILABLE,
        )
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let body = AuthErrorBody {
            success: false,
            error: self.status.as_u16(),
            code: self.code,
            message: self.description,
        };
        (self.status, Json(body)).into_response()
    }
}
