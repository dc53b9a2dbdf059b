use axum::http::{header::AUTHORIZATION, HeaderMap, StatusCode};

use super::AuthError;

/// Extracts the raw token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::header_missing())?;
    let value = value.to_str().map_err(|_| {
        AuthError::invalid_header(
            "Authorization header must be bearer token.",
            StatusCode::UNAUTHORIZED,
        )
    })?;

    let parts: Vec<&str> = value.split(' ').collect();
    if !parts[0].eq_ignore_ascii_case("bearer") {
        return Err(AuthError::invalid_header(
            "Authorization header must start with \"Bearer\".",
            StatusCode::UNAUTHORIZED,
        ));
    }
    match parts.as_slice() {
        [_] => Err(AuthError::invalid_header(
            "Token not found.",
            StatusCode::UNAUTHORIZED,
        )),
        [_, token] => Ok(*token),
        _ => Err(AuthError::invalid_header(
            "Authorization header must be bearer token.",
            StatusCode::UNAUTHORIZED,
        )),
    }
}
