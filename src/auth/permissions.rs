use axum::http::StatusCode;

use super::{AuthError, Claims};

/// Checks that `claims` grant `permission`. With no permission required the
/// token only has to carry a `permissions` claim.
pub fn check_permissions(permission: Option<&str>, claims: &Claims) -> Result<(), AuthError> {
    let granted = claims.permissions.as_ref().ok_or(AuthError::invalid_header(
        "Permission not in the payload.",
        StatusCode::BAD_REQUEST,
    ))?;

    match permission {
        Some(permission) if !granted.iter().any(|p| p == permission) => {
            Err(AuthError::not_authorized())
        }
        _ => Ok(()),
    }
}
