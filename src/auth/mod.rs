mod error;
mod guard;
mod header;
mod login;
mod permissions;
mod verifier;

pub use error::AuthError;
pub use guard::{requires_auth, Authenticated, PermissionGuard};
pub use header::bearer_token;
pub use login::login_url;
pub use permissions::check_permissions;
pub use verifier::{Audience, Claims, JwtVerifier, VerifierSettings};

use axum::{
    extract::Path,
    middleware,
    routing::get,
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::http::AppState;

use self::login::login;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct PermissionCheckResponse {
    pub(crate) success: bool,
    pub(crate) permission: String,
}

async fn claims(Extension(claims): Extension<Claims>) -> Json<Claims> {
    Json(claims)
}

async fn check(
    Authenticated(claims): Authenticated,
    Path(permission): Path<String>,
) -> Result<Json<PermissionCheckResponse>, AuthError> {
    check_permissions(Some(permission.as_str()), &claims)?;
    Ok(Json(PermissionCheckResponse {
        success: true,
        permission,
    }))
}

pub(crate) fn auth_routes(state: AppState) -> Router {
    let authenticated = PermissionGuard::new(state.verifier.clone(), None);
    Router::new()
        .route("/login", get(login))
        .route(
            "/claims",
            get(claims).route_layer(middleware::from_fn_with_state(
                authenticated,
                requires_auth,
            )),
        )
        .route("/check/{permission}", get(check))
        .with_state(state)
}
