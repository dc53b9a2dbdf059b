use std::sync::Arc;

use axum::{
    extract::{FromRef, FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};

use super::{bearer_token, check_permissions, AuthError, Claims, JwtVerifier};

/// State for [`requires_auth`]: which verifier to use and which permission a
/// route demands. `None` only requires a verified token.
#[derive(Clone)]
pub struct PermissionGuard {
    verifier: Arc<JwtVerifier>,
    permission: Option<String>,
}

impl PermissionGuard {
    pub fn new(verifier: Arc<JwtVerifier>, permission: Option<&str>) -> Self {
        Self {
            verifier,
            permission: permission.map(String::from),
        }
    }
}

/// Middleware rejecting requests without a valid bearer token carrying the
/// guarded permission. Verified claims are stored in the request extensions.
pub async fn requires_auth(
    State(guard): State<PermissionGuard>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let token = bearer_token(request.headers())?.to_owned();
    let claims = guard.verifier.verify(&token).await?;
    check_permissions(guard.permission.as_deref(), &claims)?;
    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}

/// Claims of a verified bearer token. Reuses claims already verified by
/// [`requires_auth`] when present.
pub struct Authenticated(pub Claims);

impl<S> FromRequestParts<S> for Authenticated
where
    Arc<JwtVerifier>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(claims) = parts.extensions.get::<Claims>() {
            return Ok(Self(claims.clone()));
        }
        let verifier = Arc::<JwtVerifier>::from_ref(state);
        let token = bearer_token(&parts.headers)?.to_owned();
        Ok(Self(verifier.verify(&token).await?))
    }
}
