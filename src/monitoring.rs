use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tracing::error;

use crate::auth::JwtVerifier;

async fn health_check(State(verifier): State<Arc<JwtVerifier>>) -> Response {
    if let Err(err) = verifier.fetch_keys().await {
        error!("Identity provider keys unavailable: {}", err);
        return (StatusCode::SERVICE_UNAVAILABLE, "Unhealthy").into_response();
    }

    (StatusCode::OK, "OK").into_response()
}

pub(crate) fn health_routes(verifier: Arc<JwtVerifier>) -> Router {
    Router::new()
        .route("/up", get(|| async { "up" }))
        .route("/health", get(health_check))
        .with_state(verifier)
}
