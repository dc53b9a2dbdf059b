use anyhow::{bail, Context, Result};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use axum_macros::debug_handler;
use serde::Deserialize;
use tracing::{debug, error};
use url::Url;

use crate::{
    environment::{Auth0Settings, Environment},
    http::AppState,
};

pub(crate) static DEFAULT_CALLBACK_PATH: &str = "/tabs/user-page";

/// Authorize URL of the implicit flow the front-end starts its login with.
/// `callback_path` must be an absolute path so the redirect stays on the
/// callback host.
pub fn login_url(auth0: &Auth0Settings, callback_path: &str) -> Result<Url> {
    if !is_callback_path(callback_path) {
        bail!("Callback path must start with `/`: {callback_path}");
    }
    let redirect_uri = format!("{}{}", auth0.callback_url(), callback_path);
    let authorize_endpoint = format!("https://{}/authorize", auth0.domain());
    Url::parse_with_params(
        &authorize_endpoint,
        &[
            ("audience", auth0.audience()),
            ("response_type", "token"),
            ("client_id", auth0.client_id()),
            ("redirect_uri", redirect_uri.as_str()),
        ],
    )
    .with_context(|| format!("Building login url from {authorize_endpoint}"))
}

fn is_callback_path(callback_path: &str) -> bool {
    callback_path.starts_with('/')
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginQueryParams {
    callback_path: Option<String>,
}

#[debug_handler(state = AppState)]
pub(crate) async fn login(
    State(environment): State<&'static Environment>,
    Query(params): Query<LoginQueryParams>,
) -> Result<Response, Response> {
    let callback_path = params
        .callback_path
        .as_deref()
        .unwrap_or(DEFAULT_CALLBACK_PATH);
    if !is_callback_path(callback_path) {
        debug!("Rejecting callback path {}", callback_path);
        return Err((StatusCode::BAD_REQUEST, "Invalid callback path").into_response());
    }
    let url = login_url(environment.auth0(), callback_path).map_err(|e| {
        error!("Failed to build login url {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Server failure").into_response()
    })?;

    debug!("login redirecting to {}", url);
    Ok(Redirect::to(url.as_str()).into_response())
}
