use std::{
    net::{IpAddr, SocketAddr},
    str::FromStr,
    sync::Arc,
};

use anyhow::{Context, Result};
use axum::{
    extract::{FromRef, State},
    routing::get,
    Json, Router,
};
use axum_macros::debug_handler;
use tower_http::trace::TraceLayer;

use crate::{
    auth::{auth_routes, JwtVerifier},
    environment::Environment,
    monitoring::health_routes,
};

pub(crate) static ENV_KEY_BIND_PORT: &str = "COFFEE_BIND_PORT";
pub(crate) static ENV_KEY_BIND_ADDRESS: &str = "COFFEE_BIND_ADDRESS";

#[derive(Clone)]
pub struct AppState {
    pub environment: &'static Environment,
    pub verifier: Arc<JwtVerifier>,
}

impl FromRef<AppState> for &'static Environment {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.environment
    }
}

impl FromRef<AppState> for Arc<JwtVerifier> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.verifier.clone()
    }
}

pub fn socket_addr() -> Result<SocketAddr> {
    socket_addr_from(|key| dotenvy::var(key).ok())
}

pub(crate) fn socket_addr_from<F>(lookup: F) -> Result<SocketAddr>
where
    F: Fn(&str) -> Option<String>,
{
    let port_str = lookup(ENV_KEY_BIND_PORT).unwrap_or_else(|| String::from("3000"));
    let port_parsed = port_str
        .parse::<u16>()
        .context("COFFEE_BIND_PORT must be a number between 1 and 65535")?;

    let interface_addr = lookup(ENV_KEY_BIND_ADDRESS).unwrap_or_else(|| String::from("::"));
    let ip = IpAddr::from_str(interface_addr.as_str())
        .with_context(|| format!("Invalid address {}", interface_addr))?;
    Ok(SocketAddr::new(ip, port_parsed))
}

#[debug_handler]
async fn environment_document(
    State(environment): State<&'static Environment>,
) -> Json<&'static Environment> {
    Json(environment)
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/environment", get(environment_document))
        .with_state(state.environment)
        .nest("/auth", auth_routes(state.clone()))
        .nest("/app", health_routes(state.verifier.clone()))
        .layer(TraceLayer::new_for_http())
}
