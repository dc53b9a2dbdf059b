use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{debug, error};
use tracing_subscriber::filter::EnvFilter;

use crate::{
    auth::{JwtVerifier, VerifierSettings},
    http::{app, socket_addr, AppState},
};

pub mod auth;
pub mod environment;
pub mod http;
mod monitoring;

static ENV_KEY_LOG_JSON: &str = "COFFEE_LOG_JSON";

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("failed to install shutdown handler: {:?}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("failed to install signal handler: {:?}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    debug!("🔽 signal received, starting graceful shutdown");
}

/// Installs the global tracing subscriber. `RUST_LOG` replaces the default
/// `coffee_gate=info`; `COFFEE_LOG_JSON=true` switches to JSON lines.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("coffee_gate=info"));
    let json = log_json(|key| dotenvy::var(key).ok());

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Unset or unparsable values keep the plain text format.
fn log_json<F>(lookup: F) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    lookup(ENV_KEY_LOG_JSON)
        .and_then(|value| environment::parse_flag(&value).ok())
        .unwrap_or(false)
}

pub async fn run_coffee_gate() -> Result<()> {
    let environment = environment::load()?;
    let settings = VerifierSettings::from_environment(environment, |key| dotenvy::var(key).ok())?;
    let verifier = Arc::new(JwtVerifier::new(settings)?);
    let bind_addr = socket_addr()?;
    let app = app(AppState {
        environment,
        verifier,
    });

    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("Binding {bind_addr}"))?;
    tracing::info!("💈 Listening on http://{}", &bind_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}
