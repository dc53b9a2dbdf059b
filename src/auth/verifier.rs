use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use axum::http::StatusCode;
use jsonwebtoken::{
    decode, decode_header, errors::ErrorKind, jwk::JwkSet, Algorithm, DecodingKey, Validation,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, error, trace};

use super::AuthError;
use crate::environment::Environment;

pub(crate) static ENV_KEY_JWKS_URL: &str = "COFFEE_JWKS_URL";
pub(crate) static ENV_KEY_JWKS_CACHE_SECS: &str = "COFFEE_JWKS_CACHE_SECS";
pub(crate) static ENV_KEY_JWT_LEEWAY_SECS: &str = "COFFEE_JWT_LEEWAY_SECS";
pub(crate) static ENV_KEY_JWKS_MIN_REFRESH_SECS: &str = "COFFEE_JWKS_MIN_REFRESH_SECS";

const DEFAULT_JWKS_CACHE_SECS: u64 = 600;
const DEFAULT_JWT_LEEWAY_SECS: u64 = 60;
const DEFAULT_JWKS_MIN_REFRESH_SECS: u64 = 5;

/// `aud` may be a single value or a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iss: String,
    pub aud: Audience,
    pub exp: u64,
    #[serde(default)]
    pub iat: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

#[derive(Debug, Clone)]
pub struct VerifierSettings {
    jwks_url: String,
    issuer: String,
    audience: String,
    cache_ttl: Duration,
    min_refresh_interval: Duration,
    leeway: u64,
}

fn secs_from<F>(lookup: &F, key: &str, default: u64) -> Result<u64>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(value) => value
            .parse::<u64>()
            .with_context(|| format!("{key} must be a number")),
        None => Ok(default),
    }
}

impl VerifierSettings {
    pub fn from_environment<F>(environment: &Environment, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let auth0 = environment.auth0();
        let jwks_url = lookup(ENV_KEY_JWKS_URL).unwrap_or_else(|| auth0.jwks_url());
        url::Url::parse(&jwks_url).with_context(|| format!("Invalid JWKS url {jwks_url}"))?;

        let cache_secs = secs_from(&lookup, ENV_KEY_JWKS_CACHE_SECS, DEFAULT_JWKS_CACHE_SECS)?;
        let min_refresh_secs = secs_from(
            &lookup,
            ENV_KEY_JWKS_MIN_REFRESH_SECS,
            DEFAULT_JWKS_MIN_REFRESH_SECS,
        )?;
        let leeway = secs_from(&lookup, ENV_KEY_JWT_LEEWAY_SECS, DEFAULT_JWT_LEEWAY_SECS)?;

        Ok(Self {
            jwks_url,
            issuer: auth0.issuer(),
            audience: auth0.audience().to_string(),
            cache_ttl: Duration::from_secs(cache_secs),
            min_refresh_interval: Duration::from_secs(min_refresh_secs),
            leeway,
        })
    }

    pub fn jwks_url(&self) -> &str {
        &self.jwks_url
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn audience(&self) -> &str {
        &self.audience
    }
}

struct CachedKeys {
    fetched_at: Instant,
    keys: Arc<JwkSet>,
}

/// Verifies RS256 access tokens against the identity provider's key set.
pub struct JwtVerifier {
    settings: VerifierSettings,
    client: reqwest::Client,
    cache: RwLock<Option<CachedKeys>>,
}

impl JwtVerifier {
    pub fn new(settings: VerifierSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .context("Building JWKS http client")?;
        debug!(
            "🔑 Verifying tokens for audience `{}` issued by {}",
            settings.audience, settings.issuer
        );
        Ok(Self {
            settings,
            client,
            cache: RwLock::new(None),
        })
    }

    pub fn settings(&self) -> &VerifierSettings {
        &self.settings
    }

    /// Loads the key set from the identity provider, bypassing the cache.
    pub async fn fetch_keys(&self) -> Result<JwkSet, AuthError> {
        let url = self.settings.jwks_url.as_str();
        debug!("🔎 Loading signing keys from {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| {
                error!("Failed to fetch JWKS from {}: {:?}", url, e);
                AuthError::jwks_unavailable()
            })?;
        let keys: JwkSet = response.json().await.map_err(|e| {
            error!("Failed to parse JWKS from {}: {:?}", url, e);
            AuthError::jwks_unavailable()
        })?;
        trace!("Loaded {} signing keys", keys.keys.len());
        Ok(keys)
    }

    /// Cached key set. A forced refresh is skipped while the cached set is
    /// younger than the minimum refresh interval.
    async fn keys(&self, force_refresh: bool) -> Result<Arc<JwkSet>, AuthError> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref() {
                let age = cached.fetched_at.elapsed();
                if !force_refresh && age < self.settings.cache_ttl {
                    return Ok(cached.keys.clone());
                }
                if force_refresh && age < self.settings.min_refresh_interval {
                    trace!("Signing keys loaded {:?} ago, refresh skipped", age);
                    return Ok(cached.keys.clone());
                }
            }
        }

        let keys = Arc::new(self.fetch_keys().await?);
        *self.cache.write().await = Some(CachedKeys {
            fetched_at: Instant::now(),
            keys: keys.clone(),
        });
        Ok(keys)
    }

    pub async fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let header = decode_header(token).map_err(|e| {
            debug!("Token header is not decodable: {:?}", e);
            AuthError::unparsable_token()
        })?;
        let kid = header.kid.ok_or(AuthError::invalid_header(
            "Authorization malformed.",
            StatusCode::UNAUTHORIZED,
        ))?;

        let jwk = match self.keys(false).await?.find(&kid).cloned() {
            Some(jwk) => jwk,
            None => {
                debug!("Unknown key id `{}`, refreshing signing keys", kid);
                self.keys(true)
                    .await?
                    .find(&kid)
                    .cloned()
                    .ok_or(AuthError::invalid_header(
                        "Unable to find the appropriate key.",
                        StatusCode::BAD_REQUEST,
                    ))?
            }
        };
        let key = DecodingKey::from_jwk(&jwk).map_err(|e| {
            error!("Signing key `{}` is not usable: {:?}", kid, e);
            AuthError::unparsable_token()
        })?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[self.settings.audience.as_str()]);
        validation.set_issuer(&[self.settings.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "aud", "iss"]);
        validation.leeway = self.settings.leeway;

        let data = decode::<Value>(token, &key, &validation).map_err(|e| {
            debug!("Token rejected: {:?}", e);
            match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::token_expired(),
                ErrorKind::InvalidAudience
                | ErrorKind::InvalidIssuer
                | ErrorKind::ImmatureSignature
                | ErrorKind::MissingRequiredClaim(_) => AuthError::invalid_claims(),
                _ => AuthError::unparsable_token(),
            }
        })?;
        let claims: Claims = serde_json::from_value(data.claims).map_err(|e| {
            debug!("Token claims have an unexpected shape: {:?}", e);
            AuthError::invalid_claims()
        })?;
        debug!("Token accepted for {}", claims.sub);
        Ok(claims)
    }
}
