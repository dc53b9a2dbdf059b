//! Deployment environment handed to the front-end at startup.
//!
//! The record is assembled once per process: a base record (the development
//! defaults or a JSON file supplied at deploy time), then per-field
//! overrides from `COFFEE_*` variables. After validation it never changes.

use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

pub(crate) static ENV_KEY_ENVIRONMENT_FILE: &str = "COFFEE_ENVIRONMENT_FILE";
pub(crate) static ENV_KEY_PRODUCTION: &str = "COFFEE_PRODUCTION";
pub(crate) static ENV_KEY_API_SERVER_URL: &str = "COFFEE_API_SERVER_URL";
pub(crate) static ENV_KEY_AUTH0_URL: &str = "COFFEE_AUTH0_URL";
pub(crate) static ENV_KEY_AUTH0_AUDIENCE: &str = "COFFEE_AUTH0_AUDIENCE";
pub(crate) static ENV_KEY_AUTH0_CLIENT_ID: &str = "COFFEE_AUTH0_CLIENT_ID";
pub(crate) static ENV_KEY_AUTH0_CALLBACK_URL: &str = "COFFEE_AUTH0_CALLBACK_URL";

const AUTH0_HOST_SUFFIX: &str = "auth0.com";

static ENVIRONMENT: OnceCell<Environment> = OnceCell::new();

/// Returns the process-wide environment, building it from the process
/// environment on first use. Every later call returns the same reference.
pub fn load() -> Result<&'static Environment> {
    ENVIRONMENT.get_or_try_init(Environment::from_env)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Environment {
    production: bool,
    api_server_url: String,
    auth0: Auth0Settings,
}

/// Identity provider parameters used by the login flow and token checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Auth0Settings {
    url: String,
    audience: String,
    #[serde(rename = "clientId")]
    client_id: String,
    #[serde(rename = "callbackURL")]
    callback_url: String,
}

impl Environment {
    pub fn development() -> Self {
        Self {
            production: false,
            api_server_url: String::from("http://127.0.0.1:5000"),
            auth0: Auth0Settings {
                url: String::from("dev-77o3o6xxp1gqs14e"),
                audience: String::from("coffee"),
                client_id: String::from("ZP5NVyFMNrKCXz668pd42kl0gqvff5Ge"),
                callback_url: String::from("http://localhost:8100"),
            },
        }
    }

    pub fn from_json(body: &str) -> Result<Self> {
        let environment: Environment =
            serde_json::from_str(body).context("Parsing environment document")?;
        environment.validate()?;
        Ok(environment)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let body = std::fs::read_to_string(path)
            .with_context(|| format!("Reading environment file {}", path.display()))?;
        Self::from_json(&body).with_context(|| format!("Loading {}", path.display()))
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| dotenvy::var(key).ok())
    }

    /// Builds the environment from `lookup`, which maps a variable name to
    /// its value. Overrides are applied on top of the base record.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut environment = match lookup(ENV_KEY_ENVIRONMENT_FILE) {
            Some(path) => {
                debug!("📄 Loading environment from {}", path);
                Self::from_json_file(&path)?
            }
            None => Self::development(),
        };

        if let Some(value) = lookup(ENV_KEY_PRODUCTION) {
            environment.production = parse_flag(&value)
                .with_context(|| format!("{ENV_KEY_PRODUCTION} must be true or false"))?;
        }
        if let Some(value) = lookup(ENV_KEY_API_SERVER_URL) {
            environment.api_server_url = value;
        }
        if let Some(value) = lookup(ENV_KEY_AUTH0_URL) {
            environment.auth0.url = value;
        }
        if let Some(value) = lookup(ENV_KEY_AUTH0_AUDIENCE) {
            environment.auth0.audience = value;
        }
        if let Some(value) = lookup(ENV_KEY_AUTH0_CLIENT_ID) {
            environment.auth0.client_id = value;
        }
        if let Some(value) = lookup(ENV_KEY_AUTH0_CALLBACK_URL) {
            environment.auth0.callback_url = value;
        }

        environment.validate()?;
        debug!(
            "Environment ready (production: {}, api server: {})",
            environment.production, environment.api_server_url
        );
        Ok(environment)
    }

    pub fn validate(&self) -> Result<()> {
        absolute_url(&self.api_server_url).context("apiServerUrl")?;
        absolute_url(&self.auth0.callback_url).context("auth0.callbackURL")?;
        non_empty(&self.auth0.url).context("auth0.url")?;
        non_empty(&self.auth0.audience).context("auth0.audience")?;
        non_empty(&self.auth0.client_id).context("auth0.clientId")?;
        Ok(())
    }

    pub fn production(&self) -> bool {
        self.production
    }

    pub fn api_server_url(&self) -> &str {
        &self.api_server_url
    }

    pub fn auth0(&self) -> &Auth0Settings {
        &self.auth0
    }
}

impl Auth0Settings {
    /// Domain prefix as configured, e.g. `dev-77o3o6xxp1gqs14e`.
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn audience(&self) -> &str {
        &self.audience
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn callback_url(&self) -> &str {
        &self.callback_url
    }

    /// Full identity provider host. A prefix is expanded with `.auth0.com`,
    /// a value that already names the host is used verbatim.
    pub fn domain(&self) -> String {
        if self.url.ends_with(AUTH0_HOST_SUFFIX) {
            self.url.clone()
        } else {
            format!("{}.{}", self.url, AUTH0_HOST_SUFFIX)
        }
    }

    pub fn issuer(&self) -> String {
        format!("https://{}/", self.domain())
    }

    pub fn jwks_url(&self) -> String {
        format!("https://{}/.well-known/jwks.json", self.domain())
    }
}

pub(crate) fn parse_flag(value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        other => Err(anyhow!("Invalid flag value `{other}`")),
    }
}

fn absolute_url(value: &str) -> Result<()> {
    let url = Url::parse(value).with_context(|| format!("`{value}` is not an absolute URL"))?;
    match url.scheme() {
        "http" | "https" => {}
        scheme => bail!("Unsupported scheme `{scheme}` in `{value}`"),
    }
    if url.host().is_none() {
        bail!("Missing host in `{value}`");
    }
    Ok(())
}

fn non_empty(value: &str) -> Result<()> {
    if value.trim().is_empty() {
        bail!("Value must not be empty");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, io::Write};

    use serde_json::{json, Value};

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn development_values_match_the_starter_configuration() {
        let environment = Environment::development();

        assert!(!environment.production());
        assert_eq!(environment.api_server_url(), "http://127.0.0.1:5000");
        assert_eq!(environment.auth0().url(), "dev-77o3o6xxp1gqs14e");
        assert_eq!(environment.auth0().audience(), "coffee");
        assert_eq!(
            environment.auth0().client_id(),
            "ZP5NVyFMNrKCXz668pd42kl0gqvff5Ge"
        );
        assert_eq!(environment.auth0().callback_url(), "http://localhost:8100");
        assert!(environment.validate().is_ok());
    }

    #[test]
    fn serializes_to_the_exported_shape() {
        let value = serde_json::to_value(Environment::development()).expect("Serialize");

        assert_eq!(
            value,
            json!({
                "production": false,
                "apiServerUrl": "http://127.0.0.1:5000",
                "auth0": {
                    "url": "dev-77o3o6xxp1gqs14e",
                    "audience": "coffee",
                    "clientId": "ZP5NVyFMNrKCXz668pd42kl0gqvff5Ge",
                    "callbackURL": "http://localhost:8100"
                }
            })
        );
        let top = value.as_object().expect("object");
        let nested = top["auth0"].as_object().expect("object");
        assert_eq!(top.len() - 1 + nested.len(), 6, "six leaf fields");
        assert!(matches!(top["production"], Value::Bool(_)));
    }

    #[test]
    fn json_document_roundtrips_through_validation() {
        let body = serde_json::to_string(&Environment::development()).expect("Serialize");
        let parsed = Environment::from_json(&body).expect("Parse");
        assert_eq!(parsed, Environment::development());
    }

    #[test]
    fn rejects_unknown_fields() {
        let body = r#"{
            "production": true,
            "apiServerUrl": "https://api.example.com",
            "debug": true,
            "auth0": {"url": "x", "audience": "a", "clientId": "c", "callbackURL": "https://app.example.com"}
        }"#;
        assert!(Environment::from_json(body).is_err());
    }

    #[test]
    fn rejects_missing_fields() {
        let body = r#"{
            "production": true,
            "apiServerUrl": "https://api.example.com",
            "auth0": {"url": "x", "audience": "a", "callbackURL": "https://app.example.com"}
        }"#;
        assert!(Environment::from_json(body).is_err());
    }

    #[test]
    fn rejects_non_boolean_production() {
        let body = r#"{
            "production": "yes",
            "apiServerUrl": "https://api.example.com",
            "auth0": {"url": "x", "audience": "a", "clientId": "c", "callbackURL": "https://app.example.com"}
        }"#;
        assert!(Environment::from_json(body).is_err());
    }

    #[test]
    fn rejects_relative_urls() {
        let environment = Environment::from_lookup(lookup_from(&[(
            ENV_KEY_API_SERVER_URL,
            "/api",
        )]));
        let err = environment.expect_err("relative url should fail");
        assert!(format!("{err:#}").contains("apiServerUrl"), "{err:#}");
    }

    #[test]
    fn rejects_non_http_schemes() {
        let environment = Environment::from_lookup(lookup_from(&[(
            ENV_KEY_AUTH0_CALLBACK_URL,
            "ftp://localhost:8100",
        )]));
        let err = environment.expect_err("ftp url should fail");
        assert!(format!("{err:#}").contains("auth0.callbackURL"), "{err:#}");
    }

    #[test]
    fn rejects_empty_audience() {
        let environment =
            Environment::from_lookup(lookup_from(&[(ENV_KEY_AUTH0_AUDIENCE, "  ")]));
        assert!(environment.is_err());
    }

    #[test]
    fn lookup_without_variables_yields_development() {
        let environment = Environment::from_lookup(|_| None).expect("defaults");
        assert_eq!(environment, Environment::development());
    }

    #[test]
    fn overrides_are_applied_verbatim() {
        let environment = Environment::from_lookup(lookup_from(&[
            (ENV_KEY_PRODUCTION, "TRUE"),
            (ENV_KEY_API_SERVER_URL, "https://api.coffee.example"),
            (ENV_KEY_AUTH0_URL, "coffee-prod.eu"),
            (ENV_KEY_AUTH0_AUDIENCE, "coffee-api"),
            (ENV_KEY_AUTH0_CLIENT_ID, "client-123"),
            (ENV_KEY_AUTH0_CALLBACK_URL, "https://coffee.example"),
        ]))
        .expect("overrides");

        assert!(environment.production());
        assert_eq!(environment.api_server_url(), "https://api.coffee.example");
        assert_eq!(environment.auth0().url(), "coffee-prod.eu");
        assert_eq!(environment.auth0().audience(), "coffee-api");
        assert_eq!(environment.auth0().client_id(), "client-123");
        assert_eq!(environment.auth0().callback_url(), "https://coffee.example");
    }

    #[test]
    fn flags_accept_common_spellings() {
        for value in ["true", "TRUE", "1", "yes", " Yes "] {
            assert!(parse_flag(value).expect(value), "{value}");
        }
        for value in ["false", "False", "0", "no"] {
            assert!(!parse_flag(value).expect(value), "{value}");
        }
        assert!(parse_flag("on").is_err());
    }

    #[test]
    fn invalid_production_flag_names_the_variable() {
        let err = Environment::from_lookup(lookup_from(&[(ENV_KEY_PRODUCTION, "maybe")]))
            .expect_err("flag should fail");
        assert!(format!("{err:#}").contains(ENV_KEY_PRODUCTION), "{err:#}");
    }

    #[test]
    fn file_provides_the_base_record() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(
            file,
            r#"{{
                "production": true,
                "apiServerUrl": "https://api.coffee.example",
                "auth0": {{
                    "url": "coffee-prod",
                    "audience": "coffee",
                    "clientId": "prod-client",
                    "callbackURL": "https://coffee.example"
                }}
            }}"#
        )
        .expect("write");
        let path = file.path().to_string_lossy().to_string();

        let environment = Environment::from_lookup(lookup_from(&[
            (ENV_KEY_ENVIRONMENT_FILE, path.as_str()),
            (ENV_KEY_AUTH0_CLIENT_ID, "override-client"),
        ]))
        .expect("file environment");

        assert!(environment.production());
        assert_eq!(environment.auth0().url(), "coffee-prod");
        assert_eq!(environment.auth0().client_id(), "override-client");
    }

    #[test]
    fn missing_file_is_an_error() {
        let result = Environment::from_lookup(lookup_from(&[(
            ENV_KEY_ENVIRONMENT_FILE,
            "/nonexistent/coffee-environment.json",
        )]));
        assert!(result.is_err());
    }

    #[test]
    fn domain_expands_prefixes() {
        let environment = Environment::development();
        assert_eq!(
            environment.auth0().domain(),
            "dev-77o3o6xxp1gqs14e.auth0.com"
        );
        assert_eq!(
            environment.auth0().issuer(),
            "https://dev-77o3o6xxp1gqs14e.auth0.com/"
        );
        assert_eq!(
            environment.auth0().jwks_url(),
            "https://dev-77o3o6xxp1gqs14e.auth0.com/.well-known/jwks.json"
        );

        let regional = Environment::from_lookup(lookup_from(&[(
            ENV_KEY_AUTH0_URL,
            "dev-77o3o6xxp1gqs14e.uk.auth0.com",
        )]))
        .expect("regional");
        assert_eq!(
            regional.auth0().domain(),
            "dev-77o3o6xxp1gqs14e.uk.auth0.com"
        );
    }

    #[test]
    fn load_returns_the_same_instance() {
        let first = load().expect("load");
        let second = load().expect("load");
        assert!(std::ptr::eq(first, second));
        assert_eq!(first.auth0().audience(), second.auth0().audience());
    }
}
