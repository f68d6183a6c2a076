// src/config.rs

use crate::error::NilaCognitoError;
use std::collections::HashMap;
use std::env;
use std::time::Duration;
use tracing::warn;
use url::Url;

pub const ENV_USER_POOL_ID: &str = "COGNITO_USER_POOL_ID";
pub const ENV_REGION: &str = "COGNITO_REGION";
pub const ENV_APP_CLIENT_ID: &str = "COGNITO_APP_CLIENT_ID";
pub const ENV_JWKS_URI: &str = "COGNITO_JWKS_URI";
pub const ENV_LEEWAY_SECONDS: &str = "COGNITO_LEEWAY_SECONDS";
pub const ENV_CACHE_TTL_SECONDS: &str = "COGNITO_JWKS_CACHE_TTL_SECONDS";
pub const ENV_FETCH_TIMEOUT_SECONDS: &str = "COGNITO_JWKS_TIMEOUT_SECONDS";
pub const ENV_REFRESH_COOLDOWN_SECONDS: &str = "COGNITO_JWKS_REFRESH_COOLDOWN_SECONDS";

/// Default clock skew tolerance for `exp`, `nbf` and `iat`.
pub const DEFAULT_LEEWAY: Duration = Duration::from_secs(60);
/// Default lifetime of a cached JSON Web Key Set.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60 * 60);
/// Default upper bound for a single JWKS fetch.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(5);
/// Default minimum age of a key set before an unknown `kid` may refetch it.
pub const DEFAULT_REFRESH_COOLDOWN: Duration = Duration::from_secs(30);

/// Contains the validation settings applied to every token.
#[derive(Debug, Clone)]
pub struct ValidationDetails {
    /// The tolerance for clock skew when validating time-based claims like `exp` and `iat`.
    /// Defaults to 60 seconds.
    pub leeway: Duration,
}

impl Default for ValidationDetails {
    fn default() -> Self {
        Self {
            leeway: DEFAULT_LEEWAY,
        }
    }
}

/// The main configuration for the Cognito token validator.
///
/// The three Cognito identifiers are optional on purpose: a process started
/// without them still comes up, logs a warning, and then refuses every
/// verification with [`NilaCognitoError::Configuration`].
#[derive(Debug, Clone)]
pub struct Config {
    /// AWS region of the user pool, e.g. `ap-northeast-1`.
    pub region: Option<String>,
    /// The user pool identifier, e.g. `ap-northeast-1_AbCdEfGhI`.
    pub user_pool_id: Option<String>,
    /// The app client id. Validated against `aud` (ID tokens) or `client_id` (access tokens).
    pub app_client_id: Option<String>,
    /// Optional override for the JWKS endpoint. If `None`, the URL is derived from the issuer.
    pub jwks_uri: Option<Url>,
    /// How long a fetched key set stays fresh.
    pub cache_ttl: Duration,
    /// Timeout for one JWKS request.
    pub fetch_timeout: Duration,
    /// A token with an unknown `kid` refetches the key set only once the
    /// cached set is at least this old.
    pub refresh_cooldown: Duration,
    /// The specific validation parameters to apply to the token.
    pub validation: ValidationDetails,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, NilaCognitoError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a map of variables (for testing).
    ///
    /// Missing Cognito identifiers are not an error here; they are reported
    /// with a warning and enforced at verification time. Values that are
    /// present but unparsable are rejected.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, NilaCognitoError> {
        let non_empty = |key: &str| vars.get(key).map(|v| v.trim()).filter(|v| !v.is_empty());

        let mut builder = ConfigBuilder::new();
        if let Some(region) = non_empty(ENV_REGION) {
            builder = builder.region(region);
        }
        if let Some(pool) = non_empty(ENV_USER_POOL_ID) {
            builder = builder.user_pool_id(pool);
        }
        if let Some(client_id) = non_empty(ENV_APP_CLIENT_ID) {
            builder = builder.app_client_id(client_id);
        }
        if let Some(uri) = non_empty(ENV_JWKS_URI) {
            builder = builder.jwks_uri(uri)?;
        }
        if let Some(secs) = non_empty(ENV_LEEWAY_SECONDS) {
            builder = builder.leeway(parse_seconds(ENV_LEEWAY_SECONDS, secs)?);
        }
        if let Some(secs) = non_empty(ENV_CACHE_TTL_SECONDS) {
            builder = builder.cache_ttl(parse_seconds(ENV_CACHE_TTL_SECONDS, secs)?);
        }
        if let Some(secs) = non_empty(ENV_FETCH_TIMEOUT_SECONDS) {
            let timeout = parse_seconds(ENV_FETCH_TIMEOUT_SECONDS, secs)?;
            if timeout.is_zero() {
                return Err(NilaCognitoError::Configuration(format!(
                    "{} must be greater than zero",
                    ENV_FETCH_TIMEOUT_SECONDS
                )));
            }
            builder = builder.fetch_timeout(timeout);
        }
        if let Some(secs) = non_empty(ENV_REFRESH_COOLDOWN_SECONDS) {
            builder = builder.refresh_cooldown(parse_seconds(ENV_REFRESH_COOLDOWN_SECONDS, secs)?);
        }

        let config = builder.build();
        let missing = config.missing_fields();
        if !missing.is_empty() {
            warn!(
                missing = ?missing,
                "Cognito configuration is incomplete; every token verification will be rejected until it is set"
            );
        }
        Ok(config)
    }

    /// Names of the required environment variables that are not set.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.user_pool_id.is_none() {
            missing.push(ENV_USER_POOL_ID);
        }
        if self.region.is_none() {
            missing.push(ENV_REGION);
        }
        if self.app_client_id.is_none() {
            missing.push(ENV_APP_CLIENT_ID);
        }
        missing
    }

    /// Fails closed when any required field is missing.
    pub fn validate(&self) -> Result<(), NilaCognitoError> {
        let missing = self.missing_fields();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(NilaCognitoError::Configuration(format!(
                "missing {}",
                missing.join(", ")
            )))
        }
    }

    /// The exact `iss` value Cognito puts in tokens from this user pool.
    pub fn issuer(&self) -> Result<String, NilaCognitoError> {
        match (&self.region, &self.user_pool_id) {
            (Some(region), Some(pool)) => Ok(format!(
                "https://cognito-idp.{}.amazonaws.com/{}",
                region, pool
            )),
            _ => Err(NilaCognitoError::Configuration(format!(
                "{} and {} are required to build the issuer",
                ENV_REGION, ENV_USER_POOL_ID
            ))),
        }
    }

    /// The app client id, or a configuration error if it is unset.
    pub fn audience(&self) -> Result<&str, NilaCognitoError> {
        self.app_client_id.as_deref().ok_or_else(|| {
            NilaCognitoError::Configuration(format!("{} is required", ENV_APP_CLIENT_ID))
        })
    }

    /// Determines the JWKS URL, either from the override or from the issuer.
    pub fn jwks_url(&self) -> Result<Url, NilaCognitoError> {
        if let Some(uri) = &self.jwks_uri {
            return Ok(uri.clone());
        }
        let issuer = self.issuer()?;
        Url::parse(&format!("{}/.well-known/jwks.json", issuer))
            .map_err(|e| NilaCognitoError::InvalidUrl(e.to_string()))
    }
}

fn parse_seconds(key: &str, value: &str) -> Result<Duration, NilaCognitoError> {
    value
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|e| NilaCognitoError::Configuration(format!("{} is not a number of seconds: {}", key, e)))
}

/// A builder for creating a `Config` instance.
///
/// This builder provides a fluent API and fills in defaults for the
/// leeway, cache TTL and fetch timeout.
#[derive(Default)]
pub struct ConfigBuilder {
    region: Option<String>,
    user_pool_id: Option<String>,
    app_client_id: Option<String>,
    jwks_uri: Option<Url>,
    cache_ttl: Option<Duration>,
    fetch_timeout: Option<Duration>,
    refresh_cooldown: Option<Duration>,
    validation: ValidationDetails,
}

impl ConfigBuilder {
    /// Creates a new `ConfigBuilder`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the AWS region of the user pool.
    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Sets the user pool identifier.
    pub fn user_pool_id(mut self, user_pool_id: impl Into<String>) -> Self {
        self.user_pool_id = Some(user_pool_id.into());
        self
    }

    /// Sets the app client id that tokens must be issued for.
    pub fn app_client_id(mut self, app_client_id: impl Into<String>) -> Self {
        self.app_client_id = Some(app_client_id.into());
        self
    }

    /// Sets an explicit JWKS URI instead of deriving it from region and pool.
    pub fn jwks_uri(mut self, url: &str) -> Result<Self, NilaCognitoError> {
        let parsed_url = Url::parse(url).map_err(|e| NilaCognitoError::InvalidUrl(e.to_string()))?;
        self.jwks_uri = Some(parsed_url);
        Ok(self)
    }

    /// Sets how long a fetched key set is reused. Defaults to one hour.
    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    /// Sets the JWKS request timeout. Defaults to 5 seconds.
    pub fn fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = Some(timeout);
        self
    }

    /// Sets how old the key set must be before an unknown `kid` refetches it.
    /// Defaults to 30 seconds; zero refetches on every miss.
    pub fn refresh_cooldown(mut self, cooldown: Duration) -> Self {
        self.refresh_cooldown = Some(cooldown);
        self
    }

    /// Sets the clock skew tolerance. Defaults to 60 seconds.
    pub fn leeway(mut self, leeway: Duration) -> Self {
        self.validation.leeway = leeway;
        self
    }

    /// Consumes the builder and returns a `Config` object.
    ///
    /// Building never fails; completeness is checked by [`Config::validate`].
    pub fn build(self) -> Config {
        Config {
            region: self.region,
            user_pool_id: self.user_pool_id,
            app_client_id: self.app_client_id,
            jwks_uri: self.jwks_uri,
            cache_ttl: self.cache_ttl.unwrap_or(DEFAULT_CACHE_TTL),
            fetch_timeout: self.fetch_timeout.unwrap_or(DEFAULT_FETCH_TIMEOUT),
            refresh_cooldown: self.refresh_cooldown.unwrap_or(DEFAULT_REFRESH_COOLDOWN),
            validation: self.validation,
        }
    }
}
