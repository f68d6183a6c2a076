// src/validator.rs

use crate::client::{HttpKeySource, JwksCache, KeySource};
use crate::config::Config;
use crate::error::NilaCognitoError;
use crate::model::{CognitoClaims, JsonWebKey, KeyLookup, TokenUse};
use base64::engine::{general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// The only signing algorithm Cognito user pools use.
const ALGORITHM: Algorithm = Algorithm::RS256;

/// Verifies Cognito-issued JWTs against the user pool's published keys.
///
/// This struct should be created once and reused for all verification
/// requests; clones share the same key cache.
#[derive(Clone)]
pub struct Validator {
    config: Arc<Config>,
    jwks: JwksCache,
}

impl Validator {
    /// Creates a new `Validator` that fetches keys over HTTP.
    ///
    /// An incomplete configuration is accepted here and rejected on every
    /// call to [`verify`](Self::verify).
    pub fn new(config: Config) -> Self {
        let source = Arc::new(HttpKeySource::from_config(&config));
        Self::with_key_source(config, source)
    }

    /// Creates a `Validator` that reads keys from the given source.
    pub fn with_key_source(config: Config, source: Arc<dyn KeySource>) -> Self {
        let jwks = JwksCache::new(source, config.cache_ttl, config.refresh_cooldown);
        Self {
            config: Arc::new(config),
            jwks,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn key_cache(&self) -> &JwksCache {
        &self.jwks
    }

    /// Verifies a Cognito token end to end.
    ///
    /// The checks run in a fixed order and stop at the first failure:
    /// 1. The token is non-empty.
    /// 2. The configuration is complete.
    /// 3. The header parses and carries a `kid`.
    /// 4. A key with that `kid` is in the JWKS (refreshing once on a miss).
    /// 5. The token is RS256-signed by that key, `exp`/`nbf`/`iat` hold within
    ///    the leeway, and issuer and audience match the user pool and app client.
    /// 6. `token_use` equals `expected_use`.
    #[instrument(skip(self, token), fields(expected_use = %expected_use))]
    pub async fn verify(
        &self,
        token: &str,
        expected_use: TokenUse,
    ) -> Result<CognitoClaims, NilaCognitoError> {
        let token = token.trim();
        if token.is_empty() {
            warn!("Token to verify is empty");
            return Err(NilaCognitoError::EmptyToken);
        }

        if let Err(e) = self.config.validate() {
            error!(error = %e, "Cannot verify tokens: Cognito configuration is incomplete");
            return Err(e);
        }
        let issuer = self.config.issuer()?;
        let audience = self.config.audience()?;

        let header = peek_header(token)?;

        let kid = header.kid.as_deref().filter(|kid| !kid.is_empty()).ok_or_else(|| {
            warn!("Token header has no 'kid'");
            NilaCognitoError::MalformedToken("header is missing 'kid'".to_string())
        })?;

        let jwk = self.find_signing_key(kid).await?;

        if header.alg != "RS256" {
            warn!(alg = %header.alg, "Token asserts a disallowed algorithm");
            return Err(NilaCognitoError::Signature(format!(
                "algorithm '{}' is not allowed",
                header.alg
            )));
        }
        let decoding_key = decoding_key_for(&jwk)?;

        let mut validation = Validation::new(ALGORITHM);
        validation.leeway = self.config.validation.leeway.as_secs();
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.set_issuer(&[issuer.as_str()]);
        // Audience is checked below: access tokens carry `client_id` instead of `aud`.
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);

        let token_data = decode::<Value>(token, &decoding_key, &validation).map_err(|e| {
            let err = NilaCognitoError::from(e);
            warn!(kind = err.kind(), "Token failed verification: {}", err);
            err
        })?;
        let raw_claims = token_data.claims;

        check_issued_at(&raw_claims, self.config.validation.leeway.as_secs())?;
        check_audience(&raw_claims, audience)?;

        let claims: CognitoClaims = serde_json::from_value(raw_claims).map_err(|e| {
            warn!("Verified token has unexpected claim types: {}", e);
            NilaCognitoError::ClaimValidation(format!("unexpected claim types: {}", e))
        })?;

        if claims.token_use != expected_use.as_str() {
            warn!(
                expected = %expected_use,
                actual = %claims.token_use,
                "Token 'token_use' does not match"
            );
            return Err(NilaCognitoError::TokenUseMismatch {
                expected: expected_use.to_string(),
                actual: claims.token_use.clone(),
            });
        }

        info!(
            username = claims.username().unwrap_or("-"),
            client_id = claims.client_id.as_deref().unwrap_or("-"),
            "Token verified"
        );
        Ok(claims)
    }

    /// Looks `kid` up in the cached key set. On a miss the cache is refreshed
    /// once (subject to the refresh cooldown), so a key rotated in mid-TTL is
    /// still picked up. A failed refresh keeps the current set and reports
    /// the key as unknown.
    async fn find_signing_key(&self, kid: &str) -> Result<JsonWebKey, NilaCognitoError> {
        let keys = self.jwks.get_keys().await?;
        if let KeyLookup::Found(key) = keys.find(kid) {
            debug!(kid, "Signing key found in cached JWKS");
            return Ok(key.clone());
        }

        warn!(kid, "No JWKS key matches 'kid'; refreshing the key set");
        let keys = match self.jwks.refresh().await {
            Ok(keys) => keys,
            Err(e) => {
                warn!(kid, error = %e, "JWKS refresh failed; 'kid' stays unknown");
                return Err(NilaCognitoError::UnknownKey(kid.to_string()));
            }
        };
        match keys.find(kid) {
            KeyLookup::Found(key) => Ok(key.clone()),
            KeyLookup::NotFound => {
                warn!(kid, "No JWKS key matches 'kid' after refresh");
                Err(NilaCognitoError::UnknownKey(kid.to_string()))
            }
        }
    }
}

/// The header fields read before the signature is checked.
#[derive(Debug, Deserialize)]
struct TokenHeader {
    alg: String,
    #[serde(default)]
    kid: Option<String>,
}

/// Decodes the JOSE header without verifying anything.
///
/// `alg` is kept as text so that values `jsonwebtoken` has no variant for,
/// such as `none`, reach the algorithm check instead of failing as a parse error.
fn peek_header(token: &str) -> Result<TokenHeader, NilaCognitoError> {
    let malformed = |reason: String| {
        warn!("Failed to parse token header: {}", reason);
        NilaCognitoError::MalformedToken(format!("invalid header: {}", reason))
    };

    let mut segments = token.split('.');
    let (Some(encoded), Some(_), Some(_), None) =
        (segments.next(), segments.next(), segments.next(), segments.next())
    else {
        return Err(malformed("expected three dot-separated segments".to_string()));
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(encoded)
        .map_err(|e| malformed(e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| malformed(e.to_string()))
}

/// Rebuilds the RSA public key from a JWK, refusing anything but an RS256 RSA key.
fn decoding_key_for(jwk: &JsonWebKey) -> Result<DecodingKey, NilaCognitoError> {
    if jwk.kty != "RSA" {
        return Err(NilaCognitoError::Signature(format!(
            "key '{}' has unsupported type '{}'",
            jwk.kid, jwk.kty
        )));
    }
    if let Some(alg) = jwk.alg.as_deref() {
        if alg != "RS256" {
            return Err(NilaCognitoError::Signature(format!(
                "key '{}' is for algorithm '{}'",
                jwk.kid, alg
            )));
        }
    }
    let n = jwk.n.as_deref().ok_or_else(|| {
        NilaCognitoError::Signature(format!("RSA key '{}' missing 'n' component", jwk.kid))
    })?;
    let e = jwk.e.as_deref().ok_or_else(|| {
        NilaCognitoError::Signature(format!("RSA key '{}' missing 'e' component", jwk.kid))
    })?;
    DecodingKey::from_rsa_components(n, e)
        .map_err(|err| NilaCognitoError::Signature(format!("invalid RSA key '{}': {}", jwk.kid, err)))
}

/// `iat` must be present and not later than now plus the leeway.
fn check_issued_at(claims: &Value, leeway: u64) -> Result<(), NilaCognitoError> {
    let iat = claims
        .get("iat")
        .and_then(Value::as_u64)
        .ok_or_else(|| NilaCognitoError::ClaimValidation("missing required claim 'iat'".to_string()))?;

    let now = jsonwebtoken::get_current_timestamp();
    if iat > now.saturating_add(leeway) {
        warn!(iat, now, "Token was issued in the future");
        return Err(NilaCognitoError::ClaimValidation(
            "token was issued in the future".to_string(),
        ));
    }
    Ok(())
}

/// ID tokens name the app client in `aud`; access tokens in `client_id`.
fn check_audience(claims: &Value, expected: &str) -> Result<(), NilaCognitoError> {
    let (claim, actual) = match (claims.get("aud"), claims.get("client_id")) {
        (Some(aud), _) => ("aud", aud),
        (None, Some(client_id)) => ("client_id", client_id),
        (None, None) => {
            warn!("Token has neither 'aud' nor 'client_id'");
            return Err(NilaCognitoError::ClaimValidation(
                "missing required claim 'aud' or 'client_id'".to_string(),
            ));
        }
    };

    if actual.as_str() == Some(expected) {
        Ok(())
    } else {
        warn!(claim, actual = %actual, expected, "Token audience does not match app client id");
        Err(NilaCognitoError::ClaimValidation(format!("invalid audience in '{}'", claim)))
    }
}
