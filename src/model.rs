// src/model.rs

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Represents a single JSON Web Key (JWK) as defined in RFC 7517.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct JsonWebKey {
    pub kid: String,
    pub kty: String,
    #[serde(rename = "use", default, skip_serializing_if = "Option::is_none")]
    pub use_purpose: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,
}

/// Represents a JSON Web Key Set (JWKS), which is a collection of JWKs.
///
/// A set is never mutated after it is fetched; a refresh replaces it.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct JsonWebKeySet {
    pub keys: Vec<JsonWebKey>,
}

/// Outcome of looking a `kid` up in a key set.
#[derive(Debug, PartialEq, Eq)]
pub enum KeyLookup<'a> {
    Found(&'a JsonWebKey),
    NotFound,
}

impl JsonWebKeySet {
    /// Linear search for the key whose `kid` matches.
    pub fn find(&self, kid: &str) -> KeyLookup<'_> {
        match self.keys.iter().find(|key| key.kid == kid) {
            Some(key) => KeyLookup::Found(key),
            None => KeyLookup::NotFound,
        }
    }
}

/// The purpose a Cognito token was issued for, carried in the `token_use` claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenUse {
    Access,
    Id,
}

impl TokenUse {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenUse::Access => "access",
            TokenUse::Id => "id",
        }
    }
}

impl fmt::Display for TokenUse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TokenUse {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "access" => Ok(TokenUse::Access),
            "id" => Ok(TokenUse::Id),
            other => Err(format!("unknown token_use '{}'", other)),
        }
    }
}

/// The claims of a Cognito token that passed verification.
///
/// Access tokens carry `client_id` and `username`; ID tokens carry `aud`
/// and `cognito:username`. Anything not modelled here is kept in `extra`.
/// Only [`Validator::verify`](crate::validator::Validator::verify) produces this type.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[non_exhaustive]
pub struct CognitoClaims {
    pub iss: String,
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
    pub exp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<u64>,
    pub iat: u64,
    #[serde(default)]
    pub token_use: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_time: Option<u64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl CognitoClaims {
    /// The user name, from `username` (access tokens) or `cognito:username` (ID tokens).
    pub fn username(&self) -> Option<&str> {
        self.username
            .as_deref()
            .or_else(|| self.extra.get("cognito:username").and_then(|v| v.as_str()))
    }

    /// The space separated OAuth scopes granted to an access token.
    pub fn scopes(&self) -> impl Iterator<Item = &str> {
        self.scope.as_deref().unwrap_or_default().split_whitespace()
    }
}
