// src/error.rs

use thiserror::Error;

/// The primary error type for the `nila-cognito` library.
///
/// Every failure of [`Validator::verify`](crate::validator::Validator::verify)
/// maps to exactly one variant, so callers can log the precise cause while
/// still answering the client with a uniform "unauthenticated" response.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NilaCognitoError {
    /// No token was supplied.
    #[error("The token is empty")]
    EmptyToken,

    /// A required configuration field is missing or unusable.
    #[error("Configuration is incomplete: {0}")]
    Configuration(String),

    /// A provided URL could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The token header or structure could not be parsed.
    #[error("Malformed token: {0}")]
    MalformedToken(String),

    /// No key in the JSON Web Key Set matches the token's `kid`.
    #[error("Key not found for kid: {0}")]
    UnknownKey(String),

    /// The signature failed the cryptographic check, or the token or key
    /// asserted an algorithm other than RS256.
    #[error("Signature verification failed: {0}")]
    Signature(String),

    /// `exp` or `nbf` is violated beyond the configured leeway.
    #[error("The token has expired or is not yet valid")]
    ExpiredToken,

    /// Issuer, audience or another required claim did not validate.
    #[error("Claim validation failed: {0}")]
    ClaimValidation(String),

    /// The `token_use` claim does not match the use the caller expects.
    #[error("Token use mismatch. Expected: {expected}, Actual: {actual}")]
    TokenUseMismatch { expected: String, actual: String },

    /// The JSON Web Key Set could not be fetched or parsed.
    #[error("Failed to fetch JWKS: {0}")]
    KeyFetch(String),
}

impl NilaCognitoError {
    /// Returns `true` when the failure points at the deployment or the
    /// identity provider rather than at the presented credential.
    pub fn is_operational(&self) -> bool {
        matches!(
            self,
            Self::Configuration(_) | Self::InvalidUrl(_) | Self::KeyFetch(_)
        )
    }

    /// A stable, snake_case name for the error kind, used as a log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::EmptyToken => "empty_token",
            Self::Configuration(_) => "configuration",
            Self::InvalidUrl(_) => "invalid_url",
            Self::MalformedToken(_) => "malformed_token",
            Self::UnknownKey(_) => "unknown_key",
            Self::Signature(_) => "signature",
            Self::ExpiredToken => "expired_token",
            Self::ClaimValidation(_) => "claim_validation",
            Self::TokenUseMismatch { .. } => "token_use_mismatch",
            Self::KeyFetch(_) => "key_fetch",
        }
    }
}

impl From<reqwest::Error> for NilaCognitoError {
    fn from(e: reqwest::Error) -> Self {
        NilaCognitoError::KeyFetch(e.to_string())
    }
}

/// Classifies a `jsonwebtoken` failure raised while verifying the signature
/// and the standard claims.
impl From<jsonwebtoken::errors::Error> for NilaCognitoError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match e.kind() {
            ErrorKind::ExpiredSignature | ErrorKind::ImmatureSignature => {
                NilaCognitoError::ExpiredToken
            }
            ErrorKind::InvalidIssuer => NilaCognitoError::ClaimValidation("invalid issuer".into()),
            ErrorKind::InvalidAudience => {
                NilaCognitoError::ClaimValidation("invalid audience".into())
            }
            ErrorKind::InvalidSubject => NilaCognitoError::ClaimValidation("invalid subject".into()),
            ErrorKind::MissingRequiredClaim(claim) => {
                NilaCognitoError::ClaimValidation(format!("missing required claim '{}'", claim))
            }
            ErrorKind::InvalidToken
            | ErrorKind::Base64(_)
            | ErrorKind::Json(_)
            | ErrorKind::Utf8(_) => NilaCognitoError::MalformedToken(e.to_string()),
            _ => NilaCognitoError::Signature(e.to_string()),
        }
    }
}
