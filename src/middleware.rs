// src/middleware.rs

//! Request authentication for the backend.
//!
//! The load balancer injects the Cognito access token into
//! `x-amzn-oidc-accesstoken`; clients calling the service directly send
//! `Authorization: Bearer <token>`. Every verification failure becomes the
//! same 401 response, while the specific cause goes to the log.

use crate::error::NilaCognitoError;
use crate::model::TokenUse;
use crate::validator::Validator;
use axum::{
    extract::{Request, State},
    http::{
        header::{AUTHORIZATION, WWW_AUTHENTICATE},
        HeaderMap, StatusCode,
    },
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::{debug, error, instrument, warn};

/// Header the load balancer uses to forward the Cognito access token.
pub const OIDC_ACCESS_TOKEN_HEADER: &str = "x-amzn-oidc-accesstoken";

/// State for the authentication middleware.
#[derive(Clone)]
pub struct AuthState {
    pub validator: Validator,
    /// The `token_use` protected routes accept.
    pub expected_use: TokenUse,
}

/// Why a request was turned away.
#[derive(Debug)]
pub enum AuthRejection {
    MissingToken,
    Invalid(NilaCognitoError),
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let detail = match self {
            AuthRejection::MissingToken => "Not authenticated: no token found",
            AuthRejection::Invalid(_) => "Could not validate credentials",
        };
        (
            StatusCode::UNAUTHORIZED,
            [(WWW_AUTHENTICATE, "Bearer")],
            Json(json!({ "detail": detail })),
        )
            .into_response()
    }
}

/// Picks the token from the provider header first, then from a Bearer
/// `Authorization` header. A malformed `Authorization` header counts as no token.
pub fn extract_token(headers: &HeaderMap) -> Option<&str> {
    if let Some(token) = headers
        .get(OIDC_ACCESS_TOKEN_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|t| !t.is_empty())
    {
        debug!("Using token from {} header", OIDC_ACCESS_TOKEN_HEADER);
        return Some(token);
    }

    let auth_header = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let mut parts = auth_header.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None) if scheme.eq_ignore_ascii_case("bearer") => {
            debug!("Using Bearer token from Authorization header");
            Some(token)
        }
        _ => {
            warn!("Malformed Authorization header");
            None
        }
    }
}

/// Authentication middleware for protected routes.
///
/// Verifies the request's token and stores the resulting
/// [`CognitoClaims`](crate::model::CognitoClaims) in the request extensions.
#[instrument(skip_all, name = "nila_cognito.middleware.auth")]
pub async fn require_auth(
    State(state): State<AuthState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthRejection> {
    let token = extract_token(req.headers())
        .ok_or_else(|| {
            warn!("No token in {} or Authorization header", OIDC_ACCESS_TOKEN_HEADER);
            AuthRejection::MissingToken
        })?
        .to_owned();

    let claims = state
        .validator
        .verify(&token, state.expected_use)
        .await
        .map_err(|e| {
            if e.is_operational() {
                error!(kind = e.kind(), error = %e, "Token verification failed for an operational reason");
            } else {
                warn!(kind = e.kind(), error = %e, "Token verification failed");
            }
            AuthRejection::Invalid(e)
        })?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}
