// src/routes.rs

use crate::middleware::{require_auth, AuthState};
use crate::model::{CognitoClaims, TokenUse};
use crate::validator::Validator;
use axum::{
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Extension, Json, Router,
};
use serde_json::{json, Value};
use std::any::Any;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use tracing::error;

/// Builds the backend router. `/` is public; everything else requires a
/// verified Cognito access token.
pub fn app(validator: Validator) -> Router {
    let auth_state = AuthState {
        validator,
        expected_use: TokenUse::Access,
    };

    let protected = Router::new()
        .route("/users/me", get(users_me))
        .route("/protected-resource", get(protected_resource))
        .route_layer(middleware::from_fn_with_state(auth_state, require_auth));

    with_service_layers(Router::new().route("/", get(root)).merge(protected))
}

/// Wraps a router in the layers every route shares: request tracing, and a
/// panic handler that answers 500 without exposing the panic message.
pub fn with_service_layers(router: Router) -> Router {
    router
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http())
}

async fn root() -> Json<Value> {
    Json(json!({ "message": "Welcome to the nila-cognito backend" }))
}

async fn users_me(Extension(claims): Extension<CognitoClaims>) -> Json<Value> {
    Json(json!({ "user_info": claims }))
}

async fn protected_resource(Extension(claims): Extension<CognitoClaims>) -> Json<Value> {
    let username = claims.username().unwrap_or("unknown user");
    Json(json!({
        "message": format!("Welcome, {}! This is a protected resource.", username),
        "claims": claims,
    }))
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic payload");
    error!(panic = detail, "Request handler panicked");

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "detail": "Internal server error during authentication" })),
    )
        .into_response()
}
