// src/lib.rs

pub mod client;
pub mod config;
pub mod error;
pub mod middleware;
pub mod model;
pub mod routes;
pub mod validator;

/// The public prelude for the `nila-cognito` crate.
///
/// This module re-exports the most commonly used types for convenience.
pub mod prelude {
    pub use crate::client::{HttpKeySource, JwksCache, KeySource};
    pub use crate::config::{Config, ConfigBuilder};
    pub use crate::error::NilaCognitoError;
    pub use crate::model::{CognitoClaims, JsonWebKey, JsonWebKeySet, TokenUse};
    pub use crate::validator::Validator;
}
