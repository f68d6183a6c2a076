// src/client.rs

use crate::config::Config;
use crate::error::NilaCognitoError;
use crate::model::JsonWebKeySet;
use async_trait::async_trait;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

/// Somewhere a JSON Web Key Set can be fetched from.
///
/// The production implementation is [`HttpKeySource`]; tests substitute their own.
#[async_trait]
pub trait KeySource: Send + Sync {
    async fn fetch(&self) -> Result<JsonWebKeySet, NilaCognitoError>;
}

/// Fetches the key set from the user pool's `/.well-known/jwks.json` endpoint.
pub struct HttpKeySource {
    http_client: reqwest::Client,
    // Holds the error when the URL cannot be built; fetch then fails without touching the network.
    jwks_uri: Result<Url, NilaCognitoError>,
    timeout: Duration,
}

impl HttpKeySource {
    pub fn from_config(config: &Config) -> Self {
        let jwks_uri = config.jwks_url();
        if let Err(e) = &jwks_uri {
            warn!(error = %e, "JWKS URL cannot be built; every key fetch will fail");
        }
        Self {
            http_client: reqwest::Client::new(),
            jwks_uri,
            timeout: config.fetch_timeout,
        }
    }
}

#[async_trait]
impl KeySource for HttpKeySource {
    #[instrument(skip(self), err)]
    async fn fetch(&self) -> Result<JsonWebKeySet, NilaCognitoError> {
        let jwks_uri = self.jwks_uri.as_ref().map_err(|e| {
            error!(error = %e, "No usable JWKS URL");
            e.clone()
        })?;

        info!("Fetching JWKS from {}", jwks_uri);
        let response = self
            .http_client
            .get(jwks_uri.clone())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                error!("Failed to fetch JWKS: {}", e);
                NilaCognitoError::from(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            error!(%status, "JWKS endpoint returned an error status");
            return Err(NilaCognitoError::KeyFetch(format!(
                "JWKS endpoint returned {}",
                status
            )));
        }

        let jwks: JsonWebKeySet = response.json().await.map_err(|e| {
            error!("Failed to parse JWKS response: {}", e);
            NilaCognitoError::KeyFetch(format!("invalid JWKS body: {}", e))
        })?;

        Ok(jwks)
    }
}

/// A key set together with the moment it was fetched.
#[derive(Debug, Clone)]
pub struct CachedKeySet {
    pub keys: Arc<JsonWebKeySet>,
    pub fetched_at: Instant,
}

impl CachedKeySet {
    /// An entry is usable only while `now - fetched_at < ttl`.
    pub fn is_fresh(&self, ttl: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.fetched_at) < ttl
    }
}

/// A single-slot, TTL-checked cache in front of a [`KeySource`].
///
/// Concurrent refreshes are coalesced: while one caller fetches, the others
/// wait for its result instead of issuing their own request. The entry is
/// replaced as a whole, so readers never observe a partially written set.
#[derive(Clone)]
pub struct JwksCache {
    // The cache is internally ref-counted to allow for cheap cloning.
    inner: Arc<Inner>,
}

struct Inner {
    source: Arc<dyn KeySource>,
    ttl: Duration,
    refresh_cooldown: Duration,
    slot: Cache<(), CachedKeySet>,
    // Serializes out-of-schedule refreshes.
    refresh_lock: Mutex<()>,
}

impl JwksCache {
    /// `refresh_cooldown` is the minimum age an entry must reach before
    /// [`refresh`](Self::refresh) replaces it.
    pub fn new(source: Arc<dyn KeySource>, ttl: Duration, refresh_cooldown: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                source,
                ttl,
                refresh_cooldown,
                slot: Cache::new(1),
                refresh_lock: Mutex::new(()),
            }),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.inner.ttl
    }

    /// Returns the current key set, fetching a new one if the cached entry is
    /// missing or older than the TTL. A failed fetch is returned as an error;
    /// the previous entry is never served in its place.
    #[instrument(skip(self), err)]
    pub async fn get_keys(&self) -> Result<Arc<JsonWebKeySet>, NilaCognitoError> {
        if let Some(cached) = self.inner.slot.get(&()).await {
            if cached.is_fresh(self.inner.ttl, Instant::now()) {
                debug!(age = ?cached.fetched_at.elapsed(), "JWKS cache hit");
                return Ok(cached.keys);
            }
            debug!("JWKS cache entry expired");
            self.inner.slot.invalidate(&()).await;
        }

        let source = Arc::clone(&self.inner.source);
        let entry = self
            .inner
            .slot
            .try_get_with((), async move {
                let jwks = source.fetch().await?;
                info!("Successfully fetched {} keys", jwks.keys.len());
                Ok::<_, NilaCognitoError>(CachedKeySet {
                    keys: Arc::new(jwks),
                    fetched_at: Instant::now(),
                })
            })
            .await
            .map_err(|e: Arc<NilaCognitoError>| (*e).clone())?;

        Ok(entry.keys)
    }

    /// Fetches a new key set ahead of the TTL, e.g. after a token named a
    /// `kid` the current set lacks.
    ///
    /// The current entry is only replaced once the new set has been fetched;
    /// a failed fetch leaves it in place. An entry younger than the refresh
    /// cooldown is returned without a fetch, so a burst of misses costs at
    /// most one request per cooldown window.
    #[instrument(skip(self), err)]
    pub async fn refresh(&self) -> Result<Arc<JsonWebKeySet>, NilaCognitoError> {
        let _guard = self.inner.refresh_lock.lock().await;

        if let Some(cached) = self.inner.slot.get(&()).await {
            let window = self.inner.refresh_cooldown.min(self.inner.ttl);
            if cached.is_fresh(window, Instant::now()) {
                debug!(age = ?cached.fetched_at.elapsed(), "JWKS fetched recently; refresh skipped");
                return Ok(cached.keys);
            }
        }

        let jwks = self.inner.source.fetch().await?;
        info!("Refreshed JWKS with {} keys", jwks.keys.len());
        let entry = CachedKeySet {
            keys: Arc::new(jwks),
            fetched_at: Instant::now(),
        };
        self.inner.slot.insert((), entry.clone()).await;
        Ok(entry.keys)
    }
}
