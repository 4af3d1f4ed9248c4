//! Provider key-set fetching and caching.
//!
//! ID token signatures are verified against the issuer's published JSON Web
//! Key Set. This module fetches the key set over HTTPS, caches it for a
//! TTL derived from the provider's `Cache-Control: max-age` (clamped to
//! configurable bounds), and resolves decoding keys by `kid`.
//!
//! Key sets may also be seeded statically via [`KeySetCache::seed`], for
//! providers whose keys are pinned in configuration and for tests that must
//! not perform network I/O.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use jsonwebtoken::jwk::{Jwk, JwkSet, PublicKeyUse};
use jsonwebtoken::{Algorithm, DecodingKey};
use tokio::sync::RwLock;
use url::Url;

/// Errors that can occur during key-set operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum KeySetError {
    /// A network error occurred while fetching the key set.
    #[error("Network error: {0}")]
    Network(String),

    /// The HTTP request returned a non-success status code.
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),

    /// The key set could not be parsed.
    #[error("Failed to parse key set: {0}")]
    Parse(String),

    /// No key in the set matches the requested key ID.
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    /// The key set contains no usable signing keys.
    #[error("No signing keys found in key set")]
    NoSigningKeys,

    /// The key-set URI scheme is not allowed.
    #[error("Invalid URL scheme: only HTTPS is allowed")]
    InvalidScheme,
}

/// Configuration for the key-set cache.
#[derive(Debug, Clone)]
pub struct KeySetConfig {
    /// TTL when the provider sends no `Cache-Control` (default: 1 hour).
    pub default_ttl: Duration,

    /// Lower TTL bound regardless of `Cache-Control` (default: 5 minutes).
    pub min_ttl: Duration,

    /// Upper TTL bound regardless of `Cache-Control` (default: 24 hours).
    pub max_ttl: Duration,

    /// HTTP request timeout (default: 10 seconds).
    pub request_timeout: Duration,

    /// Whether to allow HTTP (non-HTTPS) key-set URIs. Testing only.
    pub allow_http: bool,
}

impl Default for KeySetConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(3600),
            min_ttl: Duration::from_secs(300),
            max_ttl: Duration::from_secs(86400),
            request_timeout: Duration::from_secs(10),
            allow_http: false,
        }
    }
}

impl KeySetConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the default TTL.
    #[must_use]
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Sets the TTL bounds.
    #[must_use]
    pub fn with_ttl_bounds(mut self, min: Duration, max: Duration) -> Self {
        self.min_ttl = min;
        self.max_ttl = max;
        self
    }

    /// Sets the HTTP request timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Allows HTTP (non-HTTPS) key-set URIs. Testing only.
    #[must_use]
    pub fn with_allow_http(mut self, allow: bool) -> Self {
        self.allow_http = allow;
        self
    }
}

/// A resolved decoding key with the algorithm advertised by its JWK, if any.
pub type ResolvedKey = (DecodingKey, Option<Algorithm>);

struct CachedKeySet {
    jwks: JwkSet,
    expires_at: Instant,
}

/// TTL-bounded in-memory cache of provider key sets, keyed by JWKS URI.
pub struct KeySetCache {
    http_client: reqwest::Client,
    entries: Arc<RwLock<HashMap<String, CachedKeySet>>>,
    config: KeySetConfig,
}

impl KeySetCache {
    /// Creates a new key-set cache.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be created (should not happen in
    /// practice).
    #[must_use]
    pub fn new(config: KeySetConfig) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            http_client,
            entries: Arc::new(RwLock::new(HashMap::new())),
            config,
        }
    }

    /// Creates a cache with default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(KeySetConfig::default())
    }

    /// Resolves the decoding key with the given `kid`.
    ///
    /// Checks the cache first and refreshes once on a miss, so a provider key
    /// rotation is picked up without waiting for the TTL.
    ///
    /// # Errors
    ///
    /// Returns [`KeySetError::KeyNotFound`] if the key is absent even after a
    /// refresh, or a fetch error if the key set cannot be retrieved.
    pub async fn key_for(&self, jwks_uri: &Url, kid: &str) -> Result<ResolvedKey, KeySetError> {
        if let Some(key) = self.cached_key(jwks_uri, kid).await {
            return Ok(key);
        }

        tracing::debug!(%jwks_uri, kid, "Key not cached, refreshing key set");
        self.refresh(jwks_uri).await?;

        self.cached_key(jwks_uri, kid)
            .await
            .ok_or_else(|| KeySetError::KeyNotFound(kid.to_string()))
    }

    /// Resolves every signing key in the set, for tokens without a `kid`.
    ///
    /// Encryption keys (`use: "enc"`) are excluded.
    ///
    /// # Errors
    ///
    /// Returns [`KeySetError::NoSigningKeys`] if the set yields no usable
    /// keys, or a fetch error if the key set cannot be retrieved.
    pub async fn signing_keys(&self, jwks_uri: &Url) -> Result<Vec<ResolvedKey>, KeySetError> {
        {
            let entries = self.entries.read().await;
            if let Some(cached) = entries.get(&cache_key(jwks_uri))
                && Instant::now() < cached.expires_at
            {
                return signing_keys_of(&cached.jwks);
            }
        }

        self.refresh(jwks_uri).await?;

        let entries = self.entries.read().await;
        let cached = entries
            .get(&cache_key(jwks_uri))
            .ok_or_else(|| KeySetError::Network("cache miss after refresh".to_string()))?;
        signing_keys_of(&cached.jwks)
    }

    /// Fetches the key set and replaces the cached entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the URI scheme is not allowed, the request fails,
    /// or the response is not a valid key set.
    pub async fn refresh(&self, jwks_uri: &Url) -> Result<(), KeySetError> {
        let scheme = jwks_uri.scheme();
        if scheme != "https" && !(scheme == "http" && self.config.allow_http) {
            return Err(KeySetError::InvalidScheme);
        }

        tracing::debug!(%jwks_uri, "Fetching key set");

        let response = self
            .http_client
            .get(jwks_uri.as_str())
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(%jwks_uri, error = %e, "Key set fetch failed");
                KeySetError::Network(e.to_string())
            })?;

        if !response.status().is_success() {
            return Err(KeySetError::HttpStatus(response.status().as_u16()));
        }

        let ttl = self.response_ttl(response.headers());

        let jwks: JwkSet = response
            .json()
            .await
            .map_err(|e| KeySetError::Parse(e.to_string()))?;

        tracing::debug!(%jwks_uri, keys = jwks.keys.len(), ?ttl, "Cached key set");

        let mut entries = self.entries.write().await;
        entries.insert(
            cache_key(jwks_uri),
            CachedKeySet {
                jwks,
                expires_at: Instant::now() + ttl,
            },
        );

        Ok(())
    }

    /// Seeds the cache with a key set for the given URI.
    ///
    /// The entry lives for the default TTL. Used for statically configured
    /// keys and for tests.
    pub async fn seed(&self, jwks_uri: &Url, jwks: JwkSet) {
        let mut entries = self.entries.write().await;
        entries.insert(
            cache_key(jwks_uri),
            CachedKeySet {
                jwks,
                expires_at: Instant::now() + self.config.default_ttl,
            },
        );
    }

    /// Drops the cached entry for a URI, forcing a refetch on next use.
    pub async fn invalidate(&self, jwks_uri: &Url) {
        let mut entries = self.entries.write().await;
        entries.remove(&cache_key(jwks_uri));
    }

    async fn cached_key(&self, jwks_uri: &Url, kid: &str) -> Option<ResolvedKey> {
        let entries = self.entries.read().await;
        let cached = entries.get(&cache_key(jwks_uri))?;
        if Instant::now() >= cached.expires_at {
            return None;
        }

        cached
            .jwks
            .keys
            .iter()
            .find(|k| k.common.key_id.as_deref() == Some(kid))
            .and_then(resolve_jwk)
    }

    /// TTL for a fetched key set: `Cache-Control: max-age`, clamped to the
    /// configured bounds, or the default TTL when absent.
    fn response_ttl(&self, headers: &reqwest::header::HeaderMap) -> Duration {
        headers
            .get(reqwest::header::CACHE_CONTROL)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| {
                v.split(',')
                    .find_map(|d| d.trim().strip_prefix("max-age=")?.parse::<u64>().ok())
            })
            .map(Duration::from_secs)
            .map_or(self.config.default_ttl, |ttl| {
                ttl.clamp(self.config.min_ttl, self.config.max_ttl)
            })
    }
}

fn signing_keys_of(jwks: &JwkSet) -> Result<Vec<ResolvedKey>, KeySetError> {
    let keys: Vec<_> = jwks
        .keys
        .iter()
        .filter(|k| !matches!(&k.common.public_key_use, Some(PublicKeyUse::Encryption)))
        .filter_map(resolve_jwk)
        .collect();

    if keys.is_empty() {
        Err(KeySetError::NoSigningKeys)
    } else {
        Ok(keys)
    }
}

fn resolve_jwk(jwk: &Jwk) -> Option<ResolvedKey> {
    let key = DecodingKey::from_jwk(jwk).ok()?;
    Some((key, jwk_algorithm(jwk)))
}

/// Maps a JWK's advertised algorithm onto a JWT signing algorithm.
fn jwk_algorithm(jwk: &Jwk) -> Option<Algorithm> {
    use jsonwebtoken::jwk::KeyAlgorithm;

    jwk.common.key_algorithm.as_ref().and_then(|alg| match alg {
        KeyAlgorithm::RS256 => Some(Algorithm::RS256),
        KeyAlgorithm::RS384 => Some(Algorithm::RS384),
        KeyAlgorithm::RS512 => Some(Algorithm::RS512),
        KeyAlgorithm::ES256 => Some(Algorithm::ES256),
        KeyAlgorithm::ES384 => Some(Algorithm::ES384),
        KeyAlgorithm::PS256 => Some(Algorithm::PS256),
        KeyAlgorithm::PS384 => Some(Algorithm::PS384),
        KeyAlgorithm::PS512 => Some(Algorithm::PS512),
        KeyAlgorithm::EdDSA => Some(Algorithm::EdDSA),
        _ => None,
    })
}

fn cache_key(jwks_uri: &Url) -> String {
    jwks_uri.as_str().trim_end_matches('/').to_string()
}
