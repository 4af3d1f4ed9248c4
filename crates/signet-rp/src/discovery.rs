//! OpenID Connect Discovery.
//!
//! Fetches provider metadata from the `.well-known/openid-configuration`
//! endpoint and caches it with a bounded TTL. The issuer asserted by the
//! document must match the issuer it was fetched for; only HTTPS endpoints
//! are accepted unless explicitly configured otherwise for tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use url::Url;

/// Provider metadata from the discovery document.
///
/// Trimmed to the fields a Relying Party needs; unknown fields are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderMetadata {
    /// URL the provider asserts as its issuer identifier.
    pub issuer: String,

    /// Authorization endpoint URL.
    pub authorization_endpoint: String,

    /// Token endpoint URL.
    pub token_endpoint: String,

    /// JSON Web Key Set document URL.
    pub jwks_uri: String,

    /// UserInfo endpoint URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub userinfo_endpoint: Option<String>,

    /// RP-initiated logout endpoint URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_session_endpoint: Option<String>,

    /// Scope values the provider supports.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scopes_supported: Option<Vec<String>>,

    /// `response_type` values the provider supports.
    #[serde(default)]
    pub response_types_supported: Vec<String>,

    /// JWS algorithms the provider signs ID tokens with.
    #[serde(default)]
    pub id_token_signing_alg_values_supported: Vec<String>,

    /// PKCE code challenge methods the provider supports.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_challenge_methods_supported: Option<Vec<String>>,
}

impl ProviderMetadata {
    /// Returns `true` if the provider supports the given scope.
    #[must_use]
    pub fn supports_scope(&self, scope: &str) -> bool {
        self.scopes_supported
            .as_ref()
            .is_some_and(|scopes| scopes.iter().any(|s| s == scope))
    }

    /// Returns `true` if the provider supports the given response type.
    #[must_use]
    pub fn supports_response_type(&self, response_type: &str) -> bool {
        self.response_types_supported
            .iter()
            .any(|rt| rt == response_type)
    }

    /// Returns `true` if the provider supports S256 PKCE.
    #[must_use]
    pub fn supports_pkce(&self) -> bool {
        self.code_challenge_methods_supported
            .as_ref()
            .is_some_and(|methods| methods.iter().any(|m| m == "S256"))
    }
}

/// Errors that can occur during discovery.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DiscoveryError {
    /// A network error occurred while fetching the document.
    #[error("Network error: {0}")]
    Network(String),

    /// The HTTP request returned a non-success status code.
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),

    /// The document could not be parsed.
    #[error("Failed to parse discovery document: {0}")]
    Parse(String),

    /// The document's issuer does not match the issuer it was fetched for.
    #[error("Issuer mismatch: expected {expected}, got {actual}")]
    IssuerMismatch {
        /// The issuer the document was fetched for.
        expected: String,
        /// The issuer asserted by the document.
        actual: String,
    },

    /// The issuer URL scheme is not allowed.
    #[error("Invalid URL scheme: only HTTPS is allowed")]
    InvalidScheme,
}

/// Configuration for the discovery cache.
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Time-to-live for cached documents (default: 1 hour).
    pub ttl: Duration,

    /// HTTP request timeout (default: 10 seconds).
    pub request_timeout: Duration,

    /// Whether to allow HTTP (non-HTTPS) issuers. Testing only.
    pub allow_http: bool,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(3600),
            request_timeout: Duration::from_secs(10),
            allow_http: false,
        }
    }
}

impl DiscoveryConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the cache TTL.
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Sets the HTTP request timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Allows HTTP (non-HTTPS) issuers. Testing only.
    #[must_use]
    pub fn with_allow_http(mut self, allow: bool) -> Self {
        self.allow_http = allow;
        self
    }
}

struct CachedMetadata {
    metadata: ProviderMetadata,
    expires_at: Instant,
}

/// TTL-bounded cache of provider metadata, keyed by issuer.
pub struct DiscoveryCache {
    http_client: reqwest::Client,
    entries: Arc<RwLock<HashMap<String, CachedMetadata>>>,
    config: DiscoveryConfig,
}

impl DiscoveryCache {
    /// Creates a new discovery cache.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be created (should not happen in
    /// practice).
    #[must_use]
    pub fn new(config: DiscoveryConfig) -> Self {
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
        Self::new(DiscoveryConfig::default())
    }

    /// Returns the metadata for an issuer, fetching it if absent or stale.
    ///
    /// # Errors
    ///
    /// Returns an error if the issuer scheme is not allowed, the fetch fails,
    /// or the document's issuer does not match.
    pub async fn get(&self, issuer: &Url) -> Result<ProviderMetadata, DiscoveryError> {
        let key = cache_key(issuer);

        {
            let entries = self.entries.read().await;
            if let Some(cached) = entries.get(&key)
                && Instant::now() < cached.expires_at
            {
                return Ok(cached.metadata.clone());
            }
        }

        let metadata = self.fetch(issuer).await?;

        let mut entries = self.entries.write().await;
        entries.insert(
            key,
            CachedMetadata {
                metadata: metadata.clone(),
                expires_at: Instant::now() + self.config.ttl,
            },
        );

        Ok(metadata)
    }

    /// Seeds the cache with metadata for an issuer.
    ///
    /// Used for providers whose metadata is statically configured, and by
    /// tests that must not perform network I/O. The entry lives for the
    /// configured TTL.
    pub async fn seed(&self, issuer: &Url, metadata: ProviderMetadata) {
        let mut entries = self.entries.write().await;
        entries.insert(
            cache_key(issuer),
            CachedMetadata {
                metadata,
                expires_at: Instant::now() + self.config.ttl,
            },
        );
    }

    /// Drops the cached entry for an issuer, forcing a refetch on next use.
    pub async fn invalidate(&self, issuer: &Url) {
        let mut entries = self.entries.write().await;
        entries.remove(&cache_key(issuer));
    }

    async fn fetch(&self, issuer: &Url) -> Result<ProviderMetadata, DiscoveryError> {
        let scheme = issuer.scheme();
        if scheme != "https" && !(scheme == "http" && self.config.allow_http) {
            return Err(DiscoveryError::InvalidScheme);
        }

        let well_known = well_known_url(issuer);
        tracing::debug!(%well_known, "Fetching provider metadata");

        let response = self
            .http_client
            .get(well_known.clone())
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(%well_known, error = %e, "Provider metadata fetch failed");
                DiscoveryError::Network(e.to_string())
            })?;

        if !response.status().is_success() {
            return Err(DiscoveryError::HttpStatus(response.status().as_u16()));
        }

        let metadata: ProviderMetadata = response
            .json()
            .await
            .map_err(|e| DiscoveryError::Parse(e.to_string()))?;

        // The asserted issuer must match the issuer the document was fetched
        // for, modulo a trailing slash.
        let expected = issuer.as_str().trim_end_matches('/');
        let actual = metadata.issuer.trim_end_matches('/');
        if expected != actual {
            return Err(DiscoveryError::IssuerMismatch {
                expected: expected.to_string(),
                actual: actual.to_string(),
            });
        }

        Ok(metadata)
    }
}

/// Builds the well-known configuration URL for an issuer.
fn well_known_url(issuer: &Url) -> String {
    format!(
        "{}/.well-known/openid-configuration",
        issuer.as_str().trim_end_matches('/')
    )
}

fn cache_key(issuer: &Url) -> String {
    issuer.as_str().trim_end_matches('/').to_string()
}
