//! Identity Provider configuration.
//!
//! Describes the external OIDC provider this Relying Party delegates
//! authentication to. Endpoints are normally discovered from the issuer's
//! `.well-known/openid-configuration`; explicit overrides are available for
//! providers with non-standard deployments and for tests.
//!
//! # Example
//!
//! ```ignore
//! use signet_rp::provider::ProviderConfig;
//! use url::Url;
//!
//! let provider = ProviderConfig::new(
//!     "google",
//!     "Google",
//!     Url::parse("https://accounts.google.com")?,
//!     "client-id.apps.googleusercontent.com",
//! )
//! .with_client_secret("client-secret")
//! .with_extra_auth_param("prompt", "select_account");
//! ```

use serde::{Deserialize, Serialize};
use url::Url;

/// Configuration for the external Identity Provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Stable identifier for this provider (e.g. "google").
    pub id: String,

    /// Human-readable name for display (e.g. "Google").
    pub name: String,

    /// The OIDC issuer URL.
    pub issuer: Url,

    /// OAuth client identifier registered with the provider.
    pub client_id: String,

    /// OAuth client secret (absent for public clients).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,

    /// Scopes to request. Always includes at least `openid email profile`.
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,

    /// Override for the authorization endpoint (otherwise discovered).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization_endpoint: Option<String>,

    /// Override for the token endpoint (otherwise discovered).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_endpoint: Option<String>,

    /// Override for the JWKS URI (otherwise discovered).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jwks_uri: Option<String>,

    /// Additional parameters appended to the authorization URL,
    /// e.g. `prompt=select_account`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_auth_params: Vec<(String, String)>,
}

fn default_scopes() -> Vec<String> {
    vec![
        "openid".to_string(),
        "email".to_string(),
        "profile".to_string(),
    ]
}

impl ProviderConfig {
    /// Creates a provider configuration with the required fields and the
    /// default scope set.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        issuer: Url,
        client_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            issuer,
            client_id: client_id.into(),
            client_secret: None,
            scopes: default_scopes(),
            authorization_endpoint: None,
            token_endpoint: None,
            jwks_uri: None,
            extra_auth_params: Vec::new(),
        }
    }

    /// Sets the client secret.
    #[must_use]
    pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
        self.client_secret = Some(secret.into());
        self
    }

    /// Replaces the requested scopes.
    #[must_use]
    pub fn with_scopes(mut self, scopes: Vec<impl Into<String>>) -> Self {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the authorization endpoint override.
    #[must_use]
    pub fn with_authorization_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.authorization_endpoint = Some(endpoint.into());
        self
    }

    /// Sets the token endpoint override.
    #[must_use]
    pub fn with_token_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.token_endpoint = Some(endpoint.into());
        self
    }

    /// Sets the JWKS URI override.
    #[must_use]
    pub fn with_jwks_uri(mut self, uri: impl Into<String>) -> Self {
        self.jwks_uri = Some(uri.into());
        self
    }

    /// Appends an extra authorization parameter.
    #[must_use]
    pub fn with_extra_auth_param(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.extra_auth_params.push((key.into(), value.into()));
        self
    }

    /// The scope string for the authorization request.
    #[must_use]
    pub fn scope_string(&self) -> String {
        self.scopes.join(" ")
    }

    /// Returns `true` if this provider uses a confidential client.
    #[must_use]
    pub fn is_confidential(&self) -> bool {
        self.client_secret.is_some()
    }
}
