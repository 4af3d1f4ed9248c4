//! Authorization gateway capability.
//!
//! The flow controller talks to the Identity Provider only through the
//! [`AuthorizationGateway`] trait — request authorization, exchange the
//! returned code for tokens. Any OIDC-conforming provider can be substituted
//! without touching the controller; tests substitute an in-process fake.
//!
//! [`HttpAuthorizationGateway`] is the production implementation: endpoints
//! are resolved from provider overrides or discovery, and the code exchange
//! goes to the token endpoint as an `application/x-www-form-urlencoded` POST.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use crate::discovery::DiscoveryCache;
use crate::error::FlowError;
use crate::pkce::{CHALLENGE_METHOD, PkceChallenge};
use crate::provider::ProviderConfig;
use crate::request::AuthRequest;

/// Token endpoint response for a successful code exchange.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenExchange {
    /// Access token for the provider's APIs.
    pub access_token: String,

    /// Token type, normally `Bearer`.
    pub token_type: String,

    /// Access token lifetime in seconds.
    pub expires_in: Option<u64>,

    /// Refresh token, if the provider issued one.
    pub refresh_token: Option<String>,

    /// The ID token asserting the authenticated identity.
    pub id_token: String,

    /// Granted scopes.
    pub scope: Option<String>,
}

/// OAuth error body returned by the token endpoint.
#[derive(Debug, Deserialize)]
struct OAuthErrorResponse {
    error: String,
    error_description: Option<String>,
}

/// Capability interface to the external Identity Provider.
#[async_trait]
pub trait AuthorizationGateway: Send + Sync {
    /// Builds the authorization URL the user agent is sent to.
    async fn authorization_url(
        &self,
        provider: &ProviderConfig,
        redirect_uri: &Url,
        request: &AuthRequest,
    ) -> Result<Url, FlowError>;

    /// Exchanges an authorization code for tokens.
    async fn exchange_token(
        &self,
        provider: &ProviderConfig,
        redirect_uri: &Url,
        code: &str,
        request: &AuthRequest,
    ) -> Result<TokenExchange, FlowError>;
}

/// Gateway implementation over HTTP, using OIDC discovery for endpoints.
pub struct HttpAuthorizationGateway {
    discovery: Arc<DiscoveryCache>,
    http_client: reqwest::Client,
}

impl HttpAuthorizationGateway {
    /// Creates a gateway with the given discovery cache and request timeout.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be created (should not happen in
    /// practice).
    #[must_use]
    pub fn new(discovery: Arc<DiscoveryCache>, request_timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            discovery,
            http_client,
        }
    }

    async fn authorization_endpoint(&self, provider: &ProviderConfig) -> Result<Url, FlowError> {
        resolve_endpoint(
            provider.authorization_endpoint.as_deref(),
            &self.discovery,
            &provider.issuer,
            |m| m.authorization_endpoint.clone(),
        )
        .await
    }

    async fn token_endpoint(&self, provider: &ProviderConfig) -> Result<Url, FlowError> {
        resolve_endpoint(
            provider.token_endpoint.as_deref(),
            &self.discovery,
            &provider.issuer,
            |m| m.token_endpoint.clone(),
        )
        .await
    }
}

#[async_trait]
impl AuthorizationGateway for HttpAuthorizationGateway {
    async fn authorization_url(
        &self,
        provider: &ProviderConfig,
        redirect_uri: &Url,
        request: &AuthRequest,
    ) -> Result<Url, FlowError> {
        let mut url = self.authorization_endpoint(provider).await?;
        let challenge = PkceChallenge::from_verifier(&request.pkce_verifier);

        {
            let mut params = url.query_pairs_mut();
            params.append_pair("response_type", "code");
            params.append_pair("client_id", &provider.client_id);
            params.append_pair("redirect_uri", redirect_uri.as_str());
            params.append_pair("scope", &request.scopes.join(" "));
            params.append_pair("state", &request.state);
            params.append_pair("nonce", &request.nonce);
            params.append_pair("code_challenge", challenge.as_str());
            params.append_pair("code_challenge_method", CHALLENGE_METHOD);

            for (key, value) in &provider.extra_auth_params {
                params.append_pair(key, value);
            }
        }

        tracing::debug!(
            provider = %provider.id,
            endpoint = %url.as_str().split('?').next().unwrap_or(""),
            "Built authorization URL"
        );

        Ok(url)
    }

    async fn exchange_token(
        &self,
        provider: &ProviderConfig,
        redirect_uri: &Url,
        code: &str,
        request: &AuthRequest,
    ) -> Result<TokenExchange, FlowError> {
        let endpoint = self.token_endpoint(provider).await?;

        let mut params = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri.as_str()),
            ("client_id", &provider.client_id),
            ("code_verifier", request.pkce_verifier.as_str()),
        ];

        // Confidential clients authenticate with their secret.
        if let Some(secret) = &provider.client_secret {
            params.push(("client_secret", secret.as_str()));
        }

        tracing::debug!(provider = %provider.id, %endpoint, "Exchanging authorization code");

        let response = self
            .http_client
            .post(endpoint.as_str())
            .form(&params)
            .send()
            .await
            .map_err(|e| FlowError::NetworkFailure(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();

            if let Ok(oauth_error) = serde_json::from_str::<OAuthErrorResponse>(&body) {
                return Err(FlowError::provider_error(
                    oauth_error.error,
                    oauth_error.error_description.unwrap_or_default(),
                ));
            }

            return Err(FlowError::TokenExchangeFailed(format!("HTTP {status}")));
        }

        response
            .json()
            .await
            .map_err(|e| FlowError::TokenExchangeFailed(format!("invalid token response: {e}")))
    }
}

/// Resolves an endpoint from an override or the discovery document.
async fn resolve_endpoint(
    override_url: Option<&str>,
    discovery: &DiscoveryCache,
    issuer: &Url,
    pick: impl Fn(&crate::discovery::ProviderMetadata) -> String,
) -> Result<Url, FlowError> {
    let raw = match override_url {
        Some(url) => url.to_string(),
        None => {
            let metadata = discovery
                .get(issuer)
                .await
                .map_err(|e| FlowError::NetworkFailure(e.to_string()))?;
            pick(&metadata)
        }
    };

    Url::parse(&raw)
        .map_err(|e| FlowError::NetworkFailure(format!("invalid provider endpoint: {e}")))
}
