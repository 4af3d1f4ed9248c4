//! Shared application state.

use std::sync::Arc;
use std::time::Duration;

use signet_rp::discovery::{DiscoveryCache, DiscoveryConfig};
use signet_rp::flow::{AuthFlowController, FlowConfig};
use signet_rp::gateway::HttpAuthorizationGateway;
use signet_rp::jwks::{KeySetCache, KeySetConfig};
use signet_rp::provider::ProviderConfig;
use signet_rp::session::SessionStore;
use signet_rp::verifier::{TokenVerifier, VerifierConfig};

use crate::config::{ConfigError, ServerConfig};

/// State shared by all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// The flow controller (the session store's single writer).
    pub controller: Arc<AuthFlowController>,

    /// The process-wide session store, read by handlers and the route guard.
    pub sessions: Arc<SessionStore>,

    /// Provider display name for the pages.
    pub provider_name: String,
}

impl AppState {
    /// Wires the Relying Party core from validated configuration.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when the configuration fails validation.
    pub fn from_config(config: &ServerConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let issuer = config
            .issuer_url()
            .ok_or_else(|| ConfigError::Invalid("provider.issuer".to_string()))?;
        let redirect_uri = config
            .redirect_url()
            .ok_or_else(|| ConfigError::Invalid("auth.redirect_uri".to_string()))?;

        let mut provider = ProviderConfig::new(
            config.provider.id.clone(),
            config.provider.name.clone(),
            issuer,
            config.provider.client_id.clone(),
        )
        .with_scopes(config.provider.scopes.clone());

        if let Some(secret) = &config.provider.client_secret {
            provider = provider.with_client_secret(secret.clone());
        }
        if config.provider.prompt_select_account {
            provider = provider.with_extra_auth_param("prompt", "select_account");
        }

        let discovery = Arc::new(DiscoveryCache::new(
            DiscoveryConfig::default().with_allow_http(config.auth.allow_http),
        ));
        let keys = Arc::new(KeySetCache::new(
            KeySetConfig::default().with_allow_http(config.auth.allow_http),
        ));

        let verifier = Arc::new(TokenVerifier::new(
            Arc::clone(&discovery),
            keys,
            VerifierConfig::default().with_clock_skew(config.auth.clock_skew),
        ));
        let gateway = Arc::new(HttpAuthorizationGateway::new(
            discovery,
            Duration::from_secs(30),
        ));

        let sessions = Arc::new(SessionStore::new());
        let flow_config = FlowConfig::new(redirect_uri)
            .with_request_ttl(to_time_duration(config.auth.request_ttl))
            .with_session_ttl(to_time_duration(config.auth.session_ttl));

        let controller = Arc::new(AuthFlowController::new(
            provider,
            flow_config,
            gateway,
            verifier,
            Arc::clone(&sessions),
        ));

        Ok(Self {
            controller,
            sessions,
            provider_name: config.provider.name.clone(),
        })
    }
}

fn to_time_duration(duration: Duration) -> time::Duration {
    time::Duration::try_from(duration).unwrap_or(time::Duration::MAX)
}
