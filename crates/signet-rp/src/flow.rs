//! Authentication flow orchestration.
//!
//! [`AuthFlowController`] drives one authorization round-trip at a time
//! through the state machine
//! `Idle → Requesting → AwaitingResponse → Verifying → {Authenticated | Failed}`.
//!
//! # Concurrency
//!
//! At most one [`AuthRequest`] is in flight per controller. A second
//! [`start`] discards the previous request, so a late callback for the
//! superseded flow fails with [`FlowError::UnknownOrExpiredState`] instead
//! of being accepted. Every suspension point (token exchange, verification)
//! re-checks a monotonically incrementing flow generation afterwards;
//! completions belonging to a superseded generation are discarded without
//! touching the session store or the visible state.
//!
//! # Failure handling
//!
//! No flow error escapes as a fault: every failure transitions the
//! controller to `Failed` with the recorded cause, clears the session store,
//! and is returned to the caller carrying a machine-readable kind and a
//! non-secret user message.
//!
//! [`start`]: AuthFlowController::start

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Deserialize;
use time::{Duration, OffsetDateTime};
use url::Url;

use crate::claims::IdentityClaims;
use crate::error::FlowError;
use crate::gateway::AuthorizationGateway;
use crate::profile::{Profile, project};
use crate::provider::ProviderConfig;
use crate::request::AuthRequest;
use crate::session::{Session, SessionStore};
use crate::verifier::TokenVerifier;

/// Observable state of the flow controller, for conditional rendering.
#[derive(Debug, Clone, PartialEq)]
pub enum FlowState {
    /// No flow in progress and no failure to report.
    Idle,

    /// Building the authorization request.
    Requesting,

    /// Authorization URL handed to the user agent; waiting for the callback.
    AwaitingResponse,

    /// Callback received; exchanging and verifying the token.
    Verifying,

    /// A session is established.
    Authenticated,

    /// The last flow failed with the recorded cause.
    Failed {
        /// Machine-readable error kind.
        kind: &'static str,
        /// Non-secret user-visible message.
        message: String,
    },
}

impl FlowState {
    /// Short name for logs and the session JSON endpoint.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Requesting => "requesting",
            Self::AwaitingResponse => "awaiting_response",
            Self::Verifying => "verifying",
            Self::Authenticated => "authenticated",
            Self::Failed { .. } => "failed",
        }
    }
}

/// Query parameters delivered to the redirect target by the provider
/// (or by the UI collaborator reporting a user-agent failure).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackParams {
    /// Echoed `state` value.
    pub state: Option<String>,

    /// Authorization code (code flow).
    pub code: Option<String>,

    /// ID token delivered directly (implicit flow).
    pub id_token: Option<String>,

    /// Error code, when the authorization failed upstream.
    pub error: Option<String>,

    /// Human-readable error detail from the provider.
    pub error_description: Option<String>,
}

/// Result of starting a flow: where to send the user agent.
#[derive(Debug)]
pub struct StartedFlow {
    /// The authorization URL for the redirect or popup.
    pub authorization_url: Url,

    /// The `state` value of the new request.
    pub state: String,

    /// The `nonce` bound into the request.
    pub nonce: String,
}

/// Configuration for the flow controller.
#[derive(Debug, Clone)]
pub struct FlowConfig {
    /// Redirect target registered with the provider.
    pub redirect_uri: Url,

    /// How long a started flow waits for its callback (default: 10 minutes).
    pub request_ttl: Duration,

    /// Upper bound on session lifetime (default: 8 hours). The token's own
    /// expiry wins when it is sooner.
    pub session_ttl: Duration,
}

impl FlowConfig {
    /// Creates a configuration with the given redirect target and default
    /// TTLs.
    #[must_use]
    pub fn new(redirect_uri: Url) -> Self {
        Self {
            redirect_uri,
            request_ttl: Duration::minutes(10),
            session_ttl: Duration::hours(8),
        }
    }

    /// Sets the authorization-request TTL.
    #[must_use]
    pub fn with_request_ttl(mut self, ttl: Duration) -> Self {
        self.request_ttl = ttl;
        self
    }

    /// Sets the session TTL bound.
    #[must_use]
    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }
}

/// Orchestrates the authorization exchange against one provider.
pub struct AuthFlowController {
    provider: ProviderConfig,
    config: FlowConfig,
    gateway: Arc<dyn AuthorizationGateway>,
    verifier: Arc<TokenVerifier>,
    store: Arc<SessionStore>,
    pending: Mutex<Option<AuthRequest>>,
    state: Mutex<FlowState>,
    generation: AtomicU64,
}

impl AuthFlowController {
    /// Creates a controller in the `Idle` state.
    #[must_use]
    pub fn new(
        provider: ProviderConfig,
        config: FlowConfig,
        gateway: Arc<dyn AuthorizationGateway>,
        verifier: Arc<TokenVerifier>,
        store: Arc<SessionStore>,
    ) -> Self {
        Self {
            provider,
            config,
            gateway,
            verifier,
            store,
            pending: Mutex::new(None),
            state: Mutex::new(FlowState::Idle),
            generation: AtomicU64::new(0),
        }
    }

    /// The provider this controller authenticates against.
    #[must_use]
    pub fn provider(&self) -> &ProviderConfig {
        &self.provider
    }

    /// The current observable state.
    #[must_use]
    pub fn state(&self) -> FlowState {
        self.lock_state().clone()
    }

    /// Route-guard view: `true` while an unexpired session exists.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.store.is_authenticated()
    }

    /// The display profile for the current session, if any.
    #[must_use]
    pub fn profile(&self) -> Option<Profile> {
        project(self.store.get().as_ref())
    }

    /// Starts a new flow, superseding any flow already in flight.
    ///
    /// Generates fresh `state` and `nonce` values, persists the request, and
    /// returns the authorization URL for the UI collaborator to open.
    ///
    /// # Errors
    ///
    /// Fails when the authorization URL cannot be built (endpoint discovery
    /// unreachable), or with [`FlowError::UnknownOrExpiredState`] when this
    /// start was itself superseded while suspending.
    pub async fn start(&self) -> Result<StartedFlow, FlowError> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let request = AuthRequest::new(
            self.provider.scopes.clone(),
            self.config.request_ttl,
            generation,
        );

        {
            let mut pending = self.lock_pending();
            if let Some(previous) = pending.take() {
                tracing::debug!(
                    superseded_state = %previous.state,
                    "Discarding in-flight authorization request"
                );
            }
            *pending = Some(request.clone());
            *self.lock_state() = FlowState::Requesting;
        }

        match self
            .gateway
            .authorization_url(&self.provider, &self.config.redirect_uri, &request)
            .await
        {
            Ok(url) => {
                if !self.is_current(generation) {
                    return Err(FlowError::UnknownOrExpiredState);
                }
                *self.lock_state() = FlowState::AwaitingResponse;
                tracing::info!(provider = %self.provider.id, "Authorization flow started");
                Ok(StartedFlow {
                    authorization_url: url,
                    state: request.state,
                    nonce: request.nonce,
                })
            }
            Err(e) => {
                self.discard_request(generation);
                self.fail_if_current(generation, &e);
                Err(e)
            }
        }
    }

    /// Handles the provider's callback for the flow in flight.
    ///
    /// # Errors
    ///
    /// Fails with [`FlowError::UnknownOrExpiredState`] when the callback's
    /// `state` matches no live request (CSRF, duplicate, late, or superseded
    /// callbacks), or with the specific flow/verification error otherwise.
    pub async fn handle_callback(&self, params: CallbackParams) -> Result<Session, FlowError> {
        let state = params.state.as_deref().unwrap_or_default();

        let request = {
            let mut pending = self.lock_pending();
            if pending.as_ref().is_some_and(|r| r.matches_state(state)) {
                pending.take()
            } else {
                None
            }
        };

        let Some(request) = request else {
            tracing::warn!("Callback state matches no pending authorization request");
            return Err(FlowError::UnknownOrExpiredState);
        };
        let generation = request.generation;

        if request.is_expired() {
            let err = FlowError::UnknownOrExpiredState;
            self.fail_if_current(generation, &err);
            return Err(err);
        }

        // Failures reported by the provider or the user agent.
        if let Some(code) = params.error.as_deref() {
            let err = callback_error(code, params.error_description);
            self.fail_if_current(generation, &err);
            return Err(err);
        }

        if self.is_current(generation) {
            *self.lock_state() = FlowState::Verifying;
        }

        let id_token = match (params.code.as_deref(), params.id_token) {
            (Some(code), _) => {
                let exchange = self
                    .gateway
                    .exchange_token(&self.provider, &self.config.redirect_uri, code, &request)
                    .await;
                match exchange {
                    Ok(exchange) => exchange.id_token,
                    Err(e) => {
                        self.fail_if_current(generation, &e);
                        return Err(e);
                    }
                }
            }
            (None, Some(token)) => token,
            (None, None) => {
                let err = FlowError::TokenExchangeFailed(
                    "authorization response carried neither code nor id_token".to_string(),
                );
                self.fail_if_current(generation, &err);
                return Err(err);
            }
        };

        let verified = self
            .verifier
            .verify(
                &self.provider,
                &id_token,
                &request.nonce,
                &self.provider.client_id,
            )
            .await;

        let claims = match verified {
            Ok(claims) => claims,
            Err(e) => {
                let err = FlowError::from(e);
                self.fail_if_current(generation, &err);
                return Err(err);
            }
        };

        let session = self.build_session(&claims);

        // Both awaits above may have outlived a newer start() or sign_out().
        // A stale completion must not update the store or the visible state.
        if !self.is_current(generation) {
            tracing::debug!("Discarding completion of superseded authorization flow");
            return Err(FlowError::UnknownOrExpiredState);
        }

        self.store.set(session.clone());
        *self.lock_state() = FlowState::Authenticated;
        tracing::info!(
            subject = %session.subject,
            provider = %self.provider.id,
            "Authentication completed"
        );

        Ok(session)
    }

    /// Signs the user out: clears the session store, discards any pending
    /// request, and returns to `Idle`. Idempotent.
    pub fn sign_out(&self) {
        // Strand any in-flight completion.
        self.generation.fetch_add(1, Ordering::SeqCst);
        *self.lock_pending() = None;
        self.store.clear();
        *self.lock_state() = FlowState::Idle;
        tracing::info!("Signed out");
    }

    fn build_session(&self, claims: &IdentityClaims) -> Session {
        let now = OffsetDateTime::now_utc();
        let mut expires_at = now + self.config.session_ttl;
        if let Ok(token_exp) = OffsetDateTime::from_unix_timestamp(claims.exp)
            && token_exp < expires_at
        {
            expires_at = token_exp;
        }
        Session::from_claims(claims, self.provider.id.as_str(), expires_at)
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    /// Records a failure, unless the flow was superseded in the meantime.
    fn fail_if_current(&self, generation: u64, err: &FlowError) {
        if !self.is_current(generation) {
            return;
        }
        self.store.clear();
        *self.lock_state() = FlowState::Failed {
            kind: err.kind(),
            message: err.user_message(),
        };
        tracing::warn!(kind = err.kind(), error = %err, "Authentication flow failed");
    }

    fn discard_request(&self, generation: u64) {
        let mut pending = self.lock_pending();
        if pending.as_ref().is_some_and(|r| r.generation == generation) {
            *pending = None;
        }
    }

    fn lock_pending(&self) -> MutexGuard<'_, Option<AuthRequest>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_state(&self) -> MutexGuard<'_, FlowState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Maps a callback `error` parameter onto the flow taxonomy.
fn callback_error(code: &str, description: Option<String>) -> FlowError {
    match code {
        "access_denied" | "popup_closed_by_user" | "cancelled_popup_request" => {
            FlowError::UserCancelled
        }
        "popup_blocked" => FlowError::PopupBlocked,
        other => FlowError::provider_error(other, description.unwrap_or_default()),
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::discovery::{DiscoveryCache, DiscoveryConfig};
    use crate::error::VerificationError;
    use crate::gateway::TokenExchange;
    use crate::jwks::{KeySetCache, KeySetConfig};
    use crate::test_support::rsa_test_key;
    use crate::verifier::VerifierConfig;

    const ISSUER: &str = "https://idp.example";
    const CLIENT_ID: &str = "this-client";
    const JWKS_URI: &str = "https://127.0.0.1:1/jwks";

    /// In-process provider: mints signed ID tokens at exchange time.
    struct FakeGateway {
        /// Nonce to embed instead of the request's (to provoke mismatches).
        nonce_override: Option<String>,
        /// Fail the exchange with this error instead of minting a token.
        fail_with: Option<FlowError>,
        /// Artificial exchange latency, for stale-completion tests.
        delay: Option<std::time::Duration>,
    }

    impl FakeGateway {
        fn ok() -> Self {
            Self {
                nonce_override: None,
                fail_with: None,
                delay: None,
            }
        }
    }

    #[async_trait]
    impl AuthorizationGateway for FakeGateway {
        async fn authorization_url(
            &self,
            provider: &ProviderConfig,
            redirect_uri: &Url,
            request: &AuthRequest,
        ) -> Result<Url, FlowError> {
            Url::parse_with_params(
                &format!("{ISSUER}/authorize"),
                [
                    ("client_id", provider.client_id.as_str()),
                    ("redirect_uri", redirect_uri.as_str()),
                    ("state", request.state.as_str()),
                    ("nonce", request.nonce.as_str()),
                ],
            )
            .map_err(|e| FlowError::NetworkFailure(e.to_string()))
        }

        async fn exchange_token(
            &self,
            _provider: &ProviderConfig,
            _redirect_uri: &Url,
            _code: &str,
            request: &AuthRequest,
        ) -> Result<TokenExchange, FlowError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if let Some(err) = &self.fail_with {
                return Err(err.clone());
            }

            let nonce = self
                .nonce_override
                .clone()
                .unwrap_or_else(|| request.nonce.clone());
            let now = OffsetDateTime::now_utc().unix_timestamp();
            let id_token = rsa_test_key().sign(&serde_json::json!({
                "iss": ISSUER,
                "sub": "user-123",
                "aud": CLIENT_ID,
                "exp": now + 3600,
                "iat": now,
                "nonce": nonce,
                "email": "a@b.com",
                "email_verified": true,
                "name": "Test User",
            }));

            Ok(TokenExchange {
                access_token: "access-token".to_string(),
                token_type: "Bearer".to_string(),
                expires_in: Some(3600),
                refresh_token: None,
                id_token,
                scope: None,
            })
        }
    }

    async fn controller_with(gateway: FakeGateway) -> AuthFlowController {
        let keys = KeySetCache::new(KeySetConfig::default());
        keys.seed(&Url::parse(JWKS_URI).unwrap(), rsa_test_key().jwk_set())
            .await;
        let verifier = TokenVerifier::new(
            Arc::new(DiscoveryCache::new(DiscoveryConfig::default())),
            Arc::new(keys),
            VerifierConfig::default(),
        );

        let provider =
            ProviderConfig::new("test", "Test IdP", Url::parse(ISSUER).unwrap(), CLIENT_ID)
                .with_jwks_uri(JWKS_URI);
        let config = FlowConfig::new(Url::parse("https://app.example.com/auth/callback").unwrap());

        AuthFlowController::new(
            provider,
            config,
            Arc::new(gateway),
            Arc::new(verifier),
            Arc::new(SessionStore::new()),
        )
    }

    fn callback(state: &str) -> CallbackParams {
        CallbackParams {
            state: Some(state.to_string()),
            code: Some("auth-code".to_string()),
            ..CallbackParams::default()
        }
    }

    #[tokio::test]
    async fn test_start_builds_authorization_url() {
        let controller = controller_with(FakeGateway::ok()).await;
        assert_eq!(controller.state(), FlowState::Idle);

        let started = controller.start().await.unwrap();
        assert_eq!(controller.state(), FlowState::AwaitingResponse);

        let query: std::collections::HashMap<String, String> = started
            .authorization_url
            .query_pairs()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        assert_eq!(query["state"], started.state);
        assert_eq!(query["nonce"], started.nonce);
    }

    #[tokio::test]
    async fn test_callback_establishes_session() {
        let controller = controller_with(FakeGateway::ok()).await;
        let started = controller.start().await.unwrap();

        let session = controller.handle_callback(callback(&started.state)).await.unwrap();
        assert_eq!(session.subject, "user-123");
        assert_eq!(controller.state(), FlowState::Authenticated);
        assert!(controller.is_authenticated());

        let profile = controller.profile().unwrap();
        assert_eq!(profile.display_name, "Test User");
        assert_eq!(profile.email, Some("a@b.com".to_string()));
    }

    #[tokio::test]
    async fn test_unknown_state_rejected_and_flow_survives() {
        let controller = controller_with(FakeGateway::ok()).await;
        let started = controller.start().await.unwrap();

        let err = controller
            .handle_callback(callback("not-the-state"))
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::UnknownOrExpiredState));

        // The live request was not consumed: the real callback still works.
        assert!(
            controller
                .handle_callback(callback(&started.state))
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_missing_state_rejected() {
        let controller = controller_with(FakeGateway::ok()).await;
        controller.start().await.unwrap();

        let err = controller
            .handle_callback(CallbackParams::default())
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::UnknownOrExpiredState));
    }

    #[tokio::test]
    async fn test_second_start_invalidates_first() {
        let controller = controller_with(FakeGateway::ok()).await;
        let first = controller.start().await.unwrap();
        let second = controller.start().await.unwrap();

        // A late callback for the superseded flow is rejected...
        let err = controller
            .handle_callback(callback(&first.state))
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::UnknownOrExpiredState));
        assert!(!controller.is_authenticated());

        // ...while the current flow still completes.
        assert!(
            controller
                .handle_callback(callback(&second.state))
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_duplicate_callback_rejected() {
        let controller = controller_with(FakeGateway::ok()).await;
        let started = controller.start().await.unwrap();

        controller.handle_callback(callback(&started.state)).await.unwrap();

        let err = controller
            .handle_callback(callback(&started.state))
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::UnknownOrExpiredState));
        // The established session is untouched by the duplicate.
        assert!(controller.is_authenticated());
    }

    #[tokio::test]
    async fn test_expired_request_rejected() {
        let controller = {
            let mut c = controller_with(FakeGateway::ok()).await;
            c.config.request_ttl = Duration::seconds(-1);
            c
        };
        let started = controller.start().await.unwrap();

        let err = controller
            .handle_callback(callback(&started.state))
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::UnknownOrExpiredState));
        assert_eq!(controller.state().name(), "failed");
    }

    #[tokio::test]
    async fn test_sign_out_is_idempotent() {
        let controller = controller_with(FakeGateway::ok()).await;
        let started = controller.start().await.unwrap();
        controller.handle_callback(callback(&started.state)).await.unwrap();
        assert!(controller.is_authenticated());

        controller.sign_out();
        assert!(!controller.is_authenticated());
        assert!(controller.profile().is_none());
        assert_eq!(controller.state(), FlowState::Idle);

        // Safe with no active session.
        controller.sign_out();
        assert_eq!(controller.state(), FlowState::Idle);
    }

    #[tokio::test]
    async fn test_user_cancelled_callback() {
        let controller = controller_with(FakeGateway::ok()).await;
        let started = controller.start().await.unwrap();

        let params = CallbackParams {
            state: Some(started.state),
            error: Some("access_denied".to_string()),
            error_description: Some("The user denied the request".to_string()),
            ..CallbackParams::default()
        };
        let err = controller.handle_callback(params).await.unwrap_err();
        assert!(matches!(err, FlowError::UserCancelled));

        match controller.state() {
            FlowState::Failed { kind, .. } => assert_eq!(kind, "user_cancelled"),
            other => panic!("expected Failed state, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_popup_blocked_callback() {
        let controller = controller_with(FakeGateway::ok()).await;
        let started = controller.start().await.unwrap();

        let params = CallbackParams {
            state: Some(started.state),
            error: Some("popup_blocked".to_string()),
            ..CallbackParams::default()
        };
        let err = controller.handle_callback(params).await.unwrap_err();
        assert!(matches!(err, FlowError::PopupBlocked));
        assert_eq!(err.kind(), "popup_blocked");
    }

    #[tokio::test]
    async fn test_nonce_mismatch_fails_flow() {
        let gateway = FakeGateway {
            nonce_override: Some("nonce-from-another-flow".to_string()),
            ..FakeGateway::ok()
        };
        let controller = controller_with(gateway).await;
        let started = controller.start().await.unwrap();

        let err = controller
            .handle_callback(callback(&started.state))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            FlowError::Verification(VerificationError::NonceMismatch)
        ));
        assert!(!controller.is_authenticated());
        assert_eq!(controller.state().name(), "failed");
    }

    #[tokio::test]
    async fn test_exchange_failure_recorded() {
        let gateway = FakeGateway {
            fail_with: Some(FlowError::NetworkFailure("connection refused".to_string())),
            ..FakeGateway::ok()
        };
        let controller = controller_with(gateway).await;
        let started = controller.start().await.unwrap();

        let err = controller
            .handle_callback(callback(&started.state))
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        match controller.state() {
            FlowState::Failed { kind, message } => {
                assert_eq!(kind, "network_failure");
                assert!(!message.contains("connection refused"));
            }
            other => panic!("expected Failed state, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_callback_without_code_or_token() {
        let controller = controller_with(FakeGateway::ok()).await;
        let started = controller.start().await.unwrap();

        let params = CallbackParams {
            state: Some(started.state),
            ..CallbackParams::default()
        };
        let err = controller.handle_callback(params).await.unwrap_err();
        assert!(matches!(err, FlowError::TokenExchangeFailed(_)));
    }

    #[tokio::test]
    async fn test_implicit_id_token_accepted() {
        let controller = controller_with(FakeGateway::ok()).await;
        let started = controller.start().await.unwrap();

        let now = OffsetDateTime::now_utc().unix_timestamp();
        let id_token = rsa_test_key().sign(&serde_json::json!({
            "iss": ISSUER,
            "sub": "user-456",
            "aud": CLIENT_ID,
            "exp": now + 3600,
            "iat": now,
            "nonce": started.nonce,
        }));

        let params = CallbackParams {
            state: Some(started.state),
            id_token: Some(id_token),
            ..CallbackParams::default()
        };
        let session = controller.handle_callback(params).await.unwrap();
        assert_eq!(session.subject, "user-456");
        // No display name claim: the projection falls back to the default.
        assert_eq!(controller.profile().unwrap().display_name, "Anonymous User");
    }

    #[tokio::test]
    async fn test_stale_completion_discarded() {
        let gateway = FakeGateway {
            delay: Some(std::time::Duration::from_millis(200)),
            ..FakeGateway::ok()
        };
        let controller = Arc::new(controller_with(gateway).await);
        let first = controller.start().await.unwrap();

        let pending = tokio::spawn({
            let controller = Arc::clone(&controller);
            let params = callback(&first.state);
            async move { controller.handle_callback(params).await }
        });

        // Let the exchange begin, then supersede the flow.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        controller.start().await.unwrap();

        let result = pending.await.unwrap();
        assert!(matches!(result, Err(FlowError::UnknownOrExpiredState)));

        // The stale completion updated nothing.
        assert!(!controller.is_authenticated());
        assert_eq!(controller.state(), FlowState::AwaitingResponse);
    }

    #[test]
    fn test_callback_error_mapping() {
        assert!(matches!(
            callback_error("access_denied", None),
            FlowError::UserCancelled
        ));
        assert!(matches!(
            callback_error("popup_closed_by_user", None),
            FlowError::UserCancelled
        ));
        assert!(matches!(
            callback_error("popup_blocked", None),
            FlowError::PopupBlocked
        ));
        assert!(matches!(
            callback_error("server_error", Some("boom".to_string())),
            FlowError::ProviderError { .. }
        ));
    }
}
