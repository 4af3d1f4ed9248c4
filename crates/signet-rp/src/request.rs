//! In-flight authorization request state.
//!
//! An [`AuthRequest`] tracks a single authorization round-trip: the `state`
//! value echoed back by the provider (CSRF protection), the `nonce` bound
//! into the ID token (replay protection), the PKCE verifier, and an expiry
//! after which a late callback is rejected. At most one request is live per
//! flow controller; starting a new flow discards the previous request.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use time::{Duration, OffsetDateTime};

use crate::pkce::PkceVerifier;

/// How long an authorization request stays valid by default.
pub const DEFAULT_REQUEST_TTL: Duration = Duration::minutes(10);

/// Ephemeral state for one authorization round-trip.
#[derive(Debug, Clone)]
pub struct AuthRequest {
    /// CSRF protection value echoed back by the provider.
    pub state: String,

    /// One-time value bound into the ID token.
    pub nonce: String,

    /// Scopes requested for this flow.
    pub scopes: Vec<String>,

    /// PKCE verifier to present at the token endpoint.
    pub pkce_verifier: PkceVerifier,

    /// When the flow was started.
    pub started_at: OffsetDateTime,

    /// When a callback for this request stops being acceptable.
    pub expires_at: OffsetDateTime,

    /// Flow generation this request belongs to. Completions whose generation
    /// no longer matches the controller's counter are discarded.
    pub generation: u64,
}

impl AuthRequest {
    /// Creates a request with fresh random state and nonce.
    #[must_use]
    pub fn new(scopes: Vec<String>, ttl: Duration, generation: u64) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            state: generate_state(),
            nonce: generate_nonce(),
            scopes,
            pkce_verifier: PkceVerifier::generate(),
            started_at: now,
            expires_at: now + ttl,
            generation,
        }
    }

    /// Returns `true` if a callback for this request is no longer acceptable.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        OffsetDateTime::now_utc() > self.expires_at
    }

    /// Returns `true` if the callback's `state` belongs to this request.
    #[must_use]
    pub fn matches_state(&self, state: &str) -> bool {
        self.state == state
    }
}

/// Generates a random `state` value (256 bits, base64url).
#[must_use]
pub fn generate_state() -> String {
    random_token()
}

/// Generates a random `nonce` value (256 bits, base64url).
#[must_use]
pub fn generate_nonce() -> String {
    random_token()
}

fn random_token() -> String {
    let mut bytes = [0u8; 32];
    rand::Rng::fill(&mut rand::thread_rng(), &mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
