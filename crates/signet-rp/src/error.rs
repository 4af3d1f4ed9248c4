//! Error types for Relying Party token verification and flow orchestration.
//!
//! Every failure surfaced to the UI collaborator carries a machine-readable
//! kind (see [`VerificationError::kind`] and [`FlowError::kind`]) plus a
//! user-visible message that never leaks token material or secrets.

use crate::discovery::DiscoveryError;
use crate::jwks::KeySetError;

/// Errors produced while validating a received ID token.
#[derive(Debug, Clone, thiserror::Error)]
pub enum VerificationError {
    /// The token signature does not verify against any known provider key.
    #[error("Token signature does not match any known provider key")]
    SignatureInvalid,

    /// The audience claim does not include the expected client identifier.
    #[error("Token audience does not include the expected client")]
    AudienceMismatch,

    /// The issuer claim does not match the configured provider issuer.
    #[error("Issuer mismatch: expected {expected}, got {actual}")]
    IssuerMismatch {
        /// The configured issuer.
        expected: String,
        /// The issuer asserted by the token.
        actual: String,
    },

    /// The token expiry lies in the past (beyond the clock-skew tolerance).
    #[error("Token has expired")]
    Expired,

    /// The token was issued in the future (beyond the clock-skew tolerance).
    #[error("Token is not yet valid")]
    NotYetValid,

    /// The nonce claim does not equal the nonce generated at flow start.
    #[error("Token nonce does not match the expected nonce")]
    NonceMismatch,

    /// The nonce was already consumed by a previous verification.
    #[error("Token nonce has already been used")]
    NonceReplayed,

    /// The token could not be parsed, or violates a structural invariant.
    #[error("Malformed token: {0}")]
    Malformed(String),

    /// Fetching or using the provider key set failed.
    #[error("Key set error: {0}")]
    KeySet(#[from] KeySetError),

    /// Fetching provider metadata failed.
    #[error("Discovery error: {0}")]
    Discovery(#[from] DiscoveryError),
}

impl VerificationError {
    /// Creates an `IssuerMismatch` error.
    #[must_use]
    pub fn issuer_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::IssuerMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Creates a `Malformed` error.
    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed(message.into())
    }

    /// Machine-readable error kind for the UI collaborator.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SignatureInvalid => "signature_invalid",
            Self::AudienceMismatch => "audience_mismatch",
            Self::IssuerMismatch { .. } => "issuer_mismatch",
            Self::Expired => "expired",
            Self::NotYetValid => "not_yet_valid",
            Self::NonceMismatch => "nonce_mismatch",
            Self::NonceReplayed => "nonce_replayed",
            Self::Malformed(_) => "malformed_token",
            Self::KeySet(_) | Self::Discovery(_) => "network_failure",
        }
    }

    /// Returns `true` if retrying the same flow could succeed.
    ///
    /// Only key-set/discovery fetch failures are retryable; every other kind
    /// requires the user to restart the flow.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::KeySet(_) | Self::Discovery(_))
    }

    /// Returns `true` if this error came from validating token content
    /// rather than from fetching provider material.
    #[must_use]
    pub fn is_validation_error(&self) -> bool {
        !matches!(self, Self::KeySet(_) | Self::Discovery(_))
    }
}

/// Errors produced by the authentication flow controller.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FlowError {
    /// The sign-in popup was blocked by the browser.
    #[error("The sign-in window was blocked by the browser")]
    PopupBlocked,

    /// The user dismissed the sign-in UI or denied the authorization.
    #[error("Sign-in was cancelled")]
    UserCancelled,

    /// The callback's state value matches no live authorization request.
    ///
    /// Guards against CSRF and duplicate/late callbacks, including callbacks
    /// for flows superseded by a later `start()`.
    #[error("Authorization response does not match any pending sign-in")]
    UnknownOrExpiredState,

    /// The received ID token failed verification.
    #[error(transparent)]
    Verification(#[from] VerificationError),

    /// The authorization code could not be exchanged for tokens.
    #[error("Token exchange failed: {0}")]
    TokenExchangeFailed(String),

    /// The Identity Provider returned an OAuth error response.
    #[error("Provider error: {error} - {description}")]
    ProviderError {
        /// The OAuth error code.
        error: String,
        /// Optional error description.
        description: String,
    },

    /// A network error occurred talking to the Identity Provider.
    #[error("Network error: {0}")]
    NetworkFailure(String),
}

impl FlowError {
    /// Creates a `ProviderError` from an IdP response.
    #[must_use]
    pub fn provider_error(error: impl Into<String>, description: impl Into<String>) -> Self {
        Self::ProviderError {
            error: error.into(),
            description: description.into(),
        }
    }

    /// Machine-readable error kind for the UI collaborator.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PopupBlocked => "popup_blocked",
            Self::UserCancelled => "user_cancelled",
            Self::UnknownOrExpiredState => "unknown_or_expired_state",
            Self::Verification(e) => e.kind(),
            Self::TokenExchangeFailed(_) => "token_exchange_failed",
            Self::ProviderError { .. } => "provider_error",
            Self::NetworkFailure(_) => "network_failure",
        }
    }

    /// A user-visible message with no secret or token material.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::PopupBlocked => {
                "Your browser blocked the sign-in window. Allow popups and try again.".to_string()
            }
            Self::UserCancelled => "Sign-in was cancelled before it completed.".to_string(),
            Self::UnknownOrExpiredState => {
                "This sign-in attempt is no longer valid. Please start again.".to_string()
            }
            Self::Verification(e) if e.is_retryable() => {
                "The identity provider could not be reached. Please retry.".to_string()
            }
            Self::Verification(_) => {
                "The identity token could not be verified. Please sign in again.".to_string()
            }
            Self::TokenExchangeFailed(_) | Self::ProviderError { .. } => {
                "The identity provider rejected the sign-in. Please try again.".to_string()
            }
            Self::NetworkFailure(_) => {
                "The identity provider could not be reached. Please retry.".to_string()
            }
        }
    }

    /// Returns `true` if retrying without restarting the flow may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::NetworkFailure(_) => true,
            Self::Verification(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// Returns `true` if the failure was reported by the user agent rather
    /// than derived from token or protocol validation.
    #[must_use]
    pub fn is_user_agent_error(&self) -> bool {
        matches!(self, Self::PopupBlocked | Self::UserCancelled)
    }
}
