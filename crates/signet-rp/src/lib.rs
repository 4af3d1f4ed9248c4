//! # signet-rp
//!
//! Minimal OpenID Connect Relying Party session core.
//!
//! This crate implements the piece of an OIDC web client that a managed
//! authentication SDK would otherwise hide: verifying received ID tokens and
//! owning the resulting session.
//!
//! - Token verification against the issuer's published key set (signature,
//!   issuer, audience, validity window with clock-skew leeway, single-use
//!   nonce)
//! - Authorization-code and implicit callback handling with CSRF `state`
//!   tracking, one in-flight request per controller, and discarding of stale
//!   completions
//! - A process-wide session store with lazy expiry and single-writer
//!   discipline
//! - A display-profile projection with documented defaults
//!
//! ## Modules
//!
//! - [`claims`] - ID token claim types
//! - [`discovery`] - OIDC discovery documents and caching
//! - [`jwks`] - provider key-set fetching and caching
//! - [`provider`] - Identity Provider configuration
//! - [`pkce`] - PKCE verifier/challenge generation
//! - [`request`] - in-flight authorization request state
//! - [`verifier`] - ID token verification
//! - [`gateway`] - capability interface to the Identity Provider
//! - [`flow`] - authentication flow state machine
//! - [`session`] - session state and store
//! - [`profile`] - display-profile projection
//! - [`error`] - verification and flow error taxonomies

pub mod claims;
pub mod discovery;
pub mod error;
pub mod flow;
pub mod gateway;
pub mod jwks;
pub mod pkce;
pub mod profile;
pub mod provider;
pub mod request;
pub mod session;
pub mod verifier;

#[cfg(test)]
mod test_support;

pub use claims::IdentityClaims;
pub use discovery::{DiscoveryCache, DiscoveryConfig, DiscoveryError, ProviderMetadata};
pub use error::{FlowError, VerificationError};
pub use flow::{AuthFlowController, CallbackParams, FlowConfig, FlowState, StartedFlow};
pub use gateway::{AuthorizationGateway, HttpAuthorizationGateway, TokenExchange};
pub use jwks::{KeySetCache, KeySetConfig, KeySetError};
pub use pkce::{PkceChallenge, PkceVerifier};
pub use profile::{ANONYMOUS_DISPLAY_NAME, Profile, project};
pub use provider::ProviderConfig;
pub use request::{AuthRequest, DEFAULT_REQUEST_TTL, generate_nonce, generate_state};
pub use session::{Session, SessionStore};
pub use verifier::{TokenVerifier, VerifierConfig};

/// Prelude module for convenient imports.
///
/// ```ignore
/// use signet_rp::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::{FlowError, VerificationError};
    pub use crate::flow::{AuthFlowController, CallbackParams, FlowConfig, FlowState};
    pub use crate::gateway::{AuthorizationGateway, HttpAuthorizationGateway};
    pub use crate::profile::{Profile, project};
    pub use crate::provider::ProviderConfig;
    pub use crate::session::{Session, SessionStore};
    pub use crate::verifier::{TokenVerifier, VerifierConfig};
}
