//! ID token verification.
//!
//! Implements the Relying Party's own checks instead of trusting a managed
//! SDK: signature against the issuer's published key set, issuer, audience,
//! validity window with clock-skew tolerance, and nonce equality with
//! single-use enforcement.
//!
//! Verification is pure apart from two documented exceptions: key-set and
//! discovery lookups go through TTL-bounded caches, and consumed nonces are
//! recorded so a replayed token fails with [`VerificationError::NonceReplayed`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Validation, decode, decode_header};
use time::OffsetDateTime;
use url::Url;

use crate::claims::IdentityClaims;
use crate::discovery::DiscoveryCache;
use crate::error::VerificationError;
use crate::jwks::{KeySetCache, KeySetError, ResolvedKey};
use crate::provider::ProviderConfig;

/// Configuration for the token verifier.
#[derive(Debug, Clone)]
pub struct VerifierConfig {
    /// Tolerated clock skew when checking the validity window
    /// (default: 60 seconds).
    pub clock_skew: Duration,

    /// How long consumed nonces are remembered (default: 30 minutes).
    ///
    /// Must outlive the authorization-request TTL so a replayed token from a
    /// live flow window is always caught.
    pub nonce_ttl: Duration,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            clock_skew: Duration::from_secs(60),
            nonce_ttl: Duration::from_secs(1800),
        }
    }
}

impl VerifierConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the clock-skew tolerance.
    #[must_use]
    pub fn with_clock_skew(mut self, skew: Duration) -> Self {
        self.clock_skew = skew;
        self
    }

    /// Sets how long consumed nonces are remembered.
    #[must_use]
    pub fn with_nonce_ttl(mut self, ttl: Duration) -> Self {
        self.nonce_ttl = ttl;
        self
    }
}

/// Validates received ID tokens.
pub struct TokenVerifier {
    discovery: Arc<DiscoveryCache>,
    keys: Arc<KeySetCache>,
    config: VerifierConfig,
    consumed_nonces: Mutex<HashMap<String, OffsetDateTime>>,
}

impl TokenVerifier {
    /// Creates a verifier over the given caches.
    #[must_use]
    pub fn new(
        discovery: Arc<DiscoveryCache>,
        keys: Arc<KeySetCache>,
        config: VerifierConfig,
    ) -> Self {
        Self {
            discovery,
            keys,
            config,
            consumed_nonces: Mutex::new(HashMap::new()),
        }
    }

    /// Verifies an ID token and returns its claims.
    ///
    /// Checks, in order: signature against the provider's key set, the
    /// `exp > iat` invariant, issuer, audience, the validity window
    /// `[iat, exp]` with clock-skew leeway, nonce equality against
    /// `expected_nonce`, and nonce single-use.
    ///
    /// # Errors
    ///
    /// Returns the specific [`VerificationError`] for the first failing
    /// check. Key-set and discovery fetch failures are retryable; all other
    /// errors require restarting the flow.
    pub async fn verify(
        &self,
        provider: &ProviderConfig,
        raw_token: &str,
        expected_nonce: &str,
        expected_audience: &str,
    ) -> Result<IdentityClaims, VerificationError> {
        let header =
            decode_header(raw_token).map_err(|e| VerificationError::malformed(e.to_string()))?;

        let jwks_uri = self.jwks_uri(provider).await?;
        let candidates = self.candidate_keys(&jwks_uri, header.kid.as_deref()).await?;

        let claims = self.check_signature(raw_token, header.alg, &candidates)?;

        if !claims.has_valid_window() {
            return Err(VerificationError::malformed(
                "token expiry does not follow issuance",
            ));
        }

        let expected_issuer = provider.issuer.as_str().trim_end_matches('/');
        let actual_issuer = claims.iss.trim_end_matches('/');
        if actual_issuer != expected_issuer {
            return Err(VerificationError::issuer_mismatch(
                expected_issuer,
                actual_issuer,
            ));
        }

        if !claims.has_audience(expected_audience) {
            return Err(VerificationError::AudienceMismatch);
        }

        let now = OffsetDateTime::now_utc().unix_timestamp();
        let skew = self.config.clock_skew.as_secs() as i64;
        if claims.iat - skew > now {
            return Err(VerificationError::NotYetValid);
        }
        if claims.exp + skew < now {
            return Err(VerificationError::Expired);
        }

        // We always send a nonce, so the token must echo it.
        match claims.nonce.as_deref() {
            Some(nonce) if nonce == expected_nonce => {}
            _ => return Err(VerificationError::NonceMismatch),
        }
        self.consume_nonce(expected_nonce)?;

        tracing::debug!(
            subject = %claims.sub,
            issuer = %claims.iss,
            "ID token verified"
        );

        Ok(claims)
    }

    /// Resolves the key-set URI from the provider override or discovery.
    async fn jwks_uri(&self, provider: &ProviderConfig) -> Result<Url, VerificationError> {
        let uri = match &provider.jwks_uri {
            Some(uri) => uri.clone(),
            None => self.discovery.get(&provider.issuer).await?.jwks_uri,
        };
        Url::parse(&uri)
            .map_err(|e| VerificationError::malformed(format!("invalid JWKS URI: {e}")))
    }

    /// Resolves the keys to try: the `kid`-matched key when the header names
    /// one, every signing key otherwise.
    async fn candidate_keys(
        &self,
        jwks_uri: &Url,
        kid: Option<&str>,
    ) -> Result<Vec<ResolvedKey>, VerificationError> {
        let result = match kid {
            Some(kid) => self.keys.key_for(jwks_uri, kid).await.map(|k| vec![k]),
            None => self.keys.signing_keys(jwks_uri).await,
        };

        result.map_err(|e| match e {
            // A key set that cannot satisfy the token means the signature
            // cannot match any known key.
            KeySetError::KeyNotFound(_) | KeySetError::NoSigningKeys => {
                VerificationError::SignatureInvalid
            }
            other => VerificationError::KeySet(other),
        })
    }

    /// Decodes the token against the candidate keys, verifying only the
    /// signature. Issuer, audience and time checks run afterwards so each
    /// failure maps to its own error kind.
    fn check_signature(
        &self,
        raw_token: &str,
        header_alg: jsonwebtoken::Algorithm,
        candidates: &[ResolvedKey],
    ) -> Result<IdentityClaims, VerificationError> {
        for (key, key_alg) in candidates {
            let alg = key_alg.unwrap_or(header_alg);
            let mut validation = Validation::new(alg);
            validation.validate_exp = false;
            validation.validate_aud = false;

            match decode::<IdentityClaims>(raw_token, key, &validation) {
                Ok(data) => return Ok(data.claims),
                Err(e) => match e.kind() {
                    ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => continue,
                    _ => return Err(VerificationError::malformed(e.to_string())),
                },
            }
        }

        Err(VerificationError::SignatureInvalid)
    }

    /// Marks a nonce as consumed; a second consumption is a replay.
    fn consume_nonce(&self, nonce: &str) -> Result<(), VerificationError> {
        let now = OffsetDateTime::now_utc();
        let ttl = time::Duration::try_from(self.config.nonce_ttl)
            .unwrap_or(time::Duration::minutes(30));

        let mut consumed = self
            .consumed_nonces
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        consumed.retain(|_, consumed_at| now - *consumed_at < ttl);

        if consumed.contains_key(nonce) {
            return Err(VerificationError::NonceReplayed);
        }
        consumed.insert(nonce.to_string(), now);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
    use rand::rngs::OsRng;
    use rsa::RsaPrivateKey;
    use rsa::pkcs8::{EncodePrivateKey, LineEnding};
    use serde_json::json;

    use super::*;
    use crate::discovery::DiscoveryConfig;
    use crate::jwks::KeySetConfig;
    use crate::test_support::{TEST_KID, rsa_test_key};

    const ISSUER: &str = "https://idp.example";
    const CLIENT_ID: &str = "this-client";
    // Dead local port so an accidental refresh fails fast instead of
    // reaching the network.
    const JWKS_URI: &str = "https://127.0.0.1:1/jwks";

    fn test_provider() -> ProviderConfig {
        ProviderConfig::new("test", "Test IdP", Url::parse(ISSUER).unwrap(), CLIENT_ID)
            .with_jwks_uri(JWKS_URI)
    }

    async fn test_verifier() -> TokenVerifier {
        let keys = KeySetCache::new(KeySetConfig::default());
        keys.seed(&Url::parse(JWKS_URI).unwrap(), rsa_test_key().jwk_set())
            .await;

        TokenVerifier::new(
            Arc::new(DiscoveryCache::new(DiscoveryConfig::default())),
            Arc::new(keys),
            VerifierConfig::default(),
        )
    }

    fn sign(claims: &serde_json::Value) -> String {
        rsa_test_key().sign(claims)
    }

    fn base_claims(nonce: &str) -> serde_json::Value {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        json!({
            "iss": ISSUER,
            "sub": "user-123",
            "aud": CLIENT_ID,
            "exp": now + 3600,
            "iat": now,
            "nonce": nonce,
            "email": "a@b.com",
            "email_verified": true,
            "name": "Test User",
        })
    }

    #[tokio::test]
    async fn test_valid_token_returns_plaintext_claims() {
        let verifier = test_verifier().await;
        let token = sign(&base_claims("nonce-1"));

        let claims = verifier
            .verify(&test_provider(), &token, "nonce-1", CLIENT_ID)
            .await
            .unwrap();

        assert_eq!(claims.sub, "user-123");
        assert_eq!(claims.email, Some("a@b.com".to_string()));
        assert_eq!(claims.email_verified, Some(true));
        assert_eq!(claims.name, Some("Test User".to_string()));
        assert_eq!(claims.aud, vec![CLIENT_ID]);
    }

    #[tokio::test]
    async fn test_nonce_mismatch() {
        let verifier = test_verifier().await;
        let token = sign(&base_claims("nonce-from-another-flow"));

        let err = verifier
            .verify(&test_provider(), &token, "expected-nonce", CLIENT_ID)
            .await
            .unwrap_err();
        assert!(matches!(err, VerificationError::NonceMismatch));
    }

    #[tokio::test]
    async fn test_missing_nonce_is_a_mismatch() {
        let verifier = test_verifier().await;
        let mut claims = base_claims("unused");
        claims.as_object_mut().unwrap().remove("nonce");
        let token = sign(&claims);

        let err = verifier
            .verify(&test_provider(), &token, "expected-nonce", CLIENT_ID)
            .await
            .unwrap_err();
        assert!(matches!(err, VerificationError::NonceMismatch));
    }

    #[tokio::test]
    async fn test_nonce_replay_rejected() {
        let verifier = test_verifier().await;
        let token = sign(&base_claims("nonce-once"));

        verifier
            .verify(&test_provider(), &token, "nonce-once", CLIENT_ID)
            .await
            .unwrap();

        let err = verifier
            .verify(&test_provider(), &token, "nonce-once", CLIENT_ID)
            .await
            .unwrap_err();
        assert!(matches!(err, VerificationError::NonceReplayed));
    }

    #[tokio::test]
    async fn test_expired_token() {
        let verifier = test_verifier().await;
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let claims = json!({
            "iss": ISSUER,
            "sub": "user-123",
            "aud": CLIENT_ID,
            "exp": now - 3600,
            "iat": now - 7200,
            "nonce": "nonce-1",
        });
        let token = sign(&claims);

        let err = verifier
            .verify(&test_provider(), &token, "nonce-1", CLIENT_ID)
            .await
            .unwrap_err();
        assert!(matches!(err, VerificationError::Expired));
    }

    #[tokio::test]
    async fn test_expiry_within_skew_tolerated() {
        let verifier = test_verifier().await;
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let claims = json!({
            "iss": ISSUER,
            "sub": "user-123",
            "aud": CLIENT_ID,
            "exp": now - 10,
            "iat": now - 3600,
            "nonce": "nonce-skew",
        });
        let token = sign(&claims);

        assert!(
            verifier
                .verify(&test_provider(), &token, "nonce-skew", CLIENT_ID)
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_not_yet_valid_token() {
        let verifier = test_verifier().await;
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let claims = json!({
            "iss": ISSUER,
            "sub": "user-123",
            "aud": CLIENT_ID,
            "exp": now + 7200,
            "iat": now + 3600,
            "nonce": "nonce-1",
        });
        let token = sign(&claims);

        let err = verifier
            .verify(&test_provider(), &token, "nonce-1", CLIENT_ID)
            .await
            .unwrap_err();
        assert!(matches!(err, VerificationError::NotYetValid));
    }

    #[tokio::test]
    async fn test_audience_mismatch() {
        let verifier = test_verifier().await;
        let mut claims = base_claims("nonce-1");
        claims["aud"] = json!("other-client");
        let token = sign(&claims);

        let err = verifier
            .verify(&test_provider(), &token, "nonce-1", CLIENT_ID)
            .await
            .unwrap_err();
        assert!(matches!(err, VerificationError::AudienceMismatch));
    }

    #[tokio::test]
    async fn test_issuer_mismatch() {
        let verifier = test_verifier().await;
        let mut claims = base_claims("nonce-1");
        claims["iss"] = json!("https://evil.example");
        let token = sign(&claims);

        let err = verifier
            .verify(&test_provider(), &token, "nonce-1", CLIENT_ID)
            .await
            .unwrap_err();
        match err {
            VerificationError::IssuerMismatch { expected, actual } => {
                assert_eq!(expected, ISSUER);
                assert_eq!(actual, "https://evil.example");
            }
            other => panic!("expected IssuerMismatch, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_wrong_key_signature_invalid() {
        let verifier = test_verifier().await;

        // Same kid, different key material: decodes against the cached key
        // and the signature check fails.
        let rogue = RsaPrivateKey::new(&mut OsRng, 2048).unwrap();
        let rogue_pem = rogue.to_pkcs8_pem(LineEnding::LF).unwrap().to_string();
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(TEST_KID.to_string());
        let token = encode(
            &header,
            &base_claims("nonce-1"),
            &EncodingKey::from_rsa_pem(rogue_pem.as_bytes()).unwrap(),
        )
        .unwrap();

        let err = verifier
            .verify(&test_provider(), &token, "nonce-1", CLIENT_ID)
            .await
            .unwrap_err();
        assert!(matches!(err, VerificationError::SignatureInvalid));
    }

    #[tokio::test]
    async fn test_inverted_window_is_malformed() {
        let verifier = test_verifier().await;
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let claims = json!({
            "iss": ISSUER,
            "sub": "user-123",
            "aud": CLIENT_ID,
            "exp": now - 100,
            "iat": now + 100,
            "nonce": "nonce-1",
        });
        let token = sign(&claims);

        let err = verifier
            .verify(&test_provider(), &token, "nonce-1", CLIENT_ID)
            .await
            .unwrap_err();
        assert!(matches!(err, VerificationError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_garbage_token_is_malformed() {
        let verifier = test_verifier().await;

        let err = verifier
            .verify(&test_provider(), "not-a-jwt", "nonce-1", CLIENT_ID)
            .await
            .unwrap_err();
        assert!(matches!(err, VerificationError::Malformed(_)));
    }
}
