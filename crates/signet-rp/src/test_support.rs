//! Shared helpers for tests that need signed tokens and provider material.
//!
//! Generates one RSA key pair per test run (key generation is slow) and
//! exposes it as a JWK set plus a matching RS256 signer.

use std::sync::OnceLock;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use rand::rngs::OsRng;
use rsa::RsaPrivateKey;
use rsa::pkcs8::{EncodePrivateKey, LineEnding};
use rsa::traits::PublicKeyParts;
use serde_json::json;

use crate::discovery::ProviderMetadata;

/// Key id used for all test tokens.
pub(crate) const TEST_KID: &str = "test-key-1";

pub(crate) struct TestKey {
    pub private_pem: String,
    pub n: String,
    pub e: String,
}

impl TestKey {
    fn generate() -> Self {
        let key = RsaPrivateKey::new(&mut OsRng, 2048).expect("generate RSA key");
        let public = key.to_public_key();
        Self {
            private_pem: key
                .to_pkcs8_pem(LineEnding::LF)
                .expect("encode private key")
                .to_string(),
            n: URL_SAFE_NO_PAD.encode(public.n().to_bytes_be()),
            e: URL_SAFE_NO_PAD.encode(public.e().to_bytes_be()),
        }
    }

    /// The public half as a one-key JWK set under [`TEST_KID`].
    pub fn jwk_set(&self) -> JwkSet {
        serde_json::from_value(json!({
            "keys": [{
                "kty": "RSA",
                "kid": TEST_KID,
                "use": "sig",
                "alg": "RS256",
                "n": self.n,
                "e": self.e,
            }]
        }))
        .expect("build JWK set")
    }

    /// Signs claims as an RS256 token with the [`TEST_KID`] header.
    pub fn sign(&self, claims: &serde_json::Value) -> String {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(TEST_KID.to_string());
        let key =
            EncodingKey::from_rsa_pem(self.private_pem.as_bytes()).expect("load encoding key");
        encode(&header, claims, &key).expect("sign token")
    }
}

/// The shared test key, generated once per test process.
pub(crate) fn rsa_test_key() -> &'static TestKey {
    static KEY: OnceLock<TestKey> = OnceLock::new();
    KEY.get_or_init(TestKey::generate)
}

/// Minimal provider metadata rooted at the given issuer.
pub(crate) fn test_metadata(issuer: &str) -> ProviderMetadata {
    ProviderMetadata {
        issuer: issuer.to_string(),
        authorization_endpoint: format!("{issuer}/authorize"),
        token_endpoint: format!("{issuer}/token"),
        jwks_uri: format!("{issuer}/jwks"),
        userinfo_endpoint: None,
        end_session_endpoint: None,
        scopes_supported: Some(vec![
            "openid".to_string(),
            "email".to_string(),
            "profile".to_string(),
        ]),
        response_types_supported: vec!["code".to_string()],
        id_token_signing_alg_values_supported: vec!["RS256".to_string()],
        code_challenge_methods_supported: Some(vec!["S256".to_string()]),
    }
}
