//! ID token claim types.
//!
//! Standard OpenID Connect ID token claims as received from the Identity
//! Provider, plus the profile claims this application displays. The audience
//! claim may arrive as a single string or an array; both forms deserialize
//! into a vector.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Claims asserted by a verified ID token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityClaims {
    /// Issuer identifier.
    pub iss: String,

    /// Subject identifier (stable, unique per issuer).
    pub sub: String,

    /// Audience (string or array on the wire).
    #[serde(deserialize_with = "deserialize_audience")]
    pub aud: Vec<String>,

    /// Expiration time (Unix timestamp).
    pub exp: i64,

    /// Issued-at time (Unix timestamp).
    pub iat: i64,

    /// Nonce binding the token to the authorization request.
    pub nonce: Option<String>,

    /// Time of end-user authentication.
    pub auth_time: Option<i64>,

    /// Authorized party.
    pub azp: Option<String>,

    /// User's email address.
    pub email: Option<String>,

    /// Whether the email address has been verified by the provider.
    pub email_verified: Option<bool>,

    /// User's full name.
    pub name: Option<String>,

    /// User's given name.
    pub given_name: Option<String>,

    /// User's family name.
    pub family_name: Option<String>,

    /// User's preferred username.
    pub preferred_username: Option<String>,

    /// URL of the user's profile picture.
    pub picture: Option<String>,

    /// User's locale.
    pub locale: Option<String>,

    /// Claims not covered by the struct fields.
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl IdentityClaims {
    /// Returns `true` if the audience includes the given client identifier.
    #[must_use]
    pub fn has_audience(&self, client_id: &str) -> bool {
        self.aud.iter().any(|a| a == client_id)
    }

    /// Returns `true` if the claim timestamps satisfy `exp > iat`.
    #[must_use]
    pub fn has_valid_window(&self) -> bool {
        self.exp > self.iat
    }
}

/// Deserializer for an audience that is either a string or an array.
fn deserialize_audience<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(s) => Ok(vec![s]),
        OneOrMany::Many(v) => Ok(v),
    }
}
