//! Display-profile projection.
//!
//! A [`Profile`] is a read-only projection of the current [`Session`] for
//! the UI-rendering collaborator. It has no lifecycle of its own and is
//! recomputed on demand; missing optional claims map to documented defaults.

use serde::Serialize;
use time::OffsetDateTime;

use crate::session::Session;

/// Display name used when the provider supplied none.
pub const ANONYMOUS_DISPLAY_NAME: &str = "Anonymous User";

/// Display-safe view of the authenticated user.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    /// Stable subject identifier.
    pub subject: String,

    /// Name to display; defaults to [`ANONYMOUS_DISPLAY_NAME`].
    pub display_name: String,

    /// Email address, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Whether the email address is verified.
    pub email_verified: bool,

    /// Identifier of the authenticating provider.
    pub provider_id: String,

    /// Profile picture URL, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,

    /// When the user signed in.
    #[serde(with = "time::serde::rfc3339")]
    pub signed_in_at: OffsetDateTime,
}

/// Projects a session into a display profile.
///
/// Returns `None` for an absent or expired session and never fails
/// otherwise.
#[must_use]
pub fn project(session: Option<&Session>) -> Option<Profile> {
    let session = session.filter(|s| !s.is_expired())?;

    Some(Profile {
        subject: session.subject.clone(),
        display_name: session
            .display_name
            .clone()
            .unwrap_or_else(|| ANONYMOUS_DISPLAY_NAME.to_string()),
        email: session.email.clone(),
        email_verified: session.email_verified,
        provider_id: session.provider_id.clone(),
        picture: session.picture.clone(),
        signed_in_at: session.authenticated_at,
    })
}
