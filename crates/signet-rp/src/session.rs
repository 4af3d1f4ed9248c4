//! Authenticated session state.
//!
//! A [`Session`] is created from verified ID token claims and owned
//! exclusively by the process-wide [`SessionStore`]. Other components read
//! through [`SessionStore::get`]; only the flow controller writes.
//!
//! # Lifecycle
//!
//! 1. Created on successful token verification
//! 2. Read by the UI and route-guard collaborators
//! 3. Destroyed on sign-out or expiry (expired sessions are cleared lazily
//!    on read)

use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::claims::IdentityClaims;

/// The authenticated identity held between sign-in and sign-out.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Stable subject identifier from the ID token.
    pub subject: String,

    /// Verified email address, if the provider supplied one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Whether the provider vouches for the email address.
    pub email_verified: bool,

    /// Display name from the token, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    /// Profile picture URL, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,

    /// Identifier of the provider that authenticated the user.
    pub provider_id: String,

    /// When this session was established.
    #[serde(with = "time::serde::rfc3339")]
    pub authenticated_at: OffsetDateTime,

    /// When this session stops being valid.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

impl Session {
    /// Builds a session from verified claims.
    ///
    /// The expiry is chosen by the caller (the flow controller bounds it by
    /// both the configured session TTL and the token's own expiry).
    #[must_use]
    pub fn from_claims(
        claims: &IdentityClaims,
        provider_id: impl Into<String>,
        expires_at: OffsetDateTime,
    ) -> Self {
        Self {
            subject: claims.sub.clone(),
            email: claims.email.clone(),
            email_verified: claims.email_verified.unwrap_or(false),
            display_name: claims.name.clone(),
            picture: claims.picture.clone(),
            provider_id: provider_id.into(),
            authenticated_at: OffsetDateTime::now_utc(),
            expires_at,
        }
    }

    /// Returns `true` if the session has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        OffsetDateTime::now_utc() > self.expires_at
    }
}

/// Process-wide holder of the current session.
///
/// Single-writer discipline: only the flow controller calls [`set`] and
/// [`clear`]; everything else reads. The store spans application startup to
/// shutdown, with [`clear`] as the explicit teardown on sign-out.
///
/// [`set`]: SessionStore::set
/// [`clear`]: SessionStore::clear
#[derive(Debug, Default)]
pub struct SessionStore {
    current: Mutex<Option<Session>>,
}

impl SessionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current session, or `None` if there is none or it has
    /// expired. An expired session is cleared as a side effect (lazy expiry).
    #[must_use]
    pub fn get(&self) -> Option<Session> {
        let mut current = self.lock();
        match current.as_ref() {
            Some(session) if session.is_expired() => {
                tracing::debug!(subject = %session.subject, "Clearing expired session");
                *current = None;
                None
            }
            Some(session) => Some(session.clone()),
            None => None,
        }
    }

    /// Installs a new session, replacing any existing one.
    pub fn set(&self, session: Session) {
        tracing::info!(
            subject = %session.subject,
            provider = %session.provider_id,
            "Session established"
        );
        *self.lock() = Some(session);
    }

    /// Removes the current session, if any. Idempotent.
    pub fn clear(&self) {
        let mut current = self.lock();
        if current.take().is_some() {
            tracing::info!("Session cleared");
        }
    }

    /// Returns `true` if a session exists but has expired.
    ///
    /// A missing session is not "expired"; it is absent.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.lock().as_ref().is_some_and(Session::is_expired)
    }

    /// Returns `true` if an unexpired session is present.
    ///
    /// This is the value the route-guard collaborator gates on.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.get().is_some()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Session>> {
        self.current
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
