//! Session lifecycle: login, logout, and two-phase registration.
//!
//! A [`Session`] holds at most one authenticated user id and is the single
//! authority for whether store mutations may proceed. It is an explicit
//! value passed into every gated operation rather than ambient global
//! state, which keeps the store testable in isolation.

use tracing::info;

use togather_shared::{Credential, User};

use crate::error::{Result, StoreError};

/// The currently authenticated identity, if any.
///
/// LoggedOut -> LoggedIn on successful login or completed registration;
/// LoggedIn -> LoggedOut on logout only. There is no expiry and no token
/// refresh; validity is purely the presence of a user id.
#[derive(Debug, Default)]
pub struct Session {
    current: Option<String>,
}

impl Session {
    /// A logged-out session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether an identity is active.
    pub fn is_active(&self) -> bool {
        self.current.is_some()
    }

    /// The active user id, if any.
    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// The active user id, or [`StoreError::NoSession`].
    pub fn user_id(&self) -> Result<&str> {
        self.current.as_deref().ok_or(StoreError::NoSession)
    }

    /// Authenticate against the user collection.
    ///
    /// Any failure is the single [`StoreError::InvalidCredentials`]; an
    /// unknown email and a wrong secret are deliberately
    /// indistinguishable to the caller.
    pub fn login(&mut self, users: &[User], email: &str, secret: &str) -> Result<User> {
        let user = users
            .iter()
            .find(|u| u.email == email && u.credential.verify(secret))
            .ok_or(StoreError::InvalidCredentials)?;

        self.current = Some(user.id.clone());
        info!(user = %user.id, "Logged in");
        Ok(user.clone())
    }

    /// Establish a session for an already-verified identity (used when
    /// registration completes).
    pub(crate) fn establish(&mut self, user_id: &str) {
        self.current = Some(user_id.to_string());
    }

    /// Clear the session pointer. The entity collections are untouched
    /// and persist for the process lifetime.
    pub fn logout(&mut self) {
        if let Some(user) = self.current.take() {
            info!(%user, "Logged out");
        }
    }
}

/// Output of the first registration phase: a reserved id and derived
/// credential, waiting for the profile-completion flow to supply the
/// remaining user fields.
#[derive(Debug, Clone)]
pub struct PendingRegistration {
    pub user_id: String,
    pub email: String,
    pub credential: Credential,
}

/// Profile fields collected by the (out-of-scope) profile-completion
/// flow and handed back to finish a registration.
#[derive(Debug, Clone, Default)]
pub struct ProfileInput {
    pub name: String,
    pub year: u32,
    pub faculty: String,
    pub major: String,
    pub hometown: String,
    pub interests: Vec<String>,
    pub bio: String,
    pub prompt1: String,
    pub prompt2: String,
    /// Optional; empty selects a placeholder keyed by the display name.
    pub avatar_url: String,
}
