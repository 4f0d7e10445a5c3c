use thiserror::Error;

use crate::gateway::GatewayError;

/// Errors produced by the store layer.
///
/// Session, validation, and lookup failures surface synchronously from
/// the mutation that caused them. Remote persistence failures never do;
/// they are retained on the outbox and reported per entity through
/// [`crate::outbox::SyncStatus`].
#[derive(Error, Debug)]
pub enum StoreError {
    /// A gated operation was attempted with no active session.
    #[error("No active session")]
    NoSession,

    /// Login failed. Deliberately does not distinguish an unknown email
    /// from a wrong secret.
    #[error("Invalid email or secret")]
    InvalidCredentials,

    /// Registration attempted with an email that is already taken.
    #[error("A user with email {0} already exists")]
    DuplicateEmail(String),

    /// A user id did not resolve against the local collection.
    #[error("Unknown user id: {0}")]
    UnknownUser(String),

    /// A community id did not resolve against the local collection.
    #[error("Unknown community id: {0}")]
    UnknownCommunity(String),

    /// An event id did not resolve against the local collection.
    #[error("Unknown event id: {0}")]
    UnknownEvent(String),

    /// `update_user` was called with a record that is not the session
    /// user's own.
    #[error("Cannot modify another user's record: {0}")]
    NotSessionUser(String),

    /// Malformed or incomplete mutation input.
    #[error("Invalid input: {0}")]
    Validation(String),

    /// A remote fetch failed during bulk load.
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
