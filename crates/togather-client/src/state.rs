//! Application state shared across the client.
//!
//! The [`AppState`] struct is wrapped in `Arc<tokio::sync::Mutex<_>>` so
//! the view layer and the background sync worker can both reach it; the
//! async mutex is required because the worker holds the guard across
//! gateway awaits while flushing.

use std::sync::Arc;

use tokio::sync::Mutex;

use togather_store::{EntityStore, Session};

/// Central application state.
///
/// The entity collections persist for the process lifetime; logging out
/// clears only the session.
pub struct AppState {
    /// The four entity collections plus the persistence outbox.
    pub store: EntityStore,

    /// The currently authenticated identity, if any. Gates every store
    /// mutation.
    pub session: Session,
}

/// Shared handle to the application state.
pub type SharedState = Arc<Mutex<AppState>>;

impl AppState {
    /// A fresh, logged-out state with empty collections.
    pub fn new() -> Self {
        Self {
            store: EntityStore::new(),
            session: Session::new(),
        }
    }

    /// Wrap a fresh state in its shared handle.
    pub fn shared() -> SharedState {
        Arc::new(Mutex::new(Self::new()))
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
