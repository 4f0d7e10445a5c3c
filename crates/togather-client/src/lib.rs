//! Composition layer for the Togather client core.
//!
//! Wires the entity store, session, and HTTP adapters together, resolves
//! best matches for event views, and runs the background outbox flusher.
//! The view layer consumes [`state::AppState`] and is out of scope here.

pub mod config;
pub mod match_resolver;
pub mod state;
pub mod sync;

use tracing_subscriber::{fmt, EnvFilter};

/// Initialise the global tracing subscriber.
///
/// `RUST_LOG` overrides the default per-crate filter.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("togather_client=debug,togather_net=debug,togather_store=info,warn")
    });

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
