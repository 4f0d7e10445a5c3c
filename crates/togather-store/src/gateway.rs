//! The remote gateway port.
//!
//! The store persists through this trait and never touches HTTP itself;
//! the reqwest implementation lives in `togather-net`, and tests drive the
//! store with in-memory fakes.

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use togather_shared::{Community, Event, Post, User};

/// Errors produced by a remote gateway implementation.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// The server answered with a non-2xx status.
    #[error("HTTP {status} from {url}")]
    Http { status: u16, url: String },

    /// The request never completed (connect, timeout, TLS, ...).
    #[error("Transport error: {0}")]
    Transport(String),

    /// The response body did not decode into the expected shape.
    #[error("Decode error: {0}")]
    Decode(String),
}

/// One entry of the ranked candidate list returned by the similarity
/// endpoint. The ranking itself is a remote concern; only the id is
/// consumed locally.
#[derive(Debug, Clone, Deserialize)]
pub struct MatchCandidate {
    pub id: String,
}

/// Request/response operations against the remote store.
///
/// Fetches have full-replace semantics for the local collections. Creates
/// send the full entity and the server preserves the client-assigned id,
/// which makes retried creates idempotent. Updates are full-object
/// replacements keyed by id.
#[async_trait]
pub trait RemoteGateway: Send + Sync {
    async fn fetch_users(&self) -> Result<Vec<User>, GatewayError>;
    async fn fetch_communities(&self) -> Result<Vec<Community>, GatewayError>;
    async fn fetch_events(&self) -> Result<Vec<Event>, GatewayError>;
    async fn fetch_posts(&self) -> Result<Vec<Post>, GatewayError>;

    async fn create_user(&self, user: &User) -> Result<(), GatewayError>;
    async fn create_event(&self, event: &Event) -> Result<(), GatewayError>;
    async fn create_post(&self, post: &Post) -> Result<(), GatewayError>;

    async fn update_user(&self, user: &User) -> Result<(), GatewayError>;
    async fn update_community(&self, community: &Community) -> Result<(), GatewayError>;
    async fn update_event(&self, event: &Event) -> Result<(), GatewayError>;

    /// Ranked co-attendee candidates for `user_id` at `event_id`, most
    /// similar first.
    async fn find_similar_users(
        &self,
        user_id: &str,
        event_id: &str,
    ) -> Result<Vec<MatchCandidate>, GatewayError>;
}
