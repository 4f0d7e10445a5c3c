//! reqwest implementation of the store's `RemoteGateway` port.
//!
//! One stateless request/response method per endpoint: fetch-all per
//! collection, create via POST, update via PATCH with the full entity as
//! the body, plus the similarity query.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use togather_shared::{Community, Event, Post, User};
use togather_store::{GatewayError, MatchCandidate, RemoteGateway};

/// Wire shape of `GET /find-similar-users`.
#[derive(Debug, Deserialize)]
struct SimilarUsersResponse {
    top_matches: Vec<MatchCandidate>,
}

/// HTTP client for the backend REST API.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    http: reqwest::Client,
    base_url: String,
}

impl HttpGateway {
    /// Build a gateway against `base_url` (trailing slash tolerated).
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, GatewayError> {
        let url = self.url(path);
        let response = self
            .http
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Http {
                status: status.as_u16(),
                url,
            });
        }
        response
            .json()
            .await
            .map_err(|e| GatewayError::Decode(e.to_string()))
    }

    async fn send_json<B: Serialize + ?Sized>(
        &self,
        method: reqwest::Method,
        path: &str,
        body: &B,
    ) -> Result<(), GatewayError> {
        let url = self.url(path);
        debug!(method = %method, %url, "Dispatching write");
        let response = self
            .http
            .request(method, &url)
            .json(body)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Http {
                status: status.as_u16(),
                url,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteGateway for HttpGateway {
    async fn fetch_users(&self) -> Result<Vec<User>, GatewayError> {
        self.get_json("/users", &[]).await
    }

    async fn fetch_communities(&self) -> Result<Vec<Community>, GatewayError> {
        self.get_json("/communities", &[]).await
    }

    async fn fetch_events(&self) -> Result<Vec<Event>, GatewayError> {
        self.get_json("/events", &[]).await
    }

    async fn fetch_posts(&self) -> Result<Vec<Post>, GatewayError> {
        self.get_json("/posts", &[]).await
    }

    async fn create_user(&self, user: &User) -> Result<(), GatewayError> {
        self.send_json(reqwest::Method::POST, "/users", user).await
    }

    async fn create_event(&self, event: &Event) -> Result<(), GatewayError> {
        self.send_json(reqwest::Method::POST, "/events", event).await
    }

    async fn create_post(&self, post: &Post) -> Result<(), GatewayError> {
        self.send_json(reqwest::Method::POST, "/posts", post).await
    }

    async fn update_user(&self, user: &User) -> Result<(), GatewayError> {
        self.send_json(reqwest::Method::PATCH, &format!("/users/{}", user.id), user)
            .await
    }

    async fn update_community(&self, community: &Community) -> Result<(), GatewayError> {
        self.send_json(
            reqwest::Method::PATCH,
            &format!("/communities/{}", community.id),
            community,
        )
        .await
    }

    async fn update_event(&self, event: &Event) -> Result<(), GatewayError> {
        self.send_json(
            reqwest::Method::PATCH,
            &format!("/events/{}", event.id),
            event,
        )
        .await
    }

    async fn find_similar_users(
        &self,
        user_id: &str,
        event_id: &str,
    ) -> Result<Vec<MatchCandidate>, GatewayError> {
        let response: SimilarUsersResponse = self
            .get_json(
                "/find-similar-users",
                &[("user_id", user_id), ("event_id", event_id)],
            )
            .await?;
        Ok(response.top_matches)
    }
}
