//! One-sentence match narration.
//!
//! The narration service takes both users' interest lists and returns a
//! short, friendly sentence hinting at common ground. Failures surface as
//! errors; the match resolver owns the fallback template.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from the narration collaborator.
#[derive(Error, Debug)]
pub enum NarrationError {
    /// The request never completed.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Non-2xx response from the service.
    #[error("HTTP {status} from narration service")]
    Http { status: u16 },

    /// The response body did not decode or was empty.
    #[error("Decode error: {0}")]
    Decode(String),
}

/// Produces a one-sentence affinity blurb from two interest lists.
#[async_trait]
pub trait Narrator: Send + Sync {
    async fn describe_match(
        &self,
        interests_a: &[String],
        interests_b: &[String],
    ) -> Result<String, NarrationError>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NarrationRequest<'a> {
    interests_a: &'a [String],
    interests_b: &'a [String],
}

#[derive(Debug, Deserialize)]
struct NarrationResponse {
    description: String,
}

/// HTTP client for the narration endpoint.
#[derive(Debug, Clone)]
pub struct NarrationClient {
    http: reqwest::Client,
    endpoint: String,
}

impl NarrationClient {
    /// Build a client posting to `{endpoint}/narrate-match`.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl Narrator for NarrationClient {
    async fn describe_match(
        &self,
        interests_a: &[String],
        interests_b: &[String],
    ) -> Result<String, NarrationError> {
        let response = self
            .http
            .post(format!("{}/narrate-match", self.endpoint))
            .json(&NarrationRequest {
                interests_a,
                interests_b,
            })
            .send()
            .await
            .map_err(|e| NarrationError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NarrationError::Http {
                status: status.as_u16(),
            });
        }

        let body: NarrationResponse = response
            .json()
            .await
            .map_err(|e| NarrationError::Decode(e.to_string()))?;

        let description = body.description.trim().to_string();
        if description.is_empty() {
            return Err(NarrationError::Decode("empty description".into()));
        }
        Ok(description)
    }
}
