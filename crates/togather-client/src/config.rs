//! Client configuration loaded from environment variables.
//!
//! All settings have defaults so the client can start with zero
//! configuration against a local backend.

use std::time::Duration;

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the backend REST API.
    /// Env: `TOGATHER_API_URL`
    /// Default: `http://localhost:8000`
    pub api_url: String,

    /// Base URL of the Nominatim-style geocoding endpoint.
    /// Env: `TOGATHER_GEOCODE_URL`
    /// Default: `https://nominatim.openstreetmap.org`
    pub geocode_url: String,

    /// Region hint appended to every geocoding query.
    /// Env: `TOGATHER_GEOCODE_REGION` (empty disables)
    /// Default: `Hong Kong`
    pub geocode_region: Option<String>,

    /// Base URL of the match-narration endpoint.
    /// Env: `TOGATHER_NARRATE_URL`
    /// Default: `http://localhost:8000`
    pub narrate_url: String,

    /// How often the background worker flushes the outbox.
    /// Env: `TOGATHER_SYNC_INTERVAL_SECS`
    /// Default: 5 seconds.
    pub sync_interval: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8000".to_string(),
            geocode_url: "https://nominatim.openstreetmap.org".to_string(),
            geocode_region: Some("Hong Kong".to_string()),
            narrate_url: "http://localhost:8000".to_string(),
            sync_interval: Duration::from_secs(5),
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("TOGATHER_API_URL") {
            config.api_url = url.trim_end_matches('/').to_string();
        }

        if let Ok(url) = std::env::var("TOGATHER_GEOCODE_URL") {
            config.geocode_url = url.trim_end_matches('/').to_string();
        }

        if let Ok(region) = std::env::var("TOGATHER_GEOCODE_REGION") {
            let region = region.trim().to_string();
            config.geocode_region = if region.is_empty() { None } else { Some(region) };
        }

        if let Ok(url) = std::env::var("TOGATHER_NARRATE_URL") {
            config.narrate_url = url.trim_end_matches('/').to_string();
        }

        if let Ok(val) = std::env::var("TOGATHER_SYNC_INTERVAL_SECS") {
            match parse_interval_secs(&val) {
                Some(secs) => config.sync_interval = Duration::from_secs(secs),
                None => {
                    tracing::warn!(
                        value = %val,
                        "Invalid TOGATHER_SYNC_INTERVAL_SECS, using default"
                    );
                }
            }
        }

        config
    }
}

/// Parse a positive whole number of seconds.
fn parse_interval_secs(val: &str) -> Option<u64> {
    match val.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Some(secs),
        _ => None,
    }
}
