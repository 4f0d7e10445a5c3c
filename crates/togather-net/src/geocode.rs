//! Free-text address geocoding against a Nominatim-style endpoint.
//!
//! Coordinates arrive as JSON strings and are parsed to f64. An optional
//! region hint is appended to every query to bias results toward the
//! campus area.

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

/// Identifies this client to the geocoding provider, as its usage policy
/// requires.
const USER_AGENT: &str = "togather-client/0.1";

/// Errors from the geocoding collaborator.
#[derive(Error, Debug)]
pub enum GeocodeError {
    /// The provider returned an empty result set for the address.
    #[error("No coordinates found for address: {0}")]
    NoMatch(String),

    /// The request never completed.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Non-2xx response from the provider.
    #[error("HTTP {status} from geocoder")]
    Http { status: u16 },

    /// The response body did not decode, or a coordinate string was not
    /// a number.
    #[error("Decode error: {0}")]
    Decode(String),
}

/// A resolved address.
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodeResult {
    pub latitude: f64,
    pub longitude: f64,
    pub place_name: String,
}

#[derive(Debug, Deserialize)]
struct NominatimHit {
    lat: String,
    lon: String,
    display_name: String,
}

/// Client for a Nominatim-style search endpoint.
#[derive(Debug, Clone)]
pub struct Geocoder {
    http: reqwest::Client,
    endpoint: String,
    region_hint: Option<String>,
}

impl Geocoder {
    /// Build a geocoder for `endpoint` (e.g.
    /// `https://nominatim.openstreetmap.org`). `region_hint` is appended
    /// to every query, e.g. `Hong Kong`.
    pub fn new(endpoint: impl Into<String>, region_hint: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            region_hint,
        }
    }

    /// Resolve a free-text address to coordinates and a canonical place
    /// name. Takes the provider's first (best) hit.
    pub async fn geocode(&self, address: &str) -> Result<GeocodeResult, GeocodeError> {
        let query = build_query(address, self.region_hint.as_deref());
        debug!(%query, "Geocoding address");

        let response = self
            .http
            .get(format!("{}/search", self.endpoint))
            .query(&[
                ("q", query.as_str()),
                ("format", "json"),
                ("addressdetails", "1"),
                ("limit", "1"),
            ])
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .header(reqwest::header::ACCEPT_LANGUAGE, "en")
            .send()
            .await
            .map_err(|e| GeocodeError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GeocodeError::Http {
                status: status.as_u16(),
            });
        }

        let hits: Vec<NominatimHit> = response
            .json()
            .await
            .map_err(|e| GeocodeError::Decode(e.to_string()))?;

        let hit = hits
            .into_iter()
            .next()
            .ok_or_else(|| GeocodeError::NoMatch(address.to_string()))?;
        parse_hit(hit)
    }
}

fn build_query(address: &str, region_hint: Option<&str>) -> String {
    match region_hint {
        Some(region) => format!("{address}, {region}"),
        None => address.to_string(),
    }
}

fn parse_hit(hit: NominatimHit) -> Result<GeocodeResult, GeocodeError> {
    let latitude: f64 = hit
        .lat
        .parse()
        .map_err(|_| GeocodeError::Decode(format!("bad latitude: {}", hit.lat)))?;
    let longitude: f64 = hit
        .lon
        .parse()
        .map_err(|_| GeocodeError::Decode(format!("bad longitude: {}", hit.lon)))?;
    Ok(GeocodeResult {
        latitude,
        longitude,
        place_name: hit.display_name,
    })
}
