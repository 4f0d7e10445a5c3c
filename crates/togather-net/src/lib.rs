//! HTTP adapters for the remote collaborators.
//!
//! [`HttpGateway`] implements the store's `RemoteGateway` port against
//! the backend REST API; [`geocode::Geocoder`] resolves free-text
//! addresses to coordinates; [`narrate::NarrationClient`] produces the
//! one-sentence match blurbs.

pub mod gateway;
pub mod geocode;
pub mod narrate;

pub use gateway::HttpGateway;
pub use geocode::{GeocodeError, GeocodeResult, Geocoder};
pub use narrate::{NarrationClient, NarrationError, Narrator};
