//! Types and pure helpers shared by every Togather crate.
//!
//! Holds the entity model mirrored to the remote store, the haversine
//! distance helper, salted credential hashing, and relative-time
//! formatting for post timestamps.

pub mod credentials;
pub mod geo;
pub mod models;
pub mod timefmt;

pub use credentials::Credential;
pub use models::{Community, CreateEventInput, Event, Post, PostBody, PrivatePrompts, User};
