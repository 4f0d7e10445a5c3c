//! Entity structs mirrored to the remote store.
//!
//! Every struct derives `Serialize` and `Deserialize` with camelCase field
//! names so it round-trips through the backend's JSON unchanged
//! (`joinedCommunityIds`, `memberCount`, and so on).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::credentials::Credential;

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// The two free-text prompts collected at profile setup.
///
/// Read only by the match resolver; never shown to other users.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PrivatePrompts {
    pub prompt1: String,
    pub prompt2: String,
}

/// A registered user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Unique identifier, e.g. `user-2`.
    pub id: String,
    /// Login email, unique across all users.
    pub email: String,
    /// Salted hash of the login secret.
    pub credential: Credential,
    /// Display name.
    pub name: String,
    /// Year of study.
    pub year: u32,
    pub faculty: String,
    pub major: String,
    pub hometown: String,
    /// Ordered interest tags, fed to the similarity and narration services.
    pub interests: Vec<String>,
    pub bio: String,
    pub private_prompts: PrivatePrompts,
    /// Communities this user belongs to. Mirror of `Community::members`.
    pub joined_community_ids: Vec<String>,
    /// Events this user attends. Mirror of `Event::attendees`.
    pub signed_up_event_ids: Vec<String>,
    /// Posts authored by this user.
    pub post_ids: Vec<String>,
    pub avatar_url: String,
}

// ---------------------------------------------------------------------------
// Community
// ---------------------------------------------------------------------------

/// A campus community users can join.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Community {
    /// Unique identifier, e.g. `comm-1`.
    pub id: String,
    pub name: String,
    pub description: String,
    /// Denormalized member tally. Must equal `members.len()` after every
    /// mutation; both are updated in the same step.
    pub member_count: u64,
    pub image_url: String,
    /// User ids of the members. Mirror of `User::joined_community_ids`.
    pub members: Vec<String>,
    /// Posts published in this community.
    pub post_ids: Vec<String>,
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// An event hosted by a community.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Unique identifier, e.g. `event-1`.
    pub id: String,
    pub name: String,
    /// Display string such as `Today, 5pm`; deliberately not a structured
    /// timestamp.
    pub time: String,
    /// Free-text location name.
    pub location: String,
    /// Geocoded latitude, absent if the location was never geocoded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    /// Geocoded longitude, absent if the location was never geocoded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    /// The community hosting this event.
    pub community_id: String,
    pub description: String,
    pub image_url: String,
    /// User ids of attendees. Mirror of `User::signed_up_event_ids`.
    pub attendees: Vec<String>,
}

impl Event {
    /// Both coordinates, when present and finite. Callers must use this
    /// guard before computing distances; the haversine helper returns NaN
    /// on non-finite input.
    pub fn coords(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) if lat.is_finite() && lon.is_finite() => Some((lat, lon)),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Post
// ---------------------------------------------------------------------------

/// Variant-specific payload of a post. Internally tagged so the wire
/// shape keeps the original `type` / `content` / `eventId` fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PostBody {
    /// A plain text post.
    #[serde(rename_all = "camelCase")]
    Text { content: String },
    /// An announcement for an event, created together with it.
    #[serde(rename_all = "camelCase")]
    Event { event_id: String },
}

/// A post in a community feed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    /// Unique identifier, e.g. `post-7`.
    pub id: String,
    /// The authoring user.
    pub author_id: String,
    /// The community whose feed carries this post.
    pub community_id: String,
    /// Creation instant, rendered relative to now by
    /// [`crate::timefmt::format_relative`].
    #[serde(rename = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub body: PostBody,
}

impl Post {
    /// The referenced event id for `event`-variant posts.
    pub fn event_id(&self) -> Option<&str> {
        match &self.body {
            PostBody::Event { event_id } => Some(event_id),
            PostBody::Text { .. } => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Mutation inputs
// ---------------------------------------------------------------------------

/// Caller-supplied fields for creating an event.
///
/// String fields are trimmed by the store; an empty `image_url` selects a
/// placeholder image keyed by the new event id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEventInput {
    pub name: String,
    pub time: String,
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    pub description: String,
    pub community_id: String,
    #[serde(default)]
    pub image_url: String,
}
