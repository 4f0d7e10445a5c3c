//! Best-match selection for an event's detail view.
//!
//! The ranking itself is a remote concern (the similarity endpoint is an
//! opaque oracle); locally we only exclude the requesting user, resolve
//! the top candidate against the user collection, and narrate the result.
//! Resolution runs once per view and is not cached.

use tracing::warn;

use togather_net::Narrator;
use togather_shared::User;
use togather_store::{EntityStore, RemoteGateway, Result, Session, StoreError};

/// Outcome of a best-match resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchSuggestion {
    /// No co-attendee to suggest.
    NoMatch,
    /// The top-ranked co-attendee with a one-sentence blurb.
    Suggestion { user: User, blurb: String },
}

/// Resolve the best co-attendee match for the session user at an event.
///
/// `NoMatch` when the session user is not attending the event, when they
/// are the only attendee, when the oracle returns no candidates, or when
/// the top candidate is not locally known (no follow-up fetch is issued).
/// A narration failure falls back to a fixed template naming the matched
/// user.
pub async fn best_match<G, N>(
    store: &EntityStore,
    session: &Session,
    event_id: &str,
    gateway: &G,
    narrator: &N,
) -> Result<MatchSuggestion>
where
    G: RemoteGateway,
    N: Narrator,
{
    let user_id = session.user_id()?;
    let event = store
        .event(event_id)
        .ok_or_else(|| StoreError::UnknownEvent(event_id.to_string()))?;
    let me = store
        .user(user_id)
        .ok_or_else(|| StoreError::UnknownUser(user_id.to_string()))?;

    let attending = event.attendees.iter().any(|id| id == user_id);
    let has_company = event.attendees.iter().any(|id| id != user_id);
    if !attending || !has_company {
        return Ok(MatchSuggestion::NoMatch);
    }

    let candidates = gateway.find_similar_users(user_id, event_id).await?;
    let Some(top) = candidates.first() else {
        return Ok(MatchSuggestion::NoMatch);
    };
    let Some(matched) = store.user(&top.id) else {
        return Ok(MatchSuggestion::NoMatch);
    };

    let blurb = match narrator
        .describe_match(&me.interests, &matched.interests)
        .await
    {
        Ok(blurb) => blurb,
        Err(e) => {
            warn!(matched = %matched.id, error = %e, "Narration failed, using fallback");
            format!("You and {} make a good match!", matched.name)
        }
    };

    Ok(MatchSuggestion::Suggestion {
        user: matched.clone(),
        blurb,
    })
}
