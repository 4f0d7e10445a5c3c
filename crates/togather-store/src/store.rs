//! The authoritative in-process entity collections and their mutations.
//!
//! All mutations run to completion synchronously (single-writer): the
//! optimistic in-memory update is visible to readers immediately, and the
//! matching remote writes are queued on the outbox for asynchronous
//! delivery. Back-to-back mutations therefore always observe each other's
//! effects in order, while remote write order across entities is
//! unguaranteed.

use chrono::Utc;
use tracing::{debug, info, warn};

use togather_shared::geo::distance_km;
use togather_shared::{
    Community, CreateEventInput, Event, Post, PostBody, PrivatePrompts, User,
};

use crate::error::{Result, StoreError};
use crate::gateway::RemoteGateway;
use crate::ids::{IdSource, UuidIds};
use crate::outbox::{deliver, EntityKind, FlushReport, Outbox, SyncStatus, WriteIntent};
use crate::session::{PendingRegistration, ProfileInput, Session};

/// Direction of a community membership toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipChange {
    Joined,
    Left,
}

/// Direction of an event signup toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignupChange {
    SignedUp,
    Withdrawn,
}

/// Collection sizes after a successful bulk load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub users: usize,
    pub communities: usize,
    pub events: usize,
    pub posts: usize,
}

/// The four entity collections plus the outbox and id source.
///
/// Collections live for the process lifetime; logout clears only the
/// session pointer, never the data. Posts are kept newest-first.
pub struct EntityStore {
    users: Vec<User>,
    communities: Vec<Community>,
    events: Vec<Event>,
    posts: Vec<Post>,
    outbox: Outbox,
    ids: Box<dyn IdSource>,
}

impl EntityStore {
    /// An empty store drawing UUIDv4 identifiers.
    pub fn new() -> Self {
        Self::with_ids(Box::new(UuidIds))
    }

    /// An empty store with an injected id source.
    pub fn with_ids(ids: Box<dyn IdSource>) -> Self {
        Self {
            users: Vec::new(),
            communities: Vec::new(),
            events: Vec::new(),
            posts: Vec::new(),
            outbox: Outbox::new(),
            ids,
        }
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    pub fn users(&self) -> &[User] {
        &self.users
    }

    pub fn communities(&self) -> &[Community] {
        &self.communities
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// All posts, newest first.
    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    pub fn user(&self, id: &str) -> Option<&User> {
        self.users.iter().find(|u| u.id == id)
    }

    pub fn community(&self, id: &str) -> Option<&Community> {
        self.communities.iter().find(|c| c.id == id)
    }

    pub fn event(&self, id: &str) -> Option<&Event> {
        self.events.iter().find(|e| e.id == id)
    }

    pub fn post(&self, id: &str) -> Option<&Post> {
        self.posts.iter().find(|p| p.id == id)
    }

    /// Posts in a community's feed, newest first.
    pub fn posts_for_community(&self, community_id: &str) -> Vec<&Post> {
        self.posts
            .iter()
            .filter(|p| p.community_id == community_id)
            .collect()
    }

    /// Events hosted by a community.
    pub fn events_for_community(&self, community_id: &str) -> Vec<&Event> {
        self.events
            .iter()
            .filter(|e| e.community_id == community_id)
            .collect()
    }

    /// The geocoded event closest to the given coordinates, with its
    /// distance in kilometres. Events without finite coordinates are
    /// skipped.
    pub fn nearest_event(&self, latitude: f64, longitude: f64) -> Option<(&Event, f64)> {
        self.events
            .iter()
            .filter_map(|e| {
                let (lat, lon) = e.coords()?;
                Some((e, distance_km(latitude, longitude, lat, lon)))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }

    /// Remote-persistence state of one entity.
    pub fn sync_status(&self, kind: EntityKind, id: &str) -> SyncStatus {
        self.outbox.status_of(kind, id)
    }

    /// Number of writes still awaiting delivery.
    pub fn pending_writes(&self) -> usize {
        self.outbox.len()
    }

    // ------------------------------------------------------------------
    // Loading
    // ------------------------------------------------------------------

    /// Replace all four collections from the remote store.
    ///
    /// Pending outbox writes first get one forced delivery attempt so
    /// local changes are not overwritten silently; writes that fail again
    /// are dropped with a warning, since retrying pre-load payloads after
    /// a full replace would resurrect stale state. The four fetches run
    /// concurrently and the load is all-or-nothing: if any fetch fails,
    /// no collection is modified.
    pub async fn bulk_load<G: RemoteGateway>(&mut self, gateway: &G) -> Result<LoadSummary> {
        for write in self.outbox.take_all() {
            if let Err(e) = deliver(gateway, &write.intent).await {
                warn!(
                    op = write.intent.describe(),
                    entity = write.intent.entity_id(),
                    error = %e,
                    "Dropping unsynced write during bulk load"
                );
            }
        }

        let (users, communities, events, posts) = tokio::try_join!(
            gateway.fetch_users(),
            gateway.fetch_communities(),
            gateway.fetch_events(),
            gateway.fetch_posts(),
        )?;

        self.users = users;
        self.communities = communities;
        self.events = events;
        self.posts = posts;

        let summary = LoadSummary {
            users: self.users.len(),
            communities: self.communities.len(),
            events: self.events.len(),
            posts: self.posts.len(),
        };
        info!(
            users = summary.users,
            communities = summary.communities,
            events = summary.events,
            posts = summary.posts,
            "Bulk load complete"
        );
        Ok(summary)
    }

    /// Replace the collections with fixture data, bypassing the gateway.
    /// For seeding demos and tests.
    pub fn seed(
        &mut self,
        users: Vec<User>,
        communities: Vec<Community>,
        events: Vec<Event>,
        posts: Vec<Post>,
    ) {
        self.users = users;
        self.communities = communities;
        self.events = events;
        self.posts = posts;
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    /// Join or leave a community, updating both sides of the relation and
    /// the denormalized member count in the same step.
    pub fn toggle_community_membership(
        &mut self,
        session: &Session,
        community_id: &str,
    ) -> Result<MembershipChange> {
        let user_id = session.user_id()?.to_string();
        let c_idx = self
            .communities
            .iter()
            .position(|c| c.id == community_id)
            .ok_or_else(|| StoreError::UnknownCommunity(community_id.to_string()))?;
        let u_idx = self
            .users
            .iter()
            .position(|u| u.id == user_id)
            .ok_or_else(|| StoreError::UnknownUser(user_id.clone()))?;

        let is_member = self.users[u_idx]
            .joined_community_ids
            .iter()
            .any(|id| id == community_id);

        let change = {
            let user = &mut self.users[u_idx];
            let community = &mut self.communities[c_idx];
            if is_member {
                user.joined_community_ids.retain(|id| id != community_id);
                community.members.retain(|id| id != &user_id);
                community.member_count = community.member_count.saturating_sub(1);
                MembershipChange::Left
            } else {
                user.joined_community_ids.push(community_id.to_string());
                community.members.push(user_id.clone());
                community.member_count += 1;
                MembershipChange::Joined
            }
        };

        debug!(user = %user_id, community = %community_id, ?change, "Membership toggled");

        let now = Utc::now();
        self.outbox
            .enqueue(WriteIntent::PatchUser(self.users[u_idx].clone()), now);
        self.outbox.enqueue(
            WriteIntent::PatchCommunity(self.communities[c_idx].clone()),
            now,
        );
        Ok(change)
    }

    /// Sign up for or withdraw from an event, updating both sides of the
    /// relation in the same step.
    pub fn toggle_event_signup(
        &mut self,
        session: &Session,
        event_id: &str,
    ) -> Result<SignupChange> {
        let user_id = session.user_id()?.to_string();
        let e_idx = self
            .events
            .iter()
            .position(|e| e.id == event_id)
            .ok_or_else(|| StoreError::UnknownEvent(event_id.to_string()))?;
        let u_idx = self
            .users
            .iter()
            .position(|u| u.id == user_id)
            .ok_or_else(|| StoreError::UnknownUser(user_id.clone()))?;

        let is_signed_up = self.users[u_idx]
            .signed_up_event_ids
            .iter()
            .any(|id| id == event_id);

        let change = {
            let user = &mut self.users[u_idx];
            let event = &mut self.events[e_idx];
            if is_signed_up {
                user.signed_up_event_ids.retain(|id| id != event_id);
                event.attendees.retain(|id| id != &user_id);
                SignupChange::Withdrawn
            } else {
                user.signed_up_event_ids.push(event_id.to_string());
                event.attendees.push(user_id.clone());
                SignupChange::SignedUp
            }
        };

        debug!(user = %user_id, event = %event_id, ?change, "Signup toggled");

        let now = Utc::now();
        self.outbox
            .enqueue(WriteIntent::PatchUser(self.users[u_idx].clone()), now);
        self.outbox
            .enqueue(WriteIntent::PatchEvent(self.events[e_idx].clone()), now);
        Ok(change)
    }

    /// Create an event and its companion feed post in one logical step.
    ///
    /// The creator auto-attends. The event id lands in the creator's
    /// signups, the post id in the creator's and the community's post
    /// lists (each idempotently), the post is prepended to the feed, and
    /// four writes are queued: create event, create post, patch user,
    /// patch community.
    pub fn create_event(&mut self, session: &Session, input: CreateEventInput) -> Result<Event> {
        let user_id = session.user_id()?.to_string();

        let name = input.name.trim().to_string();
        let time = input.time.trim().to_string();
        let location = input.location.trim().to_string();
        let description = input.description.trim().to_string();
        let community_id = input.community_id.trim().to_string();
        let image_url = input.image_url.trim().to_string();

        if name.is_empty() {
            return Err(StoreError::Validation("event name is required".into()));
        }
        if location.is_empty() {
            return Err(StoreError::Validation("event location is required".into()));
        }
        if community_id.is_empty() {
            return Err(StoreError::Validation("community id is required".into()));
        }

        let c_idx = self
            .communities
            .iter()
            .position(|c| c.id == community_id)
            .ok_or_else(|| StoreError::UnknownCommunity(community_id.clone()))?;
        let u_idx = self
            .users
            .iter()
            .position(|u| u.id == user_id)
            .ok_or_else(|| StoreError::UnknownUser(user_id.clone()))?;

        let event_id = self.ids.event_id();
        let post_id = self.ids.post_id();
        let image_url = if image_url.is_empty() {
            format!("https://picsum.photos/seed/{event_id}/600/400")
        } else {
            image_url
        };

        let event = Event {
            id: event_id.clone(),
            name,
            time,
            location,
            latitude: input.latitude.filter(|v| v.is_finite()),
            longitude: input.longitude.filter(|v| v.is_finite()),
            community_id: community_id.clone(),
            description,
            image_url,
            attendees: vec![user_id.clone()],
        };

        let post = Post {
            id: post_id.clone(),
            author_id: user_id.clone(),
            community_id: community_id.clone(),
            created_at: Utc::now(),
            body: PostBody::Event {
                event_id: event_id.clone(),
            },
        };

        {
            let user = &mut self.users[u_idx];
            if !user.signed_up_event_ids.contains(&event_id) {
                user.signed_up_event_ids.push(event_id.clone());
            }
            if !user.post_ids.contains(&post_id) {
                user.post_ids.push(post_id.clone());
            }
        }
        {
            let community = &mut self.communities[c_idx];
            if !community.post_ids.contains(&post_id) {
                community.post_ids.push(post_id.clone());
            }
        }

        self.events.push(event.clone());
        self.posts.insert(0, post.clone());

        info!(event = %event_id, community = %community_id, creator = %user_id, "Event created");

        let now = Utc::now();
        self.outbox.enqueue(WriteIntent::CreateEvent(event.clone()), now);
        self.outbox.enqueue(WriteIntent::CreatePost(post), now);
        self.outbox
            .enqueue(WriteIntent::PatchUser(self.users[u_idx].clone()), now);
        self.outbox.enqueue(
            WriteIntent::PatchCommunity(self.communities[c_idx].clone()),
            now,
        );

        Ok(event)
    }

    /// Replace the session user's own record.
    ///
    /// A user cannot mutate another user's record through this path.
    pub fn update_user(&mut self, session: &Session, updated: User) -> Result<()> {
        let session_user = session.user_id()?;
        if updated.id != session_user {
            return Err(StoreError::NotSessionUser(updated.id));
        }

        let idx = self
            .users
            .iter()
            .position(|u| u.id == updated.id)
            .ok_or_else(|| StoreError::UnknownUser(updated.id.clone()))?;

        self.users[idx] = updated;
        self.outbox
            .enqueue(WriteIntent::PatchUser(self.users[idx].clone()), Utc::now());
        Ok(())
    }

    // ------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------

    /// First registration phase: enforce email uniqueness, reserve an id,
    /// derive the credential. The profile-completion flow supplies the
    /// remaining fields to [`EntityStore::complete_registration`].
    pub fn begin_registration(
        &mut self,
        email: &str,
        secret: &str,
    ) -> Result<PendingRegistration> {
        let email = email.trim().to_string();
        if email.is_empty() {
            return Err(StoreError::Validation("email is required".into()));
        }
        if self.users.iter().any(|u| u.email == email) {
            return Err(StoreError::DuplicateEmail(email));
        }

        Ok(PendingRegistration {
            user_id: self.ids.user_id(),
            email,
            credential: togather_shared::Credential::derive(secret),
        })
    }

    /// Second registration phase: insert the completed user, queue its
    /// creation, and establish the session.
    pub fn complete_registration(
        &mut self,
        pending: PendingRegistration,
        profile: ProfileInput,
        session: &mut Session,
    ) -> Result<User> {
        if self.users.iter().any(|u| u.email == pending.email) {
            return Err(StoreError::DuplicateEmail(pending.email));
        }

        let avatar_url = if profile.avatar_url.trim().is_empty() {
            // A blank name would produce an empty seed; key off the id then.
            let seed: String = profile.name.split_whitespace().collect();
            let seed = if seed.is_empty() {
                pending.user_id.clone()
            } else {
                seed
            };
            format!("https://picsum.photos/seed/{seed}/200")
        } else {
            profile.avatar_url.trim().to_string()
        };

        let user = User {
            id: pending.user_id,
            email: pending.email,
            credential: pending.credential,
            name: profile.name.trim().to_string(),
            year: profile.year,
            faculty: profile.faculty,
            major: profile.major,
            hometown: profile.hometown,
            interests: profile.interests,
            bio: profile.bio,
            private_prompts: PrivatePrompts {
                prompt1: profile.prompt1,
                prompt2: profile.prompt2,
            },
            joined_community_ids: vec![],
            signed_up_event_ids: vec![],
            post_ids: vec![],
            avatar_url,
        };

        self.users.push(user.clone());
        self.outbox
            .enqueue(WriteIntent::CreateUser(user.clone()), Utc::now());
        session.establish(&user.id);

        info!(user = %user.id, "Registration complete");
        Ok(user)
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    /// Deliver every due outbox write; requeue failures with backoff.
    pub async fn flush_pending<G: RemoteGateway>(
        &mut self,
        gateway: &G,
        now: chrono::DateTime<Utc>,
    ) -> FlushReport {
        let mut report = FlushReport::default();
        for write in self.outbox.take_due(now) {
            match deliver(gateway, &write.intent).await {
                Ok(()) => {
                    debug!(
                        op = write.intent.describe(),
                        entity = write.intent.entity_id(),
                        "Remote write delivered"
                    );
                    report.delivered += 1;
                }
                Err(e) => {
                    warn!(
                        op = write.intent.describe(),
                        entity = write.intent.entity_id(),
                        attempts = write.attempts + 1,
                        error = %e,
                        "Remote write failed, will retry"
                    );
                    self.outbox.requeue_failed(write, now);
                    report.requeued += 1;
                }
            }
        }
        report
    }
}

impl Default for EntityStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::gateway::{GatewayError, MatchCandidate};
    use crate::ids::SequentialIds;
    use std::result::Result;
    use togather_shared::Credential;

    /// In-memory gateway that seeds fetches and records writes.
    #[derive(Default)]
    struct FakeGateway {
        users: Vec<User>,
        communities: Vec<Community>,
        events: Vec<Event>,
        posts: Vec<Post>,
        fail_fetch_events: bool,
        fail_writes: AtomicBool,
        writes: Mutex<Vec<String>>,
    }

    impl FakeGateway {
        fn record(&self, op: &str, id: &str) -> Result<(), GatewayError> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(GatewayError::Transport("connection refused".into()));
            }
            self.writes.lock().unwrap().push(format!("{op} {id}"));
            Ok(())
        }

        fn recorded(&self) -> Vec<String> {
            self.writes.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RemoteGateway for FakeGateway {
        async fn fetch_users(&self) -> Result<Vec<User>, GatewayError> {
            Ok(self.users.clone())
        }

        async fn fetch_communities(&self) -> Result<Vec<Community>, GatewayError> {
            Ok(self.communities.clone())
        }

        async fn fetch_events(&self) -> Result<Vec<Event>, GatewayError> {
            if self.fail_fetch_events {
                return Err(GatewayError::Http {
                    status: 500,
                    url: "/events".into(),
                });
            }
            Ok(self.events.clone())
        }

        async fn fetch_posts(&self) -> Result<Vec<Post>, GatewayError> {
            Ok(self.posts.clone())
        }

        async fn create_user(&self, user: &User) -> Result<(), GatewayError> {
            self.record("create-user", &user.id)
        }

        async fn create_event(&self, event: &Event) -> Result<(), GatewayError> {
            self.record("create-event", &event.id)
        }

        async fn create_post(&self, post: &Post) -> Result<(), GatewayError> {
            self.record("create-post", &post.id)
        }

        async fn update_user(&self, user: &User) -> Result<(), GatewayError> {
            self.record("patch-user", &user.id)
        }

        async fn update_community(&self, community: &Community) -> Result<(), GatewayError> {
            self.record("patch-community", &community.id)
        }

        async fn update_event(&self, event: &Event) -> Result<(), GatewayError> {
            self.record("patch-event", &event.id)
        }

        async fn find_similar_users(
            &self,
            _user_id: &str,
            _event_id: &str,
        ) -> Result<Vec<MatchCandidate>, GatewayError> {
            Ok(vec![])
        }
    }

    fn user(id: &str, email: &str) -> User {
        User {
            id: id.to_string(),
            email: email.to_string(),
            credential: Credential::derive("password"),
            name: "Jane Doe".into(),
            year: 3,
            faculty: "Arts and Social Sciences".into(),
            major: "Psychology".into(),
            hometown: "Vancouver".into(),
            interests: vec!["Hiking".into(), "Photography".into()],
            bio: String::new(),
            private_prompts: PrivatePrompts::default(),
            joined_community_ids: vec![],
            signed_up_event_ids: vec![],
            post_ids: vec![],
            avatar_url: String::new(),
        }
    }

    fn community(id: &str, name: &str) -> Community {
        Community {
            id: id.to_string(),
            name: name.to_string(),
            description: String::new(),
            member_count: 0,
            image_url: String::new(),
            members: vec![],
            post_ids: vec![],
        }
    }

    fn event(id: &str, community_id: &str) -> Event {
        Event {
            id: id.to_string(),
            name: "The Peak Social Hike".into(),
            time: "Today, 5pm".into(),
            location: "Sai Ying Pun MTR Exit A2".into(),
            latitude: None,
            longitude: None,
            community_id: community_id.to_string(),
            description: String::new(),
            image_url: String::new(),
            attendees: vec![],
        }
    }

    /// Store seeded with one user, one community, one event, logged in as
    /// `user-1`.
    fn seeded() -> (EntityStore, Session) {
        let mut store = EntityStore::with_ids(Box::new(SequentialIds::new()));
        store.seed(
            vec![user("user-1", "jane@test.com")],
            vec![community("comm-1", "Fishing Club")],
            vec![event("event-1", "comm-1")],
            vec![],
        );
        let mut session = Session::new();
        session
            .login(store.users(), "jane@test.com", "password")
            .unwrap();
        (store, session)
    }

    fn assert_membership_invariant(store: &EntityStore) {
        for c in store.communities() {
            assert_eq!(c.member_count as usize, c.members.len(), "count for {}", c.id);
            for u in store.users() {
                let user_side = u.joined_community_ids.contains(&c.id);
                let comm_side = c.members.contains(&u.id);
                assert_eq!(user_side, comm_side, "user {} / community {}", u.id, c.id);
            }
        }
    }

    fn assert_signup_invariant(store: &EntityStore) {
        for e in store.events() {
            for u in store.users() {
                let user_side = u.signed_up_event_ids.contains(&e.id);
                let event_side = e.attendees.contains(&u.id);
                assert_eq!(user_side, event_side, "user {} / event {}", u.id, e.id);
            }
        }
    }

    // ------------------------------------------------------------------
    // Membership
    // ------------------------------------------------------------------

    #[test]
    fn test_join_updates_both_sides_and_count() {
        let (mut store, session) = seeded();

        let change = store
            .toggle_community_membership(&session, "comm-1")
            .unwrap();
        assert_eq!(change, MembershipChange::Joined);

        let c = store.community("comm-1").unwrap();
        assert_eq!(c.members, vec!["user-1"]);
        assert_eq!(c.member_count, 1);
        assert!(store.user("user-1").unwrap().joined_community_ids.contains(&"comm-1".to_string()));
        assert_membership_invariant(&store);
    }

    #[test]
    fn test_double_toggle_restores_prior_state() {
        let (mut store, session) = seeded();
        let before_user = store.user("user-1").unwrap().clone();
        let before_comm = store.community("comm-1").unwrap().clone();

        store.toggle_community_membership(&session, "comm-1").unwrap();
        let change = store
            .toggle_community_membership(&session, "comm-1")
            .unwrap();

        assert_eq!(change, MembershipChange::Left);
        assert_eq!(store.user("user-1").unwrap(), &before_user);
        assert_eq!(store.community("comm-1").unwrap(), &before_comm);
    }

    #[test]
    fn test_membership_invariant_over_toggle_sequence() {
        let (mut store, session) = seeded();
        store.seed(
            vec![user("user-1", "jane@test.com"), user("user-2", "sam@test.com")],
            vec![community("comm-1", "Fishing Club"), community("comm-2", "Fun Bouldering")],
            vec![],
            vec![],
        );

        for target in ["comm-1", "comm-2", "comm-1", "comm-1", "comm-2"] {
            store.toggle_community_membership(&session, target).unwrap();
            assert_membership_invariant(&store);
        }
    }

    #[test]
    fn test_unknown_community_is_typed_error_with_no_side_effect() {
        let (mut store, session) = seeded();
        let before = store.user("user-1").unwrap().clone();

        let err = store
            .toggle_community_membership(&session, "comm-404")
            .unwrap_err();
        assert!(matches!(err, StoreError::UnknownCommunity(id) if id == "comm-404"));
        assert_eq!(store.user("user-1").unwrap(), &before);
        assert_eq!(store.pending_writes(), 0);
    }

    #[test]
    fn test_membership_enqueues_user_and_community_patches() {
        let (mut store, session) = seeded();
        store.toggle_community_membership(&session, "comm-1").unwrap();

        assert_eq!(store.pending_writes(), 2);
        assert_eq!(
            store.sync_status(EntityKind::User, "user-1"),
            SyncStatus::Pending { attempts: 0 }
        );
        assert_eq!(
            store.sync_status(EntityKind::Community, "comm-1"),
            SyncStatus::Pending { attempts: 0 }
        );
    }

    // ------------------------------------------------------------------
    // Signup
    // ------------------------------------------------------------------

    #[test]
    fn test_signup_updates_both_sides() {
        let (mut store, session) = seeded();

        let change = store.toggle_event_signup(&session, "event-1").unwrap();
        assert_eq!(change, SignupChange::SignedUp);
        assert_eq!(store.event("event-1").unwrap().attendees, vec!["user-1"]);
        assert_signup_invariant(&store);

        let change = store.toggle_event_signup(&session, "event-1").unwrap();
        assert_eq!(change, SignupChange::Withdrawn);
        assert!(store.event("event-1").unwrap().attendees.is_empty());
        assert_signup_invariant(&store);
    }

    #[test]
    fn test_unknown_event_is_typed_error() {
        let (mut store, session) = seeded();
        let err = store.toggle_event_signup(&session, "event-404").unwrap_err();
        assert!(matches!(err, StoreError::UnknownEvent(_)));
    }

    // ------------------------------------------------------------------
    // Event creation
    // ------------------------------------------------------------------

    fn run_input() -> CreateEventInput {
        CreateEventInput {
            name: "Run".into(),
            time: "Tomorrow, 7am".into(),
            location: "Park".into(),
            latitude: Some(22.0),
            longitude: Some(114.0),
            description: "d".into(),
            community_id: "comm-1".into(),
            image_url: String::new(),
        }
    }

    #[test]
    fn test_create_event_local_atomicity() {
        let (mut store, session) = seeded();

        let created = store.create_event(&session, run_input()).unwrap();

        // Event collection, creator auto-attends.
        let stored = store.event(&created.id).unwrap();
        assert_eq!(stored.attendees, vec!["user-1"]);

        // Creator's signups and post list.
        let creator = store.user("user-1").unwrap();
        assert!(creator.signed_up_event_ids.contains(&created.id));
        assert_eq!(creator.post_ids.len(), 1);

        // Companion post prepended, referencing the event.
        let post = &store.posts()[0];
        assert_eq!(post.event_id(), Some(created.id.as_str()));
        assert_eq!(post.author_id, "user-1");
        assert_eq!(post.community_id, "comm-1");

        // Community feed.
        let comm = store.community("comm-1").unwrap();
        assert_eq!(comm.post_ids, vec![post.id.clone()]);

        assert_signup_invariant(&store);
    }

    #[test]
    fn test_create_event_queues_four_writes() {
        let (mut store, session) = seeded();
        store.create_event(&session, run_input()).unwrap();
        assert_eq!(store.pending_writes(), 4);
    }

    #[test]
    fn test_create_event_trims_and_defaults_image() {
        let (mut store, session) = seeded();
        let created = store
            .create_event(
                &session,
                CreateEventInput {
                    name: "  Run  ".into(),
                    location: " Park ".into(),
                    image_url: "   ".into(),
                    ..run_input()
                },
            )
            .unwrap();

        assert_eq!(created.name, "Run");
        assert_eq!(created.location, "Park");
        assert_eq!(
            created.image_url,
            format!("https://picsum.photos/seed/{}/600/400", created.id)
        );
    }

    #[test]
    fn test_create_event_keeps_caller_image_url() {
        let (mut store, session) = seeded();
        let created = store
            .create_event(
                &session,
                CreateEventInput {
                    image_url: "https://example.com/run.jpg".into(),
                    ..run_input()
                },
            )
            .unwrap();
        assert_eq!(created.image_url, "https://example.com/run.jpg");
    }

    #[test]
    fn test_create_event_validation_errors() {
        let (mut store, session) = seeded();

        let err = store
            .create_event(&session, CreateEventInput { name: "  ".into(), ..run_input() })
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));

        let err = store
            .create_event(
                &session,
                CreateEventInput { community_id: "comm-404".into(), ..run_input() },
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::UnknownCommunity(_)));
        assert_eq!(store.events().len(), 1);
        assert_eq!(store.pending_writes(), 0);
    }

    // ------------------------------------------------------------------
    // No-session guards
    // ------------------------------------------------------------------

    #[test]
    fn test_mutations_require_a_session() {
        let (mut store, _) = seeded();
        let logged_out = Session::new();
        let users_before = store.users().to_vec();
        let comms_before = store.communities().to_vec();
        let events_before = store.events().to_vec();

        assert!(matches!(
            store.toggle_community_membership(&logged_out, "comm-1"),
            Err(StoreError::NoSession)
        ));
        assert!(matches!(
            store.toggle_event_signup(&logged_out, "event-1"),
            Err(StoreError::NoSession)
        ));
        assert!(matches!(
            store.create_event(&logged_out, run_input()),
            Err(StoreError::NoSession)
        ));
        let own = store.user("user-1").unwrap().clone();
        assert!(matches!(
            store.update_user(&logged_out, own),
            Err(StoreError::NoSession)
        ));

        assert_eq!(store.users(), users_before.as_slice());
        assert_eq!(store.communities(), comms_before.as_slice());
        assert_eq!(store.events(), events_before.as_slice());
        assert!(store.posts().is_empty());
        assert_eq!(store.pending_writes(), 0);
    }

    // ------------------------------------------------------------------
    // update_user
    // ------------------------------------------------------------------

    #[test]
    fn test_update_user_replaces_own_record() {
        let (mut store, session) = seeded();
        let mut updated = store.user("user-1").unwrap().clone();
        updated.bio = "New bio".into();

        store.update_user(&session, updated).unwrap();
        assert_eq!(store.user("user-1").unwrap().bio, "New bio");
        assert_eq!(store.pending_writes(), 1);
    }

    #[test]
    fn test_update_user_rejects_other_users_record() {
        let (mut store, session) = seeded();
        let other = user("user-9", "sam@test.com");

        let err = store.update_user(&session, other).unwrap_err();
        assert!(matches!(err, StoreError::NotSessionUser(id) if id == "user-9"));
        assert!(store.user("user-9").is_none());
    }

    // ------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------

    #[test]
    fn test_registration_happy_path() {
        let (mut store, _) = seeded();
        let mut session = Session::new();

        let pending = store
            .begin_registration("sam@test.com", "hunter2")
            .unwrap();
        let created = store
            .complete_registration(
                pending,
                ProfileInput {
                    name: "Sam Wilson".into(),
                    year: 5,
                    ..ProfileInput::default()
                },
                &mut session,
            )
            .unwrap();

        assert!(session.is_active());
        assert_eq!(session.user_id().unwrap(), created.id);
        assert!(store.user(&created.id).is_some());
        assert!(created.credential.verify("hunter2"));
        assert_eq!(
            created.avatar_url,
            "https://picsum.photos/seed/SamWilson/200"
        );
        assert_eq!(store.pending_writes(), 1);
    }

    #[test]
    fn test_registration_blank_name_seeds_avatar_from_id() {
        let (mut store, _) = seeded();
        let mut session = Session::new();

        let pending = store
            .begin_registration("sam@test.com", "hunter2")
            .unwrap();
        let created = store
            .complete_registration(
                pending,
                ProfileInput {
                    name: "   ".into(),
                    ..ProfileInput::default()
                },
                &mut session,
            )
            .unwrap();

        assert_eq!(
            created.avatar_url,
            format!("https://picsum.photos/seed/{}/200", created.id)
        );
    }

    #[test]
    fn test_registration_rejects_duplicate_email() {
        let (mut store, _) = seeded();
        let err = store
            .begin_registration("jane@test.com", "whatever")
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateEmail(e) if e == "jane@test.com"));
    }

    // ------------------------------------------------------------------
    // Derived data
    // ------------------------------------------------------------------

    #[test]
    fn test_nearest_event_skips_ungeocoded() {
        let (mut store, _) = seeded();
        let mut near = event("event-2", "comm-1");
        near.latitude = Some(22.2850);
        near.longitude = Some(114.1500);
        let mut far = event("event-3", "comm-1");
        far.latitude = Some(22.3364);
        far.longitude = Some(114.2655);
        store.seed(
            vec![user("user-1", "jane@test.com")],
            vec![community("comm-1", "Fishing Club")],
            vec![event("event-1", "comm-1"), far, near],
            vec![],
        );

        let (nearest, dist) = store.nearest_event(22.2830, 114.1505).unwrap();
        assert_eq!(nearest.id, "event-2");
        assert!(dist < 1.0);
    }

    #[test]
    fn test_nearest_event_none_without_coords() {
        let (store, _) = seeded();
        assert!(store.nearest_event(22.2830, 114.1505).is_none());
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_flush_delivers_in_order() {
        let (mut store, session) = seeded();
        store.toggle_community_membership(&session, "comm-1").unwrap();

        let gateway = FakeGateway::default();
        let report = store.flush_pending(&gateway, Utc::now()).await;

        assert_eq!(report, FlushReport { delivered: 2, requeued: 0 });
        assert_eq!(store.pending_writes(), 0);
        assert_eq!(
            gateway.recorded(),
            vec!["patch-user user-1", "patch-community comm-1"]
        );
        assert_eq!(store.sync_status(EntityKind::User, "user-1"), SyncStatus::Synced);
    }

    #[tokio::test]
    async fn test_flush_requeues_failures_with_backoff() {
        let (mut store, session) = seeded();
        store.toggle_event_signup(&session, "event-1").unwrap();

        let gateway = FakeGateway::default();
        gateway.fail_writes.store(true, Ordering::SeqCst);

        let now = Utc::now();
        let report = store.flush_pending(&gateway, now).await;
        assert_eq!(report, FlushReport { delivered: 0, requeued: 2 });
        assert_eq!(
            store.sync_status(EntityKind::Event, "event-1"),
            SyncStatus::Pending { attempts: 1 }
        );

        // Still backing off: nothing due yet.
        let report = store.flush_pending(&gateway, now).await;
        assert_eq!(report, FlushReport::default());

        // Past the backoff window the writes deliver.
        gateway.fail_writes.store(false, Ordering::SeqCst);
        let report = store
            .flush_pending(&gateway, now + chrono::Duration::seconds(5))
            .await;
        assert_eq!(report, FlushReport { delivered: 2, requeued: 0 });
        assert_eq!(
            store.sync_status(EntityKind::Event, "event-1"),
            SyncStatus::Synced
        );
    }

    // ------------------------------------------------------------------
    // Bulk load
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_bulk_load_replaces_collections() {
        let gateway = FakeGateway {
            users: vec![user("user-1", "jane@test.com")],
            communities: vec![community("comm-1", "Fishing Club")],
            events: vec![event("event-1", "comm-1")],
            posts: vec![],
            ..FakeGateway::default()
        };

        let mut store = EntityStore::with_ids(Box::new(SequentialIds::new()));
        store.seed(vec![user("user-9", "old@test.com")], vec![], vec![], vec![]);

        let summary = store.bulk_load(&gateway).await.unwrap();
        assert_eq!(
            summary,
            LoadSummary { users: 1, communities: 1, events: 1, posts: 0 }
        );
        assert!(store.user("user-9").is_none());
        assert!(store.user("user-1").is_some());
    }

    #[tokio::test]
    async fn test_bulk_load_is_all_or_nothing() {
        let gateway = FakeGateway {
            users: vec![user("user-1", "jane@test.com")],
            communities: vec![community("comm-1", "Fishing Club")],
            fail_fetch_events: true,
            ..FakeGateway::default()
        };

        let mut store = EntityStore::with_ids(Box::new(SequentialIds::new()));
        store.seed(vec![user("user-9", "old@test.com")], vec![], vec![], vec![]);

        let err = store.bulk_load(&gateway).await.unwrap_err();
        assert!(matches!(err, StoreError::Gateway(_)));
        // Prior contents untouched.
        assert!(store.user("user-9").is_some());
        assert!(store.user("user-1").is_none());
    }

    #[tokio::test]
    async fn test_bulk_load_reconciles_pending_writes_first() {
        let (mut store, session) = seeded();
        store.toggle_community_membership(&session, "comm-1").unwrap();

        let gateway = FakeGateway {
            users: vec![user("user-1", "jane@test.com")],
            communities: vec![community("comm-1", "Fishing Club")],
            ..FakeGateway::default()
        };

        store.bulk_load(&gateway).await.unwrap();
        assert_eq!(store.pending_writes(), 0);
        // The queued patches were pushed out before the fetches landed.
        assert_eq!(
            gateway.recorded(),
            vec!["patch-user user-1", "patch-community comm-1"]
        );
    }

    #[tokio::test]
    async fn test_bulk_load_drops_writes_that_fail_reconciliation() {
        let (mut store, session) = seeded();
        store.toggle_community_membership(&session, "comm-1").unwrap();

        let gateway = FakeGateway {
            users: vec![user("user-1", "jane@test.com")],
            communities: vec![community("comm-1", "Fishing Club")],
            ..FakeGateway::default()
        };
        gateway.fail_writes.store(true, Ordering::SeqCst);

        store.bulk_load(&gateway).await.unwrap();

        // The failed patches are gone for good, not requeued.
        assert_eq!(store.pending_writes(), 0);
        assert_eq!(
            store.sync_status(EntityKind::User, "user-1"),
            SyncStatus::Synced
        );
        // The fetched collections replaced the optimistic local state.
        assert!(store.community("comm-1").unwrap().members.is_empty());
        assert!(store
            .user("user-1")
            .unwrap()
            .joined_community_ids
            .is_empty());
    }
}
