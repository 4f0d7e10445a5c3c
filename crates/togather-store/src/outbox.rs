//! Write-ahead outbox for remote persistence.
//!
//! Every mutation enqueues a [`WriteIntent`] carrying the full updated
//! entity. Delivery is decoupled from the mutation: the store's
//! `flush_pending` drains due entries, sends them through the gateway,
//! and requeues failures with exponential backoff. Because every write is
//! a full-object replacement keyed by a client-assigned id, redelivery is
//! idempotent.

use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};

use togather_shared::{Community, Event, Post, User};

use crate::gateway::{GatewayError, RemoteGateway};

/// Delay before the first redelivery attempt.
const BASE_BACKOFF_SECS: i64 = 2;
/// Ceiling for the backoff delay.
const MAX_BACKOFF_SECS: i64 = 300;

/// Which collection an entity belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    User,
    Community,
    Event,
    Post,
}

/// A persistence intent mirroring one optimistic local mutation.
#[derive(Debug, Clone)]
pub enum WriteIntent {
    CreateUser(User),
    CreateEvent(Event),
    CreatePost(Post),
    PatchUser(User),
    PatchCommunity(Community),
    PatchEvent(Event),
}

impl WriteIntent {
    pub fn kind(&self) -> EntityKind {
        match self {
            WriteIntent::CreateUser(_) | WriteIntent::PatchUser(_) => EntityKind::User,
            WriteIntent::PatchCommunity(_) => EntityKind::Community,
            WriteIntent::CreateEvent(_) | WriteIntent::PatchEvent(_) => EntityKind::Event,
            WriteIntent::CreatePost(_) => EntityKind::Post,
        }
    }

    pub fn entity_id(&self) -> &str {
        match self {
            WriteIntent::CreateUser(u) | WriteIntent::PatchUser(u) => &u.id,
            WriteIntent::PatchCommunity(c) => &c.id,
            WriteIntent::CreateEvent(e) | WriteIntent::PatchEvent(e) => &e.id,
            WriteIntent::CreatePost(p) => &p.id,
        }
    }

    /// Short label for log lines.
    pub fn describe(&self) -> &'static str {
        match self {
            WriteIntent::CreateUser(_) => "create user",
            WriteIntent::CreateEvent(_) => "create event",
            WriteIntent::CreatePost(_) => "create post",
            WriteIntent::PatchUser(_) => "patch user",
            WriteIntent::PatchCommunity(_) => "patch community",
            WriteIntent::PatchEvent(_) => "patch event",
        }
    }
}

/// Send one intent through the gateway.
pub async fn deliver<G: RemoteGateway>(
    gateway: &G,
    intent: &WriteIntent,
) -> Result<(), GatewayError> {
    match intent {
        WriteIntent::CreateUser(u) => gateway.create_user(u).await,
        WriteIntent::CreateEvent(e) => gateway.create_event(e).await,
        WriteIntent::CreatePost(p) => gateway.create_post(p).await,
        WriteIntent::PatchUser(u) => gateway.update_user(u).await,
        WriteIntent::PatchCommunity(c) => gateway.update_community(c).await,
        WriteIntent::PatchEvent(e) => gateway.update_event(e).await,
    }
}

/// Remote-persistence state of one entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    /// No queued write refers to the entity.
    Synced,
    /// At least one write is still queued; `attempts` is the highest
    /// failure count among them.
    Pending { attempts: u32 },
}

/// A queued write with its retry bookkeeping.
#[derive(Debug, Clone)]
pub struct PendingWrite {
    pub intent: WriteIntent,
    /// Failed delivery attempts so far.
    pub attempts: u32,
    /// Earliest instant the next attempt may run.
    pub not_before: DateTime<Utc>,
}

/// Counts from one `flush_pending` pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub delivered: usize,
    pub requeued: usize,
}

/// FIFO queue of writes awaiting delivery.
#[derive(Debug, Default)]
pub struct Outbox {
    queue: VecDeque<PendingWrite>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a fresh intent, eligible for delivery immediately.
    pub fn enqueue(&mut self, intent: WriteIntent, now: DateTime<Utc>) {
        self.queue.push_back(PendingWrite {
            intent,
            attempts: 0,
            not_before: now,
        });
    }

    /// Remove and return every entry whose backoff deadline has passed,
    /// preserving queue order.
    pub fn take_due(&mut self, now: DateTime<Utc>) -> Vec<PendingWrite> {
        let mut due = Vec::new();
        let mut kept = VecDeque::with_capacity(self.queue.len());
        for write in self.queue.drain(..) {
            if write.not_before <= now {
                due.push(write);
            } else {
                kept.push_back(write);
            }
        }
        self.queue = kept;
        due
    }

    /// Remove and return every entry regardless of backoff. Used by bulk
    /// load for its one forced reconciliation pass.
    pub fn take_all(&mut self) -> Vec<PendingWrite> {
        self.queue.drain(..).collect()
    }

    /// Put a failed write back with an escalated backoff deadline.
    pub fn requeue_failed(&mut self, mut write: PendingWrite, now: DateTime<Utc>) {
        write.attempts += 1;
        write.not_before = now + backoff(write.attempts);
        self.queue.push_back(write);
    }

    /// Sync state of one entity across all queued writes.
    pub fn status_of(&self, kind: EntityKind, id: &str) -> SyncStatus {
        let mut pending = None;
        for write in &self.queue {
            if write.intent.kind() == kind && write.intent.entity_id() == id {
                let attempts = pending.map_or(write.attempts, |a: u32| a.max(write.attempts));
                pending = Some(attempts);
            }
        }
        match pending {
            Some(attempts) => SyncStatus::Pending { attempts },
            None => SyncStatus::Synced,
        }
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

/// Exponential backoff: 2s, 4s, 8s, ... capped at five minutes.
fn backoff(attempts: u32) -> Duration {
    let exp = attempts.saturating_sub(1).min(32);
    let secs = BASE_BACKOFF_SECS
        .saturating_mul(1i64 << exp)
        .min(MAX_BACKOFF_SECS);
    Duration::seconds(secs)
}
