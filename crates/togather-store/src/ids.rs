//! Identifier generation for client-created entities.
//!
//! Injected into the store so tests can generate deterministic ids; the
//! default draws UUIDv4s, which keeps rapid programmatic creation
//! collision-free.

use uuid::Uuid;

/// Source of fresh entity identifiers.
pub trait IdSource: Send {
    fn user_id(&mut self) -> String;
    fn event_id(&mut self) -> String;
    fn post_id(&mut self) -> String;
}

/// UUIDv4-backed id source used in production.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidIds;

impl IdSource for UuidIds {
    fn user_id(&mut self) -> String {
        format!("user-{}", Uuid::new_v4())
    }

    fn event_id(&mut self) -> String {
        format!("event-{}", Uuid::new_v4())
    }

    fn post_id(&mut self) -> String {
        format!("post-{}", Uuid::new_v4())
    }
}

/// Monotonic id source for tests and seeded fixtures.
#[derive(Debug, Default)]
pub struct SequentialIds {
    next: u64,
}

impl SequentialIds {
    pub fn new() -> Self {
        Self::default()
    }

    fn next(&mut self, prefix: &str) -> String {
        self.next += 1;
        format!("{prefix}-{}", self.next)
    }
}

impl IdSource for SequentialIds {
    fn user_id(&mut self) -> String {
        self.next("user")
    }

    fn event_id(&mut self) -> String {
        self.next("event")
    }

    fn post_id(&mut self) -> String {
        self.next("post")
    }
}
