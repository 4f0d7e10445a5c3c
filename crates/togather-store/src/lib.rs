//! The client-side entity store.
//!
//! Holds the authoritative in-process collections of users, communities,
//! events, and posts, and the mutation operations that keep them mutually
//! consistent. Every mutation applies optimistically to the in-memory
//! collections and enqueues a write intent on the [`outbox::Outbox`];
//! intents are delivered to the remote store through the
//! [`gateway::RemoteGateway`] port and retried with backoff until they
//! land. The remote store is the source of truth again on the next
//! [`store::EntityStore::bulk_load`].

pub mod error;
pub mod gateway;
pub mod ids;
pub mod outbox;
pub mod session;
pub mod store;

pub use error::{Result, StoreError};
pub use gateway::{GatewayError, MatchCandidate, RemoteGateway};
pub use ids::{IdSource, SequentialIds, UuidIds};
pub use outbox::{EntityKind, FlushReport, SyncStatus, WriteIntent};
pub use session::{PendingRegistration, ProfileInput, Session};
pub use store::{EntityStore, LoadSummary, MembershipChange, SignupChange};
