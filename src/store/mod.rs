//! Event store backend contract.

use std::fmt::Debug;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Serialize, de::DeserializeOwned};

use crate::{Event, Result, Uuid};

pub mod memory;

pub use memory::{InMemoryEventStore, MemoryPosition};

/// A lazy, finite, ordered sequence of events.
pub type EventStream<'a> = Box<dyn Iterator<Item = Event> + Send + 'a>;

/// Inclusive version and timestamp bounds for [`EventStore::load`].
///
/// Every bound is optional and independent: a missing lower version bound means version 1, any
/// other missing bound is open-ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventRange {
    pub from_version: Option<u64>,
    pub to_version: Option<u64>,
    pub from_timestamp: Option<DateTime<Utc>>,
    pub to_timestamp: Option<DateTime<Utc>>,
}

impl EventRange {
    /// The whole history of an aggregate.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn from_version(mut self, version: u64) -> Self {
        self.from_version = Some(version);
        self
    }

    pub fn to_version(mut self, version: u64) -> Self {
        self.to_version = Some(version);
        self
    }

    pub fn from_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.from_timestamp = Some(timestamp);
        self
    }

    pub fn to_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.to_timestamp = Some(timestamp);
        self
    }

    pub fn contains(&self, event: &Event) -> bool {
        self.from_version.is_none_or(|v| event.version >= v)
            && self.to_version.is_none_or(|v| event.version <= v)
            && self.from_timestamp.is_none_or(|t| event.timestamp >= t)
            && self.to_timestamp.is_none_or(|t| event.timestamp <= t)
    }
}

/// The `EventStore` trait defines the contract every storage backend implements.
///
/// A backend owns the authoritative log of every aggregate. For a given aggregate the log is a
/// contiguous run of versions `1, 2, 3, ...`, and the only way to extend it is an append whose
/// version is exactly one past the current one. That check is the sole consistency gate of the
/// system: it is what makes load-modify-save safe when several writers race on one aggregate.
///
/// Appends to different aggregates must not block each other. Appends to the same aggregate are
/// serialized by the backend.
///
/// Besides per-aggregate reads, a backend hands out [`EventStore::Position`] cursors that let a
/// subscriber stream the whole history across every aggregate, resuming where it left off without
/// gaps or duplicates. A single cursor must not be driven by two callers at once; that is the
/// caller's responsibility and is not guarded here.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Backend-specific cursor into the global history. Cursors from different backends are
    /// never compared.
    type Position: Clone + Debug + Default + Send + Sync + Serialize + DeserializeOwned;

    /// Initializes the underlying storage. Safe to call repeatedly; never drops existing data.
    async fn ensure_exists(&self) -> Result<()>;

    /// Appends a batch of events for a single aggregate, all or nothing.
    ///
    /// The first event must carry `current_version + 1` (where an unseen aggregate is at 0) and
    /// the rest must follow contiguously. A mismatch on the first version fails with
    /// [`crate::StoreError::ConcurrencyConflict`]; a malformed batch fails with
    /// [`crate::StoreError::StoreFailure`]. Nothing is appended on failure.
    async fn save_events(&self, events: &[Event]) -> Result<()>;

    /// Appends one event. See [`EventStore::save_events`].
    async fn save(&self, event: Event) -> Result<()> {
        self.save_events(std::slice::from_ref(&event)).await
    }

    /// Loads the events of one aggregate that fall within `range`, in version order.
    ///
    /// An unknown aggregate yields an empty stream. The stream reflects the log as it was when
    /// the call was made.
    async fn load(&self, aggregate_id: Uuid, range: EventRange) -> Result<EventStream<'static>>;

    /// Current version of an aggregate, 0 when it has no events.
    async fn current_version(&self, aggregate_id: Uuid) -> Result<u64>;

    /// A cursor positioned before the first event ever appended.
    fn create_position(&self) -> Self::Position {
        Self::Position::default()
    }

    /// Loads the cursor last saved for `subscriber_id`, if any.
    async fn load_position(&self, subscriber_id: &str) -> Result<Option<Self::Position>>;

    /// Stores the cursor for `subscriber_id`, replacing any previous one.
    async fn save_position(&self, subscriber_id: &str, position: &Self::Position) -> Result<()>;

    /// Streams every event appended after `from`, across all aggregates.
    ///
    /// `to` is reset to `from` and then advanced as each event is yielded, so that once the
    /// stream is drained `to` resumes exactly where consumption stopped. If the caller stops
    /// early, the events already yielded count as delivered. Order across aggregates is
    /// unspecified; within an aggregate it follows versions.
    async fn load_since<'a>(
        &'a self,
        from: &Self::Position,
        to: &'a mut Self::Position,
    ) -> Result<EventStream<'a>>;

    /// Releases any resources held by the backend.
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
