use std::{
    collections::HashMap,
    sync::{Arc, OnceLock},
};

use anyhow::anyhow;
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{EventRange, EventStore, EventStream};
use crate::{Event, Result, StoreError, Uuid};

/// Cursor of the in-memory backend: how many events of each aggregate's log have been consumed.
///
/// Since versions start at 1 and are contiguous, the consumed count of an aggregate is also the
/// last version delivered for it and the index of the next unread event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryPosition {
    consumed: HashMap<Uuid, u64>,
}

impl MemoryPosition {
    pub fn consumed(&self, aggregate_id: Uuid) -> u64 {
        self.consumed.get(&aggregate_id).copied().unwrap_or(0)
    }

    /// Total number of events consumed across all aggregates.
    pub fn total(&self) -> u64 {
        self.consumed.values().sum()
    }

    fn advance(&mut self, aggregate_id: Uuid, version: u64) {
        let consumed = self.consumed.entry(aggregate_id).or_insert(0);
        *consumed = (*consumed).max(version);
    }
}

type Log = Arc<Mutex<Vec<Event>>>;

#[derive(Default)]
struct MemoryState {
    streams: DashMap<Uuid, Log>,
    positions: DashMap<String, MemoryPosition>,
}

impl MemoryState {
    // The map shard is only held while fetching the handle, so writers to other aggregates are
    // never blocked by this aggregate's critical section.
    fn log(&self, aggregate_id: Uuid) -> Log {
        self.streams.entry(aggregate_id).or_default().clone()
    }

    fn existing_log(&self, aggregate_id: Uuid) -> Option<Log> {
        self.streams.get(&aggregate_id).map(|log| log.value().clone())
    }
}

/// Process-local event store.
///
/// Each aggregate has its own log behind its own mutex, so appends to different aggregates run
/// in parallel while appends to one aggregate are serialized. Reads copy the relevant part of a
/// log under that mutex and iterate the copy unlocked.
///
/// Storage is allocated by the first [`EventStore::ensure_exists`] call; clones share it.
#[derive(Clone, Default)]
pub struct InMemoryEventStore {
    state: Arc<OnceLock<MemoryState>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose storage is already allocated.
    pub fn initialized() -> Self {
        let store = Self::new();
        store.state.get_or_init(MemoryState::default);
        store
    }

    fn state(&self) -> Result<&MemoryState> {
        self.state.get().ok_or_else(|| {
            StoreError::store_failure(
                None,
                anyhow!("in-memory event store used before ensure_exists"),
            )
        })
    }
}

fn check_batch(events: &[Event]) -> Result<()> {
    for (idx, pair) in events.windows(2).enumerate() {
        let (prev, next) = (&pair[0], &pair[1]);
        if next.aggregate_id != prev.aggregate_id {
            return Err(StoreError::store_failure(
                Some(prev.aggregate_id),
                anyhow!("batch contains multiple aggregate ids (index {})", idx + 1),
            ));
        }
        if prev.version.checked_add(1) != Some(next.version) {
            return Err(StoreError::store_failure(
                Some(prev.aggregate_id),
                anyhow!(
                    "batch versions are not contiguous: {} follows {} (index {})",
                    next.version,
                    prev.version,
                    idx + 1
                ),
            ));
        }
    }
    Ok(())
}

fn conflict(aggregate_id: Uuid, current_version: u64, attempted_version: u64) -> StoreError {
    warn!(
        aggregate_id = %aggregate_id,
        current_version,
        attempted_version,
        "concurrency conflict"
    );
    StoreError::ConcurrencyConflict {
        aggregate_id,
        attempted_version,
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    type Position = MemoryPosition;

    async fn ensure_exists(&self) -> Result<()> {
        let mut allocated = false;
        self.state.get_or_init(|| {
            allocated = true;
            MemoryState::default()
        });

        if allocated {
            info!("in-memory event store allocated");
        }
        Ok(())
    }

    async fn save_events(&self, events: &[Event]) -> Result<()> {
        let Some(first) = events.first() else {
            return Ok(());
        };
        check_batch(events)?;

        let aggregate_id = first.aggregate_id;
        let state = self.state()?;
        // Unseen aggregates only get a log once an append can actually start it.
        let log = match state.existing_log(aggregate_id) {
            Some(log) => log,
            None if first.version == 1 => state.log(aggregate_id),
            None => return Err(conflict(aggregate_id, 0, first.version)),
        };
        let mut stream = log.lock();

        let current = stream.len() as u64;
        if first.version != current + 1 {
            return Err(conflict(aggregate_id, current, first.version));
        }

        stream.extend_from_slice(events);
        debug!(
            aggregate_id = %aggregate_id,
            version = stream.len(),
            appended = events.len(),
            "events appended"
        );
        Ok(())
    }

    async fn load(&self, aggregate_id: Uuid, range: EventRange) -> Result<EventStream<'static>> {
        let Some(log) = self.state()?.existing_log(aggregate_id) else {
            return Ok(Box::new(std::iter::empty()));
        };

        let snapshot = {
            let stream = log.lock();
            let start = range.from_version.unwrap_or(1).saturating_sub(1);
            let end = range
                .to_version
                .map_or(stream.len(), |v| v.min(stream.len() as u64) as usize);
            stream
                .get(start as usize..end)
                .map(<[Event]>::to_vec)
                .unwrap_or_default()
        };

        debug!(aggregate_id = %aggregate_id, candidates = snapshot.len(), "loading events");
        Ok(Box::new(
            snapshot.into_iter().filter(move |e| range.contains(e)),
        ))
    }

    async fn current_version(&self, aggregate_id: Uuid) -> Result<u64> {
        Ok(self
            .state()?
            .existing_log(aggregate_id)
            .map_or(0, |log| log.lock().len() as u64))
    }

    async fn load_position(&self, subscriber_id: &str) -> Result<Option<MemoryPosition>> {
        Ok(self
            .state()?
            .positions
            .get(subscriber_id)
            .map(|p| p.value().clone()))
    }

    async fn save_position(&self, subscriber_id: &str, position: &MemoryPosition) -> Result<()> {
        self.state()?
            .positions
            .insert(subscriber_id.to_string(), position.clone());
        Ok(())
    }

    async fn load_since<'a>(
        &'a self,
        from: &MemoryPosition,
        to: &'a mut MemoryPosition,
    ) -> Result<EventStream<'a>> {
        let state = self.state()?;
        let logs: Vec<(Uuid, Log)> = state
            .streams
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();

        let mut pending = Vec::new();
        for (aggregate_id, log) in logs {
            let start = from.consumed(aggregate_id) as usize;
            let stream = log.lock();
            if let Some(tail) = stream.get(start..) {
                pending.extend_from_slice(tail);
            }
        }

        to.clone_from(from);
        debug!(
            consumed = from.total(),
            pending = pending.len(),
            "streaming events since position"
        );

        Ok(Box::new(CatchUp {
            pending: pending.into_iter(),
            position: to,
        }))
    }

    async fn close(&self) -> Result<()> {
        info!("in-memory event store closed");
        Ok(())
    }
}

/// Yields pending events and advances the caller's cursor as each one goes out.
struct CatchUp<'a> {
    pending: std::vec::IntoIter<Event>,
    position: &'a mut MemoryPosition,
}

impl Iterator for CatchUp<'_> {
    type Item = Event;

    fn next(&mut self) -> Option<Event> {
        let event = self.pending.next()?;
        self.position.advance(event.aggregate_id, event.version);
        Some(event)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.pending.size_hint()
    }
}
