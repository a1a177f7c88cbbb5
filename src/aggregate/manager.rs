use std::sync::Arc;

use tracing::debug;

use super::{
    Aggregate,
    cache::{AggregateCache, CacheEntry},
};
use crate::{Event, EventRange, EventStore, Result, Serializer, Uuid};

/// The `AggregateManager` loads aggregates from an aggregate cache, falling back to replaying
/// their history from the event store, and keeps the cache current after successful appends.
///
/// Whether loads are served from memory depends only on the cache it is given: a
/// [`super::cache::LruAggregateCache`] keeps recently used aggregates, while
/// [`super::cache::NoCache`] turns every load into a full replay.
pub struct AggregateManager<A, ES, S>
where
    A: Aggregate,
    ES: EventStore,
    S: Serializer,
{
    event_store: Arc<ES>,
    serializer: Arc<S>,
    cache: Box<dyn AggregateCache<A>>,
}

impl<A, ES, S> AggregateManager<A, ES, S>
where
    A: Aggregate,
    ES: EventStore,
    S: Serializer,
{
    pub fn new(event_store: Arc<ES>, serializer: Arc<S>, cache: Box<dyn AggregateCache<A>>) -> Self {
        Self {
            event_store,
            serializer,
            cache,
        }
    }

    /// Loads an aggregate and the version it was rebuilt up to.
    ///
    /// An aggregate without history comes back as `A::default()` at version 0 with its id set.
    pub async fn load(&self, aggregate_id: Uuid) -> Result<CacheEntry<A>> {
        if let Some(entry) = self.cache.get(aggregate_id) {
            return Ok(entry);
        }

        let entry = self.replay(aggregate_id).await?;
        self.cache.put(entry.clone());
        Ok(entry)
    }

    /// Rebuilds an aggregate from its full history, bypassing the cache.
    pub async fn replay(&self, aggregate_id: Uuid) -> Result<CacheEntry<A>> {
        let events: Vec<Event> = self
            .event_store
            .load(aggregate_id, EventRange::all())
            .await?
            .collect();
        let version = events.last().map_or(0, |e| e.version);

        let mut aggregate = A::default();
        aggregate.set_aggregate_id(aggregate_id);
        aggregate
            .apply_events(self.serializer.as_ref(), &events)
            .await?;

        debug!(aggregate_id = %aggregate_id, version, "aggregate replayed");
        Ok(CacheEntry::new(aggregate_id, version, aggregate))
    }

    /// Records the state reached after a successful append. A writer that lost the race to a newer
    /// version leaves the cached entry alone.
    pub fn store(&self, entry: CacheEntry<A>) {
        self.cache.put(entry);
    }

    /// Forgets any cached state for `aggregate_id`, e.g. after losing a concurrency race.
    pub fn invalidate(&self, aggregate_id: Uuid) {
        if self.cache.remove(aggregate_id).is_some() {
            debug!(aggregate_id = %aggregate_id, "cached aggregate invalidated");
        }
    }

    pub fn cache(&self) -> &dyn AggregateCache<A> {
        self.cache.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;

    use super::*;
    use crate::{
        InMemoryEventStore, JsonSerializer, LruAggregateCache, NoCache,
        test_support::{Counter, counter_event},
    };

    fn manager(
        cache: Box<dyn AggregateCache<Counter>>,
    ) -> (
        Arc<InMemoryEventStore>,
        AggregateManager<Counter, InMemoryEventStore, JsonSerializer>,
    ) {
        let store = Arc::new(InMemoryEventStore::initialized());
        let manager = AggregateManager::new(store.clone(), Arc::new(JsonSerializer::new()), cache);
        (store, manager)
    }

    fn lru() -> Box<dyn AggregateCache<Counter>> {
        Box::new(LruAggregateCache::new(NonZeroUsize::new(8).unwrap()))
    }

    #[tokio::test]
    async fn unknown_aggregate_loads_as_default_at_version_zero() {
        let (_, manager) = manager(lru());
        let id = Uuid::new_v4();

        let entry = manager.load(id).await.unwrap();

        assert_eq!(entry.latest_version, 0);
        assert_eq!(entry.state.id, id);
        assert_eq!(entry.state.count, 0);
    }

    #[tokio::test]
    async fn replay_applies_history_in_order() {
        let (store, manager) = manager(lru());
        let id = Uuid::new_v4();
        let serializer = JsonSerializer::new();
        store.save(counter_event(&serializer, id, 1, 5)).await.unwrap();
        store.save(counter_event(&serializer, id, 2, -2)).await.unwrap();

        let entry = manager.load(id).await.unwrap();

        assert_eq!(entry.latest_version, 2);
        assert_eq!(entry.state.count, 3);
        assert!(manager.cache().contains_key(id));
    }

    #[tokio::test]
    async fn cache_hit_skips_replay_until_invalidated() {
        let (store, manager) = manager(lru());
        let id = Uuid::new_v4();
        let serializer = JsonSerializer::new();
        store.save(counter_event(&serializer, id, 1, 5)).await.unwrap();
        manager.load(id).await.unwrap();

        store.save(counter_event(&serializer, id, 2, 5)).await.unwrap();
        let cached = manager.load(id).await.unwrap();
        manager.invalidate(id);
        let fresh = manager.load(id).await.unwrap();

        assert_eq!(cached.latest_version, 1);
        assert_eq!(fresh.latest_version, 2);
        assert_eq!(fresh.state.count, 10);
    }

    #[tokio::test]
    async fn no_cache_always_replays() {
        let (store, manager) = manager(Box::new(NoCache));
        let id = Uuid::new_v4();
        let serializer = JsonSerializer::new();
        store.save(counter_event(&serializer, id, 1, 5)).await.unwrap();
        manager.load(id).await.unwrap();

        store.save(counter_event(&serializer, id, 2, 1)).await.unwrap();

        assert_eq!(manager.load(id).await.unwrap().state.count, 6);
        assert!(!manager.cache().contains_key(id));
    }
}
