use std::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::Uuid;

/// A rebuilt aggregate together with the version it was rebuilt up to.
///
/// Entries are identified by `aggregate_id` alone.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<A> {
    pub aggregate_id: Uuid,
    pub latest_version: u64,
    pub state: A,
}

impl<A> CacheEntry<A> {
    pub fn new(aggregate_id: Uuid, latest_version: u64, state: A) -> Self {
        Self {
            aggregate_id,
            latest_version,
            state,
        }
    }
}

/// Called with the key and last entry of every aggregate pushed out of a full cache.
pub type EvictionListener<A> = Box<dyn Fn(Uuid, &CacheEntry<A>) + Send + Sync>;

/// Bounded map from aggregate id to its latest rebuilt state.
///
/// This is deliberately narrow: there is no iteration and no bulk mutation. A cache only saves
/// replay work; it is never consulted to answer a range or version query.
pub trait AggregateCache<A>: Send + Sync {
    /// Returns the entry for `aggregate_id` and marks it most recently used.
    fn get(&self, aggregate_id: Uuid) -> Option<CacheEntry<A>>;

    /// Inserts or replaces the entry keyed by `entry.aggregate_id` and marks it most recently used.
    ///
    /// An entry with a lower `latest_version` than the one already held is ignored, so a late
    /// writer never rolls the cache back.
    fn put(&self, entry: CacheEntry<A>);

    /// Drops the entry for `aggregate_id`, returning it if present. Not an eviction.
    fn remove(&self, aggregate_id: Uuid) -> Option<CacheEntry<A>>;

    /// Checks for an entry without touching its recency.
    fn contains_key(&self, aggregate_id: Uuid) -> bool;

    /// Maximum number of entries held; 0 when caching is disabled.
    fn capacity(&self) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Least-recently-used cache guarded by a single mutex.
///
/// `get` and `put` both promote the key. When a `put` of a new key would exceed the capacity, the
/// least recently used key is evicted first and the eviction listener, if any, runs before `put`
/// returns. Among keys never read, the oldest insert is the least recently used.
pub struct LruAggregateCache<A> {
    entries: Mutex<LruCache<Uuid, CacheEntry<A>>>,
    on_evict: Option<EvictionListener<A>>,
}

impl<A> LruAggregateCache<A>
where
    A: Clone + Send + 'static,
{
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            on_evict: None,
        }
    }

    /// Registers the hook fired for each evicted entry, e.g. to checkpoint state elsewhere.
    pub fn with_eviction_listener<F>(mut self, listener: F) -> Self
    where
        F: Fn(Uuid, &CacheEntry<A>) + Send + Sync + 'static,
    {
        self.on_evict = Some(Box::new(listener));
        self
    }
}

impl<A> AggregateCache<A> for LruAggregateCache<A>
where
    A: Clone + Send + 'static,
{
    fn get(&self, aggregate_id: Uuid) -> Option<CacheEntry<A>> {
        let hit = self.entries.lock().get(&aggregate_id).cloned();
        trace!(aggregate_id = %aggregate_id, hit = hit.is_some(), "cache lookup");
        hit
    }

    fn put(&self, entry: CacheEntry<A>) {
        let aggregate_id = entry.aggregate_id;
        let displaced = {
            let mut entries = self.entries.lock();
            if let Some(current) = entries.peek(&aggregate_id)
                && current.latest_version > entry.latest_version
            {
                trace!(
                    aggregate_id = %aggregate_id,
                    cached = current.latest_version,
                    offered = entry.latest_version,
                    "stale cache entry ignored"
                );
                return;
            }
            entries.push(aggregate_id, entry)
        };

        // `push` hands back the old value when the key was already present; only a different
        // key means something was evicted.
        if let Some((evicted_id, evicted)) = displaced
            && evicted_id != aggregate_id
        {
            debug!(
                aggregate_id = %evicted_id,
                version = evicted.latest_version,
                "aggregate evicted from cache"
            );
            if let Some(listener) = &self.on_evict {
                listener(evicted_id, &evicted);
            }
        }
    }

    fn remove(&self, aggregate_id: Uuid) -> Option<CacheEntry<A>> {
        self.entries.lock().pop(&aggregate_id)
    }

    fn contains_key(&self, aggregate_id: Uuid) -> bool {
        self.entries.lock().contains(&aggregate_id)
    }

    fn capacity(&self) -> usize {
        self.entries.lock().cap().get()
    }

    fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

/// Cache that never holds anything, so every load replays the full history.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCache;

impl<A> AggregateCache<A> for NoCache
where
    A: Send + Sync,
{
    fn get(&self, _aggregate_id: Uuid) -> Option<CacheEntry<A>> {
        None
    }

    fn put(&self, _entry: CacheEntry<A>) {}

    fn remove(&self, _aggregate_id: Uuid) -> Option<CacheEntry<A>> {
        None
    }

    fn contains_key(&self, _aggregate_id: Uuid) -> bool {
        false
    }

    fn capacity(&self) -> usize {
        0
    }

    fn len(&self) -> usize {
        0
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn cache(capacity: usize) -> LruAggregateCache<u32> {
        LruAggregateCache::new(NonZeroUsize::new(capacity).unwrap())
    }

    fn entry(id: Uuid, state: u32) -> CacheEntry<u32> {
        CacheEntry::new(id, state as u64, state)
    }

    #[test]
    fn overflow_evicts_first_inserted_and_notifies_once() {
        let evicted = Arc::new(Mutex::new(Vec::new()));
        let sink = evicted.clone();
        let cache = cache(3).with_eviction_listener(move |id, e: &CacheEntry<u32>| {
            sink.lock().push((id, e.state));
        });
        let ids: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();

        for (i, id) in ids.iter().enumerate() {
            cache.put(entry(*id, i as u32));
        }

        assert_eq!(*evicted.lock(), vec![(ids[0], 0)]);
        assert!(cache.get(ids[0]).is_none());
        assert!(ids[1..].iter().all(|id| cache.contains_key(*id)));
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn get_promotes_a_key_out_of_eviction() {
        let cache = cache(2);
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        cache.put(entry(a, 1));
        cache.put(entry(b, 2));

        assert_eq!(cache.get(a).map(|e| e.state), Some(1));
        cache.put(entry(c, 3));

        assert!(cache.contains_key(a));
        assert!(!cache.contains_key(b));
    }

    #[test]
    fn contains_key_does_not_promote() {
        let cache = cache(2);
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        cache.put(entry(a, 1));
        cache.put(entry(b, 2));

        assert!(cache.contains_key(a));
        cache.put(entry(c, 3));

        assert!(!cache.contains_key(a));
    }

    #[test]
    fn replacing_an_entry_is_not_an_eviction() {
        let notified = Arc::new(Mutex::new(0));
        let sink = notified.clone();
        let cache = cache(1).with_eviction_listener(move |_, _: &CacheEntry<u32>| {
            *sink.lock() += 1;
        });
        let id = Uuid::new_v4();

        cache.put(entry(id, 1));
        cache.put(entry(id, 2));

        assert_eq!(*notified.lock(), 0);
        assert_eq!(cache.get(id).map(|e| e.latest_version), Some(2));
    }

    #[test]
    fn older_entry_never_replaces_a_newer_one() {
        let cache = cache(2);
        let id = Uuid::new_v4();

        cache.put(entry(id, 3));
        cache.put(entry(id, 2));

        assert_eq!(cache.get(id).map(|e| e.latest_version), Some(3));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn remove_drops_without_notifying() {
        let notified = Arc::new(Mutex::new(0));
        let sink = notified.clone();
        let cache = cache(2).with_eviction_listener(move |_, _: &CacheEntry<u32>| {
            *sink.lock() += 1;
        });
        let id = Uuid::new_v4();
        cache.put(entry(id, 1));

        assert_eq!(cache.remove(id).map(|e| e.state), Some(1));
        assert!(!cache.contains_key(id));
        assert!(cache.is_empty());
        assert_eq!(*notified.lock(), 0);
        assert_eq!(cache.capacity(), 2);
    }

    #[test]
    fn no_cache_never_remembers() {
        let cache = NoCache;
        let id = Uuid::new_v4();

        AggregateCache::<u32>::put(&cache, entry(id, 1));

        assert!(!AggregateCache::<u32>::contains_key(&cache, id));
        assert!(AggregateCache::<u32>::get(&cache, id).is_none());
        assert_eq!(AggregateCache::<u32>::capacity(&cache), 0);
    }
}
