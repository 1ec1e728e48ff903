//! A named, concurrent, idle-expiring key-value cache.
//!
//! # Storage
//!
//! Entries live in a sharded [`DashMap`], so reads on different shards never
//! contend and both write policies use the entry API for an atomic
//! check-and-insert.
//!
//! # Expiry
//!
//! Idle expiry is soft: an expired entry stays in the map and simply reads
//! as a miss. It is overwritten by the next `put` under either write policy,
//! or dropped by `remove`, `clear`, or a max-size eviction.
//!
//! # Eviction
//!
//! A bounded cache keeps its keys in a queue ordered by reference time, so
//! evicting on insert pops the front instead of scanning the map.
//!
//! # Reclaimable values
//!
//! For [`Ownership::SoftReclaimable`] and [`Ownership::WeakReclaimable`]
//! caches the map only stores [`Weak`](std::sync::Weak) references. A moka
//! retention pool holds the strong `Arc` within the budget given by
//! [`CacheDefinition::effective_retention`]. When the pool lets a value go
//! and no caller still holds it, the entry reads as a miss and is removed by
//! the next sweep ([`size`](KeyedCache::size), [`values`](KeyedCache::values),
//! [`entries`](KeyedCache::entries) or [`sweep`](KeyedCache::sweep)).

use std::any::Any;
use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use moka::sync::Cache;

use super::definition::{CacheDefinition, WritePolicy};
use super::entry::CacheEntry;
use crate::telemetry;

/// Type-erased value stored by registry caches.
pub type AnyValue = dyn Any + Send + Sync;

/// Keys of a bounded cache ordered by when their reference time last moved.
///
/// Every write (and every read, when reads reset the idle clock) gives the
/// entry a fresh sequence number, so the first key in the queue is the one
/// with the oldest reference time. Queue updates for a key happen while its
/// map shard is locked; the queue lock is never held while taking a shard.
struct EvictionOrder<K> {
    next: AtomicU64,
    queue: Mutex<BTreeMap<u64, K>>,
}

impl<K: Clone> EvictionOrder<K> {
    fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
            queue: Mutex::new(BTreeMap::new()),
        }
    }

    fn queue(&self) -> MutexGuard<'_, BTreeMap<u64, K>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Move `key` to the back of the queue, replacing its `previous` slot.
    fn push(&self, key: &K, previous: u64) -> u64 {
        let order = self.next.fetch_add(1, Ordering::Relaxed);
        let mut queue = self.queue();
        queue.remove(&previous);
        queue.insert(order, key.clone());
        order
    }

    fn forget(&self, order: u64) {
        self.queue().remove(&order);
    }

    fn pop_oldest(&self) -> Option<(u64, K)> {
        self.queue().pop_first()
    }

    fn restore(&self, skipped: Vec<(u64, K)>) {
        if !skipped.is_empty() {
            self.queue().extend(skipped);
        }
    }
}

/// A single named cache instance.
pub struct KeyedCache<K, V: ?Sized> {
    name: String,
    definition: CacheDefinition,
    data: DashMap<K, CacheEntry<V>>,
    retainer: Option<Cache<K, Arc<V>>>,
    order: Option<EvictionOrder<K>>,
}

impl<K, V> KeyedCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: ?Sized + Send + Sync + 'static,
{
    /// Create an empty cache.
    pub fn new(name: impl Into<String>, definition: CacheDefinition) -> Self {
        let retainer = definition.effective_retention().map(|retention| {
            Cache::builder()
                .max_capacity(retention.capacity)
                .time_to_idle(retention.idle)
                .build()
        });
        let order = (definition.max_size > 0).then(EvictionOrder::new);
        Self {
            name: name.into(),
            definition,
            data: DashMap::new(),
            retainer,
            order,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn definition(&self) -> &CacheDefinition {
        &self.definition
    }

    /// Look up a value.
    ///
    /// Returns `None` when the key is absent, when the entry has been idle
    /// for at least the configured idle time, or when its value has been
    /// reclaimed. None of these remove the entry.
    pub fn get<Q>(&self, key: &Q) -> Option<Arc<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let found = self.lookup(key, Instant::now());
        let counter = if found.is_some() {
            telemetry::CACHE_HITS_TOTAL
        } else {
            telemetry::CACHE_MISSES_TOTAL
        };
        metrics::counter!(counter, "cache" => self.name.clone()).increment(1);
        found
    }

    fn lookup<Q>(&self, key: &Q, now: Instant) -> Option<Arc<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        if self.definition.reset_idle_on_read {
            let mut slot = self.data.get_mut(key)?;
            let value = self.live_value(slot.value(), now)?;
            let (stored_key, entry) = slot.pair_mut();
            entry.touch(now);
            self.reorder(stored_key, entry);
            self.keep_alive(stored_key);
            Some(value)
        } else {
            let slot = self.data.get(key)?;
            let value = self.live_value(slot.value(), now)?;
            self.keep_alive(slot.key());
            Some(value)
        }
    }

    /// The entry's value, unless it is idle-expired or reclaimed.
    fn live_value(&self, entry: &CacheEntry<V>, now: Instant) -> Option<Arc<V>> {
        if entry.is_expired(&self.definition, now) {
            return None;
        }
        entry.get()
    }

    /// A read counts as use for the retention pool.
    fn keep_alive(&self, key: &K) {
        if let Some(retainer) = &self.retainer {
            retainer.get(key);
        }
    }

    fn retain(&self, key: &K, value: &Arc<V>) {
        if let Some(retainer) = &self.retainer {
            retainer.insert(key.clone(), Arc::clone(value));
        }
    }

    /// Record that the entry's reference time moved. Caller holds the shard.
    fn reorder(&self, key: &K, entry: &mut CacheEntry<V>) {
        if let Some(order) = &self.order {
            entry.set_order(order.push(key, entry.order()));
        }
    }

    fn forget(&self, entry: &CacheEntry<V>) {
        if let Some(order) = &self.order {
            order.forget(entry.order());
        }
    }

    fn fresh_entry(&self, key: &K, value: &Arc<V>, now: Instant) -> CacheEntry<V> {
        self.retain(key, value);
        let mut entry = CacheEntry::new(value, self.definition.ownership, now);
        self.reorder(key, &mut entry);
        entry
    }

    /// Whether a live, unexpired value is cached for `key`.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.lookup(key, Instant::now()).is_some()
    }

    /// Store a value according to the cache's [`WritePolicy`].
    ///
    /// With [`WritePolicy::Overwrite`] the value replaces any existing entry
    /// and the previous live value is returned. An idle-expired or reclaimed
    /// previous value counts as absent.
    ///
    /// With [`WritePolicy::PutIfAbsentMerge`]:
    /// - no entry: the value is inserted and **the inserted value** is
    ///   returned, not `None`. Callers rely on always getting back the value
    ///   that is now cached, so this differs from the usual put-if-absent
    ///   contract on purpose.
    /// - entry whose value was reclaimed or has idle-expired: the value is
    ///   written in place and returned.
    /// - live entry: `value` is discarded and the existing value returned.
    ///
    /// The existence check and insert are atomic. Refreshing the retention
    /// pool is not part of that atomic step, so a reclaim racing with a
    /// concurrent write to the same key can drop the just-written value;
    /// the next `get` then misses. That race is accepted.
    pub fn put(&self, key: K, value: Arc<V>) -> Option<Arc<V>> {
        let now = Instant::now();
        let (result, inserted) = match self.data.entry(key.clone()) {
            Entry::Vacant(vacant) => {
                let entry = self.fresh_entry(vacant.key(), &value, now);
                vacant.insert(entry);
                match self.definition.write_policy {
                    WritePolicy::Overwrite => (None, true),
                    WritePolicy::PutIfAbsentMerge => (Some(value), true),
                }
            }
            Entry::Occupied(mut occupied) => {
                let current = self.live_value(occupied.get(), now);
                match (self.definition.write_policy, current) {
                    (WritePolicy::PutIfAbsentMerge, Some(existing)) => (Some(existing), false),
                    (WritePolicy::PutIfAbsentMerge, None) => {
                        self.retain(occupied.key(), &value);
                        let mut slot = occupied.into_ref();
                        let (stored_key, entry) = slot.pair_mut();
                        entry.set(&value, now);
                        self.reorder(stored_key, entry);
                        (Some(value), false)
                    }
                    (WritePolicy::Overwrite, previous) => {
                        let previous_order = occupied.get().order();
                        let mut entry = CacheEntry::new(&value, self.definition.ownership, now);
                        entry.set_order(previous_order);
                        self.retain(occupied.key(), &value);
                        self.reorder(occupied.key(), &mut entry);
                        occupied.insert(entry);
                        (previous, false)
                    }
                }
            }
        };
        if inserted {
            self.enforce_max_size(&key);
        }
        result
    }

    /// Evict entries with the oldest reference time until the cache is
    /// within its max size. The entry just inserted is never chosen.
    fn enforce_max_size(&self, just_inserted: &K) {
        let Some(order) = &self.order else {
            return;
        };
        let max = self.definition.max_size;
        let mut skipped = Vec::new();
        while self.data.len() as u64 > max {
            let Some((position, victim)) = order.pop_oldest() else {
                break;
            };
            if &victim == just_inserted {
                skipped.push((position, victim));
                continue;
            }
            // A stale position means the entry was rewritten or touched since.
            let evicted = self
                .data
                .remove_if(&victim, |_, entry| entry.order() == position);
            if evicted.is_some() {
                if let Some(retainer) = &self.retainer {
                    retainer.invalidate(&victim);
                }
                metrics::counter!(telemetry::CACHE_EVICTIONS_TOTAL, "cache" => self.name.clone())
                    .increment(1);
            }
        }
        order.restore(skipped);
    }

    /// Remove an entry, returning its value if it was live and unexpired.
    pub fn remove<Q>(&self, key: &Q) -> Option<Arc<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let (key, entry) = self.data.remove(key)?;
        self.forget(&entry);
        if let Some(retainer) = &self.retainer {
            retainer.invalidate(&key);
        }
        self.live_value(&entry, Instant::now())
    }

    /// Drop every entry. The cache stays usable.
    pub fn clear(&self) {
        self.data.retain(|_, entry| {
            self.forget(entry);
            false
        });
        if let Some(retainer) = &self.retainer {
            retainer.invalidate_all();
            retainer.run_pending_tasks();
        }
    }

    /// Remove entries whose value has been reclaimed. Returns how many were
    /// removed.
    pub fn sweep(&self) -> usize {
        let Some(retainer) = &self.retainer else {
            return 0;
        };
        retainer.run_pending_tasks();
        let mut removed = 0;
        self.data.retain(|_, entry| {
            if !entry.is_reclaimed() {
                return true;
            }
            self.forget(entry);
            removed += 1;
            false
        });
        if removed > 0 {
            metrics::counter!(telemetry::CACHE_RECLAIMED_TOTAL, "cache" => self.name.clone())
                .increment(removed as u64);
        }
        removed
    }

    /// Release every reclaimable value the retention pool holds, as under
    /// memory pressure. Values still held by a caller stay readable; the rest
    /// are gone and removed by the next sweep.
    pub fn release_reclaimable(&self) {
        if let Some(retainer) = &self.retainer {
            let keys: Vec<Arc<K>> = retainer.iter().map(|(k, _)| k).collect();
            for key in keys {
                retainer.invalidate(key.as_ref());
            }
            retainer.run_pending_tasks();
        }
    }

    /// Number of live, unexpired entries. Sweeps reclaimed entries first.
    pub fn size(&self) -> usize {
        self.sweep();
        let now = Instant::now();
        self.data
            .iter()
            .filter(|e| !e.value().is_expired(&self.definition, now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Point-in-time copy of live, unexpired values. Sweeps reclaimed
    /// entries in the same pass.
    pub fn values(&self) -> Vec<Arc<V>> {
        self.entries().into_iter().map(|(_, v)| v).collect()
    }

    /// Point-in-time copy of live, unexpired key/value pairs. Sweeps
    /// reclaimed entries in the same pass.
    pub fn entries(&self) -> Vec<(K, Arc<V>)> {
        if let Some(retainer) = &self.retainer {
            retainer.run_pending_tasks();
        }
        let now = Instant::now();
        let mut live = Vec::new();
        let mut removed = 0u64;
        self.data.retain(|key, entry| match entry.get() {
            Some(value) => {
                if !entry.is_expired(&self.definition, now) {
                    live.push((key.clone(), value));
                }
                true
            }
            None => {
                self.forget(entry);
                removed += 1;
                false
            }
        });
        if removed > 0 {
            metrics::counter!(telemetry::CACHE_RECLAIMED_TOTAL, "cache" => self.name.clone())
                .increment(removed);
        }
        live
    }
}

impl<K> KeyedCache<K, AnyValue>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
{
    /// Typed lookup for type-erased caches. A value of another type reads as
    /// a miss.
    pub fn get_as<T, Q>(&self, key: &Q) -> Option<Arc<T>>
    where
        T: Any + Send + Sync,
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get(key).and_then(|value| value.downcast::<T>().ok())
    }
}

impl<K, V: ?Sized> fmt::Debug for KeyedCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyedCache")
            .field("name", &self.name)
            .field("definition", &self.definition)
            .finish_non_exhaustive()
    }
}
