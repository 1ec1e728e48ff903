//! A single cached value and its timestamps.

use std::sync::{Arc, Weak};
use std::time::Instant;

use super::definition::{CacheDefinition, Ownership};

enum Slot<V: ?Sized> {
    Strong(Arc<V>),
    Reclaimable(Weak<V>),
}

/// A value held by a [`KeyedCache`](super::KeyedCache).
///
/// Reclaimable entries only hold a [`Weak`] reference; the owning cache's
/// retention pool (or any caller still holding the `Arc`) keeps the value
/// alive. Once both let go, [`get`](Self::get) returns `None` and the entry
/// is dropped by the next sweep.
pub struct CacheEntry<V: ?Sized> {
    slot: Slot<V>,
    ownership: Ownership,
    last_modified: Instant,
    last_access: Instant,
    /// Position in the owning cache's eviction order; 0 when unbounded.
    order: u64,
}

impl<V: ?Sized> CacheEntry<V> {
    pub(crate) fn new(value: &Arc<V>, ownership: Ownership, now: Instant) -> Self {
        Self {
            slot: Self::slot_for(value, ownership),
            ownership,
            last_modified: now,
            last_access: now,
            order: 0,
        }
    }

    fn slot_for(value: &Arc<V>, ownership: Ownership) -> Slot<V> {
        match ownership {
            Ownership::Strong => Slot::Strong(Arc::clone(value)),
            Ownership::SoftReclaimable | Ownership::WeakReclaimable => {
                Slot::Reclaimable(Arc::downgrade(value))
            }
        }
    }

    /// The value, or `None` if it has been reclaimed.
    pub fn get(&self) -> Option<Arc<V>> {
        match &self.slot {
            Slot::Strong(value) => Some(Arc::clone(value)),
            Slot::Reclaimable(weak) => weak.upgrade(),
        }
    }

    pub fn is_reclaimed(&self) -> bool {
        match &self.slot {
            Slot::Strong(_) => false,
            Slot::Reclaimable(weak) => weak.strong_count() == 0,
        }
    }

    pub fn ownership(&self) -> Ownership {
        self.ownership
    }

    pub fn last_modified(&self) -> Instant {
        self.last_modified
    }

    pub fn last_access(&self) -> Instant {
        self.last_access
    }

    /// Replace the value in place, as a write.
    pub(crate) fn set(&mut self, value: &Arc<V>, now: Instant) {
        self.slot = Self::slot_for(value, self.ownership);
        self.last_modified = now;
        self.last_access = now;
    }

    pub(crate) fn touch(&mut self, now: Instant) {
        self.last_access = now;
    }

    pub(crate) fn order(&self) -> u64 {
        self.order
    }

    pub(crate) fn set_order(&mut self, order: u64) {
        self.order = order;
    }

    /// Timestamp idle time is measured from under `definition`.
    pub(crate) fn reference_time(&self, definition: &CacheDefinition) -> Instant {
        if definition.reset_idle_on_read {
            self.last_access
        } else {
            self.last_modified
        }
    }

    pub(crate) fn is_expired(&self, definition: &CacheDefinition, now: Instant) -> bool {
        definition.expires()
            && now.saturating_duration_since(self.reference_time(definition))
                >= definition.idle_time
    }
}
