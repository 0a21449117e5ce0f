//! Shadow Graph: the in-memory index of currently non-ancient events
//! (spec.md §4.3).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use qc_event_core::Event;
use shared_types::{Hash, NodeId};

use crate::reservation::Reservation;

/// Outcome of [`ShadowGraph::insert`] — modeled as a plain enum, not a
/// `Result`, mirroring `qc-event-core::VerifyOutcome`'s literal spec
/// signature (`Ok | Duplicate | Ancient`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Ok,
    Duplicate,
    Ancient,
}

struct TrackedEvent {
    event: Event,
    /// The value compared against the ancient threshold — birth round by
    /// default (spec.md GLOSSARY: "Ancient: ... generation (or birth round)
    /// below a sliding threshold").
    indicator: u64,
}

struct TipEntry {
    hash: Hash,
    generation: u64,
}

pub(crate) struct Inner {
    events: RwLock<HashMap<Hash, TrackedEvent>>,
    tips: RwLock<HashMap<NodeId, TipEntry>>,
    ancient_threshold: AtomicU64,
    /// Lower thresholds of currently-held window reservations, keyed by an
    /// internal id so `Reservation::drop` can remove exactly its own entry.
    active_windows: RwLock<HashMap<u64, u64>>,
    next_reservation_id: AtomicU64,
}

impl Inner {
    pub(crate) fn release_window(&self, id: u64) {
        self.active_windows.write().remove(&id);
    }

    /// The floor below which eviction is unconditionally forbidden: the
    /// minimum lower-threshold among all currently held window
    /// reservations, or `u64::MAX` (no protection) if none are held.
    fn protected_floor(&self) -> u64 {
        self.active_windows
            .read()
            .values()
            .copied()
            .min()
            .unwrap_or(u64::MAX)
    }
}

/// Thread-safe index of non-ancient events (spec.md §4.3).
///
/// Cheaply `Clone`able; clones share the same underlying index.
#[derive(Clone)]
pub struct ShadowGraph {
    inner: Arc<Inner>,
}

impl ShadowGraph {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                events: RwLock::new(HashMap::new()),
                tips: RwLock::new(HashMap::new()),
                ancient_threshold: AtomicU64::new(0),
                active_windows: RwLock::new(HashMap::new()),
                next_reservation_id: AtomicU64::new(0),
            }),
        }
    }

    /// Inserts `event`, indexed by `indicator` for ancientness purposes.
    /// By the time this returns, the event's parents are already visible
    /// via [`ShadowGraph::get`] — the shadow graph never reorders inserts,
    /// so callers (gossip's `TRANSFER` phase) must hand events over in
    /// topological order (spec.md §8 property 1).
    #[tracing::instrument(level = "debug", skip(self, event), fields(hash = %event.hash, creator = %event.creator))]
    pub fn insert(&self, event: Event, indicator: u64) -> InsertOutcome {
        let hash = event.hash;
        if indicator < self.inner.ancient_threshold.load(Ordering::Acquire) {
            return InsertOutcome::Ancient;
        }

        let mut events = self.inner.events.write();
        if events.contains_key(&hash) {
            return InsertOutcome::Duplicate;
        }

        let creator = event.creator;
        let generation = event.generation;
        events.insert(hash, TrackedEvent { event, indicator });
        drop(events);

        let mut tips = self.inner.tips.write();
        let replace = match tips.get(&creator) {
            Some(current) => generation > current.generation,
            None => true,
        };
        if replace {
            tips.insert(creator, TipEntry { hash, generation });
        }

        InsertOutcome::Ok
    }

    pub fn get(&self, hash: &Hash) -> Option<Event> {
        self.inner
            .events
            .read()
            .get(hash)
            .map(|tracked| tracked.event.clone())
    }

    pub fn contains(&self, hash: &Hash) -> bool {
        self.inner.events.read().contains_key(hash)
    }

    pub fn len(&self) -> usize {
        self.inner.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.events.read().is_empty()
    }

    /// One most-recent event per creator whose self-descendants are not
    /// yet known (spec.md §4.3 `tips`).
    pub fn tips(&self) -> HashMap<NodeId, Event> {
        let tips = self.inner.tips.read();
        let events = self.inner.events.read();
        tips.iter()
            .filter_map(|(creator, tip)| {
                events.get(&tip.hash).map(|tracked| (*creator, tracked.event.clone()))
            })
            .collect()
    }

    /// Evicts events whose indicator is below `new_threshold` and which
    /// fall outside every active window reservation (spec.md §4.3
    /// invariant: a reservation held at level `L` protects all events with
    /// indicator ≥ `L` regardless of `new_threshold`).
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn advance_ancient_threshold(&self, new_threshold: u64) {
        self.inner.ancient_threshold.store(new_threshold, Ordering::Release);
        let floor = new_threshold.min(self.inner.protected_floor());

        let mut events = self.inner.events.write();
        events.retain(|_, tracked| tracked.indicator >= floor);
        drop(events);

        let remaining: std::collections::HashSet<Hash> =
            self.inner.events.read().keys().copied().collect();
        self.inner
            .tips
            .write()
            .retain(|_, tip| remaining.contains(&tip.hash));
    }

    pub fn ancient_threshold(&self) -> u64 {
        self.inner.ancient_threshold.load(Ordering::Acquire)
    }

    /// Pins all non-ancient events at or above `lower_threshold` against
    /// eviction until the returned guard is dropped.
    pub fn reserve_window(&self, lower_threshold: u64) -> Reservation {
        let id = self.inner.next_reservation_id.fetch_add(1, Ordering::Relaxed);
        self.inner.active_windows.write().insert(id, lower_threshold);
        Reservation::new(self.inner.clone(), lower_threshold, id)
    }
}

impl Default for ShadowGraph {
    fn default() -> Self {
        Self::new()
    }
}
