//! Orphan buffer - turns an unordered event stream into a topological one
//!
//! Takes events in arbitrary arrival order from many peers, holds back
//! any event whose parents have not arrived yet, and emits events
//! strictly after their parents. Events that age out of the non-ancient
//! window are discarded and never emitted.
//!
//! The buffer is not internally synchronized; exactly one sequential
//! execution context may call [`OrphanBuffer::handle_event`],
//! [`OrphanBuffer::set_non_ancient_window`], and [`OrphanBuffer::clear`].
//! See [`crate::pipeline::IntakeStage`] for that context.

use std::sync::Arc;

use hashbrown::{HashMap, HashSet};

use braid_core::error::{BraidError, Result};
use braid_core::event::GossipEvent;
use braid_core::types::{EventHash, Generation};
use braid_core::window::NonAncientWindow;

use crate::counter::IntakeEventCounter;
use crate::stats::IntakeStats;

/// Initial capacity of the internal maps
const INITIAL_CAPACITY: usize = 1024;

/// A buffered event together with the parents it is still missing
struct OrphanedEvent {
    event: GossipEvent,
    missing: HashSet<EventHash>,
}

/// A parent hash that at least one orphan is blocked on
struct MissingParent {
    /// Generation the children claim for this parent; committed by the
    /// parent hash, so honest children agree on it
    generation: Generation,

    /// Hashes of the orphans blocked on this parent
    waiters: HashSet<EventHash>,
}

/// OrphanBuffer - the dependency-resolution stage of event intake
///
/// Every event admitted through [`handle_event`](Self::handle_event)
/// reaches exactly one terminal outcome: released downstream, dropped
/// as ancient, ignored as a duplicate, purged when the window passes
/// it, or rejected as malformed. The peer's intake counter is
/// decremented exactly once at that outcome.
pub struct OrphanBuffer {
    /// Current non-ancient window; monotonically advancing
    window: NonAncientWindow,

    /// Diagnostic sequence stamped on each admitted event
    next_arrival_sequence: u64,

    /// Hashes of released events and their generations, kept so parents
    /// can be looked up and garbage-collected once ancient
    resolved: HashMap<EventHash, Generation>,

    /// Buffered orphans by their own hash
    orphans: HashMap<EventHash, OrphanedEvent>,

    /// Missing parent hash -> the orphans blocked on it
    waiting_on: HashMap<EventHash, MissingParent>,

    /// Per-peer in-flight counters, decremented at terminal outcomes
    counter: Arc<IntakeEventCounter>,

    /// Shared intake statistics for observability
    stats: Arc<IntakeStats>,
}

impl OrphanBuffer {
    /// Create an empty buffer with the genesis window (nothing ancient)
    pub fn new(counter: Arc<IntakeEventCounter>, stats: Arc<IntakeStats>) -> Self {
        Self {
            window: NonAncientWindow::genesis(),
            next_arrival_sequence: 0,
            resolved: HashMap::with_capacity(INITIAL_CAPACITY),
            orphans: HashMap::with_capacity(INITIAL_CAPACITY),
            waiting_on: HashMap::with_capacity(INITIAL_CAPACITY),
            counter,
            stats,
        }
    }

    /// Admit one event.
    ///
    /// Returns the events that became releasable as a result, in
    /// topological order: every parent precedes its children, and no
    /// event is ever returned twice across calls. An orphaned event
    /// produces an empty list now and surfaces from a later call once
    /// its parents are satisfied.
    pub fn handle_event(&mut self, mut event: GossipEvent) -> Result<Vec<GossipEvent>> {
        if let Err(err) = event.validate_structure() {
            self.counter.decrement(event.sender());
            self.stats.record_rejected();
            return Err(err);
        }

        event.set_arrival_sequence(self.next_arrival_sequence);
        self.next_arrival_sequence += 1;

        if self.window.is_ancient(event.generation()) {
            // Ancient events can be safely ignored.
            self.counter.decrement(event.sender());
            self.stats.record_ancient_dropped();
            return Ok(Vec::new());
        }

        let hash = event.hash();
        if self.resolved.contains_key(&hash) || self.orphans.contains_key(&hash) {
            self.counter.decrement(event.sender());
            self.stats.record_duplicate();
            return Ok(Vec::new());
        }

        let missing = self.missing_parents(&event);
        if missing.is_empty() {
            let mut released = Vec::new();
            self.release_cascade(event, &mut released);
            self.stats.set_current_orphans(self.orphans.len());
            return Ok(released);
        }

        for parent in event.parents() {
            if missing.contains(&parent.hash) {
                self.waiting_on
                    .entry(parent.hash)
                    .or_insert_with(|| MissingParent {
                        generation: parent.generation,
                        waiters: HashSet::new(),
                    })
                    .waiters
                    .insert(hash);
            }
        }
        self.orphans.insert(hash, OrphanedEvent { event, missing });
        self.stats.set_current_orphans(self.orphans.len());

        Ok(Vec::new())
    }

    /// Advance the non-ancient window.
    ///
    /// Orphans that became ancient themselves are purged and never
    /// released. Missing parents that became ancient can no longer
    /// legally arrive, so the dependency on them is treated as
    /// satisfied; this may release whole chains of orphans, which are
    /// returned in topological order.
    ///
    /// A window with a lower threshold than the current one is rejected
    /// without any effect.
    pub fn set_non_ancient_window(&mut self, window: NonAncientWindow) -> Result<Vec<GossipEvent>> {
        if window.threshold_generation() < self.window.threshold_generation() {
            return Err(BraidError::WindowRegression {
                current: self.window.threshold_generation(),
                requested: window.threshold_generation(),
            });
        }
        self.window = window;

        // Released bookkeeping below the threshold is no longer needed
        // for parent lookups.
        self.resolved
            .retain(|_, generation| !window.is_ancient(*generation));

        self.purge_ancient_orphans();

        // The maps cannot be modified while they are being scanned, so
        // the ancient parents are collected first and acted on after.
        let ancient_parents: Vec<EventHash> = self
            .waiting_on
            .iter()
            .filter(|(_, parent)| window.is_ancient(parent.generation))
            .map(|(hash, _)| *hash)
            .collect();

        let mut released = Vec::new();
        for parent_hash in ancient_parents {
            if let Some(parent) = self.waiting_on.remove(&parent_hash) {
                self.missing_parent_became_ancient(parent_hash, parent, &mut released);
            }
        }
        self.stats.set_current_orphans(self.orphans.len());

        Ok(released)
    }

    /// Forget everything except the window threshold. Used when the
    /// local event history is discarded after reconnect; the caller is
    /// expected to also reset the intake counters.
    pub fn clear(&mut self) {
        self.resolved.clear();
        self.orphans.clear();
        self.waiting_on.clear();
        self.next_arrival_sequence = 0;
        self.stats.set_current_orphans(0);
    }

    /// Number of events currently buffered as orphans
    pub fn orphan_count(&self) -> usize {
        self.orphans.len()
    }

    /// Number of released events still tracked for parent lookups
    pub fn resolved_count(&self) -> usize {
        self.resolved.len()
    }

    /// The current non-ancient window
    pub fn window(&self) -> NonAncientWindow {
        self.window
    }

    /// Parents of `event` that are neither released nor ancient
    fn missing_parents(&self, event: &GossipEvent) -> HashSet<EventHash> {
        event
            .parents()
            .filter(|parent| {
                !self.resolved.contains_key(&parent.hash)
                    && !self.window.is_ancient(parent.generation)
            })
            .map(|parent| parent.hash)
            .collect()
    }

    /// Release `event` and cascade through every orphan that was
    /// waiting on it, directly or transitively.
    ///
    /// Uses an explicit worklist rather than recursion so an
    /// adversarially long orphan chain cannot exhaust the call stack.
    fn release_cascade(&mut self, event: GossipEvent, released: &mut Vec<GossipEvent>) {
        let mut worklist = vec![event];

        while let Some(event) = worklist.pop() {
            let hash = event.hash();
            self.resolved.insert(hash, event.generation());
            self.counter.decrement(event.sender());
            self.stats.record_released();
            released.push(event);

            let Some(parent) = self.waiting_on.remove(&hash) else {
                continue;
            };
            for waiter_hash in parent.waiters {
                let Some(mut orphan) = self.orphans.remove(&waiter_hash) else {
                    continue;
                };
                orphan.missing.remove(&hash);
                if orphan.missing.is_empty() {
                    worklist.push(orphan.event);
                } else {
                    self.orphans.insert(waiter_hash, orphan);
                }
            }
        }
    }

    /// Drop every orphan whose own generation fell below the window.
    /// Purged orphans are forgotten, not released.
    fn purge_ancient_orphans(&mut self) {
        let purged: Vec<EventHash> = self
            .orphans
            .iter()
            .filter(|(_, orphan)| self.window.is_ancient(orphan.event.generation()))
            .map(|(hash, _)| *hash)
            .collect();

        for hash in purged {
            let Some(orphan) = self.orphans.remove(&hash) else {
                continue;
            };
            for parent_hash in &orphan.missing {
                let now_empty = match self.waiting_on.get_mut(parent_hash) {
                    Some(parent) => {
                        parent.waiters.remove(&hash);
                        parent.waiters.is_empty()
                    }
                    None => false,
                };
                if now_empty {
                    self.waiting_on.remove(parent_hash);
                }
            }
            self.counter.decrement(orphan.event.sender());
            self.stats.record_purged();
        }
    }

    /// A missing parent became ancient: no valid event with that hash
    /// can exist within the window anymore, so every orphan waiting on
    /// it has the dependency removed, possibly cascading.
    fn missing_parent_became_ancient(
        &mut self,
        parent_hash: EventHash,
        parent: MissingParent,
        released: &mut Vec<GossipEvent>,
    ) {
        for waiter_hash in parent.waiters {
            let Some(mut orphan) = self.orphans.remove(&waiter_hash) else {
                continue;
            };
            orphan.missing.remove(&parent_hash);
            if orphan.missing.is_empty() {
                self.release_cascade(orphan.event, released);
            } else {
                self.orphans.insert(waiter_hash, orphan);
            }
        }
    }
}
