//! Intake pipeline statistics
//!
//! Shared atomic counters updated by the orphan buffer and read by the
//! metrics exporter. The buffer is single-writer; the atomics exist so
//! observers on other threads can read without coordination.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Running totals for the intake pipeline
#[derive(Default)]
pub struct IntakeStats {
    current_orphans: AtomicUsize,
    released: AtomicU64,
    ancient_dropped: AtomicU64,
    duplicates: AtomicU64,
    rejected: AtomicU64,
    purged: AtomicU64,
}

impl IntakeStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_current_orphans(&self, count: usize) {
        self.current_orphans.store(count, Ordering::Relaxed);
    }

    pub fn record_released(&self) {
        self.released.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_ancient_dropped(&self) {
        self.ancient_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_duplicate(&self) {
        self.duplicates.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_purged(&self) {
        self.purged.fetch_add(1, Ordering::Relaxed);
    }

    /// Consistent-enough view of all counters for export or logging
    pub fn snapshot(&self) -> IntakeStatsSnapshot {
        IntakeStatsSnapshot {
            current_orphans: self.current_orphans.load(Ordering::Relaxed),
            released: self.released.load(Ordering::Relaxed),
            ancient_dropped: self.ancient_dropped.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            purged: self.purged.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`IntakeStats`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IntakeStatsSnapshot {
    /// Events currently buffered as orphans
    pub current_orphans: usize,
    /// Events released downstream in topological order
    pub released: u64,
    /// Events dropped on arrival for being ancient
    pub ancient_dropped: u64,
    /// Events ignored because their hash was already seen
    pub duplicates: u64,
    /// Malformed events rejected at the door
    pub rejected: u64,
    /// Orphans discarded when the window passed them
    pub purged: u64,
}

impl IntakeStatsSnapshot {
    /// Every event that entered the pipeline and reached a terminal
    /// outcome
    pub fn total_terminal(&self) -> u64 {
        self.released + self.ancient_dropped + self.duplicates + self.rejected + self.purged
    }
}
