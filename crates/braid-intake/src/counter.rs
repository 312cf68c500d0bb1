//! Per-peer intake counters for backpressure
//!
//! Tracks how many events from each peer are somewhere in the intake
//! pipeline. The gossip scheduler polls these counters before
//! requesting more events from a peer, bounding how many unresolved
//! orphans a single slow or malicious peer can accumulate.
//!
//! Unlike the orphan buffer, the counters are safe for concurrent use
//! from many peer-handling threads: each peer's counter is an
//! independent atomic and the backpressure reads are advisory, so
//! slightly stale values are acceptable.

use std::sync::atomic::{AtomicI64, Ordering};

use dashmap::DashMap;

use braid_core::types::NodeId;

/// IntakeEventCounter - per-peer in-flight event counters
///
/// `increment` is called exactly once per event when it is handed to
/// the intake pipeline; `decrement` exactly once at its terminal
/// outcome (released, ancient-dropped, purged, duplicate-ignored, or
/// rejected).
#[derive(Default)]
pub struct IntakeEventCounter {
    counters: DashMap<NodeId, AtomicI64>,
}

impl IntakeEventCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that an event from `peer` entered the intake pipeline
    pub fn increment(&self, peer: NodeId) {
        self.counters
            .entry(peer)
            .or_default()
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Record that an event from `peer` reached a terminal outcome
    pub fn decrement(&self, peer: NodeId) {
        let Some(counter) = self.counters.get(&peer) else {
            tracing::warn!(peer = %peer, "intake counter decremented for unknown peer");
            return;
        };

        let previous = counter.fetch_sub(1, Ordering::Relaxed);
        if previous <= 0 {
            // A negative counter means an event exited the pipeline
            // twice; pin the counter back at zero.
            tracing::warn!(peer = %peer, "intake counter went negative, resetting to 0");
            counter.store(0, Ordering::Relaxed);
        }
    }

    /// True while any event from `peer` is still in the pipeline
    pub fn has_unprocessed_events(&self, peer: NodeId) -> bool {
        self.unprocessed_events(peer) > 0
    }

    /// Current in-flight count for `peer`
    pub fn unprocessed_events(&self, peer: NodeId) -> i64 {
        self.counters
            .get(&peer)
            .map(|counter| counter.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Sum of in-flight counts across all peers
    pub fn total_unprocessed(&self) -> i64 {
        self.counters
            .iter()
            .map(|entry| entry.load(Ordering::Relaxed))
            .sum()
    }

    /// Zero every counter. Used together with a buffer reset after
    /// reconnect.
    pub fn reset(&self) {
        for entry in self.counters.iter() {
            entry.store(0, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn node(seed: u8) -> NodeId {
        NodeId::new([seed; 32])
    }

    #[test]
    fn test_increment_decrement_balance() {
        let counter = IntakeEventCounter::new();
        let peer = node(1);

        counter.increment(peer);
        counter.increment(peer);
        assert_eq!(counter.unprocessed_events(peer), 2);
        assert!(counter.has_unprocessed_events(peer));

        counter.decrement(peer);
        counter.decrement(peer);
        assert_eq!(counter.unprocessed_events(peer), 0);
        assert!(!counter.has_unprocessed_events(peer));
    }

    #[test]
    fn test_counters_are_per_peer() {
        let counter = IntakeEventCounter::new();
        counter.increment(node(1));

        assert!(counter.has_unprocessed_events(node(1)));
        assert!(!counter.has_unprocessed_events(node(2)));
        assert_eq!(counter.total_unprocessed(), 1);
    }

    #[test]
    fn test_counter_never_goes_negative() {
        let counter = IntakeEventCounter::new();
        let peer = node(1);

        counter.increment(peer);
        counter.decrement(peer);
        counter.decrement(peer);
        assert_eq!(counter.unprocessed_events(peer), 0);
    }

    #[test]
    fn test_reset_zeroes_all_peers() {
        let counter = IntakeEventCounter::new();
        counter.increment(node(1));
        counter.increment(node(2));
        counter.increment(node(2));

        counter.reset();
        assert_eq!(counter.total_unprocessed(), 0);
    }

    #[test]
    fn test_concurrent_updates() {
        let counter = Arc::new(IntakeEventCounter::new());
        let mut handles = Vec::new();

        for seed in 0..4u8 {
            let counter = counter.clone();
            handles.push(std::thread::spawn(move || {
                let peer = node(seed % 2);
                for _ in 0..1_000 {
                    counter.increment(peer);
                    counter.decrement(peer);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(counter.total_unprocessed(), 0);
    }
}
