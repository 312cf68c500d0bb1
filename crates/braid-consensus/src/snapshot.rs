//! Synthetic consensus snapshots
//!
//! A node that just finished a full state transfer has no event
//! history to replay, but consensus still needs its round bookkeeping
//! seeded before it can make progress. A synthetic snapshot fabricates
//! that bookkeeping from a single representative "judge" event: every
//! round in the non-ancient span is conservatively assigned the
//! judge's generation, and the consensus order and timestamp floors
//! continue from the last values the network agreed on.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use braid_core::event::GossipEvent;
use braid_core::types::{constants, EventHash, Generation};

/// Minimum amount by which consensus timestamps advance between
/// consecutive events; keeps them strictly increasing
pub const MIN_TIMESTAMP_INCREMENT_NANOS: i64 = 1_000;

/// Minimum non-ancient generation recorded for one round
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinGenInfo {
    /// Consensus round
    pub round: u64,

    /// Lowest generation that was non-ancient in that round
    pub generation: Generation,
}

/// SyntheticSnapshot - compact bootstrap state for consensus
///
/// Created once per reconnect/restart and handed to the consensus
/// collaborator, which re-seeds its round bookkeeping from it instead
/// of replaying the historical event DAG. Immutable after creation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntheticSnapshot {
    /// The round the snapshot represents
    round: u64,

    /// Judge events of that round; synthetic snapshots carry exactly
    /// one
    judge_hashes: Vec<EventHash>,

    /// One entry per round in the non-ancient span ending at `round`
    min_gen_infos: Vec<MinGenInfo>,

    /// Consensus order the next event will receive
    next_consensus_order: u64,

    /// Floor for the next event's consensus timestamp
    minimum_timestamp_for_next_event: DateTime<Utc>,
}

impl SyntheticSnapshot {
    /// Fabricate a snapshot for `round` from a single judge event.
    ///
    /// Pure function: no history is consulted. Every round in
    /// `[max(1, round - non_ancient_round_span + 1), round]` is
    /// assigned the judge's generation, since no real per-round
    /// minimums exist anymore.
    pub fn generate(
        round: u64,
        last_consensus_order: u64,
        round_timestamp: DateTime<Utc>,
        non_ancient_round_span: u64,
        judge: &GossipEvent,
    ) -> Self {
        let oldest_relevant_round = round
            .saturating_sub(non_ancient_round_span)
            .saturating_add(1)
            .max(constants::ROUND_FIRST);

        let min_gen_infos = (oldest_relevant_round..=round)
            .map(|r| MinGenInfo {
                round: r,
                generation: judge.generation(),
            })
            .collect();

        Self {
            round,
            judge_hashes: vec![judge.hash()],
            min_gen_infos,
            next_consensus_order: last_consensus_order + 1,
            minimum_timestamp_for_next_event: round_timestamp
                + Duration::nanoseconds(MIN_TIMESTAMP_INCREMENT_NANOS),
        }
    }

    pub fn round(&self) -> u64 {
        self.round
    }

    pub fn judge_hashes(&self) -> &[EventHash] {
        &self.judge_hashes
    }

    pub fn min_gen_infos(&self) -> &[MinGenInfo] {
        &self.min_gen_infos
    }

    pub fn next_consensus_order(&self) -> u64 {
        self.next_consensus_order
    }

    pub fn minimum_timestamp_for_next_event(&self) -> DateTime<Utc> {
        self.minimum_timestamp_for_next_event
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use braid_core::event::EventDescriptor;
    use braid_core::types::NodeId;

    fn judge_with_generation(generation: Generation) -> GossipEvent {
        // A self parent one generation below yields the target
        // generation.
        GossipEvent::builder()
            .creator(NodeId::new([7; 32]))
            .self_parent(EventDescriptor::new(
                EventHash::from_content(b"parent"),
                NodeId::new([7; 32]),
                generation - 1,
            ))
            .build()
            .unwrap()
    }

    #[test]
    fn test_snapshot_covers_non_ancient_round_span() {
        let judge = judge_with_generation(42);
        let snapshot = SyntheticSnapshot::generate(10, 500, Utc::now(), 5, &judge);

        assert_eq!(snapshot.round(), 10);
        assert_eq!(snapshot.next_consensus_order(), 501);
        assert_eq!(snapshot.judge_hashes(), &[judge.hash()]);

        let rounds: Vec<u64> = snapshot.min_gen_infos().iter().map(|i| i.round).collect();
        assert_eq!(rounds, vec![6, 7, 8, 9, 10]);
        assert!(snapshot
            .min_gen_infos()
            .iter()
            .all(|info| info.generation == 42));
    }

    #[test]
    fn test_span_wider_than_history_clamps_to_first_round() {
        let judge = judge_with_generation(5);
        let snapshot = SyntheticSnapshot::generate(3, 0, Utc::now(), 26, &judge);

        let rounds: Vec<u64> = snapshot.min_gen_infos().iter().map(|i| i.round).collect();
        assert_eq!(rounds, vec![1, 2, 3]);
        assert_eq!(snapshot.next_consensus_order(), 1);
    }

    #[test]
    fn test_timestamp_strictly_after_round_timestamp() {
        let judge = judge_with_generation(9);
        let round_timestamp = Utc::now();
        let snapshot = SyntheticSnapshot::generate(4, 10, round_timestamp, 2, &judge);

        assert!(snapshot.minimum_timestamp_for_next_event() > round_timestamp);
        assert_eq!(
            (snapshot.minimum_timestamp_for_next_event() - round_timestamp)
                .num_nanoseconds()
                .unwrap(),
            MIN_TIMESTAMP_INCREMENT_NANOS
        );
    }

    #[test]
    fn test_snapshot_is_deterministic() {
        let judge = judge_with_generation(17);
        let timestamp = Utc::now();

        let first = SyntheticSnapshot::generate(8, 99, timestamp, 4, &judge);
        let second = SyntheticSnapshot::generate(8, 99, timestamp, 4, &judge);
        assert_eq!(first, second);
    }
}
