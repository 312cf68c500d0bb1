//! Gossip events - the records exchanged between peers
//!
//! Every event references up to two prior events by hash: a self parent
//! (the creator's previous event) and an other parent (the event that
//! triggered this gossip exchange). Together these edges form the
//! hash-linked DAG that consensus later orders.

use serde::{Deserialize, Serialize};

use crate::error::{BraidError, Result};
use crate::types::{constants, EventHash, Generation, NodeId};

/// EventDescriptor - How an event refers to another event without
/// owning it
///
/// Carries enough metadata (generation) to judge ancientness of a
/// parent that was never received.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventDescriptor {
    /// Hash of the referenced event
    pub hash: EventHash,

    /// Creator of the referenced event
    pub creator: NodeId,

    /// Generation of the referenced event
    pub generation: Generation,
}

impl EventDescriptor {
    pub fn new(hash: EventHash, creator: NodeId, generation: Generation) -> Self {
        Self {
            hash,
            creator,
            generation,
        }
    }
}

/// GossipEvent - One event in the DAG
///
/// Immutable once built; the only field touched after construction is
/// the arrival sequence, stamped by the intake pipeline for
/// diagnostics.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GossipEvent {
    /// This event's own descriptor
    descriptor: EventDescriptor,

    /// The creator's previous event, if any
    self_parent: Option<EventDescriptor>,

    /// The event from another node that triggered this one, if any
    other_parent: Option<EventDescriptor>,

    /// The gossip peer that delivered this event to us; equals the
    /// creator for self-created events
    sender: NodeId,

    /// Opaque application payload (transactions)
    payload: Vec<u8>,

    /// Monotonic counter stamped at intake time; diagnostics only,
    /// never used for ordering decisions
    arrival_sequence: u64,
}

impl GossipEvent {
    /// Start building an event
    pub fn builder() -> GossipEventBuilder {
        GossipEventBuilder::default()
    }

    /// Assemble an event from already-decoded wire fields, without
    /// structural validation. The intake pipeline re-checks the
    /// no-self-loop invariant on every event, so transport decoders may
    /// pass untrusted data through here.
    pub fn from_parts(
        descriptor: EventDescriptor,
        self_parent: Option<EventDescriptor>,
        other_parent: Option<EventDescriptor>,
        sender: NodeId,
        payload: Vec<u8>,
    ) -> Self {
        Self {
            descriptor,
            self_parent,
            other_parent,
            sender,
            payload,
            arrival_sequence: 0,
        }
    }

    pub fn hash(&self) -> EventHash {
        self.descriptor.hash
    }

    pub fn creator(&self) -> NodeId {
        self.descriptor.creator
    }

    pub fn generation(&self) -> Generation {
        self.descriptor.generation
    }

    pub fn descriptor(&self) -> EventDescriptor {
        self.descriptor
    }

    pub fn self_parent(&self) -> Option<&EventDescriptor> {
        self.self_parent.as_ref()
    }

    pub fn other_parent(&self) -> Option<&EventDescriptor> {
        self.other_parent.as_ref()
    }

    /// Iterate over the existing parents, self parent first
    pub fn parents(&self) -> impl Iterator<Item = &EventDescriptor> {
        self.self_parent.iter().chain(self.other_parent.iter())
    }

    pub fn sender(&self) -> NodeId {
        self.sender
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// True for events with no parents
    pub fn is_genesis(&self) -> bool {
        self.self_parent.is_none() && self.other_parent.is_none()
    }

    pub fn arrival_sequence(&self) -> u64 {
        self.arrival_sequence
    }

    /// Stamp the intake arrival sequence. Called once by the intake
    /// pipeline.
    pub fn set_arrival_sequence(&mut self, sequence: u64) {
        self.arrival_sequence = sequence;
    }

    /// Check the structural invariant that an event never lists itself
    /// as a parent
    pub fn validate_structure(&self) -> Result<()> {
        for parent in self.parents() {
            if parent.hash == self.descriptor.hash {
                return Err(BraidError::SelfReferentialParent(self.descriptor.hash));
            }
        }
        Ok(())
    }
}

/// Builder for gossip events
///
/// Computes the generation from the parents and the event hash from
/// all identity fields.
#[derive(Default)]
pub struct GossipEventBuilder {
    creator: Option<NodeId>,
    sender: Option<NodeId>,
    self_parent: Option<EventDescriptor>,
    other_parent: Option<EventDescriptor>,
    payload: Vec<u8>,
}

impl GossipEventBuilder {
    pub fn creator(mut self, creator: NodeId) -> Self {
        self.creator = Some(creator);
        self
    }

    /// The peer the event was received from; defaults to the creator
    pub fn sender(mut self, sender: NodeId) -> Self {
        self.sender = Some(sender);
        self
    }

    pub fn self_parent(mut self, parent: EventDescriptor) -> Self {
        self.self_parent = Some(parent);
        self
    }

    pub fn other_parent(mut self, parent: EventDescriptor) -> Self {
        self.other_parent = Some(parent);
        self
    }

    pub fn payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = payload;
        self
    }

    pub fn build(self) -> Result<GossipEvent> {
        let creator = self
            .creator
            .ok_or_else(|| BraidError::InvalidEvent("creator is required".to_string()))?;
        let sender = self.sender.unwrap_or(creator);

        let generation = self
            .self_parent
            .iter()
            .chain(self.other_parent.iter())
            .map(|parent| parent.generation)
            .max()
            .map(|max_parent_generation| max_parent_generation + 1)
            .unwrap_or(constants::FIRST_GENERATION);

        let hash = Self::compute_hash(
            &creator,
            generation,
            self.self_parent.as_ref(),
            self.other_parent.as_ref(),
            &self.payload,
        );

        let event = GossipEvent {
            descriptor: EventDescriptor::new(hash, creator, generation),
            self_parent: self.self_parent,
            other_parent: self.other_parent,
            sender,
            payload: self.payload,
            arrival_sequence: 0,
        };
        event.validate_structure()?;
        Ok(event)
    }

    /// Compute the event hash over all identity fields
    fn compute_hash(
        creator: &NodeId,
        generation: Generation,
        self_parent: Option<&EventDescriptor>,
        other_parent: Option<&EventDescriptor>,
        payload: &[u8],
    ) -> EventHash {
        let mut hasher = blake3::Hasher::new();
        hasher.update(creator.as_bytes());
        hasher.update(&generation.to_le_bytes());
        if let Some(parent) = self_parent {
            hasher.update(parent.hash.as_bytes());
        }
        if let Some(parent) = other_parent {
            hasher.update(parent.hash.as_bytes());
        }
        hasher.update(payload);
        EventHash::new(*hasher.finalize().as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(seed: u8) -> NodeId {
        NodeId::new([seed; 32])
    }

    #[test]
    fn test_genesis_event() {
        let event = GossipEvent::builder()
            .creator(node(1))
            .payload(b"genesis".to_vec())
            .build()
            .unwrap();

        assert!(event.is_genesis());
        assert_eq!(event.generation(), constants::FIRST_GENERATION);
        assert_eq!(event.sender(), node(1));
        assert_eq!(event.parents().count(), 0);
    }

    #[test]
    fn test_generation_follows_max_parent() {
        let self_parent = EventDescriptor::new(EventHash::from_content(b"a"), node(1), 4);
        let other_parent = EventDescriptor::new(EventHash::from_content(b"b"), node(2), 7);

        let event = GossipEvent::builder()
            .creator(node(1))
            .self_parent(self_parent)
            .other_parent(other_parent)
            .build()
            .unwrap();

        assert_eq!(event.generation(), 8);
    }

    #[test]
    fn test_parents_self_parent_first() {
        let self_parent = EventDescriptor::new(EventHash::from_content(b"a"), node(1), 1);
        let other_parent = EventDescriptor::new(EventHash::from_content(b"b"), node(2), 1);

        let event = GossipEvent::builder()
            .creator(node(1))
            .self_parent(self_parent)
            .other_parent(other_parent)
            .build()
            .unwrap();

        let parents: Vec<_> = event.parents().collect();
        assert_eq!(parents, vec![&self_parent, &other_parent]);
    }

    #[test]
    fn test_distinct_payloads_distinct_hashes() {
        let first = GossipEvent::builder()
            .creator(node(1))
            .payload(b"one".to_vec())
            .build()
            .unwrap();
        let second = GossipEvent::builder()
            .creator(node(1))
            .payload(b"two".to_vec())
            .build()
            .unwrap();

        assert_ne!(first.hash(), second.hash());
    }

    #[test]
    fn test_sender_defaults_to_creator() {
        let event = GossipEvent::builder().creator(node(3)).build().unwrap();
        assert_eq!(event.sender(), event.creator());

        let relayed = GossipEvent::builder()
            .creator(node(3))
            .sender(node(9))
            .payload(b"x".to_vec())
            .build()
            .unwrap();
        assert_eq!(relayed.sender(), node(9));
    }
}
