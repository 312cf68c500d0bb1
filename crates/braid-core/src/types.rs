//! Core identifier types for Braid
//!
//! Events and peers are identified by 32-byte BLAKE3 hashes; all
//! relationships in the event DAG are expressed through these handles
//! rather than owned references.

use serde::{Deserialize, Serialize};
use std::fmt;

/// EventHash - Unique identifier for an event, computed from a BLAKE3
/// hash of its content
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct EventHash {
    /// 256-bit BLAKE3 hash
    hash: [u8; 32],
}

impl EventHash {
    /// Create a new EventHash from raw bytes
    pub fn new(hash: [u8; 32]) -> Self {
        Self { hash }
    }

    /// Create EventHash from content using BLAKE3
    pub fn from_content(content: &[u8]) -> Self {
        let hash = blake3::hash(content);
        Self {
            hash: *hash.as_bytes(),
        }
    }

    /// Get the raw bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.hash
    }

    /// Convert to hex string
    pub fn to_hex(&self) -> String {
        hex::encode(self.hash)
    }

    /// Parse from hex string
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&bytes);
        Ok(Self { hash })
    }

    /// Zero/null EventHash
    pub const ZERO: Self = Self { hash: [0u8; 32] };
}

impl fmt::Debug for EventHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventHash({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for EventHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.to_hex()[..16])
    }
}

/// NodeId - Unique identifier for network nodes
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId {
    /// Derived from public key hash
    id: [u8; 32],
}

impl NodeId {
    pub fn new(id: [u8; 32]) -> Self {
        Self { id }
    }

    pub fn from_public_key(public_key: &[u8]) -> Self {
        let hash = blake3::hash(public_key);
        Self {
            id: *hash.as_bytes(),
        }
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.id
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.id)
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", &self.to_hex()[..12])
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.to_hex()[..12])
    }
}

/// Generation of an event: `1 + max(parent generations)`, bounding the
/// depth of the DAG below it
pub type Generation = u64;

/// System constants
pub mod constants {
    use super::Generation;

    /// Generation of an event with no parents
    pub const FIRST_GENERATION: Generation = 1;

    /// First consensus round
    pub const ROUND_FIRST: u64 = 1;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_hash_creation() {
        let content = b"test content";
        let hash = EventHash::from_content(content);

        assert_ne!(hash, EventHash::ZERO);
        assert_eq!(hash.as_bytes().len(), 32);
    }

    #[test]
    fn test_event_hash_hex_roundtrip() {
        let content = b"test content";
        let hash = EventHash::from_content(content);
        let hex = hash.to_hex();
        let parsed = EventHash::from_hex(&hex).unwrap();

        assert_eq!(hash, parsed);
    }

    #[test]
    fn test_node_id_from_public_key() {
        let public_key = [0u8; 32];
        let node_id = NodeId::from_public_key(&public_key);

        assert_eq!(node_id.as_bytes().len(), 32);
    }
}
