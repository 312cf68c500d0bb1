//! # Braid Core
//!
//! Core data structures for the Braid gossip ledger.
//!
//! This crate provides the fundamental building blocks:
//! - `GossipEvent` - One event in the DAG, referencing up to two parents
//! - `EventDescriptor` - Hash-based handle to an event
//! - `NonAncientWindow` - The moving boundary below which events are
//!   garbage-collected
//!
//! ## Architecture
//!
//! Braid organizes gossip into a hash-linked DAG: every event names the
//! creator's previous event (self parent) and the event that triggered
//! the exchange (other parent). Consensus later assigns the DAG a total
//! order; this crate only models identity and ancestry.
//!
//! ```text
//!      A₁ ──► A₂ ──► A₃            (self-parent edges)
//!        ╲      ╲
//!      B₁ ─► B₂ ─► B₃              (other-parent edges cross creators)
//! ```

pub mod error;
pub mod event;
pub mod types;
pub mod window;

pub use error::*;
pub use event::*;
pub use types::*;
pub use window::*;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::{BraidError, Result};
    pub use crate::event::{EventDescriptor, GossipEvent, GossipEventBuilder};
    pub use crate::types::{constants, EventHash, Generation, NodeId};
    pub use crate::window::NonAncientWindow;
}
