//! # Braid Intake
//!
//! The event intake pipeline: receives gossip events in arbitrary
//! arrival order from many peers and hands them to consensus in
//! topological order.
//!
//! ## Pipeline
//!
//! ```text
//!  gossip peers ──► IntakeHandle ──► IntakeStage ──► OrphanBuffer ──► consensus
//!                       │                (one task)       │
//!                       └── IntakeEventCounter ◄──────────┘
//!                           (per-peer backpressure)
//! ```
//!
//! The [`OrphanBuffer`] holds back events whose parents have not
//! arrived, releases them strictly after their parents, and discards
//! events that aged out of the non-ancient window. The
//! [`IntakeEventCounter`] tracks per-peer in-flight events so the
//! gossip scheduler can throttle peers with too much unresolved work.

pub mod counter;
pub mod orphan_buffer;
pub mod pipeline;
pub mod stats;

pub use counter::*;
pub use orphan_buffer::*;
pub use pipeline::*;
pub use stats::*;
