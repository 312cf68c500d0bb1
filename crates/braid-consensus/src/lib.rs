//! # Braid Consensus
//!
//! Interfaces between the intake pipeline and the virtual-voting
//! consensus collaborator. The voting algorithm itself lives outside
//! this workspace; this crate carries the bookkeeping values the two
//! sides exchange, most importantly the synthetic snapshot used to
//! resume consensus after a reconnect without replaying history.

pub mod snapshot;

pub use snapshot::*;
