//! # Braid Node
//!
//! Node runtime for Braid: configuration, the Prometheus metrics
//! endpoint, and the wiring that connects the gossip transport, the
//! sequential intake stage, and the consensus collaborator.

pub mod config;
pub mod metrics;
pub mod node;

pub use config::NodeConfig;
pub use metrics::MetricsServer;
pub use node::{BraidNode, NodeState};
