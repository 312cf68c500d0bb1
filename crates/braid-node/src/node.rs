//! Braid node implementation
//!
//! Wires the sequential intake stage to the collaborators around it:
//! the gossip transport submits events through an [`IntakeHandle`], the
//! consensus collaborator drains the released-events channel and pushes
//! window advances back, and the metrics server exposes the pipeline's
//! state.

use crate::config::NodeConfig;
use crate::metrics::MetricsServer;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::signal;
use tokio::sync::mpsc;

use braid_consensus::SyntheticSnapshot;
use braid_core::error::Result;
use braid_core::event::GossipEvent;
use braid_intake::{IntakeEventCounter, IntakeHandle, IntakeStage, IntakeStats};

/// Node state
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeState {
    /// Node is starting up
    Starting,
    /// Node is running normally
    Running,
    /// Node is shutting down
    Stopping,
    /// Node has stopped
    Stopped,
}

/// Braid node
pub struct BraidNode {
    /// Configuration
    config: NodeConfig,
    /// Node state
    state: Arc<RwLock<NodeState>>,
    /// Per-peer in-flight counters, shared with the gossip scheduler
    counter: Arc<IntakeEventCounter>,
    /// Intake pipeline statistics
    stats: Arc<IntakeStats>,
    /// The running intake stage
    stage: Option<IntakeStage>,
    /// Released events awaiting the consensus collaborator
    released_rx: Option<mpsc::Receiver<GossipEvent>>,
}

impl BraidNode {
    /// Create a new node
    pub fn new(config: NodeConfig) -> Self {
        Self {
            config,
            state: Arc::new(RwLock::new(NodeState::Starting)),
            counter: Arc::new(IntakeEventCounter::new()),
            stats: Arc::new(IntakeStats::new()),
            stage: None,
            released_rx: None,
        }
    }

    /// Get current state
    pub fn state(&self) -> NodeState {
        self.state.read().clone()
    }

    /// Spawn the intake stage. Idempotent; the stage runs until
    /// [`shutdown`](Self::shutdown).
    pub fn start(&mut self) {
        if self.stage.is_some() {
            return;
        }

        let (released_tx, released_rx) =
            mpsc::channel(self.config.intake.released_channel_capacity);
        let stage = IntakeStage::spawn(
            self.config.intake.command_channel_capacity,
            self.counter.clone(),
            self.stats.clone(),
            released_tx,
        );

        self.stage = Some(stage);
        self.released_rx = Some(released_rx);
        *self.state.write() = NodeState::Running;

        tracing::info!(
            chain_id = %self.config.node.chain_id,
            "intake pipeline started"
        );
    }

    /// Handle for the gossip transport to submit events and for the
    /// consensus collaborator to push window advances
    pub fn intake_handle(&self) -> Option<IntakeHandle> {
        self.stage.as_ref().map(IntakeStage::handle)
    }

    /// Take the topologically ordered event stream. Consumed once, by
    /// the consensus collaborator's intake side.
    pub fn take_released(&mut self) -> Option<mpsc::Receiver<GossipEvent>> {
        self.released_rx.take()
    }

    /// Per-peer backpressure counters, shared with the gossip
    /// scheduler
    pub fn intake_counter(&self) -> Arc<IntakeEventCounter> {
        self.counter.clone()
    }

    /// Intake statistics
    pub fn intake_stats(&self) -> Arc<IntakeStats> {
        self.stats.clone()
    }

    /// Discard all buffered event history and zero the per-peer
    /// counters. Used after a reconnect, before re-seeding consensus
    /// with a synthetic snapshot.
    pub async fn clear_intake(&self) -> Result<()> {
        if let Some(handle) = self.intake_handle() {
            handle.clear().await?;
        }
        self.counter.reset();
        Ok(())
    }

    /// Build the bootstrap snapshot handed to consensus after a
    /// reconnect, using this node's configured non-ancient round span
    pub fn bootstrap_snapshot(
        &self,
        round: u64,
        last_consensus_order: u64,
        round_timestamp: DateTime<Utc>,
        judge: &GossipEvent,
    ) -> SyntheticSnapshot {
        SyntheticSnapshot::generate(
            round,
            last_consensus_order,
            round_timestamp,
            self.config.consensus.non_ancient_round_span,
            judge,
        )
    }

    /// Run the node until a shutdown signal arrives
    pub async fn run(&mut self) -> anyhow::Result<()> {
        tracing::info!("Starting Braid node...");

        self.start();

        // Start metrics server
        let metrics_handle = if self.config.metrics.enabled {
            let metrics_server = MetricsServer::new(
                &self.config.metrics,
                self.stats.clone(),
                self.counter.clone(),
            )?;
            Some(tokio::spawn(async move {
                if let Err(e) = metrics_server.run().await {
                    tracing::error!("Metrics server error: {}", e);
                }
            }))
        } else {
            None
        };

        tracing::info!("Chain ID: {}", self.config.node.chain_id);
        tracing::info!("Node name: {}", self.config.node.name);
        if self.config.metrics.enabled {
            tracing::info!("Metrics: http://{}/metrics", self.config.metrics.address);
        }
        tracing::info!("Press Ctrl+C to stop the node");

        Self::wait_for_shutdown().await;

        *self.state.write() = NodeState::Stopping;
        tracing::info!("Shutting down...");

        if let Some(stage) = self.stage.take() {
            stage.shutdown().await;
        }
        if let Some(handle) = metrics_handle {
            handle.abort();
        }

        *self.state.write() = NodeState::Stopped;
        tracing::info!("Node stopped");

        Ok(())
    }

    /// Wait for shutdown signal
    async fn wait_for_shutdown() {
        let ctrl_c = async {
            if let Err(e) = signal::ctrl_c().await {
                tracing::error!("Failed to install Ctrl+C handler: {}", e);
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => tracing::error!("Failed to install signal handler: {}", e),
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use braid_core::types::NodeId;

    fn event(creator: u8, payload: &[u8]) -> GossipEvent {
        GossipEvent::builder()
            .creator(NodeId::new([creator; 32]))
            .payload(payload.to_vec())
            .build()
            .unwrap()
    }

    #[test]
    fn test_node_creation() {
        let node = BraidNode::new(NodeConfig::default());
        assert_eq!(node.state(), NodeState::Starting);
        assert!(node.intake_handle().is_none());
    }

    #[tokio::test]
    async fn test_events_flow_to_released_channel() {
        let mut node = BraidNode::new(NodeConfig::default());
        node.start();
        assert_eq!(node.state(), NodeState::Running);

        let handle = node.intake_handle().unwrap();
        let mut released = node.take_released().unwrap();

        let a = event(1, b"a");
        handle.submit_event(a.clone()).await.unwrap();
        assert_eq!(released.recv().await.unwrap().hash(), a.hash());
    }

    #[tokio::test]
    async fn test_clear_intake_resets_counters() {
        let mut node = BraidNode::new(NodeConfig::default());
        node.start();

        let handle = node.intake_handle().unwrap();
        let mut released = node.take_released().unwrap();

        let a = event(1, b"a");
        handle.submit_event(a.clone()).await.unwrap();
        released.recv().await.unwrap();

        node.clear_intake().await.unwrap();
        assert_eq!(node.intake_counter().total_unprocessed(), 0);

        // Previously released events are new again after the reset.
        handle.submit_event(a.clone()).await.unwrap();
        assert_eq!(released.recv().await.unwrap().hash(), a.hash());
    }

    #[test]
    fn test_bootstrap_snapshot_uses_configured_span() {
        let mut config = NodeConfig::default();
        config.consensus.non_ancient_round_span = 5;
        let node = BraidNode::new(config);

        let judge = event(1, b"judge");
        let snapshot = node.bootstrap_snapshot(10, 500, Utc::now(), &judge);
        assert_eq!(snapshot.min_gen_infos().len(), 5);
        assert_eq!(snapshot.next_consensus_order(), 501);
    }
}
