//! Sequential intake stage
//!
//! The orphan buffer is order-sensitive state with no internal locking;
//! every mutation must come from one sequential execution context. This
//! module provides that context: a single tokio task that owns the
//! buffer and drains one bounded command channel. Gossip threads and
//! the consensus collaborator talk to it through a cloneable
//! [`IntakeHandle`].

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use braid_core::error::{BraidError, Result};
use braid_core::event::GossipEvent;
use braid_core::types::NodeId;
use braid_core::window::NonAncientWindow;

use crate::counter::IntakeEventCounter;
use crate::orphan_buffer::OrphanBuffer;
use crate::stats::IntakeStats;

/// Downstream consumer of the topologically ordered event stream
#[async_trait]
pub trait ConsensusSink: Send + Sync + 'static {
    /// Receive one released event. Events arrive strictly after their
    /// parents.
    async fn accept(&self, event: GossipEvent);
}

#[async_trait]
impl ConsensusSink for mpsc::Sender<GossipEvent> {
    async fn accept(&self, event: GossipEvent) {
        if self.send(event).await.is_err() {
            tracing::warn!("released event dropped: consensus channel closed");
        }
    }
}

/// Commands applied to the buffer in arrival order
enum IntakeCommand {
    Event(GossipEvent),
    AdvanceWindow(NonAncientWindow),
    Clear,
}

/// Cloneable front door to the intake stage
#[derive(Clone)]
pub struct IntakeHandle {
    command_tx: mpsc::Sender<IntakeCommand>,
    counter: Arc<IntakeEventCounter>,
}

impl IntakeHandle {
    /// Submit one signature-verified event from the gossip layer.
    ///
    /// The sending peer's intake counter is incremented here and
    /// decremented when the event reaches its terminal outcome inside
    /// the buffer.
    pub async fn submit_event(&self, event: GossipEvent) -> Result<()> {
        let sender = event.sender();
        self.counter.increment(sender);
        if self
            .command_tx
            .send(IntakeCommand::Event(event))
            .await
            .is_err()
        {
            self.counter.decrement(sender);
            return Err(BraidError::IntakeClosed);
        }
        Ok(())
    }

    /// Push a window-advance notification from the consensus layer
    pub async fn advance_window(&self, window: NonAncientWindow) -> Result<()> {
        self.command_tx
            .send(IntakeCommand::AdvanceWindow(window))
            .await
            .map_err(|_| BraidError::IntakeClosed)
    }

    /// Discard all buffered history. Used after reconnect, together
    /// with [`IntakeEventCounter::reset`].
    pub async fn clear(&self) -> Result<()> {
        self.command_tx
            .send(IntakeCommand::Clear)
            .await
            .map_err(|_| BraidError::IntakeClosed)
    }

    /// Advisory backpressure signal for the gossip scheduler
    pub fn has_unprocessed_events(&self, peer: NodeId) -> bool {
        self.counter.has_unprocessed_events(peer)
    }
}

/// The one sequential execution context that owns the orphan buffer
pub struct IntakeStage {
    handle: IntakeHandle,
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl IntakeStage {
    /// Spawn the intake task. Released events are pushed into `sink`
    /// in topological order, within the same command that produced
    /// them.
    pub fn spawn<S: ConsensusSink>(
        channel_capacity: usize,
        counter: Arc<IntakeEventCounter>,
        stats: Arc<IntakeStats>,
        sink: S,
    ) -> Self {
        let (command_tx, mut command_rx) = mpsc::channel(channel_capacity);
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let handle = IntakeHandle {
            command_tx,
            counter: counter.clone(),
        };

        let task = tokio::spawn(async move {
            let mut buffer = OrphanBuffer::new(counter, stats);

            loop {
                tokio::select! {
                    command = command_rx.recv() => match command {
                        Some(command) => apply_command(&mut buffer, &sink, command).await,
                        None => break,
                    },
                    _ = shutdown_rx.recv() => {
                        // Stop accepting new commands, then drain what
                        // is already queued.
                        command_rx.close();
                        while let Some(command) = command_rx.recv().await {
                            apply_command(&mut buffer, &sink, command).await;
                        }
                        break;
                    }
                }
            }

            tracing::debug!("intake stage stopped");
        });

        Self {
            handle,
            shutdown_tx,
            task,
        }
    }

    /// Get a handle for submitting commands
    pub fn handle(&self) -> IntakeHandle {
        self.handle.clone()
    }

    /// Close the command channel, drain queued commands, and wait for
    /// the task to finish. Handles observe [`BraidError::IntakeClosed`]
    /// from then on.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        let _ = self.task.await;
    }
}

/// Apply one command to the buffer, forwarding released events
async fn apply_command<S: ConsensusSink>(
    buffer: &mut OrphanBuffer,
    sink: &S,
    command: IntakeCommand,
) {
    match command {
        IntakeCommand::Event(event) => {
            let hash = event.hash();
            match buffer.handle_event(event) {
                Ok(released) => {
                    for event in released {
                        sink.accept(event).await;
                    }
                }
                Err(err) => {
                    tracing::warn!(event = %hash, "rejected event: {}", err);
                }
            }
        }
        IntakeCommand::AdvanceWindow(window) => match buffer.set_non_ancient_window(window) {
            Ok(released) => {
                tracing::debug!(
                    threshold = window.threshold_generation(),
                    released = released.len(),
                    orphans = buffer.orphan_count(),
                    "advanced non-ancient window"
                );
                for event in released {
                    sink.accept(event).await;
                }
            }
            Err(err) => {
                // The consensus collaborator broke its monotonicity
                // invariant.
                tracing::error!("ignoring window update: {}", err);
            }
        },
        IntakeCommand::Clear => {
            buffer.clear();
            tracing::info!("orphan buffer cleared");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use braid_core::event::EventDescriptor;
    use braid_core::types::EventHash;

    fn node(seed: u8) -> NodeId {
        NodeId::new([seed; 32])
    }

    fn genesis(creator: u8, payload: &[u8]) -> GossipEvent {
        GossipEvent::builder()
            .creator(node(creator))
            .payload(payload.to_vec())
            .build()
            .unwrap()
    }

    fn spawn_stage() -> (
        IntakeStage,
        mpsc::Receiver<GossipEvent>,
        Arc<IntakeEventCounter>,
    ) {
        let counter = Arc::new(IntakeEventCounter::new());
        let stats = Arc::new(IntakeStats::new());
        let (released_tx, released_rx) = mpsc::channel(64);
        let stage = IntakeStage::spawn(64, counter.clone(), stats, released_tx);
        (stage, released_rx, counter)
    }

    #[tokio::test]
    async fn test_out_of_order_events_released_in_topological_order() {
        let (stage, mut released_rx, counter) = spawn_stage();
        let handle = stage.handle();

        let a = genesis(1, b"a");
        let b = GossipEvent::builder()
            .creator(node(1))
            .self_parent(a.descriptor())
            .build()
            .unwrap();

        handle.submit_event(b.clone()).await.unwrap();
        handle.submit_event(a.clone()).await.unwrap();

        assert_eq!(released_rx.recv().await.unwrap().hash(), a.hash());
        assert_eq!(released_rx.recv().await.unwrap().hash(), b.hash());

        stage.shutdown().await;
        assert_eq!(counter.total_unprocessed(), 0);
    }

    #[tokio::test]
    async fn test_window_advance_flows_through_stage() {
        let (stage, mut released_rx, counter) = spawn_stage();
        let handle = stage.handle();

        // Orphan waiting on a parent that becomes ancient.
        let missing = EventDescriptor::new(EventHash::from_content(b"gone"), node(2), 2);
        let orphan = GossipEvent::builder()
            .creator(node(1))
            .self_parent(missing)
            .build()
            .unwrap();

        handle.submit_event(orphan.clone()).await.unwrap();
        handle
            .advance_window(NonAncientWindow::new(3))
            .await
            .unwrap();

        assert_eq!(released_rx.recv().await.unwrap().hash(), orphan.hash());

        stage.shutdown().await;
        assert_eq!(counter.total_unprocessed(), 0);
    }

    #[tokio::test]
    async fn test_clear_resets_history() {
        let (stage, mut released_rx, _) = spawn_stage();
        let handle = stage.handle();

        let a = genesis(1, b"a");
        handle.submit_event(a.clone()).await.unwrap();
        assert_eq!(released_rx.recv().await.unwrap().hash(), a.hash());

        handle.clear().await.unwrap();
        handle.submit_event(a.clone()).await.unwrap();
        assert_eq!(released_rx.recv().await.unwrap().hash(), a.hash());

        stage.shutdown().await;
    }

    #[tokio::test]
    async fn test_submit_after_shutdown_fails() {
        let (stage, _released_rx, counter) = spawn_stage();
        let handle = stage.handle();
        stage.shutdown().await;

        let err = handle.submit_event(genesis(1, b"a")).await.unwrap_err();
        assert_eq!(err, BraidError::IntakeClosed);
        assert_eq!(counter.total_unprocessed(), 0);
    }
}
