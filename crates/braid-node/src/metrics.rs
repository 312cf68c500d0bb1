//! Prometheus metrics server

use crate::config::MetricsConfig;
use braid_intake::{IntakeEventCounter, IntakeStats};
use prometheus::{Encoder, IntGauge, Registry, TextEncoder};
use std::io::Write;
use std::net::SocketAddr;
use std::sync::Arc;

/// Metrics server
pub struct MetricsServer {
    /// Configuration
    config: MetricsConfig,
    /// Prometheus registry
    registry: Registry,
    /// Intake statistics source
    stats: Arc<IntakeStats>,
    /// Per-peer counter source
    counter: Arc<IntakeEventCounter>,
    gauges: IntakeGauges,
}

/// Gauges mirroring the intake pipeline state
struct IntakeGauges {
    orphan_buffer_size: IntGauge,
    events_released: IntGauge,
    events_ancient_dropped: IntGauge,
    events_duplicate: IntGauge,
    events_rejected: IntGauge,
    events_purged: IntGauge,
    events_unprocessed: IntGauge,
}

impl MetricsServer {
    /// Create new metrics server
    pub fn new(
        config: &MetricsConfig,
        stats: Arc<IntakeStats>,
        counter: Arc<IntakeEventCounter>,
    ) -> anyhow::Result<Self> {
        let registry = Registry::new();

        let gauges = IntakeGauges {
            orphan_buffer_size: IntGauge::new(
                "braid_orphan_buffer_size",
                "Events currently buffered as orphans",
            )?,
            events_released: IntGauge::new(
                "braid_events_released_total",
                "Events released to consensus in topological order",
            )?,
            events_ancient_dropped: IntGauge::new(
                "braid_events_ancient_dropped_total",
                "Events dropped on arrival for being ancient",
            )?,
            events_duplicate: IntGauge::new(
                "braid_events_duplicate_total",
                "Events ignored as duplicates",
            )?,
            events_rejected: IntGauge::new(
                "braid_events_rejected_total",
                "Malformed events rejected at intake",
            )?,
            events_purged: IntGauge::new(
                "braid_events_purged_total",
                "Orphans discarded when the non-ancient window passed them",
            )?,
            events_unprocessed: IntGauge::new(
                "braid_events_unprocessed",
                "Events in flight across all peers",
            )?,
        };

        registry.register(Box::new(gauges.orphan_buffer_size.clone()))?;
        registry.register(Box::new(gauges.events_released.clone()))?;
        registry.register(Box::new(gauges.events_ancient_dropped.clone()))?;
        registry.register(Box::new(gauges.events_duplicate.clone()))?;
        registry.register(Box::new(gauges.events_rejected.clone()))?;
        registry.register(Box::new(gauges.events_purged.clone()))?;
        registry.register(Box::new(gauges.events_unprocessed.clone()))?;

        Ok(Self {
            config: config.clone(),
            registry,
            stats,
            counter,
            gauges,
        })
    }

    /// Copy the live intake numbers into the gauges
    fn refresh(&self) {
        let snapshot = self.stats.snapshot();
        self.gauges
            .orphan_buffer_size
            .set(snapshot.current_orphans as i64);
        self.gauges.events_released.set(snapshot.released as i64);
        self.gauges
            .events_ancient_dropped
            .set(snapshot.ancient_dropped as i64);
        self.gauges.events_duplicate.set(snapshot.duplicates as i64);
        self.gauges.events_rejected.set(snapshot.rejected as i64);
        self.gauges.events_purged.set(snapshot.purged as i64);
        self.gauges
            .events_unprocessed
            .set(self.counter.total_unprocessed());
    }

    /// Run the metrics server
    pub async fn run(&self) -> anyhow::Result<()> {
        let addr: SocketAddr = self.config.address.parse()?;

        tracing::info!("Starting metrics server on {}", addr);

        // Use standard TCP listener
        let listener = std::net::TcpListener::bind(addr)?;
        listener.set_nonblocking(true)?;

        loop {
            match listener.accept() {
                Ok((mut stream, _)) => {
                    self.refresh();
                    let registry = self.registry.clone();

                    // Handle request synchronously in a blocking task
                    tokio::task::spawn_blocking(move || {
                        let mut buf = [0u8; 1024];
                        if let Ok(n) = std::io::Read::read(&mut stream, &mut buf) {
                            let request = String::from_utf8_lossy(&buf[..n]);

                            let response = if request.contains("GET /metrics") {
                                // Encode metrics
                                let encoder = TextEncoder::new();
                                let metric_families = registry.gather();
                                let mut buffer = Vec::new();
                                if encoder.encode(&metric_families, &mut buffer).is_err() {
                                    buffer.clear();
                                }

                                format!(
                                    "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: {}\r\n\r\n{}",
                                    buffer.len(),
                                    String::from_utf8_lossy(&buffer)
                                )
                            } else if request.contains("GET /health") {
                                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\n\r\n{\"status\":\"healthy\"}".to_string()
                            } else {
                                "HTTP/1.1 404 Not Found\r\n\r\n".to_string()
                            };

                            let _ = stream.write_all(response.as_bytes());
                        }
                    });
                }
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    // No incoming connections, sleep briefly
                    tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
                }
                Err(e) => {
                    tracing::error!("Accept error: {}", e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gauges_track_stats() {
        let stats = Arc::new(IntakeStats::new());
        let counter = Arc::new(IntakeEventCounter::new());
        let server =
            MetricsServer::new(&MetricsConfig::default(), stats.clone(), counter).unwrap();

        stats.record_released();
        stats.record_released();
        stats.set_current_orphans(5);
        server.refresh();

        assert_eq!(server.gauges.events_released.get(), 2);
        assert_eq!(server.gauges.orphan_buffer_size.get(), 5);
    }
}
