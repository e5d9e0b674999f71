use crate::models::PeerId;
use crate::store::SectionStore;
use rumqttc::{AsyncClient, QoS};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use time::OffsetDateTime;
use tokio::task;
use tracing::{error, info};

#[derive(Debug, Serialize, Deserialize)]
pub struct NodeHealth {
    pub node_id: PeerId,
    pub uptime_seconds: u64,
    pub sections_tracked: usize,
    pub messages_received: u64,
    pub records_applied: u64,
    pub groups_discarded: u64,
    pub triggers: u64,
    pub flushes: u64,
    pub flush_failures: u64,
    pub mesh_status: String,
    pub mesh_reconnects: u64,
    pub timestamp: String,
}

#[derive(Debug, Default)]
struct Counters {
    messages: AtomicU64,
    records: AtomicU64,
    discarded: AtomicU64,
    triggers: AtomicU64,
    flushes: AtomicU64,
    flush_failures: AtomicU64,
    reconnects: AtomicU64,
}

/// Node counters, shared by the runtime, the MQTT loop and the status publisher.
#[derive(Clone)]
pub struct NodeStats {
    start_time: Instant,
    counters: Arc<Counters>,
    mesh_status: Arc<parking_lot::Mutex<String>>,
}

impl Default for NodeStats {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeStats {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            counters: Arc::new(Counters::default()),
            mesh_status: Arc::new(parking_lot::Mutex::new("connecting".to_string())),
        }
    }

    pub fn record_message(&self, applied: usize, discarded: usize) {
        let c = &self.counters;
        c.messages.fetch_add(1, Ordering::Relaxed);
        c.records.fetch_add(applied as u64, Ordering::Relaxed);
        c.discarded.fetch_add(discarded as u64, Ordering::Relaxed);
    }

    pub fn record_trigger(&self) {
        self.counters.triggers.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_flush(&self, ok: bool) {
        let counter = if ok { &self.counters.flushes } else { &self.counters.flush_failures };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn mark_mesh_connected(&self) {
        *self.mesh_status.lock() = "connected".to_string();
    }

    pub fn mark_mesh_disconnected(&self) {
        *self.mesh_status.lock() = "disconnected".to_string();
    }

    pub fn increment_reconnects(&self) {
        self.counters.reconnects.fetch_add(1, Ordering::Relaxed);
        *self.mesh_status.lock() = "reconnecting".to_string();
    }

    pub fn get_health<S: SectionStore + ?Sized>(&self, node_id: PeerId, store: &S) -> NodeHealth {
        let c = &self.counters;
        NodeHealth {
            node_id,
            uptime_seconds: self.start_time.elapsed().as_secs(),
            sections_tracked: store.len(),
            messages_received: c.messages.load(Ordering::Relaxed),
            records_applied: c.records.load(Ordering::Relaxed),
            groups_discarded: c.discarded.load(Ordering::Relaxed),
            triggers: c.triggers.load(Ordering::Relaxed),
            flushes: c.flushes.load(Ordering::Relaxed),
            flush_failures: c.flush_failures.load(Ordering::Relaxed),
            mesh_status: self.mesh_status.lock().clone(),
            mesh_reconnects: c.reconnects.load(Ordering::Relaxed),
            timestamp: OffsetDateTime::now_utc()
                .format(&time::format_description::well_known::Rfc3339)
                .unwrap_or_default(),
        }
    }

    /// Log the node status every `interval`, and publish it as JSON on `topic`
    /// when a client is given.
    pub fn spawn_status_publisher<S>(
        &self,
        node_id: PeerId,
        store: S,
        publish_to: Option<(AsyncClient, String)>,
        interval: Duration,
    ) where
        S: SectionStore + Send + 'static,
    {
        let stats = self.clone();

        task::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let health = stats.get_health(node_id, &store);
                info!(
                    "[status] uptime {}s, sections {}, messages {}, flushes {}, mesh {}",
                    health.uptime_seconds,
                    health.sections_tracked,
                    health.messages_received,
                    health.flushes,
                    health.mesh_status
                );

                let Some((client, topic)) = &publish_to else { continue };
                match serde_json::to_string(&health) {
                    Ok(payload) => {
                        if let Err(e) = client.publish(topic.as_str(), QoS::AtLeastOnce, false, payload).await {
                            error!("[status] failed to publish: {:?}", e);
                        }
                    }
                    Err(e) => error!("[status] failed to serialize: {}", e),
                }
            }
        });
    }
}
