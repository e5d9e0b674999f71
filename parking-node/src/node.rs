/**
 * NODE RUNTIME - Boucle unique du noeud relais
 *
 * ROLE :
 * Owns the aggregation store and runs both flows on one task:
 * - mesh events (receive → decode → store), as they arrive
 * - trigger ticks (sample → edge → flush downstream), on a fixed interval
 *
 * Neither flow can interleave with the other, so the store is never seen
 * half-updated. A trigger edge that falls between two samples is lost; edges
 * are not queued.
 */

use crate::codec::{decode, WireFormat};
use crate::gateway::{MeshEvent, MeshHandler};
use crate::health::NodeStats;
use crate::models::PeerId;
use crate::publisher::{FlushOutcome, Publisher};
use crate::store::SectionStore;
use crate::trigger::{TriggerInput, TriggerMonitor};
use std::io::Write;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

pub struct NodeRuntime<S, W, T>
where
    S: SectionStore,
    W: Write,
    T: TriggerInput,
{
    store: S,
    format: WireFormat,
    monitor: TriggerMonitor,
    input: T,
    publisher: Publisher<W>,
    stats: NodeStats,
}

impl<S, W, T> NodeRuntime<S, W, T>
where
    S: SectionStore,
    W: Write,
    T: TriggerInput,
{
    pub fn new(store: S, format: WireFormat, input: T, publisher: Publisher<W>, stats: NodeStats) -> Self {
        Self {
            store,
            format,
            monitor: TriggerMonitor::new(),
            input,
            publisher,
            stats,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// One scheduler tick: sample the trigger and flush on a falling edge.
    ///
    /// Returns the flush outcome when a flush succeeded during this tick.
    pub fn tick(&mut self) -> Option<FlushOutcome> {
        let level = match self.input.sample() {
            Ok(level) => level,
            Err(e) => {
                warn!("trigger sample skipped: {}", e);
                return None;
            }
        };
        if !self.monitor.poll(level) {
            return None;
        }

        info!("button pressed !");
        self.stats.record_trigger();
        match self.publisher.flush(&mut self.store) {
            Ok(outcome) => {
                self.stats.record_flush(true);
                info!(
                    "flushed {} sections downstream{}",
                    outcome.records,
                    if outcome.cleared { ", store cleared" } else { "" }
                );
                Some(outcome)
            }
            Err(e) => {
                self.stats.record_flush(false);
                error!("downstream flush failed: {}", e);
                None
            }
        }
    }

    /// Run until the mesh event channel closes.
    pub async fn run(mut self, mut events: mpsc::Receiver<MeshEvent>, tick: Duration) {
        let mut ticker = tokio::time::interval(tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => self.dispatch(event),
                    None => {
                        info!("mesh event channel closed, stopping node runtime");
                        break;
                    }
                },
                _ = ticker.tick() => {
                    self.tick();
                }
            }
        }
    }
}

impl<S, W, T> MeshHandler for NodeRuntime<S, W, T>
where
    S: SectionStore,
    W: Write,
    T: TriggerInput,
{
    fn on_receive(&mut self, from: PeerId, payload: &str) {
        info!("Received from {}: msg={}", from, payload);

        let decoded = decode(payload, self.format);
        if decoded.discarded > 0 {
            debug!("dropped {} incomplete group(s) from {}", decoded.discarded, from);
        }
        let applied = decoded.records.len();
        for (id, metrics) in decoded.records {
            self.store.put(id, metrics);
        }
        self.stats.record_message(applied, decoded.discarded);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RawMessage, SectionMetrics};
    use crate::publisher::{ReportFormat, RetentionPolicy};
    use crate::store::SectionMap;
    use crate::trigger::{Level, TriggerError};
    use parking_devkit::{CaptureSink, ScriptedTrigger};

    struct Scripted(ScriptedTrigger);

    impl TriggerInput for Scripted {
        fn sample(&mut self) -> Result<Level, TriggerError> {
            Ok(Level::from_raw(self.0.next_level()))
        }
    }

    fn runtime(
        levels: &[bool],
        format: WireFormat,
        retention: RetentionPolicy,
    ) -> (NodeRuntime<SectionMap, CaptureSink, Scripted>, CaptureSink) {
        let sink = CaptureSink::new();
        let publisher = Publisher::new(
            sink.clone(),
            ReportFormat { wire: format, ..ReportFormat::default() },
            retention,
        );
        let input = Scripted(ScriptedTrigger::from_levels(levels));
        let rt = NodeRuntime::new(SectionMap::new(), format, input, publisher, NodeStats::new());
        (rt, sink)
    }

    #[test]
    fn test_receive_applies_records_in_order() {
        let (mut rt, _) = runtime(&[], WireFormat::Grouped, RetentionPolicy::Clear);
        rt.on_receive(7, "A 3 10 2 B 5 0 1 A 4 0 0");

        assert_eq!(rt.store().len(), 2);
        assert_eq!(rt.store().get("A"), Some(SectionMetrics::new(4, 0, 0)));
        assert_eq!(rt.store().get("B"), Some(SectionMetrics::new(5, 0, 1)));
    }

    #[test]
    fn test_malformed_message_leaves_store_unchanged() {
        let (mut rt, _) = runtime(&[], WireFormat::Grouped, RetentionPolicy::Clear);
        rt.on_receive(7, "A 1 1 1");
        rt.on_receive(7, "A");

        assert_eq!(rt.store().snapshot(), vec![("A".to_string(), SectionMetrics::new(1, 1, 1))]);
    }

    #[test]
    fn test_later_peer_overwrites_earlier_peer() {
        let (mut rt, _) = runtime(&[], WireFormat::Grouped, RetentionPolicy::Clear);
        rt.dispatch(MeshEvent::Received(RawMessage::new(1, "Roof 10 0 0")));
        rt.dispatch(MeshEvent::Received(RawMessage::new(2, "Roof 3 1 1")));

        assert_eq!(rt.store().get("Roof"), Some(SectionMetrics::new(3, 1, 1)));
    }

    #[test]
    fn test_trigger_edge_flushes_once() {
        let (mut rt, sink) = runtime(&[true, false, false, true], WireFormat::Grouped, RetentionPolicy::Clear);
        rt.on_receive(1, "A 3 10 2 B 5 0 1");

        let flushes: Vec<_> = (0..4).filter_map(|_| rt.tick()).collect();
        assert_eq!(flushes, vec![FlushOutcome { records: 2, cleared: true }]);
        assert_eq!(sink.lines(), vec!["A 3 10 2", "B 5 0 1", "END"]);
        assert!(rt.store().is_empty());
    }

    #[test]
    fn test_second_press_without_news_sends_sentinel() {
        let (mut rt, sink) = runtime(&[false, true, false], WireFormat::Grouped, RetentionPolicy::Clear);
        rt.on_receive(1, "A 3 10 2");
        for _ in 0..3 {
            rt.tick();
        }
        assert_eq!(sink.lines(), vec!["A 3 10 2", "END", "NO"]);
    }

    #[test]
    fn test_legacy_node_end_to_end() {
        let (mut rt, sink) = runtime(&[false], WireFormat::Legacy, RetentionPolicy::Retain);
        rt.on_receive(5, "A 5");
        rt.tick();

        assert_eq!(rt.store().get("A"), Some(SectionMetrics::new(5, 0, 0)));
        assert_eq!(sink.lines(), vec!["A 5", "END"]);
    }

    #[test]
    fn test_lifecycle_events_do_not_touch_store() {
        let (mut rt, sink) = runtime(&[], WireFormat::Grouped, RetentionPolicy::Clear);
        rt.dispatch(MeshEvent::NewConnection(9));
        rt.dispatch(MeshEvent::ConnectionsChanged);
        rt.dispatch(MeshEvent::TimeAdjusted(120));

        assert!(rt.store().is_empty());
        assert!(sink.lines().is_empty());
    }

    #[tokio::test]
    async fn test_run_stops_when_mesh_channel_closes() {
        let (rt, _) = runtime(&[], WireFormat::Grouped, RetentionPolicy::Clear);
        let (tx, rx) = mpsc::channel(4);
        tx.send(MeshEvent::Received(RawMessage::new(1, "A 1 0 0"))).await.unwrap();
        drop(tx);

        tokio::time::timeout(Duration::from_secs(1), rt.run(rx, Duration::from_millis(5)))
            .await
            .expect("runtime should stop once the channel is closed");
    }
}
