//! MQTT realisation of the mesh collaborator.
//!
//! Topic layout under the configured prefix:
//! - `<prefix>/nodes/<peerId>/sections` : section payloads in wire format
//! - `<prefix>/nodes/<peerId>/online`   : peer announcement
//! - `<prefix>/nodes/<peerId>/status`   : node status JSON (not consumed here)
//! - `<prefix>/time`                    : mesh clock offset in microseconds
//!
//! Broker connect/disconnect is reported as a connection change.

use crate::config::MeshConf;
use crate::gateway::{GatewayError, MeshEvent, MeshLink};
use crate::health::NodeStats;
use crate::models::RawMessage;
use rumqttc::{AsyncClient, Event, Incoming, MqttOptions, QoS};
use std::borrow::Cow;
use std::fmt::Display;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task;
use tracing::{debug, error, warn};

#[derive(Debug, Clone)]
pub struct Topics {
    prefix: String,
}

impl Topics {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }

    pub fn sections(&self, peer: impl Display) -> String {
        format!("{}/nodes/{}/sections", self.prefix, peer)
    }

    pub fn online(&self, peer: impl Display) -> String {
        format!("{}/nodes/{}/online", self.prefix, peer)
    }

    pub fn status(&self, peer: impl Display) -> String {
        format!("{}/nodes/{}/status", self.prefix, peer)
    }

    pub fn time(&self) -> String {
        format!("{}/time", self.prefix)
    }

    pub fn subscriptions(&self) -> [String; 3] {
        [self.sections("+"), self.online("+"), self.time()]
    }

    /// Map an incoming publish to a mesh event. Topics outside the layout,
    /// undecodable peer ids and bad time offsets give `None`.
    ///
    /// Section payloads are always delivered; invalid UTF-8 is replaced so the
    /// codec keeps whatever groups still parse.
    pub fn classify(&self, topic: &str, payload: &[u8]) -> Option<MeshEvent> {
        let rest = topic.strip_prefix(&self.prefix)?.strip_prefix('/')?;

        if rest == "time" {
            let txt = std::str::from_utf8(payload).ok()?;
            return match txt.trim().parse::<i32>() {
                Ok(offset) => Some(MeshEvent::TimeAdjusted(offset)),
                Err(_) => {
                    warn!("invalid time offset payload: {:?}", txt);
                    None
                }
            };
        }

        let mut parts = rest.split('/');
        let (Some("nodes"), Some(peer), Some(kind), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return None;
        };

        let Ok(peer) = peer.parse::<u32>() else {
            warn!("ignoring message from invalid peer id {:?} on {}", peer, topic);
            return None;
        };

        match kind {
            "sections" => {
                let txt = String::from_utf8_lossy(payload);
                if let Cow::Owned(_) = txt {
                    warn!("non UTF-8 bytes in section payload from {}", peer);
                }
                Some(MeshEvent::Received(RawMessage::new(peer, txt.into_owned())))
            }
            "online" => Some(MeshEvent::NewConnection(peer)),
            _ => None,
        }
    }
}

pub fn mqtt_options(mesh: &MeshConf, client_id: &str) -> MqttOptions {
    let mut opts = MqttOptions::new(client_id, &mesh.host, mesh.port);
    opts.set_keep_alive(Duration::from_secs(mesh.keep_alive_secs));
    opts
}

/// Spawn the MQTT event loop; mesh events are forwarded in arrival order.
///
/// The task stops once the receiving side of `events` is dropped.
pub fn spawn_mesh_listener(
    mesh: &MeshConf,
    client_id: &str,
    events: mpsc::Sender<MeshEvent>,
    stats: NodeStats,
) -> AsyncClient {
    let (client, mut eventloop) = AsyncClient::new(mqtt_options(mesh, client_id), 10);
    let topics = Topics::new(&mesh.prefix);
    let sub_client = client.clone();

    task::spawn(async move {
        let mut connected = false;
        loop {
            let event = match eventloop.poll().await {
                Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                    connected = true;
                    stats.mark_mesh_connected();
                    // resubscribe on every (re)connect
                    for topic in topics.subscriptions() {
                        if let Err(e) = sub_client.try_subscribe(topic.clone(), QoS::AtLeastOnce) {
                            error!("subscribe {} failed: {:?}", topic, e);
                        }
                    }
                    Some(MeshEvent::ConnectionsChanged)
                }
                Ok(Event::Incoming(Incoming::Publish(p))) => topics.classify(&p.topic, &p.payload),
                Ok(Event::Incoming(Incoming::Disconnect)) => {
                    connected = false;
                    stats.mark_mesh_disconnected();
                    Some(MeshEvent::ConnectionsChanged)
                }
                Ok(_) => None,
                Err(e) => {
                    error!("mesh MQTT error: {:?}", e);
                    stats.increment_reconnects();
                    let was_connected = std::mem::replace(&mut connected, false);
                    tokio::time::sleep(Duration::from_secs(2)).await;
                    was_connected.then_some(MeshEvent::ConnectionsChanged)
                }
            };

            if let Some(event) = event {
                if events.send(event).await.is_err() {
                    debug!("node runtime gone, stopping mesh listener");
                    break;
                }
            }
        }
    });

    client
}

/// Publishes this node's payloads on one topic.
#[derive(Clone)]
pub struct MqttMeshLink {
    client: AsyncClient,
    topic: String,
}

impl MqttMeshLink {
    pub fn new(client: AsyncClient, topic: impl Into<String>) -> Self {
        Self { client, topic: topic.into() }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}

impl MeshLink for MqttMeshLink {
    fn send(&self, payload: &str) -> Result<(), GatewayError> {
        self.client
            .try_publish(self.topic.clone(), QoS::AtLeastOnce, false, payload.as_bytes().to_vec())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topics() -> Topics {
        Topics::new("parking-mesh")
    }

    #[test]
    fn test_topic_layout() {
        let t = topics();
        assert_eq!(t.sections(12), "parking-mesh/nodes/12/sections");
        assert_eq!(t.online(12), "parking-mesh/nodes/12/online");
        assert_eq!(t.status(1), "parking-mesh/nodes/1/status");
        assert_eq!(
            t.subscriptions(),
            [
                "parking-mesh/nodes/+/sections".to_string(),
                "parking-mesh/nodes/+/online".to_string(),
                "parking-mesh/time".to_string(),
            ]
        );
    }

    #[test]
    fn test_classify_sections_payload_verbatim() {
        let ev = topics().classify("parking-mesh/nodes/3141/sections", b"A 3 10 2 B 5 0 1");
        assert_eq!(ev, Some(MeshEvent::Received(RawMessage::new(3141, "A 3 10 2 B 5 0 1"))));
    }

    #[test]
    fn test_classify_lifecycle_topics() {
        let t = topics();
        assert_eq!(t.classify("parking-mesh/nodes/8/online", b""), Some(MeshEvent::NewConnection(8)));
        assert_eq!(t.classify("parking-mesh/time", b"-1500"), Some(MeshEvent::TimeAdjusted(-1500)));
    }

    #[test]
    fn test_classify_ignores_foreign_and_invalid() {
        let t = topics();
        assert_eq!(t.classify("other-mesh/nodes/8/sections", b"A 1"), None);
        assert_eq!(t.classify("parking-mesh/nodes/eight/sections", b"A 1"), None);
        assert_eq!(t.classify("parking-mesh/nodes/8/status", b"{}"), None);
        assert_eq!(t.classify("parking-mesh/nodes/8/sections/extra", b"A 1"), None);
        assert_eq!(t.classify("parking-mesh/time", b"soon"), None);
    }

    #[test]
    fn test_invalid_utf8_keeps_leading_groups() {
        let t = topics();
        let Some(MeshEvent::Received(raw)) = t.classify("parking-mesh/nodes/4/sections", b"A 3 10 2 B \xff 0 1")
        else {
            panic!("section payload was dropped");
        };
        assert_eq!(raw.from, 4);

        let decoded = crate::codec::decode(&raw.payload, crate::codec::WireFormat::Grouped);
        assert_eq!(decoded.records[0], ("A".to_string(), crate::models::SectionMetrics::new(3, 10, 2)));
        assert_eq!(decoded.records[1].0, "B");

        assert!(matches!(
            t.classify("parking-mesh/nodes/8/sections", &[0xff, 0xfe]),
            Some(MeshEvent::Received(_))
        ));
    }
}
