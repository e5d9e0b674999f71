//! Contract between the node and the mesh collaborator.
//!
//! The mesh owns connectivity, timing and peer lifecycle. It hands the node
//! [`MeshEvent`]s, which a [`MeshHandler`] consumes on the same task as the
//! trigger tick loop, and accepts outbound payloads through a [`MeshLink`].

use crate::models::{PeerId, RawMessage};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MeshEvent {
    Received(RawMessage),
    NewConnection(PeerId),
    ConnectionsChanged,
    /// Offset applied to the mesh clock, in microseconds.
    TimeAdjusted(i32),
}

/// Upcalls from the mesh. Only `on_receive` affects node state; the lifecycle
/// callbacks are informational and log by default.
pub trait MeshHandler {
    fn on_receive(&mut self, from: PeerId, payload: &str);

    fn on_new_connection(&mut self, peer: PeerId) {
        info!("New connection established, nodeId = {}", peer);
    }

    fn on_connections_changed(&mut self) {
        info!("Connections updated");
    }

    fn on_time_adjusted(&mut self, offset_us: i32) {
        info!("Node time adjusted. Offset = {}", offset_us);
    }

    fn dispatch(&mut self, event: MeshEvent) {
        match event {
            MeshEvent::Received(msg) => self.on_receive(msg.from, &msg.payload),
            MeshEvent::NewConnection(peer) => self.on_new_connection(peer),
            MeshEvent::ConnectionsChanged => self.on_connections_changed(),
            MeshEvent::TimeAdjusted(offset) => self.on_time_adjusted(offset),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("mesh publish failed: {0}")]
    Publish(#[from] rumqttc::ClientError),
    #[error("mesh event channel closed")]
    ChannelClosed,
}

/// Outbound side of the mesh: broadcast a payload from this node.
pub trait MeshLink {
    fn send(&self, payload: &str) -> Result<(), GatewayError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        received: Vec<(PeerId, String)>,
        lifecycle: usize,
    }

    impl MeshHandler for Recorder {
        fn on_receive(&mut self, from: PeerId, payload: &str) {
            self.received.push((from, payload.to_string()));
        }

        fn on_connections_changed(&mut self) {
            self.lifecycle += 1;
        }
    }

    #[test]
    fn test_dispatch_routes_events() {
        let mut handler = Recorder::default();
        handler.dispatch(MeshEvent::Received(RawMessage::new(42, "A 1 2 3")));
        handler.dispatch(MeshEvent::ConnectionsChanged);
        handler.dispatch(MeshEvent::NewConnection(9));
        handler.dispatch(MeshEvent::TimeAdjusted(-250));

        assert_eq!(handler.received, vec![(42, "A 1 2 3".to_string())]);
        assert_eq!(handler.lifecycle, 1);
    }
}
