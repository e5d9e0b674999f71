/*!
Mock mesh client for development without a broker

Records every published payload and simulates messages arriving from peers,
with the same API shape as `rumqttc::AsyncClient`.
*/

use anyhow::Result;
use rumqttc::QoS;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

#[derive(Debug, Clone)]
pub struct MockMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub qos: QoS,
    pub retain: bool,
}

impl MockMessage {
    pub fn payload_str(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}

/// Mock mesh client mirroring `rumqttc::AsyncClient`.
#[derive(Clone)]
pub struct MockMeshClient {
    published_messages: Arc<Mutex<Vec<MockMessage>>>,
    subscriptions: Arc<Mutex<Vec<String>>>,
    message_sender: Arc<Mutex<Option<mpsc::UnboundedSender<MockMessage>>>>,
}

impl MockMeshClient {
    pub fn new() -> Self {
        Self {
            published_messages: Arc::new(Mutex::new(Vec::new())),
            subscriptions: Arc::new(Mutex::new(Vec::new())),
            message_sender: Arc::new(Mutex::new(None)),
        }
    }

    /// Channel receiving the messages passed to [`simulate_incoming`](Self::simulate_incoming).
    pub fn setup_receiver(&self) -> mpsc::UnboundedReceiver<MockMessage> {
        let (sender, receiver) = mpsc::unbounded_channel();
        *self.message_sender.lock().unwrap() = Some(sender);
        receiver
    }

    /// Same as `AsyncClient::try_publish`: records the message synchronously.
    pub fn try_publish<S, V>(&self, topic: S, qos: QoS, retain: bool, payload: V) -> Result<()>
    where
        S: Into<String>,
        V: Into<Vec<u8>>,
    {
        let message = MockMessage {
            topic: topic.into(),
            payload: payload.into(),
            qos,
            retain,
        };

        log::info!("📤 [MOCK] Published to {}: {}", message.topic, message.payload_str());
        self.published_messages.lock().unwrap().push(message);
        Ok(())
    }

    pub async fn publish<S, V>(&self, topic: S, qos: QoS, retain: bool, payload: V) -> Result<()>
    where
        S: Into<String>,
        V: Into<Vec<u8>>,
    {
        self.try_publish(topic, qos, retain, payload)
    }

    pub fn try_subscribe<S: Into<String>>(&self, topic: S, _qos: QoS) -> Result<()> {
        let topic = topic.into();
        log::info!("📥 [MOCK] Subscribed to {}", topic);
        self.subscriptions.lock().unwrap().push(topic);
        Ok(())
    }

    /// Deliver a message as if a peer had published it.
    pub async fn simulate_incoming<S, V>(&self, topic: S, payload: V) -> Result<()>
    where
        S: Into<String>,
        V: Into<Vec<u8>>,
    {
        let message = MockMessage {
            topic: topic.into(),
            payload: payload.into(),
            qos: QoS::AtLeastOnce,
            retain: false,
        };

        if let Some(sender) = self.message_sender.lock().unwrap().as_ref() {
            sender
                .send(message.clone())
                .map_err(|e| anyhow::anyhow!("Send error: {}", e))?;
        }

        log::info!("📨 [MOCK] Simulated incoming: {}", message.topic);
        Ok(())
    }

    pub fn get_published_messages(&self) -> Vec<MockMessage> {
        self.published_messages.lock().unwrap().clone()
    }

    pub fn get_subscriptions(&self) -> Vec<String> {
        self.subscriptions.lock().unwrap().clone()
    }

    pub fn find_messages_by_topic(&self, topic: &str) -> Vec<MockMessage> {
        self.published_messages
            .lock()
            .unwrap()
            .iter()
            .filter(|msg| msg.topic == topic)
            .cloned()
            .collect()
    }

    /// Payloads published on a topic, as text.
    pub fn payloads_on(&self, topic: &str) -> Vec<String> {
        self.find_messages_by_topic(topic)
            .iter()
            .map(MockMessage::payload_str)
            .collect()
    }

    pub fn clear(&self) {
        self.published_messages.lock().unwrap().clear();
        self.subscriptions.lock().unwrap().clear();
    }
}

impl Default for MockMeshClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds section payloads the way peers put them on the wire.
#[derive(Debug, Default, Clone)]
pub struct SectionPayloadBuilder {
    groups: Vec<(String, i32, i32, i32)>,
}

impl SectionPayloadBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn section<S: Into<String>>(mut self, id: S, free: i32, entrance: i32, elevator: i32) -> Self {
        self.groups.push((id.into(), free, entrance, elevator));
        self
    }

    /// All groups on one line.
    pub fn grouped(&self) -> String {
        self.groups
            .iter()
            .map(|(id, f, e, v)| format!("{} {} {} {}", id, f, e, v))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// One `<id> <free>` message per section.
    pub fn legacy(&self) -> Vec<String> {
        self.groups
            .iter()
            .map(|(id, f, _, _)| format!("{} {}", id, f))
            .collect()
    }

    /// Grouped line followed by an incomplete group.
    pub fn grouped_with_truncated_tail<S: Into<String>>(&self, id: S) -> String {
        let line = self.grouped();
        let id = id.into();
        if line.is_empty() { id } else { format!("{} {}", line, id) }
    }
}
