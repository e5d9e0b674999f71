use parking_devkit::{CaptureSink, MockMeshClient, ScriptedTrigger, SectionPayloadBuilder};
use parking_node::codec::WireFormat;
use parking_node::gateway::MeshHandler;
use parking_node::health::NodeStats;
use parking_node::models::SectionMetrics;
use parking_node::mqtt::Topics;
use parking_node::node::NodeRuntime;
use parking_node::publisher::{Publisher, ReportFormat, RetentionPolicy};
use parking_node::state::new_section_store;
use parking_node::store::SectionStore;
use parking_node::trigger::{Level, TriggerError, TriggerInput};

struct Scripted(ScriptedTrigger);

impl TriggerInput for Scripted {
    fn sample(&mut self) -> Result<Level, TriggerError> {
        Ok(Level::from_raw(self.0.next_level()))
    }
}

#[tokio::test]
async fn mesh_reports_reach_the_display_on_press() {
    let topics = Topics::new("parking-mesh");
    let mesh = MockMeshClient::new();
    let mut incoming = mesh.setup_receiver();

    let sink = CaptureSink::new();
    let store = new_section_store();
    let stats = NodeStats::new();
    let mut trigger = ScriptedTrigger::default();
    trigger.press(3);
    trigger.press(1);

    let publisher = Publisher::new(sink.clone(), ReportFormat::default(), RetentionPolicy::Clear);
    let mut runtime = NodeRuntime::new(
        store.clone(),
        WireFormat::Grouped,
        Scripted(trigger),
        publisher,
        stats.clone(),
    );

    let north = SectionPayloadBuilder::new().section("A", 3, 10, 2);
    let south = SectionPayloadBuilder::new().section("B", 5, 0, 1);
    mesh.simulate_incoming(topics.online(11), "").await.unwrap();
    mesh.simulate_incoming(topics.sections(11), north.grouped()).await.unwrap();
    mesh.simulate_incoming(topics.sections(12), south.grouped_with_truncated_tail("C")).await.unwrap();
    mesh.simulate_incoming("elsewhere/nodes/12/sections", "Z 1 1 1").await.unwrap();
    drop(mesh);

    while let Some(msg) = incoming.recv().await {
        if let Some(event) = topics.classify(&msg.topic, &msg.payload) {
            runtime.dispatch(event);
        }
    }

    // same store, seen through another handle
    assert_eq!(store.len(), 2);
    assert_eq!(store.get("B"), Some(SectionMetrics::new(5, 0, 1)));

    // first press: full report then clear; second press: sentinel only
    for _ in 0..6 {
        runtime.tick();
    }
    assert_eq!(sink.lines(), vec!["A 3 10 2", "B 5 0 1", "END", "NO"]);
    assert!(store.is_empty());

    let health = stats.get_health(1, &store);
    assert_eq!(health.messages_received, 2);
    assert_eq!(health.records_applied, 2);
    assert_eq!(health.groups_discarded, 1);
    assert_eq!(health.triggers, 2);
    assert_eq!(health.flushes, 2);
}
