/**
 * PARKING NODE - relay node entry point
 *
 * ROLE : Bootstrap config, downstream sink, trigger input, mesh listener and
 * status publisher, then hand everything to the single-task node runtime.
 */

use anyhow::{Context, Result};
use parking_node::config::load_config;
use parking_node::health::NodeStats;
use parking_node::mqtt::{self, Topics};
use parking_node::node::NodeRuntime;
use parking_node::publisher::Publisher;
use parking_node::sink::open_sink;
use parking_node::state::new_section_store;
use parking_node::trigger::{GpioValueFile, IdleInput, TriggerInput};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "parking_node=info".into()),
        )
        .init();

    let cfg = load_config().context("Failed to load node config")?;
    info!(
        "parking node {} starting (codec {:?}, retention {:?})",
        cfg.node_id, cfg.codec.format, cfg.downstream.retention
    );

    let sink = open_sink(&cfg.downstream).context("Failed to open downstream sink")?;
    let publisher = Publisher::new(sink, cfg.report_format(), cfg.downstream.retention);

    let input: Box<dyn TriggerInput> = match &cfg.trigger.gpio_path {
        Some(path) => {
            info!("trigger sampled from {:?} every {} ms", path, cfg.trigger.tick_ms);
            Box::new(GpioValueFile::new(path))
        }
        None => {
            warn!("no trigger input configured, downstream reports disabled");
            Box::new(IdleInput)
        }
    };

    // runtime writes, status publisher reads
    let store = new_section_store();
    let stats = NodeStats::new();

    let (tx, rx) = mpsc::channel(64);
    let client_id = format!("parking-node-{}", cfg.node_id);
    let client = mqtt::spawn_mesh_listener(&cfg.mesh, &client_id, tx, stats.clone());

    let publish_to = cfg
        .status
        .publish
        .then(|| (client.clone(), Topics::new(&cfg.mesh.prefix).status(cfg.node_id)));
    stats.spawn_status_publisher(
        cfg.node_id,
        store.clone(),
        publish_to,
        Duration::from_secs(cfg.status.interval_secs.max(1)),
    );

    let runtime = NodeRuntime::new(store, cfg.codec.format, input, publisher, stats);
    runtime
        .run(rx, Duration::from_millis(cfg.trigger.tick_ms.max(1)))
        .await;

    Ok(())
}
