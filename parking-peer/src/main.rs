//! Parking peer - publishes the local section counts on the parking mesh.
//!
//! Configuration (environment, `.env` not loaded):
//! - `PARKING_PEER_ID`        : numeric node id (default: derived from hostname)
//! - `PARKING_PEER_SECTIONS`  : YAML sections file (default `sections.yaml`)
//! - `PARKING_PEER_INTERVAL`  : broadcast period, humantime (default `10s`)
//! - `PARKING_PEER_FORMAT`    : `grouped` or `legacy` (default `grouped`)
//! - `PARKING_MESH_HOST` / `PARKING_MESH_PORT` / `PARKING_MESH_PREFIX`

mod sections;

use anyhow::{Context, Result};
use gethostname::gethostname;
use parking_node::codec::WireFormat;
use parking_node::config::{MeshConf, HOST_ENV, PORT_ENV};
use parking_node::gateway::MeshLink;
use parking_node::mqtt::{mqtt_options, MqttMeshLink, Topics};
use rumqttc::{AsyncClient, Event, Incoming};
use sections::{load_sections, peer_id_from_hostname, publish_sections};
use std::path::PathBuf;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, warn};

struct PeerConfig {
    peer_id: u32,
    sections_path: PathBuf,
    interval: Duration,
    format: WireFormat,
    mesh: MeshConf,
}

impl PeerConfig {
    fn from_env() -> Result<Self> {
        let peer_id = match std::env::var("PARKING_PEER_ID") {
            Ok(id) => id.parse().context("PARKING_PEER_ID must be a u32")?,
            Err(_) => peer_id_from_hostname(&gethostname().to_string_lossy()),
        };
        let interval = std::env::var("PARKING_PEER_INTERVAL").unwrap_or_else(|_| "10s".into());
        let interval = humantime::parse_duration(&interval).context("invalid PARKING_PEER_INTERVAL")?;
        let format = match std::env::var("PARKING_PEER_FORMAT").as_deref() {
            Ok("legacy") => WireFormat::Legacy,
            Ok("grouped") | Err(_) => WireFormat::Grouped,
            Ok(other) => anyhow::bail!("unknown PARKING_PEER_FORMAT {other:?}"),
        };

        let mut mesh = MeshConf::default();
        if let Ok(host) = std::env::var(HOST_ENV) {
            mesh.host = host;
        }
        if let Ok(port) = std::env::var(PORT_ENV) {
            mesh.port = port.parse().context("PARKING_MESH_PORT must be a port number")?;
        }
        if let Ok(prefix) = std::env::var("PARKING_MESH_PREFIX") {
            mesh.prefix = prefix;
        }

        Ok(Self {
            peer_id,
            sections_path: std::env::var("PARKING_PEER_SECTIONS")
                .unwrap_or_else(|_| "sections.yaml".into())
                .into(),
            interval,
            format,
            mesh,
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "parking_peer=info".into()),
        )
        .init();

    let cfg = PeerConfig::from_env()?;
    info!("parking peer {} publishing {:?} every {:?}", cfg.peer_id, cfg.sections_path, cfg.interval);

    let client_id = format!("parking-peer-{}", cfg.peer_id);
    let (client, mut eventloop) = AsyncClient::new(mqtt_options(&cfg.mesh, &client_id), 10);
    let topics = Topics::new(&cfg.mesh.prefix);
    let sections_link = MqttMeshLink::new(client.clone(), topics.sections(cfg.peer_id));
    let online_link = MqttMeshLink::new(client, topics.online(cfg.peer_id));

    // The peer consumes nothing; polling keeps the connection alive
    tokio::spawn(async move {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Incoming::ConnAck(_))) => info!("connected to mesh broker"),
                Ok(Event::Incoming(Incoming::Publish(p))) => debug!("ignored publish on {}", p.topic),
                Ok(_) => {}
                Err(e) => {
                    error!("mesh MQTT error: {:?}", e);
                    sleep(Duration::from_secs(2)).await;
                }
            }
        }
    });

    if let Err(e) = online_link.send("") {
        warn!("online announcement failed: {}", e);
    }

    loop {
        match load_sections(&cfg.sections_path) {
            Ok(sections) => match publish_sections(&sections_link, &sections, cfg.format) {
                Ok(sent) => info!("published {} sections in {} payload(s)", sections.len(), sent),
                Err(e) => error!("publish sections failed: {}", e),
            },
            Err(e) => warn!("cannot read {:?}: {}", cfg.sections_path, e),
        }

        sleep(cfg.interval).await;
    }
}
