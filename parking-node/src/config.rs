use crate::codec::WireFormat;
use crate::publisher::{ReportFormat, RetentionPolicy, DEFAULT_EMPTY_SENTINEL, DEFAULT_TERMINATOR};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_ENV: &str = "PARKING_NODE_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "parking-node.yaml";
pub const HOST_ENV: &str = "PARKING_MESH_HOST";
pub const PORT_ENV: &str = "PARKING_MESH_PORT";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid value for {var}: {value}")]
    Env { var: &'static str, value: String },
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct NodeConfig {
    pub node_id: u32,
    pub mesh: MeshConf,
    pub codec: CodecConf,
    pub trigger: TriggerConf,
    pub downstream: DownstreamConf,
    pub status: StatusConf,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct MeshConf {
    pub prefix: String,
    pub host: String,
    pub port: u16,
    pub keep_alive_secs: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct CodecConf {
    pub format: WireFormat,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct TriggerConf {
    pub gpio_path: Option<PathBuf>, // ex: "/sys/class/gpio/gpio5/value"
    pub tick_ms: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    Serial,
    File,
    #[default]
    Stdout,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct DownstreamConf {
    pub sink: SinkKind,
    pub path: Option<String>, // ex: "/dev/ttyUSB0"
    pub baud_rate: u32,
    pub terminator: String,
    pub empty_sentinel: String,
    pub retention: RetentionPolicy,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct StatusConf {
    pub publish: bool,
    pub interval_secs: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            node_id: 1,
            mesh: MeshConf::default(),
            codec: CodecConf::default(),
            trigger: TriggerConf::default(),
            downstream: DownstreamConf::default(),
            status: StatusConf::default(),
        }
    }
}

impl Default for MeshConf {
    fn default() -> Self {
        Self {
            prefix: "parking-mesh".into(),
            host: "localhost".into(),
            port: 1883,
            keep_alive_secs: 15,
        }
    }
}

impl Default for TriggerConf {
    fn default() -> Self {
        Self { gpio_path: None, tick_ms: 10 }
    }
}

impl Default for DownstreamConf {
    fn default() -> Self {
        Self {
            sink: SinkKind::Stdout,
            path: None,
            baud_rate: 115_200,
            terminator: DEFAULT_TERMINATOR.into(),
            empty_sentinel: DEFAULT_EMPTY_SENTINEL.into(),
            retention: RetentionPolicy::Clear,
        }
    }
}

impl Default for StatusConf {
    fn default() -> Self {
        Self { publish: false, interval_secs: 30 }
    }
}

impl NodeConfig {
    pub fn report_format(&self) -> ReportFormat {
        ReportFormat {
            wire: self.codec.format,
            terminator: self.downstream.terminator.clone(),
            empty_sentinel: self.downstream.empty_sentinel.clone(),
        }
    }

    /// `PARKING_MESH_HOST` / `PARKING_MESH_PORT` take precedence over the file.
    fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|var| std::env::var(var).ok())
    }

    fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup(HOST_ENV) {
            self.mesh.host = host;
        }
        if let Some(port) = lookup(PORT_ENV) {
            self.mesh.port = port
                .parse()
                .map_err(|_| ConfigError::Env { var: PORT_ENV, value: port })?;
        }
        Ok(())
    }
}

/// Path from `PARKING_NODE_CONFIG`, defaulting to `parking-node.yaml`.
pub fn config_path() -> PathBuf {
    std::env::var(CONFIG_ENV)
        .unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into())
        .into()
}

pub fn load_config() -> Result<NodeConfig, ConfigError> {
    let mut cfg = load_config_from(config_path())?;
    cfg.apply_env()?;
    Ok(cfg)
}

/// Missing or blank file means defaults; a file that does not parse is an error.
pub fn load_config_from<P: AsRef<Path>>(path: P) -> Result<NodeConfig, ConfigError> {
    let path = path.as_ref();
    if !path.exists() {
        tracing::warn!("no config at {:?}, using defaults", path);
        return Ok(NodeConfig::default());
    }

    let txt = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    if txt.trim().is_empty() {
        return Ok(NodeConfig::default());
    }
    serde_yaml::from_str(&txt).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
