//! Opening the downstream line sink (serial port, device/file path, stdout).

use crate::config::{DownstreamConf, SinkKind};
use crate::publisher::PublishError;
use std::fs::OpenOptions;
use std::io::Write;

pub type DownstreamSink = Box<dyn Write + Send>;

pub fn open_sink(cfg: &DownstreamConf) -> Result<DownstreamSink, PublishError> {
    match cfg.sink {
        SinkKind::Stdout => Ok(Box::new(std::io::stdout())),
        SinkKind::File => {
            let path = required_path(cfg)?;
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| PublishError::Open { target: path.to_string(), reason: e.to_string() })?;
            tracing::info!("downstream report appended to {}", path);
            Ok(Box::new(file))
        }
        SinkKind::Serial => open_serial(cfg),
    }
}

fn required_path(cfg: &DownstreamConf) -> Result<&str, PublishError> {
    cfg.path.as_deref().ok_or_else(|| PublishError::Open {
        target: format!("{:?}", cfg.sink),
        reason: "downstream.path is required".into(),
    })
}

#[cfg(feature = "serial")]
fn open_serial(cfg: &DownstreamConf) -> Result<DownstreamSink, PublishError> {
    use std::time::Duration;

    let port_name = required_path(cfg)?;
    let mut builder = serialport::new(port_name, cfg.baud_rate).timeout(Duration::from_millis(50));
    #[cfg(unix)]
    {
        builder = builder
            .data_bits(serialport::DataBits::Eight)
            .stop_bits(serialport::StopBits::One)
            .parity(serialport::Parity::None);
    }
    let port = builder.open().map_err(|e| PublishError::Open {
        target: port_name.to_string(),
        reason: e.to_string(),
    })?;
    tracing::info!("downstream serial {} at {} baud", port_name, cfg.baud_rate);
    Ok(Box::new(port))
}

#[cfg(not(feature = "serial"))]
fn open_serial(cfg: &DownstreamConf) -> Result<DownstreamSink, PublishError> {
    Err(PublishError::Open {
        target: cfg.path.clone().unwrap_or_default(),
        reason: "built without the `serial` feature".into(),
    })
}
