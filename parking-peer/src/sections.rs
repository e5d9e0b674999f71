//! Local section counts of a peer, and how they go out on the mesh.

use parking_node::codec::{encode_messages, is_wire_id, WireFormat};
use parking_node::gateway::{GatewayError, MeshLink};
use parking_node::models::{SectionId, SectionMetrics};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::warn;

pub type LocalSections = BTreeMap<SectionId, SectionMetrics>;

/// Read the sections file maintained by the local sensors.
///
/// ```yaml
/// P1: { free_spots: 12, entrance_score: 3, elevator_score: 1 }
/// P2: { free_spots: 0 }
/// ```
///
/// Ids that are empty or contain whitespace cannot be framed on the wire and
/// are skipped with a warning.
pub fn load_sections(path: &Path) -> anyhow::Result<LocalSections> {
    let txt = std::fs::read_to_string(path)?;
    if txt.trim().is_empty() {
        return Ok(LocalSections::new());
    }
    let mut sections: LocalSections = serde_yaml::from_str(&txt)?;
    sections.retain(|id, _| {
        let keep = is_wire_id(id);
        if !keep {
            warn!("skipping section {:?} from {:?}: id must be non-empty without spaces", id, path);
        }
        keep
    });
    Ok(sections)
}

/// Send the sections as mesh payloads. Returns the number of payloads sent.
pub fn publish_sections<L: MeshLink>(
    link: &L,
    sections: &LocalSections,
    format: WireFormat,
) -> Result<usize, GatewayError> {
    let payloads = encode_messages(sections.iter().map(|(id, m)| (id.as_str(), m)), format);
    for payload in &payloads {
        link.send(payload)?;
    }
    Ok(payloads.len())
}

/// Stable peer id derived from the host name (FNV-1a), used when
/// `PARKING_PEER_ID` is not set.
pub fn peer_id_from_hostname(hostname: &str) -> u32 {
    hostname.bytes().fold(0x811c_9dc5_u32, |hash, b| {
        (hash ^ u32::from(b)).wrapping_mul(0x0100_0193)
    })
}
