use serde::{Deserialize, Serialize};

/// Section identifier as carried on the mesh. Case sensitive.
pub type SectionId = String;

/// Numeric mesh node id.
pub type PeerId = u32;

/// `free_spots` of a section whose occupancy is not known yet.
pub const UNKNOWN_SPOTS: i32 = -1;

/// Latest known state of one parking section.
///
/// A record received from the mesh always replaces the whole value for its
/// section; fields are never merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionMetrics {
    pub free_spots: i32,
    #[serde(default)]
    pub entrance_score: i32,
    #[serde(default)]
    pub elevator_score: i32,
}

impl SectionMetrics {
    pub fn new(free_spots: i32, entrance_score: i32, elevator_score: i32) -> Self {
        Self { free_spots, entrance_score, elevator_score }
    }

    /// Metrics from a legacy single-field report.
    pub fn spots_only(free_spots: i32) -> Self {
        Self { free_spots, ..Self::default() }
    }
}

impl Default for SectionMetrics {
    fn default() -> Self {
        Self {
            free_spots: UNKNOWN_SPOTS,
            entrance_score: 0,
            elevator_score: 0,
        }
    }
}

/// One decoded (section, metrics) pair.
pub type SectionRecord = (SectionId, SectionMetrics);

/// Payload received from a peer. The sender id is only used for logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    pub from: PeerId,
    pub payload: String,
}

impl RawMessage {
    pub fn new(from: PeerId, payload: impl Into<String>) -> Self {
        Self { from, payload: payload.into() }
    }
}
