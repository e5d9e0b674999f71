//! Aggregation store: latest metrics per section, as last reported by any peer.
//!
//! Writes are unconditional overwrites. Two peers reporting the same section
//! race, and whichever record is applied last wins; there is no timestamp or
//! provenance tiebreak. Entries never expire, they only go away when the
//! publisher clears the store.

use crate::models::{SectionId, SectionMetrics, SectionRecord};
use crate::state::Shared;
use std::collections::BTreeMap;

/// Storage seam between the receive path and the publisher.
///
/// The node runtime mutates the store from a single task. A store shared with
/// other tasks goes through [`Shared`], which implements the same trait by
/// taking the lock for each call.
pub trait SectionStore {
    fn put(&mut self, id: SectionId, metrics: SectionMetrics);
    fn get(&self, id: &str) -> Option<SectionMetrics>;
    /// All entries in ascending identifier order.
    fn snapshot(&self) -> Vec<SectionRecord>;
    fn clear(&mut self);
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Default, Clone)]
pub struct SectionMap {
    sections: BTreeMap<SectionId, SectionMetrics>,
}

impl SectionMap {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SectionStore for SectionMap {
    fn put(&mut self, id: SectionId, metrics: SectionMetrics) {
        self.sections.insert(id, metrics);
    }

    fn get(&self, id: &str) -> Option<SectionMetrics> {
        self.sections.get(id).copied()
    }

    fn snapshot(&self) -> Vec<SectionRecord> {
        self.sections
            .iter()
            .map(|(id, m)| (id.clone(), *m))
            .collect()
    }

    fn clear(&mut self) {
        self.sections.clear();
    }

    fn len(&self) -> usize {
        self.sections.len()
    }
}

impl<S: SectionStore> SectionStore for Shared<S> {
    fn put(&mut self, id: SectionId, metrics: SectionMetrics) {
        self.lock().put(id, metrics);
    }

    fn get(&self, id: &str) -> Option<SectionMetrics> {
        self.lock().get(id)
    }

    fn snapshot(&self) -> Vec<SectionRecord> {
        self.lock().snapshot()
    }

    fn clear(&mut self) {
        self.lock().clear();
    }

    fn len(&self) -> usize {
        self.lock().len()
    }
}
