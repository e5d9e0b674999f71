//! Downstream report for the display controller.
//!
//! A flush writes one line per known section followed by the terminator, or
//! the single empty-store sentinel when nothing is known. The whole report is
//! written and flushed in one go, then the retention policy is applied.

use crate::codec::{encode_record, WireFormat};
use crate::store::SectionStore;
use serde::{Deserialize, Serialize};
use std::io::{self, Write};

pub const DEFAULT_TERMINATOR: &str = "END";
pub const DEFAULT_EMPTY_SENTINEL: &str = "NO";

/// What happens to the store after a successful flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetentionPolicy {
    /// Each report only carries what was received since the previous one.
    #[default]
    Clear,
    /// Each report repeats the full known state.
    Retain,
}

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("downstream write failed: {0}")]
    Io(#[from] io::Error),
    #[error("failed to open downstream sink {target}: {reason}")]
    Open { target: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportFormat {
    pub wire: WireFormat,
    pub terminator: String,
    pub empty_sentinel: String,
}

impl Default for ReportFormat {
    fn default() -> Self {
        Self {
            wire: WireFormat::Grouped,
            terminator: DEFAULT_TERMINATOR.to_string(),
            empty_sentinel: DEFAULT_EMPTY_SENTINEL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushOutcome {
    pub records: usize,
    pub cleared: bool,
}

pub struct Publisher<W: Write> {
    sink: W,
    format: ReportFormat,
    retention: RetentionPolicy,
}

impl<W: Write> Publisher<W> {
    pub fn new(sink: W, format: ReportFormat, retention: RetentionPolicy) -> Self {
        Self { sink, format, retention }
    }

    /// Render the report text for the current store content.
    pub fn render<S: SectionStore + ?Sized>(&self, store: &S) -> (String, usize) {
        if store.is_empty() {
            return (format!("{}\n", self.format.empty_sentinel), 0);
        }

        let snapshot = store.snapshot();
        let mut report = String::new();
        for (id, metrics) in &snapshot {
            report.push_str(&encode_record(id, metrics, self.format.wire));
            report.push('\n');
        }
        report.push_str(&self.format.terminator);
        report.push('\n');
        (report, snapshot.len())
    }

    /// Write the report, then apply the retention policy.
    ///
    /// On a write error the store is left untouched.
    pub fn flush<S: SectionStore + ?Sized>(&mut self, store: &mut S) -> Result<FlushOutcome, PublishError> {
        let (report, records) = self.render(store);
        self.sink.write_all(report.as_bytes())?;
        self.sink.flush()?;

        let cleared = self.retention == RetentionPolicy::Clear && records > 0;
        if cleared {
            store.clear();
        }
        Ok(FlushOutcome { records, cleared })
    }
}
