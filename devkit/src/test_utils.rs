/*!
Test tools for the relay node and the peers

- `CaptureSink` : stands in for the serial link to the display
- `ScriptedTrigger` : sequence of levels read on the trigger line
- `TestHarness` : mock mesh client + per-topic expectations
*/

use crate::mesh_stub::MockMeshClient;
use anyhow::Result;
use std::collections::{HashMap, VecDeque};
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

/// In-memory line sink. Clones share the same buffer, so a test keeps one
/// handle while the code under test writes through another.
#[derive(Debug, Clone, Default)]
pub struct CaptureSink {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl CaptureSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buffer.lock().unwrap()).into_owned()
    }

    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_string).collect()
    }

    /// Lines written so far; the buffer is emptied.
    pub fn take_lines(&self) -> Vec<String> {
        let lines = self.lines();
        self.buffer.lock().unwrap().clear();
        lines
    }
}

impl Write for CaptureSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Pre-recorded trigger line levels (`true` = HIGH). Once the script runs
/// out the line reads idle HIGH, like a pull-up with nothing pressed.
#[derive(Debug, Clone, Default)]
pub struct ScriptedTrigger {
    levels: VecDeque<bool>,
}

impl ScriptedTrigger {
    pub fn from_levels(levels: &[bool]) -> Self {
        Self { levels: levels.iter().copied().collect() }
    }

    /// A press held for `ticks` samples, then released.
    pub fn press(&mut self, ticks: usize) {
        self.levels.extend(std::iter::repeat(false).take(ticks));
        self.levels.push_back(true);
    }

    pub fn next_level(&mut self) -> bool {
        self.levels.pop_front().unwrap_or(true)
    }
}

#[derive(Debug)]
struct Expectation {
    topic: String,
    expected_count: usize,
}

/// Mock mesh client plus per-topic publish expectations.
pub struct TestHarness {
    pub mesh_client: MockMeshClient,
    expectations: Vec<Expectation>,
}

impl TestHarness {
    pub fn new() -> Self {
        env_logger::try_init().ok();

        Self {
            mesh_client: MockMeshClient::new(),
            expectations: Vec::new(),
        }
    }

    /// Expect exactly `count` messages published on `topic`.
    pub fn expect_messages(&mut self, topic: &str, count: usize) -> &mut Self {
        self.expectations.push(Expectation {
            topic: topic.to_string(),
            expected_count: count,
        });
        self
    }

    pub fn verify_expectations(&self) -> Result<()> {
        for expectation in &self.expectations {
            let actual_count = self.mesh_client.find_messages_by_topic(&expectation.topic).len();
            if actual_count != expectation.expected_count {
                anyhow::bail!(
                    "Expectation failed for topic '{}': expected {} messages, got {}",
                    expectation.topic,
                    expectation.expected_count,
                    actual_count
                );
            }
            log::info!("✅ Topic '{}': {} messages as expected", expectation.topic, actual_count);
        }
        Ok(())
    }

    /// Published message count per topic.
    pub fn topic_counts(&self) -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        for msg in self.mesh_client.get_published_messages() {
            *counts.entry(msg.topic).or_insert(0) += 1;
        }
        counts
    }

    pub fn reset(&mut self) {
        self.mesh_client.clear();
        self.expectations.clear();
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
