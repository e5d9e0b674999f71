//! Falling-edge detection on the display trigger line.
//!
//! The line is wired with a pull-up: HIGH means idle, LOW means asserted.
//! [`TriggerMonitor`] keeps the previous sample and fires once on each
//! HIGH→LOW transition. That is the only debouncing applied; callers needing
//! noise immunity have to add a delay or threshold on top.

use std::fs;
use std::io;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    High,
    Low,
}

impl Level {
    /// Map a raw digital read (`true` = HIGH).
    pub fn from_raw(high: bool) -> Self {
        if high { Level::High } else { Level::Low }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerState {
    Idle,
    Asserted,
}

#[derive(Debug)]
pub struct TriggerMonitor {
    last_state: Level,
}

impl Default for TriggerMonitor {
    fn default() -> Self {
        Self { last_state: Level::High }
    }
}

impl TriggerMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one sample. Returns `true` exactly when this sample is a falling edge.
    pub fn poll(&mut self, current: Level) -> bool {
        let fired = current == Level::Low && self.last_state == Level::High;
        self.last_state = current;
        fired
    }

    pub fn state(&self) -> TriggerState {
        match self.last_state {
            Level::High => TriggerState::Idle,
            Level::Low => TriggerState::Asserted,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TriggerError {
    #[error("failed to read trigger input {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Source of trigger samples, read once per tick. Must not block.
pub trait TriggerInput {
    fn sample(&mut self) -> Result<Level, TriggerError>;
}

impl<T: TriggerInput + ?Sized> TriggerInput for Box<T> {
    fn sample(&mut self) -> Result<Level, TriggerError> {
        (**self).sample()
    }
}

/// GPIO exposed as a value file (sysfs `/sys/class/gpio/gpioN/value` style).
///
/// `0` reads as LOW, any other content as HIGH.
#[derive(Debug, Clone)]
pub struct GpioValueFile {
    path: PathBuf,
}

impl GpioValueFile {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }
}

impl TriggerInput for GpioValueFile {
    fn sample(&mut self) -> Result<Level, TriggerError> {
        let raw = fs::read_to_string(&self.path).map_err(|source| TriggerError::Read {
            path: self.path.clone(),
            source,
        })?;
        Ok(Level::from_raw(raw.trim() != "0"))
    }
}

/// Input for nodes without a trigger wired: always idle, never fires.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdleInput;

impl TriggerInput for IdleInput {
    fn sample(&mut self) -> Result<Level, TriggerError> {
        Ok(Level::High)
    }
}
