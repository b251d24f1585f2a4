//! Cycler configuration.
//!
//! Line assignments, timings and channel policy, loadable from TOML:
//!
//! ```toml
//! button_line = 17
//! lamp_lines = [22, 23, 24]
//! buzzer_line = 27
//! cooldown_ms = 5000
//! beep_on_ms = 100
//! beep_off_ms = 100
//! guard_ms = 200
//! buffer_capacity = 64
//! readiness = "consumer"
//! ```
//!
//! Every key is optional and falls back to the defaults in
//! [`kiosk_core::constants`].

use crate::channel::ReadinessPolicy;
use crate::sequencer::BeepTiming;
use crate::state_machine::MachineTiming;
use kiosk_core::constants::{
    DEFAULT_BEEP_OFF_MS, DEFAULT_BEEP_ON_MS, DEFAULT_BUTTON_LINE, DEFAULT_BUZZER_LINE,
    DEFAULT_COOLDOWN_MS, DEFAULT_GUARD_MS, DEFAULT_LAMP_LINES, LAMP_COUNT,
    MAX_STATUS_BUFFER_CAPACITY, MIN_STATUS_BUFFER_CAPACITY, STATUS_BUFFER_CAPACITY,
};
use kiosk_core::{Error, LineId, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

/// Configuration for a [`Cycler`](crate::Cycler).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CyclerConfig {
    /// Input line wired to the push button.
    pub button_line: LineId,

    /// Lamp output lines, indexed by feedback state.
    pub lamp_lines: [LineId; LAMP_COUNT],

    /// Buzzer output line.
    pub buzzer_line: LineId,

    /// Delay after the last accepted press before reporting and resetting.
    pub cooldown_ms: u64,

    /// Buzzer on-time per pulse.
    pub beep_on_ms: u64,

    /// Silence after each pulse.
    pub beep_off_ms: u64,

    /// Extra suppression after the confirmation beep.
    pub guard_ms: u64,

    /// Status buffer size in bytes, including the terminator byte.
    pub buffer_capacity: usize,

    /// Polarity of the readiness mask reported to pollers.
    pub readiness: ReadinessPolicy,
}

impl Default for CyclerConfig {
    fn default() -> Self {
        Self {
            button_line: LineId::new(DEFAULT_BUTTON_LINE),
            lamp_lines: DEFAULT_LAMP_LINES.map(LineId::new),
            buzzer_line: LineId::new(DEFAULT_BUZZER_LINE),
            cooldown_ms: DEFAULT_COOLDOWN_MS,
            beep_on_ms: DEFAULT_BEEP_ON_MS,
            beep_off_ms: DEFAULT_BEEP_OFF_MS,
            guard_ms: DEFAULT_GUARD_MS,
            buffer_capacity: STATUS_BUFFER_CAPACITY,
            readiness: ReadinessPolicy::default(),
        }
    }
}

impl CyclerConfig {
    /// Parse a configuration from TOML text and validate it.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the text is not valid TOML, contains
    /// unknown keys, or fails [`validate`](Self::validate).
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)
            .map_err(|e| Error::Config(format!("Failed to parse configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the file cannot be read, or `Error::Config`
    /// if it cannot be parsed or validated.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Validate semantic constraints.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if:
    /// - Two roles share a line
    /// - `buffer_capacity` leaves no room for a payload byte, or is too large
    /// - A beep pulse duration is zero
    /// - The cooldown does not outlast the suppression window
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for line in self.lines() {
            if !seen.insert(line) {
                return Err(Error::Config(format!("{line} is assigned more than once")));
            }
        }

        let capacity_range = MIN_STATUS_BUFFER_CAPACITY..=MAX_STATUS_BUFFER_CAPACITY;
        if !capacity_range.contains(&self.buffer_capacity) {
            return Err(Error::Config(format!(
                "buffer_capacity must be between {MIN_STATUS_BUFFER_CAPACITY} and \
                 {MAX_STATUS_BUFFER_CAPACITY}, got {}",
                self.buffer_capacity
            )));
        }

        if self.beep_on_ms == 0 || self.beep_off_ms == 0 {
            return Err(Error::Config(
                "beep_on_ms and beep_off_ms must be non-zero".to_string(),
            ));
        }

        if self.cooldown() <= self.suppression_window() {
            return Err(Error::Config(format!(
                "cooldown_ms ({}) must exceed the suppression window ({}ms)",
                self.cooldown_ms,
                self.suppression_window().as_millis()
            )));
        }

        Ok(())
    }

    /// Every line the cycler claims: button, lamps, buzzer.
    pub fn lines(&self) -> impl Iterator<Item = LineId> + '_ {
        std::iter::once(self.button_line)
            .chain(self.lamp_lines.iter().copied())
            .chain(std::iter::once(self.buzzer_line))
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    pub fn beep_timing(&self) -> BeepTiming {
        BeepTiming::new(
            Duration::from_millis(self.beep_on_ms),
            Duration::from_millis(self.beep_off_ms),
        )
    }

    /// Short confirmation beep plus the guard interval.
    pub fn suppression_window(&self) -> Duration {
        self.beep_timing().short_duration() + Duration::from_millis(self.guard_ms)
    }

    pub fn machine_timing(&self) -> MachineTiming {
        MachineTiming {
            suppression: self.suppression_window(),
            cooldown: self.cooldown(),
        }
    }
}
