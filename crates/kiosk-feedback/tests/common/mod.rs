//! Shared fixtures for cycler integration tests.
//!
//! Every test runs on paused tokio time; `settle` advances the clock by a
//! given amount and lets spawned work (timers, beep worker) catch up.

#![allow(dead_code)]

use kiosk_core::{Level, LineId};
use kiosk_feedback::{Cycler, CyclerConfig, ReadinessPolicy};
use kiosk_hardware::mock::{MockGpio, MockGpioHandle};
use std::sync::Arc;
use std::time::Duration;

/// Cooldown used by the default configuration.
pub const COOLDOWN: Duration = Duration::from_millis(5_000);

/// Suppression window of the default configuration (beep on + off + guard).
pub const SUPPRESSION: Duration = Duration::from_millis(400);

/// Long enough for a triple beep to finish playing.
pub const TRIPLE_BEEP: Duration = Duration::from_millis(600);

/// A running cycler on a mock bank.
pub struct Rig {
    pub cycler: Cycler,
    pub gpio: MockGpioHandle,
    pub config: CyclerConfig,
}

impl Rig {
    pub fn start() -> Self {
        Self::with_config(CyclerConfig::default())
    }

    pub fn with_policy(readiness: ReadinessPolicy) -> Self {
        Self::with_config(CyclerConfig {
            readiness,
            ..CyclerConfig::default()
        })
    }

    pub fn with_config(config: CyclerConfig) -> Self {
        let (bank, gpio) = MockGpio::new();
        let cycler = Cycler::start(config.clone(), Arc::new(bank)).expect("cycler should start");
        Self {
            cycler,
            gpio,
            config,
        }
    }

    pub fn press(&self) {
        self.gpio.press(self.config.button_line);
    }

    pub fn state(&self) -> u8 {
        self.cycler.machine().state().as_u8()
    }

    pub fn lamp(&self, index: usize) -> Level {
        self.gpio.level(self.config.lamp_lines[index])
    }

    /// Lamp levels as booleans, lamp 0 first.
    pub fn lamps(&self) -> [bool; 3] {
        [0, 1, 2].map(|i| self.lamp(i).is_high())
    }

    pub fn buzzer(&self) -> LineId {
        self.config.buzzer_line
    }

    pub fn beeps(&self) -> usize {
        self.gpio.high_pulses(self.buzzer())
    }
}

/// Advance paused time by `duration`, running everything that becomes due.
pub async fn settle(duration: Duration) {
    tokio::time::sleep(duration).await;
}
