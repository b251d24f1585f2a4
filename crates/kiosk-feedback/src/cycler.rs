//! Cycler lifecycle.
//!
//! [`Cycler`] wires the line bank, sequencer, scheduler, status channel and
//! state machine together and owns their teardown.
//!
//! # Startup
//!
//! 1. Validate the configuration
//! 2. Claim the button (input), lamps and buzzer (outputs, driven low);
//!    all or nothing
//! 3. Spawn the sequencer worker
//! 4. Build the status channel and the state machine
//! 5. Register the rising-edge interrupt on the button line
//!
//! A failure at any step undoes the steps before it.
//!
//! # Shutdown
//!
//! Reverse order: unregister the interrupt so no new edges arrive, cancel
//! the pending cooldown, stop the sequencer and force the buzzer low, clear
//! the lamps, release every line.
//!
//! # Examples
//!
//! ```
//! use kiosk_feedback::{Cycler, CyclerConfig};
//! use kiosk_hardware::mock::MockGpio;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> kiosk_core::Result<()> {
//!     let config = CyclerConfig::default();
//!     let button = config.button_line;
//!     let (gpio, handle) = MockGpio::new();
//!
//!     let cycler = Cycler::start(config, Arc::new(gpio))?;
//!     handle.press(button);
//!     assert_eq!(cycler.machine().state().as_u8(), 1);
//!
//!     cycler.shutdown();
//!     assert_eq!(handle.claimed_count(), 0);
//!     Ok(())
//! }
//! ```

use crate::channel::{StatusChannel, StatusEndpoint};
use crate::config::CyclerConfig;
use crate::indicator::Indicator;
use crate::scheduler::TokioScheduler;
use crate::sequencer::Sequencer;
use crate::state_machine::{CyclerStats, FeedbackMachine};
use kiosk_core::{Edge, Error, Level, LineDirection, Result};
use kiosk_hardware::{GpioLines, InterruptHandle, LineClaims, LineRequest};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// A running feedback cycler.
///
/// Dropping a cycler performs the same teardown as [`shutdown`](Self::shutdown).
pub struct Cycler {
    config: CyclerConfig,
    gpio: Arc<dyn GpioLines>,
    machine: FeedbackMachine,
    channel: StatusChannel,
    interrupt: Option<InterruptHandle>,
    sequencer_task: Option<JoinHandle<()>>,
    claims: Option<LineClaims>,
}

impl Cycler {
    /// Validate `config`, acquire the lines and start handling edges.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// - `Error::Config` if the configuration is invalid
    /// - `Error::Runtime` if there is no current tokio runtime
    /// - `Error::ResourceUnavailable` if a line cannot be claimed or the
    ///   interrupt cannot be registered; nothing stays claimed
    pub fn start(config: CyclerConfig, gpio: Arc<dyn GpioLines>) -> Result<Self> {
        config.validate()?;
        let runtime = Handle::try_current()
            .map_err(|e| Error::Runtime(format!("No tokio runtime available: {e}")))?;

        let claims = LineClaims::acquire(gpio.clone(), &Self::line_requests(&config))?;

        let (sequencer, sequencer_task) = Sequencer::spawn(
            gpio.clone(),
            config.buzzer_line,
            config.beep_timing(),
            &runtime,
        );
        let channel = StatusChannel::new(config.buffer_capacity, config.readiness);
        let machine = FeedbackMachine::new(
            Indicator::new(gpio.clone(), config.lamp_lines),
            sequencer,
            channel.clone(),
            Arc::new(TokioScheduler::new(runtime)),
            config.machine_timing(),
        );

        let interrupt = match gpio.register_edge_interrupt(
            config.button_line,
            Edge::Rising,
            machine.edge_callback(),
        ) {
            Ok(interrupt) => interrupt,
            Err(e) => {
                sequencer_task.abort();
                // `claims` is dropped here, releasing every line.
                return Err(e.into());
            }
        };

        info!(
            "Cycler started: button {}, lamps {:?}, buzzer {}, cooldown {}ms",
            config.button_line, config.lamp_lines, config.buzzer_line, config.cooldown_ms
        );

        Ok(Self {
            config,
            gpio,
            machine,
            channel,
            interrupt: Some(interrupt),
            sequencer_task: Some(sequencer_task),
            claims: Some(claims),
        })
    }

    fn line_requests(config: &CyclerConfig) -> Vec<LineRequest> {
        let output = LineDirection::Output(Level::Low);
        std::iter::once(LineRequest::new(config.button_line, LineDirection::Input))
            .chain(
                config
                    .lamp_lines
                    .iter()
                    .map(|lamp| LineRequest::new(*lamp, output)),
            )
            .chain(std::iter::once(LineRequest::new(config.buzzer_line, output)))
            .collect()
    }

    pub fn config(&self) -> &CyclerConfig {
        &self.config
    }

    pub fn machine(&self) -> &FeedbackMachine {
        &self.machine
    }

    pub fn channel(&self) -> &StatusChannel {
        &self.channel
    }

    /// Open a consumer endpoint on the status channel.
    pub fn open(&self) -> StatusEndpoint {
        self.channel.open()
    }

    pub fn stats(&self) -> CyclerStats {
        self.machine.stats()
    }

    /// Stop handling edges and release every resource.
    pub fn shutdown(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        let Some(claims) = self.claims.take() else {
            return;
        };

        if let Some(interrupt) = self.interrupt.take() {
            self.gpio.unregister_interrupt(interrupt);
            debug!("Unregistered {}", interrupt);
        }
        if self.machine.cancel_pending() {
            debug!("Cancelled pending cooldown");
        }
        if let Some(task) = self.sequencer_task.take() {
            task.abort();
        }
        self.gpio.set_output(self.config.buzzer_line, Level::Low);
        self.machine.indicator().clear();
        drop(claims);

        info!("Cycler stopped");
    }
}

impl Drop for Cycler {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl std::fmt::Debug for Cycler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cycler")
            .field("config", &self.config)
            .field("machine", &self.machine)
            .field("running", &self.claims.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiosk_core::LineId;
    use kiosk_hardware::mock::MockGpio;
    use rstest::rstest;

    #[tokio::test(start_paused = true)]
    async fn test_start_claims_all_lines() {
        let (gpio, handle) = MockGpio::new();
        let cycler = Cycler::start(CyclerConfig::default(), Arc::new(gpio)).unwrap();

        assert_eq!(handle.claimed_count(), 5);
        assert_eq!(handle.interrupt_count(), 1);
        drop(cycler);
        assert_eq!(handle.claimed_count(), 0);
        assert_eq!(handle.interrupt_count(), 0);
    }

    #[rstest]
    #[case(0)]
    #[case(usize::MAX)]
    #[tokio::test(start_paused = true)]
    async fn test_invalid_capacity_claims_nothing(#[case] buffer_capacity: usize) {
        let (gpio, handle) = MockGpio::new();
        let config = CyclerConfig {
            buffer_capacity,
            ..CyclerConfig::default()
        };

        assert!(matches!(
            Cycler::start(config, Arc::new(gpio)),
            Err(Error::Config(_))
        ));
        assert_eq!(handle.claimed_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unavailable_line_rolls_back() {
        let (gpio, handle) = MockGpio::new();
        handle.make_unavailable(LineId::new(27));

        let result = Cycler::start(CyclerConfig::default(), Arc::new(gpio));

        assert!(matches!(result, Err(Error::ResourceUnavailable(_))));
        assert_eq!(handle.claimed_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_interrupt_failure_rolls_back() {
        let (gpio, handle) = MockGpio::new();
        handle.fail_interrupts(true);

        let result = Cycler::start(CyclerConfig::default(), Arc::new(gpio));

        assert!(matches!(result, Err(Error::ResourceUnavailable(_))));
        assert_eq!(handle.claimed_count(), 0);
    }

    #[test]
    fn test_start_outside_runtime_fails() {
        let (gpio, handle) = MockGpio::new();
        let result = Cycler::start(CyclerConfig::default(), Arc::new(gpio));

        assert!(matches!(result, Err(Error::Runtime(_))));
        assert_eq!(handle.claimed_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_pending_cooldown() {
        let config = CyclerConfig::default();
        let button = config.button_line;
        let (gpio, handle) = MockGpio::new();
        let cycler = Cycler::start(config.clone(), Arc::new(gpio)).unwrap();
        let channel = cycler.channel().clone();

        handle.press(button);
        assert!(cycler.machine().timer_pending());
        cycler.shutdown();

        tokio::time::sleep(config.cooldown() * 2).await;
        assert!(channel.is_empty());
        for lamp in config.lamp_lines {
            assert_eq!(handle.level(lamp), Level::Low);
        }
    }
}
