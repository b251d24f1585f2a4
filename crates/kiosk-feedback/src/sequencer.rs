//! Audible confirmation sequencer.
//!
//! Beep patterns are played by a dedicated worker task that owns the pulse
//! timing. The event and timer paths only enqueue a [`BeepPattern`] and
//! return, so a multi-pulse beep never delays edge acceptance.
//!
//! ```text
//! on_button_edge ──► beep_short()  ─┐
//!                                   ├──► queue ──► worker ──► buzzer line
//! on_cooldown_expiry ► beep_triple()┘
//! ```

use kiosk_core::constants::{SEQUENCER_QUEUE_DEPTH, SHORT_BEEP_PULSES, TRIPLE_BEEP_PULSES};
use kiosk_core::{Level, LineId};
use kiosk_hardware::GpioLines;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

/// Fixed beep patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BeepPattern {
    /// One pulse, played when a press is accepted.
    Short,

    /// Three pulses, played when the cooldown expires.
    Triple,
}

impl BeepPattern {
    pub fn pulses(&self) -> u8 {
        match self {
            Self::Short => SHORT_BEEP_PULSES,
            Self::Triple => TRIPLE_BEEP_PULSES,
        }
    }
}

/// On/off timing shared by every pulse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BeepTiming {
    pub on: Duration,
    pub off: Duration,
}

impl BeepTiming {
    pub fn new(on: Duration, off: Duration) -> Self {
        Self { on, off }
    }

    /// Total duration of `pattern`, including the trailing silence.
    pub fn duration(&self, pattern: BeepPattern) -> Duration {
        (self.on + self.off) * u32::from(pattern.pulses())
    }

    pub fn short_duration(&self) -> Duration {
        self.duration(BeepPattern::Short)
    }
}

/// Play `pattern` on `buzzer`, returning once the last pulse has finished.
pub async fn play(gpio: &dyn GpioLines, buzzer: LineId, pattern: BeepPattern, timing: BeepTiming) {
    trace!("Playing {:?} on {}", pattern, buzzer);
    for _ in 0..pattern.pulses() {
        gpio.set_output(buzzer, Level::High);
        tokio::time::sleep(timing.on).await;
        gpio.set_output(buzzer, Level::Low);
        tokio::time::sleep(timing.off).await;
    }
}

/// Handle for enqueuing beeps.
///
/// Cheap to clone. Enqueuing never blocks; when the queue is full the
/// pattern is dropped with a warning.
///
/// The handle tracks when the queue will drain, so each enqueue can report
/// when its pattern is expected to start playing.
#[derive(Debug, Clone)]
pub struct Sequencer {
    tx: mpsc::Sender<BeepPattern>,
    timing: BeepTiming,
    drained_at: Arc<Mutex<Instant>>,
}

impl Sequencer {
    /// Spawn the worker on `runtime`.
    ///
    /// Returns the enqueue handle and the worker task. The worker exits when
    /// every [`Sequencer`] clone has been dropped, or when aborted.
    pub fn spawn(
        gpio: Arc<dyn GpioLines>,
        buzzer: LineId,
        timing: BeepTiming,
        runtime: &Handle,
    ) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<BeepPattern>(SEQUENCER_QUEUE_DEPTH);

        let worker = runtime.spawn(async move {
            while let Some(pattern) = rx.recv().await {
                play(gpio.as_ref(), buzzer, pattern, timing).await;
            }
            gpio.set_output(buzzer, Level::Low);
            debug!("Sequencer worker stopped");
        });

        let sequencer = Self {
            tx,
            timing,
            drained_at: Arc::new(Mutex::new(Instant::now())),
        };
        (sequencer, worker)
    }

    /// Enqueue the single confirmation pulse.
    pub fn beep_short(&self) -> Option<Instant> {
        self.enqueue(BeepPattern::Short)
    }

    /// Enqueue the triple expiry pulse.
    pub fn beep_triple(&self) -> Option<Instant> {
        self.enqueue(BeepPattern::Triple)
    }

    /// Enqueue `pattern`.
    ///
    /// Returns when the pattern should start playing, after everything
    /// already queued, or `None` if it was dropped.
    pub fn enqueue(&self, pattern: BeepPattern) -> Option<Instant> {
        let mut drained_at = self.drained_at.lock().unwrap_or_else(PoisonError::into_inner);
        match self.tx.try_send(pattern) {
            Ok(()) => {
                let starts_at = (*drained_at).max(Instant::now());
                *drained_at = starts_at + self.timing.duration(pattern);
                Some(starts_at)
            }
            Err(TrySendError::Full(pattern)) => {
                warn!("Beep queue full - dropping {:?}", pattern);
                None
            }
            Err(TrySendError::Closed(pattern)) => {
                debug!("Sequencer stopped - dropping {:?}", pattern);
                None
            }
        }
    }
}
