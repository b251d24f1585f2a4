//! Debounce/cooldown state machine.
//!
//! This module owns the feedback state and decides, for every rising edge on
//! the button line, whether the press is accepted or suppressed.
//!
//! # Phases
//!
//! - `Idle`: no suppression window, no cooldown pending
//! - `Suppressed`: a press was just accepted; further edges are dropped
//! - `CoolingDown`: suppression over, cooldown timer still pending
//!
//! # Transitions
//!
//! ```text
//!            edge (accepted)               suppression elapses
//! Idle ──────────────────────► Suppressed ─────────────────────► CoolingDown
//!  ▲                              │  ▲                               │
//!  │                    edge      │  │ edge (accepted, timer re-armed)│
//!  │                  (dropped) ◄─┘  └───────────────────────────────┤
//!  │                                                                 │
//!  └──────────────────── cooldown expiry (report + reset) ◄──────────┘
//! ```
//!
//! # Concurrency
//!
//! The interrupt callback, the timer expiry and inspection calls all go
//! through one mutex around the machine state. Lamp writes happen under that
//! lock so the lamps always match the state. Beeps are only enqueued, and
//! the status channel is written after the machine lock is released.
//!
//! Each armed timer carries a generation number. An expiry whose
//! generation no longer matches the pending timer was cancelled while
//! already in flight and is discarded.
//!
//! # Examples
//!
//! ```
//! use kiosk_feedback::state_machine::{EdgeOutcome, FeedbackMachine, MachineTiming};
//! use kiosk_feedback::{Indicator, Sequencer, StatusChannel, TokioScheduler};
//! use kiosk_feedback::sequencer::BeepTiming;
//! use kiosk_core::{FeedbackState, Level, LineDirection, LineId};
//! use kiosk_hardware::{GpioLines, mock::MockGpio};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> kiosk_core::Result<()> {
//!     let (gpio, _handle) = MockGpio::new();
//!     let gpio: Arc<dyn GpioLines> = Arc::new(gpio);
//!     let lamps = [LineId::new(22), LineId::new(23), LineId::new(24)];
//!     for lamp in lamps.iter().chain([LineId::new(27)].iter()) {
//!         gpio.claim(*lamp, LineDirection::Output(Level::Low))?;
//!     }
//!
//!     let beep = BeepTiming::new(Duration::from_millis(100), Duration::from_millis(100));
//!     let (sequencer, _worker) = Sequencer::spawn(
//!         gpio.clone(),
//!         LineId::new(27),
//!         beep,
//!         &tokio::runtime::Handle::current(),
//!     );
//!     let machine = FeedbackMachine::new(
//!         Indicator::new(gpio.clone(), lamps),
//!         sequencer,
//!         StatusChannel::default(),
//!         Arc::new(TokioScheduler::current()?),
//!         MachineTiming::default(),
//!     );
//!
//!     let outcome = machine.on_button_edge();
//!     assert_eq!(outcome, EdgeOutcome::Accepted(FeedbackState::new(1)?));
//!     assert_eq!(machine.on_button_edge(), EdgeOutcome::Suppressed);
//!     Ok(())
//! }
//! ```

use crate::channel::StatusChannel;
use crate::indicator::Indicator;
use crate::scheduler::{DeferredScheduler, TimerHandle};
use crate::sequencer::Sequencer;
use kiosk_core::FeedbackState;
use kiosk_core::constants::{
    DEFAULT_BEEP_OFF_MS, DEFAULT_BEEP_ON_MS, DEFAULT_COOLDOWN_MS, DEFAULT_GUARD_MS,
};
use kiosk_hardware::EdgeCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, trace};

/// Timing parameters of the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MachineTiming {
    /// How long further edges are dropped once the confirmation beep starts.
    pub suppression: Duration,

    /// Delay from the last accepted press to the report-and-reset expiry.
    pub cooldown: Duration,
}

impl Default for MachineTiming {
    fn default() -> Self {
        Self {
            suppression: Duration::from_millis(
                DEFAULT_BEEP_ON_MS + DEFAULT_BEEP_OFF_MS + DEFAULT_GUARD_MS,
            ),
            cooldown: Duration::from_millis(DEFAULT_COOLDOWN_MS),
        }
    }
}

/// Result of handling one button edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeOutcome {
    /// The press advanced the indicator to this state.
    Accepted(FeedbackState),

    /// The press arrived inside the suppression window and was dropped.
    Suppressed,
}

/// Observable phase of the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Suppressed,
    CoolingDown,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "Idle",
            Phase::Suppressed => "Suppressed",
            Phase::CoolingDown => "CoolingDown",
        };
        write!(f, "{}", name)
    }
}

/// Counters describing what the machine has done since start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CyclerStats {
    /// Edges that advanced the state.
    pub accepted_edges: u64,

    /// Edges dropped inside the suppression window.
    pub suppressed_edges: u64,

    /// Cooldown expiries that reported and reset the state.
    pub expiries: u64,

    /// Pending timers cancelled by a newer press or by shutdown.
    pub cancelled_timers: u64,

    /// Expiries discarded because their timer had been superseded.
    pub stale_expiries: u64,
}

#[derive(Default)]
struct Counters {
    accepted_edges: AtomicU64,
    suppressed_edges: AtomicU64,
    expiries: AtomicU64,
    cancelled_timers: AtomicU64,
    stale_expiries: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> CyclerStats {
        CyclerStats {
            accepted_edges: self.accepted_edges.load(Ordering::Relaxed),
            suppressed_edges: self.suppressed_edges.load(Ordering::Relaxed),
            expiries: self.expiries.load(Ordering::Relaxed),
            cancelled_timers: self.cancelled_timers.load(Ordering::Relaxed),
            stale_expiries: self.stale_expiries.load(Ordering::Relaxed),
        }
    }
}

struct PendingTimer {
    generation: u64,
    handle: TimerHandle,
}

/// Mutable machine state, guarded by one lock.
struct MachineState {
    feedback: FeedbackState,
    /// End of the suppression window; the cooldown flag is `now < deadline`.
    suppressed_until: Option<Instant>,
    pending: Option<PendingTimer>,
    generation: u64,
}

impl MachineState {
    fn cooldown_active(&self, now: Instant) -> bool {
        self.suppressed_until.is_some_and(|deadline| now < deadline)
    }
}

struct Inner {
    state: Mutex<MachineState>,
    indicator: Indicator,
    sequencer: Sequencer,
    channel: StatusChannel,
    scheduler: Arc<dyn DeferredScheduler>,
    timing: MachineTiming,
    counters: Counters,
}

/// The debounce/cooldown state machine.
///
/// Cheap to clone; clones drive the same machine.
#[derive(Clone)]
pub struct FeedbackMachine {
    inner: Arc<Inner>,
}

impl FeedbackMachine {
    /// Create a machine in state 0 with all lamps off.
    pub fn new(
        indicator: Indicator,
        sequencer: Sequencer,
        channel: StatusChannel,
        scheduler: Arc<dyn DeferredScheduler>,
        timing: MachineTiming,
    ) -> Self {
        indicator.clear();
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(MachineState {
                    feedback: FeedbackState::IDLE,
                    suppressed_until: None,
                    pending: None,
                    generation: 0,
                }),
                indicator,
                sequencer,
                channel,
                scheduler,
                timing,
                counters: Counters::default(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MachineState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Handle one rising edge on the button line.
    ///
    /// Inside the suppression window the edge is dropped without touching
    /// the state, lamps, buzzer or timer. Otherwise the pending cooldown is
    /// cancelled, the state advances, the lamp follows, the short beep is
    /// enqueued and a fresh cooldown is armed.
    ///
    /// The suppression window starts when the short beep starts playing, so
    /// a beep queued behind an expiry's triple beep is still covered.
    pub fn on_button_edge(&self) -> EdgeOutcome {
        let now = Instant::now();
        let mut state = self.lock();

        if state.cooldown_active(now) {
            Counters::bump(&self.inner.counters.suppressed_edges);
            debug!("Edge suppressed (state {})", state.feedback);
            return EdgeOutcome::Suppressed;
        }

        self.cancel_pending_locked(&mut state);

        let beep_start = self.inner.sequencer.beep_short().unwrap_or(now);
        state.suppressed_until = Some(beep_start + self.inner.timing.suppression);
        state.feedback = state.feedback.next();
        let feedback = state.feedback;
        self.inner.indicator.show(feedback);

        state.generation += 1;
        let generation = state.generation;
        let machine = Arc::downgrade(&self.inner);
        let handle = self.inner.scheduler.schedule_after(
            self.inner.timing.cooldown,
            Box::new(move || Self::fire(machine, generation)),
        );
        state.pending = Some(PendingTimer { generation, handle });
        drop(state);

        Counters::bump(&self.inner.counters.accepted_edges);
        debug!("Edge accepted - state {} ({})", feedback, handle);

        EdgeOutcome::Accepted(feedback)
    }

    /// Report the current state and reset.
    ///
    /// Publishes the state to the status channel, enqueues the triple beep,
    /// resets to state 0 and clears the lamps. Called by the cooldown timer;
    /// calling it directly also cancels any pending timer. Returns the state
    /// that was reported.
    pub fn on_cooldown_expiry(&self) -> FeedbackState {
        let mut state = self.lock();
        self.cancel_pending_locked(&mut state);
        let reported = self.reset_locked(&mut state);
        drop(state);

        self.report(reported);
        reported
    }

    fn fire(machine: Weak<Inner>, generation: u64) {
        let Some(inner) = machine.upgrade() else {
            return;
        };
        let machine = FeedbackMachine { inner };

        let mut state = machine.lock();
        match state.pending.as_ref() {
            Some(pending) if pending.generation == generation => {
                state.pending = None;
            }
            _ => {
                Counters::bump(&machine.inner.counters.stale_expiries);
                debug!("Discarding stale cooldown expiry (generation {})", generation);
                return;
            }
        }
        let reported = machine.reset_locked(&mut state);
        drop(state);

        machine.report(reported);
    }

    fn reset_locked(&self, state: &mut MachineState) -> FeedbackState {
        let reported = state.feedback;
        state.feedback = FeedbackState::IDLE;
        state.suppressed_until = None;
        self.inner.indicator.clear();
        reported
    }

    fn report(&self, reported: FeedbackState) {
        self.inner.channel.publish(reported);
        self.inner.sequencer.beep_triple();
        Counters::bump(&self.inner.counters.expiries);
        info!("Cooldown expired - reported state {}", reported);
    }

    fn cancel_pending_locked(&self, state: &mut MachineState) -> bool {
        let Some(pending) = state.pending.take() else {
            return false;
        };
        if self.inner.scheduler.cancel(pending.handle) {
            Counters::bump(&self.inner.counters.cancelled_timers);
            trace!("Cancelled {}", pending.handle);
        }
        true
    }

    /// Cancel the pending cooldown without reporting. Used at shutdown.
    pub fn cancel_pending(&self) -> bool {
        let mut state = self.lock();
        self.cancel_pending_locked(&mut state)
    }

    /// Interrupt callback that feeds edges into this machine.
    ///
    /// Holds only a weak reference, so a registration outliving the machine
    /// becomes a no-op.
    pub fn edge_callback(&self) -> EdgeCallback {
        let machine = Arc::downgrade(&self.inner);
        Arc::new(move |line, edge| {
            if let Some(inner) = machine.upgrade() {
                trace!("{} edge on {}", edge, line);
                FeedbackMachine { inner }.on_button_edge();
            }
        })
    }

    pub fn state(&self) -> FeedbackState {
        self.lock().feedback
    }

    /// Whether edges are currently being suppressed.
    pub fn cooldown_active(&self) -> bool {
        self.lock().cooldown_active(Instant::now())
    }

    pub fn timer_pending(&self) -> bool {
        self.lock().pending.is_some()
    }

    pub fn phase(&self) -> Phase {
        let state = self.lock();
        if state.cooldown_active(Instant::now()) {
            Phase::Suppressed
        } else if state.pending.is_some() {
            Phase::CoolingDown
        } else {
            Phase::Idle
        }
    }

    pub fn timing(&self) -> MachineTiming {
        self.inner.timing
    }

    pub fn channel(&self) -> &StatusChannel {
        &self.inner.channel
    }

    pub fn indicator(&self) -> &Indicator {
        &self.inner.indicator
    }

    pub fn stats(&self) -> CyclerStats {
        self.inner.counters.snapshot()
    }
}

impl fmt::Debug for FeedbackMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeedbackMachine")
            .field("state", &self.state())
            .field("phase", &self.phase())
            .field("timing", &self.inner.timing)
            .finish()
    }
}
