//! Mock line bank for testing and development.
//!
//! This module provides a simulated GPIO bank that records every output
//! write and lets tests drive input lines programmatically, firing the
//! registered edge callbacks synchronously on the caller's thread the way a
//! platform interrupt would.

use crate::{
    Result,
    error::HardwareError,
    traits::{EdgeCallback, GpioLines, InterruptHandle},
};
use kiosk_core::{Edge, Level, LineDirection, LineId};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

struct Registration {
    line: LineId,
    edge: Edge,
    callback: EdgeCallback,
}

#[derive(Default)]
struct MockState {
    claimed: HashMap<LineId, LineDirection>,
    levels: HashMap<LineId, Level>,
    writes: Vec<(LineId, Level)>,
    interrupts: HashMap<u64, Registration>,
    next_interrupt: u64,
    unavailable: HashSet<LineId>,
    interrupts_unavailable: bool,
}

fn lock(state: &Mutex<MockState>) -> MutexGuard<'_, MockState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Mock GPIO bank.
///
/// Every line exists unless explicitly marked unavailable through the
/// [`MockGpioHandle`].
///
/// # Examples
///
/// ```
/// use kiosk_core::{Edge, LineDirection, LineId};
/// use kiosk_hardware::mock::MockGpio;
/// use kiosk_hardware::traits::GpioLines;
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// let (gpio, handle) = MockGpio::new();
/// let button = LineId::new(17);
/// gpio.claim(button, LineDirection::Input).unwrap();
///
/// let edges = Arc::new(AtomicUsize::new(0));
/// let counter = edges.clone();
/// gpio.register_edge_interrupt(button, Edge::Rising, Arc::new(move |_, _| {
///     counter.fetch_add(1, Ordering::SeqCst);
/// }))
/// .unwrap();
///
/// handle.press(button);
/// assert_eq!(edges.load(Ordering::SeqCst), 1);
/// ```
pub struct MockGpio {
    state: Arc<Mutex<MockState>>,
}

impl MockGpio {
    /// Create a new mock bank.
    ///
    /// Returns a tuple of (MockGpio, MockGpioHandle) where the handle
    /// drives inputs and inspects outputs.
    pub fn new() -> (Self, MockGpioHandle) {
        let state = Arc::new(Mutex::new(MockState::default()));
        let handle = MockGpioHandle {
            state: state.clone(),
        };
        (Self { state }, handle)
    }
}

impl std::fmt::Debug for MockGpio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = lock(&self.state);
        f.debug_struct("MockGpio")
            .field("claimed", &state.claimed.len())
            .field("interrupts", &state.interrupts.len())
            .finish()
    }
}

impl GpioLines for MockGpio {
    fn claim(&self, line: LineId, direction: LineDirection) -> Result<()> {
        let mut state = lock(&self.state);
        if state.unavailable.contains(&line) || state.claimed.contains_key(&line) {
            return Err(HardwareError::line_unavailable(line));
        }
        state.claimed.insert(line, direction);
        if let LineDirection::Output(initial) = direction {
            state.levels.insert(line, initial);
        }
        Ok(())
    }

    fn release(&self, line: LineId) {
        let mut state = lock(&self.state);
        if state.claimed.remove(&line).is_some() {
            state.interrupts.retain(|_, registration| registration.line != line);
        }
    }

    fn set_output(&self, line: LineId, level: Level) {
        let mut state = lock(&self.state);
        match state.claimed.get(&line) {
            Some(LineDirection::Output(_)) => {
                state.levels.insert(line, level);
                state.writes.push((line, level));
            }
            _ => tracing::warn!("Ignoring write to {} which is not a claimed output", line),
        }
    }

    fn read_input(&self, line: LineId) -> Level {
        lock(&self.state).levels.get(&line).copied().unwrap_or_default()
    }

    fn register_edge_interrupt(
        &self,
        line: LineId,
        edge: Edge,
        callback: EdgeCallback,
    ) -> Result<InterruptHandle> {
        let mut state = lock(&self.state);
        match state.claimed.get(&line) {
            Some(LineDirection::Input) => {}
            Some(LineDirection::Output(_)) => {
                return Err(HardwareError::WrongDirection {
                    line,
                    expected: "input",
                });
            }
            None => return Err(HardwareError::not_claimed(line)),
        }
        if state.interrupts_unavailable {
            return Err(HardwareError::interrupt_unavailable(line, "no free interrupt"));
        }

        state.next_interrupt += 1;
        let id = state.next_interrupt;
        state.interrupts.insert(
            id,
            Registration {
                line,
                edge,
                callback,
            },
        );
        Ok(InterruptHandle::new(id))
    }

    fn unregister_interrupt(&self, handle: InterruptHandle) {
        lock(&self.state).interrupts.remove(&handle.id());
    }
}

/// Handle for driving and inspecting a mock bank.
///
/// This handle can be cloned and shared across tasks.
#[derive(Clone)]
pub struct MockGpioHandle {
    state: Arc<Mutex<MockState>>,
}

impl MockGpioHandle {
    /// Drive an input line to `level`, firing matching edge callbacks.
    ///
    /// Callbacks run synchronously after the bank's lock is released, so
    /// they may call back into the bank.
    pub fn set_input(&self, line: LineId, level: Level) {
        let callbacks: Vec<(Edge, EdgeCallback)> = {
            let mut state = lock(&self.state);
            let previous = state.levels.insert(line, level).unwrap_or_default();
            state
                .interrupts
                .values()
                .filter(|r| r.line == line && r.edge.matches(previous, level))
                .map(|r| {
                    let fired = if previous == Level::Low {
                        Edge::Rising
                    } else {
                        Edge::Falling
                    };
                    (fired, r.callback.clone())
                })
                .collect()
        };

        for (edge, callback) in callbacks {
            callback(line, edge);
        }
    }

    /// Simulate one clean press: a rising edge followed by a falling edge.
    pub fn press(&self, line: LineId) {
        self.set_input(line, Level::High);
        self.set_input(line, Level::Low);
    }

    /// Simulate a bouncing contact producing `edges` rising edges back to back.
    pub fn bounce(&self, line: LineId, edges: usize) {
        for _ in 0..edges {
            self.press(line);
        }
    }

    /// Current level of a line.
    pub fn level(&self, line: LineId) -> Level {
        lock(&self.state).levels.get(&line).copied().unwrap_or_default()
    }

    /// Every level written to `line`, oldest first.
    pub fn writes_to(&self, line: LineId) -> Vec<Level> {
        lock(&self.state)
            .writes
            .iter()
            .filter(|(l, _)| *l == line)
            .map(|(_, level)| *level)
            .collect()
    }

    /// Number of times `line` was driven high.
    pub fn high_pulses(&self, line: LineId) -> usize {
        self.writes_to(line).iter().filter(|l| l.is_high()).count()
    }

    /// Forget the recorded write history.
    pub fn clear_history(&self) {
        lock(&self.state).writes.clear();
    }

    /// Check whether a line is currently claimed.
    pub fn is_claimed(&self, line: LineId) -> bool {
        lock(&self.state).claimed.contains_key(&line)
    }

    /// Number of currently claimed lines.
    pub fn claimed_count(&self) -> usize {
        lock(&self.state).claimed.len()
    }

    /// Number of live interrupt registrations.
    pub fn interrupt_count(&self) -> usize {
        lock(&self.state).interrupts.len()
    }

    /// Make future claims of `line` fail.
    pub fn make_unavailable(&self, line: LineId) {
        lock(&self.state).unavailable.insert(line);
    }

    /// Make future interrupt registrations fail.
    pub fn fail_interrupts(&self, fail: bool) {
        lock(&self.state).interrupts_unavailable = fail;
    }
}

impl std::fmt::Debug for MockGpioHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockGpioHandle").finish_non_exhaustive()
    }
}
