//! Line bank trait definitions.
//!
//! This module defines the contract between the feedback core and the
//! platform GPIO facility. The core never enumerates or validates lines
//! itself; it receives a [`GpioLines`] implementation whose lines it claims
//! once at startup and then drives with fire-and-forget writes.
//!
//! Unlike the async device traits used for request/response peripherals,
//! these methods are synchronous: they are called from interrupt callbacks
//! and timer expiries, which must never await.

use crate::error::Result;
use kiosk_core::{Edge, Level, LineDirection, LineId};
use std::fmt;
use std::sync::Arc;

/// Callback invoked from interrupt context when a registered edge fires.
///
/// The platform guarantees a callback is not invoked concurrently with
/// itself for the same line, but it may run concurrently with timer and
/// consumer work.
pub type EdgeCallback = Arc<dyn Fn(LineId, Edge) + Send + Sync>;

/// Opaque handle for a registered edge interrupt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InterruptHandle(u64);

impl InterruptHandle {
    /// Wrap a backend-specific identifier.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for InterruptHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "irq#{}", self.0)
    }
}

/// Platform GPIO line bank.
///
/// # Thread Safety
///
/// All methods take `&self`; implementations use interior mutability so a
/// single bank can be shared as `Arc<dyn GpioLines>` between the interrupt,
/// timer and worker contexts.
///
/// # Examples
///
/// ```
/// use kiosk_core::{Level, LineDirection, LineId};
/// use kiosk_hardware::mock::MockGpio;
/// use kiosk_hardware::traits::GpioLines;
///
/// let (gpio, _handle) = MockGpio::new();
/// let lamp = LineId::new(22);
///
/// gpio.claim(lamp, LineDirection::Output(Level::Low)).unwrap();
/// gpio.set_output(lamp, Level::High);
/// assert_eq!(gpio.read_input(lamp), Level::High);
/// gpio.release(lamp);
/// ```
pub trait GpioLines: Send + Sync {
    /// Claim a line for exclusive use with the given direction.
    ///
    /// # Errors
    ///
    /// Returns an error if the line does not exist or is already claimed.
    fn claim(&self, line: LineId, direction: LineDirection) -> Result<()>;

    /// Release a previously claimed line. Releasing an unclaimed line is a no-op.
    fn release(&self, line: LineId);

    /// Drive an output line. Writes are fire-and-forget.
    fn set_output(&self, line: LineId, level: Level);

    /// Sample the current level of a line.
    fn read_input(&self, line: LineId) -> Level;

    /// Register `callback` to run whenever `edge` is detected on `line`.
    ///
    /// # Errors
    ///
    /// Returns an error if the line is not a claimed input or the platform
    /// cannot allocate an interrupt for it.
    fn register_edge_interrupt(
        &self,
        line: LineId,
        edge: Edge,
        callback: EdgeCallback,
    ) -> Result<InterruptHandle>;

    /// Remove an interrupt registration. Unknown handles are ignored.
    fn unregister_interrupt(&self, handle: InterruptHandle);
}

impl<T: GpioLines + ?Sized> GpioLines for Arc<T> {
    fn claim(&self, line: LineId, direction: LineDirection) -> Result<()> {
        (**self).claim(line, direction)
    }

    fn release(&self, line: LineId) {
        (**self).release(line)
    }

    fn set_output(&self, line: LineId, level: Level) {
        (**self).set_output(line, level)
    }

    fn read_input(&self, line: LineId) -> Level {
        (**self).read_input(line)
    }

    fn register_edge_interrupt(
        &self,
        line: LineId,
        edge: Edge,
        callback: EdgeCallback,
    ) -> Result<InterruptHandle> {
        (**self).register_edge_interrupt(line, edge, callback)
    }

    fn unregister_interrupt(&self, handle: InterruptHandle) {
        (**self).unregister_interrupt(handle)
    }
}
