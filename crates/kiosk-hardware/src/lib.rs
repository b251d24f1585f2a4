//! Line abstraction layer for the kiosk feedback cycler.
//!
//! This crate defines the boundary between the feedback core and the
//! platform GPIO facility: claiming and releasing lines, driving outputs,
//! sampling inputs and registering edge interrupts. The core only ever sees
//! the [`GpioLines`] trait, so the same state machine runs against real
//! hardware or the in-memory [`mock::MockGpio`] bank.
//!
//! # Line Bank
//!
//! ```
//! use kiosk_core::{Edge, Level, LineDirection, LineId};
//! use kiosk_hardware::mock::MockGpio;
//! use kiosk_hardware::traits::GpioLines;
//! use std::sync::Arc;
//!
//! let (gpio, handle) = MockGpio::new();
//! let gpio = Arc::new(gpio);
//! let button = LineId::new(17);
//! let lamp = LineId::new(22);
//!
//! gpio.claim(button, LineDirection::Input).unwrap();
//! gpio.claim(lamp, LineDirection::Output(Level::Low)).unwrap();
//!
//! let bank = gpio.clone();
//! gpio.register_edge_interrupt(button, Edge::Rising, Arc::new(move |_, _| {
//!     bank.set_output(lamp, Level::High);
//! }))
//! .unwrap();
//!
//! handle.press(button);
//! assert_eq!(handle.level(lamp), Level::High);
//! ```
//!
//! # Error Handling
//!
//! All fallible operations return [`Result<T>`][error::Result] with a
//! [`HardwareError`]. These are startup-time conditions; steady-state writes
//! are fire-and-forget.
//!
//! # Thread Safety
//!
//! [`GpioLines`] requires `Send + Sync` and takes `&self` everywhere, so one
//! bank is shared between interrupt callbacks, timer expiries and the
//! sequencer worker.

pub mod claims;
pub mod error;
pub mod mock;
pub mod traits;

pub use claims::{LineClaims, LineRequest};
pub use error::{HardwareError, Result};
pub use traits::{EdgeCallback, GpioLines, InterruptHandle};
