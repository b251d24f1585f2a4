//! Mock line bank implementation for testing and development.
//!
//! This module provides a simulated GPIO bank that can be driven
//! programmatically without requiring physical hardware.

pub mod gpio;

pub use gpio::{MockGpio, MockGpioHandle};
