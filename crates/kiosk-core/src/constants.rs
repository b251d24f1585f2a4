//! Core constants for the kiosk feedback cycler.
//!
//! This module centralizes the line assignments, timings and buffer sizes
//! used as defaults throughout the workspace. Every value here can be
//! overridden through the cycler configuration; these are the values the
//! kiosk panel ships with.
//!
//! # Timing Model
//!
//! ```text
//! press ──┬── short beep (on + off) ──┬── guard ──┐
//!         │                           │           │
//!         └────── suppression window ─────────────┘
//!         └──────────────────────── cooldown ──────────────── expiry
//! ```
//!
//! Edges arriving inside the suppression window are dropped. If no edge is
//! accepted before the cooldown elapses, the settled state is reported to
//! the status channel and the indicator resets.
//!
//! # Usage
//!
//! ```
//! use kiosk_core::constants::*;
//! use std::time::Duration;
//!
//! let suppression = Duration::from_millis(
//!     DEFAULT_BEEP_ON_MS + DEFAULT_BEEP_OFF_MS + DEFAULT_GUARD_MS,
//! );
//! assert!(suppression < Duration::from_millis(DEFAULT_COOLDOWN_MS));
//! ```

// ============================================================================
// Feedback States
// ============================================================================

/// Number of distinct feedback states (and lamps).
pub const FEEDBACK_STATE_COUNT: u8 = 3;

/// Number of lamp outputs driven by the indicator.
pub const LAMP_COUNT: usize = FEEDBACK_STATE_COUNT as usize;

// ============================================================================
// Line Assignments
// ============================================================================

/// Default input line wired to the push button.
pub const DEFAULT_BUTTON_LINE: u32 = 17;

/// Default output lines for the three lamps, indexed by feedback state.
pub const DEFAULT_LAMP_LINES: [u32; LAMP_COUNT] = [22, 23, 24];

/// Default output line wired to the buzzer.
pub const DEFAULT_BUZZER_LINE: u32 = 27;

// ============================================================================
// Timings (milliseconds)
// ============================================================================

/// Delay after the last accepted press before the state is reported and reset.
pub const DEFAULT_COOLDOWN_MS: u64 = 5_000;

/// Buzzer on-time for one pulse.
pub const DEFAULT_BEEP_ON_MS: u64 = 100;

/// Silence after each pulse.
pub const DEFAULT_BEEP_OFF_MS: u64 = 100;

/// Extra suppression after the confirmation beep to absorb contact bounce.
pub const DEFAULT_GUARD_MS: u64 = 200;

/// Pulses emitted when a press is accepted.
pub const SHORT_BEEP_PULSES: u8 = 1;

/// Pulses emitted when the cooldown expires.
pub const TRIPLE_BEEP_PULSES: u8 = 3;

// ============================================================================
// Status Channel
// ============================================================================

/// Status buffer capacity in bytes, including the reserved terminator byte.
///
/// # Examples
///
/// ```
/// use kiosk_core::constants::{STATUS_BUFFER_CAPACITY, usable_capacity};
///
/// assert_eq!(usable_capacity(STATUS_BUFFER_CAPACITY), 63);
/// ```
pub const STATUS_BUFFER_CAPACITY: usize = 64;

/// Smallest capacity that still leaves room for one payload byte.
pub const MIN_STATUS_BUFFER_CAPACITY: usize = 2;

/// Largest capacity accepted from configuration.
pub const MAX_STATUS_BUFFER_CAPACITY: usize = 4096;

/// Queue depth for pending beep patterns.
pub const SEQUENCER_QUEUE_DEPTH: usize = 8;

/// Number of payload bytes a buffer of `capacity` bytes accepts.
#[must_use]
pub const fn usable_capacity(capacity: usize) -> usize {
    capacity.saturating_sub(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_lines_are_distinct() {
        let mut lines = DEFAULT_LAMP_LINES.to_vec();
        lines.push(DEFAULT_BUTTON_LINE);
        lines.push(DEFAULT_BUZZER_LINE);
        lines.sort_unstable();
        lines.dedup();
        assert_eq!(lines.len(), LAMP_COUNT + 2);
    }

    #[test]
    fn test_suppression_shorter_than_cooldown() {
        assert!(DEFAULT_BEEP_ON_MS + DEFAULT_BEEP_OFF_MS + DEFAULT_GUARD_MS < DEFAULT_COOLDOWN_MS);
    }

    #[test]
    fn test_usable_capacity() {
        assert_eq!(usable_capacity(64), 63);
        assert_eq!(usable_capacity(1), 0);
        assert_eq!(usable_capacity(0), 0);
    }
}
