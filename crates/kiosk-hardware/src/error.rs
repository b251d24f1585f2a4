//! Error types for line operations.
//!
//! Every variant here describes a resource that could not be acquired or
//! used. They are fatal at startup and convert into
//! [`kiosk_core::Error::ResourceUnavailable`] when crossing into the
//! feedback layer.

use kiosk_core::LineId;

/// Result type alias for line operations.
pub type Result<T> = std::result::Result<T, HardwareError>;

/// Errors that can occur while claiming or driving lines.
#[derive(Debug, thiserror::Error)]
pub enum HardwareError {
    /// Line does not exist or is already claimed by another user.
    #[error("Line unavailable: {line}")]
    LineUnavailable { line: LineId },

    /// Operation on a line that was never claimed.
    #[error("Line not claimed: {line}")]
    LineNotClaimed { line: LineId },

    /// Line was claimed with the wrong direction for this operation.
    #[error("Line {line} is not configured as {expected}")]
    WrongDirection { line: LineId, expected: &'static str },

    /// Edge interrupt could not be registered.
    #[error("Interrupt unavailable on {line}: {reason}")]
    InterruptUnavailable { line: LineId, reason: String },
}

impl HardwareError {
    /// Create a new line unavailable error.
    pub fn line_unavailable(line: LineId) -> Self {
        Self::LineUnavailable { line }
    }

    /// Create a new not-claimed error.
    pub fn not_claimed(line: LineId) -> Self {
        Self::LineNotClaimed { line }
    }

    /// Create a new interrupt unavailable error.
    pub fn interrupt_unavailable(line: LineId, reason: impl Into<String>) -> Self {
        Self::InterruptUnavailable {
            line,
            reason: reason.into(),
        }
    }
}

impl From<HardwareError> for kiosk_core::Error {
    fn from(error: HardwareError) -> Self {
        kiosk_core::Error::ResourceUnavailable(error.to_string())
    }
}
