//! All-or-nothing line acquisition.
//!
//! Startup claims every line the cycler needs through [`LineClaims`]. If any
//! claim fails, the lines already claimed are released before the error is
//! returned, so a failed startup never leaves the bank partially owned.
//!
//! ```text
//! acquire([button, lamp0, lamp1, lamp2, buzzer])
//!     claim button ✓
//!     claim lamp0  ✓
//!     claim lamp1  ✗ ──► release lamp0, release button ──► Err(LineUnavailable)
//! ```
//!
//! A successful [`LineClaims`] releases its lines when dropped, in reverse
//! claim order.

use crate::Result;
use crate::traits::GpioLines;
use kiosk_core::{LineDirection, LineId};
use std::sync::Arc;
use tracing::{debug, warn};

/// A single line request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRequest {
    pub line: LineId,
    pub direction: LineDirection,
}

impl LineRequest {
    pub fn new(line: LineId, direction: LineDirection) -> Self {
        Self { line, direction }
    }
}

/// Set of claimed lines, released on drop.
///
/// # Examples
///
/// ```
/// use kiosk_core::{Level, LineDirection, LineId};
/// use kiosk_hardware::claims::{LineClaims, LineRequest};
/// use kiosk_hardware::mock::MockGpio;
/// use std::sync::Arc;
///
/// let (gpio, handle) = MockGpio::new();
/// let claims = LineClaims::acquire(
///     Arc::new(gpio),
///     &[
///         LineRequest::new(LineId::new(17), LineDirection::Input),
///         LineRequest::new(LineId::new(22), LineDirection::Output(Level::Low)),
///     ],
/// )
/// .unwrap();
///
/// assert_eq!(handle.claimed_count(), 2);
/// drop(claims);
/// assert_eq!(handle.claimed_count(), 0);
/// ```
pub struct LineClaims {
    gpio: Arc<dyn GpioLines>,
    lines: Vec<LineId>,
}

impl LineClaims {
    /// Claim every requested line or none of them.
    ///
    /// # Errors
    ///
    /// Returns the first claim error after releasing the lines claimed so far.
    pub fn acquire(gpio: Arc<dyn GpioLines>, requests: &[LineRequest]) -> Result<Self> {
        let mut claims = Self {
            gpio,
            lines: Vec::with_capacity(requests.len()),
        };

        for request in requests {
            if let Err(e) = claims.gpio.claim(request.line, request.direction) {
                warn!(
                    "Failed to claim {}: {} - releasing {} claimed line(s)",
                    request.line,
                    e,
                    claims.lines.len()
                );
                // Dropping `claims` releases everything acquired so far.
                return Err(e);
            }
            debug!("Claimed {} as {:?}", request.line, request.direction);
            claims.lines.push(request.line);
        }

        Ok(claims)
    }

    /// Lines held, in claim order.
    pub fn lines(&self) -> &[LineId] {
        &self.lines
    }
}

impl Drop for LineClaims {
    fn drop(&mut self) {
        while let Some(line) = self.lines.pop() {
            self.gpio.release(line);
            debug!("Released {}", line);
        }
    }
}

impl std::fmt::Debug for LineClaims {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineClaims")
            .field("lines", &self.lines)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HardwareError;
    use crate::mock::MockGpio;
    use kiosk_core::Level;

    fn requests() -> Vec<LineRequest> {
        vec![
            LineRequest::new(LineId::new(17), LineDirection::Input),
            LineRequest::new(LineId::new(22), LineDirection::Output(Level::Low)),
            LineRequest::new(LineId::new(23), LineDirection::Output(Level::Low)),
            LineRequest::new(LineId::new(27), LineDirection::Output(Level::Low)),
        ]
    }

    #[test]
    fn test_acquire_all() {
        let (gpio, handle) = MockGpio::new();
        let claims = LineClaims::acquire(Arc::new(gpio), &requests()).unwrap();

        assert_eq!(claims.lines().len(), 4);
        assert!(handle.is_claimed(LineId::new(27)));
    }

    #[test]
    fn test_failed_claim_releases_previous() {
        let (gpio, handle) = MockGpio::new();
        handle.make_unavailable(LineId::new(23));

        let result = LineClaims::acquire(Arc::new(gpio), &requests());

        assert!(matches!(
            result,
            Err(HardwareError::LineUnavailable { line }) if line == LineId::new(23)
        ));
        assert_eq!(handle.claimed_count(), 0);
    }

    #[test]
    fn test_drop_releases_all() {
        let (gpio, handle) = MockGpio::new();
        let claims = LineClaims::acquire(Arc::new(gpio), &requests()).unwrap();
        assert_eq!(handle.claimed_count(), 4);

        drop(claims);
        assert_eq!(handle.claimed_count(), 0);
    }

    #[test]
    fn test_duplicate_request_fails_cleanly() {
        let (gpio, handle) = MockGpio::new();
        let mut requests = requests();
        requests.push(LineRequest::new(LineId::new(17), LineDirection::Input));

        assert!(LineClaims::acquire(Arc::new(gpio), &requests).is_err());
        assert_eq!(handle.claimed_count(), 0);
    }
}
