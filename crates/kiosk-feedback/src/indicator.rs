//! Tri-state lamp driver.

use kiosk_core::constants::LAMP_COUNT;
use kiosk_core::{FeedbackState, Level, LineId};
use kiosk_hardware::GpioLines;
use std::sync::Arc;

/// Drives three mutually exclusive lamps.
///
/// At most one lamp is ever lit: [`show`](Indicator::show) switches the
/// other lamps off before lighting the selected one.
pub struct Indicator {
    gpio: Arc<dyn GpioLines>,
    lamps: [LineId; LAMP_COUNT],
}

impl Indicator {
    pub fn new(gpio: Arc<dyn GpioLines>, lamps: [LineId; LAMP_COUNT]) -> Self {
        Self { gpio, lamps }
    }

    /// Light the lamp for `state`.
    pub fn show(&self, state: FeedbackState) {
        let lit = self.lamps[state.lamp_index()];
        for lamp in self.lamps.iter().filter(|l| **l != lit) {
            self.gpio.set_output(*lamp, Level::Low);
        }
        self.gpio.set_output(lit, Level::High);
    }

    /// Switch every lamp off.
    pub fn clear(&self) {
        for lamp in &self.lamps {
            self.gpio.set_output(*lamp, Level::Low);
        }
    }
}

impl std::fmt::Debug for Indicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Indicator")
            .field("lamps", &self.lamps)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiosk_core::LineDirection;
    use kiosk_hardware::mock::{MockGpio, MockGpioHandle};
    use rstest::rstest;

    const LAMPS: [LineId; LAMP_COUNT] = [LineId::new(22), LineId::new(23), LineId::new(24)];

    fn indicator() -> (Indicator, MockGpioHandle) {
        let (gpio, handle) = MockGpio::new();
        for lamp in LAMPS {
            gpio.claim(lamp, LineDirection::Output(Level::Low)).unwrap();
        }
        (Indicator::new(Arc::new(gpio), LAMPS), handle)
    }

    fn lit(handle: &MockGpioHandle) -> Vec<bool> {
        LAMPS.iter().map(|l| handle.level(*l).is_high()).collect()
    }

    #[rstest]
    #[case(0, [true, false, false])]
    #[case(1, [false, true, false])]
    #[case(2, [false, false, true])]
    fn test_show_lights_exactly_one(#[case] state: u8, #[case] expected: [bool; 3]) {
        let (indicator, handle) = indicator();
        indicator.show(FeedbackState::new(2).unwrap());
        indicator.show(FeedbackState::new(state).unwrap());
        assert_eq!(lit(&handle), expected);
    }

    #[test]
    fn test_clear() {
        let (indicator, handle) = indicator();
        indicator.show(FeedbackState::new(1).unwrap());
        indicator.clear();
        assert_eq!(lit(&handle), vec![false, false, false]);
    }

    #[test]
    fn test_lit_lamp_written_last() {
        let (indicator, handle) = indicator();
        indicator.show(FeedbackState::new(0).unwrap());
        handle.clear_history();

        indicator.show(FeedbackState::new(1).unwrap());
        assert_eq!(handle.writes_to(LAMPS[0]), vec![Level::Low]);
        assert_eq!(handle.writes_to(LAMPS[1]), vec![Level::High]);
    }
}
