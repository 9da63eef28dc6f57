//! # Indicator Lines
//!
//! A bank of binary output lines built on `embedded-hal` pins. The board
//! fills one with GPIO pins; the tests fill one with fake pins.

use core::convert::Infallible;

use embedded_hal::digital::StatefulOutputPin;

use crate::arbitration::OutputBank;

/// Index of a line within an [`Indicators`] bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub struct LineId(u8);

impl LineId {
    pub const fn new(index: u8) -> Self {
        Self(index)
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// `N` output lines of one pin type. Pin writes cannot fail, which holds
/// for on-chip GPIO.
pub struct Indicators<P, const N: usize> {
    pins: [P; N],
}

impl<P, const N: usize> Indicators<P, N>
where
    P: StatefulOutputPin<Error = Infallible>,
{
    /// Take ownership of the pins and drive every line off.
    pub fn new(pins: [P; N]) -> Self {
        let mut bank = Self { pins };
        bank.all_off();
        bank
    }

    /// Drive every line off.
    pub fn all_off(&mut self) {
        for pin in self.pins.iter_mut() {
            let Ok(()) = pin.set_low();
        }
    }
}

impl<P, const N: usize> OutputBank for Indicators<P, N>
where
    P: StatefulOutputPin<Error = Infallible>,
{
    fn set_line(&mut self, line: LineId, on: bool) {
        let pin = &mut self.pins[line.index()];
        let Ok(()) = if on { pin.set_high() } else { pin.set_low() };
    }

    fn toggle_line(&mut self, line: LineId) {
        let Ok(()) = self.pins[line.index()].toggle();
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::digital::{ErrorType, OutputPin};

    /// Fake GPIO pin that counts writes.
    #[derive(Default)]
    struct FakePin {
        high: bool,
        writes: u32,
    }

    impl ErrorType for FakePin {
        type Error = Infallible;
    }

    impl OutputPin for FakePin {
        fn set_low(&mut self) -> Result<(), Infallible> {
            self.high = false;
            self.writes += 1;
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Infallible> {
            self.high = true;
            self.writes += 1;
            Ok(())
        }
    }

    impl StatefulOutputPin for FakePin {
        fn is_set_high(&mut self) -> Result<bool, Infallible> {
            Ok(self.high)
        }

        fn is_set_low(&mut self) -> Result<bool, Infallible> {
            Ok(!self.high)
        }
    }

    const LINE_0: LineId = LineId::new(0);
    const LINE_1: LineId = LineId::new(1);

    impl Indicators<FakePin, 2> {
        fn is_on(&self, line: LineId) -> bool {
            self.pins[line.index()].high
        }
    }

    fn bank() -> Indicators<FakePin, 2> {
        Indicators::new([
            FakePin {
                high: true,
                writes: 0,
            },
            FakePin::default(),
        ])
    }

    #[test]
    fn test_new_drives_all_lines_off() {
        let bank = bank();
        assert!(!bank.is_on(LINE_0));
        assert!(!bank.is_on(LINE_1));
    }

    #[test]
    fn test_set_and_toggle_touch_only_their_line() {
        let mut bank = bank();
        bank.set_line(LINE_1, true);
        assert!(bank.is_on(LINE_1));
        assert!(!bank.is_on(LINE_0));

        bank.toggle_line(LINE_0);
        assert!(bank.is_on(LINE_0));
        bank.toggle_line(LINE_0);
        assert!(!bank.is_on(LINE_0));
        assert!(bank.is_on(LINE_1));
    }

    #[test]
    fn test_forcing_off_is_repeatable() {
        let mut bank = bank();
        bank.set_line(LINE_1, false);
        bank.set_line(LINE_1, false);
        assert!(!bank.is_on(LINE_1));

        // one write from new(), two forced offs
        assert_eq!(bank.pins[1].writes, 3);
    }
}
