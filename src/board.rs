//! # Board Bring-up
//!
//! STM32F411 clock tree and the two indicator lines (PA2, PA3), plus the
//! fatal halt used when bring-up or task creation fails.
//!
//! ```text
//! HSI 16 MHz ─► PLL ─► SYSCLK 100 MHz ─┬─► AHB  100 MHz
//!                                      ├─► APB1  50 MHz
//!                                      └─► APB2 100 MHz
//! ```

use stm32f4xx_hal::gpio::{ErasedPin, Output, PushPull};
use stm32f4xx_hal::pac;
use stm32f4xx_hal::prelude::*;

use crate::arbitration::OutputBank;
use crate::config::{APB1_CLOCK_HZ, SYSTEM_CLOCK_HZ};
use crate::indicator::{Indicators, LineId};
use crate::sync::Shared;

/// Line driven by PA2.
pub const LINE_0: LineId = LineId::new(0);
/// Line driven by PA3.
pub const LINE_1: LineId = LineId::new(1);

type IndicatorPin = ErasedPin<Output<PushPull>>;

static INDICATORS: Shared<Indicators<IndicatorPin, 2>> = Shared::new();

/// Configure clocks and GPIO, and install the indicator bank.
///
/// Halts through [`fatal`] if the clock tree does not come up at
/// `SYSTEM_CLOCK_HZ`, since SysTick is derived from it.
pub fn init(dp: pac::Peripherals) {
    let rcc = dp.RCC.constrain();
    let clocks = rcc
        .cfgr
        .sysclk(SYSTEM_CLOCK_HZ.Hz())
        .hclk(SYSTEM_CLOCK_HZ.Hz())
        .pclk1(APB1_CLOCK_HZ.Hz())
        .pclk2(SYSTEM_CLOCK_HZ.Hz())
        .freeze();

    if clocks.sysclk().raw() != SYSTEM_CLOCK_HZ {
        fatal();
    }
    debug!(
        "clocks: sysclk={=u32} pclk1={=u32}",
        clocks.sysclk().raw(),
        clocks.pclk1().raw()
    );

    let gpioa = dp.GPIOA.split();
    let pins = [
        gpioa.pa2.into_push_pull_output().erase(),
        gpioa.pa3.into_push_pull_output().erase(),
    ];
    INDICATORS.put(Indicators::new(pins));
}

/// Handle to the board's indicator bank. Every call takes a critical
/// section, so any task may hold one.
#[derive(Debug, Clone, Copy, Default)]
pub struct SharedIndicators;

impl OutputBank for SharedIndicators {
    fn set_line(&mut self, line: LineId, on: bool) {
        if INDICATORS.with(|bank| bank.set_line(line, on)).is_none() {
            warn!("line {} written before board init", line);
        }
    }

    fn toggle_line(&mut self, line: LineId) {
        if INDICATORS.with(|bank| bank.toggle_line(line)).is_none() {
            warn!("line {} toggled before board init", line);
        }
    }
}

/// Unrecoverable failure: interrupts off, halt forever.
pub fn fatal() -> ! {
    error!("fatal error, halting");
    cortex_m::interrupt::disable();
    loop {
        cortex_m::asm::nop();
    }
}
