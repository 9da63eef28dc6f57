//! # Duelos Firmware
//!
//! Two tasks share the CPU of an STM32F411 and arbitrate by priority:
//!
//! | Task  | Priority | Line     |
//! |-------|----------|----------|
//! | TaskA | High     | 0 (PA2)  |
//! | TaskB | Normal   | 1 (PA3)  |
//!
//! With the default priorities TaskA keeps TaskB suspended and blinks PA2
//! with a 500 ms half-period; PA3 stays dark. Set both priorities equal in
//! `config.rs` and both lines blink.
//!
//! No default target is configured, so flash with
//! `cargo run --release --target thumbv7em-none-eabi`. A plain `cargo run`
//! builds the host stub below.

#![cfg_attr(target_os = "none", no_std)]
#![cfg_attr(target_os = "none", no_main)]

#[cfg(target_os = "none")]
mod firmware {
    use cortex_m_rt::entry;
    use defmt_rtt as _;
    use panic_halt as _;

    #[entry]
    fn main() -> ! {
        let (Some(cp), Some(dp)) = (
            cortex_m::Peripherals::take(),
            stm32f4xx_hal::pac::Peripherals::take(),
        ) else {
            duelos::board::fatal();
        };

        duelos::app::run(cp, dp)
    }
}

#[cfg(not(target_os = "none"))]
fn main() {
    eprintln!("duelos only runs on thumbv7em-none-eabi; try `cargo test` for the host suite");
}
