//! # Application Wiring
//!
//! Brings the board up, creates TaskA and TaskB, hands each one its side of
//! the arbitration pair and starts the kernel.

use crate::arbitration::{ArbitrationTask, CycleTiming, Peer};
use crate::board::{self, SharedIndicators, LINE_0, LINE_1};
use crate::config::{TASK_A_PRIORITY, TASK_B_PRIORITY};
use crate::kernel::{self, KernelPort};
use crate::scheduler::KernelError;
use crate::task::TaskConfig;

/// Bring-up through scheduler start. **Does not return.**
pub fn run(cp: cortex_m::Peripherals, dp: stm32f4xx_hal::pac::Peripherals) -> ! {
    board::init(dp);

    if let Err(err) = spawn_pair() {
        error!("task setup failed: {}", err);
        board::fatal();
    }

    kernel::start(cp)
}

fn spawn_pair() -> Result<(), KernelError> {
    kernel::init()?;

    let task_a = kernel::create_task(arbitration_entry, TaskConfig::new(TASK_A_PRIORITY))?;
    let task_b = kernel::create_task(arbitration_entry, TaskConfig::new(TASK_B_PRIORITY))?;

    let side_a = ArbitrationTask::new(
        task_a,
        LINE_0,
        Peer::new(task_b, LINE_1),
        CycleTiming::default(),
    );
    let side_b = side_a.counterpart();

    // Runs once; `singleton!` only yields `None` on a second pass
    let Some(side_a) = cortex_m::singleton!(: ArbitrationTask = side_a) else {
        board::fatal();
    };
    let Some(side_b) = cortex_m::singleton!(: ArbitrationTask = side_b) else {
        board::fatal();
    };
    let side_a: &'static ArbitrationTask = side_a;
    let side_b: &'static ArbitrationTask = side_b;

    kernel::activate(task_a, side_a)?;
    kernel::activate(task_b, side_b)?;
    Ok(())
}

/// Shared entry of both arbitration tasks. `arg` is the address of the
/// task's `ArbitrationTask`, set by `kernel::activate`.
extern "C" fn arbitration_entry(arg: usize) -> ! {
    // Safety: `spawn_pair` activates every task using this entry with a
    // `&'static ArbitrationTask`.
    let side = unsafe { &*(arg as *const ArbitrationTask) };
    side.run(&mut KernelPort, &mut SharedIndicators)
}
