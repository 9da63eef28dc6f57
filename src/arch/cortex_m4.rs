//! # Cortex-M4 Port Layer
//!
//! Hardware-specific code for the ARM Cortex-M4 (Thumb-2) processor:
//! SysTick configuration, exception priorities, first-task launch and the
//! PendSV context switch.
//!
//! ## Context Switch Mechanism
//!
//! Tasks run in Thread mode on the PSP; the kernel and handlers use the MSP.
//! On exception entry the hardware stacks R0–R3, R12, LR, PC and xPSR onto
//! the PSP, and PendSV saves/restores R4–R11 by hand.
//!
//! The firmware is built for `thumbv7em-none-eabi` (soft float), so the
//! FPU is never enabled and every frame is the basic eight-word frame that
//! `EXC_RETURN = 0xFFFF_FFFD` expects.
//!
//! ## Interrupt Priorities
//!
//! SysTick and PendSV both sit at the lowest priority, so neither can
//! preempt the other and a context switch never interrupts an application
//! ISR.

use core::arch::{asm, naked_asm};

use cortex_m::peripheral::scb::SystemHandler;
use cortex_m::peripheral::syst::SystClkSource;
use cortex_m::peripheral::{SCB, SYST};

use crate::config::{SYSTEM_CLOCK_HZ, TICK_HZ};

/// Lowest exception priority (only the top bits are implemented).
const LOWEST_PRIORITY: u8 = 0xFF;

// ---------------------------------------------------------------------------
// SysTick configuration
// ---------------------------------------------------------------------------

/// Make SysTick fire at `TICK_HZ` from the core clock.
pub fn configure_systick(syst: &mut SYST) {
    let reload = SYSTEM_CLOCK_HZ / TICK_HZ - 1;
    syst.set_clock_source(SystClkSource::Core);
    syst.set_reload(reload);
    syst.clear_current();
    syst.enable_counter();
    syst.enable_interrupt();
}

// ---------------------------------------------------------------------------
// PendSV trigger
// ---------------------------------------------------------------------------

/// Request a context switch. PendSV runs as soon as no other exception is
/// active and interrupts are enabled.
#[inline]
pub fn trigger_pendsv() {
    SCB::set_pendsv();
}

// ---------------------------------------------------------------------------
// Interrupt priority configuration
// ---------------------------------------------------------------------------

/// Put PendSV and SysTick at the lowest exception priority.
pub fn set_interrupt_priorities(scb: &mut SCB) {
    // Safety: changing system handler priorities can break priority-based
    // critical sections; the kernel uses PRIMASK-based ones only.
    unsafe {
        scb.set_priority(SystemHandler::PendSV, LOWEST_PRIORITY);
        scb.set_priority(SystemHandler::SysTick, LOWEST_PRIORITY);
    }
}

// ---------------------------------------------------------------------------
// First task launch
// ---------------------------------------------------------------------------

/// Switch Thread mode to the PSP and jump into the first task.
///
/// `frame` is the task's saved stack pointer, pointing at the software
/// context (R4–R11) of a frame built by the scheduler. R0 from the frame
/// reaches the task as its argument. Interrupts are enabled on the way in.
///
/// # Safety
/// Must only be called once, from the main thread, with interrupts
/// disabled and a frame built by `Scheduler::create_task`.
pub unsafe fn start_first_task(frame: *const u32) -> ! {
    asm!(
        "adds r0, #32",           // skip R4–R11, the task has no state yet
        "msr psp, r0",
        "movs r0, #2",            // CONTROL.SPSEL = 1: Thread mode uses PSP
        "msr control, r0",
        "isb",
        "pop {{r0-r3, r12}}",     // argument in R0
        "pop {{r4, r5, r6}}",     // LR, PC, xPSR
        "mov lr, r4",
        "cpsie i",
        "bx r5",
        in("r0") frame,
        options(noreturn)
    );
}

// ---------------------------------------------------------------------------
// PendSV handler (context switch)
// ---------------------------------------------------------------------------

/// PendSV exception handler — performs the context switch.
///
/// 1. Push R4–R11 onto the outgoing task's stack
/// 2. Store its PSP in its TCB
/// 3. Let the scheduler pick the next task and return its PSP
/// 4. Pop R4–R11 from the incoming task's stack and return into it
///
/// # Safety
/// Called only by the NVIC.
#[no_mangle]
#[unsafe(naked)]
pub unsafe extern "C" fn PendSV() {
    naked_asm!(
        "mrs r0, psp",
        "stmdb r0!, {{r4-r11}}",
        "bl {save}",
        "bl {switch}",
        "ldmia r0!, {{r4-r11}}",
        "msr psp, r0",
        "mov lr, #0xFFFFFFFD",    // return to Thread mode, PSP, basic frame
        "bx lr",
        save = sym save_current_context,
        switch = sym do_context_switch,
    );
}

/// Record the outgoing task's stack pointer. Called from PendSV.
///
/// # Safety
/// Runs in PendSV; SysTick shares its priority, so nothing else touches the
/// scheduler meanwhile.
unsafe extern "C" fn save_current_context(psp: *mut u32) {
    let scheduler = &mut *crate::kernel::SCHEDULER_PTR;
    let current = scheduler.current_task;
    if current < scheduler.task_count {
        scheduler.tasks[current].stack_pointer = psp;
    }
}

/// Pick the next task and return its stack pointer. Called from PendSV.
///
/// # Safety
/// As `save_current_context`.
unsafe extern "C" fn do_context_switch() -> *mut u32 {
    let scheduler = &mut *crate::kernel::SCHEDULER_PTR;
    let next = scheduler.schedule();
    scheduler.tasks[next.index()].stack_pointer
}

// ---------------------------------------------------------------------------
// SysTick handler
// ---------------------------------------------------------------------------

/// SysTick exception handler — the scheduler tick.
///
/// # Safety
/// Called only by the NVIC, after `kernel::start`.
#[no_mangle]
pub unsafe extern "C" fn SysTick() {
    let scheduler = &mut *crate::kernel::SCHEDULER_PTR;
    scheduler.tick();

    if scheduler.needs_reschedule {
        trigger_pendsv();
    }
}
