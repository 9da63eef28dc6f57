//! # Kernel
//!
//! Global scheduler instance and the public task API for Duelos.
//!
//! Every function here runs its scheduler access inside a critical section
//! and pends PendSV when that access asked for a context switch.
//!
//! ## Startup Sequence
//!
//! ```text
//! reset_handler (cortex-m-rt)
//!   └─► main()
//!         ├─► board::init()           ← clocks, GPIO
//!         ├─► kernel::init()          ← scheduler + idle task
//!         ├─► kernel::create_task()   ← Dormant TCBs (×N)
//!         ├─► kernel::activate()      ← hand each task its argument
//!         └─► kernel::start()         ← no return
//!               ├─► SysTick at TICK_HZ
//!               ├─► PendSV/SysTick at lowest priority
//!               └─► arch::start_first_task()
//! ```

use crate::arbitration::TaskControl;
use crate::arch::cortex_m4;
use crate::scheduler::{KernelError, Scheduler};
use crate::sync;
use crate::task::{Priority, TaskConfig, TaskEntry, TaskId};

// ---------------------------------------------------------------------------
// Global scheduler instance
// ---------------------------------------------------------------------------

/// Global scheduler instance. Only reached through `SCHEDULER_PTR`.
static mut SCHEDULER: Scheduler = Scheduler::new();

/// Raw pointer to the global scheduler, for the arch layer's handlers.
///
/// # Safety
/// Set once during `init()`; afterwards only dereferenced inside critical
/// sections or from PendSV/SysTick.
pub static mut SCHEDULER_PTR: *mut Scheduler = core::ptr::null_mut();

/// Run `f` on the scheduler with interrupts off, then pend a context switch
/// if `f` asked for one.
fn with_scheduler<R>(f: impl FnOnce(&mut Scheduler) -> R) -> R {
    let (result, switch) = sync::critical_section(|_cs| {
        // Safety: `init()` set the pointer; interrupts are off, so neither
        // SysTick nor PendSV can hold another reference right now.
        let scheduler = unsafe { &mut *SCHEDULER_PTR };
        let result = f(scheduler);
        (result, scheduler.needs_reschedule)
    });
    if switch {
        cortex_m4::trigger_pendsv();
    }
    result
}

// ---------------------------------------------------------------------------
// Kernel API
// ---------------------------------------------------------------------------

/// Initialize the kernel and create the idle task.
///
/// Must be called exactly once, from the main thread, before any other
/// kernel function.
pub fn init() -> Result<(), KernelError> {
    // Safety: single-threaded bring-up, nothing else can observe these yet.
    unsafe {
        SCHEDULER_PTR = core::ptr::addr_of_mut!(SCHEDULER);
    }
    let idle = create_task(idle_task, TaskConfig::new(Priority::Idle))?;
    sync::critical_section(|_cs| unsafe { (*SCHEDULER_PTR).activate(idle, 0) })
}

/// Create a task. It is not scheduled until `activate()`.
pub fn create_task(entry: TaskEntry, config: TaskConfig) -> Result<TaskId, KernelError> {
    with_scheduler(|s| s.create_task(entry, config))
}

/// Make a created task runnable, passing it `arg`. The task's entry
/// receives the reference's address.
pub fn activate<T: Sync>(id: TaskId, arg: &'static T) -> Result<(), KernelError> {
    let address = arg as *const T as usize;
    with_scheduler(|s| s.activate(id, address))
}

/// Start the scheduler. **Does not return.**
///
/// `init()` must have been called; the idle task guarantees there is a
/// first task to launch.
pub fn start(mut core_peripherals: cortex_m::Peripherals) -> ! {
    // Nothing may tick before the first task owns the PSP
    cortex_m::interrupt::disable();

    cortex_m4::configure_systick(&mut core_peripherals.SYST);
    cortex_m4::set_interrupt_priorities(&mut core_peripherals.SCB);

    // Safety: interrupts are off and stay off until the first task runs.
    let first_sp = unsafe {
        let scheduler = &mut *SCHEDULER_PTR;
        let first = scheduler.schedule();
        info!("starting with {} of {=usize} tasks", first, scheduler.task_count);
        scheduler.tasks[first.index()].stack_pointer as *const u32
    };

    unsafe { cortex_m4::start_first_task(first_sp) }
}

/// Sleep the calling task for at least `ticks` ticks.
pub fn delay(ticks: u32) {
    with_scheduler(|s| s.delay_current(ticks));
}

/// Priority of a task.
pub fn priority(id: TaskId) -> Priority {
    with_scheduler(|s| s.priority(id))
}

/// Suspend a task. Suspending an already suspended task does nothing.
pub fn suspend(id: TaskId) {
    with_scheduler(|s| {
        s.suspend(id);
    });
}

/// Resume a suspended task. Resuming a task that is not suspended does
/// nothing.
pub fn resume(id: TaskId) {
    with_scheduler(|s| {
        s.resume(id);
    });
}

/// Ticks since `start()`.
pub fn now() -> u64 {
    sync::critical_section(|_cs| {
        // Safety: read-only access with interrupts off; null before init().
        unsafe { SCHEDULER_PTR.as_ref().map_or(0, Scheduler::now) }
    })
}

/// The idle task: sleeps the core until the next interrupt.
extern "C" fn idle_task(_arg: usize) -> ! {
    loop {
        cortex_m::asm::wfi();
    }
}

defmt::timestamp!("{=u64:010}", now());

// ---------------------------------------------------------------------------
// TaskControl over the live kernel
// ---------------------------------------------------------------------------

/// The kernel as seen by a task: every call goes through the functions
/// above, so it is safe to use from any task.
#[derive(Debug, Clone, Copy, Default)]
pub struct KernelPort;

impl TaskControl for KernelPort {
    fn priority(&self, task: TaskId) -> Priority {
        priority(task)
    }

    fn suspend(&mut self, task: TaskId) {
        suspend(task);
    }

    fn resume(&mut self, task: TaskId) {
        resume(task);
    }

    fn sleep(&mut self, ticks: u32) {
        delay(ticks);
    }
}
