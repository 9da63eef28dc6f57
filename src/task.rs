//! # Task Control Block
//!
//! Defines the task model for Duelos: the handle type, the priority scale,
//! the execution state machine and the TCB the scheduler keeps per task.
//!
//! ## State Machine
//!
//! ```text
//!   ┌─────────┐ activate() ┌─────────┐  schedule()  ┌─────────┐
//!   │ Dormant │ ─────────► │  Ready  │ ───────────► │ Running │
//!   └─────────┘            └─────────┘ ◄─────────── └─────────┘
//!                           ▲       ▲   preempt / yield  │
//!                  resume() │       │ wake               │ delay()
//!                           │       └──────────┐         ▼
//!                     ┌───────────┐          ┌─────────┐
//!                     │ Suspended │          │ Delayed │
//!                     └───────────┘          └─────────┘
//! ```
//!
//! Any Ready, Running or Delayed task can be suspended; a suspended task
//! only leaves that state through `resume()`, and always lands in Ready.

use crate::config::{DEFAULT_TIME_SLICE, STACK_SIZE};

// ---------------------------------------------------------------------------
// Handles and priorities
// ---------------------------------------------------------------------------

/// Opaque handle to a task. Only the scheduler hands these out, so a
/// `TaskId` is always valid for the life of the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskId(usize);

impl TaskId {
    pub(crate) const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Index of the task in the scheduler's TCB array.
    #[inline]
    pub const fn index(self) -> usize {
        self.0
    }
}

#[cfg(target_os = "none")]
impl defmt::Format for TaskId {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "T{=usize:02}", self.0);
    }
}

impl core::fmt::Display for TaskId {
    fn fmt(&self, fmt: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(fmt, "T{:02}", self.0)
    }
}

/// Scheduling priority. Higher variants preempt lower ones; equal variants
/// share the CPU in time slices.
///
/// `Idle` is reserved for the kernel's idle task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
#[repr(u8)]
pub enum Priority {
    Idle = 0,
    Low,
    BelowNormal,
    Normal,
    AboveNormal,
    High,
    Realtime,
}

impl Priority {
    /// Every level, lowest first.
    pub const LEVELS: [Priority; 7] = [
        Priority::Idle,
        Priority::Low,
        Priority::BelowNormal,
        Priority::Normal,
        Priority::AboveNormal,
        Priority::High,
        Priority::Realtime,
    ];
}

// ---------------------------------------------------------------------------
// Task state machine
// ---------------------------------------------------------------------------

/// Execution state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum TaskState {
    /// Created, stack frame built, but not yet activated.
    Dormant,
    /// Ready to run and waiting for the CPU.
    Ready,
    /// Currently executing on the CPU.
    Running,
    /// Sleeping until `wake_tick`.
    Delayed,
    /// Taken out of scheduling by `suspend()` until `resume()`.
    Suspended,
}

/// Entry point of a task. The argument is the value given to `activate()`,
/// delivered in R0.
pub type TaskEntry = extern "C" fn(usize) -> !;

// ---------------------------------------------------------------------------
// Task configuration (immutable after creation)
// ---------------------------------------------------------------------------

/// Static configuration for a task, set at creation time.
#[derive(Debug, Clone, Copy)]
pub struct TaskConfig {
    /// Fixed scheduling priority.
    pub priority: Priority,

    /// Time slice in ticks for round-robin among equal priorities.
    /// If 0, uses `DEFAULT_TIME_SLICE`.
    pub time_slice: u32,
}

impl TaskConfig {
    /// A configuration with the given priority and the default time slice.
    pub const fn new(priority: Priority) -> Self {
        Self {
            priority,
            time_slice: 0,
        }
    }

    /// Returns the effective time slice, falling back to the system default.
    #[inline]
    pub const fn effective_time_slice(&self) -> u32 {
        if self.time_slice > 0 {
            self.time_slice
        } else {
            DEFAULT_TIME_SLICE
        }
    }
}

// ---------------------------------------------------------------------------
// Task Control Block
// ---------------------------------------------------------------------------

/// Stack memory for one task, aligned to 8 bytes as required by the AAPCS.
#[repr(C, align(8))]
pub struct Stack(pub [u8; STACK_SIZE]);

impl Stack {
    pub const fn new() -> Self {
        Self([0u8; STACK_SIZE])
    }

    /// One-past-the-end address of the stack memory.
    pub fn top(&self) -> usize {
        self.0.as_ptr() as usize + STACK_SIZE
    }
}

/// Task Control Block — everything the scheduler needs to run, park and
/// context-switch a task. TCBs live in a static array inside the scheduler.
pub struct TaskControlBlock {
    /// Current execution state.
    pub state: TaskState,

    /// Static configuration.
    pub config: TaskConfig,

    /// Saved stack pointer (PSP). Updated on context switch.
    /// Points into `self.stack`.
    pub stack_pointer: *mut u32,

    /// Per-task stack memory.
    pub stack: Stack,

    /// Remaining ticks in the current time slice.
    pub ticks_remaining: u32,

    /// Tick at which a Delayed task becomes Ready again.
    pub wake_tick: u64,

    /// Whether this slot is allocated (true) or free (false).
    pub active: bool,
}

// Safety: `stack_pointer` always points into the task's own stack array,
// and TCBs are only touched inside critical sections or from PendSV/SysTick.
unsafe impl Send for TaskControlBlock {}
unsafe impl Sync for TaskControlBlock {}

impl TaskControlBlock {
    /// An unallocated TCB. Used to initialize the static array.
    pub const EMPTY: Self = Self {
        state: TaskState::Dormant,
        config: TaskConfig::new(Priority::Idle),
        stack_pointer: core::ptr::null_mut(),
        stack: Stack::new(),
        ticks_remaining: 0,
        wake_tick: 0,
        active: false,
    };

    /// Initialize a TCB for a new task. The task starts Dormant; the stack
    /// frame is built separately by the scheduler.
    pub fn init(&mut self, config: TaskConfig) {
        self.state = TaskState::Dormant;
        self.config = config;
        self.ticks_remaining = config.effective_time_slice();
        self.wake_tick = 0;
        self.active = true;
    }

    /// Check if this task can be picked by the scheduler.
    #[inline]
    pub fn is_runnable(&self) -> bool {
        self.active && matches!(self.state, TaskState::Ready | TaskState::Running)
    }

    /// Take the task out of scheduling. Returns `false` if there was nothing
    /// to do (already suspended, or never activated).
    pub fn suspend(&mut self) -> bool {
        match self.state {
            TaskState::Ready | TaskState::Running | TaskState::Delayed => {
                self.state = TaskState::Suspended;
                true
            }
            TaskState::Suspended | TaskState::Dormant => false,
        }
    }

    /// Put a suspended task back in the ready set. Returns `false` if the
    /// task was not suspended, in which case nothing changes.
    pub fn resume(&mut self) -> bool {
        if self.state == TaskState::Suspended {
            self.state = TaskState::Ready;
            true
        } else {
            false
        }
    }

    /// Park the task until the given absolute tick.
    pub fn delay_until(&mut self, wake_tick: u64) {
        self.state = TaskState::Delayed;
        self.wake_tick = wake_tick;
    }

    /// Move a Delayed task to Ready if its wake tick has passed.
    pub fn wake_if_due(&mut self, now: u64) -> bool {
        if self.state == TaskState::Delayed && now >= self.wake_tick {
            self.state = TaskState::Ready;
            true
        } else {
            false
        }
    }

    /// Refill the time slice.
    #[inline]
    pub fn refill_slice(&mut self) {
        self.ticks_remaining = self.config.effective_time_slice();
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------
