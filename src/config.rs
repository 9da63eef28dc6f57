//! # Duelos Configuration
//!
//! Compile-time constants for the kernel, the board and the two arbitration
//! tasks. All limits are fixed at compile time — no dynamic allocation.

use crate::task::Priority;

/// Maximum number of tasks the kernel can manage: the idle task, the two
/// arbitration tasks and one spare slot. Each task consumes `STACK_SIZE`
/// bytes of RAM.
pub const MAX_TASKS: usize = 4;

/// SysTick frequency in Hz. One tick is one millisecond, which is the
/// time unit of every delay below.
pub const TICK_HZ: u32 = 1000;

/// Default time slice in ticks. Equal-priority tasks take turns after this
/// many ticks of uninterrupted running.
pub const DEFAULT_TIME_SLICE: u32 = 10;

/// Per-task stack size in bytes. Must hold the deepest call chain plus the
/// hardware exception frame (32 bytes) and the software-saved context
/// (32 bytes for R4–R11).
pub const STACK_SIZE: usize = 512;

/// Core clock after bring-up: HSI (16 MHz) / 8 × 100 / 2 through the PLL.
pub const SYSTEM_CLOCK_HZ: u32 = 100_000_000;

/// APB1 runs at half the core clock (its ceiling on the STM32F411 is 50 MHz).
pub const APB1_CLOCK_HZ: u32 = SYSTEM_CLOCK_HZ / 2;

/// Cycle period, in ticks, of a task that is dominant or tied with its peer.
/// This is also the half-period of its indicator blink.
pub const DOMINANT_PERIOD_TICKS: u32 = 500;

/// How many times shorter the cycle of a subordinate task is. A subordinate
/// task only re-checks priorities and keeps its line off, so it polls faster.
pub const SUBORDINATE_RATIO: u32 = 10;

/// Build-time priority of TaskA (drives indicator line 0, PA2).
pub const TASK_A_PRIORITY: Priority = Priority::High;

/// Build-time priority of TaskB (drives indicator line 1, PA3).
pub const TASK_B_PRIORITY: Priority = Priority::Normal;
