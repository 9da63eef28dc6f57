//! # Duelos
//!
//! Two tasks, one rule: whoever holds the higher priority blinks its line and
//! keeps the other task suspended and dark. Equal priorities blink side by
//! side. The pair runs on a small preemptive kernel for ARM Cortex-M4.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │          Application wiring (app.rs, main.rs)           │
//! ├────────────────────────────────────────────────────────┤
//! │           Arbitration (arbitration.rs)                  │
//! │   PriorityRelation · Peer · ArbitrationTask::cycle()    │
//! ├──────────────┬──────────────────┬──────────────────────┤
//! │ Kernel API   │  Indicator bank  │  Board bring-up      │
//! │ kernel.rs    │  indicator.rs    │  board.rs            │
//! │ ─ delay()    │  ─ set_line()    │  ─ clocks, PA2/PA3   │
//! │ ─ suspend()  │  ─ toggle_line() │  ─ fatal()           │
//! │ ─ resume()   │                  │                      │
//! ├──────────────┴──────────────────┴──────────────────────┤
//! │   Scheduler (scheduler.rs) · Task model (task.rs)       │
//! │   priorities · time slices · delays · suspension        │
//! ├────────────────────────────────────────────────────────┤
//! │   Arch port (arch/cortex_m4.rs) · Sync (sync.rs)        │
//! │   PendSV · SysTick · critical sections                  │
//! ├────────────────────────────────────────────────────────┤
//! │         STM32F411 (Cortex-M4, Thumb-2)                  │
//! └────────────────────────────────────────────────────────┘
//! ```
//!
//! ## The Rule
//!
//! Every cycle each task compares its own priority with its peer's:
//!
//! | Relation      | Own line | Peer                      | Sleep  |
//! |---------------|----------|---------------------------|--------|
//! | Self dominant | toggle   | suspend, force line off   | 500 ms |
//! | Peer dominant | off      | untouched                 | 50 ms  |
//! | Equal         | toggle   | resume                    | 500 ms |
//!
//! Nothing is remembered between cycles, so the pair settles into the state
//! the table prescribes from any starting point within one cycle.
//!
//! ## Host and Target
//!
//! The hardware modules (`arch`, `sync`, `kernel`, `board`, `app`) only build
//! for `target_os = "none"`. Everything else, the scheduler included, builds
//! on the host and is covered by `cargo test`.
//!
//! ## Memory Model
//!
//! - **No heap**: all state is statically allocated
//! - **Fixed-size TCB array**: `[TaskControlBlock; MAX_TASKS]`
//! - **Per-task stack**: `[u8; STACK_SIZE]` inline in the TCB
//! - **Critical sections**: `cortex_m::interrupt::free()` for shared state

#![cfg_attr(not(test), no_std)]

#[macro_use]
mod fmt;

pub mod arbitration;
pub mod config;
pub mod indicator;
pub mod scheduler;
pub mod task;

#[cfg(target_os = "none")]
pub mod app;
#[cfg(target_os = "none")]
pub mod arch;
#[cfg(target_os = "none")]
pub mod board;
#[cfg(target_os = "none")]
pub mod kernel;
#[cfg(target_os = "none")]
pub mod sync;

#[cfg(test)]
mod scenarios;
