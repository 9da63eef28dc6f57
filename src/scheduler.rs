//! # Scheduler
//!
//! Core scheduling logic for Duelos: a fixed-priority preemptive scheduler
//! with round-robin time slicing between tasks of equal priority.
//!
//! ## Scheduling Algorithm
//!
//! At each SysTick interrupt:
//! 1. **Advance time**: increment the tick counter
//! 2. **Wake sleepers**: Delayed tasks whose wake tick has passed become
//!    Ready; a woken task that outranks the running one requests preemption
//! 3. **Charge the slice**: decrement the running task's slice; when it runs
//!    out and an equal-priority task is ready, request a rotation
//! 4. **Select next task** (PendSV): highest-priority runnable task; ties go
//!    to the running task unless it gave up the CPU or its slice expired, in
//!    which case they go to the next task in index order
//!
//! Suspension is orthogonal to sleeping: a Delayed task that gets suspended
//! forgets its wake tick, and only `resume()` brings it back (as Ready).
//!
//! The scheduler itself touches no hardware, so all of it runs under the
//! host test harness.

use crate::config::MAX_TASKS;
use crate::task::{Priority, TaskConfig, TaskControlBlock, TaskEntry, TaskId, TaskState};

/// Errors from task creation and activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum KernelError {
    /// Every slot in the TCB array is taken (`MAX_TASKS` reached).
    TaskTableFull,
    /// The task was already activated.
    NotDormant,
}

/// Word offset of the stacked R0 from a freshly built task's stack pointer
/// (eight software-saved registers sit below it).
const FRAME_R0: usize = 8;

/// Value a task's `current_task` holds before the scheduler has started.
const NO_TASK: usize = usize::MAX;

// ---------------------------------------------------------------------------
// Scheduler struct
// ---------------------------------------------------------------------------

/// The central scheduler state. Stored as a global `static mut` in
/// `kernel.rs` on the target; tests build their own.
pub struct Scheduler {
    /// Fixed-size array of TCBs, allocated in creation order.
    pub tasks: [TaskControlBlock; MAX_TASKS],

    /// Index of the currently running task (`usize::MAX` before start).
    pub current_task: usize,

    /// Number of allocated tasks.
    pub task_count: usize,

    /// Monotonic tick counter.
    pub tick_count: u64,

    /// Set when a context switch should happen at the next PendSV.
    pub needs_reschedule: bool,

    /// Set when the running task should hand ties to its equal-priority peers.
    rotate: bool,
}

impl Scheduler {
    /// Create an empty scheduler.
    pub const fn new() -> Self {
        Self {
            tasks: [TaskControlBlock::EMPTY; MAX_TASKS],
            current_task: NO_TASK,
            task_count: 0,
            tick_count: 0,
            needs_reschedule: false,
            rotate: false,
        }
    }

    /// Register a new task. It stays Dormant until `activate()`.
    pub fn create_task(
        &mut self,
        entry: TaskEntry,
        config: TaskConfig,
    ) -> Result<TaskId, KernelError> {
        if self.task_count >= MAX_TASKS {
            return Err(KernelError::TaskTableFull);
        }

        let id = TaskId::new(self.task_count);
        let tcb = &mut self.tasks[id.index()];
        tcb.init(config);
        init_task_stack(tcb, entry);

        self.task_count += 1;
        debug!("created {} at {}", id, config.priority);
        Ok(id)
    }

    /// Hand `arg` to a Dormant task (it arrives in R0) and make it Ready.
    pub fn activate(&mut self, id: TaskId, arg: usize) -> Result<(), KernelError> {
        let tcb = &mut self.tasks[id.index()];
        if tcb.state != TaskState::Dormant {
            return Err(KernelError::NotDormant);
        }

        // Safety: the frame was built by `init_task_stack`, which leaves
        // `stack_pointer` at R4 with R0 eight words above it, inside `stack`.
        unsafe {
            *tcb.stack_pointer.add(FRAME_R0) = arg as u32;
        }
        tcb.state = TaskState::Ready;
        Ok(())
    }

    /// Called from the SysTick handler every tick.
    pub fn tick(&mut self) {
        self.tick_count += 1;
        let now = self.tick_count;
        let running = self.running_priority();

        // --- Wake sleepers ---
        for tcb in self.tasks[..self.task_count].iter_mut() {
            if tcb.wake_if_due(now) && running.map_or(true, |p| tcb.config.priority > p) {
                self.needs_reschedule = true;
            }
        }

        // --- Charge the running task's slice ---
        let Some(priority) = running else {
            return;
        };
        let current = self.current_task;
        let tcb = &mut self.tasks[current];
        tcb.ticks_remaining = tcb.ticks_remaining.saturating_sub(1);
        if tcb.ticks_remaining == 0 {
            tcb.refill_slice();
            if self.has_ready_peer(current, priority) {
                self.rotate = true;
                self.needs_reschedule = true;
            }
        }
    }

    /// Select the next task to run and mark it Running.
    ///
    /// The idle task guarantees that something is always runnable once the
    /// kernel is up; if nothing is, the current task is kept.
    pub fn schedule(&mut self) -> TaskId {
        let current = self.current_task;
        let has_current = current < self.task_count;
        let keep_current =
            has_current && !self.rotate && self.tasks[current].state == TaskState::Running;

        // Scanning from the current task lets it win ties; scanning from the
        // one after it hands ties to the next peer in rotation.
        let start = match (has_current, keep_current) {
            (true, true) => current,
            (true, false) => current + 1,
            (false, _) => 0,
        };

        let mut best: Option<usize> = None;
        for offset in 0..self.task_count {
            let i = (start + offset) % self.task_count;
            if !self.tasks[i].is_runnable() {
                continue;
            }
            match best {
                Some(b) if self.tasks[b].config.priority >= self.tasks[i].config.priority => {}
                _ => best = Some(i),
            }
        }

        let next = match best {
            Some(next) => next,
            None if has_current => current,
            None => 0,
        };

        if has_current && next != current && self.tasks[current].state == TaskState::Running {
            self.tasks[current].state = TaskState::Ready;
        }
        if next != current || self.rotate {
            self.tasks[next].refill_slice();
        }
        if self.tasks[next].is_runnable() {
            self.tasks[next].state = TaskState::Running;
        }

        if next != current {
            trace!("switch -> T{=usize:02}", next);
        }

        self.current_task = next;
        self.needs_reschedule = false;
        self.rotate = false;
        TaskId::new(next)
    }

    /// Put the running task to sleep for `ticks`. Zero gives the CPU to the
    /// next equal-priority task, if any, without sleeping.
    pub fn delay_current(&mut self, ticks: u32) {
        let Some(current) = self.current() else {
            return;
        };
        let tcb = &mut self.tasks[current.index()];
        if ticks == 0 {
            tcb.state = TaskState::Ready;
            self.rotate = true;
        } else {
            tcb.delay_until(self.tick_count + u64::from(ticks));
        }
        self.needs_reschedule = true;
    }

    /// Suspend a task. Returns `false` if it was already suspended.
    pub fn suspend(&mut self, id: TaskId) -> bool {
        let changed = self.tasks[id.index()].suspend();
        if changed {
            debug!("suspend {}", id);
            if id.index() == self.current_task {
                self.needs_reschedule = true;
            }
        }
        changed
    }

    /// Resume a suspended task. Returns `false` if it was not suspended.
    pub fn resume(&mut self, id: TaskId) -> bool {
        let changed = self.tasks[id.index()].resume();
        if changed {
            debug!("resume {}", id);
            let priority = self.tasks[id.index()].config.priority;
            if self.running_priority().is_some_and(|p| priority > p) {
                self.needs_reschedule = true;
            }
        }
        changed
    }

    /// Current priority of a task.
    #[inline]
    pub fn priority(&self, id: TaskId) -> Priority {
        self.tasks[id.index()].config.priority
    }

    /// Current state of a task.
    #[inline]
    pub fn state(&self, id: TaskId) -> TaskState {
        self.tasks[id.index()].state
    }

    /// Ticks since start.
    #[inline]
    pub fn now(&self) -> u64 {
        self.tick_count
    }

    /// The task picked by the last `schedule()`, if the scheduler has started.
    pub fn current(&self) -> Option<TaskId> {
        (self.current_task < self.task_count).then(|| TaskId::new(self.current_task))
    }

    /// Priority of the task actually holding the CPU, if any.
    fn running_priority(&self) -> Option<Priority> {
        let tcb = self.tasks.get(self.current_task)?;
        (self.current_task < self.task_count && tcb.state == TaskState::Running)
            .then_some(tcb.config.priority)
    }

    /// Is another task of the same priority waiting for the CPU?
    fn has_ready_peer(&self, current: usize, priority: Priority) -> bool {
        self.tasks[..self.task_count]
            .iter()
            .enumerate()
            .any(|(i, t)| i != current && t.state == TaskState::Ready && t.config.priority == priority)
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Stack initialization helper
// ---------------------------------------------------------------------------

/// Build a task's initial stack frame so the first exception return into it
/// starts executing `entry`.
///
/// ## Stack Layout (top = high address, growing down)
///
/// ```text
/// [Hardware stacked frame]
///   xPSR  (Thumb bit set)
///   PC    (task entry point)
///   LR    (task_exit)
///   R12   (0)
///   R3    (0)
///   R2    (0)
///   R1    (0)
///   R0    (argument, written by activate())
/// [Software saved context]
///   R11 … R4 (0)             <- stack_pointer after init
/// ```
fn init_task_stack(tcb: &mut TaskControlBlock, entry: TaskEntry) {
    // Stack is 8-aligned and a multiple of 8 long, so the top already is
    let frame_ptr = (tcb.stack.top() - 16 * 4) as *mut u32;

    // Safety: the sixteen words written lie entirely within `tcb.stack`,
    // and `frame_ptr` is 8-byte aligned.
    unsafe {
        for i in 0..13 {
            *frame_ptr.add(i) = 0; // R4–R11, R0–R3, R12
        }
        *frame_ptr.add(13) = task_exit as usize as u32; // LR
        *frame_ptr.add(14) = entry as usize as u32; // PC
        *frame_ptr.add(15) = 0x0100_0000; // xPSR — Thumb bit
    }

    tcb.stack_pointer = frame_ptr;
}

/// Landing pad for a task that returns. Entries are `-> !`, so this only
/// runs if one is miscompiled or hand-written wrong.
extern "C" fn task_exit() -> ! {
    loop {
        cortex_m::asm::wfi();
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    extern "C" fn dummy_entry(_arg: usize) -> ! {
        loop {
            core::hint::spin_loop();
        }
    }

    fn spawn(sched: &mut Scheduler, priority: Priority) -> TaskId {
        let id = sched.create_task(dummy_entry, TaskConfig::new(priority)).unwrap();
        sched.activate(id, 0).unwrap();
        id
    }

    fn tick_n(sched: &mut Scheduler, n: u32) {
        for _ in 0..n {
            sched.tick();
        }
    }

    #[test]
    fn test_create_assigns_sequential_ids() {
        let mut sched = Scheduler::new();
        let a = sched.create_task(dummy_entry, TaskConfig::new(Priority::Low)).unwrap();
        let b = sched.create_task(dummy_entry, TaskConfig::new(Priority::High)).unwrap();
        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);
        assert_eq!(sched.state(a), TaskState::Dormant);
        assert_eq!(sched.priority(b), Priority::High);
    }

    #[test]
    fn test_task_table_full() {
        let mut sched = Scheduler::new();
        for _ in 0..MAX_TASKS {
            sched.create_task(dummy_entry, TaskConfig::new(Priority::Low)).unwrap();
        }
        assert_eq!(
            sched.create_task(dummy_entry, TaskConfig::new(Priority::Low)),
            Err(KernelError::TaskTableFull)
        );
    }

    #[test]
    fn test_activate_places_argument_in_r0() {
        let mut sched = Scheduler::new();
        let id = sched.create_task(dummy_entry, TaskConfig::new(Priority::Normal)).unwrap();
        sched.activate(id, 0x2000_1234).unwrap();

        let tcb = &sched.tasks[id.index()];
        let r0 = unsafe { *tcb.stack_pointer.add(FRAME_R0) };
        let xpsr = unsafe { *tcb.stack_pointer.add(15) };
        assert_eq!(r0, 0x2000_1234);
        assert_eq!(xpsr, 0x0100_0000);
        assert_eq!(tcb.state, TaskState::Ready);

        assert_eq!(sched.activate(id, 0), Err(KernelError::NotDormant));
    }

    #[test]
    fn test_dormant_tasks_are_not_scheduled() {
        let mut sched = Scheduler::new();
        let idle = spawn(&mut sched, Priority::Idle);
        sched.create_task(dummy_entry, TaskConfig::new(Priority::High)).unwrap();
        assert_eq!(sched.schedule(), idle);
    }

    #[test]
    fn test_highest_priority_wins() {
        let mut sched = Scheduler::new();
        spawn(&mut sched, Priority::Idle);
        spawn(&mut sched, Priority::Normal);
        let high = spawn(&mut sched, Priority::High);

        assert_eq!(sched.schedule(), high);
        assert_eq!(sched.state(high), TaskState::Running);
        assert_eq!(sched.current(), Some(high));
    }

    #[test]
    fn test_equal_priorities_rotate_on_slice_expiry() {
        let mut sched = Scheduler::new();
        spawn(&mut sched, Priority::Idle);
        let a = spawn(&mut sched, Priority::Normal);
        let b = spawn(&mut sched, Priority::Normal);

        assert_eq!(sched.schedule(), a);

        // Mid-slice, nothing asks for a switch
        tick_n(&mut sched, crate::config::DEFAULT_TIME_SLICE - 1);
        assert!(!sched.needs_reschedule);

        sched.tick();
        assert!(sched.needs_reschedule);
        assert_eq!(sched.schedule(), b);
        assert_eq!(sched.state(a), TaskState::Ready);

        tick_n(&mut sched, crate::config::DEFAULT_TIME_SLICE);
        assert_eq!(sched.schedule(), a);
    }

    #[test]
    fn test_lone_task_keeps_cpu_after_slice() {
        let mut sched = Scheduler::new();
        spawn(&mut sched, Priority::Idle);
        let a = spawn(&mut sched, Priority::Normal);
        assert_eq!(sched.schedule(), a);

        tick_n(&mut sched, crate::config::DEFAULT_TIME_SLICE * 3);
        assert!(!sched.needs_reschedule);
        assert_eq!(sched.schedule(), a);
    }

    #[test]
    fn test_delay_and_wake() {
        let mut sched = Scheduler::new();
        let idle = spawn(&mut sched, Priority::Idle);
        let a = spawn(&mut sched, Priority::Normal);
        assert_eq!(sched.schedule(), a);

        sched.delay_current(5);
        assert!(sched.needs_reschedule);
        assert_eq!(sched.schedule(), idle);
        assert_eq!(sched.state(a), TaskState::Delayed);

        tick_n(&mut sched, 4);
        assert!(!sched.needs_reschedule);
        sched.tick();
        assert!(sched.needs_reschedule);
        assert_eq!(sched.schedule(), a);
    }

    #[test]
    fn test_lower_priority_wake_does_not_preempt() {
        let mut sched = Scheduler::new();
        spawn(&mut sched, Priority::Idle);
        let low = spawn(&mut sched, Priority::Low);
        let high = spawn(&mut sched, Priority::High);

        assert_eq!(sched.schedule(), high);
        sched.delay_current(1);
        assert_eq!(sched.schedule(), low);
        sched.delay_current(3);
        sched.schedule();
        sched.tick(); // high wakes, preempts idle
        assert_eq!(sched.schedule(), high);

        tick_n(&mut sched, 2); // low wakes under high
        assert_eq!(sched.state(low), TaskState::Ready);
        assert!(!sched.needs_reschedule);
    }

    #[test]
    fn test_zero_delay_yields_to_equal_peer() {
        let mut sched = Scheduler::new();
        spawn(&mut sched, Priority::Idle);
        let a = spawn(&mut sched, Priority::Normal);
        let b = spawn(&mut sched, Priority::Normal);

        assert_eq!(sched.schedule(), a);
        sched.delay_current(0);
        assert_eq!(sched.schedule(), b);
        assert_eq!(sched.state(a), TaskState::Ready);
    }

    #[test]
    fn test_suspend_and_resume_are_idempotent() {
        let mut sched = Scheduler::new();
        spawn(&mut sched, Priority::Idle);
        let a = spawn(&mut sched, Priority::High);
        let b = spawn(&mut sched, Priority::Normal);
        assert_eq!(sched.schedule(), a);

        assert!(sched.suspend(b));
        assert!(!sched.suspend(b));
        assert_eq!(sched.state(b), TaskState::Suspended);
        assert!(!sched.needs_reschedule);

        assert!(sched.resume(b));
        assert!(!sched.resume(b));
        assert_eq!(sched.state(b), TaskState::Ready);
        // b is below the running task, so no preemption
        assert!(!sched.needs_reschedule);
    }

    #[test]
    fn test_resume_of_higher_priority_preempts() {
        let mut sched = Scheduler::new();
        spawn(&mut sched, Priority::Idle);
        let low = spawn(&mut sched, Priority::Low);
        let high = spawn(&mut sched, Priority::High);

        sched.suspend(high);
        assert_eq!(sched.schedule(), low);

        sched.resume(high);
        assert!(sched.needs_reschedule);
        assert_eq!(sched.schedule(), high);
    }

    #[test]
    fn test_suspending_running_task_switches_away() {
        let mut sched = Scheduler::new();
        let idle = spawn(&mut sched, Priority::Idle);
        let a = spawn(&mut sched, Priority::Normal);
        assert_eq!(sched.schedule(), a);

        assert!(sched.suspend(a));
        assert!(sched.needs_reschedule);
        assert_eq!(sched.schedule(), idle);
        assert_eq!(sched.state(a), TaskState::Suspended);
    }

    #[test]
    fn test_suspended_sleeper_is_not_woken() {
        let mut sched = Scheduler::new();
        spawn(&mut sched, Priority::Idle);
        let a = spawn(&mut sched, Priority::Normal);
        sched.schedule();
        sched.delay_current(2);
        sched.schedule();

        sched.suspend(a);
        tick_n(&mut sched, 5);
        assert_eq!(sched.state(a), TaskState::Suspended);
    }
}
