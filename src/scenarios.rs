//! End-to-end runs of the two arbitration tasks on the real scheduler.
//!
//! The harness plays the part of the CPU: it asks the scheduler what to run,
//! runs one arbitration cycle for an arbitration task, and lets a tick pass
//! whenever the idle task holds the CPU. Samples are taken once per tick,
//! after every cycle due at that tick has run.

use crate::arbitration::{ArbitrationTask, CycleTiming, OutputBank, Peer, TaskControl};
use crate::indicator::LineId;
use crate::scheduler::Scheduler;
use crate::task::{Priority, TaskConfig, TaskId, TaskState};

const LINE_0: LineId = LineId::new(0);
const LINE_1: LineId = LineId::new(1);

impl TaskControl for Scheduler {
    fn priority(&self, task: TaskId) -> Priority {
        Scheduler::priority(self, task)
    }

    fn suspend(&mut self, task: TaskId) {
        Scheduler::suspend(self, task);
    }

    fn resume(&mut self, task: TaskId) {
        Scheduler::resume(self, task);
    }

    fn sleep(&mut self, ticks: u32) {
        self.delay_current(ticks);
    }
}

/// Two lines that remember when they were toggled.
#[derive(Default)]
struct Lines {
    on: [bool; 2],
    now: u64,
    toggles: [Vec<u64>; 2],
}

impl OutputBank for Lines {
    fn set_line(&mut self, line: LineId, on: bool) {
        self.on[line.index()] = on;
    }

    fn toggle_line(&mut self, line: LineId) {
        self.on[line.index()] = !self.on[line.index()];
        self.toggles[line.index()].push(self.now);
    }
}

#[derive(Debug, Clone, Copy)]
struct Sample {
    lines: [bool; 2],
    states: [TaskState; 2],
}

struct Sim {
    sched: Scheduler,
    lines: Lines,
    idle: TaskId,
    tasks: [ArbitrationTask; 2],
    samples: Vec<Sample>,
}

extern "C" fn never_entered(_arg: usize) -> ! {
    loop {
        core::hint::spin_loop();
    }
}

impl Sim {
    fn new(a: Priority, b: Priority) -> Self {
        let mut sched = Scheduler::new();
        let idle = sched
            .create_task(never_entered, TaskConfig::new(Priority::Idle))
            .unwrap();
        let id_a = sched.create_task(never_entered, TaskConfig::new(a)).unwrap();
        let id_b = sched.create_task(never_entered, TaskConfig::new(b)).unwrap();
        for id in [idle, id_a, id_b] {
            sched.activate(id, 0).unwrap();
        }

        let task_a = ArbitrationTask::new(
            id_a,
            LINE_0,
            Peer::new(id_b, LINE_1),
            CycleTiming::default(),
        );
        Self {
            sched,
            lines: Lines::default(),
            idle,
            tasks: [task_a, task_a.counterpart()],
            samples: Vec::new(),
        }
    }

    fn state(&self, which: usize) -> TaskState {
        self.sched.state(self.tasks[which].task())
    }

    fn run_until(&mut self, end: u64) {
        while self.sched.now() < end {
            let current = self.sched.schedule();
            if current == self.idle {
                self.samples.push(Sample {
                    lines: self.lines.on,
                    states: [self.state(0), self.state(1)],
                });
                self.sched.tick();
                continue;
            }

            let task = if current == self.tasks[0].task() {
                self.tasks[0]
            } else {
                self.tasks[1]
            };
            self.lines.now = self.sched.now();
            task.cycle(&mut self.sched, &mut self.lines);
        }
    }

    fn toggle_spacing(&self, line: LineId) -> Vec<u64> {
        self.lines.toggles[line.index()]
            .windows(2)
            .map(|w| w[1] - w[0])
            .collect()
    }
}

/// One task outranks the other: its line blinks at the long period, the
/// other line stays off and the other task stays suspended.
fn assert_dominance(sim: &Sim, winner: usize) {
    let loser = 1 - winner;
    let winner_line = sim.tasks[winner].line();
    let loser_line = sim.tasks[loser].line();

    for (tick, s) in sim.samples.iter().enumerate() {
        assert!(!s.lines[loser_line.index()], "loser line on at tick {}", tick);
        assert_eq!(s.states[loser], TaskState::Suspended, "tick {}", tick);
        assert_ne!(s.states[winner], TaskState::Suspended, "tick {}", tick);
    }

    assert!(sim.lines.toggles[loser_line.index()].is_empty());
    let spacing = sim.toggle_spacing(winner_line);
    assert!(spacing.len() >= 8, "only {} blinks", spacing.len() + 1);
    assert!(spacing.iter().all(|&d| d == 500), "spacing {:?}", spacing);

    let lit = sim.samples.iter().filter(|s| s.lines[winner_line.index()]).count();
    assert!(lit > 0 && lit < sim.samples.len());
}

#[test]
fn scenario_a_task_a_dominates() {
    let mut sim = Sim::new(Priority::High, Priority::Normal);
    sim.run_until(5_000);
    assert_dominance(&sim, 0);
}

#[test]
fn scenario_b_task_b_dominates() {
    let mut sim = Sim::new(Priority::Low, Priority::High);
    sim.run_until(5_000);
    assert_dominance(&sim, 1);
}

#[test]
fn scenario_c_equal_priorities_both_blink() {
    let mut sim = Sim::new(Priority::Normal, Priority::Normal);
    sim.run_until(5_000);

    for (tick, s) in sim.samples.iter().enumerate() {
        assert!(
            !s.states.contains(&TaskState::Suspended),
            "suspension at tick {}",
            tick
        );
    }
    for line in [LINE_0, LINE_1] {
        let spacing = sim.toggle_spacing(line);
        assert!(spacing.len() >= 8);
        assert!(spacing.iter().all(|&d| d == 500), "spacing {:?}", spacing);
    }
}

#[test]
fn every_unequal_pair_has_one_blinker() {
    // Idle included: the arbitration tasks then share that level with the
    // idle task in time slices.
    for a in Priority::LEVELS {
        for b in Priority::LEVELS {
            if a == b {
                continue;
            }
            let mut sim = Sim::new(a, b);
            sim.run_until(2_000);
            let winner = if a > b { 0 } else { 1 };
            let loser_line = sim.tasks[1 - winner].line();
            assert!(
                sim.samples.iter().all(|s| !s.lines[loser_line.index()]),
                "{:?}/{:?}",
                a,
                b
            );
            assert!(sim.toggle_spacing(sim.tasks[winner].line()).len() >= 3);
        }
    }
}

#[test]
fn both_tasks_at_idle_level_blink() {
    let mut sim = Sim::new(Priority::Idle, Priority::Idle);
    sim.run_until(2_000);

    assert!(sim
        .samples
        .iter()
        .all(|s| !s.states.contains(&TaskState::Suspended)));
    for line in [LINE_0, LINE_1] {
        let spacing = sim.toggle_spacing(line);
        assert!(spacing.len() >= 3);
        assert!(spacing.iter().all(|&d| d == 500), "spacing {:?}", spacing);
    }
}

#[test]
fn wrongly_suspended_peer_is_released_within_one_cycle() {
    let mut sim = Sim::new(Priority::Normal, Priority::Normal);
    let b = sim.tasks[1].task();
    sim.sched.suspend(b);

    sim.run_until(1);

    // TaskA ran first, resumed B, and B got its turn at the same tick
    assert_ne!(sim.samples[0].states[1], TaskState::Suspended);
    assert_eq!(sim.lines.toggles[LINE_1.index()], [0]);
}

#[test]
fn lit_subordinate_line_is_forced_off_within_one_cycle() {
    let mut sim = Sim::new(Priority::High, Priority::Low);
    sim.lines.on[LINE_1.index()] = true;

    sim.run_until(1);

    assert!(!sim.samples[0].lines[LINE_1.index()]);
    assert_eq!(sim.samples[0].states[1], TaskState::Suspended);
}

#[test]
fn repeated_suspend_and_resume_leave_no_residue() {
    let mut sim = Sim::new(Priority::Normal, Priority::Normal);
    let b = sim.tasks[1].task();

    assert!(sim.sched.suspend(b));
    assert!(!sim.sched.suspend(b));
    assert!(sim.sched.resume(b));
    // One resume undoes any number of suspends
    assert_eq!(sim.sched.state(b), TaskState::Ready);
    assert!(!sim.sched.resume(b));
    assert_eq!(sim.sched.state(b), TaskState::Ready);
}
