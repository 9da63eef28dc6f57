//! # Priority Arbitration
//!
//! The protocol two peer tasks run against each other. On every cycle a task
//! reads its own and its peer's live priority, classifies the pair into a
//! [`PriorityRelation`] and applies the matching rule:
//!
//! | Relation       | Own line | Peer                              | Sleep       |
//! |----------------|----------|-----------------------------------|-------------|
//! | `SelfDominant` | toggle   | suspend, and force its line off   | dominant    |
//! | `PeerDominant` | off      | untouched                         | subordinate |
//! | `Equal`        | toggle   | resume                            | dominant    |
//!
//! Nothing is remembered between cycles. Every effect on the peer is
//! idempotent, so repeating it each cycle is harmless, and a state left
//! inconsistent by an earlier cycle is overwritten by the next one.
//!
//! The scheduler and the output hardware are reached only through the
//! [`TaskControl`] and [`OutputBank`] traits; the kernel and the board each
//! provide an implementation, and the tests provide recording mocks.

use crate::config::{DOMINANT_PERIOD_TICKS, SUBORDINATE_RATIO};
use crate::indicator::LineId;
use crate::task::{Priority, TaskId};

// ---------------------------------------------------------------------------
// Collaborator interfaces
// ---------------------------------------------------------------------------

/// The scheduler operations an arbitration task relies on. None of them can
/// fail for a handle the kernel handed out.
pub trait TaskControl {
    /// Live priority of `task`.
    fn priority(&self, task: TaskId) -> Priority;

    /// Take `task` out of scheduling. No-op if already suspended.
    fn suspend(&mut self, task: TaskId);

    /// Make a suspended `task` runnable again. No-op if it is not suspended.
    fn resume(&mut self, task: TaskId);

    /// Put the calling task to sleep for `ticks`.
    fn sleep(&mut self, ticks: u32);
}

/// Binary output lines addressed by [`LineId`].
pub trait OutputBank {
    fn set_line(&mut self, line: LineId, on: bool);
    fn toggle_line(&mut self, line: LineId);
}

// ---------------------------------------------------------------------------
// Relation
// ---------------------------------------------------------------------------

/// How this task's priority compares to its peer's, from this task's side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum PriorityRelation {
    /// Own priority strictly greater.
    SelfDominant,
    /// Own priority strictly lower.
    PeerDominant,
    /// Same priority.
    Equal,
}

impl PriorityRelation {
    /// Classify a pair of priorities.
    pub fn between(own: Priority, peer: Priority) -> Self {
        match own.cmp(&peer) {
            core::cmp::Ordering::Greater => Self::SelfDominant,
            core::cmp::Ordering::Less => Self::PeerDominant,
            core::cmp::Ordering::Equal => Self::Equal,
        }
    }
}

// ---------------------------------------------------------------------------
// Timing
// ---------------------------------------------------------------------------

/// Sleep lengths for the two kinds of cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleTiming {
    /// Ticks slept after a dominant or equal cycle (the blink half-period).
    pub dominant_ticks: u32,
    /// Ticks slept after a subordinate cycle.
    pub subordinate_ticks: u32,
}

impl CycleTiming {
    /// Derive both periods from the dominant one, keeping the subordinate
    /// cycle `SUBORDINATE_RATIO` times shorter (never below one tick).
    pub const fn from_dominant(dominant_ticks: u32) -> Self {
        let subordinate_ticks = dominant_ticks / SUBORDINATE_RATIO;
        Self {
            dominant_ticks,
            subordinate_ticks: if subordinate_ticks == 0 { 1 } else { subordinate_ticks },
        }
    }

    /// Sleep length for a cycle that acted on `relation`.
    pub const fn for_relation(&self, relation: PriorityRelation) -> u32 {
        match relation {
            PriorityRelation::SelfDominant | PriorityRelation::Equal => self.dominant_ticks,
            PriorityRelation::PeerDominant => self.subordinate_ticks,
        }
    }
}

impl Default for CycleTiming {
    fn default() -> Self {
        Self::from_dominant(DOMINANT_PERIOD_TICKS)
    }
}

// ---------------------------------------------------------------------------
// Peer capability
// ---------------------------------------------------------------------------

/// What a task may do to its peer: nothing beyond reading its priority,
/// silencing it while dominant, and releasing it while tied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Peer {
    task: TaskId,
    line: LineId,
}

impl Peer {
    pub const fn new(task: TaskId, line: LineId) -> Self {
        Self { task, line }
    }

    pub const fn task(&self) -> TaskId {
        self.task
    }

    pub const fn line(&self) -> LineId {
        self.line
    }

    /// Suspend the peer and drive its line off on its behalf, since a
    /// suspended task cannot turn its own line off.
    pub fn suppress<K: TaskControl, O: OutputBank>(&self, kernel: &mut K, outputs: &mut O) {
        kernel.suspend(self.task);
        outputs.set_line(self.line, false);
    }

    /// Make sure the peer is runnable.
    pub fn release<K: TaskControl>(&self, kernel: &mut K) {
        kernel.resume(self.task);
    }
}

// ---------------------------------------------------------------------------
// Arbitration task
// ---------------------------------------------------------------------------

/// One side of the pair. Both tasks run the same routine with the roles
/// swapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArbitrationTask {
    own: TaskId,
    line: LineId,
    peer: Peer,
    timing: CycleTiming,
}

impl ArbitrationTask {
    pub const fn new(own: TaskId, line: LineId, peer: Peer, timing: CycleTiming) -> Self {
        Self {
            own,
            line,
            peer,
            timing,
        }
    }

    /// The opposite side of this pair: same timing, roles swapped.
    pub const fn counterpart(&self) -> Self {
        Self {
            own: self.peer.task,
            line: self.peer.line,
            peer: Peer::new(self.own, self.line),
            timing: self.timing,
        }
    }

    pub const fn task(&self) -> TaskId {
        self.own
    }

    pub const fn line(&self) -> LineId {
        self.line
    }

    pub const fn peer(&self) -> &Peer {
        &self.peer
    }

    pub const fn timing(&self) -> CycleTiming {
        self.timing
    }

    /// Where this task stands against its peer right now.
    pub fn relation<K: TaskControl>(&self, kernel: &K) -> PriorityRelation {
        PriorityRelation::between(kernel.priority(self.own), kernel.priority(self.peer.task))
    }

    /// Run one cycle: classify, act, sleep. Returns the relation acted on.
    pub fn cycle<K: TaskControl, O: OutputBank>(
        &self,
        kernel: &mut K,
        outputs: &mut O,
    ) -> PriorityRelation {
        let relation = self.relation(kernel);
        match relation {
            PriorityRelation::SelfDominant => {
                self.peer.suppress(kernel, outputs);
                outputs.toggle_line(self.line);
            }
            PriorityRelation::PeerDominant => {
                outputs.set_line(self.line, false);
            }
            PriorityRelation::Equal => {
                self.peer.release(kernel);
                outputs.toggle_line(self.line);
            }
        }
        kernel.sleep(self.timing.for_relation(relation));
        relation
    }

    /// Cycle forever, logging whenever the relation changes.
    pub fn run<K: TaskControl, O: OutputBank>(&self, kernel: &mut K, outputs: &mut O) -> ! {
        info!("{} on line {} against {}", self.own, self.line, self.peer.task);
        let mut last = None;
        loop {
            let relation = self.cycle(kernel, outputs);
            if last != Some(relation) {
                debug!("{}: {}", self.own, relation);
                last = Some(relation);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------
