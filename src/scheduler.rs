//! Cooperative task primitives.
//!
//! Every engine state machine runs as a task whose tick function runs
//! to completion and reports how it wants to be scheduled next.
//!
//! ```text
//!             start() / resume()
//!   ┌───────────┐ ────────────────▶ ┌───────────┐
//!   │ Suspended │                   │   Ready   │ ──▶ tick()
//!   └───────────┘ ◀──── Suspend ─── └───────────┘
//!         │                          ▲        │
//!         │ resume()        deadline │        │ RunLater(n)
//!         ▼                          │        ▼
//!   ┌───────────┐                 ┌──────────────┐
//!   │   Ready   │ ◀── resume() ── │ Sleeping(at) │
//!   └───────────┘                 └──────────────┘
//! ```
//!
//! A [`TaskHandle`] is shared: the owner applies tick results to it,
//! while completion handles and queues hold clones so they can
//! resume the task from outside its tick function.

use core::cell::Cell;
use std::rc::Rc;

/// Scheduler time base. One tick is one millisecond.
pub type Ticks = u32;

/// Value returned by a task tick function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    /// Run the task again as soon as possible.
    RunImmediate,
    /// Run the task again after the given number of ticks.
    RunLater(Ticks),
    /// Do not run the task again until it is explicitly resumed.
    Suspend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskState {
    Suspended,
    Ready,
    Sleeping { until: Ticks },
}

/// Signed distance from `now` to `deadline` under wrapping tick arithmetic.
pub fn ticks_until(deadline: Ticks, now: Ticks) -> i32 {
    deadline.wrapping_sub(now) as i32
}

// ═══════════════════════════════════════════════════════════════
//  Task handle
// ═══════════════════════════════════════════════════════════════

/// Shared scheduling state for a single task.
#[derive(Debug, Clone)]
pub struct TaskHandle {
    state: Rc<Cell<TaskState>>,
}

impl Default for TaskHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskHandle {
    /// A new task starts suspended.
    pub fn new() -> Self {
        Self {
            state: Rc::new(Cell::new(TaskState::Suspended)),
        }
    }

    /// Mark the task runnable for its first tick.
    pub fn start(&self) {
        self.state.set(TaskState::Ready);
    }

    /// Make a suspended or sleeping task runnable immediately.
    pub fn resume(&self) {
        self.state.set(TaskState::Ready);
    }

    /// Record the result of a tick.
    pub fn apply(&self, status: TaskStatus, now: Ticks) {
        let next = match status {
            TaskStatus::RunImmediate => TaskState::Ready,
            TaskStatus::RunLater(delay) => TaskState::Sleeping {
                until: now.wrapping_add(delay),
            },
            TaskStatus::Suspend => TaskState::Suspended,
        };
        self.state.set(next);
    }

    /// Whether the task should be ticked at `now`.
    pub fn is_due(&self, now: Ticks) -> bool {
        match self.state.get() {
            TaskState::Ready => true,
            TaskState::Sleeping { until } => ticks_until(until, now) <= 0,
            TaskState::Suspended => false,
        }
    }

    /// Absolute wake time, if the task is not suspended.
    /// Ready tasks report `now`.
    pub fn wake_at(&self, now: Ticks) -> Option<Ticks> {
        match self.state.get() {
            TaskState::Ready => Some(now),
            TaskState::Sleeping { until } => Some(until),
            TaskState::Suspended => None,
        }
    }

    pub fn is_suspended(&self) -> bool {
        self.state.get() == TaskState::Suspended
    }
}

/// Pick the earlier of two optional wake times relative to `now`.
pub fn earliest_wake(a: Option<Ticks>, b: Option<Ticks>, now: Ticks) -> Option<Ticks> {
    match (a, b) {
        (Some(x), Some(y)) => {
            if ticks_until(x, now) <= ticks_until(y, now) {
                Some(x)
            } else {
                Some(y)
            }
        }
        (x, None) => x,
        (None, y) => y,
    }
}
