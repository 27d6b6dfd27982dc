//! Local command processor.
//!
//! Serves attribute discovery, read and write requests received by an
//! endpoint, one command at a time, using a function-pointer state table:
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │  StateTable                                   │
//! │  ┌────────────────┬───────────────────────┐   │
//! │  │ LocalState     │ on_tick               │   │
//! │  ├────────────────┼───────────────────────┤   │
//! │  │ Idle           │ fn(ctx, env) -> Task  │   │
//! │  │ StartRequest   │ fn(ctx, env) -> Task  │   │
//! │  │ ReadAttrReq    │ fn(ctx, env) -> Task  │   │
//! │  │ ...            │ ...                   │   │
//! │  │ ResponseSend   │ fn(ctx, env) -> Task  │   │
//! │  └────────────────┴───────────────────────┘   │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! Each tick runs the handler for the current state. Handlers update
//! `ctx.state` themselves and tell the scheduler when to run next. The
//! WAIT states suspend until a dynamic attribute accessor completes; an
//! accessor that completes inside the call is picked up in the same tick.

pub mod context;
pub mod states;

use log::{debug, warn};

use crate::config::EngineConfig;
use crate::error::ZclStatus;
use crate::scheduler::{TaskHandle, TaskStatus};
use context::{LocalContext, LocalEnv, QueuedCommand};

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

/// Processing states. Must stay in sync with [`states::build_state_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum LocalState {
    Idle = 0,
    StartRequest = 1,
    ReadAttrReq = 2,
    ReadAttrWait = 3,
    CheckAttrReq = 4,
    CheckAttrWait = 5,
    CheckComplete = 6,
    WriteAttrReq = 7,
    WriteAttrWait = 8,
    WriteComplete = 9,
    ResponseSend = 10,
}

impl LocalState {
    pub const COUNT: usize = 11;
}

/// Per-tick handler signature.
pub type StateTickFn = fn(&mut LocalContext, &mut LocalEnv<'_>) -> TaskStatus;

/// One row of the state table.
pub struct StateDescriptor {
    pub id: LocalState,
    pub name: &'static str,
    pub on_tick: StateTickFn,
}

// ---------------------------------------------------------------------------
// Processor
// ---------------------------------------------------------------------------

pub struct LocalProcessor {
    table: [StateDescriptor; LocalState::COUNT],
    ctx: LocalContext,
}

impl LocalProcessor {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            table: states::build_state_table(),
            ctx: LocalContext::new(config),
        }
    }

    pub fn task(&self) -> &TaskHandle {
        &self.ctx.task
    }

    pub fn state(&self) -> LocalState {
        self.ctx.state
    }

    pub fn state_name(&self) -> &'static str {
        self.table[self.ctx.state as usize].name
    }

    /// Commands waiting behind the one in flight.
    pub fn queued(&self) -> usize {
        self.ctx.queue.len()
    }

    /// Queue a received request.
    ///
    /// Returns `Null` once queued, since the response is generated by
    /// the processor, or `Failure` if the queue is full, in which case
    /// the command and its payload are dropped.
    pub fn queue_request(&mut self, command: QueuedCommand) -> ZclStatus {
        if self.ctx.queue.len() >= self.ctx.queue_capacity {
            warn!(
                "local: queue full, dropped command 0x{:02X} seq {}",
                command.header.command_id, command.header.sequence
            );
            return ZclStatus::Failure;
        }
        if self.ctx.queue.push_back(command).is_err() {
            return ZclStatus::Failure;
        }
        if self.ctx.task.is_suspended() && self.ctx.state == LocalState::Idle {
            self.ctx.task.resume();
        }
        ZclStatus::Null
    }

    /// Run the handler for the current state once.
    pub fn tick(&mut self, env: &mut LocalEnv<'_>) -> TaskStatus {
        let before = self.ctx.state;
        let status = (self.table[before as usize].on_tick)(&mut self.ctx, env);
        let after = self.ctx.state;
        if after != before {
            debug!(
                "local ep {}: {} -> {}",
                env.endpoint_id,
                self.table[before as usize].name,
                self.table[after as usize].name
            );
        }
        status
    }
}
