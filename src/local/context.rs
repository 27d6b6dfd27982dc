//! Per-endpoint state threaded through every local processor handler.
//!
//! `LocalContext` is owned by the processor and holds the command in
//! flight; `LocalEnv` lends the handlers the endpoint's clusters and the
//! transport for the duration of one tick.

use std::rc::Rc;

use embassy_sync::channel::Channel;
use heapless::Deque;

use super::LocalState;
use crate::buffer::Buffer;
use crate::config::{EngineConfig, MAX_LOCAL_QUEUE_LEN};
use crate::error::{BufferError, ZclStatus};
use crate::node::ports::Transport;
use crate::scheduler::{TaskHandle, Ticks};
use crate::zcl::GeneralCommand;
use crate::zcl::attr::{AccessCompletion, CompletionChannel};
use crate::zcl::cluster::{Cluster, ClusterRole};
use crate::zcl::frame::{FRAME_NO_DEFAULT_RESPONSE, FRAME_TYPE_GENERAL, FrameHeader, prepend_header};

// ---------------------------------------------------------------------------
// Queue entries
// ---------------------------------------------------------------------------

/// A received request waiting for the processor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedCommand {
    pub cluster_id: u16,
    /// Header of the request, already stripped from `payload`.
    pub header: FrameHeader,
    pub peer_node: u16,
    pub peer_endpoint: u8,
    pub payload: Buffer,
}

// ---------------------------------------------------------------------------
// Borrowed environment
// ---------------------------------------------------------------------------

/// Endpoint resources lent to the processor for one tick.
pub struct LocalEnv<'a> {
    pub endpoint_id: u8,
    pub profile_id: u16,
    pub clusters: &'a mut [Cluster],
    pub transport: &'a mut dyn Transport,
}

impl LocalEnv<'_> {
    pub fn cluster(&self, cluster_id: u16) -> Option<&Cluster> {
        self.clusters.iter().find(|c| c.id() == cluster_id)
    }

    pub fn cluster_mut(&mut self, cluster_id: u16) -> Option<&mut Cluster> {
        self.clusters.iter_mut().find(|c| c.id() == cluster_id)
    }
}

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

pub struct LocalContext {
    pub state: LocalState,

    // --- Command in flight ---
    pub cluster_id: u16,
    pub command_id: u8,
    pub sequence: u8,
    pub vendor_id: u16,
    pub peer_node: u16,
    pub peer_endpoint: u8,

    // --- Iteration ---
    /// Read: index of the next requested attribute id.
    pub index: usize,
    /// Read: start of the record being built in the response.
    /// Write: start of the next record in the request.
    pub offset: usize,
    /// Write: number of records that failed in the current pass.
    pub failures: usize,

    pub request: Buffer,
    pub response: Buffer,

    pub queue: Deque<QueuedCommand, MAX_LOCAL_QUEUE_LEN>,
    pub queue_capacity: usize,

    pub completion: Rc<CompletionChannel>,
    pub task: TaskHandle,
    pub retry_delay: Ticks,
}

impl LocalContext {
    pub fn new(config: &EngineConfig) -> Self {
        let limit = usize::from(config.buffer_limit);
        Self {
            state: LocalState::Idle,
            cluster_id: 0,
            command_id: 0,
            sequence: 0,
            vendor_id: 0,
            peer_node: 0,
            peer_endpoint: 0,
            index: 0,
            offset: 0,
            failures: 0,
            request: Buffer::with_limit(limit),
            response: Buffer::with_limit(limit),
            queue: Deque::new(),
            queue_capacity: usize::from(config.local_queue_len).clamp(1, MAX_LOCAL_QUEUE_LEN),
            completion: Rc::new(Channel::new()),
            task: TaskHandle::new(),
            retry_delay: config.retry_delay_ms,
        }
    }

    /// Copy the command parameters and take its payload as the request.
    /// Fails if the payload does not fit the request buffer.
    pub fn load(&mut self, mut command: QueuedCommand) -> Result<(), BufferError> {
        self.cluster_id = command.cluster_id;
        self.command_id = command.header.command_id;
        self.sequence = command.header.sequence;
        self.vendor_id = command.header.vendor_id;
        self.peer_node = command.peer_node;
        self.peer_endpoint = command.peer_endpoint;
        self.request.move_from(&mut command.payload)
    }

    pub fn release_buffers(&mut self) {
        let _ = self.request.reset(0);
        let _ = self.response.reset(0);
    }

    pub fn is_command(&self, command: GeneralCommand) -> bool {
        self.command_id == command.id()
    }

    /// Prepend the response header echoing the request's vendor id and
    /// sequence number.
    pub fn prepend_response_header(
        &mut self,
        role: ClusterRole,
        command: GeneralCommand,
    ) -> Result<(), BufferError> {
        let mut header = FrameHeader::new(
            FRAME_TYPE_GENERAL | FRAME_NO_DEFAULT_RESPONSE,
            self.vendor_id,
            self.sequence,
            command.id(),
        );
        prepend_header(role, &mut self.response, &mut header)
    }

    /// Append an (attribute id, status) record to the response.
    pub fn append_status_record(&mut self, attr_id: u16, status: ZclStatus) -> Result<(), BufferError> {
        let id = attr_id.to_le_bytes();
        self.response.append(&[id[0], id[1], status.code()])
    }

    /// Drop the partial read record and send what has been built.
    pub fn truncate_and_send(&mut self) {
        let _ = self.response.resize(self.offset);
        self.state = LocalState::ResponseSend;
    }

    /// Discard any stale outcome and hand out a completion for a new
    /// dynamic access.
    pub fn begin_access(&mut self) -> AccessCompletion {
        while self.completion.try_receive().is_ok() {}
        AccessCompletion::new(self.completion.clone(), self.task.clone())
    }
}
