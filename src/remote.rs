//! Remote transaction manager.
//!
//! Issues attribute requests to peers and correlates their replies by
//! sequence number.
//!
//! ```text
//!   issue ──▶ free slot? ──▶ transmit ──▶ slot {handler, deadline, seq}
//!                                            │
//!             response (seq match) ──────────┤──▶ handler(SUCCESS)
//!             sweep (deadline passed) ───────┘──▶ handler(TIMEOUT)
//! ```
//!
//! Sequence numbers come from a [`SequenceCounter`] shared by every
//! manager on the node. Bit 7 splits the id space: unicast transactions
//! complete on their first reply, broadcast transactions stay open and
//! receive every reply until the sweep times them out.
//!
//! The sweep runs as a task that sleeps until the nearest deadline and
//! suspends when no slot is in use.

use core::cell::Cell;
use std::rc::Rc;

use log::{debug, info, warn};

use crate::buffer::Buffer;
use crate::config::{EngineConfig, MAX_REMOTE_REQUESTS};
use crate::error::ZclStatus;
use crate::node::ports::{TransmitStatus, Transport, TxFrame};
use crate::scheduler::{TaskHandle, TaskStatus, Ticks, ticks_until};
use crate::zcl::GeneralCommand;
use crate::zcl::cluster::ClusterRole;
use crate::zcl::codec::{self, DataRecord};
use crate::zcl::frame::{FRAME_TYPE_GENERAL, FrameHeader, prepend_header};

/// Bit set in broadcast transaction sequence numbers.
pub const BROADCAST_SEQUENCE_FLAG: u8 = 0x80;

/// Peer address reported with synthesized timeout results.
pub const UNKNOWN_PEER_NODE: u16 = 0xFFFF;
pub const UNKNOWN_PEER_ENDPOINT: u8 = 0xFF;

/// Whether a sequence number belongs to the unicast half of the id space.
pub fn is_unicast_sequence(sequence: u8) -> bool {
    sequence & BROADCAST_SEQUENCE_FLAG == 0
}

// ═══════════════════════════════════════════════════════════════
//  Sequence counter
// ═══════════════════════════════════════════════════════════════

/// Free running transaction counter shared by all remote managers on a
/// node. Clones share the same count.
#[derive(Debug, Clone, Default)]
pub struct SequenceCounter {
    count: Rc<Cell<u8>>,
}

impl SequenceCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next unicast sequence number.
    pub fn unicast(&self) -> u8 {
        self.count.get() & !BROADCAST_SEQUENCE_FLAG
    }

    /// Next broadcast sequence number.
    pub fn broadcast(&self) -> u8 {
        self.count.get() | BROADCAST_SEQUENCE_FLAG
    }

    /// Step past the current value once a transaction has been issued.
    pub fn advance(&self) {
        self.count.set(self.count.get().wrapping_add(1));
    }
}

// ═══════════════════════════════════════════════════════════════
//  Results and requests
// ═══════════════════════════════════════════════════════════════

/// Outcome delivered to a transaction's result handler.
#[derive(Debug)]
pub struct RemoteResult<'a> {
    /// `Success` for a received reply, `Timeout` from the sweep.
    pub status: ZclStatus,
    /// No further results will be delivered for this transaction.
    pub request_complete: bool,
    pub cluster_id: u16,
    pub peer_node: u16,
    pub peer_endpoint: u8,
    pub header: FrameHeader,
    /// Reply payload with the header stripped. Empty on timeout.
    pub payload: &'a Buffer,
}

/// Callback invoked for each reply and for the final timeout. Any
/// per-request state is captured by the closure.
pub type ResultHandler = Box<dyn FnMut(&RemoteResult<'_>)>;

/// Addressing for an outbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestTarget {
    pub local_endpoint: u8,
    pub profile_id: u16,
    pub cluster_id: u16,
    /// Role of the local cluster issuing the request.
    pub role: ClusterRole,
    pub peer_node: u16,
    pub peer_endpoint: u8,
}

struct Slot {
    handler: Option<ResultHandler>,
    deadline: Ticks,
    cluster_id: u16,
    sequence: u8,
}

impl Slot {
    fn free() -> Self {
        Self {
            handler: None,
            deadline: 0,
            cluster_id: 0,
            sequence: 0,
        }
    }

    fn in_use(&self) -> bool {
        self.handler.is_some()
    }
}

// ═══════════════════════════════════════════════════════════════
//  Manager
// ═══════════════════════════════════════════════════════════════

pub struct RemoteManager {
    slots: heapless::Vec<Slot, MAX_REMOTE_REQUESTS>,
    counter: SequenceCounter,
    task: TaskHandle,
    timeout: Ticks,
    buffer_limit: usize,
}

impl RemoteManager {
    pub fn new(config: &EngineConfig, counter: SequenceCounter) -> Self {
        let mut slots = heapless::Vec::new();
        let count = usize::from(config.remote_max_requests).clamp(1, MAX_REMOTE_REQUESTS);
        for _ in 0..count {
            let _ = slots.push(Slot::free());
        }
        Self {
            slots,
            counter,
            task: TaskHandle::new(),
            timeout: config.transaction_timeout_ms,
            buffer_limit: usize::from(config.buffer_limit),
        }
    }

    pub fn task(&self) -> &TaskHandle {
        &self.task
    }

    pub fn counter(&self) -> &SequenceCounter {
        &self.counter
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn active_count(&self) -> usize {
        self.slots.iter().filter(|s| s.in_use()).count()
    }

    /// Send a fully framed request and, if `handler` is set, hold a slot
    /// for its replies until it completes or times out.
    ///
    /// Returns false, dropping the payload, when no slot is free or the
    /// transport does not accept the frame. Requests without a handler
    /// still need a free slot but do not keep it.
    pub fn issue_request(
        &mut self,
        transport: &mut dyn Transport,
        mut frame: TxFrame,
        sequence: u8,
        handler: Option<ResultHandler>,
        now: Ticks,
    ) -> bool {
        let Some(idx) = self.slots.iter().position(|s| !s.in_use()) else {
            warn!(
                "remote: no free transaction slot for cluster 0x{:04X}",
                frame.cluster_id
            );
            return false;
        };

        let status = transport.unicast_transmit(&mut frame);
        if status != TransmitStatus::Success {
            warn!("remote: request 0x{sequence:02X} not sent ({status:?})");
            return false;
        }

        if let Some(handler) = handler {
            self.slots[idx] = Slot {
                handler: Some(handler),
                deadline: now.wrapping_add(self.timeout),
                cluster_id: frame.cluster_id,
                sequence,
            };
            self.task.resume();
        }
        self.counter.advance();
        info!(
            "remote: issued 0x{sequence:02X} to 0x{:04X}/{} cluster 0x{:04X}",
            frame.peer_node, frame.peer_endpoint, frame.cluster_id
        );
        true
    }

    /// Build a general command frame for `target` and issue it with the
    /// next unicast sequence number.
    fn issue_general(
        &mut self,
        transport: &mut dyn Transport,
        target: &RequestTarget,
        vendor_id: u16,
        command: GeneralCommand,
        mut payload: Buffer,
        handler: Option<ResultHandler>,
        now: Ticks,
    ) -> bool {
        let sequence = self.counter.unicast();
        let mut header = FrameHeader::new(FRAME_TYPE_GENERAL, vendor_id, sequence, command.id());
        if prepend_header(target.role, &mut payload, &mut header).is_err() {
            return false;
        }
        let frame = TxFrame {
            peer_node: target.peer_node,
            peer_endpoint: target.peer_endpoint,
            local_endpoint: target.local_endpoint,
            cluster_id: target.cluster_id,
            profile_id: target.profile_id,
            payload,
        };
        self.issue_request(transport, frame, sequence, handler, now)
    }

    /// Ask a peer for up to `max_ids` attribute ids starting at `start_id`.
    pub fn discover_attributes(
        &mut self,
        transport: &mut dyn Transport,
        target: &RequestTarget,
        vendor_id: u16,
        start_id: u16,
        max_ids: u8,
        handler: ResultHandler,
        now: Ticks,
    ) -> bool {
        let mut payload = Buffer::with_limit(self.buffer_limit);
        let id = start_id.to_le_bytes();
        if payload.append(&[id[0], id[1], max_ids]).is_err() {
            return false;
        }
        self.issue_general(
            transport,
            target,
            vendor_id,
            GeneralCommand::DiscoverAttributes,
            payload,
            Some(handler),
            now,
        )
    }

    /// Read a list of attributes from a peer.
    pub fn read_attributes(
        &mut self,
        transport: &mut dyn Transport,
        target: &RequestTarget,
        vendor_id: u16,
        attr_ids: &[u16],
        handler: ResultHandler,
        now: Ticks,
    ) -> bool {
        let mut payload = Buffer::with_limit(self.buffer_limit);
        for id in attr_ids {
            if payload.append(&id.to_le_bytes()).is_err() {
                return false;
            }
        }
        self.issue_general(
            transport,
            target,
            vendor_id,
            GeneralCommand::ReadAttributes,
            payload,
            Some(handler),
            now,
        )
    }

    /// Write attribute records on a peer.
    ///
    /// Without a handler the silent form is sent and no reply is
    /// expected. `atomic` selects all-or-nothing semantics and is ignored
    /// for silent writes.
    pub fn write_attributes(
        &mut self,
        transport: &mut dyn Transport,
        target: &RequestTarget,
        vendor_id: u16,
        records: &[DataRecord<'_>],
        atomic: bool,
        handler: Option<ResultHandler>,
        now: Ticks,
    ) -> bool {
        let mut payload = Buffer::with_limit(self.buffer_limit);
        for record in records {
            if let Err(e) = codec::serialize_data_record(record, &mut payload) {
                warn!("remote: write record 0x{:04X} not encoded: {e}", record.attr_id);
                return false;
            }
        }
        let command = match (&handler, atomic) {
            (None, _) => GeneralCommand::WriteAttributesSilent,
            (Some(_), true) => GeneralCommand::WriteAttributesAtomic,
            (Some(_), false) => GeneralCommand::WriteAttributes,
        };
        self.issue_general(transport, target, vendor_id, command, payload, handler, now)
    }

    /// Deliver a reply to the transaction holding its sequence number.
    /// Replies without a matching transaction are ignored. Always
    /// returns `Null`: replies never generate a default response here.
    pub fn handle_response(
        &mut self,
        cluster_id: u16,
        peer_node: u16,
        peer_endpoint: u8,
        header: &FrameHeader,
        payload: &Buffer,
    ) -> ZclStatus {
        let Some(slot) = self
            .slots
            .iter_mut()
            .find(|s| s.in_use() && s.sequence == header.sequence)
        else {
            debug!("remote: unmatched reply 0x{:02X}", header.sequence);
            return ZclStatus::Null;
        };

        let request_complete = is_unicast_sequence(header.sequence);
        let result = RemoteResult {
            status: ZclStatus::Success,
            request_complete,
            cluster_id,
            peer_node,
            peer_endpoint,
            header: *header,
            payload,
        };
        if let Some(handler) = slot.handler.as_mut() {
            handler(&result);
        }
        if request_complete {
            *slot = Slot::free();
            info!("remote: transaction 0x{:02X} complete", header.sequence);
        }
        ZclStatus::Null
    }

    /// Timeout sweep. Expired transactions get a `Timeout` result and
    /// release their slot; the task then sleeps until the nearest
    /// remaining deadline.
    pub fn tick(&mut self, now: Ticks) -> TaskStatus {
        let empty = Buffer::new();
        let mut next: Option<i32> = None;

        for slot in self.slots.iter_mut().filter(|s| s.in_use()) {
            let remaining = ticks_until(slot.deadline, now);
            if remaining > 0 {
                next = Some(next.map_or(remaining, |n| n.min(remaining)));
                continue;
            }
            let result = RemoteResult {
                status: ZclStatus::Timeout,
                request_complete: true,
                cluster_id: slot.cluster_id,
                peer_node: UNKNOWN_PEER_NODE,
                peer_endpoint: UNKNOWN_PEER_ENDPOINT,
                header: FrameHeader::new(0xFF, crate::zcl::STANDARD_VENDOR_ID, slot.sequence, 0xFF),
                payload: &empty,
            };
            if let Some(handler) = slot.handler.as_mut() {
                handler(&result);
            }
            info!("remote: transaction 0x{:02X} timed out", slot.sequence);
            *slot = Slot::free();
        }

        match next {
            Some(delay) => {
                debug!("remote: next timeout in {delay} ms");
                TaskStatus::RunLater(delay as Ticks)
            }
            None => TaskStatus::Suspend,
        }
    }
}
