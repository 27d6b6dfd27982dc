//! Port traits: the boundary between the engine and the mesh stack.
//!
//! ```text
//!   mesh stack ──▶ RxMessage ──▶ ZclNode ──▶ Transport::unicast_transmit
//!                                   │
//!                                   └──▶ RecordStore (cluster records)
//! ```
//!
//! Adapters implement these traits. The engine owns its transport and
//! never touches the radio or flash directly.

use crate::buffer::Buffer;
use crate::error::StorageError;

// ───────────────────────────────────────────────────────────────
// Frames
// ───────────────────────────────────────────────────────────────

/// Outbound application frame. `payload` holds the complete ZCL frame
/// (header and command payload).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TxFrame {
    pub peer_node: u16,
    pub peer_endpoint: u8,
    pub local_endpoint: u8,
    pub cluster_id: u16,
    pub profile_id: u16,
    pub payload: Buffer,
}

/// Inbound application frame delivered by the mesh stack.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RxMessage {
    pub peer_node: u16,
    pub peer_endpoint: u8,
    pub local_endpoint: u8,
    pub cluster_id: u16,
    pub profile_id: u16,
    /// False for broadcast and group addressed messages.
    pub unicast: bool,
    pub payload: Buffer,
}

// ───────────────────────────────────────────────────────────────
// Transport port
// ───────────────────────────────────────────────────────────────

/// Result of a unicast transmit attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransmitStatus {
    /// Frame accepted; the payload has been consumed.
    Success,
    /// Transport busy. The payload is left in place for a later attempt.
    Retry,
    InvalidCall,
    MessageTooLong,
    Failed,
}

/// Mesh message layer used for every outbound frame.
pub trait Transport {
    /// Queue `frame` for unicast delivery. On [`TransmitStatus::Success`]
    /// the transport takes the payload and leaves `frame.payload` empty;
    /// on any other status the payload must be left untouched.
    fn unicast_transmit(&mut self, frame: &mut TxFrame) -> TransmitStatus;

    /// Largest whole ZCL frame (header and payload) the transport carries.
    fn max_message_size(&self) -> usize;
}

// ───────────────────────────────────────────────────────────────
// Record store port
// ───────────────────────────────────────────────────────────────

/// Tagged non-volatile record storage used by persistent clusters.
///
/// Writes replace the whole record and must be atomic.
pub trait RecordStore {
    /// Copy record bytes from `offset` into `buf`. Returns the number of
    /// bytes copied, which is short if the record ends first.
    fn read(&self, tag: u16, offset: usize, buf: &mut [u8]) -> Result<usize, StorageError>;

    /// Create or replace a record.
    fn write(&mut self, tag: u16, data: &[u8]) -> Result<(), StorageError>;

    /// Remove a record. Returns `Ok(())` even if it didn't exist.
    fn delete(&mut self, tag: u16) -> Result<(), StorageError>;

    fn exists(&self, tag: u16) -> bool;
}
