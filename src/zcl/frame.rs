//! ZCL frame header codec.
//!
//! ```text
//! ┌──────────────┬────────────────────┬──────────┬────────────┐
//! │ frame ctrl   │ vendor id (LE)     │ sequence │ command id │
//! │ 1 B          │ 2 B, only if 0x04  │ 1 B      │ 1 B        │
//! └──────────────┴────────────────────┴──────────┴────────────┘
//!
//! frame control:  bits 0-1  frame type (0 general, 1 cluster specific)
//!                 bit  2    manufacturer specific (vendor id present)
//!                 bit  3    direction (set = sent by the server side)
//!                 bit  4    disable default response
//! ```

use heapless::Vec;

use super::STANDARD_VENDOR_ID;
use super::cluster::ClusterRole;
use crate::buffer::Buffer;
use crate::error::BufferError;

pub const FRAME_TYPE_MASK: u8 = 0x03;
pub const FRAME_TYPE_GENERAL: u8 = 0x00;
pub const FRAME_TYPE_CLUSTER: u8 = 0x01;
pub const FRAME_VENDOR_SPECIFIC: u8 = 0x04;
pub const FRAME_SOURCE_IS_SERVER: u8 = 0x08;
pub const FRAME_NO_DEFAULT_RESPONSE: u8 = 0x10;

/// Longest encoded header.
pub const MAX_HEADER_LEN: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// [`STANDARD_VENDOR_ID`] for frames without a manufacturer code.
    pub vendor_id: u16,
    pub frame_control: u8,
    pub sequence: u8,
    pub command_id: u8,
}

impl FrameHeader {
    pub fn new(frame_control: u8, vendor_id: u16, sequence: u8, command_id: u8) -> Self {
        Self {
            vendor_id,
            frame_control,
            sequence,
            command_id,
        }
    }

    pub fn frame_type(&self) -> u8 {
        self.frame_control & FRAME_TYPE_MASK
    }

    pub fn is_general(&self) -> bool {
        self.frame_type() == FRAME_TYPE_GENERAL
    }

    pub fn is_vendor_specific(&self) -> bool {
        self.frame_control & FRAME_VENDOR_SPECIFIC != 0
    }

    pub fn source_is_server(&self) -> bool {
        self.frame_control & FRAME_SOURCE_IS_SERVER != 0
    }

    pub fn no_default_response(&self) -> bool {
        self.frame_control & FRAME_NO_DEFAULT_RESPONSE != 0
    }

    /// Encoded header bytes, vendor id included when the vendor flag is set.
    pub fn encode(&self) -> Vec<u8, MAX_HEADER_LEN> {
        let mut out = Vec::new();
        // At most five bytes, so none of these can overflow.
        let _ = out.push(self.frame_control);
        if self.is_vendor_specific() {
            let _ = out.extend_from_slice(&self.vendor_id.to_le_bytes());
        }
        let _ = out.extend_from_slice(&[self.sequence, self.command_id]);
        out
    }
}

/// Fix up the direction and vendor flags of `header` for a frame sent by
/// a cluster with the given role, then prepend the encoded header to
/// `buffer`.
pub fn prepend_header(
    role: ClusterRole,
    buffer: &mut Buffer,
    header: &mut FrameHeader,
) -> Result<(), BufferError> {
    if role == ClusterRole::Server {
        header.frame_control |= FRAME_SOURCE_IS_SERVER;
    } else {
        header.frame_control &= !FRAME_SOURCE_IS_SERVER;
    }
    if header.vendor_id == STANDARD_VENDOR_ID {
        header.frame_control &= !FRAME_VENDOR_SPECIFIC;
    } else {
        header.frame_control |= FRAME_VENDOR_SPECIFIC;
    }
    buffer.prepend(&header.encode())
}

/// Parse and strip the header of a frame received by a cluster with the
/// given role.
///
/// Returns `None` for truncated headers, unknown frame types, and frames
/// whose direction does not match: a server only accepts frames sent by
/// a client and vice versa. The buffer is left untouched in that case.
pub fn extract_frame_header(role: ClusterRole, buffer: &mut Buffer) -> Option<FrameHeader> {
    let mut head = [0u8; 3];
    buffer.read(0, &mut head).ok()?;
    let frame_control = head[0];

    let (vendor_id, sequence, command_id, len) = if frame_control & FRAME_VENDOR_SPECIFIC != 0 {
        let mut tail = [0u8; 2];
        buffer.read(3, &mut tail).ok()?;
        (u16::from_le_bytes([head[1], head[2]]), tail[0], tail[1], 5)
    } else {
        (STANDARD_VENDOR_ID, head[1], head[2], 3)
    };

    let header = FrameHeader::new(frame_control, vendor_id, sequence, command_id);
    if header.frame_type() > FRAME_TYPE_CLUSTER {
        return None;
    }
    let expect_from_server = role == ClusterRole::Client;
    if header.source_is_server() != expect_from_server {
        return None;
    }

    let remaining = buffer.len() - len;
    buffer.rebase(remaining).ok()?;
    Some(header)
}
