//! Attribute descriptors and dynamic access.
//!
//! An [`Attribute`] pairs its identity (vendor id, attribute id, data
//! type) with one of three storage forms:
//!
//! ```text
//!   AttrValue::Unsigned / Signed   fixed width integer held inline
//!   AttrValue::OctetArray          bounded byte string + length byte
//!   AttrValue::Dynamic             AttrAccessor (getter / setter)
//! ```
//!
//! Dynamic accessors may finish immediately or at some later point.
//! Either way they report through the [`AccessCompletion`] handed to
//! them, which posts the outcome to the owning command processor and
//! resumes its task.

use std::rc::Rc;

use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::channel::Channel;
use log::warn;

use super::codec::{self, RecordValue};
use super::types::{DataType, UNSUPPORTED_SIZE};
use crate::buffer::Buffer;
use crate::error::{BufferError, Error, RegistryError, Result, ZclStatus};
use crate::scheduler::TaskHandle;

// ───────────────────────────────────────────────────────────────
// Option flags
// ───────────────────────────────────────────────────────────────

/// Serialized width for fixed size attributes.
pub const OPTION_FIXED_SIZE_MASK: u8 = 0x0F;
/// Value is held in a bounded octet array.
pub const OPTION_OCTET_ARRAY: u8 = 0x10;
/// Attribute produces reports.
pub const OPTION_REPORT_PRODUCER: u8 = 0x20;
/// Attribute accepts remote writes.
pub const OPTION_REMOTE_WRITE_EN: u8 = 0x40;
/// Value is reached through an [`AttrAccessor`].
pub const OPTION_DYNAMIC_ACCESS: u8 = 0x80;

// ───────────────────────────────────────────────────────────────
// Completion channel
// ───────────────────────────────────────────────────────────────

/// Result of a dynamic attribute access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessOutcome {
    pub status: ZclStatus,
    /// Serialized value (type byte followed by value bytes) produced by
    /// a successful read.
    pub value: Option<Buffer>,
}

/// Single-slot mailbox between an accessor and its command processor.
pub type CompletionChannel = Channel<NoopRawMutex, AccessOutcome, 1>;

/// One-shot handle used by an accessor to report completion.
///
/// Consuming `self` guarantees that every access completes at most once.
pub struct AccessCompletion {
    channel: Rc<CompletionChannel>,
    task: TaskHandle,
}

impl AccessCompletion {
    pub(crate) fn new(channel: Rc<CompletionChannel>, task: TaskHandle) -> Self {
        Self { channel, task }
    }

    /// Finish with a status and no value.
    ///
    /// For reads, `Null` reports an allocation failure and truncates the
    /// response. For writes, `Success` means the value was accepted.
    pub fn complete(self, status: ZclStatus) {
        self.finish(AccessOutcome {
            status,
            value: None,
        });
    }

    /// Finish a read with an already serialized value.
    pub fn complete_with(self, value: Buffer) {
        self.finish(AccessOutcome {
            status: ZclStatus::Success,
            value: Some(value),
        });
    }

    /// Finish a read by serializing `value` as `data_type`.
    pub fn complete_value(self, data_type: DataType, value: &RecordValue<'_>) {
        let mut out = Buffer::new();
        match codec::serialize_value(data_type, value, &mut out) {
            Ok(()) => self.complete_with(out),
            Err(e) => {
                warn!("attribute value could not be serialized: {e}");
                self.complete(ZclStatus::Null);
            }
        }
    }

    fn finish(self, outcome: AccessOutcome) {
        if self.channel.try_send(outcome).is_err() {
            warn!("attribute access completed twice, outcome dropped");
        }
        self.task.resume();
    }
}

// ───────────────────────────────────────────────────────────────
// Accessor trait
// ───────────────────────────────────────────────────────────────

/// Identity of the attribute being accessed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttrInfo {
    pub endpoint_id: u8,
    pub cluster_id: u16,
    pub vendor_id: u16,
    pub attr_id: u16,
    pub data_type: DataType,
}

/// Getter / setter pair for attributes whose value lives outside the
/// registry.
pub trait AttrAccessor {
    /// Produce the current value. Complete with
    /// [`AccessCompletion::complete_value`] on success, or
    /// [`AccessCompletion::complete`] with a failure status.
    fn get(&mut self, info: &AttrInfo, done: AccessCompletion);

    /// Validate (and, if `commit` is set, apply) the serialized value at
    /// `offset` in `data`. The value starts with its type byte.
    ///
    /// The request buffer is only borrowed for the duration of the call;
    /// accessors that finish later must copy what they need first.
    fn set(
        &mut self,
        info: &AttrInfo,
        data: &Buffer,
        offset: usize,
        commit: bool,
        done: AccessCompletion,
    ) {
        let _ = (info, data, offset, commit);
        done.complete(ZclStatus::ReadOnly);
    }
}

// ───────────────────────────────────────────────────────────────
// Attribute
// ───────────────────────────────────────────────────────────────

pub enum AttrValue {
    Unsigned(u64),
    Signed(i64),
    /// `storage.len()` is the capacity; `length` is the wire length
    /// byte, where 0xFF marks the value as invalid.
    OctetArray { storage: Vec<u8>, length: u8 },
    Dynamic(Box<dyn AttrAccessor>),
}

impl core::fmt::Debug for AttrValue {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Unsigned(v) => write!(f, "Unsigned({v:#x})"),
            Self::Signed(v) => write!(f, "Signed({v})"),
            Self::OctetArray { storage, length } => f
                .debug_struct("OctetArray")
                .field("capacity", &storage.len())
                .field("length", length)
                .finish(),
            Self::Dynamic(_) => write!(f, "Dynamic"),
        }
    }
}

#[derive(Debug)]
pub struct Attribute {
    vendor_id: u16,
    attr_id: u16,
    data_type: DataType,
    options: u8,
    value: AttrValue,
}

impl Attribute {
    /// A fixed size attribute initialised to the "invalid" marker for
    /// its type: zero for general and bitmap types, the most negative
    /// value for signed types, and all-ones otherwise.
    pub fn fixed(
        vendor_id: u16,
        attr_id: u16,
        data_type: DataType,
        remote_write: bool,
    ) -> Result<Self> {
        let size = data_type.fixed_size();
        if size == UNSUPPORTED_SIZE {
            return Err(RegistryError::UnsupportedType.into());
        }
        let value = if size == 0 || data_type.is_general_or_bitmap() {
            AttrValue::Unsigned(0)
        } else if data_type.is_signed() {
            AttrValue::Signed(-1i64 << (8 * u32::from(size) - 1))
        } else {
            AttrValue::Unsigned(width_mask(size))
        };
        let mut options = size;
        if remote_write {
            options |= OPTION_REMOTE_WRITE_EN;
        }
        Ok(Self {
            vendor_id,
            attr_id,
            data_type,
            options,
            value,
        })
    }

    /// An octet or character string attribute with `capacity` bytes of
    /// storage. `initial` longer than the capacity is rejected.
    pub fn string(
        vendor_id: u16,
        attr_id: u16,
        data_type: DataType,
        remote_write: bool,
        capacity: u8,
        initial: &[u8],
    ) -> Result<Self> {
        if !data_type.is_string() {
            return Err(RegistryError::NotAString.into());
        }
        if initial.len() > usize::from(capacity) {
            return Err(BufferError::Overflow.into());
        }
        let mut storage = vec![0u8; usize::from(capacity)];
        storage[..initial.len()].copy_from_slice(initial);
        let mut options = OPTION_OCTET_ARRAY;
        if remote_write {
            options |= OPTION_REMOTE_WRITE_EN;
        }
        Ok(Self {
            vendor_id,
            attr_id,
            data_type,
            options,
            value: AttrValue::OctetArray {
                storage,
                length: initial.len() as u8,
            },
        })
    }

    /// An attribute whose value is produced and consumed by `accessor`.
    pub fn dynamic(
        vendor_id: u16,
        attr_id: u16,
        data_type: DataType,
        accessor: Box<dyn AttrAccessor>,
        remote_write: bool,
    ) -> Self {
        let mut options = OPTION_DYNAMIC_ACCESS;
        if remote_write {
            options |= OPTION_REMOTE_WRITE_EN;
        }
        Self {
            vendor_id,
            attr_id,
            data_type,
            options,
            value: AttrValue::Dynamic(accessor),
        }
    }

    pub fn vendor_id(&self) -> u16 {
        self.vendor_id
    }

    pub fn id(&self) -> u16 {
        self.attr_id
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn options(&self) -> u8 {
        self.options
    }

    /// Serialized width for fixed size attributes.
    pub fn fixed_size(&self) -> usize {
        usize::from(self.options & OPTION_FIXED_SIZE_MASK)
    }

    pub fn is_remote_writable(&self) -> bool {
        self.options & OPTION_REMOTE_WRITE_EN != 0
    }

    pub fn is_dynamic(&self) -> bool {
        self.options & OPTION_DYNAMIC_ACCESS != 0
    }

    pub fn is_octet_array(&self) -> bool {
        self.options & OPTION_OCTET_ARRAY != 0
    }

    pub fn is_report_producer(&self) -> bool {
        self.options & OPTION_REPORT_PRODUCER != 0
    }

    /// Mark the attribute as a report producer (or clear the mark).
    pub fn set_report_producer(&mut self, producer: bool) {
        if producer {
            self.options |= OPTION_REPORT_PRODUCER;
        } else {
            self.options &= !OPTION_REPORT_PRODUCER;
        }
    }

    pub fn value(&self) -> &AttrValue {
        &self.value
    }

    pub(crate) fn value_mut(&mut self) -> &mut AttrValue {
        &mut self.value
    }

    pub(crate) fn info(&self, endpoint_id: u8, cluster_id: u16) -> AttrInfo {
        AttrInfo {
            endpoint_id,
            cluster_id,
            vendor_id: self.vendor_id,
            attr_id: self.attr_id,
            data_type: self.data_type,
        }
    }

    pub(crate) fn accessor_mut(&mut self) -> Option<&mut (dyn AttrAccessor + 'static)> {
        match &mut self.value {
            AttrValue::Dynamic(accessor) => Some(accessor.as_mut()),
            _ => None,
        }
    }

    // ── Local value access ────────────────────────────────────

    /// Raw bits of a fixed size value, truncated to its width.
    pub fn value_u64(&self) -> Option<u64> {
        let mask = width_mask(self.options & OPTION_FIXED_SIZE_MASK);
        match self.value {
            AttrValue::Unsigned(v) => Some(v & mask),
            AttrValue::Signed(v) => Some((v as u64) & mask),
            _ => None,
        }
    }

    pub fn value_i64(&self) -> Option<i64> {
        match self.value {
            AttrValue::Signed(v) => Some(v),
            AttrValue::Unsigned(v) => Some(v as i64),
            _ => None,
        }
    }

    pub fn set_unsigned(&mut self, value: u64) -> Result<()> {
        let mask = width_mask(self.options & OPTION_FIXED_SIZE_MASK);
        match &mut self.value {
            AttrValue::Unsigned(v) => {
                *v = value & mask;
                Ok(())
            }
            _ => Err(Error::Registry(RegistryError::UnsupportedType)),
        }
    }

    pub fn set_signed(&mut self, value: i64) -> Result<()> {
        match &mut self.value {
            AttrValue::Signed(v) => {
                *v = value;
                Ok(())
            }
            _ => Err(Error::Registry(RegistryError::UnsupportedType)),
        }
    }

    /// Current string contents, or `None` if the value is marked invalid.
    pub fn octets(&self) -> Option<&[u8]> {
        match &self.value {
            AttrValue::OctetArray { storage, length } => storage.get(..usize::from(*length)),
            _ => None,
        }
    }

    pub fn set_octets(&mut self, bytes: &[u8]) -> Result<()> {
        match &mut self.value {
            AttrValue::OctetArray { storage, length } => {
                let dst = storage
                    .get_mut(..bytes.len())
                    .ok_or(Error::Buffer(BufferError::Overflow))?;
                dst.copy_from_slice(bytes);
                *length = bytes.len() as u8;
                Ok(())
            }
            _ => Err(Error::Registry(RegistryError::NotAString)),
        }
    }
}

/// All-ones mask covering `size` bytes.
pub(crate) fn width_mask(size: u8) -> u64 {
    match size {
        0 => 0,
        s if s >= 8 => u64::MAX,
        s => (1u64 << (8 * u32::from(s))) - 1,
    }
}
