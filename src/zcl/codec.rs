//! Typed value codec.
//!
//! Wire layout of a data item and of the records built around it:
//!
//! ```text
//! data item     ┌──────┬─────────────────────────┐
//!               │ type │ value (0..8 B, or str)  │
//!               └──────┴─────────────────────────┘
//! string value  ┌─────┬───────────────┐
//!               │ len │ len bytes ... │   len 0xFF = invalid, no bytes
//!               └─────┴───────────────┘
//! data record   ┌─────────┬──────────┬───────────┐
//!               │ id (LE) │ [status] │ data item │
//!               └─────────┴──────────┴───────────┘
//! ```
//!
//! Fixed width integers are little endian. Signed values are sign
//! extended to 64 bits when parsed and truncated to their width when
//! serialized. Serializers either append a complete item or leave the
//! output buffer untouched.

use super::attr::{AttrValue, Attribute};
use super::types::DataType;
use crate::buffer::Buffer;
use crate::error::{Error, RegistryError, Result, ZclStatus};

/// String length byte marking an absent or invalid value.
pub const INVALID_STRING_LENGTH: u8 = 0xFF;

// ───────────────────────────────────────────────────────────────
// Neutral data records
// ───────────────────────────────────────────────────────────────

/// Parsed or to-be-serialized value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordValue<'a> {
    /// No value present (failed status record).
    Absent,
    Unsigned(u64),
    Signed(i64),
    /// String contents, or `None` for the invalid marker.
    Octets(Option<&'a [u8]>),
}

/// Attribute record as carried in read responses, reports and write
/// requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataRecord<'a> {
    pub attr_id: u16,
    /// `Null` when the record has no status field.
    pub status: ZclStatus,
    pub data_type: DataType,
    pub value: RecordValue<'a>,
}

impl<'a> DataRecord<'a> {
    /// A record without a status field, ready for serialization.
    pub fn new(attr_id: u16, data_type: DataType, value: RecordValue<'a>) -> Self {
        Self {
            attr_id,
            status: ZclStatus::Null,
            data_type,
            value,
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Helpers
// ───────────────────────────────────────────────────────────────

fn abort<E>(_: E) -> ZclStatus {
    ZclStatus::Abort
}

fn read_le(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .rev()
        .fold(0u64, |acc, b| (acc << 8) | u64::from(*b))
}

fn sign_extend(raw: u64, size: usize) -> i64 {
    if size == 0 || size >= 8 {
        return raw as i64;
    }
    let shift = 64 - 8 * size as u32;
    ((raw << shift) as i64) >> shift
}

fn decode_fixed(data_type: DataType, bytes: &[u8]) -> RecordValue<'static> {
    let raw = read_le(bytes);
    if data_type.is_signed() {
        RecordValue::Signed(sign_extend(raw, bytes.len()))
    } else {
        RecordValue::Unsigned(raw)
    }
}

fn unsupported() -> Error {
    Error::Registry(RegistryError::UnsupportedType)
}

/// Run `f` against `out`, restoring the original size if it fails.
fn append_atomic(out: &mut Buffer, f: impl FnOnce(&mut Buffer) -> Result<()>) -> Result<()> {
    let start = out.len();
    let result = f(out);
    if result.is_err() {
        let _ = out.resize(start);
    }
    result
}

// ───────────────────────────────────────────────────────────────
// Parsing
// ───────────────────────────────────────────────────────────────

/// Size of the value following the type byte at `offset`, including a
/// string length byte. Fails with `Abort` for unsupported types or a
/// truncated buffer.
pub fn parse_data_size(buffer: &Buffer, offset: usize) -> core::result::Result<usize, ZclStatus> {
    let data_type = DataType(buffer.read_u8(offset).map_err(abort)?);
    if data_type.is_string() {
        let length = buffer.read_u8(offset + 1).map_err(abort)?;
        return Ok(if length == INVALID_STRING_LENGTH {
            1
        } else {
            usize::from(length) + 1
        });
    }
    data_type.size().ok_or(ZclStatus::Abort)
}

/// Parse the data record at `offset`, returning it with its size.
///
/// With `check_status` set the record carries a status byte after the
/// attribute id; records with a non-success status are returned with
/// [`RecordValue::Absent`] and a size of 3. String contents are copied
/// into `scratch`: a missing scratch area gives `InvalidDataType` and
/// one that is too small gives `InvalidValue`.
pub fn parse_data_record<'a>(
    buffer: &Buffer,
    offset: usize,
    check_status: bool,
    scratch: Option<&'a mut [u8]>,
) -> core::result::Result<(DataRecord<'a>, usize), ZclStatus> {
    let attr_id = buffer.read_u16_le(offset).map_err(abort)?;
    let mut status = ZclStatus::Null;
    let header_size = if check_status {
        status = ZclStatus::from_wire(buffer.read_u8(offset + 2).map_err(abort)?);
        if !status.is_success() {
            let record = DataRecord {
                attr_id,
                status,
                data_type: DataType::NO_DATA,
                value: RecordValue::Absent,
            };
            return Ok((record, 3));
        }
        3
    } else {
        2
    };

    let item = offset + header_size;
    let data_type = DataType(buffer.read_u8(item).map_err(abort)?);

    if data_type.is_string() {
        let length = buffer.read_u8(item + 1).map_err(abort)?;
        let size = if length == INVALID_STRING_LENGTH {
            0
        } else {
            usize::from(length)
        };
        let scratch = scratch.ok_or(ZclStatus::InvalidDataType)?;
        let dst = scratch.get_mut(..size).ok_or(ZclStatus::InvalidValue)?;
        buffer.read(item + 2, dst).map_err(abort)?;
        let value = if length == INVALID_STRING_LENGTH {
            RecordValue::Octets(None)
        } else {
            RecordValue::Octets(Some(dst))
        };
        let record = DataRecord {
            attr_id,
            status,
            data_type,
            value,
        };
        return Ok((record, header_size + size + 2));
    }

    let size = data_type.size().ok_or(ZclStatus::Abort)?;
    let mut bytes = [0u8; 8];
    buffer.read(item + 1, &mut bytes[..size]).map_err(abort)?;
    let record = DataRecord {
        attr_id,
        status,
        data_type,
        value: decode_fixed(data_type, &bytes[..size]),
    };
    Ok((record, header_size + size + 1))
}

/// Parse the data item at `offset` into `attr`.
///
/// The item's type byte must match the attribute type. Boolean values
/// other than 0, 1 and 0xFF are rejected. When `commit` is false the
/// item is only validated and the attribute is left untouched.
pub fn parse_attr_data(
    attr: &mut Attribute,
    buffer: &Buffer,
    offset: usize,
    commit: bool,
) -> ZclStatus {
    let data_type = attr.data_type();
    let size = attr.fixed_size();

    match attr.value_mut() {
        AttrValue::Dynamic(_) => ZclStatus::Failure,

        AttrValue::OctetArray { storage, length } => {
            let mut head = [0u8; 2];
            if buffer.read(offset, &mut head).is_err() {
                return ZclStatus::Abort;
            }
            if head[0] != data_type.code() {
                return ZclStatus::InvalidDataType;
            }
            let new_length = head[1];
            if new_length != 0 && new_length != INVALID_STRING_LENGTH {
                let n = usize::from(new_length);
                if n > storage.len() {
                    return ZclStatus::InvalidValue;
                }
                if offset + 2 + n > buffer.len() {
                    return ZclStatus::Abort;
                }
                if commit && buffer.read(offset + 2, &mut storage[..n]).is_err() {
                    return ZclStatus::Abort;
                }
            }
            if commit {
                *length = new_length;
            }
            ZclStatus::Success
        }

        value => {
            let mut item = [0u8; 9];
            if size > 8 || buffer.read(offset, &mut item[..=size]).is_err() {
                return ZclStatus::Abort;
            }
            if item[0] != data_type.code() {
                return ZclStatus::InvalidDataType;
            }
            if data_type == DataType::BOOLEAN && item[1] > 0x01 && item[1] < 0xFF {
                return ZclStatus::InvalidValue;
            }
            if commit {
                let raw = read_le(&item[1..=size]);
                *value = if data_type.is_signed() {
                    AttrValue::Signed(sign_extend(raw, size))
                } else {
                    AttrValue::Unsigned(raw)
                };
            }
            ZclStatus::Success
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Serialization
// ───────────────────────────────────────────────────────────────

/// Append a data item (type byte then value) to `out`.
pub fn serialize_value(data_type: DataType, value: &RecordValue<'_>, out: &mut Buffer) -> Result<()> {
    if data_type.is_string() {
        let RecordValue::Octets(contents) = value else {
            return Err(unsupported());
        };
        return append_atomic(out, |out| {
            match contents {
                None => out.append(&[data_type.code(), INVALID_STRING_LENGTH])?,
                Some(bytes) => {
                    let length = u8::try_from(bytes.len())
                        .ok()
                        .filter(|l| *l != INVALID_STRING_LENGTH)
                        .ok_or(Error::Buffer(crate::error::BufferError::Overflow))?;
                    out.append(&[data_type.code(), length])?;
                    out.append(bytes)?;
                }
            }
            Ok(())
        });
    }

    let size = data_type.size().ok_or_else(unsupported)?;
    let raw = match value {
        RecordValue::Unsigned(v) => *v,
        RecordValue::Signed(v) => *v as u64,
        _ => return Err(unsupported()),
    };
    let mut item = [0u8; 9];
    item[0] = data_type.code();
    item[1..=size].copy_from_slice(&raw.to_le_bytes()[..size]);
    out.append(&item[..=size])?;
    Ok(())
}

/// Append the attribute's current value as a data item.
///
/// Octet arrays whose length exceeds their capacity are sent with the
/// invalid length marker.
pub fn serialize_attr_data(attr: &Attribute, out: &mut Buffer) -> Result<()> {
    let data_type = attr.data_type();
    match attr.value() {
        AttrValue::Unsigned(v) => serialize_value(data_type, &RecordValue::Unsigned(*v), out),
        AttrValue::Signed(v) => serialize_value(data_type, &RecordValue::Signed(*v), out),
        AttrValue::OctetArray { storage, length } => {
            let contents = if *length == INVALID_STRING_LENGTH {
                None
            } else {
                storage.get(..usize::from(*length))
            };
            serialize_value(data_type, &RecordValue::Octets(contents), out)
        }
        AttrValue::Dynamic(_) => Err(RegistryError::DynamicAccess.into()),
    }
}

/// Append a data record (attribute id then data item). The status field
/// is never written.
pub fn serialize_data_record(record: &DataRecord<'_>, out: &mut Buffer) -> Result<()> {
    append_atomic(out, |out| {
        out.append(&record.attr_id.to_le_bytes())?;
        serialize_value(record.data_type, &record.value, out)
    })
}
