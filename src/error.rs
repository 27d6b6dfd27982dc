//! Unified error types for the ZCL engine.
//!
//! Two families live here:
//!
//! - [`ZclStatus`]: the one-byte status codes that travel on the wire
//!   inside response records and default responses.
//! - [`Error`]: internal failures (buffer bounds, registry misuse, record
//!   store faults, bad configuration) that never reach the wire directly.
//!
//! All variants are `Copy` so they can be passed through the state
//! machines without allocation.

use core::fmt;

// ---------------------------------------------------------------------------
// Wire status codes
// ---------------------------------------------------------------------------

/// ZCL status codes used by the attribute command engine.
///
/// `Abort` and `Null` are internal sentinels and are never placed on the
/// wire: `Abort` marks a parse failure, `Null` means "no response
/// required / already handled".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ZclStatus {
    Success = 0x00,
    Failure = 0x01,
    MalformedCommand = 0x80,
    UnsupCommand = 0x81,
    InvalidField = 0x85,
    UnsupAttribute = 0x86,
    InvalidValue = 0x87,
    ReadOnly = 0x88,
    InvalidDataType = 0x8D,
    Timeout = 0x94,
    Abort = 0xFE,
    Null = 0xFF,
}

impl ZclStatus {
    /// The raw status byte.
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Convert a raw status byte, returning `None` for unknown codes.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x00 => Some(Self::Success),
            0x01 => Some(Self::Failure),
            0x80 => Some(Self::MalformedCommand),
            0x81 => Some(Self::UnsupCommand),
            0x85 => Some(Self::InvalidField),
            0x86 => Some(Self::UnsupAttribute),
            0x87 => Some(Self::InvalidValue),
            0x88 => Some(Self::ReadOnly),
            0x8D => Some(Self::InvalidDataType),
            0x94 => Some(Self::Timeout),
            0xFE => Some(Self::Abort),
            0xFF => Some(Self::Null),
            _ => None,
        }
    }

    /// Convert a status byte received from a peer. Codes outside the
    /// supported set collapse to `Failure`.
    pub fn from_wire(code: u8) -> Self {
        Self::from_code(code).unwrap_or(Self::Failure)
    }

    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}

impl fmt::Display for ZclStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Failure => write!(f, "failure"),
            Self::MalformedCommand => write!(f, "malformed command"),
            Self::UnsupCommand => write!(f, "unsupported command"),
            Self::InvalidField => write!(f, "invalid field"),
            Self::UnsupAttribute => write!(f, "unsupported attribute"),
            Self::InvalidValue => write!(f, "invalid value"),
            Self::ReadOnly => write!(f, "read only"),
            Self::InvalidDataType => write!(f, "invalid data type"),
            Self::Timeout => write!(f, "timeout"),
            Self::Abort => write!(f, "abort"),
            Self::Null => write!(f, "null"),
        }
    }
}

// ---------------------------------------------------------------------------
// Top-level engine error
// ---------------------------------------------------------------------------

/// Every fallible non-wire operation in the engine funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A buffer operation went out of bounds or exceeded its limit.
    Buffer(BufferError),
    /// An attribute, cluster or endpoint registration was rejected.
    Registry(RegistryError),
    /// The persistent record store failed.
    Storage(StorageError),
    /// Configuration is invalid.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buffer(e) => write!(f, "buffer: {e}"),
            Self::Registry(e) => write!(f, "registry: {e}"),
            Self::Storage(e) => write!(f, "storage: {e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Buffer errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferError {
    /// Read or write outside the current buffer contents.
    OutOfBounds,
    /// The operation would grow the buffer past its byte limit.
    Overflow,
}

impl fmt::Display for BufferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfBounds => write!(f, "access out of bounds"),
            Self::Overflow => write!(f, "buffer limit exceeded"),
        }
    }
}

impl From<BufferError> for Error {
    fn from(e: BufferError) -> Self {
        Self::Buffer(e)
    }
}

// ---------------------------------------------------------------------------
// Registry errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryError {
    /// An attribute with the same (vendor, id) is already registered.
    DuplicateAttribute,
    /// The attribute data type has no supported encoding.
    UnsupportedType,
    /// A string attribute was declared with a non-string type.
    NotAString,
    /// A cluster with the same id already exists on the endpoint.
    DuplicateCluster,
    /// An endpoint with the same id already exists on the node.
    DuplicateEndpoint,
    /// The attribute value is only reachable through its accessor.
    DynamicAccess,
    UnknownEndpoint,
    UnknownCluster,
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateAttribute => write!(f, "duplicate attribute"),
            Self::UnsupportedType => write!(f, "unsupported data type"),
            Self::NotAString => write!(f, "not a string data type"),
            Self::DuplicateCluster => write!(f, "duplicate cluster"),
            Self::DuplicateEndpoint => write!(f, "duplicate endpoint"),
            Self::DynamicAccess => write!(f, "attribute uses dynamic access"),
            Self::UnknownEndpoint => write!(f, "unknown endpoint"),
            Self::UnknownCluster => write!(f, "unknown cluster"),
        }
    }
}

impl From<RegistryError> for Error {
    fn from(e: RegistryError) -> Self {
        Self::Registry(e)
    }
}

// ---------------------------------------------------------------------------
// Record store errors
// ---------------------------------------------------------------------------

/// Errors from [`RecordStore`](crate::node::ports::RecordStore) operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Requested record tag does not exist.
    NotFound,
    /// Store is full.
    Full,
    /// Generic I/O error.
    IoError,
    /// Offset or length lies outside the record.
    OutOfRange,
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "record not found"),
            Self::Full => write!(f, "store full"),
            Self::IoError => write!(f, "I/O error"),
            Self::OutOfRange => write!(f, "record access out of range"),
        }
    }
}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Engine-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
