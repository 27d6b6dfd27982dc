//! ZCL data type codes.
//!
//! Type codes form an open one-byte space, so they are carried in a
//! [`DataType`] newtype rather than an exhaustive enum: unknown codes
//! arriving from a peer must still be representable so they can be
//! rejected with the right status.
//!
//! ```text
//!  0x08..0x0F  general    ┐
//!  0x18..0x1F  bitmap     │ width = 1 + (code & 0x07)
//!  0x20..0x27  unsigned   │
//!  0x28..0x2F  signed     ┘
//!  0x41 / 0x42 octet / char string (1-byte length prefix)
//! ```

use core::fmt;

/// Width marker returned for unsupported type codes.
pub const UNSUPPORTED_SIZE: u8 = 0xFF;

/// One-byte ZCL data type code.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DataType(pub u8);

impl DataType {
    pub const NO_DATA: Self = Self(0x00);
    pub const UNKNOWN: Self = Self(0xFF);

    pub const GENERAL_8: Self = Self(0x08);
    pub const GENERAL_16: Self = Self(0x09);
    pub const GENERAL_24: Self = Self(0x0A);
    pub const GENERAL_32: Self = Self(0x0B);
    pub const GENERAL_40: Self = Self(0x0C);
    pub const GENERAL_48: Self = Self(0x0D);
    pub const GENERAL_56: Self = Self(0x0E);
    pub const GENERAL_64: Self = Self(0x0F);

    pub const BOOLEAN: Self = Self(0x10);

    pub const BITMAP_8: Self = Self(0x18);
    pub const BITMAP_16: Self = Self(0x19);
    pub const BITMAP_24: Self = Self(0x1A);
    pub const BITMAP_32: Self = Self(0x1B);
    pub const BITMAP_40: Self = Self(0x1C);
    pub const BITMAP_48: Self = Self(0x1D);
    pub const BITMAP_56: Self = Self(0x1E);
    pub const BITMAP_64: Self = Self(0x1F);

    pub const UINT_8: Self = Self(0x20);
    pub const UINT_16: Self = Self(0x21);
    pub const UINT_24: Self = Self(0x22);
    pub const UINT_32: Self = Self(0x23);
    pub const UINT_40: Self = Self(0x24);
    pub const UINT_48: Self = Self(0x25);
    pub const UINT_56: Self = Self(0x26);
    pub const UINT_64: Self = Self(0x27);

    pub const INT_8: Self = Self(0x28);
    pub const INT_16: Self = Self(0x29);
    pub const INT_24: Self = Self(0x2A);
    pub const INT_32: Self = Self(0x2B);
    pub const INT_40: Self = Self(0x2C);
    pub const INT_48: Self = Self(0x2D);
    pub const INT_56: Self = Self(0x2E);
    pub const INT_64: Self = Self(0x2F);

    pub const ENUM_8: Self = Self(0x30);
    pub const ENUM_16: Self = Self(0x31);

    pub const FLOAT_32: Self = Self(0x39);
    pub const FLOAT_64: Self = Self(0x3A);

    pub const OCTET_STRING: Self = Self(0x41);
    pub const CHAR_STRING: Self = Self(0x42);

    pub const ARRAY: Self = Self(0x48);
    pub const STRUCT: Self = Self(0x4C);
    pub const SET: Self = Self(0x50);
    pub const BAG: Self = Self(0x51);

    pub const TIME_OF_DAY: Self = Self(0xE0);
    pub const DATE: Self = Self(0xE1);
    pub const UTC_TIME: Self = Self(0xE2);

    pub const CLUSTER_ID: Self = Self(0xE8);
    pub const ATTRIBUTE_ID: Self = Self(0xE9);
    pub const BACNET_OID: Self = Self(0xEA);

    pub const IEEE_ADDRESS: Self = Self(0xF0);
    pub const SECURITY_KEY: Self = Self(0xF1);

    pub const fn code(self) -> u8 {
        self.0
    }

    const fn family(self) -> u8 {
        self.0 & 0xF8
    }

    /// General, bitmap, unsigned and signed families share the
    /// `1 + (code & 7)` width rule.
    pub const fn is_sized_family(self) -> bool {
        matches!(self.family(), 0x08 | 0x18 | 0x20 | 0x28)
    }

    pub const fn is_signed(self) -> bool {
        self.family() == 0x28
    }

    /// Types whose invalid marker is zero rather than all-ones.
    pub const fn is_general_or_bitmap(self) -> bool {
        matches!(self.family(), 0x08 | 0x18)
    }

    pub const fn is_string(self) -> bool {
        self.0 == Self::OCTET_STRING.0 || self.0 == Self::CHAR_STRING.0
    }

    pub const fn is_composite(self) -> bool {
        matches!(self.0, 0x48 | 0x4C | 0x50 | 0x51)
    }

    /// Serialized width in bytes for fixed-size types, 0 for the empty
    /// types, or [`UNSUPPORTED_SIZE`] for everything else (including
    /// strings, which are variable length).
    pub const fn fixed_size(self) -> u8 {
        if self.is_sized_family() {
            return 1 + (self.0 & 0x07);
        }
        match self.0 {
            0x00 | 0xFF => 0,
            0x10 | 0x30 => 1,
            0x31 | 0xE8 | 0xE9 => 2,
            0x39 | 0xE0 | 0xE1 | 0xE2 | 0xEA => 4,
            0x3A | 0xF0 => 8,
            _ => UNSUPPORTED_SIZE,
        }
    }

    /// Fixed width as an `Option`, hiding the sentinel.
    pub const fn size(self) -> Option<usize> {
        match self.fixed_size() {
            UNSUPPORTED_SIZE => None,
            n => Some(n as usize),
        }
    }
}

impl fmt::Debug for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DataType(0x{:02X})", self.0)
    }
}

impl From<u8> for DataType {
    fn from(code: u8) -> Self {
        Self(code)
    }
}
