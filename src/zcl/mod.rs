//! Zigbee Cluster Library wire layer.
//!
//! | Module    | Contents                                            |
//! |-----------|-----------------------------------------------------|
//! | `types`   | Data type codes and their serialized widths         |
//! | `codec`   | Typed value parsing and serialization               |
//! | `attr`    | Attribute descriptors and dynamic accessors         |
//! | `cluster` | Cluster instances and their sorted attribute lists  |
//! | `frame`   | Frame header formatting and extraction              |

pub mod attr;
pub mod cluster;
pub mod codec;
pub mod frame;
pub mod types;

/// Vendor id used for standard (non manufacturer specific) attributes
/// and frames.
pub const STANDARD_VENDOR_ID: u16 = 0xFFFF;

/// Profile-wide (general) command identifiers handled by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum GeneralCommand {
    ReadAttributes = 0x00,
    ReadAttributesResponse = 0x01,
    WriteAttributes = 0x02,
    WriteAttributesAtomic = 0x03,
    WriteAttributesResponse = 0x04,
    WriteAttributesSilent = 0x05,
    ConfigureReporting = 0x06,
    ConfigureReportingResponse = 0x07,
    ReadReportingConfig = 0x08,
    ReadReportingConfigResponse = 0x09,
    ReportAttributes = 0x0A,
    DefaultResponse = 0x0B,
    DiscoverAttributes = 0x0C,
    DiscoverAttributesResponse = 0x0D,
}

impl GeneralCommand {
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            0x00 => Some(Self::ReadAttributes),
            0x01 => Some(Self::ReadAttributesResponse),
            0x02 => Some(Self::WriteAttributes),
            0x03 => Some(Self::WriteAttributesAtomic),
            0x04 => Some(Self::WriteAttributesResponse),
            0x05 => Some(Self::WriteAttributesSilent),
            0x06 => Some(Self::ConfigureReporting),
            0x07 => Some(Self::ConfigureReportingResponse),
            0x08 => Some(Self::ReadReportingConfig),
            0x09 => Some(Self::ReadReportingConfigResponse),
            0x0A => Some(Self::ReportAttributes),
            0x0B => Some(Self::DefaultResponse),
            0x0C => Some(Self::DiscoverAttributes),
            0x0D => Some(Self::DiscoverAttributesResponse),
            _ => None,
        }
    }

    pub const fn id(self) -> u8 {
        self as u8
    }

    /// Requests served by the local command processor.
    pub const fn is_local_request(self) -> bool {
        matches!(
            self,
            Self::ReadAttributes
                | Self::WriteAttributes
                | Self::WriteAttributesAtomic
                | Self::WriteAttributesSilent
                | Self::DiscoverAttributes
        )
    }

    /// Responses routed to the remote transaction manager.
    pub const fn is_remote_response(self) -> bool {
        matches!(
            self,
            Self::ReadAttributesResponse
                | Self::WriteAttributesResponse
                | Self::DefaultResponse
                | Self::DiscoverAttributesResponse
        )
    }
}
