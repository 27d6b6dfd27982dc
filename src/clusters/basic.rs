//! Basic cluster server (0x0000).
//!
//! ```text
//!   static attributes          held in the cluster registry
//!   0x0000 ZCL version         U8          8
//!   0x0001..0x0003 versions    U8
//!   0x0004 manufacturer name   CHAR_STRING ≤32
//!   0x0005 model identifier    CHAR_STRING ≤32
//!   0x0007 power source        ENUM8
//!
//!   persisted attributes       BasicAccessor ──▶ RecordStore[tag]
//!   0x0010 location            CHAR_STRING ≤16
//!   0x0011 physical env        ENUM8
//!   0x0012 device enabled      BOOLEAN
//!   0x0013 alarm mask          BITMAP8
//!   0x0014 disable local cfg   BITMAP8
//! ```
//!
//! Persisted values are kept as a single postcard encoded [`BasicRecord`]
//! and read back on every access.

use core::cell::RefCell;
use std::rc::Rc;

use heapless::Vec;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::buffer::Buffer;
use crate::error::{Result, StorageError, ZclStatus};
use crate::node::ports::RecordStore;
use crate::zcl::STANDARD_VENDOR_ID;
use crate::zcl::attr::{AccessCompletion, AttrAccessor, AttrInfo, Attribute};
use crate::zcl::cluster::{Cluster, ClusterRole};
use crate::zcl::codec::{INVALID_STRING_LENGTH, RecordValue};
use crate::zcl::types::DataType;

pub const BASIC_CLUSTER_ID: u16 = 0x0000;

pub const ATTR_ZCL_VERSION: u16 = 0x0000;
pub const ATTR_APPLICATION_VERSION: u16 = 0x0001;
pub const ATTR_STACK_VERSION: u16 = 0x0002;
pub const ATTR_HW_VERSION: u16 = 0x0003;
pub const ATTR_MANUFACTURER_NAME: u16 = 0x0004;
pub const ATTR_MODEL_IDENTIFIER: u16 = 0x0005;
pub const ATTR_POWER_SOURCE: u16 = 0x0007;
pub const ATTR_LOCATION_DESCRIPTION: u16 = 0x0010;
pub const ATTR_PHYSICAL_ENVIRONMENT: u16 = 0x0011;
pub const ATTR_DEVICE_ENABLED: u16 = 0x0012;
pub const ATTR_ALARM_MASK: u16 = 0x0013;
pub const ATTR_DISABLE_LOCAL_CONFIG: u16 = 0x0014;

pub const ZCL_VERSION: u8 = 8;
pub const NAME_MAX_LEN: u8 = 32;
pub const LOCATION_MAX_LEN: usize = 16;

/// Valid bits of the alarm mask and disable-local-config bitmaps.
const BITMAP_VALID_MASK: u64 = 0x03;

/// Upper bound on an encoded [`BasicRecord`].
const RECORD_MAX_LEN: usize = 32;

/// Set on the power source value when a backup battery is fitted.
pub const POWER_SOURCE_BATTERY_BACKUP: u8 = 0x80;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum PowerSource {
    #[default]
    Unknown = 0x00,
    MainsSinglePhase = 0x01,
    MainsThreePhase = 0x02,
    Battery = 0x03,
    DcSource = 0x04,
    EmergencyMainsConstant = 0x05,
    EmergencyMainsTransfer = 0x06,
}

/// Static device description served read-only.
#[derive(Debug, Clone, Default)]
pub struct BasicInfo<'a> {
    pub application_version: u8,
    pub stack_version: u8,
    pub hw_version: u8,
    pub manufacturer_name: &'a str,
    pub model_identifier: &'a str,
    pub power_source: PowerSource,
    pub battery_backup: bool,
}

impl BasicInfo<'_> {
    /// Wire value of the power source attribute.
    pub fn power_source_code(&self) -> u8 {
        let code = self.power_source as u8;
        if self.battery_backup {
            code | POWER_SOURCE_BATTERY_BACKUP
        } else {
            code
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Persisted record
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicRecord {
    pub location: Vec<u8, LOCATION_MAX_LEN>,
    pub physical_environment: u8,
    pub device_enabled: u8,
    pub alarm_mask: u8,
    pub disable_local_config: u8,
}

impl Default for BasicRecord {
    fn default() -> Self {
        Self {
            location: Vec::new(),
            physical_environment: 0,
            device_enabled: 1,
            alarm_mask: 0,
            disable_local_config: 0,
        }
    }
}

impl BasicRecord {
    pub fn load<S: RecordStore + ?Sized>(store: &S, tag: u16) -> core::result::Result<Self, StorageError> {
        let mut buf = [0u8; RECORD_MAX_LEN];
        let len = store.read(tag, 0, &mut buf)?;
        postcard::from_bytes(&buf[..len]).map_err(|_| StorageError::IoError)
    }

    pub fn save<S: RecordStore + ?Sized>(&self, store: &mut S, tag: u16) -> core::result::Result<(), StorageError> {
        let bytes = postcard::to_allocvec(self).map_err(|_| StorageError::IoError)?;
        store.write(tag, &bytes)
    }
}

// ───────────────────────────────────────────────────────────────
// Accessor
// ───────────────────────────────────────────────────────────────

/// Serves the persisted Basic attributes out of a shared record store.
pub struct BasicAccessor<S> {
    store: Rc<RefCell<S>>,
    tag: u16,
}

impl<S> Clone for BasicAccessor<S> {
    fn clone(&self) -> Self {
        Self {
            store: Rc::clone(&self.store),
            tag: self.tag,
        }
    }
}

/// A decoded write value.
enum Incoming {
    Number(u64),
    Text(Vec<u8, LOCATION_MAX_LEN>),
}

impl<S: RecordStore> BasicAccessor<S> {
    pub fn new(store: Rc<RefCell<S>>, tag: u16) -> Self {
        Self { store, tag }
    }

    fn load(&self) -> core::result::Result<BasicRecord, StorageError> {
        BasicRecord::load(&*self.store.borrow(), self.tag)
    }

    /// Decode and range check the data item at `offset`.
    fn decode(info: &AttrInfo, data: &Buffer, offset: usize) -> core::result::Result<Incoming, ZclStatus> {
        let wire_type = DataType(data.read_u8(offset).map_err(|_| ZclStatus::InvalidValue)?);
        if wire_type != info.data_type {
            return Err(ZclStatus::InvalidDataType);
        }
        if info.attr_id == ATTR_LOCATION_DESCRIPTION {
            let length = data.read_u8(offset + 1).map_err(|_| ZclStatus::InvalidValue)?;
            let mut text = Vec::new();
            if length != INVALID_STRING_LENGTH {
                let length = usize::from(length);
                if length > LOCATION_MAX_LEN {
                    return Err(ZclStatus::InvalidValue);
                }
                let mut bytes = [0u8; LOCATION_MAX_LEN];
                data.read(offset + 2, &mut bytes[..length])
                    .map_err(|_| ZclStatus::InvalidValue)?;
                text.extend_from_slice(&bytes[..length])
                    .map_err(|()| ZclStatus::InvalidValue)?;
            }
            return Ok(Incoming::Text(text));
        }

        let value = u64::from(data.read_u8(offset + 1).map_err(|_| ZclStatus::InvalidValue)?);
        let in_range = match info.attr_id {
            ATTR_PHYSICAL_ENVIRONMENT => true,
            ATTR_DEVICE_ENABLED => value <= 1,
            ATTR_ALARM_MASK | ATTR_DISABLE_LOCAL_CONFIG => value & !BITMAP_VALID_MASK == 0,
            _ => return Err(ZclStatus::UnsupAttribute),
        };
        if in_range {
            Ok(Incoming::Number(value))
        } else {
            Err(ZclStatus::InvalidValue)
        }
    }

    fn apply(&self, attr_id: u16, incoming: Incoming) -> ZclStatus {
        let mut record = match self.load() {
            Ok(record) => record,
            Err(e) => {
                warn!("basic: record 0x{:04X} unreadable: {e}", self.tag);
                return ZclStatus::Failure;
            }
        };
        match (attr_id, incoming) {
            (ATTR_LOCATION_DESCRIPTION, Incoming::Text(text)) => record.location = text,
            (ATTR_PHYSICAL_ENVIRONMENT, Incoming::Number(v)) => record.physical_environment = v as u8,
            (ATTR_DEVICE_ENABLED, Incoming::Number(v)) => record.device_enabled = v as u8,
            (ATTR_ALARM_MASK, Incoming::Number(v)) => record.alarm_mask = v as u8,
            (ATTR_DISABLE_LOCAL_CONFIG, Incoming::Number(v)) => record.disable_local_config = v as u8,
            _ => return ZclStatus::UnsupAttribute,
        }
        match record.save(&mut *self.store.borrow_mut(), self.tag) {
            Ok(()) => ZclStatus::Success,
            Err(e) => {
                warn!("basic: record 0x{:04X} not saved: {e}", self.tag);
                ZclStatus::Failure
            }
        }
    }
}

impl<S: RecordStore> AttrAccessor for BasicAccessor<S> {
    fn get(&mut self, info: &AttrInfo, done: AccessCompletion) {
        let record = match self.load() {
            Ok(record) => record,
            Err(e) => {
                warn!("basic: record 0x{:04X} unreadable: {e}", self.tag);
                done.complete(ZclStatus::Failure);
                return;
            }
        };
        let value = match info.attr_id {
            ATTR_LOCATION_DESCRIPTION => RecordValue::Octets(Some(record.location.as_slice())),
            ATTR_PHYSICAL_ENVIRONMENT => RecordValue::Unsigned(record.physical_environment.into()),
            ATTR_DEVICE_ENABLED => RecordValue::Unsigned(record.device_enabled.into()),
            ATTR_ALARM_MASK => RecordValue::Unsigned(record.alarm_mask.into()),
            ATTR_DISABLE_LOCAL_CONFIG => RecordValue::Unsigned(record.disable_local_config.into()),
            _ => {
                done.complete(ZclStatus::UnsupAttribute);
                return;
            }
        };
        done.complete_value(info.data_type, &value);
    }

    fn set(&mut self, info: &AttrInfo, data: &Buffer, offset: usize, commit: bool, done: AccessCompletion) {
        let status = match Self::decode(info, data, offset) {
            Err(status) => status,
            Ok(_) if !commit => ZclStatus::Success,
            Ok(incoming) => self.apply(info.attr_id, incoming),
        };
        done.complete(status);
    }
}

// ───────────────────────────────────────────────────────────────
// Cluster construction
// ───────────────────────────────────────────────────────────────

/// Build the Basic server cluster, creating the persisted record under
/// `tag` with defaults if it does not exist yet.
pub fn basic_server_cluster<S: RecordStore + 'static>(
    info: &BasicInfo<'_>,
    store: &Rc<RefCell<S>>,
    tag: u16,
) -> Result<Cluster> {
    let mut cluster = Cluster::new(BASIC_CLUSTER_ID, ClusterRole::Server).with_record_tag(tag);

    let versions = [
        (ATTR_ZCL_VERSION, ZCL_VERSION),
        (ATTR_APPLICATION_VERSION, info.application_version),
        (ATTR_STACK_VERSION, info.stack_version),
        (ATTR_HW_VERSION, info.hw_version),
    ];
    for (id, value) in versions {
        let mut attr = Attribute::fixed(STANDARD_VENDOR_ID, id, DataType::UINT_8, false)?;
        attr.set_unsigned(value.into())?;
        cluster.add_attr(attr)?;
    }

    for (id, text) in [
        (ATTR_MANUFACTURER_NAME, info.manufacturer_name),
        (ATTR_MODEL_IDENTIFIER, info.model_identifier),
    ] {
        cluster.add_attr(Attribute::string(
            STANDARD_VENDOR_ID,
            id,
            DataType::CHAR_STRING,
            false,
            NAME_MAX_LEN,
            text.as_bytes(),
        )?)?;
    }

    let mut power = Attribute::fixed(STANDARD_VENDOR_ID, ATTR_POWER_SOURCE, DataType::ENUM_8, false)?;
    power.set_unsigned(info.power_source_code().into())?;
    cluster.add_attr(power)?;

    let accessor = BasicAccessor::new(Rc::clone(store), tag);
    for (id, data_type) in [
        (ATTR_LOCATION_DESCRIPTION, DataType::CHAR_STRING),
        (ATTR_PHYSICAL_ENVIRONMENT, DataType::ENUM_8),
        (ATTR_DEVICE_ENABLED, DataType::BOOLEAN),
        (ATTR_ALARM_MASK, DataType::BITMAP_8),
        (ATTR_DISABLE_LOCAL_CONFIG, DataType::BITMAP_8),
    ] {
        cluster.add_attr(Attribute::dynamic(
            STANDARD_VENDOR_ID,
            id,
            data_type,
            Box::new(accessor.clone()),
            true,
        ))?;
    }

    let defaults =
        postcard::to_allocvec(&BasicRecord::default()).map_err(|_| StorageError::IoError)?;
    cluster.init_record(&mut *store.borrow_mut(), &defaults)?;
    Ok(cluster)
}
