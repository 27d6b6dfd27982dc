//! In-memory record store for host builds and tests.
//!
//! Records live in a `HashMap` keyed by tag. Writes can be made to fail
//! on demand to exercise the engine's storage error paths.

use std::collections::HashMap;

use log::debug;

use crate::error::StorageError;
use crate::node::ports::RecordStore;

#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    records: HashMap<u16, Vec<u8>>,
    fail_writes: bool,
    /// Largest record accepted, if bounded.
    max_record_len: Option<usize>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject records longer than `len` bytes with `Full`.
    #[must_use]
    pub fn with_max_record_len(mut self, len: usize) -> Self {
        self.max_record_len = Some(len);
        self
    }

    /// Make every subsequent write and delete fail with `IoError`.
    pub fn set_fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Raw record contents.
    pub fn record(&self, tag: u16) -> Option<&[u8]> {
        self.records.get(&tag).map(Vec::as_slice)
    }
}

impl RecordStore for MemoryRecordStore {
    fn read(&self, tag: u16, offset: usize, buf: &mut [u8]) -> Result<usize, StorageError> {
        let data = self.records.get(&tag).ok_or(StorageError::NotFound)?;
        if offset > data.len() {
            return Err(StorageError::OutOfRange);
        }
        let len = (data.len() - offset).min(buf.len());
        buf[..len].copy_from_slice(&data[offset..offset + len]);
        Ok(len)
    }

    fn write(&mut self, tag: u16, data: &[u8]) -> Result<(), StorageError> {
        if self.fail_writes {
            return Err(StorageError::IoError);
        }
        if self.max_record_len.is_some_and(|max| data.len() > max) {
            return Err(StorageError::Full);
        }
        debug!("store: record 0x{:04X} <- {} bytes", tag, data.len());
        self.records.insert(tag, data.to_vec());
        Ok(())
    }

    fn delete(&mut self, tag: u16) -> Result<(), StorageError> {
        if self.fail_writes {
            return Err(StorageError::IoError);
        }
        self.records.remove(&tag);
        Ok(())
    }

    fn exists(&self, tag: u16) -> bool {
        self.records.contains_key(&tag)
    }
}
