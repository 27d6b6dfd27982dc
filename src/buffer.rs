//! Byte buffer used for every ZCL payload.
//!
//! A [`Buffer`] is a growable byte sequence with a hard byte limit
//! (at most 65535). Every sizing and copy operation is bounds-checked
//! and reports failure through [`BufferError`] instead of panicking, so
//! the state machines can treat a full buffer as an allocation failure.
//!
//! ```text
//!   prepend ──▶ ┌──────────────────────────┐ ◀── append / extend
//!               │ header │ payload ...     │
//!   rebase  ◀── └──────────────────────────┘ ──▶ resize (tail)
//! ```
//!
//! [`Buffer::move_from`] transfers the contents without copying and
//! leaves the source empty. The destination keeps its own limit, so a
//! move is refused when the contents would not fit.

use crate::error::BufferError;

/// Largest buffer the engine will ever build.
pub const MAX_BUFFER_SIZE: usize = 65_535;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Buffer {
    data: Vec<u8>,
    limit: usize,
}

impl Default for Buffer {
    fn default() -> Self {
        Self::new()
    }
}

impl Buffer {
    /// An empty buffer with the maximum byte limit.
    pub fn new() -> Self {
        Self::with_limit(MAX_BUFFER_SIZE)
    }

    /// An empty buffer that refuses to grow past `limit` bytes.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            data: Vec::new(),
            limit: limit.min(MAX_BUFFER_SIZE),
        }
    }

    /// A buffer holding a copy of `bytes`.
    pub fn from_slice(bytes: &[u8]) -> Self {
        let mut buffer = Self::new();
        buffer.data.extend_from_slice(&bytes[..bytes.len().min(MAX_BUFFER_SIZE)]);
        buffer
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    fn check_size(&self, size: usize) -> Result<(), BufferError> {
        if size > self.limit {
            Err(BufferError::Overflow)
        } else {
            Ok(())
        }
    }

    // ── Sizing ────────────────────────────────────────────────

    /// Discard the contents and reallocate `size` zeroed bytes.
    pub fn reset(&mut self, size: usize) -> Result<(), BufferError> {
        self.data.clear();
        self.check_size(size)?;
        self.data.resize(size, 0);
        Ok(())
    }

    /// Change the size by adding or removing bytes at the tail.
    pub fn resize(&mut self, size: usize) -> Result<(), BufferError> {
        self.check_size(size)?;
        self.data.resize(size, 0);
        Ok(())
    }

    /// Grow the tail by `count` zeroed bytes.
    pub fn extend(&mut self, count: usize) -> Result<(), BufferError> {
        self.resize(self.data.len() + count)
    }

    /// Change the size by adding or removing bytes at the head.
    pub fn rebase(&mut self, size: usize) -> Result<(), BufferError> {
        self.check_size(size)?;
        let current = self.data.len();
        if size <= current {
            self.data.drain(..current - size);
        } else {
            let pad = size - current;
            self.data.splice(0..0, core::iter::repeat_n(0u8, pad));
        }
        Ok(())
    }

    // ── Data access ───────────────────────────────────────────

    /// Copy `out.len()` bytes starting at `offset` into `out`.
    pub fn read(&self, offset: usize, out: &mut [u8]) -> Result<(), BufferError> {
        let end = offset
            .checked_add(out.len())
            .ok_or(BufferError::OutOfBounds)?;
        let src = self.data.get(offset..end).ok_or(BufferError::OutOfBounds)?;
        out.copy_from_slice(src);
        Ok(())
    }

    /// Overwrite bytes starting at `offset`. Never changes the size.
    pub fn write(&mut self, offset: usize, bytes: &[u8]) -> Result<(), BufferError> {
        let end = offset
            .checked_add(bytes.len())
            .ok_or(BufferError::OutOfBounds)?;
        let dst = self
            .data
            .get_mut(offset..end)
            .ok_or(BufferError::OutOfBounds)?;
        dst.copy_from_slice(bytes);
        Ok(())
    }

    pub fn read_u8(&self, offset: usize) -> Result<u8, BufferError> {
        self.data.get(offset).copied().ok_or(BufferError::OutOfBounds)
    }

    pub fn read_u16_le(&self, offset: usize) -> Result<u16, BufferError> {
        let mut bytes = [0u8; 2];
        self.read(offset, &mut bytes)?;
        Ok(u16::from_le_bytes(bytes))
    }

    pub fn append(&mut self, bytes: &[u8]) -> Result<(), BufferError> {
        self.check_size(self.data.len() + bytes.len())?;
        self.data.extend_from_slice(bytes);
        Ok(())
    }

    pub fn prepend(&mut self, bytes: &[u8]) -> Result<(), BufferError> {
        self.check_size(self.data.len() + bytes.len())?;
        self.data.splice(0..0, bytes.iter().copied());
        Ok(())
    }

    // ── Ownership transfer ────────────────────────────────────

    /// Take the contents of `src`, discarding any current contents.
    /// `src` is left empty on success and untouched on overflow.
    pub fn move_from(&mut self, src: &mut Buffer) -> Result<(), BufferError> {
        self.check_size(src.data.len())?;
        self.data = core::mem::take(&mut src.data);
        Ok(())
    }

    /// Append the contents of `tail`, leaving `tail` empty on success.
    pub fn concatenate(&mut self, tail: &mut Buffer) -> Result<(), BufferError> {
        self.append(&tail.data)?;
        tail.data.clear();
        Ok(())
    }
}
