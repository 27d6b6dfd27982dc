//! Engine configuration parameters
//!
//! All tunable sizes and timings for the ZCL engine.
//! Values can be loaded from JSON or persisted in postcard form.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Hard upper bound for the local command queue depth.
pub const MAX_LOCAL_QUEUE_LEN: usize = 8;

/// Hard upper bound for the number of remote transaction slots.
pub const MAX_REMOTE_REQUESTS: usize = 8;

/// Core engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    // --- Local command processing ---
    /// Number of inbound attribute commands that can wait per endpoint
    pub local_queue_len: u8,

    // --- Remote transactions ---
    /// Number of concurrent outbound transactions per endpoint
    pub remote_max_requests: u8,
    /// Transaction timeout (milliseconds)
    pub transaction_timeout_ms: u32,

    // --- Timing ---
    /// Delay before retrying on allocation failure or transport retry (milliseconds)
    pub retry_delay_ms: u32,

    // --- Memory ---
    /// Byte ceiling applied to every engine-owned buffer
    pub buffer_limit: u16,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            local_queue_len: 2,
            remote_max_requests: 2,
            transaction_timeout_ms: 20_000,
            retry_delay_ms: 25,
            buffer_limit: u16::MAX,
        }
    }
}

impl EngineConfig {
    /// Range-check every field.
    pub fn validate(&self) -> Result<()> {
        if self.local_queue_len == 0 || self.local_queue_len as usize > MAX_LOCAL_QUEUE_LEN {
            return Err(Error::Config("local_queue_len must be 1–8"));
        }
        if self.remote_max_requests == 0 || self.remote_max_requests as usize > MAX_REMOTE_REQUESTS
        {
            return Err(Error::Config("remote_max_requests must be 1–8"));
        }
        if self.transaction_timeout_ms == 0 {
            return Err(Error::Config("transaction_timeout_ms must be non-zero"));
        }
        // Deadlines are compared as signed tick differences.
        if self.transaction_timeout_ms > i32::MAX as u32 {
            return Err(Error::Config("transaction_timeout_ms out of range"));
        }
        if self.retry_delay_ms == 0 {
            return Err(Error::Config("retry_delay_ms must be non-zero"));
        }
        if self.buffer_limit < 8 {
            return Err(Error::Config("buffer_limit must be at least 8"));
        }
        Ok(())
    }

    /// Parse and validate a JSON configuration document.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(text).map_err(|_| Error::Config("malformed JSON config"))?;
        config.validate()?;
        Ok(config)
    }
}
