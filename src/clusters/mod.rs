//! Ready-made cluster servers built on the attribute registry.

pub mod basic;

pub use basic::{BasicInfo, BasicRecord, PowerSource, basic_server_cluster};
