//! Adapters: concrete implementations of the node port traits.
//!
//! | Adapter        | Implements    | Backed by               |
//! |----------------|---------------|-------------------------|
//! | `memory_store` | RecordStore   | `HashMap` (host, tests) |
//!
//! Radio transports live with the mesh stack integration and are not
//! part of this crate.

pub mod memory_store;

pub use memory_store::MemoryRecordStore;
