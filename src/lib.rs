//! ZCL attribute command engine.
//!
//! Serves and issues Zigbee Cluster Library attribute commands (discover,
//! read, write) for the endpoints of a single node. Everything runs as
//! cooperative tasks driven by [`node::ZclNode::poll`]; the mesh stack is
//! reached only through the port traits in [`node::ports`].
//!
//! ```text
//!   mesh stack ──▶ ZclNode::receive ──▶ endpoint ──▶ LocalProcessor ──▶ Transport
//!                                               └──▶ RemoteManager  ──▶ ResultHandler
//! ```

#![deny(unused_must_use)]

pub mod adapters;
pub mod buffer;
pub mod clusters;
pub mod config;
pub mod error;
pub mod local;
pub mod node;
pub mod remote;
pub mod scheduler;
pub mod zcl;

pub use buffer::Buffer;
pub use config::EngineConfig;
pub use error::{Error, Result, ZclStatus};
pub use node::{RecordStore, RxMessage, TransmitStatus, Transport, TxFrame, ZclEndpoint, ZclNode};
pub use remote::{RemoteResult, ResultHandler, SequenceCounter};
pub use scheduler::{TaskStatus, Ticks};
