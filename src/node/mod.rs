//! Node layer: endpoints, the port traits and the service that ties the
//! engine to a mesh stack.
//!
//! | Module     | Role                                               |
//! |------------|----------------------------------------------------|
//! | `ports`    | `Transport` and `RecordStore` traits, frame types  |
//! | `endpoint` | cluster registry plus local and remote tasks       |
//! | `service`  | `ZclNode`: receive dispatch, default responses,    |
//! |            | outbound requests, task polling                    |

pub mod endpoint;
pub mod ports;
pub mod service;

pub use endpoint::ZclEndpoint;
pub use ports::{RecordStore, RxMessage, TransmitStatus, Transport, TxFrame};
pub use service::ZclNode;
