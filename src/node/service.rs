//! Node service: endpoint registry, message dispatch and task polling.
//!
//! ```text
//!   RxMessage ──▶ endpoint ──▶ cluster ──▶ extract_frame_header
//!                                              │
//!            ┌──────────── general request ────┤
//!            ▼                                 │── general response ──▶ RemoteManager
//!     LocalProcessor queue                     │
//!                                              └── anything else ─▶ UNSUP_COMMAND
//!
//!   status ──▶ default response (unicast, not suppressed, not NULL)
//! ```
//!
//! The node owns the transport. `poll` drives every endpoint task until
//! none is due and reports when it next needs to run.

use log::{debug, info, warn};

use super::endpoint::ZclEndpoint;
use super::ports::{RxMessage, TransmitStatus, Transport, TxFrame};
use crate::buffer::Buffer;
use crate::config::EngineConfig;
use crate::error::{Error, RegistryError, Result, ZclStatus};
use crate::local::LocalProcessor;
use crate::local::context::QueuedCommand;
use crate::remote::{RemoteManager, RequestTarget, ResultHandler, SequenceCounter};
use crate::scheduler::{Ticks, earliest_wake};
use crate::zcl::GeneralCommand;
use crate::zcl::cluster::{Cluster, ClusterRole};
use crate::zcl::codec::DataRecord;
use crate::zcl::frame::{
    FRAME_NO_DEFAULT_RESPONSE, FRAME_TYPE_GENERAL, FrameHeader, extract_frame_header,
    prepend_header,
};

/// Upper bound on scheduler rounds in a single `poll`.
const MAX_POLL_ROUNDS: usize = 1024;

pub struct ZclNode<T: Transport> {
    transport: T,
    config: EngineConfig,
    counter: SequenceCounter,
    /// Sorted by endpoint id.
    endpoints: Vec<ZclEndpoint>,
}

impl<T: Transport> ZclNode<T> {
    pub fn new(transport: T, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            transport,
            config,
            counter: SequenceCounter::new(),
            endpoints: Vec::new(),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Sequence counter shared by every remote manager on this node.
    pub fn sequence_counter(&self) -> &SequenceCounter {
        &self.counter
    }

    // ── Registry ──────────────────────────────────────────────

    /// Register an endpoint with both a local processor and a remote
    /// manager.
    pub fn add_endpoint(&mut self, endpoint_id: u8, profile_id: u16) -> Result<&mut ZclEndpoint> {
        let endpoint = ZclEndpoint::new(endpoint_id, profile_id)
            .with_local_processor(LocalProcessor::new(&self.config))
            .with_remote_manager(self.new_remote_manager());
        self.insert_endpoint(endpoint)
    }

    /// Register a custom endpoint.
    pub fn insert_endpoint(&mut self, endpoint: ZclEndpoint) -> Result<&mut ZclEndpoint> {
        let pos = match self
            .endpoints
            .binary_search_by_key(&endpoint.id(), ZclEndpoint::id)
        {
            Ok(_) => return Err(RegistryError::DuplicateEndpoint.into()),
            Err(pos) => pos,
        };
        info!(
            "node: endpoint {} registered (profile 0x{:04X})",
            endpoint.id(),
            endpoint.profile_id()
        );
        self.endpoints.insert(pos, endpoint);
        Ok(&mut self.endpoints[pos])
    }

    /// A remote manager sharing this node's sequence counter.
    pub fn new_remote_manager(&self) -> RemoteManager {
        RemoteManager::new(&self.config, self.counter.clone())
    }

    pub fn endpoints(&self) -> &[ZclEndpoint] {
        &self.endpoints
    }

    pub fn endpoint(&self, endpoint_id: u8) -> Option<&ZclEndpoint> {
        self.endpoints.iter().find(|e| e.id() == endpoint_id)
    }

    pub fn endpoint_mut(&mut self, endpoint_id: u8) -> Option<&mut ZclEndpoint> {
        self.endpoints.iter_mut().find(|e| e.id() == endpoint_id)
    }

    pub fn add_cluster(&mut self, endpoint_id: u8, cluster: Cluster) -> Result<()> {
        self.endpoint_mut(endpoint_id)
            .ok_or(RegistryError::UnknownEndpoint)?
            .add_cluster(cluster)
    }

    pub fn cluster(&self, endpoint_id: u8, cluster_id: u16) -> Option<&Cluster> {
        self.endpoint(endpoint_id)?.cluster(cluster_id)
    }

    /// Local access to a cluster, e.g. to update attribute values.
    pub fn cluster_mut(&mut self, endpoint_id: u8, cluster_id: u16) -> Option<&mut Cluster> {
        self.endpoint_mut(endpoint_id)?.cluster_mut(cluster_id)
    }

    // ── Receive path ──────────────────────────────────────────

    /// Dispatch a received message. Returns the default response frame,
    /// if one is due, for the caller to send.
    pub fn handle_rx(&mut self, mut msg: RxMessage) -> Option<TxFrame> {
        let Some(endpoint) = self
            .endpoints
            .iter_mut()
            .find(|e| e.id() == msg.local_endpoint)
        else {
            debug!("node: no endpoint {}", msg.local_endpoint);
            return None;
        };
        let Some(role) = endpoint.cluster(msg.cluster_id).map(Cluster::role) else {
            debug!(
                "node: no cluster 0x{:04X} on endpoint {}",
                msg.cluster_id, msg.local_endpoint
            );
            return None;
        };
        let Some(header) = extract_frame_header(role, &mut msg.payload) else {
            debug!("node: invalid frame header from 0x{:04X}", msg.peer_node);
            return None;
        };

        let command = header
            .is_general()
            .then(|| GeneralCommand::from_id(header.command_id))
            .flatten();
        let status = match command {
            Some(c) if c.is_local_request() => match endpoint.local_mut() {
                Some(local) => local.queue_request(QueuedCommand {
                    cluster_id: msg.cluster_id,
                    header,
                    peer_node: msg.peer_node,
                    peer_endpoint: msg.peer_endpoint,
                    payload: core::mem::take(&mut msg.payload),
                }),
                None => ZclStatus::UnsupCommand,
            },
            Some(c) if c.is_remote_response() => match endpoint.remote_mut() {
                Some(remote) => remote.handle_response(
                    msg.cluster_id,
                    msg.peer_node,
                    msg.peer_endpoint,
                    &header,
                    &msg.payload,
                ),
                None => ZclStatus::Null,
            },
            _ => ZclStatus::UnsupCommand,
        };

        let is_default_response =
            header.is_general() && header.command_id == GeneralCommand::DefaultResponse.id();
        if status == ZclStatus::Null
            || !msg.unicast
            || is_default_response
            || header.no_default_response()
        {
            return None;
        }
        default_response(&msg, role, &header, status)
    }

    /// Dispatch a received message and send any default response.
    pub fn receive(&mut self, msg: RxMessage) {
        if let Some(mut frame) = self.handle_rx(msg) {
            let status = self.transport.unicast_transmit(&mut frame);
            if status != TransmitStatus::Success {
                warn!(
                    "node: default response to 0x{:04X} not sent ({status:?})",
                    frame.peer_node
                );
            }
        }
    }

    // ── Outbound requests ─────────────────────────────────────

    fn target(
        &mut self,
        endpoint_id: u8,
        cluster_id: u16,
        peer_node: u16,
        peer_endpoint: u8,
    ) -> Result<(RequestTarget, &mut RemoteManager, &mut T)> {
        let endpoint = self
            .endpoints
            .iter_mut()
            .find(|e| e.id() == endpoint_id)
            .ok_or(RegistryError::UnknownEndpoint)?;
        let role = endpoint
            .cluster(cluster_id)
            .map(Cluster::role)
            .ok_or(RegistryError::UnknownCluster)?;
        let target = RequestTarget {
            local_endpoint: endpoint_id,
            profile_id: endpoint.profile_id(),
            cluster_id,
            role,
            peer_node,
            peer_endpoint,
        };
        let remote = endpoint
            .remote_mut()
            .ok_or(Error::Config("endpoint has no remote manager"))?;
        Ok((target, remote, &mut self.transport))
    }

    /// Discover attributes on a peer cluster. `Ok(false)` means the
    /// request could not be started.
    pub fn discover_attributes(
        &mut self,
        endpoint_id: u8,
        cluster_id: u16,
        peer_node: u16,
        peer_endpoint: u8,
        vendor_id: u16,
        start_id: u16,
        max_ids: u8,
        handler: ResultHandler,
        now: Ticks,
    ) -> Result<bool> {
        let (target, remote, transport) =
            self.target(endpoint_id, cluster_id, peer_node, peer_endpoint)?;
        Ok(remote.discover_attributes(transport, &target, vendor_id, start_id, max_ids, handler, now))
    }

    /// Read attributes from a peer cluster.
    pub fn read_attributes(
        &mut self,
        endpoint_id: u8,
        cluster_id: u16,
        peer_node: u16,
        peer_endpoint: u8,
        vendor_id: u16,
        attr_ids: &[u16],
        handler: ResultHandler,
        now: Ticks,
    ) -> Result<bool> {
        let (target, remote, transport) =
            self.target(endpoint_id, cluster_id, peer_node, peer_endpoint)?;
        Ok(remote.read_attributes(transport, &target, vendor_id, attr_ids, handler, now))
    }

    /// Write attributes on a peer cluster. Without a handler the write is
    /// sent silently.
    pub fn write_attributes(
        &mut self,
        endpoint_id: u8,
        cluster_id: u16,
        peer_node: u16,
        peer_endpoint: u8,
        vendor_id: u16,
        records: &[DataRecord<'_>],
        atomic: bool,
        handler: Option<ResultHandler>,
        now: Ticks,
    ) -> Result<bool> {
        let (target, remote, transport) =
            self.target(endpoint_id, cluster_id, peer_node, peer_endpoint)?;
        Ok(remote.write_attributes(transport, &target, vendor_id, records, atomic, handler, now))
    }

    // ── Scheduling ────────────────────────────────────────────

    /// Run every due task until none is due. Returns the earliest time a
    /// task wants to run again, or `None` if all are suspended.
    pub fn poll(&mut self, now: Ticks) -> Option<Ticks> {
        for _ in 0..MAX_POLL_ROUNDS {
            let mut ran = false;
            for endpoint in &mut self.endpoints {
                ran |= endpoint.run_due(&mut self.transport, now);
            }
            if !ran {
                break;
            }
        }
        self.endpoints
            .iter()
            .fold(None, |acc, e| earliest_wake(acc, e.next_wake(now), now))
    }
}

/// Build the default response to `msg`: the received command id and the
/// resulting status.
fn default_response(
    msg: &RxMessage,
    role: ClusterRole,
    request: &FrameHeader,
    status: ZclStatus,
) -> Option<TxFrame> {
    let mut payload = Buffer::new();
    payload.append(&[request.command_id, status.code()]).ok()?;
    let mut header = FrameHeader::new(
        FRAME_TYPE_GENERAL | FRAME_NO_DEFAULT_RESPONSE,
        request.vendor_id,
        request.sequence,
        GeneralCommand::DefaultResponse.id(),
    );
    prepend_header(role, &mut payload, &mut header).ok()?;
    Some(TxFrame {
        peer_node: msg.peer_node,
        peer_endpoint: msg.peer_endpoint,
        local_endpoint: msg.local_endpoint,
        cluster_id: msg.cluster_id,
        profile_id: msg.profile_id,
        payload,
    })
}
