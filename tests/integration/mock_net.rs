//! Scripted mock transport for integration tests.
//!
//! Records every accepted frame so tests can assert on the exact bytes
//! sent, and replays a script of transmit statuses before falling back
//! to `Success`.

use std::collections::VecDeque;

use zcl_engine::zcl::STANDARD_VENDOR_ID;
use zcl_engine::zcl::attr::Attribute;
use zcl_engine::zcl::cluster::{Cluster, ClusterRole};
use zcl_engine::zcl::types::DataType;
use zcl_engine::{Buffer, EngineConfig, RxMessage, TransmitStatus, Transport, TxFrame, ZclNode};

pub const HA_PROFILE: u16 = 0x0104;
pub const ON_OFF: u16 = 0x0006;
pub const PEER_NODE: u16 = 0x1234;
pub const PEER_ENDPOINT: u8 = 2;
pub const LOCAL_ENDPOINT: u8 = 1;

// ── MockNet ───────────────────────────────────────────────────

pub struct MockNet {
    pub sent: Vec<TxFrame>,
    pub script: VecDeque<TransmitStatus>,
    pub max_message: usize,
    pub attempts: usize,
}

#[allow(dead_code)]
impl MockNet {
    pub fn new() -> Self {
        Self {
            sent: Vec::new(),
            script: VecDeque::new(),
            max_message: 82,
            attempts: 0,
        }
    }

    /// Queue statuses returned by the next transmit attempts.
    pub fn push_script(&mut self, statuses: &[TransmitStatus]) {
        self.script.extend(statuses.iter().copied());
    }

    pub fn payloads(&self) -> Vec<Vec<u8>> {
        self.sent.iter().map(|f| f.payload.as_slice().to_vec()).collect()
    }

    pub fn last_payload(&self) -> Option<&[u8]> {
        self.sent.last().map(|f| f.payload.as_slice())
    }
}

impl Transport for MockNet {
    fn unicast_transmit(&mut self, frame: &mut TxFrame) -> TransmitStatus {
        self.attempts += 1;
        let status = self.script.pop_front().unwrap_or(TransmitStatus::Success);
        if status == TransmitStatus::Success {
            self.sent.push(std::mem::take(frame));
        }
        status
    }

    fn max_message_size(&self) -> usize {
        self.max_message
    }
}

// ── Fixtures ──────────────────────────────────────────────────

/// An on/off server cluster with five attributes:
///
/// | id     | type        | writable | value  |
/// |--------|-------------|----------|--------|
/// | 0x0000 | BOOLEAN     | yes      | 1      |
/// | 0x4001 | UINT_16     | yes      | 0x0102 |
/// | 0x4002 | UINT_8      | no       | 7      |
/// | 0x4003 | CHAR_STRING | yes      | "abc"  |
/// | 0x4004 | INT_16      | yes      | -2     |
pub fn on_off_cluster() -> Cluster {
    let mut cluster = Cluster::new(ON_OFF, ClusterRole::Server);
    let v = STANDARD_VENDOR_ID;

    let mut on = Attribute::fixed(v, 0x0000, DataType::BOOLEAN, true).unwrap();
    on.set_unsigned(1).unwrap();
    cluster.add_attr(on).unwrap();

    let mut on_time = Attribute::fixed(v, 0x4001, DataType::UINT_16, true).unwrap();
    on_time.set_unsigned(0x0102).unwrap();
    cluster.add_attr(on_time).unwrap();

    let mut fixed = Attribute::fixed(v, 0x4002, DataType::UINT_8, false).unwrap();
    fixed.set_unsigned(7).unwrap();
    cluster.add_attr(fixed).unwrap();

    cluster
        .add_attr(Attribute::string(v, 0x4003, DataType::CHAR_STRING, true, 8, b"abc").unwrap())
        .unwrap();

    let mut level = Attribute::fixed(v, 0x4004, DataType::INT_16, true).unwrap();
    level.set_signed(-2).unwrap();
    cluster.add_attr(level).unwrap();

    cluster
}

pub fn node_with(config: EngineConfig) -> ZclNode<MockNet> {
    let mut node = ZclNode::new(MockNet::new(), config).unwrap();
    node.add_endpoint(LOCAL_ENDPOINT, HA_PROFILE).unwrap();
    node.add_cluster(LOCAL_ENDPOINT, on_off_cluster()).unwrap();
    node
}

pub fn node() -> ZclNode<MockNet> {
    node_with(EngineConfig::default())
}

/// A unicast message from the peer to the on/off cluster.
pub fn rx(payload: &[u8]) -> RxMessage {
    rx_for(ON_OFF, payload)
}

pub fn rx_for(cluster_id: u16, payload: &[u8]) -> RxMessage {
    RxMessage {
        peer_node: PEER_NODE,
        peer_endpoint: PEER_ENDPOINT,
        local_endpoint: LOCAL_ENDPOINT,
        cluster_id,
        profile_id: HA_PROFILE,
        unicast: true,
        payload: Buffer::from_slice(payload),
    }
}
