//! Basic cluster served over the air with a persisted record.

use std::cell::RefCell;
use std::rc::Rc;

use zcl_engine::adapters::MemoryRecordStore;
use zcl_engine::clusters::basic::{BASIC_CLUSTER_ID, BasicRecord};
use zcl_engine::clusters::{BasicInfo, PowerSource, basic_server_cluster};
use zcl_engine::{EngineConfig, ZclNode};

use super::mock_net::{HA_PROFILE, LOCAL_ENDPOINT, MockNet, rx_for};

const TAG: u16 = 0x0100;

fn basic_node() -> (ZclNode<MockNet>, Rc<RefCell<MemoryRecordStore>>) {
    let store = Rc::new(RefCell::new(MemoryRecordStore::new()));
    let info = BasicInfo {
        application_version: 1,
        stack_version: 2,
        hw_version: 3,
        manufacturer_name: "Acme",
        model_identifier: "Plug",
        power_source: PowerSource::MainsSinglePhase,
        battery_backup: false,
    };
    let mut node = ZclNode::new(MockNet::new(), EngineConfig::default()).unwrap();
    node.add_endpoint(LOCAL_ENDPOINT, HA_PROFILE).unwrap();
    node.add_cluster(LOCAL_ENDPOINT, basic_server_cluster(&info, &store, TAG).unwrap())
        .unwrap();
    (node, store)
}

fn exchange(node: &mut ZclNode<MockNet>, request: &[u8]) -> Vec<u8> {
    node.receive(rx_for(BASIC_CLUSTER_ID, request));
    node.poll(0);
    node.transport().last_payload().unwrap().to_vec()
}

fn record(store: &Rc<RefCell<MemoryRecordStore>>) -> BasicRecord {
    BasicRecord::load(&*store.borrow(), TAG).unwrap()
}

#[test]
fn read_static_and_persisted() {
    let (mut node, _) = basic_node();
    let reply = exchange(&mut node, &[0x00, 0x50, 0x00, 0x00, 0x00, 0x10, 0x00, 0x12, 0x00, 0x07, 0x00]);
    assert_eq!(
        reply,
        vec![
            0x18, 0x50, 0x01, //
            0x00, 0x00, 0x00, 0x20, 0x08, //
            0x10, 0x00, 0x00, 0x42, 0x00, //
            0x12, 0x00, 0x00, 0x10, 0x01, //
            0x07, 0x00, 0x00, 0x30, 0x01,
        ]
    );
}

#[test]
fn write_then_read_back_location() {
    let (mut node, store) = basic_node();
    let mut request = vec![0x00, 0x51, 0x02, 0x10, 0x00, 0x42, 0x07];
    request.extend_from_slice(b"kitchen");
    request.extend_from_slice(&[0x12, 0x00, 0x10, 0x00]);
    assert_eq!(exchange(&mut node, &request), vec![0x18, 0x51, 0x04, 0x00]);

    let saved = record(&store);
    assert_eq!(saved.location.as_slice(), b"kitchen");
    assert_eq!(saved.device_enabled, 0);

    let reply = exchange(&mut node, &[0x00, 0x52, 0x00, 0x10, 0x00]);
    let mut expected = vec![0x18, 0x52, 0x01, 0x10, 0x00, 0x00, 0x42, 0x07];
    expected.extend_from_slice(b"kitchen");
    assert_eq!(reply, expected);
}

#[test]
fn atomic_write_rejected_by_range_check() {
    let (mut node, store) = basic_node();
    let request = [0x00, 0x53, 0x03, 0x12, 0x00, 0x10, 0x02, 0x13, 0x00, 0x18, 0x01];
    assert_eq!(exchange(&mut node, &request), vec![0x18, 0x53, 0x04, 0x12, 0x00, 0x87]);
    assert_eq!(record(&store), BasicRecord::default());
}

#[test]
fn static_attributes_are_read_only() {
    let (mut node, _) = basic_node();
    let request = [0x00, 0x54, 0x02, 0x00, 0x00, 0x20, 0x09];
    assert_eq!(exchange(&mut node, &request), vec![0x18, 0x54, 0x04, 0x00, 0x00, 0x88]);
}

#[test]
fn store_failure_reports_failure() {
    let (mut node, store) = basic_node();
    store.borrow_mut().set_fail_writes(true);
    let request = [0x00, 0x55, 0x02, 0x11, 0x00, 0x30, 0x03];
    assert_eq!(exchange(&mut node, &request), vec![0x18, 0x55, 0x04, 0x11, 0x00, 0x01]);
}

#[test]
fn discover_lists_every_attribute() {
    let (mut node, _) = basic_node();
    let reply = exchange(&mut node, &[0x00, 0x56, 0x0C, 0x00, 0x00, 0x20]);
    assert_eq!(reply[3], 0x01);
    assert_eq!((reply.len() - 4) / 3, 12);
    assert_eq!(&reply[4..7], &[0x00, 0x00, 0x20]);
}

#[test]
fn record_survives_node_rebuild() {
    let (mut node, store) = basic_node();
    exchange(&mut node, &[0x00, 0x57, 0x02, 0x13, 0x00, 0x18, 0x03]);
    let info = BasicInfo::default();
    basic_server_cluster(&info, &store, TAG).unwrap();
    assert_eq!(record(&store).alarm_mask, 0x03);
}
