//! Local command processor driven through `ZclNode`.

use std::cell::RefCell;
use std::rc::Rc;

use zcl_engine::local::LocalState;
use zcl_engine::zcl::STANDARD_VENDOR_ID;
use zcl_engine::zcl::attr::{AccessCompletion, AttrAccessor, AttrInfo, Attribute};
use zcl_engine::zcl::codec::RecordValue;
use zcl_engine::zcl::types::DataType;
use zcl_engine::{Buffer, EngineConfig, TransmitStatus, ZclNode, ZclStatus};

use super::mock_net::{LOCAL_ENDPOINT, MockNet, ON_OFF, node, node_with, rx, rx_for};

fn attr_u64(node: &ZclNode<MockNet>, id: u16) -> Option<u64> {
    node.cluster(LOCAL_ENDPOINT, ON_OFF)?
        .attr(STANDARD_VENDOR_ID, id)?
        .value_u64()
}

fn local_state(node: &ZclNode<MockNet>) -> LocalState {
    node.endpoint(LOCAL_ENDPOINT).unwrap().local().unwrap().state()
}

// ── Read ──────────────────────────────────────────────────────

#[test]
fn read_known_then_unknown() {
    let mut node = node();
    assert!(node.handle_rx(rx(&[0x00, 0x11, 0x00, 0x00, 0x00, 0xFF, 0x00])).is_none());
    assert_eq!(node.poll(0), None);
    assert_eq!(
        node.transport().payloads(),
        vec![vec![0x18, 0x11, 0x01, 0x00, 0x00, 0x00, 0x10, 0x01, 0xFF, 0x00, 0x86]]
    );
    let frame = &node.transport().sent[0];
    assert_eq!(frame.peer_node, super::mock_net::PEER_NODE);
    assert_eq!(frame.cluster_id, ON_OFF);
}

#[test]
fn read_string_and_signed() {
    let mut node = node();
    node.receive(rx(&[0x00, 0x12, 0x00, 0x03, 0x40, 0x04, 0x40]));
    node.poll(0);
    assert_eq!(
        node.transport().last_payload().unwrap(),
        &[
            0x18, 0x12, 0x01, 0x03, 0x40, 0x00, 0x42, 0x03, b'a', b'b', b'c', 0x04, 0x40, 0x00,
            0x29, 0xFE, 0xFF
        ]
    );
}

#[test]
fn vendor_read_misses_standard_attributes() {
    let mut node = node();
    node.receive(rx(&[0x04, 0x7C, 0x11, 0x13, 0x00, 0x00, 0x00]));
    node.poll(0);
    assert_eq!(
        node.transport().last_payload().unwrap(),
        &[0x1C, 0x7C, 0x11, 0x13, 0x01, 0x00, 0x00, 0x86]
    );
}

#[test]
fn read_truncated_when_buffer_runs_out() {
    let config = EngineConfig {
        buffer_limit: 8,
        ..EngineConfig::default()
    };
    let mut node = node_with(config);
    node.receive(rx(&[0x00, 0x14, 0x00, 0x00, 0x00, 0x01, 0x40]));
    node.poll(0);
    assert_eq!(
        node.transport().last_payload().unwrap(),
        &[0x18, 0x14, 0x01, 0x00, 0x00, 0x00, 0x10, 0x01]
    );
}

/// Read `ids` through a transport that accepts at most `max_message`
/// bytes per frame and return the single response sent.
fn read_capped(node: &mut ZclNode<MockNet>, max_message: usize, sequence: u8, ids: &[u16]) -> Vec<u8> {
    node.transport_mut().max_message = max_message;
    let mut request = vec![0x00, sequence, 0x00];
    for id in ids {
        request.extend_from_slice(&id.to_le_bytes());
    }
    node.receive(rx(&request));
    node.poll(0);
    assert_eq!(node.transport().sent.len(), 1);
    node.transport().last_payload().unwrap().to_vec()
}

const FIRST_RECORD_ONLY: [u8; 5] = [0x00, 0x00, 0x00, 0x10, 0x01];

#[test]
fn read_drops_last_string_record_past_max_message() {
    let mut node = node();
    let reply = read_capped(&mut node, 10, 0x15, &[0x0000, 0x4003]);
    assert_eq!(&reply[..3], &[0x18u8, 0x15, 0x01][..]);
    assert_eq!(&reply[3..], &FIRST_RECORD_ONLY[..]);
}

#[test]
fn read_drops_last_fixed_record_past_max_message() {
    let mut node = node();
    let reply = read_capped(&mut node, 10, 0x16, &[0x0000, 0x4001]);
    assert_eq!(&reply[3..], &FIRST_RECORD_ONLY[..]);
}

#[test]
fn read_drops_last_unsupported_record_past_max_message() {
    let mut node = node();
    let reply = read_capped(&mut node, 10, 0x17, &[0x0000, 0xFFFF]);
    assert_eq!(&reply[3..], &FIRST_RECORD_ONLY[..]);
}

#[test]
fn read_stops_at_middle_record_past_max_message() {
    let mut node = node();
    // 0x4001 alone would fit after the first record but is never reached.
    let reply = read_capped(&mut node, 14, 0x18, &[0x0000, 0x4003, 0x4001]);
    assert_eq!(&reply[3..], &FIRST_RECORD_ONLY[..]);
}

#[test]
fn read_filling_max_message_exactly_is_kept() {
    let mut node = node();
    let reply = read_capped(&mut node, 14, 0x19, &[0x0000, 0x4001, 0x4004]);
    assert_eq!(
        reply,
        vec![0x18, 0x19, 0x01, 0x00, 0x00, 0x00, 0x10, 0x01, 0x01, 0x40, 0x00, 0x21, 0x02, 0x01]
    );
}

// ── Write ─────────────────────────────────────────────────────

const WRITE_ON_TIME: [u8; 5] = [0x01, 0x40, 0x21, 0x0B, 0x0A];
const WRITE_READ_ONLY: [u8; 4] = [0x02, 0x40, 0x20, 0x05];

fn write_frame(command: u8, sequence: u8, records: &[&[u8]]) -> Vec<u8> {
    let mut frame = vec![0x00, sequence, command];
    for r in records {
        frame.extend_from_slice(r);
    }
    frame
}

#[test]
fn atomic_write_with_one_failure_changes_nothing() {
    let mut node = node();
    node.receive(rx(&write_frame(0x03, 0x22, &[&WRITE_ON_TIME, &WRITE_READ_ONLY])));
    node.poll(0);
    assert_eq!(
        node.transport().last_payload().unwrap(),
        &[0x18, 0x22, 0x04, 0x02, 0x40, 0x88]
    );
    assert_eq!(attr_u64(&node, 0x4001), Some(0x0102));
}

#[test]
fn atomic_write_all_valid_commits() {
    let mut node = node();
    node.receive(rx(&write_frame(0x03, 0x25, &[&WRITE_ON_TIME, &[0x00, 0x00, 0x10, 0x00]])));
    node.poll(0);
    assert_eq!(node.transport().last_payload().unwrap(), &[0x18, 0x25, 0x04, 0x00]);
    assert_eq!(attr_u64(&node, 0x4001), Some(0x0A0B));
    assert_eq!(attr_u64(&node, 0x0000), Some(0));
}

#[test]
fn write_commits_valid_and_reports_failures() {
    let mut node = node();
    let wrong_type: &[u8] = &[0x00, 0x00, 0x20, 0x01];
    node.receive(rx(&write_frame(
        0x02,
        0x23,
        &[&WRITE_ON_TIME, &WRITE_READ_ONLY, wrong_type],
    )));
    node.poll(0);
    assert_eq!(
        node.transport().last_payload().unwrap(),
        &[0x18, 0x23, 0x04, 0x02, 0x40, 0x88, 0x00, 0x00, 0x8D]
    );
    assert_eq!(attr_u64(&node, 0x4001), Some(0x0A0B));
    assert_eq!(attr_u64(&node, 0x0000), Some(1));
}

#[test]
fn write_all_valid_reports_single_success() {
    let mut node = node();
    let string: &[u8] = &[0x03, 0x40, 0x42, 0x02, b'h', b'i'];
    node.receive(rx(&write_frame(0x02, 0x24, &[&[0x00, 0x00, 0x10, 0x00], string])));
    node.poll(0);
    assert_eq!(node.transport().last_payload().unwrap(), &[0x18, 0x24, 0x04, 0x00]);
    let cluster = node.cluster(LOCAL_ENDPOINT, ON_OFF).unwrap();
    assert_eq!(cluster.attr(STANDARD_VENDOR_ID, 0x4003).unwrap().octets(), Some(&b"hi"[..]));
}

#[test]
fn string_longer_than_capacity_is_invalid_value() {
    let mut node = node();
    let mut record = vec![0x03, 0x40, 0x42, 9];
    record.extend_from_slice(b"too-long!");
    node.receive(rx(&write_frame(0x02, 0x26, &[&record])));
    node.poll(0);
    assert_eq!(
        node.transport().last_payload().unwrap(),
        &[0x18, 0x26, 0x04, 0x03, 0x40, 0x87]
    );
}

#[test]
fn silent_write_commits_without_reply() {
    let mut node = node();
    assert!(node.handle_rx(rx(&write_frame(0x05, 0x27, &[&WRITE_ON_TIME]))).is_none());
    assert_eq!(node.poll(0), None);
    assert!(node.transport().sent.is_empty());
    assert_eq!(attr_u64(&node, 0x4001), Some(0x0A0B));
}

// ── Discover ──────────────────────────────────────────────────

#[test]
fn discover_paginates() {
    let mut node = node();
    node.receive(rx(&[0x00, 0x30, 0x0C, 0x00, 0x00, 0x02]));
    node.receive(rx(&[0x00, 0x31, 0x0C, 0x00, 0x00, 0x05]));
    node.poll(0);
    let payloads = node.transport().payloads();
    assert_eq!(
        payloads[0],
        vec![0x18, 0x30, 0x0D, 0x00, 0x00, 0x00, 0x10, 0x01, 0x40, 0x21]
    );
    assert_eq!(
        payloads[1],
        vec![
            0x18, 0x31, 0x0D, 0x01, 0x00, 0x00, 0x10, 0x01, 0x40, 0x21, 0x02, 0x40, 0x20, 0x03,
            0x40, 0x42, 0x04, 0x40, 0x29
        ]
    );
}

#[test]
fn discover_from_start_id() {
    let mut node = node();
    node.receive(rx(&[0x00, 0x32, 0x0C, 0x03, 0x40, 0x10]));
    node.poll(0);
    assert_eq!(
        node.transport().last_payload().unwrap(),
        &[0x18, 0x32, 0x0D, 0x01, 0x03, 0x40, 0x42, 0x04, 0x40, 0x29]
    );
}

#[test]
fn malformed_discover_is_dropped() {
    let mut node = node();
    node.receive(rx(&[0x00, 0x33, 0x0C, 0x00, 0x00]));
    assert_eq!(node.poll(0), None);
    assert!(node.transport().sent.is_empty());
    assert_eq!(local_state(&node), LocalState::Idle);
}

// ── Dynamic accessors ─────────────────────────────────────────

/// Holds on to every completion so the test decides when it finishes.
#[derive(Clone, Default)]
struct Deferred {
    pending: Rc<RefCell<Option<AccessCompletion>>>,
    commits: Rc<RefCell<Vec<bool>>>,
}

impl AttrAccessor for Deferred {
    fn get(&mut self, _info: &AttrInfo, done: AccessCompletion) {
        *self.pending.borrow_mut() = Some(done);
    }

    fn set(&mut self, _info: &AttrInfo, _data: &Buffer, _offset: usize, commit: bool, done: AccessCompletion) {
        self.commits.borrow_mut().push(commit);
        *self.pending.borrow_mut() = Some(done);
    }
}

/// Completes reads inline with a constant.
struct Immediate(u8);

impl AttrAccessor for Immediate {
    fn get(&mut self, info: &AttrInfo, done: AccessCompletion) {
        done.complete_value(info.data_type, &RecordValue::Unsigned(self.0.into()));
    }
}

fn node_with_dynamic() -> (ZclNode<MockNet>, Deferred) {
    let mut node = node();
    let deferred = Deferred::default();
    let cluster = node.cluster_mut(LOCAL_ENDPOINT, ON_OFF).unwrap();
    cluster
        .add_attr(Attribute::dynamic(
            STANDARD_VENDOR_ID,
            0x5000,
            DataType::UINT_8,
            Box::new(deferred.clone()),
            true,
        ))
        .unwrap();
    cluster
        .add_attr(Attribute::dynamic(
            STANDARD_VENDOR_ID,
            0x5001,
            DataType::UINT_8,
            Box::new(Immediate(0x33)),
            false,
        ))
        .unwrap();
    (node, deferred)
}

fn take(deferred: &Deferred) -> AccessCompletion {
    deferred.pending.borrow_mut().take().unwrap()
}

#[test]
fn async_getter_suspends_until_completed() {
    let (mut node, deferred) = node_with_dynamic();
    node.receive(rx(&[0x00, 0x40, 0x00, 0x00, 0x50]));
    assert_eq!(node.poll(0), None);
    assert!(node.transport().sent.is_empty());
    assert_eq!(local_state(&node), LocalState::ReadAttrWait);

    take(&deferred).complete_value(DataType::UINT_8, &RecordValue::Unsigned(9));
    node.poll(5);
    assert_eq!(
        node.transport().last_payload().unwrap(),
        &[0x18, 0x40, 0x01, 0x00, 0x50, 0x00, 0x20, 0x09]
    );
    assert_eq!(local_state(&node), LocalState::Idle);
}

#[test]
fn async_getter_failure_becomes_status_record() {
    let (mut node, deferred) = node_with_dynamic();
    node.receive(rx(&[0x00, 0x41, 0x00, 0x00, 0x50, 0x00, 0x00]));
    node.poll(0);
    take(&deferred).complete(ZclStatus::UnsupAttribute);
    node.poll(1);
    assert_eq!(
        node.transport().last_payload().unwrap(),
        &[0x18, 0x41, 0x01, 0x00, 0x50, 0x86, 0x00, 0x00, 0x00, 0x10, 0x01]
    );
}

#[test]
fn synchronous_getter_needs_no_extra_poll() {
    let (mut node, _) = node_with_dynamic();
    node.receive(rx(&[0x00, 0x42, 0x00, 0x01, 0x50]));
    assert_eq!(node.poll(0), None);
    assert_eq!(
        node.transport().last_payload().unwrap(),
        &[0x18, 0x42, 0x01, 0x01, 0x50, 0x00, 0x20, 0x33]
    );
}

#[test]
fn dynamic_last_record_past_max_message_is_dropped() {
    let (mut node, _) = node_with_dynamic();
    let reply = read_capped(&mut node, 10, 0x45, &[0x0000, 0x5001]);
    assert_eq!(&reply[3..], &FIRST_RECORD_ONLY[..]);
}

#[test]
fn dynamic_middle_record_past_max_message_ends_read() {
    let (mut node, _) = node_with_dynamic();
    let reply = read_capped(&mut node, 10, 0x46, &[0x0000, 0x5001, 0x4001]);
    assert_eq!(&reply[3..], &FIRST_RECORD_ONLY[..]);
}

#[test]
fn async_getter_value_past_max_message_is_dropped() {
    let (mut node, deferred) = node_with_dynamic();
    node.transport_mut().max_message = 10;
    node.receive(rx(&[0x00, 0x47, 0x00, 0x00, 0x00, 0x00, 0x50]));
    node.poll(0);
    assert!(node.transport().sent.is_empty());
    take(&deferred).complete_value(DataType::UINT_8, &RecordValue::Unsigned(9));
    node.poll(1);
    assert_eq!(
        node.transport().last_payload().unwrap(),
        &[0x18, 0x47, 0x01, 0x00, 0x00, 0x00, 0x10, 0x01]
    );
}

#[test]
fn async_setter_failure_is_reported() {
    let (mut node, deferred) = node_with_dynamic();
    node.receive(rx(&[0x00, 0x43, 0x02, 0x00, 0x50, 0x20, 0x03]));
    node.poll(0);
    assert_eq!(local_state(&node), LocalState::WriteAttrWait);
    take(&deferred).complete(ZclStatus::InvalidValue);
    node.poll(1);
    assert_eq!(
        node.transport().last_payload().unwrap(),
        &[0x18, 0x43, 0x04, 0x00, 0x50, 0x87]
    );
    assert_eq!(*deferred.commits.borrow(), vec![true]);
}

#[test]
fn atomic_write_validates_dynamic_before_commit() {
    let (mut node, deferred) = node_with_dynamic();
    node.receive(rx(&[0x00, 0x44, 0x03, 0x00, 0x50, 0x20, 0x03]));
    node.poll(0);
    assert_eq!(local_state(&node), LocalState::CheckAttrWait);
    take(&deferred).complete(ZclStatus::Success);
    node.poll(1);
    assert_eq!(local_state(&node), LocalState::WriteAttrWait);
    take(&deferred).complete(ZclStatus::Success);
    node.poll(2);
    assert_eq!(node.transport().last_payload().unwrap(), &[0x18, 0x44, 0x04, 0x00]);
    assert_eq!(*deferred.commits.borrow(), vec![false, true]);
}

// ── Scheduling and delivery ───────────────────────────────────

#[test]
fn transport_retry_resends_after_delay() {
    let mut node = node();
    node.transport_mut().push_script(&[TransmitStatus::Retry]);
    node.receive(rx(&[0x00, 0x50, 0x00, 0x00, 0x00]));
    assert_eq!(node.poll(0), Some(25));
    assert!(node.transport().sent.is_empty());
    assert_eq!(node.poll(24), Some(25));
    assert_eq!(node.transport().attempts, 1);
    assert_eq!(node.poll(25), None);
    assert_eq!(
        node.transport().last_payload().unwrap(),
        &[0x18, 0x50, 0x01, 0x00, 0x00, 0x00, 0x10, 0x01]
    );
}

#[test]
fn transport_failure_discards_response() {
    let mut node = node();
    node.transport_mut().push_script(&[TransmitStatus::Failed]);
    node.receive(rx(&[0x00, 0x51, 0x00, 0x00, 0x00]));
    node.receive(rx(&[0x00, 0x52, 0x00, 0x00, 0x00]));
    assert_eq!(node.poll(0), None);
    let payloads = node.transport().payloads();
    assert_eq!(payloads.len(), 1);
    assert_eq!(payloads[0][1], 0x52);
}

#[test]
fn out_of_buffers_defers_command() {
    let config = EngineConfig {
        buffer_limit: 8,
        ..EngineConfig::default()
    };
    let mut node = node_with(config);
    node.receive(rx(&[0x00, 0x53, 0x0C, 0x00, 0x00, 0x05]));
    assert_eq!(node.poll(0), Some(25));
    assert_eq!(local_state(&node), LocalState::StartRequest);
    assert_eq!(node.poll(25), Some(50));
    assert!(node.transport().sent.is_empty());
}

#[test]
fn queue_full_answers_failure() {
    let config = EngineConfig {
        local_queue_len: 1,
        ..EngineConfig::default()
    };
    let mut node = node_with(config);
    assert!(node.handle_rx(rx(&[0x00, 0x60, 0x00, 0x00, 0x00])).is_none());
    let reply = node.handle_rx(rx(&[0x00, 0x61, 0x00, 0x00, 0x00])).unwrap();
    assert_eq!(reply.payload.as_slice(), &[0x18, 0x61, 0x0B, 0x00, 0x01]);
    node.poll(0);
    assert_eq!(node.transport().payloads().len(), 1);
}

// ── Default responses ─────────────────────────────────────────

#[test]
fn cluster_command_gets_unsupported_default_response() {
    let mut node = node();
    node.receive(rx(&[0x01, 0x70, 0x02]));
    assert_eq!(
        node.transport().last_payload().unwrap(),
        &[0x18, 0x70, 0x0B, 0x02, 0x81]
    );
}

#[test]
fn unknown_general_command_is_unsupported() {
    let mut node = node();
    let reply = node.handle_rx(rx(&[0x00, 0x71, 0x06, 0x00])).unwrap();
    assert_eq!(reply.payload.as_slice(), &[0x18, 0x71, 0x0B, 0x06, 0x81]);
}

#[test]
fn vendor_default_response_echoes_vendor() {
    let mut node = node();
    let reply = node.handle_rx(rx(&[0x05, 0x7C, 0x11, 0x09, 0x40])).unwrap();
    assert_eq!(
        reply.payload.as_slice(),
        &[0x1C, 0x7C, 0x11, 0x09, 0x0B, 0x40, 0x81]
    );
}

#[test]
fn no_default_response_cases() {
    let mut node = node();
    // suppressed by the sender
    assert!(node.handle_rx(rx(&[0x11, 0x72, 0x02])).is_none());
    // broadcast
    let mut msg = rx(&[0x01, 0x73, 0x02]);
    msg.unicast = false;
    assert!(node.handle_rx(msg).is_none());
    // default responses are never answered
    assert!(node.handle_rx(rx(&[0x00, 0x74, 0x0B, 0x00, 0x81])).is_none());
    // unknown cluster, endpoint or direction
    assert!(node.handle_rx(rx_for(0x0008, &[0x01, 0x75, 0x02])).is_none());
    let mut msg = rx(&[0x01, 0x76, 0x02]);
    msg.local_endpoint = 9;
    assert!(node.handle_rx(msg).is_none());
    assert!(node.handle_rx(rx(&[0x09, 0x77, 0x02])).is_none());
    assert!(node.transport().sent.is_empty());
}
