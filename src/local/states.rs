//! State handler functions and table builder.
//!
//! ```text
//!  IDLE ──▶ START_REQUEST ─┬─[discover]──────────────────────────┐
//!    ▲                     ├─[read]──▶ READ_ATTR_REQ ⇄ WAIT ─────┤
//!    │                     ├─[atomic]─▶ CHECK_ATTR_REQ ⇄ WAIT    │
//!    │                     │              ▼                      │
//!    │                     │           CHECK_COMPLETE ─[fail]────┤
//!    │                     │              │ [ok]                 │
//!    │                     └─[write]──▶ WRITE_ATTR_REQ ⇄ WAIT    │
//!    │                                    ▼                      │
//!    ├────────────[silent]─────────── WRITE_COMPLETE ────────────┤
//!    │                                                           ▼
//!    └──────────────────────────────────────────────── RESPONSE_SEND
//! ```

use log::{debug, warn};

use super::context::{LocalContext, LocalEnv};
use super::{LocalState, StateDescriptor};
use crate::buffer::Buffer;
use crate::error::ZclStatus;
use crate::node::ports::{TransmitStatus, TxFrame};
use crate::scheduler::TaskStatus;
use crate::zcl::GeneralCommand;
use crate::zcl::codec;
use crate::zcl::types::DataType;

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

pub fn build_state_table() -> [StateDescriptor; LocalState::COUNT] {
    [
        StateDescriptor {
            id: LocalState::Idle,
            name: "Idle",
            on_tick: idle_tick,
        },
        StateDescriptor {
            id: LocalState::StartRequest,
            name: "StartRequest",
            on_tick: start_request_tick,
        },
        StateDescriptor {
            id: LocalState::ReadAttrReq,
            name: "ReadAttrReq",
            on_tick: read_attr_req_tick,
        },
        StateDescriptor {
            id: LocalState::ReadAttrWait,
            name: "ReadAttrWait",
            on_tick: read_attr_wait_tick,
        },
        StateDescriptor {
            id: LocalState::CheckAttrReq,
            name: "CheckAttrReq",
            on_tick: write_attr_req_tick,
        },
        StateDescriptor {
            id: LocalState::CheckAttrWait,
            name: "CheckAttrWait",
            on_tick: write_attr_wait_tick,
        },
        StateDescriptor {
            id: LocalState::CheckComplete,
            name: "CheckComplete",
            on_tick: check_complete_tick,
        },
        StateDescriptor {
            id: LocalState::WriteAttrReq,
            name: "WriteAttrReq",
            on_tick: write_attr_req_tick,
        },
        StateDescriptor {
            id: LocalState::WriteAttrWait,
            name: "WriteAttrWait",
            on_tick: write_attr_wait_tick,
        },
        StateDescriptor {
            id: LocalState::WriteComplete,
            name: "WriteComplete",
            on_tick: write_complete_tick,
        },
        StateDescriptor {
            id: LocalState::ResponseSend,
            name: "ResponseSend",
            on_tick: response_send_tick,
        },
    ]
}

/// Internal sentinels never go on the wire.
fn wire_status(status: ZclStatus) -> ZclStatus {
    match status {
        ZclStatus::Abort | ZclStatus::Null => ZclStatus::Failure,
        other => other,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  IDLE / START_REQUEST
// ═══════════════════════════════════════════════════════════════════════════

fn idle_tick(ctx: &mut LocalContext, _env: &mut LocalEnv<'_>) -> TaskStatus {
    ctx.release_buffers();
    let Some(command) = ctx.queue.pop_front() else {
        return TaskStatus::Suspend;
    };
    if ctx.load(command).is_err() {
        warn!(
            "local: request from 0x{:04X} seq {} exceeds buffer limit, dropped",
            ctx.peer_node, ctx.sequence
        );
        return TaskStatus::RunImmediate;
    }
    ctx.state = LocalState::StartRequest;
    TaskStatus::RunImmediate
}

fn start_request_tick(ctx: &mut LocalContext, env: &mut LocalEnv<'_>) -> TaskStatus {
    let status = match GeneralCommand::from_id(ctx.command_id) {
        Some(GeneralCommand::DiscoverAttributes) => discover_run(ctx, env),
        Some(GeneralCommand::ReadAttributes) => read_run(ctx, env),
        Some(
            GeneralCommand::WriteAttributes
            | GeneralCommand::WriteAttributesAtomic
            | GeneralCommand::WriteAttributesSilent,
        ) => write_run(ctx, env),
        _ => ZclStatus::UnsupCommand,
    };

    match status {
        ZclStatus::Success => TaskStatus::RunImmediate,
        // Out of buffer space: start the same command again shortly.
        ZclStatus::Null => {
            let _ = ctx.response.reset(0);
            debug!(
                "local: command 0x{:02X} seq {} deferred",
                ctx.command_id, ctx.sequence
            );
            TaskStatus::RunLater(ctx.retry_delay)
        }
        other => {
            debug!(
                "local: command 0x{:02X} seq {} dropped ({other})",
                ctx.command_id, ctx.sequence
            );
            ctx.release_buffers();
            ctx.state = LocalState::Idle;
            TaskStatus::RunImmediate
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  Discover attributes
// ═══════════════════════════════════════════════════════════════════════════

/// Request: start id (2) + max ids (1).
/// Response: complete flag (1) + (id, type) pairs.
fn discover_run(ctx: &mut LocalContext, env: &mut LocalEnv<'_>) -> ZclStatus {
    let max_message = env.transport.max_message_size();
    let Some(cluster) = env.cluster(ctx.cluster_id) else {
        return ZclStatus::Failure;
    };

    if ctx
        .prepend_response_header(cluster.role(), GeneralCommand::DiscoverAttributesResponse)
        .is_err()
    {
        return ZclStatus::Null;
    }
    if ctx.request.len() != 3 {
        return ZclStatus::MalformedCommand;
    }
    let (Ok(start_id), Ok(max_ids)) = (ctx.request.read_u16_le(0), ctx.request.read_u8(2)) else {
        return ZclStatus::MalformedCommand;
    };

    let flag_offset = ctx.response.len();
    if ctx.response.extend(1).is_err() {
        return ZclStatus::Null;
    }
    let room = max_message.saturating_sub(flag_offset + 1) / 3;
    let mut remaining = usize::from(max_ids).min(room);
    let mut complete = 1u8;

    let vendor_id = ctx.vendor_id;
    for attr in cluster
        .attrs()
        .iter()
        .filter(|a| a.id() >= start_id && a.vendor_id() == vendor_id)
    {
        if remaining == 0 {
            complete = 0;
            break;
        }
        let id = attr.id().to_le_bytes();
        if ctx
            .response
            .append(&[id[0], id[1], attr.data_type().code()])
            .is_err()
        {
            return ZclStatus::Null;
        }
        remaining -= 1;
    }

    if ctx.response.write(flag_offset, &[complete]).is_err() {
        return ZclStatus::Null;
    }
    ctx.state = LocalState::ResponseSend;
    ZclStatus::Success
}

// ═══════════════════════════════════════════════════════════════════════════
//  Read attributes
// ═══════════════════════════════════════════════════════════════════════════

fn read_run(ctx: &mut LocalContext, env: &mut LocalEnv<'_>) -> ZclStatus {
    let Some(cluster) = env.cluster(ctx.cluster_id) else {
        return ZclStatus::Failure;
    };
    if ctx
        .prepend_response_header(cluster.role(), GeneralCommand::ReadAttributesResponse)
        .is_err()
    {
        return ZclStatus::Null;
    }
    ctx.index = 0;
    ctx.offset = ctx.response.len();
    ctx.state = LocalState::ReadAttrReq;
    ZclStatus::Success
}

fn read_attr_req_tick(ctx: &mut LocalContext, env: &mut LocalEnv<'_>) -> TaskStatus {
    let max_message = env.transport.max_message_size();
    let endpoint_id = env.endpoint_id;

    // The previous record overflowed the message: drop it and send.
    // Checked before the end of the list so the last record is covered.
    if ctx.response.len() > max_message {
        ctx.truncate_and_send();
        return TaskStatus::RunImmediate;
    }
    if ctx.index >= ctx.request.len() / 2 {
        ctx.state = LocalState::ResponseSend;
        return TaskStatus::RunImmediate;
    }
    ctx.offset = ctx.response.len();

    let Ok(attr_id) = ctx.request.read_u16_le(ctx.index * 2) else {
        ctx.state = LocalState::ResponseSend;
        return TaskStatus::RunImmediate;
    };
    ctx.index += 1;

    let (cluster_id, vendor_id) = (ctx.cluster_id, ctx.vendor_id);
    let Some(attr) = env
        .cluster_mut(cluster_id)
        .and_then(|c| c.attr_mut(vendor_id, attr_id))
    else {
        if ctx
            .append_status_record(attr_id, ZclStatus::UnsupAttribute)
            .is_err()
        {
            ctx.state = LocalState::ResponseSend;
        }
        return TaskStatus::RunImmediate;
    };

    if ctx
        .append_status_record(attr_id, ZclStatus::Success)
        .is_err()
    {
        ctx.truncate_and_send();
        return TaskStatus::RunImmediate;
    }

    if attr.is_dynamic() {
        ctx.state = LocalState::ReadAttrWait;
        let info = attr.info(endpoint_id, cluster_id);
        let done = ctx.begin_access();
        if let Some(accessor) = attr.accessor_mut() {
            accessor.get(&info, done);
        }
        return read_attr_wait_tick(ctx, env);
    }

    if codec::serialize_attr_data(attr, &mut ctx.response).is_err() {
        ctx.truncate_and_send();
    }
    TaskStatus::RunImmediate
}

fn read_attr_wait_tick(ctx: &mut LocalContext, _env: &mut LocalEnv<'_>) -> TaskStatus {
    let Ok(outcome) = ctx.completion.try_receive() else {
        return TaskStatus::Suspend;
    };
    ctx.state = LocalState::ReadAttrReq;

    match (outcome.status, outcome.value) {
        (ZclStatus::Success, Some(mut value)) => {
            if ctx.response.concatenate(&mut value).is_err() {
                ctx.truncate_and_send();
            }
        }
        // Allocation failure in the accessor.
        (ZclStatus::Success | ZclStatus::Null, _) => ctx.truncate_and_send(),
        (status, _) => {
            let _ = ctx.response.resize(ctx.offset + 3);
            let _ = ctx
                .response
                .write(ctx.offset + 2, &[wire_status(status).code()]);
        }
    }
    TaskStatus::RunImmediate
}

// ═══════════════════════════════════════════════════════════════════════════
//  Write attributes
// ═══════════════════════════════════════════════════════════════════════════

fn write_run(ctx: &mut LocalContext, env: &mut LocalEnv<'_>) -> ZclStatus {
    let Some(cluster) = env.cluster(ctx.cluster_id) else {
        return ZclStatus::Failure;
    };
    let _ = ctx.response.reset(0);
    if !ctx.is_command(GeneralCommand::WriteAttributesSilent)
        && ctx
            .prepend_response_header(cluster.role(), GeneralCommand::WriteAttributesResponse)
            .is_err()
    {
        return ZclStatus::Null;
    }
    ctx.state = if ctx.is_command(GeneralCommand::WriteAttributesAtomic) {
        LocalState::CheckAttrReq
    } else {
        LocalState::WriteAttrReq
    };
    ctx.failures = 0;
    ctx.offset = 0;
    ZclStatus::Success
}

/// Shared by the check pass (validate only) and the write pass.
fn write_attr_req_tick(ctx: &mut LocalContext, env: &mut LocalEnv<'_>) -> TaskStatus {
    let commit = ctx.state != LocalState::CheckAttrReq;
    let respond = !ctx.response.is_empty();
    let record = ctx.offset;

    if record + 3 >= ctx.request.len() {
        ctx.state = if commit {
            LocalState::WriteComplete
        } else {
            LocalState::CheckComplete
        };
        return TaskStatus::RunImmediate;
    }

    let mut head = [0u8; 3];
    if ctx.request.read(record, &mut head).is_err() {
        ctx.state = LocalState::ResponseSend;
        return TaskStatus::RunImmediate;
    }
    let attr_id = u16::from_le_bytes([head[0], head[1]]);
    let wire_type = DataType(head[2]);

    let endpoint_id = env.endpoint_id;
    let (cluster_id, vendor_id) = (ctx.cluster_id, ctx.vendor_id);
    let mut attr = env
        .cluster_mut(cluster_id)
        .and_then(|c| c.attr_mut(vendor_id, attr_id));

    // Without a size the rest of the request cannot be walked.
    let valid_size = match codec::parse_data_size(&ctx.request, record + 2) {
        Ok(size) => {
            ctx.offset += 3 + size;
            true
        }
        Err(_) => false,
    };

    let mut status = if !valid_size {
        ZclStatus::InvalidField
    } else {
        match attr.as_deref() {
            None => ZclStatus::UnsupAttribute,
            Some(a) if a.data_type() != wire_type => ZclStatus::InvalidDataType,
            Some(a) if !a.is_remote_writable() => ZclStatus::ReadOnly,
            Some(_) => ZclStatus::Success,
        }
    };
    if status.is_success() {
        if let Some(a) = attr.as_deref_mut().filter(|a| !a.is_dynamic()) {
            status = codec::parse_attr_data(a, &ctx.request, record + 2, commit);
        }
    }

    if !status.is_success() {
        if respond && ctx.append_status_record(attr_id, wire_status(status)).is_err() {
            ctx.state = LocalState::ResponseSend;
        }
        if !valid_size {
            ctx.state = LocalState::ResponseSend;
        }
        ctx.failures += 1;
        return TaskStatus::RunImmediate;
    }

    let Some(attr) = attr.filter(|a| a.is_dynamic()) else {
        return TaskStatus::RunImmediate;
    };

    // Speculative failure record, trimmed again if the setter succeeds.
    if respond && ctx.append_status_record(attr_id, ZclStatus::Failure).is_err() {
        ctx.state = LocalState::ResponseSend;
        return TaskStatus::RunImmediate;
    }
    ctx.state = if commit {
        LocalState::WriteAttrWait
    } else {
        LocalState::CheckAttrWait
    };
    let info = attr.info(endpoint_id, cluster_id);
    let done = ctx.begin_access();
    if let Some(accessor) = attr.accessor_mut() {
        accessor.set(&info, &ctx.request, record + 2, commit, done);
    }
    write_attr_wait_tick(ctx, env)
}

fn write_attr_wait_tick(ctx: &mut LocalContext, _env: &mut LocalEnv<'_>) -> TaskStatus {
    let Ok(outcome) = ctx.completion.try_receive() else {
        return TaskStatus::Suspend;
    };
    ctx.state = if ctx.state == LocalState::CheckAttrWait {
        LocalState::CheckAttrReq
    } else {
        LocalState::WriteAttrReq
    };

    let size = ctx.response.len();
    if size != 0 {
        if outcome.status.is_success() {
            let _ = ctx.response.resize(size.saturating_sub(3));
        } else {
            let _ = ctx
                .response
                .write(size - 1, &[wire_status(outcome.status).code()]);
            ctx.failures += 1;
        }
    }
    TaskStatus::RunImmediate
}

fn check_complete_tick(ctx: &mut LocalContext, _env: &mut LocalEnv<'_>) -> TaskStatus {
    if ctx.failures == 0 {
        ctx.offset = 0;
        ctx.state = LocalState::WriteAttrReq;
    } else {
        ctx.state = LocalState::ResponseSend;
    }
    TaskStatus::RunImmediate
}

fn write_complete_tick(ctx: &mut LocalContext, _env: &mut LocalEnv<'_>) -> TaskStatus {
    if ctx.response.is_empty() {
        ctx.state = LocalState::Idle;
        return TaskStatus::RunImmediate;
    }
    if ctx.failures == 0 && ctx.response.append(&[ZclStatus::Success.code()]).is_err() {
        warn!(
            "local: no room for write status to 0x{:04X} seq {}, response dropped",
            ctx.peer_node, ctx.sequence
        );
        let _ = ctx.response.reset(0);
        ctx.state = LocalState::Idle;
        return TaskStatus::RunImmediate;
    }
    ctx.state = LocalState::ResponseSend;
    TaskStatus::RunImmediate
}

// ═══════════════════════════════════════════════════════════════════════════
//  RESPONSE_SEND
// ═══════════════════════════════════════════════════════════════════════════

fn response_send_tick(ctx: &mut LocalContext, env: &mut LocalEnv<'_>) -> TaskStatus {
    let _ = ctx.request.reset(0);

    let mut frame = TxFrame {
        peer_node: ctx.peer_node,
        peer_endpoint: ctx.peer_endpoint,
        local_endpoint: env.endpoint_id,
        cluster_id: ctx.cluster_id,
        profile_id: env.profile_id,
        payload: Buffer::new(),
    };
    if frame.payload.move_from(&mut ctx.response).is_err() {
        ctx.state = LocalState::Idle;
        return TaskStatus::RunImmediate;
    }

    match env.transport.unicast_transmit(&mut frame) {
        TransmitStatus::Success => {
            ctx.state = LocalState::Idle;
            TaskStatus::RunImmediate
        }
        TransmitStatus::Retry => {
            if ctx.response.move_from(&mut frame.payload).is_err() {
                ctx.state = LocalState::Idle;
                return TaskStatus::RunImmediate;
            }
            TaskStatus::RunLater(ctx.retry_delay)
        }
        status => {
            warn!(
                "local: discarded response to 0x{:04X} seq {} ({status:?})",
                ctx.peer_node, ctx.sequence
            );
            ctx.state = LocalState::Idle;
            TaskStatus::RunImmediate
        }
    }
}
