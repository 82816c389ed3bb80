//! Request driver (C5): the per-connection state machine executed by
//! [`handle`]. Ported from `mtfcgi::handle` in the original C implementation.

use std::os::fd::RawFd;

use crate::context::Context;
use crate::handler::Handler;
use crate::header::{
    BeginRequestBody, Header, ProtocolStatus, RecType, Role, UnknownTypeBody, HEADER_LEN,
    NULL_REQUEST_ID,
};
use crate::io;
use crate::reader::Reader;
use crate::status::Status;
use crate::writer::Writer;
use num_traits::FromPrimitive;

/// Drive one FastCGI request cycle to completion on `fd`, failing any
/// pending I/O that would cross `now + timeout_ms`.
///
/// Returns a non-negative status on success (the handler's own return value,
/// or the byte count of a driver-written reply) and a negative
/// [`Status`] code (see [`Status::code`]) on failure.
pub fn handle(fd: RawFd, timeout_ms: u64, handler: &mut dyn Handler) -> i32 {
    let mut ctx = Context::new(fd, timeout_ms);
    let mut reader = Reader::new();
    let mut writer = Writer::new();

    ctx.app_status = run_cycle(&mut ctx, &mut reader, &mut writer, handler);

    if ctx.app_status == Status::UnsupportedMpxConn.code() {
        ctx.app_status = match handler.on_multiconnect(&mut ctx, &mut reader, &mut writer) {
            Ok(n) => n,
            Err(e) => e.code(),
        };
    }

    ctx.app_status
}

fn run_cycle(ctx: &mut Context, reader: &mut Reader, writer: &mut Writer, handler: &mut dyn Handler) -> i32 {
    loop {
        let mut header_bytes = [0u8; HEADER_LEN];
        match io::read_exact(ctx.fd, &mut header_bytes, &ctx.deadline) {
            Ok(n) if n as usize == HEADER_LEN => {}
            Ok(n) => return n,
            Err(e) => return e.code(),
        }

        let header = match Header::unpack(&header_bytes) {
            Ok(h) => h,
            Err(e) => return e.code(),
        };
        ctx.header = Some(header);
        ctx.request_id = header.request_id;

        log::debug!(
            "FCGI header: type={:?} (raw={}) id={} len={}",
            header.rec_type(),
            header.type_byte,
            header.request_id,
            header.content_length
        );

        if header.is_type(RecType::BeginRequest) {
            if ctx.request_id == NULL_REQUEST_ID {
                return Status::RequestIdError.code();
            }

            let mut body_bytes = [0u8; BeginRequestBody::LEN];
            match io::read_exact(ctx.fd, &mut body_bytes, &ctx.deadline) {
                Ok(n) if n as usize == BeginRequestBody::LEN => {}
                Ok(n) => return n,
                Err(e) => return e.code(),
            }
            let body = BeginRequestBody::unpack(&body_bytes);
            ctx.role = Role::from_u16(body.role);
            ctx.flags = body.flags;

            if let Err(e) = reader.read_params(ctx) {
                return e.code();
            }

            return dispatch_role(ctx, reader, writer, handler);
        } else if header.is_type(RecType::GetValues) && ctx.request_id == NULL_REQUEST_ID {
            return match handler.on_management(ctx, reader, writer) {
                Ok(n) => n,
                Err(e) => e.code(),
            };
        } else if ctx.request_id == NULL_REQUEST_ID {
            // Unrecognized management record, or a known type that isn't
            // legal as a management request: echo the raw type byte back.
            ctx.write_type = RecType::UnknownType;
            let body = UnknownTypeBody::pack(header.type_byte);
            return match writer.write_finished_record(ctx, &body, None) {
                Ok(n) => n,
                Err(e) => e.code(),
            };
        } else {
            // In-flight record for a request id other than the one we're
            // tracking: drain and ignore, then keep reading.
            match reader.read_record_body(ctx) {
                Ok(_) => continue,
                Err(e) => return e.code(),
            }
        }
    }
}

fn dispatch_role(ctx: &mut Context, reader: &mut Reader, writer: &mut Writer, handler: &mut dyn Handler) -> i32 {
    match ctx.role {
        Some(Role::Responder) => match reader.read_stdin(ctx) {
            Ok(n) if n >= 0 => match handler.on_response(ctx, reader, writer) {
                Ok(n) => n,
                Err(e) => e.code(),
            },
            Ok(n) => n,
            Err(e) => e.code(),
        },
        Some(Role::Authorizer) => match handler.on_auth(ctx, reader, writer) {
            Ok(n) => n,
            Err(e) => e.code(),
        },
        Some(Role::Filter) => {
            let stdin_result = reader.read_stdin(ctx).and_then(|_| reader.read_data(ctx));
            match stdin_result {
                Ok(n) if n >= 0 => match handler.on_filter(ctx, reader, writer) {
                    Ok(n) => n,
                    Err(e) => e.code(),
                },
                Ok(n) => n,
                Err(e) => e.code(),
            }
        }
        None => {
            ctx.protocol_status = ProtocolStatus::UnknownRole;
            match writer.write_finished_record(ctx, &[], None) {
                Ok(n) => n,
                Err(e) => e.code(),
            }
        }
    }
}

/// Well-known `GET_VALUES` variable names this crate answers.
const FCGI_MAX_CONNS: &[u8] = b"FCGI_MAX_CONNS";
const FCGI_MAX_REQS: &[u8] = b"FCGI_MAX_REQS";
const FCGI_MPXS_CONNS: &[u8] = b"FCGI_MPXS_CONNS";

/// Default management hook: answer the handful of variables this connection
/// model actually has fixed values for, silently ignoring anything else.
pub(crate) fn default_on_management(ctx: &mut Context, reader: &mut Reader, writer: &mut Writer) -> crate::status::FcgiResult {
    debug_assert!(ctx.header.map(|h| h.is_type(RecType::GetValues)).unwrap_or(false));
    let len = reader.read_record_params(ctx)?;
    if len <= 0 {
        return Ok(len);
    }

    let mut body = Vec::new();
    for name in reader.params().keys() {
        let value = if name.as_slice() == FCGI_MAX_CONNS {
            Some(b'1')
        } else if name.as_slice() == FCGI_MAX_REQS {
            Some(b'1')
        } else if name.as_slice() == FCGI_MPXS_CONNS {
            Some(b'0')
        } else {
            None
        };
        if let Some(value) = value {
            body.push(name.len() as u8);
            body.push(1u8);
            body.extend_from_slice(name);
            body.push(value);
        }
    }

    ctx.write_type = RecType::GetValuesResult;
    writer.write_finished_record(ctx, &body, None)
}
