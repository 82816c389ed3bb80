//! Reader (C3): record-sequence assembly and name-value parameter parsing.
//!
//! Ported from `mf_reader`/`read_record_`/`read_record_body_`/`parse_params_`
//! in the original C implementation.

use std::collections::HashMap;

use crate::context::Context;
use crate::header::{decode_length, Header, RecType};
use crate::io;
use crate::status::{FcgiResult, Status};

/// Parameter map: non-empty name -> non-empty value. Entries with either
/// component empty are dropped during parsing; duplicate names keep the
/// first occurrence.
pub type Params = HashMap<Vec<u8>, Vec<u8>>;

/// Owns the three growable payload buffers and the parsed parameter map for
/// one request cycle.
#[derive(Default)]
pub struct Reader {
    params_raw: Vec<u8>,
    stdin: Vec<u8>,
    data: Vec<u8>,
    params: Params,
}

impl Reader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parsed request parameters, available after `read_params` or
    /// `read_record_params`.
    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Accumulated STDIN bytes, available after `read_stdin`.
    pub fn stdin(&self) -> &[u8] {
        &self.stdin
    }

    /// Accumulated DATA bytes, available after `read_data`.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Read the body (content + padding) of the record whose header is
    /// already staged in `ctx.header`, discarding it into the params-raw
    /// buffer. Used to drain records belonging to an ignored, stray
    /// multiplexed request id.
    pub fn read_record_body(&mut self, ctx: &Context) -> FcgiResult {
        self.params_raw.clear();
        let header = ctx.header.expect("read_record_body called with no staged header");
        read_record_body_into(ctx, &header, &mut self.params_raw)
    }

    /// Read a single PARAMS body (`ctx.header` already staged) and parse it.
    /// Used for management `GET_VALUES`, whose query convention is an empty
    /// value per queried name -- unlike [`Reader::read_params`], entries here
    /// are kept even when the value is empty; only an empty *name* is dropped.
    pub fn read_record_params(&mut self, ctx: &Context) -> FcgiResult {
        self.params.clear();
        self.params_raw.clear();
        let header = ctx.header.expect("read_record_params called with no staged header");
        let len = read_record_body_into(ctx, &header, &mut self.params_raw)?;
        if len > 0 {
            parse_query_names(&self.params_raw, &mut self.params)?;
        }
        Ok(len)
    }

    /// Read a sequence of PARAMS records until a zero-length terminator,
    /// then parse the accumulated buffer into the parameter map.
    pub fn read_params(&mut self, ctx: &mut Context) -> FcgiResult {
        self.params.clear();
        self.params_raw.clear();
        let len = read_record_sequence(ctx, RecType::Params, &mut self.params_raw)?;
        if len > 0 {
            parse_params(&self.params_raw, &mut self.params)?;
        }
        Ok(len)
    }

    /// Read a sequence of STDIN records until a zero-length terminator.
    pub fn read_stdin(&mut self, ctx: &mut Context) -> FcgiResult {
        self.stdin.clear();
        read_record_sequence(ctx, RecType::Stdin, &mut self.stdin)
    }

    /// Read a sequence of DATA records until a zero-length terminator.
    pub fn read_data(&mut self, ctx: &mut Context) -> FcgiResult {
        self.data.clear();
        read_record_sequence(ctx, RecType::Data, &mut self.data)
    }
}

/// Read `header`'s body (content + padding) into `buf`, truncating back to
/// just the content afterward. Fails if the record's request id does not
/// match the context's current request id.
fn read_record_body_into(ctx: &Context, header: &Header, buf: &mut Vec<u8>) -> FcgiResult {
    if header.request_id != ctx.request_id {
        return Err(Status::RequestIdMismatch);
    }
    let content_len = header.content_length as usize;
    let total_len = content_len + header.padding_length as usize;
    if total_len == 0 {
        return Ok(0);
    }
    let prev_size = buf.len();
    buf.resize(prev_size + total_len, 0);
    let n = io::read_exact(ctx.fd, &mut buf[prev_size..], &ctx.deadline)?;
    if n as usize == total_len && header.padding_length > 0 {
        buf.truncate(prev_size + content_len);
    }
    Ok(n)
}

/// Shared record-sequence loop for `read_params`/`read_stdin`/`read_data`.
///
/// Repeatedly reads a header, verifies it against `expected` and the
/// in-flight request id, then reads its body into `buf`. Stops when a
/// zero-length record of the expected type is read (the FastCGI
/// end-of-stream convention).
fn read_record_sequence(ctx: &mut Context, expected: RecType, buf: &mut Vec<u8>) -> FcgiResult {
    let mut total_len: i32 = 0;
    loop {
        let mut header_bytes = [0u8; crate::header::HEADER_LEN];
        let n = io::read_exact(ctx.fd, &mut header_bytes, &ctx.deadline)?;
        if n as usize != header_bytes.len() {
            return Ok(total_len);
        }
        let header = Header::unpack(&header_bytes)?;

        if header.is_type(RecType::BeginRequest) {
            return Err(Status::UnsupportedMpxConn);
        }
        if !header.is_type(expected) {
            return Err(Status::HeaderTypeError);
        }

        total_len += crate::header::HEADER_LEN as i32;
        let body_len = read_record_body_into(ctx, &header, buf)?;
        if body_len > 0 {
            total_len += body_len;
        } else {
            return Ok(total_len);
        }
    }
}

/// Parse `(name_len, value_len, name, value)` quartets out of `buf` into
/// `params`. Entries where name or value is empty are silently dropped.
pub fn parse_params(buf: &[u8], params: &mut Params) -> Result<(), Status> {
    let mut pos = 0usize;
    while pos < buf.len() {
        let name_len = decode_length(buf, &mut pos)? as usize;
        let value_len = decode_length(buf, &mut pos)? as usize;
        let name_end = pos.checked_add(name_len).ok_or(Status::ParamsError)?;
        let value_end = name_end.checked_add(value_len).ok_or(Status::ParamsError)?;
        if value_end > buf.len() {
            return Err(Status::ParamsError);
        }
        let name = &buf[pos..name_end];
        let value = &buf[name_end..value_end];
        if !name.is_empty() && !value.is_empty() && !params.contains_key(name) {
            params.insert(name.to_vec(), value.to_vec());
        }
        pos = value_end;
    }
    Ok(())
}

/// Parse `(name_len, value_len, name, value)` quartets out of a `GET_VALUES`
/// body, keeping an entry as long as its name is non-empty -- the query
/// convention sends a deliberately empty value per name being asked about, so
/// the empty-value drop in [`parse_params`] would discard every query.
fn parse_query_names(buf: &[u8], params: &mut Params) -> Result<(), Status> {
    let mut pos = 0usize;
    while pos < buf.len() {
        let name_len = decode_length(buf, &mut pos)? as usize;
        let value_len = decode_length(buf, &mut pos)? as usize;
        let name_end = pos.checked_add(name_len).ok_or(Status::ParamsError)?;
        let value_end = name_end.checked_add(value_len).ok_or(Status::ParamsError)?;
        if value_end > buf.len() {
            return Err(Status::ParamsError);
        }
        let name = &buf[pos..name_end];
        let value = &buf[name_end..value_end];
        if !name.is_empty() && !params.contains_key(name) {
            params.insert(name.to_vec(), value.to_vec());
        }
        pos = value_end;
    }
    Ok(())
}
