//! Writer (C4): frames handler output into padded FastCGI records, reusing a
//! single fixed-size staging buffer to minimize syscalls.
//!
//! Ported from `mf_writer::write_record` in the original C implementation.
//! The one deliberate HOW deviation: the C varargs `printf`-style header
//! parameter becomes a pre-rendered `&str` — Rust has no `va_list` at this
//! layer, so callers `format!()` the header themselves before calling in.

use crate::context::Context;
use crate::header::{EndRequestBody, Header, RecType, HEADER_LEN};
use crate::status::{FcgiResult, Status};
use crate::io;

/// Largest multiple of 8 <= 65535, leaving room for a trailing END_REQUEST.
pub const WRITER_BUF_SIZE: usize = 0xFFF8;

/// Controls what tail records, if any, follow the payload of a `write_record`
/// call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteTag {
    /// Write nothing beyond the payload; the caller will make further calls
    /// before closing the request.
    None,
    /// Write an empty stream-record terminator only.
    Closed,
    /// Write the stream terminator (if owed) and an END_REQUEST.
    Finished,
}

/// Owns the fixed-size staging buffer used to frame outbound records.
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub fn new() -> Self {
        Writer {
            buf: vec![0u8; WRITER_BUF_SIZE],
        }
    }

    /// Write one logical response as a sequence of stream records, with an
    /// optional formatted header prelude, followed by whatever tail `tag`
    /// calls for.
    pub fn write_record(
        &mut self,
        ctx: &mut Context,
        tag: WriteTag,
        data: &[u8],
        header: Option<&str>,
    ) -> FcgiResult {
        let buf_len = self.buf.len() as i32;
        let mut used_len = HEADER_LEN as i32;
        let mut total_len: i32 = 0;
        let mut data = data;

        if let Some(header) = header {
            let header_bytes = header.as_bytes();
            let left_len = (buf_len - used_len) as usize;
            // Strict `<` overflow check, matching the original's vsnprintf
            // comparison: an exact fit is still treated as overflow.
            if header_bytes.is_empty() || header_bytes.len() >= left_len {
                return Err(Status::WriteError);
            }
            let start = used_len as usize;
            self.buf[start..start + header_bytes.len()].copy_from_slice(header_bytes);
            used_len += header_bytes.len() as i32;
        }

        let mut write_tail = tag != WriteTag::None;

        loop {
            let left_len = buf_len - used_len;
            let body_len = left_len.min(data.len() as i32);
            if body_len > 0 {
                let start = used_len as usize;
                let n = body_len as usize;
                self.buf[start..start + n].copy_from_slice(&data[..n]);
                data = &data[n..];
                used_len += body_len;
            }

            let content_len = used_len - HEADER_LEN as i32;
            let padding_len = Header::align8(content_len as usize) as i32 - content_len;
            Header::pack_into(
                &mut self.buf,
                ctx.write_type,
                ctx.request_id,
                content_len as u16,
                padding_len as u8,
            );
            let mut raw_len = used_len + padding_len;

            if buf_len > raw_len && write_tail {
                let left_raw_len = buf_len - raw_len;
                let record_len = HEADER_LEN as i32 + EndRequestBody::LEN as i32;
                let has_content = content_len != 0;
                let tail_len = if tag == WriteTag::Finished { record_len } else { 0 }
                    + if has_content { HEADER_LEN as i32 } else { 0 };

                if tail_len <= left_raw_len {
                    if has_content {
                        // Avoid writing a superfluous empty-empty pair.
                        Header::pack_into(
                            &mut self.buf[raw_len as usize..],
                            ctx.write_type,
                            ctx.request_id,
                            0,
                            0,
                        );
                        raw_len += HEADER_LEN as i32;
                    }
                    if tag == WriteTag::Finished {
                        Header::pack_into(
                            &mut self.buf[raw_len as usize..],
                            RecType::EndRequest,
                            ctx.request_id,
                            EndRequestBody::LEN as u16,
                            0,
                        );
                        let body = EndRequestBody::pack(ctx.app_status, ctx.protocol_status);
                        let start = raw_len as usize + HEADER_LEN;
                        self.buf[start..start + body.len()].copy_from_slice(&body);
                        raw_len += record_len;
                    }
                    write_tail = false;
                }
            }

            let written = io::write_all(ctx.fd, &self.buf[..raw_len as usize], &ctx.deadline)?;
            if written != raw_len {
                return Err(Status::WriteError);
            }
            total_len += raw_len;
            used_len = HEADER_LEN as i32;

            if data.is_empty() && !write_tail {
                break;
            }
        }

        Ok(total_len)
    }

    /// Convenience wrapper applying `tag = Finished`.
    pub fn write_finished_record(
        &mut self,
        ctx: &mut Context,
        data: &[u8],
        header: Option<&str>,
    ) -> FcgiResult {
        self.write_record(ctx, WriteTag::Finished, data, header)
    }
}

impl Default for Writer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::ProtocolStatus;
    use std::os::fd::AsRawFd;
    use std::os::unix::net::UnixStream;
    use std::thread;

    fn drain(mut stream: UnixStream) -> Vec<u8> {
        use std::io::Read;
        let mut out = Vec::new();
        stream.read_to_end(&mut out).unwrap();
        out
    }

    #[test]
    fn hello_scenario_emits_stdout_empty_and_end_request() {
        let (a, b) = UnixStream::pair().unwrap();
        let reader = thread::spawn(move || drain(b));

        let mut ctx = Context::new(a.as_raw_fd(), 1000);
        ctx.request_id = 1;
        ctx.write_type = RecType::Stdout;
        let mut writer = Writer::new();

        let n = writer
            .write_finished_record(&mut ctx, b"hi", Some("Status: 200\r\n\r\n"))
            .unwrap();
        drop(a);

        let wire = reader.join().unwrap();
        assert_eq!(n as usize, wire.len());

        // First record: STDOUT, content = "Status: 200\r\n\r\nhi" (17 bytes), padded to 24.
        let header = Header::unpack(&wire[0..8]).unwrap();
        assert!(matches!(header.rec_type(), Some(RecType::Stdout)));
        assert_eq!(header.request_id, 1);
        assert_eq!(header.content_length, 17);
        assert_eq!((17 + header.padding_length as usize) % 8, 0);
        let first_record_len = 8 + 17 + header.padding_length as usize;

        // Second record: empty STDOUT terminator.
        let header2 = Header::unpack(&wire[first_record_len..first_record_len + 8]).unwrap();
        assert!(matches!(header2.rec_type(), Some(RecType::Stdout)));
        assert_eq!(header2.content_length, 0);

        // Third record: END_REQUEST.
        let end_off = first_record_len + 8;
        let header3 = Header::unpack(&wire[end_off..end_off + 8]).unwrap();
        assert!(matches!(header3.rec_type(), Some(RecType::EndRequest)));
        assert_eq!(header3.content_length, 8);
        let body = &wire[end_off + 8..end_off + 16];
        assert_eq!(&body[0..4], &[0, 0, 0, 0]); // app status 0
        assert_eq!(body[4], ProtocolStatus::RequestComplete as u8);
    }

    #[test]
    fn empty_payload_skips_superfluous_empty_pair() {
        let (a, b) = UnixStream::pair().unwrap();
        let reader = thread::spawn(move || drain(b));

        let mut ctx = Context::new(a.as_raw_fd(), 1000);
        ctx.request_id = 7;
        let mut writer = Writer::new();
        writer.write_finished_record(&mut ctx, &[], None).unwrap();
        drop(a);

        let wire = reader.join().unwrap();
        // Only one STDOUT(empty) + END_REQUEST, not two empty STDOUTs.
        let header = Header::unpack(&wire[0..8]).unwrap();
        assert!(matches!(header.rec_type(), Some(RecType::Stdout)));
        assert_eq!(header.content_length, 0);
        let header2 = Header::unpack(&wire[8..16]).unwrap();
        assert!(matches!(header2.rec_type(), Some(RecType::EndRequest)));
        assert_eq!(wire.len(), 24);
    }

    #[test]
    fn write_tag_none_appends_no_tail() {
        let (a, b) = UnixStream::pair().unwrap();
        let reader = thread::spawn(move || drain(b));

        let mut ctx = Context::new(a.as_raw_fd(), 1000);
        ctx.request_id = 1;
        let mut writer = Writer::new();
        writer
            .write_record(&mut ctx, WriteTag::None, b"partial", None)
            .unwrap();
        drop(a);

        let wire = reader.join().unwrap();
        let header = Header::unpack(&wire[0..8]).unwrap();
        assert_eq!(header.content_length, 7);
        assert_eq!(wire.len(), 8 + 7 + header.padding_length as usize);
    }

    #[test]
    fn oversized_header_is_write_error() {
        let (a, _b) = UnixStream::pair().unwrap();
        let mut ctx = Context::new(a.as_raw_fd(), 1000);
        let mut writer = Writer::new();
        let huge = "x".repeat(WRITER_BUF_SIZE);
        let err = writer
            .write_finished_record(&mut ctx, &[], Some(&huge))
            .unwrap_err();
        assert_eq!(err, Status::WriteError);
    }
}
