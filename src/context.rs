//! Per-cycle context (C5 data): the fields threaded through one `handle`
//! invocation. Ported from `mf_context` in the original C implementation.

use std::os::fd::RawFd;

use crate::header::{Header, ProtocolStatus, RecType, Role};
use crate::io::Deadline;

/// Per-call state for one FastCGI request cycle. Reset at the start of each
/// `handle` invocation; callbacks borrow it for the duration of one call.
pub struct Context {
    pub(crate) fd: RawFd,
    pub(crate) deadline: Deadline,
    /// Current request id: nonzero for an application request, zero while
    /// servicing a management request.
    pub request_id: u16,
    /// Stream record type the writer emits to (normally STDOUT; swapped to
    /// GET_VALUES_RESULT while answering a management request).
    pub write_type: RecType,
    /// Set by the handler on return; also used internally to carry the most
    /// recent error code through the driver's state machine.
    pub app_status: i32,
    /// END_REQUEST protocol status.
    pub protocol_status: ProtocolStatus,
    /// Role decoded from the BEGIN_REQUEST body.
    pub role: Option<Role>,
    /// BEGIN_REQUEST flags byte (bit 0 = keep-connection).
    pub flags: u8,
    /// Most recently read record header, staged here by the driver before
    /// handing control to the reader for body extraction.
    pub header: Option<Header>,
}

impl Context {
    /// Fresh context for a new `handle` call.
    pub fn new(fd: RawFd, timeout_ms: u64) -> Self {
        Context {
            fd,
            deadline: Deadline::after(timeout_ms),
            request_id: 0,
            write_type: RecType::Stdout,
            app_status: 0, // OK
            protocol_status: ProtocolStatus::RequestComplete,
            role: None,
            flags: 0,
            header: None,
        }
    }

    /// True if the BEGIN_REQUEST flags requested the connection stay open
    /// after END_REQUEST.
    pub fn keep_connection(&self) -> bool {
        self.flags & crate::header::KEEP_CONN != 0
    }
}
