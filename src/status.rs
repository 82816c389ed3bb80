//! Protocol status / error taxonomy.
//!
//! Mirrors `mf_status` from the original C implementation one-for-one: the
//! negative discriminants are part of the wire contract (they can end up
//! embedded in an END_REQUEST's app-status field via `on_multiconnect`), so
//! they are fixed, not merely internal error codes.

use thiserror::Error;

/// Status returned by protocol-level operations.
///
/// Successful reads/writes return a byte count (`Ok(usize)`); failures are one
/// of these variants. `handle` itself collapses this back into the plain
/// `i32` the original C entry point returns, via [`Status::code`].
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Generic I/O error; underlying cause discoverable via `std::io::Error`'s
    /// last-error equivalent at the call site.
    #[error("generic I/O error")]
    Error,
    /// Record header has version != 1.
    #[error("unsupported FastCGI protocol version")]
    UnsupportedVersion,
    /// Generic protocol violation (reserved for future use).
    #[error("protocol error")]
    ProtocolError,
    /// Name-value block malformed or truncated.
    #[error("malformed or truncated name-value params block")]
    ParamsError,
    /// A BEGIN_REQUEST arrived while a request was already in flight.
    #[error("multiplexed connections are not supported")]
    UnsupportedMpxConn,
    /// Deadline reached before the required bytes were transferred.
    #[error("operation timed out")]
    Timeout,
    /// Record type did not match the expected stream type.
    #[error("unexpected record type for this stream")]
    HeaderTypeError,
    /// BEGIN_REQUEST carried request id 0.
    #[error("BEGIN_REQUEST with request id 0")]
    RequestIdError,
    /// A `read` transfer returned zero or negative.
    #[error("read error")]
    ReadError,
    /// A `write` transfer returned zero or negative.
    #[error("write error")]
    WriteError,
    /// A record's request id differs from the request in progress.
    #[error("record request id does not match the in-flight request")]
    RequestIdMismatch,
    /// Default rejection for the Authorizer role.
    #[error("authorizer role is not supported")]
    UnsupportedAuth,
    /// Default rejection for the Filter role.
    #[error("filter role is not supported")]
    UnsupportedFilter,
}

impl Status {
    /// The stable negative wire/ABI code for this status, matching `mf_status`.
    pub const fn code(self) -> i32 {
        match self {
            Status::Error => -1,
            Status::UnsupportedVersion => -2,
            Status::ProtocolError => -3,
            Status::ParamsError => -4,
            Status::UnsupportedMpxConn => -6,
            Status::Timeout => -7,
            Status::HeaderTypeError => -8,
            Status::RequestIdError => -9,
            Status::ReadError => -10,
            Status::WriteError => -11,
            Status::RequestIdMismatch => -12,
            Status::UnsupportedAuth => -13,
            Status::UnsupportedFilter => -14,
        }
    }
}

impl From<Status> for i32 {
    fn from(status: Status) -> i32 {
        status.code()
    }
}

/// Result of a protocol operation: bytes transferred/processed on success.
pub type FcgiResult = Result<i32, Status>;
