//! Application-supplied capability set (C5 external contract).
//!
//! Ported from `mf_handler` in the original C implementation: there, an
//! abstract base class with one pure-virtual method and four overridable
//! defaults. Expressed here as a single trait with one required method and
//! defaulted bodies for the rest, per the redesign note in the spec's design
//! section — composition over a class hierarchy.

use crate::context::Context;
use crate::header::ProtocolStatus;
use crate::reader::Reader;
use crate::status::FcgiResult;
use crate::writer::Writer;

/// Capability set an application implements to answer FastCGI requests.
///
/// Every method receives the shared `(context, reader, writer)` triple for
/// the request in progress and returns a status >= 0 on success or a
/// negative [`crate::status::Status`] code on failure.
pub trait Handler {
    /// Called for the Responder role after STDIN has been fully read.
    /// Required: a responder with no `on_response` cannot answer anything.
    fn on_response(&mut self, ctx: &mut Context, reader: &mut Reader, writer: &mut Writer) -> FcgiResult;

    /// Called for the Authorizer role. Default: reply `UNSUPPORTED_AUTH`.
    fn on_auth(&mut self, ctx: &mut Context, _reader: &mut Reader, writer: &mut Writer) -> FcgiResult {
        ctx.app_status = crate::status::Status::UnsupportedAuth.code();
        writer.write_finished_record(ctx, &[], None)
    }

    /// Called for the Filter role, after STDIN and DATA have been read.
    /// Default: reply `UNSUPPORTED_FILTER`.
    fn on_filter(&mut self, ctx: &mut Context, _reader: &mut Reader, writer: &mut Writer) -> FcgiResult {
        ctx.app_status = crate::status::Status::UnsupportedFilter.code();
        writer.write_finished_record(ctx, &[], None)
    }

    /// Called for a management `GET_VALUES` request (request id 0).
    /// Default: answer the well-known `FCGI_MAX_CONNS`/`FCGI_MAX_REQS`/
    /// `FCGI_MPXS_CONNS` variables and ignore anything else.
    fn on_management(&mut self, ctx: &mut Context, reader: &mut Reader, writer: &mut Writer) -> FcgiResult {
        crate::driver::default_on_management(ctx, reader, writer)
    }

    /// Called when the driver detects an attempt to multiplex a second
    /// BEGIN_REQUEST onto this connection. Default: convert the internal
    /// protocol violation into a well-formed `CANT_MPX_CONN` rejection.
    fn on_multiconnect(&mut self, ctx: &mut Context, _reader: &mut Reader, writer: &mut Writer) -> FcgiResult {
        ctx.protocol_status = ProtocolStatus::CantMultiplex;
        writer.write_finished_record(ctx, &[], None)
    }
}
