//! Server-side FastCGI protocol core: record framing, deadline-driven I/O,
//! and role dispatch for responder/authorizer/filter applications.
//!
//! Module layout mirrors the component breakdown this crate is built from:
//! wire codec (`header`), deadline I/O (`io`), reading (`reader`) and writing
//! (`writer`) record streams, per-cycle state (`context`), the request driver
//! (`driver`) and its external contract (`handler`), and the ambient stack
//! around it (`socket`, `config`, `logging`).

mod config;
mod context;
mod driver;
mod handler;
mod header;
mod io;
mod logging;
mod reader;
mod socket;
mod status;
mod writer;

pub use config::{Settings, CONFIG_FILE_NAME};
pub use context::Context;
pub use driver::handle;
pub use handler::Handler;
pub use header::{
    decode_length, encode_length, BeginRequestBody, EndRequestBody, Header, ProtocolStatus,
    RecType, Role, UnknownTypeBody, FCGI_VERSION_1, HEADER_LEN, KEEP_CONN, NULL_REQUEST_ID,
};
pub use io::Deadline;
pub use reader::{Params, Reader};
pub use socket::{accept_loop, recover_inherited_listener, OwnedConnection};
pub use status::{FcgiResult, Status};
pub use writer::{WriteTag, Writer};

/// Initialize logging from `settings`. Call once at process start before
/// accepting connections.
pub fn init_logging(settings: &Settings) -> anyhow::Result<()> {
    logging::init(settings)
}
