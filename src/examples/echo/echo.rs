//! FCGI echo responder.
//!
//! Multithreaded hello-world server, following the usage sketch in the
//! original implementation's header doc comment: recover the inherited
//! listener, accept in a loop, and hand each connection off to a worker
//! thread that drives one `handle` call per request until the peer closes.

use std::os::fd::FromRawFd;
use std::thread;

use minifcgi::{Context, FcgiResult, Handler, Params, Reader, Settings, Writer};

struct EchoHandler {
    count: u32,
}

impl Handler for EchoHandler {
    fn on_response(&mut self, ctx: &mut Context, reader: &mut Reader, writer: &mut Writer) -> FcgiResult {
        self.count += 1;
        let server_name = lookup(reader.params(), b"SERVER_NAME");
        let body = format!(
            "<title>FastCGI Hello!</title><h1>FastCGI Hello!</h1>Request number {} running on host {}\n",
            self.count, server_name
        );
        writer.write_finished_record(ctx, body.as_bytes(), Some("Content-type: text/html\r\n\r\n"))
    }
}

fn lookup(params: &Params, name: &[u8]) -> String {
    params
        .get(name)
        .map(|v| String::from_utf8_lossy(v).into_owned())
        .unwrap_or_else(|| "unknown".to_string())
}

fn main() -> anyhow::Result<()> {
    let settings = Settings::load()?;
    minifcgi::init_logging(&settings)?;

    let listener = minifcgi::recover_inherited_listener()?;
    log::info!("echo responder listening, timeout={}ms", settings.request_timeout_ms);

    let timeout_ms = settings.request_timeout_ms;
    minifcgi::accept_loop(&listener, move |fd| {
        thread::spawn(move || {
            let conn = unsafe { minifcgi::OwnedConnection::from_raw_fd(fd) };
            let mut handler = EchoHandler { count: 0 };
            loop {
                let status = minifcgi::handle(conn.as_raw_fd(), timeout_ms, &mut handler);
                if status < 0 {
                    log::debug!("connection ended with status {}", status);
                    break;
                }
            }
        });
    });
}
