//! Connection setup (C6, ambient): recover the inherited listening socket a
//! FastCGI web server hands an application on fd 0, and accept loop over it.
//!
//! Ported from `fcgisocketsetup::init_fcgi` in the original implementation,
//! generalized with an `accept_loop` driving a per-connection closure.

use std::io;
use std::os::fd::{AsFd, AsRawFd, RawFd};
use std::os::unix::io::FromRawFd;
use std::os::unix::net::UnixListener;

use nix::sys::socket::getpeername;
use nix::unistd::dup2_stdin;

/// Recover the listening socket a FastCGI-aware web server bound to fd 0
/// before exec'ing this process.
///
/// A FastCGI-managed listening socket is unconnected, so `getpeername` on
/// fd 0 must fail with `ENOTCONN`; any other outcome (a real peer, or a
/// closed descriptor) means this process was not started under a FastCGI
/// web server and is a hard configuration error.
///
/// On success, fd 0 is duplicated into an owned [`UnixListener`] and then
/// replaced with `/dev/null`, so application code that incidentally reads
/// `stdin` does not block on the socket.
pub fn recover_inherited_listener() -> io::Result<UnixListener> {
    match getpeername::<nix::sys::socket::UnixAddr>(0) {
        Err(nix::errno::Errno::ENOTCONN) => {}
        Err(e) => {
            return Err(io::Error::other(format!(
                "fd 0 is not a FastCGI listening socket ({e})"
            )))
        }
        Ok(_) => {
            return Err(io::Error::other(
                "fd 0 is a connected socket, not a FastCGI listener",
            ))
        }
    }

    let stdin = io::stdin();
    let socket_fd = stdin.as_fd().try_clone_to_owned()?;
    let devnull = std::fs::File::open("/dev/null")?;
    dup2_stdin(devnull).map_err(|e| io::Error::other(format!("replacing fd 0: {e}")))?;
    Ok(UnixListener::from(socket_fd))
}

/// Blocking accept loop over `listener`. Hands each accepted connection's raw
/// fd to `on_connection`, which typically spawns a worker thread that calls
/// [`crate::driver::handle`]. Accept errors are logged and looped past; they
/// do not tear down the listener.
///
/// `on_connection` takes ownership of the fd via its `RawFd` value; it is
/// responsible for closing it (e.g. by wrapping it in a type that drops it)
/// once the connection is done.
pub fn accept_loop<F>(listener: &UnixListener, mut on_connection: F) -> !
where
    F: FnMut(RawFd),
{
    loop {
        match listener.accept() {
            Ok((stream, _addr)) => {
                let fd = stream.as_raw_fd();
                // Detach the RawFd from `stream`'s Drop without closing it;
                // `on_connection` now owns the descriptor's lifetime.
                std::mem::forget(stream);
                on_connection(fd);
            }
            Err(e) => {
                log::warn!("accept failed: {e}");
            }
        }
    }
}

/// Wrap a raw fd accepted by [`accept_loop`] so it closes when dropped.
pub struct OwnedConnection(RawFd);

impl OwnedConnection {
    pub fn as_raw_fd(&self) -> RawFd {
        self.0
    }
}

impl Drop for OwnedConnection {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.0);
        }
    }
}

impl FromRawFd for OwnedConnection {
    /// # Safety
    /// `fd` must be an open, exclusively-owned file descriptor (e.g. one
    /// handed to an `accept_loop` closure).
    unsafe fn from_raw_fd(fd: RawFd) -> Self {
        OwnedConnection(fd)
    }
}
