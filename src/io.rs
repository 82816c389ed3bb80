//! Deadline-aware byte I/O (C1).
//!
//! Poll-gated `read_exact`/`write_all` against a raw file descriptor, ported
//! from `is_fd_ready_`/`read_data_`/`write_data_` in the original C
//! implementation. No buffering, no short-read retry backoff — the next
//! readiness wait governs pacing, exactly as in the source.

use std::os::fd::{BorrowedFd, RawFd};
use std::time::{Duration, Instant};

use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use nix::unistd::{read, write};

use crate::status::{FcgiResult, Status};

/// An absolute, monotonic point in time past which pending I/O must fail with
/// [`Status::Timeout`]. Captured once at `handle` entry and fixed for the
/// remainder of the call.
#[derive(Debug, Clone, Copy)]
pub struct Deadline(Instant);

impl Deadline {
    /// A deadline `timeout_ms` milliseconds from now.
    pub fn after(timeout_ms: u64) -> Self {
        Deadline(Instant::now() + Duration::from_millis(timeout_ms))
    }

    /// Milliseconds remaining until the deadline, clamped so an elapsed
    /// deadline yields a negative value rather than panicking on underflow.
    pub fn remaining_ms(&self) -> i64 {
        let now = Instant::now();
        if now >= self.0 {
            -(now.duration_since(self.0).as_millis() as i64)
        } else {
            self.0.duration_since(now).as_millis() as i64
        }
    }
}

/// Wait for `fd` to become ready for `events` (readable/writable), bounded by
/// the time remaining on `deadline`.
///
/// Retries transparently on `EINTR` without consuming the deadline budget
/// beyond recomputing time-remaining on each iteration.
fn wait_ready(fd: RawFd, events: PollFlags, deadline: &Deadline) -> Result<(), Status> {
    // Safety: `fd` outlives this call (owned by the caller's Context for the
    // duration of `handle`); borrow_raw never closes it.
    let borrowed = unsafe { BorrowedFd::borrow_raw(fd) };
    loop {
        let remaining = deadline.remaining_ms();
        if remaining < 0 {
            return Err(Status::Timeout);
        }
        let timeout_ms = remaining.min(i32::MAX as i64) as i32;
        let timeout = PollTimeout::try_from(timeout_ms).unwrap_or(PollTimeout::MAX);
        let mut pfd = [PollFd::new(borrowed, events | PollFlags::POLLERR | PollFlags::POLLHUP)];
        match poll(&mut pfd, timeout) {
            Ok(n) if n > 0 => return Ok(()),
            Ok(_) => return Err(Status::Timeout),
            Err(Errno::EINTR) => continue,
            Err(_) => return Err(Status::Error),
        }
    }
}

/// Read exactly `buf.len()` bytes from `fd`, polling for readiness before
/// each underlying `read(2)`. Returns the byte count (== `buf.len()`) on
/// success.
pub fn read_exact(fd: RawFd, buf: &mut [u8], deadline: &Deadline) -> FcgiResult {
    let want = buf.len();
    let mut done = 0usize;
    while done < want {
        wait_ready(fd, PollFlags::POLLIN, deadline)?;
        // Safety: `fd` outlives this call; borrow_raw never closes it.
        let borrowed = unsafe { BorrowedFd::borrow_raw(fd) };
        match read(borrowed, &mut buf[done..]) {
            Ok(n) if n > 0 => done += n,
            _ => return Err(Status::ReadError),
        }
    }
    Ok(done as i32)
}

/// Write exactly `buf.len()` bytes to `fd`, polling for writability before
/// each underlying `write(2)`. Returns the byte count (== `buf.len()`) on
/// success.
pub fn write_all(fd: RawFd, buf: &[u8], deadline: &Deadline) -> FcgiResult {
    let want = buf.len();
    let mut done = 0usize;
    while done < want {
        wait_ready(fd, PollFlags::POLLOUT, deadline)?;
        // Safety: `fd` outlives this call; borrow_raw never closes it.
        let borrowed = unsafe { BorrowedFd::borrow_raw(fd) };
        match write(borrowed, &buf[done..]) {
            Ok(n) if n > 0 => done += n,
            _ => return Err(Status::WriteError),
        }
    }
    Ok(done as i32)
}
