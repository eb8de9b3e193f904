//! The cancellable descriptor-poll adapter (C4.2). Unix-only: built on a
//! per-thread self-pipe multiplexed alongside the monitored descriptor via
//! `poll(2)`.

use std::cell::RefCell;
use std::io;
use std::os::unix::io::RawFd;

use crate::error::Error;
use crate::handler::{CancelHandler, UnregisterGuard};
use crate::token::CancellationToken;

/// A non-blocking pipe used purely to wake a `poll(2)` call from another
/// thread. Lazily created once per thread and reused by every `poll()` call
/// on that thread; closed when the thread exits.
struct SelfPipe {
    read_fd: RawFd,
    write_fd: RawFd,
}

impl SelfPipe {
    fn new() -> io::Result<Self> {
        let mut fds = [0 as RawFd; 2];
        if unsafe { libc::pipe(fds.as_mut_ptr()) } != 0 {
            return Err(io::Error::last_os_error());
        }
        let (read_fd, write_fd) = (fds[0], fds[1]);
        if let Err(err) = set_nonblocking(read_fd).and_then(|_| set_nonblocking(write_fd)) {
            unsafe {
                libc::close(read_fd);
                libc::close(write_fd);
            }
            return Err(err);
        }
        Ok(SelfPipe { read_fd, write_fd })
    }

    /// Writes one byte, non-blocking. Idempotent in effect: if a byte is
    /// already pending (`EWOULDBLOCK`), there is nothing more to do — the
    /// reader will still observe `POLLIN`.
    fn notify(&self) {
        let byte: u8 = 1;
        loop {
            let ret = unsafe { libc::write(self.write_fd, &byte as *const u8 as *const libc::c_void, 1) };
            if ret >= 0 {
                return;
            }
            match io::Error::last_os_error().kind() {
                io::ErrorKind::Interrupted => continue,
                io::ErrorKind::WouldBlock => return,
                kind => {
                    log::warn!("self-pipe write failed: {kind}");
                    return;
                }
            }
        }
    }

    /// Drains one pending byte, if any.
    fn drain(&self) {
        let mut byte: u8 = 0;
        loop {
            let ret = unsafe { libc::read(self.read_fd, &mut byte as *mut u8 as *mut libc::c_void, 1) };
            if ret >= 0 {
                return;
            }
            match io::Error::last_os_error().kind() {
                io::ErrorKind::Interrupted => continue,
                io::ErrorKind::WouldBlock => return,
                kind => {
                    log::warn!("self-pipe drain failed: {kind}");
                    return;
                }
            }
        }
    }
}

impl Drop for SelfPipe {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.read_fd);
            libc::close(self.write_fd);
        }
    }
}

fn set_nonblocking(fd: RawFd) -> io::Result<()> {
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }
    if unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) } < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

thread_local! {
    static SELF_PIPE: RefCell<Option<SelfPipe>> = RefCell::new(None);
}

struct PollHandler<'p> {
    pipe: &'p SelfPipe,
}

impl CancelHandler for PollHandler<'_> {
    fn cancel(&mut self) {
        self.pipe.notify();
    }

    fn reset(&mut self) {
        self.pipe.drain();
    }
}

/// Monitors `fd` for `events` (a `poll(2)` event mask, e.g. `libc::POLLIN`)
/// until it becomes ready or `token` is cancelled, and returns the
/// descriptor's `revents`.
///
/// A return value of `0` means the call ended because `token` was (or
/// became) cancelled, not because `fd` became ready — a cancelled wait and a
/// legitimately empty `revents` both look like `0`, so callers that care
/// about the difference should check `token.is_cancelled()` afterwards.
/// `EINTR` from the underlying `poll(2)` is retried transparently; any other
/// OS failure surfaces as [`Error`].
pub fn poll<T: CancellationToken>(
    fd: RawFd,
    events: libc::c_short,
    token: &T,
) -> Result<libc::c_short, Error> {
    if token.is_cancelled() {
        return Ok(0);
    }

    SELF_PIPE.with(|cell| {
        if cell.borrow().is_none() {
            let pipe = SelfPipe::new().map_err(|err| {
                log::warn!("self-pipe setup failed: {err}");
                Error::SelfPipeSetup(err)
            })?;
            *cell.borrow_mut() = Some(pipe);
        }
        let borrowed = cell.borrow();
        let pipe = borrowed.as_ref().expect("self-pipe initialized above");

        let mut handler = PollHandler { pipe };
        if !token.try_register(&mut handler) {
            return Ok(0);
        }
        let _unregister = UnregisterGuard { token, handler: &mut handler };

        let mut pollfds = [
            libc::pollfd { fd, events, revents: 0 },
            libc::pollfd { fd: pipe.read_fd, events: libc::POLLIN, revents: 0 },
        ];

        loop {
            let ret = unsafe { libc::poll(pollfds.as_mut_ptr(), pollfds.len() as libc::nfds_t, -1) };
            if ret >= 0 {
                break;
            }
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            log::warn!("poll(2) failed: {err}");
            return Err(Error::Poll(err));
        }

        if pollfds[1].revents & libc::POLLIN != 0 {
            Ok(0)
        } else {
            Ok(pollfds[0].revents)
        }
    })
}
