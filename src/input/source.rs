//! Byte sources for the decoder.
//!
//! The decoder pulls single bytes through [`ByteSource`] so the escape
//! grammar can be tested against canned byte vectors. The real source wraps
//! the tty fd in non-blocking mode; "no byte available" is how the decoder
//! detects the end of a partial escape sequence (a lone ESC).

use std::io;

/// A pull source of input bytes.
pub trait ByteSource {
    /// The next byte if one is immediately available.
    fn try_read(&mut self) -> io::Result<Option<u8>>;
}

/// Canned bytes, for decoder tests.
#[derive(Debug, Default)]
pub struct VecSource {
    bytes: std::collections::VecDeque<u8>,
}

impl VecSource {
    pub fn new(bytes: &[u8]) -> Self {
        Self { bytes: bytes.iter().copied().collect() }
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl ByteSource for VecSource {
    fn try_read(&mut self) -> io::Result<Option<u8>> {
        Ok(self.bytes.pop_front())
    }
}

/// The terminal input fd, read one byte at a time in non-blocking mode.
#[cfg(unix)]
#[derive(Debug)]
pub struct TtySource {
    fd: libc::c_int,
}

#[cfg(unix)]
impl TtySource {
    /// Wrap an fd the caller keeps open for the source's lifetime.
    pub fn new(fd: libc::c_int) -> io::Result<Self> {
        let source = Self { fd };
        source.set_nonblocking(true)?;
        Ok(source)
    }

    fn set_nonblocking(&self, on: bool) -> io::Result<()> {
        unsafe {
            let flags = libc::fcntl(self.fd, libc::F_GETFL);
            if flags < 0 {
                return Err(io::Error::last_os_error());
            }
            let flags = if on { flags | libc::O_NONBLOCK } else { flags & !libc::O_NONBLOCK };
            if libc::fcntl(self.fd, libc::F_SETFL, flags) < 0 {
                return Err(io::Error::last_os_error());
            }
        }
        Ok(())
    }

    /// Block until the fd is readable or `timeout_ms` elapses. A negative
    /// timeout waits forever. Returns whether input is ready.
    pub fn wait_readable(&self, timeout_ms: i32) -> io::Result<bool> {
        let mut pfd = libc::pollfd { fd: self.fd, events: libc::POLLIN, revents: 0 };
        loop {
            let ret = unsafe { libc::poll(&mut pfd, 1, timeout_ms) };
            if ret >= 0 {
                return Ok(ret > 0 && pfd.revents & libc::POLLIN != 0);
            }
            let err = io::Error::last_os_error();
            // Signals (notably SIGWINCH) interrupt poll; the caller checks
            // the pending flags and comes back.
            if err.kind() == io::ErrorKind::Interrupted {
                return Ok(false);
            }
            return Err(err);
        }
    }
}

#[cfg(unix)]
impl ByteSource for TtySource {
    fn try_read(&mut self) -> io::Result<Option<u8>> {
        let mut byte = 0u8;
        let n = unsafe { libc::read(self.fd, (&raw mut byte).cast(), 1) };
        if n == 1 {
            return Ok(Some(byte));
        }
        if n == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "terminal closed"));
        }
        let err = io::Error::last_os_error();
        match err.kind() {
            io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted => Ok(None),
            _ => Err(err),
        }
    }
}
