use std::io::SeekFrom;
use std::os::unix::io::RawFd;
use std::time::Duration;

use super::{Backend, ChannelKind, Interest, OpenArgs};
use crate::error::{ChannelError, ErrorKind, Result};
use crate::mode::ChannelMode;

/// Wait for readiness on a raw descriptor via `poll(2)`.
///
/// Returns `Ok(false)` on timeout; an `EINTR` restarts the wait.
pub fn poll_fd(fd: RawFd, interest: Interest, timeout: Duration) -> Result<bool> {
    let events = match interest {
        Interest::Read => libc::POLLIN,
        Interest::Write => libc::POLLOUT,
    };
    let mut pfd = libc::pollfd { fd, events, revents: 0 };
    let timeout_ms = timeout.as_millis().min(i32::MAX as u128) as i32;
    loop {
        let rc = unsafe { libc::poll(&mut pfd, 1, timeout_ms) };
        if rc < 0 {
            let errno = std::io::Error::last_os_error().raw_os_error().unwrap_or(0);
            if errno == libc::EINTR {
                continue;
            }
            return Err(ChannelError::from(std::io::Error::from_raw_os_error(errno)));
        }
        return Ok(rc > 0);
    }
}

fn last_error() -> ChannelError {
    ChannelError::from(std::io::Error::last_os_error())
}

/// Raw file descriptor backend (`Fd://<number>`).
///
/// The descriptor is foreign by default; `close()` actually closes it
/// only when the channel was opened with the `CLOSE` bit.
pub struct FdBackend {
    fd: RawFd,
    close_fd: bool,
    seekable: bool,
}

pub fn open(args: &OpenArgs<'_>) -> Result<Box<dyn Backend>> {
    let text = if args.tail.is_empty() {
        args.params.find("fd").unwrap_or("")
    } else {
        args.tail
    };
    let fd: RawFd = text.parse().map_err(|_| {
        ChannelError::with_context(ErrorKind::BadOpenArg, format!("'{text}' is not a descriptor"))
    })?;
    if fd < 0 {
        return Err(ChannelError::new(ErrorKind::BadFd));
    }
    Ok(Box::new(FdBackend::wrap(fd, args.mode.contains(ChannelMode::CLOSE))))
}

impl FdBackend {
    pub fn wrap(fd: RawFd, close_fd: bool) -> Self {
        let seekable = unsafe { libc::lseek(fd, 0, libc::SEEK_CUR) } != -1;
        FdBackend { fd, close_fd, seekable }
    }
}

impl Backend for FdBackend {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Fd
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        loop {
            let n = unsafe { libc::read(self.fd, buf.as_mut_ptr().cast(), buf.len()) };
            if n >= 0 {
                return Ok(n as usize);
            }
            let err = last_error();
            if err.kind() != ErrorKind::Interrupted {
                return Err(err);
            }
        }
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        loop {
            let n = unsafe { libc::write(self.fd, buf.as_ptr().cast(), buf.len()) };
            if n >= 0 {
                return Ok(n as usize);
            }
            let err = last_error();
            if err.kind() != ErrorKind::Interrupted {
                return Err(err);
            }
        }
    }

    fn is_seekable(&self) -> bool {
        self.seekable
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        let (whence, offset) = match pos {
            SeekFrom::Start(off) => (libc::SEEK_SET, off as i64),
            SeekFrom::Current(off) => (libc::SEEK_CUR, off),
            SeekFrom::End(off) => (libc::SEEK_END, off),
        };
        let rc = unsafe { libc::lseek(self.fd, offset, whence) };
        if rc < 0 {
            return Err(last_error());
        }
        Ok(rc as u64)
    }

    fn close(&mut self) -> Result<()> {
        if self.close_fd && self.fd >= 0 {
            let rc = unsafe { libc::close(self.fd) };
            self.fd = -1;
            if rc != 0 {
                return Err(last_error());
            }
        }
        Ok(())
    }

    fn wait_ready(&mut self, interest: Interest, timeout: Duration) -> Result<bool> {
        poll_fd(self.fd, interest, timeout)
    }

    fn get_property(&self, name: &str) -> Option<String> {
        match name {
            "Fd" => Some(self.fd.to_string()),
            _ => None,
        }
    }
}
