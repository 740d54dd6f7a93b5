use std::io::{Read, Write};
use std::os::unix::io::AsRawFd;
use std::time::Duration;

use super::{Backend, ChannelKind, Interest, OpenArgs};
use crate::error::{ChannelError, ErrorKind, Result};

/// `StdIn://`, `StdOut://`, `StdErr://`.
///
/// Direction violations report the dedicated error kinds so a caller can
/// tell "wrote to stdin" apart from a generic access violation.
enum Stream {
    In,
    Out,
    Err,
}

pub struct StdStreamBackend {
    stream: Stream,
}

pub fn open_stdin(_args: &OpenArgs<'_>) -> Result<Box<dyn Backend>> {
    Ok(Box::new(StdStreamBackend { stream: Stream::In }))
}

pub fn open_stdout(_args: &OpenArgs<'_>) -> Result<Box<dyn Backend>> {
    Ok(Box::new(StdStreamBackend { stream: Stream::Out }))
}

pub fn open_stderr(_args: &OpenArgs<'_>) -> Result<Box<dyn Backend>> {
    Ok(Box::new(StdStreamBackend { stream: Stream::Err }))
}

impl Backend for StdStreamBackend {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Fd
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        match self.stream {
            Stream::In => Ok(std::io::stdin().lock().read(buf)?),
            _ => Err(ChannelError::new(ErrorKind::StdoutAccess)),
        }
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        match self.stream {
            Stream::In => Err(ChannelError::new(ErrorKind::StdinAccess)),
            Stream::Out => Ok(std::io::stdout().lock().write(buf)?),
            Stream::Err => Ok(std::io::stderr().lock().write(buf)?),
        }
    }

    fn flush(&mut self) -> Result<()> {
        match self.stream {
            Stream::In => Ok(()),
            Stream::Out => Ok(std::io::stdout().lock().flush()?),
            Stream::Err => Ok(std::io::stderr().lock().flush()?),
        }
    }

    fn close(&mut self) -> Result<()> {
        // The process streams outlive any channel.
        self.flush()
    }

    fn wait_ready(&mut self, interest: Interest, timeout: Duration) -> Result<bool> {
        let fd = match self.stream {
            Stream::In => std::io::stdin().as_raw_fd(),
            Stream::Out => std::io::stdout().as_raw_fd(),
            Stream::Err => std::io::stderr().as_raw_fd(),
        };
        super::poll_fd(fd, interest, timeout)
    }
}
