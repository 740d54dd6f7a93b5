use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::os::unix::io::AsRawFd;
use std::time::Duration;

use super::{Backend, ChannelKind, Interest, OpenArgs};
use crate::error::{ChannelError, ErrorKind, Result};
use crate::mode::ChannelMode;

/// Buffered file backend (`AnsiFILE:///path`), the stdio-handle analogue.
///
/// Differs from `File://` by carrying its own write buffering below the
/// channel, the way a `FILE*` does, and by tagging the channel as
/// `AnsiFile`. Also reachable through [`crate::Channel::from_file`] to
/// wrap a handle the caller already opened.
pub struct AnsiFileBackend {
    inner: BufWriter<std::fs::File>,
}

pub fn open(args: &OpenArgs<'_>) -> Result<Box<dyn Backend>> {
    let path = args.tail;
    if path.is_empty() {
        return Err(ChannelError::with_context(
            ErrorKind::BadInfoString,
            "AnsiFILE:// needs a path",
        ));
    }
    let mut opts = std::fs::OpenOptions::new();
    opts.read(args.mode.is_readable());
    opts.write(args.mode.is_writable());
    opts.create(args.mode.contains(ChannelMode::CREAT));
    opts.truncate(args.mode.contains(ChannelMode::TRUNC));
    opts.append(args.mode.contains(ChannelMode::APPEND));
    let file = opts.open(path).map_err(ChannelError::from)?;
    Ok(Box::new(AnsiFileBackend::wrap(file)))
}

impl AnsiFileBackend {
    pub fn wrap(file: std::fs::File) -> Self {
        AnsiFileBackend { inner: BufWriter::new(file) }
    }
}

impl Backend for AnsiFileBackend {
    fn kind(&self) -> ChannelKind {
        ChannelKind::AnsiFile
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.inner.flush().map_err(ChannelError::from)?;
        Ok(self.inner.get_mut().read(buf)?)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        Ok(self.inner.write(buf)?)
    }

    fn flush(&mut self) -> Result<()> {
        Ok(self.inner.flush()?)
    }

    fn is_seekable(&self) -> bool {
        true
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        Ok(self.inner.seek(pos)?)
    }

    fn close(&mut self) -> Result<()> {
        Ok(self.inner.flush()?)
    }

    fn wait_ready(&mut self, interest: Interest, timeout: Duration) -> Result<bool> {
        super::poll_fd(self.inner.get_ref().as_raw_fd(), interest, timeout)
    }
}
