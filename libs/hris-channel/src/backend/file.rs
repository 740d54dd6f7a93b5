use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;
use std::time::Duration;

use super::{Backend, ChannelKind, Interest, OpenArgs};
use crate::error::{ChannelError, ErrorKind, Result};
use crate::mode::ChannelMode;

/// Regular file backend (`File:///path/to/file`).
pub struct FileBackend {
    file: std::fs::File,
}

pub fn open(args: &OpenArgs<'_>) -> Result<Box<dyn Backend>> {
    let path = if args.tail.is_empty() {
        args.params.find("name").ok_or_else(|| {
            ChannelError::with_context(ErrorKind::BadInfoString, "File:// needs a path")
        })?
    } else {
        args.tail
    };

    let mut opts = OpenOptions::new();
    opts.read(args.mode.is_readable());
    opts.write(args.mode.is_writable());
    opts.create(args.mode.contains(ChannelMode::CREAT));
    opts.truncate(args.mode.contains(ChannelMode::TRUNC));
    opts.append(args.mode.contains(ChannelMode::APPEND));
    opts.mode(args.permissions);

    let file = opts.open(path).map_err(|e| {
        let e = ChannelError::from(e);
        tracing::warn!(path, error = %e, "file open failed");
        e
    })?;
    Ok(Box::new(FileBackend { file }))
}

impl Backend for FileBackend {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Fd
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        Ok(self.file.read(buf)?)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        Ok(self.file.write(buf)?)
    }

    fn flush(&mut self) -> Result<()> {
        Ok(self.file.flush()?)
    }

    fn is_seekable(&self) -> bool {
        true
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        Ok(self.file.seek(pos)?)
    }

    fn close(&mut self) -> Result<()> {
        Ok(self.file.flush()?)
    }

    fn wait_ready(&mut self, interest: Interest, timeout: Duration) -> Result<bool> {
        super::poll_fd(self.file.as_raw_fd(), interest, timeout)
    }

    fn get_property(&self, name: &str) -> Option<String> {
        match name {
            "Fd" => Some(self.file.as_raw_fd().to_string()),
            _ => None,
        }
    }
}
