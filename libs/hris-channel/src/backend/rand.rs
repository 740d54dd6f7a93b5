use std::io::Read;

use super::{Backend, ChannelKind, OpenArgs};
use crate::error::{ChannelError, ErrorKind, Result};

/// Entropy source (`Rand://`), reads from the OS random pool.
pub struct RandBackend {
    source: std::fs::File,
}

pub fn open(_args: &OpenArgs<'_>) -> Result<Box<dyn Backend>> {
    let source = std::fs::File::open("/dev/urandom").map_err(ChannelError::from)?;
    Ok(Box::new(RandBackend { source }))
}

impl Backend for RandBackend {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Fd
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        Ok(self.source.read(buf)?)
    }

    fn write(&mut self, _buf: &[u8]) -> Result<usize> {
        Err(ChannelError::with_context(
            ErrorKind::AccessViolation,
            "the random source is read-only",
        ))
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}
