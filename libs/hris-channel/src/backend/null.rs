use super::{Backend, ChannelKind, OpenArgs};
use crate::error::Result;

/// Bit bucket (`Null://`): writes succeed and vanish, reads are at eof.
pub struct NullBackend;

pub fn open(_args: &OpenArgs<'_>) -> Result<Box<dyn Backend>> {
    Ok(Box::new(NullBackend))
}

impl Backend for NullBackend {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Generic
    }

    fn read(&mut self, _buf: &mut [u8]) -> Result<usize> {
        Ok(0)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        Ok(buf.len())
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}
