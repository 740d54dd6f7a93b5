use std::io::SeekFrom;

use super::{Backend, ChannelKind, OpenArgs};
use crate::error::{ChannelError, ErrorKind, Result};

/// Counting sink (`Calc://`), the stream behind CALC serialization mode.
///
/// Stores nothing; only the write position moves. Seeking is allowed so
/// the engine's loop/auto-calc bookkeeping works unchanged against it.
pub struct CalcBackend {
    pos: u64,
    high_water: u64,
}

pub fn open(_args: &OpenArgs<'_>) -> Result<Box<dyn Backend>> {
    Ok(Box::new(CalcBackend { pos: 0, high_water: 0 }))
}

impl Backend for CalcBackend {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Generic
    }

    fn read(&mut self, _buf: &mut [u8]) -> Result<usize> {
        Err(ChannelError::with_context(
            ErrorKind::AccessViolation,
            "the calc sink is write-only",
        ))
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.pos += buf.len() as u64;
        self.high_water = self.high_water.max(self.pos);
        Ok(buf.len())
    }

    fn is_seekable(&self) -> bool {
        true
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        let target = match pos {
            SeekFrom::Start(off) => off as i64,
            SeekFrom::Current(off) => self.pos as i64 + off,
            SeekFrom::End(off) => self.high_water as i64 + off,
        };
        if target < 0 {
            return Err(ChannelError::new(ErrorKind::BadEndSeek));
        }
        self.pos = target as u64;
        Ok(self.pos)
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }

    fn patch(&mut self, _offset: u64, _bytes: &[u8]) -> Result<()> {
        // Nothing is stored, so a patch of already-counted bytes is a no-op.
        Ok(())
    }

    fn get_property(&self, name: &str) -> Option<String> {
        match name {
            "Size" => Some(self.high_water.to_string()),
            _ => None,
        }
    }
}
