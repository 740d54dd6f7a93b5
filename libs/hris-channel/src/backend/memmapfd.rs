use std::io::SeekFrom;
use std::os::unix::io::{BorrowedFd, RawFd};

use memmap2::MmapMut;

use super::{Backend, ChannelKind, OpenArgs};
use crate::error::{ChannelError, ErrorKind, Result};

/// Mapping over an open descriptor (`MemMapFd://<fd>:<size>`).
///
/// Fixed capacity: the mapping never grows, writing past it fails with
/// `BadMmpSize`.
pub struct MemMapFdBackend {
    map: MmapMut,
    pos: usize,
}

pub fn open(args: &OpenArgs<'_>) -> Result<Box<dyn Backend>> {
    let (fd_text, size_text) = match args.tail.split_once(':') {
        Some(pair) => pair,
        None => (args.tail, args.params.find("size").unwrap_or("")),
    };
    let fd: RawFd = fd_text.parse().map_err(|_| {
        ChannelError::with_context(
            ErrorKind::BadOpenArg,
            format!("'{fd_text}' is not a descriptor"),
        )
    })?;
    let size: usize = size_text.parse().map_err(|_| {
        ChannelError::with_context(
            ErrorKind::BadMmpSize,
            format!("'{size_text}' is not a mapping size"),
        )
    })?;
    if size == 0 {
        return Err(ChannelError::new(ErrorKind::BadMmpSize));
    }
    let borrowed = unsafe { BorrowedFd::borrow_raw(fd) };
    let map = unsafe { MmapMut::map_mut(&borrowed) }.map_err(|e| {
        let e = ChannelError::from(e);
        tracing::warn!(fd, size, error = %e, "mmap failed");
        e
    })?;
    if map.len() < size {
        return Err(ChannelError::with_context(
            ErrorKind::BadMmpSize,
            format!("descriptor maps {} bytes, {size} requested", map.len()),
        ));
    }
    Ok(Box::new(MemMapFdBackend { map, pos: 0 }))
}

impl Backend for MemMapFdBackend {
    fn kind(&self) -> ChannelKind {
        ChannelKind::MemPtr
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let avail = self.map.len().saturating_sub(self.pos);
        let n = avail.min(buf.len());
        buf[..n].copy_from_slice(&self.map[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        let end = self.pos + buf.len();
        if end > self.map.len() {
            return Err(ChannelError::with_context(
                ErrorKind::BadMmpSize,
                "write past the end of the mapping",
            ));
        }
        self.map[self.pos..end].copy_from_slice(buf);
        self.pos = end;
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<()> {
        self.map.flush().map_err(ChannelError::from)
    }

    fn is_seekable(&self) -> bool {
        true
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        let target = match pos {
            SeekFrom::Start(off) => off as i64,
            SeekFrom::Current(off) => self.pos as i64 + off,
            SeekFrom::End(off) => self.map.len() as i64 + off,
        };
        if target < 0 || target as usize > self.map.len() {
            return Err(ChannelError::new(ErrorKind::BadEndSeek));
        }
        self.pos = target as usize;
        Ok(self.pos as u64)
    }

    fn close(&mut self) -> Result<()> {
        self.map.flush().map_err(ChannelError::from)
    }

    fn contents(&self) -> Option<&[u8]> {
        Some(&self.map[..])
    }

    fn patch(&mut self, offset: u64, bytes: &[u8]) -> Result<()> {
        let offset = offset as usize;
        let end = offset + bytes.len();
        if end > self.map.len() {
            return Err(ChannelError::new(ErrorKind::BadMmpSize));
        }
        self.map[offset..end].copy_from_slice(bytes);
        Ok(())
    }

    fn get_property(&self, name: &str) -> Option<String> {
        match name {
            "Size" => Some(self.map.len().to_string()),
            _ => None,
        }
    }
}
