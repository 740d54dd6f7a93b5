use std::ffi::CString;
use std::io::SeekFrom;
use std::os::unix::io::{FromRawFd, OwnedFd};

use memmap2::MmapMut;

use super::{Backend, ChannelKind, OpenArgs};
use crate::error::{ChannelError, ErrorKind, Result};
use crate::mode::ChannelMode;

/// Named shared-memory backend (`Shm://name:<size>`).
///
/// The region has a fixed size; read/write move an offset cursor inside
/// it. The segment is created when `CREAT` is in the mode and unlinked
/// never (peers may still be attached).
pub struct ShmBackend {
    _fd: OwnedFd,
    map: MmapMut,
    pos: usize,
    name: String,
}

const SHM_DEFAULT_SIZE: usize = 4096;

pub fn open(args: &OpenArgs<'_>) -> Result<Box<dyn Backend>> {
    let (raw_name, size_text) = match args.tail.split_once(':') {
        Some((n, s)) => (n, Some(s)),
        None => (args.tail, None),
    };
    if raw_name.is_empty() || raw_name == "/" {
        return Err(ChannelError::new(ErrorKind::BadShmName));
    }
    let name = if raw_name.starts_with('/') {
        raw_name.to_string()
    } else {
        format!("/{raw_name}")
    };
    let size: usize = match size_text.or_else(|| args.params.find("size")) {
        Some(text) => text.parse().map_err(|_| {
            ChannelError::with_context(ErrorKind::BadSize, format!("'{text}' is not a size"))
        })?,
        None => SHM_DEFAULT_SIZE,
    };
    if size == 0 {
        return Err(ChannelError::new(ErrorKind::BadSize));
    }

    let c_name = CString::new(name.clone())
        .map_err(|_| ChannelError::new(ErrorKind::BadShmName))?;
    // The region is always mapped read-write; the channel mode gates
    // what the caller may do through it.
    let mut oflag = libc::O_RDWR;
    if args.mode.contains(ChannelMode::CREAT) {
        oflag |= libc::O_CREAT;
    }
    let raw = unsafe { libc::shm_open(c_name.as_ptr(), oflag, args.permissions as libc::mode_t) };
    if raw < 0 {
        let e = ChannelError::from(std::io::Error::last_os_error());
        tracing::warn!(name, error = %e, "shm_open failed");
        return Err(e);
    }
    let fd = unsafe { OwnedFd::from_raw_fd(raw) };

    if args.mode.contains(ChannelMode::CREAT)
        && unsafe { libc::ftruncate(raw, size as libc::off_t) } != 0
    {
        return Err(ChannelError::from(std::io::Error::last_os_error()));
    }

    let map = unsafe { MmapMut::map_mut(&fd) }.map_err(ChannelError::from)?;
    if map.len() < size {
        return Err(ChannelError::with_context(
            ErrorKind::BadMmpSize,
            format!("segment holds {} bytes, {size} requested", map.len()),
        ));
    }
    tracing::debug!(name, size, "shared memory segment attached");
    Ok(Box::new(ShmBackend { _fd: fd, map, pos: 0, name }))
}

impl Backend for ShmBackend {
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
                ErrorKind::NoSpace,
                "write past the end of the shared memory segment",
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
            return Err(ChannelError::new(ErrorKind::BadSize));
        }
        self.map[offset..end].copy_from_slice(bytes);
        Ok(())
    }

    fn get_property(&self, name: &str) -> Option<String> {
        match name {
            "Name" => Some(self.name.clone()),
            "Size" => Some(self.map.len().to_string()),
            _ => None,
        }
    }
}
