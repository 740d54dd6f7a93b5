use std::io::SeekFrom;

use super::{Backend, ChannelKind, OpenArgs};
use crate::error::{ChannelError, ErrorKind, Result};

/// Storage behind a memory channel.
///
/// `Owned` grows on demand; `Fixed` is a caller-sized region whose
/// capacity is a hard limit, the moral equivalent of wrapping a foreign
/// buffer.
#[derive(Debug)]
pub enum MemBuffer {
    Owned(Vec<u8>),
    Fixed(Box<[u8]>),
}

/// In-memory backend (`Mem://<initial-capacity>`).
///
/// `len` tracks the high-water mark of written data; reads stop there,
/// not at the capacity.
pub struct MemBackend {
    buf: Vec<u8>,
    fixed_capacity: Option<usize>,
    pos: usize,
    len: usize,
}

pub fn open(args: &OpenArgs<'_>) -> Result<Box<dyn Backend>> {
    let size_text = if args.tail.is_empty() {
        args.params.find("size").unwrap_or("0")
    } else {
        args.tail
    };
    let size: usize = size_text.parse().map_err(|_| {
        ChannelError::with_context(
            ErrorKind::BadSize,
            format!("'{size_text}' is not a valid memory size"),
        )
    })?;
    Ok(Box::new(MemBackend {
        buf: Vec::with_capacity(size),
        fixed_capacity: None,
        pos: 0,
        len: 0,
    }))
}

impl MemBackend {
    /// Wrap a caller-provided buffer, contents preserved and readable.
    pub fn from_buffer(buffer: MemBuffer) -> Self {
        match buffer {
            MemBuffer::Owned(buf) => {
                let len = buf.len();
                MemBackend { buf, fixed_capacity: None, pos: 0, len }
            }
            MemBuffer::Fixed(buf) => {
                let cap = buf.len();
                let buf = buf.into_vec();
                let len = buf.len();
                MemBackend { buf, fixed_capacity: Some(cap), pos: 0, len }
            }
        }
    }

}

impl Backend for MemBackend {
    fn kind(&self) -> ChannelKind {
        ChannelKind::MemPtr
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let avail = self.len.saturating_sub(self.pos);
        let n = avail.min(buf.len());
        buf[..n].copy_from_slice(&self.buf[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        let end = self.pos + buf.len();
        if let Some(cap) = self.fixed_capacity {
            if end > cap {
                return Err(ChannelError::with_context(
                    ErrorKind::NoSpace,
                    format!("fixed memory buffer of {cap} bytes is full"),
                ));
            }
        }
        if end > self.buf.len() {
            self.buf.resize(end, 0);
        }
        self.buf[self.pos..end].copy_from_slice(buf);
        self.pos = end;
        self.len = self.len.max(end);
        Ok(buf.len())
    }

    fn is_seekable(&self) -> bool {
        true
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        let target = match pos {
            SeekFrom::Start(off) => off as i64,
            SeekFrom::Current(off) => self.pos as i64 + off,
            SeekFrom::End(off) => self.len as i64 + off,
        };
        if target < 0 {
            return Err(ChannelError::new(ErrorKind::BadEndSeek));
        }
        self.pos = target as usize;
        Ok(self.pos as u64)
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }

    fn contents(&self) -> Option<&[u8]> {
        Some(&self.buf[..self.len])
    }

    fn patch(&mut self, offset: u64, bytes: &[u8]) -> Result<()> {
        let offset = offset as usize;
        let end = offset + bytes.len();
        if end > self.len {
            return Err(ChannelError::with_context(
                ErrorKind::BadSize,
                "patch range beyond written data",
            ));
        }
        self.buf[offset..end].copy_from_slice(bytes);
        Ok(())
    }

    fn get_property(&self, name: &str) -> Option<String> {
        match name {
            "Size" => Some(self.len.to_string()),
            "Capacity" => self.fixed_capacity.map(|c| c.to_string()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::ChannelMode;
    use crate::refvalue::RefValueList;

    fn mem() -> MemBackend {
        MemBackend { buf: Vec::new(), fixed_capacity: None, pos: 0, len: 0 }
    }

    #[test]
    fn write_then_rewind_then_read_round_trips() {
        let mut m = mem();
        m.write(b"hello").unwrap();
        m.seek(SeekFrom::Start(0)).unwrap();
        let mut out = [0u8; 8];
        assert_eq!(m.read(&mut out).unwrap(), 5);
        assert_eq!(&out[..5], b"hello");
        assert_eq!(m.read(&mut out).unwrap(), 0);
    }

    #[test]
    fn fixed_buffer_refuses_overflow() {
        let mut m = MemBackend::from_buffer(MemBuffer::Fixed(vec![0u8; 4].into_boxed_slice()));
        m.seek(SeekFrom::Start(0)).unwrap();
        assert_eq!(m.write(b"abcd").unwrap(), 4);
        assert_eq!(m.write(b"e").unwrap_err().kind(), ErrorKind::NoSpace);
    }

    #[test]
    fn patch_overwrites_in_place() {
        let mut m = mem();
        m.write(b"0123456789").unwrap();
        m.patch(2, b"xy").unwrap();
        assert_eq!(m.contents().unwrap(), b"01xy456789");
        assert!(m.patch(9, b"zz").is_err());
    }

    #[test]
    fn open_parses_size_from_tail() {
        let params = RefValueList::new();
        let args = OpenArgs {
            tail: "64",
            mode: ChannelMode::RW,
            permissions: 0,
            params: &params,
        };
        assert!(open(&args).is_ok());
        let bad = OpenArgs { tail: "x", ..args };
        match open(&bad) {
            Err(e) => assert_eq!(e.kind(), ErrorKind::BadSize),
            Ok(_) => panic!("expected BadSize error"),
        }
    }
}
