use std::io::SeekFrom;
use std::time::Duration;

use crate::backend::{self, Backend, ChannelKind, Interest, MemBuffer, OpenArgs};
use crate::buffer::{UngetStack, WriteBuffer};
use crate::error::{ChannelError, ErrorKind, Result};
use crate::mode::ChannelMode;
use crate::refvalue::RefValueList;

/// Default suspension timeout for readiness waits, in microseconds.
pub const DEFAULT_TIMEOUT_USEC: u64 = 1000;

enum State {
    Open(Box<dyn Backend>),
    Closed,
}

/// Polymorphic byte stream over a pluggable backend.
///
/// A `Channel` is constructed already open — there is no reachable
/// uninitialised state — and moves to `Closed` on [`Channel::close`],
/// after which every primitive fails with `BadFd`. Reads first drain the
/// unget stack, writes go through an optional growable buffer, and the
/// sticky error / eof flags survive until [`Channel::clear_error`] or a
/// seek.
pub struct Channel {
    state: State,
    kind: ChannelKind,
    mode: ChannelMode,
    pub(crate) wbuf: WriteBuffer,
    pub(crate) unget: UngetStack,
    position: u64,
    rd_total: u64,
    wr_total: u64,
    rd_since_last_write: u64,
    rd_since_last_unget: u64,
    error: ErrorKind,
    os_error: Option<i32>,
    eof: bool,
    read_timeout_us: u64,
    write_timeout_us: u64,
}

impl Channel {
    /// Open a channel from an info string of the form `<scheme>://<tail>`.
    ///
    /// ```no_run
    /// # use hris_channel::{Channel, ChannelMode, permissions};
    /// let ch = Channel::open("File:///tmp/out.bin",
    ///     ChannelMode::W_ONLY | ChannelMode::CREAT | ChannelMode::TRUNC,
    ///     permissions::DEFAULT).unwrap();
    /// ```
    pub fn open(info: &str, mode: ChannelMode, permissions: u32) -> Result<Self> {
        mode.validate()?;
        let (scheme, tail) = backend::split_info_string(info)?;
        let params = RefValueList::new();
        let args = OpenArgs { tail, mode, permissions, params: &params };
        let be = backend::open_backend(scheme, &args)?;
        tracing::debug!(scheme, tail, ?mode, "channel opened");
        Ok(Self::from_backend(be, mode))
    }

    /// Open from the key-value form:
    /// `{ stream: <scheme>, mode: <mode-string>, <backend keys> }`.
    pub fn open_from_string(open_string: &str, permissions: u32) -> Result<Self> {
        let body = open_string.trim();
        let body = body
            .strip_prefix('{')
            .and_then(|s| s.strip_suffix('}'))
            .ok_or_else(|| {
                ChannelError::with_context(
                    ErrorKind::BadInfoString,
                    "key-value open string must be enclosed in braces",
                )
            })?;
        let mut params = RefValueList::new();
        params.parse_pairs(body);
        let scheme = params
            .find("stream")
            .ok_or_else(|| {
                ChannelError::with_context(ErrorKind::BadOpenArg, "missing 'stream' key")
            })?
            .to_string();
        let mode = match params.find("mode") {
            Some(text) => ChannelMode::parse(text)?,
            None => ChannelMode::R_ONLY,
        };
        let args = OpenArgs { tail: "", mode, permissions, params: &params };
        let be = backend::open_backend(&scheme, &args)?;
        tracing::debug!(scheme = %scheme, ?mode, "channel opened from key-value string");
        Ok(Self::from_backend(be, mode))
    }

    /// Wrap a memory buffer directly (read-write).
    pub fn from_mem_buffer(buffer: MemBuffer) -> Self {
        let be = crate::backend::mem_backend_from(buffer);
        Self::from_backend(be, ChannelMode::RW)
    }

    /// Wrap an already-open file handle (stdio-style).
    pub fn from_file(file: std::fs::File, mode: ChannelMode) -> Self {
        let be: Box<dyn Backend> = Box::new(crate::backend::ansi_wrap(file));
        Self::from_backend(be, mode)
    }

    /// Wrap an already-connected TCP stream.
    pub fn from_tcp_stream(stream: std::net::TcpStream) -> Self {
        let be: Box<dyn Backend> = Box::new(crate::backend::tcp_wrap(stream));
        Self::from_backend(be, ChannelMode::RW)
    }

    fn from_backend(be: Box<dyn Backend>, mode: ChannelMode) -> Self {
        let kind = be.kind();
        Channel {
            state: State::Open(be),
            kind,
            mode,
            wbuf: WriteBuffer::new(),
            unget: UngetStack::new(),
            position: 0,
            rd_total: 0,
            wr_total: 0,
            rd_since_last_write: 0,
            rd_since_last_unget: 0,
            error: ErrorKind::None,
            os_error: None,
            eof: false,
            read_timeout_us: DEFAULT_TIMEOUT_USEC,
            write_timeout_us: DEFAULT_TIMEOUT_USEC,
        }
    }

    // ───────────────────────── state & bookkeeping ─────────────────────────

    pub fn kind(&self) -> ChannelKind {
        self.kind
    }

    pub fn mode(&self) -> ChannelMode {
        self.mode
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, State::Open(_))
    }

    pub fn is_eof(&self) -> bool {
        self.eof
    }

    /// Absolute stream position. Unget and re-reads do not move it.
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn written_bytes(&self) -> u64 {
        self.wr_total
    }

    pub fn read_bytes(&self) -> u64 {
        self.rd_total
    }

    /// Bytes served straight from the unget stack since the last push.
    pub fn read_bytes_since_unget(&self) -> u64 {
        self.rd_since_last_unget
    }

    pub fn error_kind(&self) -> ErrorKind {
        self.error
    }

    pub fn os_error(&self) -> Option<i32> {
        self.os_error
    }

    pub fn error_description(&self) -> &'static str {
        self.error.description()
    }

    pub fn clear_error(&mut self) {
        self.error = ErrorKind::None;
        self.os_error = None;
    }

    pub fn set_read_timeout_usec(&mut self, usecs: u64) {
        self.read_timeout_us = usecs;
    }

    pub fn set_write_timeout_usec(&mut self, usecs: u64) {
        self.write_timeout_us = usecs;
    }

    pub fn uses_write_buffering(&self) -> bool {
        self.wbuf.enabled()
    }

    pub fn write_buffered_bytes(&self) -> usize {
        self.wbuf.len()
    }

    /// Enable or disable write buffering; `auto_resize` permits growth
    /// past the configured capacity.
    pub fn set_write_buffering(&mut self, enabled: bool, auto_resize: bool) {
        self.wbuf.set_enabled(enabled, auto_resize);
    }

    pub fn set_write_buffer_capacity(&mut self, capacity: usize) {
        self.wbuf.set_capacity(capacity, false);
    }

    pub fn set_unget_capacity(&mut self, capacity: usize) {
        self.unget.set_capacity(capacity);
    }

    fn record(&mut self, e: ChannelError) -> ChannelError {
        self.error = e.kind();
        self.os_error = e.os_error();
        e
    }

    fn backend_mut(&mut self) -> Result<&mut Box<dyn Backend>> {
        match &mut self.state {
            State::Open(be) => Ok(be),
            State::Closed => Err(ChannelError::with_context(
                ErrorKind::BadFd,
                "channel is closed",
            )),
        }
    }

    // ───────────────────────── read path ─────────────────────────

    /// Read up to `buf.len()` bytes. Unget bytes are drained first; a
    /// total of 0 for a non-empty request means end of stream (sticky).
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if !self.mode.is_readable() {
            return Err(self.record(ChannelError::with_context(
                ErrorKind::AccessViolation,
                "channel is write-only",
            )));
        }
        if buf.is_empty() {
            return Ok(0);
        }
        if !self.wbuf.is_empty() {
            self.flush()?;
        }

        let from_unget = self.unget.pop_into(buf);
        let mut from_backend = 0usize;
        if from_unget == buf.len() {
            self.rd_since_last_unget += from_unget as u64;
        } else {
            let be = self.backend_mut()?;
            match be.read(&mut buf[from_unget..]) {
                Ok(n) => {
                    from_backend = n;
                    if n == 0 {
                        self.eof = true;
                    }
                }
                Err(e) => {
                    if from_unget == 0 {
                        return Err(self.record(e));
                    }
                    // Partial result from the unget stack; surface it and
                    // let the next call hit the backend error again.
                }
            }
            self.position += from_backend as u64;
            self.rd_total += from_backend as u64;
        }
        let total = from_unget + from_backend;
        self.rd_since_last_write += total as u64;
        Ok(total)
    }

    /// Read exactly `buf.len()` bytes unless eof or an error cuts the
    /// stream short; returns the byte count actually read.
    pub fn read_block(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut done = 0;
        while done < buf.len() {
            let n = self.read(&mut buf[done..])?;
            if n == 0 {
                break;
            }
            done += n;
        }
        Ok(done)
    }

    /// Read a single byte; `None` at end of stream.
    pub fn getc(&mut self) -> Result<Option<u8>> {
        let mut byte = [0u8; 1];
        match self.read(&mut byte)? {
            0 => Ok(None),
            _ => Ok(Some(byte[0])),
        }
    }

    /// Read a line of at most `max` bytes. The `\n` terminator is
    /// consumed but not stored.
    pub fn gets(&mut self, max: usize) -> Result<String> {
        let mut out = Vec::new();
        while out.len() < max {
            match self.getc()? {
                Some(b'\n') | None => break,
                Some(b) => out.push(b),
            }
        }
        Ok(String::from_utf8_lossy(&out).into_owned())
    }

    /// Non-destructive read of up to `buf.len()` bytes. A backend that
    /// would block yields 0 without an error.
    pub fn peek(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = match self.read(buf) {
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Again => {
                self.clear_error();
                return Ok(0);
            }
            Err(e) => return Err(e),
        };
        if n > 0 {
            self.unget(&buf[..n])?;
        }
        Ok(n)
    }

    // ───────────────────────── unget ─────────────────────────

    /// Push back bytes just read, LIFO. At most
    /// `read-bytes-since-last-write` bytes may be pushed back; exceeding
    /// that window fails without touching the sticky error, exceeding
    /// the stack capacity fails with a sticky `TooManyUnget`.
    pub fn unget(&mut self, bytes: &[u8]) -> Result<usize> {
        if !self.mode.is_readable() {
            return Err(self.record(ChannelError::new(ErrorKind::AccessViolation)));
        }
        if bytes.is_empty() {
            return Ok(0);
        }
        if bytes.len() as u64 > self.rd_since_last_write {
            tracing::warn!(
                pushed = bytes.len(),
                window = self.rd_since_last_write,
                "unget longer than the readable window"
            );
            return Err(ChannelError::new(ErrorKind::TooManyUnget));
        }
        if !self.unget.push(bytes) {
            return Err(self.record(ChannelError::new(ErrorKind::TooManyUnget)));
        }
        self.rd_since_last_unget = 0;
        self.rd_since_last_write -= bytes.len() as u64;
        Ok(bytes.len())
    }

    pub(crate) fn unget_byte(&mut self, byte: u8) -> Result<usize> {
        self.unget(&[byte])
    }

    // ───────────────────────── write path ─────────────────────────

    /// Write `buf`, through the write buffer when buffering is enabled.
    /// Pending unget bytes are discarded first, rewinding the stream by
    /// their length where the backend permits.
    pub fn write(&mut self, buf: &[u8]) -> Result<usize> {
        if !self.mode.is_writable() {
            return Err(self.record(ChannelError::with_context(
                ErrorKind::AccessViolation,
                "channel is read-only",
            )));
        }
        if buf.is_empty() {
            return Ok(0);
        }

        if !self.unget.is_empty() {
            let back = self.unget.len() as i64;
            let be = self.backend_mut()?;
            match be.seek(SeekFrom::Current(-back)) {
                Ok(pos) => self.position = pos,
                Err(e) => {
                    tracing::warn!(
                        bytes = back,
                        error = %e,
                        "dropping unget bytes: backend cannot rewind before write"
                    );
                }
            }
            self.unget.clear();
        }
        self.rd_since_last_write = 0;

        if !self.wbuf.enabled() {
            let be = self.backend_mut()?;
            let n = match be.write(buf) {
                Ok(n) => n,
                Err(e) => return Err(self.record(e)),
            };
            self.position += n as u64;
            self.wr_total += n as u64;
            return Ok(n);
        }

        if buf.len() > self.wbuf.room() {
            if self.wbuf.can_grow() {
                self.wbuf.grow_for(buf.len());
            } else {
                self.flush()?;
                if buf.len() > self.wbuf.room() {
                    // Chunk larger than the whole buffer: write through.
                    let n = self.write_through(buf)?;
                    self.position += n as u64;
                    self.wr_total += n as u64;
                    return Ok(n);
                }
            }
        }
        self.wbuf.append(buf);
        self.position += buf.len() as u64;
        self.wr_total += buf.len() as u64;
        Ok(buf.len())
    }

    fn write_through(&mut self, buf: &[u8]) -> Result<usize> {
        let mut done = 0;
        while done < buf.len() {
            let be = self.backend_mut()?;
            let n = match be.write(&buf[done..]) {
                Ok(0) => {
                    return Err(self.record(ChannelError::new(ErrorKind::LowLevelWrite)));
                }
                Ok(n) => n,
                Err(e) => return Err(self.record(e)),
            };
            done += n;
        }
        Ok(done)
    }

    /// Write all of `buf`, retrying partial backend writes.
    pub fn write_block(&mut self, buf: &[u8]) -> Result<usize> {
        let mut done = 0;
        while done < buf.len() {
            let n = self.write(&buf[done..])?;
            if n == 0 {
                break;
            }
            done += n;
        }
        Ok(done)
    }

    pub fn putc(&mut self, byte: u8) -> Result<()> {
        self.write_block(&[byte])?;
        Ok(())
    }

    pub fn puts(&mut self, text: &str) -> Result<usize> {
        self.write_block(text.as_bytes())
    }

    /// Drain the write buffer into the backend; the cursor is reset only
    /// when every byte went out.
    pub fn flush(&mut self) -> Result<()> {
        if self.wbuf.is_empty() {
            if let State::Open(be) = &mut self.state {
                let result = be.flush();
                if let Err(e) = result {
                    return Err(self.record(e));
                }
            }
            return Ok(());
        }
        let pending = self.wbuf.take_pending();
        let mut done = 0;
        while done < pending.len() {
            let be = match self.backend_mut() {
                Ok(be) => be,
                Err(e) => {
                    self.wbuf.restore_pending(&pending[done..]);
                    return Err(self.record(e));
                }
            };
            match be.write(&pending[done..]) {
                Ok(0) => {
                    self.wbuf.restore_pending(&pending[done..]);
                    return Err(self.record(ChannelError::new(ErrorKind::LowLevelWrite)));
                }
                Ok(n) => done += n,
                Err(e) => {
                    self.wbuf.restore_pending(&pending[done..]);
                    return Err(self.record(e));
                }
            }
        }
        let result = self.backend_mut()?.flush();
        result.map_err(|e| self.record(e))
    }

    // ───────────────────────── seek / tell ─────────────────────────

    /// Seek; flushes buffered writes, discards pending unget bytes and
    /// clears the sticky eof flag on success.
    pub fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        if !self.wbuf.is_empty() {
            self.flush()?;
        }
        self.unget.clear();
        let be = self.backend_mut()?;
        let new_pos = match be.seek(pos) {
            Ok(p) => p,
            Err(e) => return Err(self.record(e)),
        };
        self.position = new_pos;
        self.eof = false;
        Ok(new_pos)
    }

    pub fn tell(&self) -> u64 {
        self.position
    }

    pub fn rewind(&mut self) -> Result<()> {
        self.seek(SeekFrom::Start(0))?;
        Ok(())
    }

    pub fn is_seekable(&self) -> bool {
        match &self.state {
            State::Open(be) => be.is_seekable(),
            State::Closed => false,
        }
    }

    // ───────────────────────── readiness ─────────────────────────

    pub fn is_read_data_available(&mut self) -> Result<bool> {
        if !self.unget.is_empty() {
            return Ok(true);
        }
        let timeout = Duration::from_micros(self.read_timeout_us);
        let be = self.backend_mut()?;
        be.wait_ready(Interest::Read, timeout)
    }

    pub fn is_write_possible(&mut self) -> Result<bool> {
        let timeout = Duration::from_micros(self.write_timeout_us);
        let be = self.backend_mut()?;
        be.wait_ready(Interest::Write, timeout)
    }

    // ───────────────────────── properties & contents ─────────────────────────

    pub fn get_property(&self, name: &str) -> Option<String> {
        match &self.state {
            State::Open(be) => be.get_property(name),
            State::Closed => None,
        }
    }

    pub fn set_property(&mut self, name: &str, value: &str) -> Result<bool> {
        let be = self.backend_mut()?;
        be.set_property(name, value)
    }

    /// Written contents of a memory-backed channel, flushing pending
    /// buffered writes first.
    pub fn contents(&mut self) -> Option<&[u8]> {
        if !self.wbuf.is_empty() && self.flush().is_err() {
            return None;
        }
        match &self.state {
            State::Open(be) => be.contents(),
            State::Closed => None,
        }
    }

    /// Overwrite already-written bytes at an absolute offset without
    /// moving the stream position. Works inside the still-buffered tail
    /// of the write buffer, or in a memory-backed backend.
    pub fn overwrite_at(&mut self, offset: u64, bytes: &[u8]) -> Result<()> {
        let buffered_start = self.position - self.wbuf.len() as u64;
        if !self.wbuf.is_empty() && offset >= buffered_start {
            let start = (offset - buffered_start) as usize;
            let end = start + bytes.len();
            if end > self.wbuf.len() {
                return Err(ChannelError::with_context(
                    ErrorKind::BadSize,
                    "patch range crosses the end of the write buffer",
                ));
            }
            self.wbuf.as_mut_slice()[start..end].copy_from_slice(bytes);
            return Ok(());
        }
        let be = self.backend_mut()?;
        be.patch(offset, bytes)
    }

    // ───────────────────────── lifecycle ─────────────────────────

    /// Close the channel. Pending writes are flushed; the backend
    /// resource is released unless the `NOTCLOSE` mode bit is set.
    pub fn close(&mut self) -> Result<()> {
        if !matches!(self.state, State::Open(_)) {
            return Ok(());
        }
        let flush_result = self.flush();
        if let State::Open(mut be) = std::mem::replace(&mut self.state, State::Closed) {
            if !self.mode.contains(ChannelMode::NOTCLOSE) {
                be.close().map_err(|e| self.record(e))?;
            }
        }
        flush_result
    }

    /// Return to a pristine closed state: counters, sticky error, eof
    /// and buffers are all reset.
    pub fn clear(&mut self) {
        if self.close().is_err() {
            tracing::warn!(error = %self.error, "close failed during clear");
        }
        self.wbuf = WriteBuffer::new();
        self.unget = UngetStack::new();
        self.position = 0;
        self.rd_total = 0;
        self.wr_total = 0;
        self.rd_since_last_write = 0;
        self.rd_since_last_unget = 0;
        self.error = ErrorKind::None;
        self.os_error = None;
        self.eof = false;
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        if self.close().is_err() {
            tracing::debug!(error = %self.error, "close failed in drop");
        }
    }
}
