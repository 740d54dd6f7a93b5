//! Mode-driven serialization engine.
//!
//! A [`Serialize`] owns a [`Channel`], a registry of format plugins and
//! the header lifecycle. User serializer functions bracket their fields
//! with `begin_type`/`end_type`; only the outermost pair performs header
//! I/O. Every operation short-circuits once an error occurred, so a
//! nested serializer unwinds with `?` without issuing further I/O.

use std::io::SeekFrom;

use hris_channel::{Channel, ChannelMode, PrintArg, ScanArg};

use crate::error::{Result, SerializeError};
use crate::format::{AllowedModes, FormatPlugin};
use crate::header::{objsize_field, Header, HeaderInfo, HEADER_MAXLEN, HEADER_PREAMBLE};
use crate::value::{SerializeType, ValueRef};

bitflags::bitflags! {
    /// Flag word accepted by [`Serialize::set_mode`]: one direction bit,
    /// an optional stream-mode bit and any of the behaviour flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ModeFlags: u32 {
        const WRITE     = 1 << 0;
        const READ      = 1 << 1;
        const CALC      = 1 << 2;
        const NORMAL    = 1 << 3;
        const FLUSH     = 1 << 4;
        const LOOP      = 1 << 5;
        const AUTOCALC  = 1 << 6;
        const NOHEADER  = 1 << 7;
        const TRANSLATE = 1 << 8;
        const INIT      = 1 << 9;
    }
}

/// Direction of the current pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// No direction selected yet.
    #[default]
    Null,
    Write,
    Read,
    Calc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamMode {
    #[default]
    Normal,
    /// Flush the channel after every top-level object.
    Flush,
    /// Seek back to the first object's offset before every top-level
    /// object, so the stream holds one object slot.
    Loop,
}

/// Indent step of the text formats, in spaces.
pub const INDENT_STEP: i32 = 2;
/// Default element count per line for wrapped scalar arrays.
pub const COLUMN_WRAP_DEFAULT: u32 = 3;

/// Engine state visible to format plugins.
///
/// Plugins drive all their I/O through this context; in Calc mode it
/// transparently substitutes the counting sink for the user channel.
pub struct SerializeCtx {
    stream: Option<Channel>,
    calc_stream: Channel,
    mode: Mode,
    stream_mode: StreamMode,
    auto_calc: bool,
    use_header: bool,
    translate: bool,
    init_mode: bool,
    nesting: i32,
    base_type: bool,
    indent: i32,
    column_wrap: u32,
    header: Header,
    error_occurred: bool,
    eof_unwind: bool,
    obj_initial_offset: u64,
    size_field_offset: Option<u64>,
    loop_offset: Option<u64>,
}

impl SerializeCtx {
    fn new() -> Result<Self> {
        let calc_stream = Channel::open("Calc://", ChannelMode::W_ONLY, 0)?;
        Ok(SerializeCtx {
            stream: None,
            calc_stream,
            mode: Mode::Null,
            stream_mode: StreamMode::Normal,
            auto_calc: false,
            use_header: true,
            translate: false,
            init_mode: false,
            nesting: 0,
            base_type: false,
            indent: 0,
            column_wrap: COLUMN_WRAP_DEFAULT,
            header: Header::new(),
            error_occurred: false,
            eof_unwind: false,
            obj_initial_offset: 0,
            size_field_offset: None,
            loop_offset: None,
        })
    }

    // ───────────────────────── plugin-facing accessors ─────────────────────────

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn is_reading(&self) -> bool {
        self.mode == Mode::Read
    }

    /// True for Write and for Calc, which replays the write path.
    pub fn is_writing(&self) -> bool {
        matches!(self.mode, Mode::Write | Mode::Calc)
    }

    pub fn stream_mode(&self) -> StreamMode {
        self.stream_mode
    }

    /// `begin_type` depth, already counting the call in progress.
    pub fn nesting_level(&self) -> i32 {
        self.nesting
    }

    /// Whether the current begin/end pair was opened as a base type.
    pub fn base_type_enabled(&self) -> bool {
        self.base_type
    }

    pub fn use_header(&self) -> bool {
        self.use_header
    }

    pub fn is_init_mode(&self) -> bool {
        self.init_mode
    }

    pub fn column_wrap(&self) -> u32 {
        self.column_wrap
    }

    pub fn indent(&self) -> i32 {
        self.indent
    }

    pub fn indent_incr(&mut self) {
        self.indent += INDENT_STEP;
    }

    pub fn indent_decr(&mut self) {
        self.indent -= INDENT_STEP;
        debug_assert!(self.indent >= 0);
    }

    /// Emit the current indentation (write direction only).
    pub fn write_indent(&mut self) -> Result<()> {
        let spaces = " ".repeat(self.indent.max(0) as usize);
        self.write_str(&spaces)
    }

    /// Store an option string into the header's `opts` field, so it is
    /// reproduced on write.
    pub fn set_header_opts(&mut self, opts: &str) {
        self.header.set_opts(opts);
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    // ───────────────────────── plugin-facing I/O ─────────────────────────

    /// The active channel: the counting sink in Calc mode, the attached
    /// stream otherwise.
    pub fn chan_mut(&mut self) -> Result<&mut Channel> {
        if self.mode == Mode::Calc {
            return Ok(&mut self.calc_stream);
        }
        self.stream.as_mut().ok_or(SerializeError::NoStream)
    }

    pub fn position(&self) -> u64 {
        if self.mode == Mode::Calc {
            return self.calc_stream.position();
        }
        self.stream.as_ref().map_or(0, Channel::position)
    }

    pub fn is_eof(&self) -> bool {
        self.stream.as_ref().is_some_and(Channel::is_eof)
    }

    pub fn printf(&mut self, format: &str, args: &[PrintArg<'_>]) -> Result<u64> {
        Ok(self.chan_mut()?.printf(format, args)?)
    }

    pub fn scanf(&mut self, format: &str, args: &mut [ScanArg<'_>]) -> Result<usize> {
        Ok(self.chan_mut()?.scanf(format, args)?)
    }

    /// Write text verbatim (no conversion parsing).
    pub fn write_str(&mut self, text: &str) -> Result<()> {
        self.write_bytes(text.as_bytes())
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        let n = self.chan_mut()?.write_block(bytes)?;
        if n != bytes.len() {
            return Err(SerializeError::Channel(hris_channel::ChannelError::new(
                hris_channel::ErrorKind::LowLevelWrite,
            )));
        }
        Ok(())
    }

    /// Read exactly `buf.len()` bytes or fail with `Eof`.
    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        let n = self.chan_mut()?.read_block(buf)?;
        if n != buf.len() {
            return Err(SerializeError::Eof);
        }
        Ok(())
    }

    pub fn getc(&mut self) -> Result<Option<u8>> {
        Ok(self.chan_mut()?.getc()?)
    }

    pub fn unget_byte(&mut self, byte: u8) -> Result<()> {
        self.chan_mut()?.unget(&[byte])?;
        Ok(())
    }

    /// Consume the next non-whitespace byte only if it equals `expected`;
    /// otherwise push it back. Used for optional separators.
    pub fn eat_punct(&mut self, expected: u8) -> Result<bool> {
        let chan = self.chan_mut()?;
        chan.skip_ws_pushback()?;
        match chan.getc()? {
            Some(b) if b == expected => Ok(true),
            Some(b) => {
                let _ = chan.unget(&[b]);
                Ok(false)
            }
            None => Ok(false),
        }
    }

    /// Write one element of a value in its textual form.
    pub fn print_elem(&mut self, value: &ValueRef<'_>, idx: usize) -> Result<()> {
        let text = value.elem_text(idx);
        self.write_str(&text)
    }

    /// Read one textual token into element `idx` of a value. The
    /// `separator`, when present, terminates the token and is consumed.
    pub fn scan_elem(
        &mut self,
        value: &mut ValueRef<'_>,
        idx: usize,
        separator: Option<u8>,
    ) -> Result<()> {
        let token = self.scan_token(value.is_float_kind(), separator)?;
        if token.is_empty() {
            return Err(if self.is_eof() {
                SerializeError::Eof
            } else {
                SerializeError::BadValue("empty numeric token".into())
            });
        }
        value.set_elem_text(idx, &token)
    }

    /// Read a numeric token; the separator is consumed with it, any
    /// other stopper is pushed back.
    pub fn scan_token(&mut self, float: bool, separator: Option<u8>) -> Result<String> {
        let chan = self.chan_mut()?;
        chan.skip_ws_pushback()?;
        let mut token = String::new();
        loop {
            let Some(b) = chan.getc()? else { break };
            let accept = b.is_ascii_digit()
                || (token.is_empty() && b == b'-')
                || (float && matches!(b, b'+' | b'-' | b'e' | b'E' | b'.'));
            if accept && Some(b) != separator {
                token.push(b as char);
                continue;
            }
            if Some(b) == separator {
                break;
            }
            let _ = chan.unget(&[b]);
            break;
        }
        Ok(token)
    }
}

struct Registered {
    plugin: Box<dyn FormatPlugin>,
}

/// The serializer.
pub struct Serialize {
    ctx: SerializeCtx,
    formats: Vec<Registered>,
    active: Option<usize>,
}

impl Serialize {
    /// An engine with an empty format registry; register plugins before
    /// use, or start from the facade crate's built-in set.
    pub fn new() -> Result<Self> {
        Ok(Serialize { ctx: SerializeCtx::new()?, formats: Vec::new(), active: None })
    }

    // ───────────────────────── registry ─────────────────────────

    /// Register a format. A later registration with an already-known
    /// name overrides the earlier one.
    pub fn register_format(&mut self, plugin: Box<dyn FormatPlugin>) {
        tracing::debug!(format = plugin.name(), "format registered");
        self.formats.push(Registered { plugin });
    }

    fn find_format(&self, name: &str) -> Option<usize> {
        self.formats.iter().rposition(|r| r.plugin.name() == name)
    }

    pub fn is_format_defined(&self, name: &str) -> bool {
        self.find_format(name).is_some()
    }

    /// Select the active format and apply its option string.
    pub fn set_format(&mut self, name: &str, opts: Option<&str>) -> Result<()> {
        let idx = self
            .find_format(name)
            .ok_or_else(|| SerializeError::UnknownFormat(name.to_string()))?;
        self.active = Some(idx);
        let plugin = &mut self.formats[idx].plugin;
        plugin.options_clear();
        plugin.options_set(&mut self.ctx, opts)?;
        Ok(())
    }

    pub fn format_name(&self) -> Option<&'static str> {
        self.active.map(|idx| self.formats[idx].plugin.name())
    }

    pub fn format_get_property(&self, name: &str) -> Option<String> {
        let idx = self.active?;
        self.formats[idx].plugin.options_get_property(name)
    }

    pub fn format_set_property(&mut self, name: &str, value: &str) -> bool {
        match self.active {
            Some(idx) => self.formats[idx].plugin.options_set_property(name, value),
            None => false,
        }
    }

    // ───────────────────────── stream & mode ─────────────────────────

    pub fn set_stream(&mut self, channel: Channel) {
        self.ctx.stream = Some(channel);
        self.ctx.loop_offset = None;
    }

    pub fn take_stream(&mut self) -> Option<Channel> {
        self.ctx.stream.take()
    }

    pub fn stream_mut(&mut self) -> Option<&mut Channel> {
        self.ctx.stream.as_mut()
    }

    /// Decode a mode flag word: exactly one direction bit, at most one
    /// stream-mode bit, plus behaviour flags.
    pub fn set_mode(&mut self, flags: ModeFlags) -> Result<()> {
        let directions = flags & (ModeFlags::WRITE | ModeFlags::READ | ModeFlags::CALC);
        self.ctx.mode = if directions == ModeFlags::WRITE {
            Mode::Write
        } else if directions == ModeFlags::READ {
            Mode::Read
        } else if directions == ModeFlags::CALC {
            Mode::Calc
        } else if directions.is_empty() {
            return Err(SerializeError::BadMode("no direction flag"));
        } else {
            return Err(SerializeError::BadMode("more than one direction flag"));
        };

        let stream_modes = flags & (ModeFlags::NORMAL | ModeFlags::FLUSH | ModeFlags::LOOP);
        self.ctx.stream_mode = if stream_modes == ModeFlags::FLUSH {
            StreamMode::Flush
        } else if stream_modes == ModeFlags::LOOP {
            StreamMode::Loop
        } else if stream_modes.is_empty() || stream_modes == ModeFlags::NORMAL {
            StreamMode::Normal
        } else {
            return Err(SerializeError::BadMode("more than one stream-mode flag"));
        };

        self.ctx.auto_calc = flags.contains(ModeFlags::AUTOCALC);
        self.ctx.use_header = !flags.contains(ModeFlags::NOHEADER);
        self.ctx.translate = flags.contains(ModeFlags::TRANSLATE);
        self.ctx.init_mode = flags.contains(ModeFlags::INIT);

        if self.ctx.stream_mode == StreamMode::Loop {
            if let Some(stream) = &self.ctx.stream {
                if !stream.is_seekable() {
                    return Err(SerializeError::BadMode("loop mode needs a seekable stream"));
                }
            }
        }
        Ok(())
    }

    pub fn mode(&self) -> Mode {
        self.ctx.mode
    }

    pub fn stream_mode(&self) -> StreamMode {
        self.ctx.stream_mode
    }

    pub fn set_column_wrap(&mut self, wrap: u32) {
        self.ctx.column_wrap = wrap;
    }

    pub fn column_wrap(&self) -> u32 {
        self.ctx.column_wrap
    }

    // ───────────────────────── error state ─────────────────────────

    pub fn is_error_occurred(&self) -> bool {
        self.ctx.error_occurred
    }

    /// Whether the pending error came from a short read rather than bad
    /// input.
    pub fn error_was_eof(&self) -> bool {
        self.ctx.eof_unwind
    }

    pub fn is_eof(&self) -> bool {
        self.ctx.is_eof()
    }

    /// Drop the pending error and rebalance the nesting so the engine
    /// can start a fresh top-level object.
    pub fn clean_error(&mut self) {
        self.ctx.error_occurred = false;
        self.ctx.eof_unwind = false;
        self.ctx.nesting = 0;
        self.ctx.indent = 0;
        self.ctx.base_type = false;
        if let Some(stream) = &mut self.ctx.stream {
            stream.clear_error();
        }
    }

    fn enter(&self) -> Result<()> {
        if self.ctx.error_occurred {
            return Err(SerializeError::Pending);
        }
        Ok(())
    }

    fn absorb<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            self.ctx.error_occurred = true;
            if matches!(e, SerializeError::Eof) || self.ctx.is_eof() {
                self.ctx.eof_unwind = true;
            }
            tracing::error!(error = %e, "serialization aborted");
        }
        result
    }

    // ───────────────────────── sizes & header info ─────────────────────────

    pub fn header_size(&self) -> u64 {
        self.ctx.header.header_size()
    }

    pub fn payload_size(&self) -> u64 {
        self.ctx.header.obj_size()
    }

    pub fn total_size(&self) -> u64 {
        self.header_size() + self.payload_size()
    }

    pub fn header(&self) -> &Header {
        &self.ctx.header
    }

    /// Render the current header as it would appear on the stream.
    pub fn header_string(&self) -> Result<String> {
        self.ctx.header.render()
    }

    /// Parse the next header without consuming it: the exact bytes read
    /// go back into the unget buffer, so the stream position is
    /// unchanged.
    pub fn peek_header(&mut self) -> Result<HeaderInfo> {
        self.enter()?;
        let result = self.peek_header_inner();
        self.absorb(result)
    }

    fn peek_header_inner(&mut self) -> Result<HeaderInfo> {
        if !self.ctx.use_header {
            return Err(SerializeError::BadMode("peek_header needs headers enabled"));
        }
        let chan = self.ctx.chan_mut()?;
        let mut raw = Vec::new();
        loop {
            match chan.getc()? {
                Some(b) => {
                    raw.push(b);
                    if b == b'\n' || raw.len() >= HEADER_MAXLEN {
                        break;
                    }
                }
                None => break,
            }
        }
        if raw.is_empty() {
            return Err(SerializeError::Eof);
        }
        chan.unget(&raw)?;

        let text = std::str::from_utf8(&raw)
            .map_err(|_| SerializeError::BadHeader)?
            .trim_end_matches('\n');
        let mut header = Header::new();
        header.parse_line(text)?;
        HeaderInfo::from_header(&header).ok_or(SerializeError::BadHeader)
    }

    // ───────────────────────── composite operations ─────────────────────────

    pub fn begin_type(&mut self, name: &str, type_tag: &str) -> Result<()> {
        self.enter()?;
        let result = self.begin_type_inner(name, type_tag, false);
        self.absorb(result)
    }

    /// Base-type variant: text formats flatten the fields into the
    /// enclosing scope.
    pub fn begin_base_type(&mut self, name: &str, type_tag: &str) -> Result<()> {
        self.enter()?;
        let result = self.begin_type_inner(name, type_tag, true);
        self.absorb(result)
    }

    fn begin_type_inner(&mut self, name: &str, type_tag: &str, base: bool) -> Result<()> {
        let idx = self.require_format()?;
        if self.ctx.nesting == 0 {
            self.check_modes(idx)?;
            if !self.ctx.translate {
                if self.ctx.use_header {
                    self.first_begin_ops(name, type_tag)?;
                } else if self.ctx.stream_mode == StreamMode::Loop {
                    self.seek_loop_offset()?;
                }
                self.ctx.obj_initial_offset = self.ctx.position();
            }
        }
        self.ctx.nesting += 1;
        self.ctx.base_type = base;
        // The header read may have switched the active format.
        let idx = self.require_format()?;
        let plugin = &mut self.formats[idx].plugin;
        let result = if base {
            plugin.begin_base_type(&mut self.ctx, name, type_tag)
        } else {
            plugin.begin_type(&mut self.ctx, name, type_tag)
        };
        self.ctx.base_type = false;
        result
    }

    pub fn end_type(&mut self) -> Result<()> {
        self.enter()?;
        let result = self.end_type_inner(false);
        self.absorb(result)
    }

    pub fn end_base_type(&mut self) -> Result<()> {
        self.enter()?;
        let result = self.end_type_inner(true);
        self.absorb(result)
    }

    fn end_type_inner(&mut self, base: bool) -> Result<()> {
        let idx = self.require_format()?;
        self.ctx.base_type = base;
        let plugin = &mut self.formats[idx].plugin;
        let result = if base {
            plugin.end_base_type(&mut self.ctx)
        } else {
            plugin.end_type(&mut self.ctx)
        };
        self.ctx.base_type = false;
        result?;

        self.ctx.nesting -= 1;
        debug_assert!(self.ctx.nesting >= 0);
        if self.ctx.nesting == 0 && !self.ctx.translate {
            let final_offset = self.ctx.position();
            if self.ctx.header.obj_size() == 0 {
                self.ctx
                    .header
                    .set_obj_size(final_offset.saturating_sub(self.ctx.obj_initial_offset));
            }
            if self.ctx.use_header
                && self.ctx.auto_calc
                && self.ctx.mode == Mode::Write
            {
                self.auto_calc_patch();
            }
            if self.ctx.is_writing() && self.ctx.stream_mode == StreamMode::Flush {
                self.ctx.chan_mut()?.flush()?;
            }
        }
        Ok(())
    }

    pub fn begin_array(&mut self, ty: SerializeType, name: &str, len: usize) -> Result<()> {
        self.enter()?;
        let result = self.begin_array_inner(ty, name, len);
        self.absorb(result)
    }

    fn begin_array_inner(&mut self, ty: SerializeType, name: &str, len: usize) -> Result<()> {
        let idx = self.require_format()?;
        self.formats[idx].plugin.begin_array(&mut self.ctx, ty, name, len)
    }

    pub fn end_array(&mut self, ty: SerializeType, name: &str, len: usize) -> Result<()> {
        self.enter()?;
        let result = self.end_array_inner(ty, name, len);
        self.absorb(result)
    }

    fn end_array_inner(&mut self, ty: SerializeType, name: &str, len: usize) -> Result<()> {
        let idx = self.require_format()?;
        self.formats[idx].plugin.end_array(&mut self.ctx, ty, name, len)
    }

    pub fn begin_struct_array(
        &mut self,
        name: &str,
        element_type: &str,
        len: usize,
    ) -> Result<()> {
        self.enter()?;
        let idx = match self.require_format() {
            Ok(idx) => idx,
            Err(e) => return self.absorb(Err(e)),
        };
        let result =
            self.formats[idx].plugin.begin_struct_array(&mut self.ctx, name, element_type, len);
        self.absorb(result)
    }

    pub fn begin_struct_array_separator(
        &mut self,
        name: &str,
        position: usize,
        len: usize,
    ) -> Result<()> {
        self.enter()?;
        let result = self.struct_array_separator(name, position, len, true);
        self.absorb(result)
    }

    pub fn end_struct_array_separator(
        &mut self,
        name: &str,
        position: usize,
        len: usize,
    ) -> Result<()> {
        self.enter()?;
        let result = self.struct_array_separator(name, position, len, false);
        self.absorb(result)
    }

    fn struct_array_separator(
        &mut self,
        name: &str,
        position: usize,
        len: usize,
        begin: bool,
    ) -> Result<()> {
        if position >= len {
            return Err(SerializeError::BadValue(format!(
                "struct array position {position} out of {len}"
            )));
        }
        let idx = self.require_format()?;
        let plugin = &mut self.formats[idx].plugin;
        if begin {
            plugin.begin_struct_array_separator(&mut self.ctx, name, position, len)
        } else {
            plugin.end_struct_array_separator(&mut self.ctx, name, position, len)
        }
    }

    pub fn end_struct_array(&mut self) -> Result<()> {
        self.enter()?;
        let idx = match self.require_format() {
            Ok(idx) => idx,
            Err(e) => return self.absorb(Err(e)),
        };
        let result = self.formats[idx].plugin.end_struct_array(&mut self.ctx);
        self.absorb(result)
    }

    /// Serialize one leaf. Array-typed values are implicitly bracketed
    /// with `begin_array`/`end_array`.
    pub fn serialize(&mut self, name: &str, value: &mut ValueRef<'_>) -> Result<()> {
        self.enter()?;
        let result = self.serialize_inner(name, value);
        self.absorb(result)
    }

    fn serialize_inner(&mut self, name: &str, value: &mut ValueRef<'_>) -> Result<()> {
        let ty = value.ty();
        let len = value.count();
        if ty.is_array() {
            self.begin_array_inner(ty, name, len)?;
        }
        let idx = self.require_format()?;
        self.formats[idx].plugin.serialize(&mut self.ctx, name, value)?;
        if ty.is_array() {
            self.end_array_inner(ty, name, len)?;
        }
        Ok(())
    }

    // ───────────────────────── header lifecycle ─────────────────────────

    fn require_format(&self) -> Result<usize> {
        self.active.ok_or(SerializeError::NoFormat)
    }

    fn check_modes(&mut self, idx: usize) -> Result<()> {
        let allowed = self.formats[idx].plugin.allowed_modes();
        let name = self.formats[idx].plugin.name();
        if self.ctx.mode == Mode::Null {
            return Err(SerializeError::BadMode("set_mode was not called"));
        }
        if self.ctx.mode == Mode::Calc && !allowed.contains(AllowedModes::CALC) {
            return Err(SerializeError::ModeNotAllowed {
                format: name.to_string(),
                what: "calc mode",
            });
        }
        if self.ctx.translate && !allowed.contains(AllowedModes::TRANSLATE) {
            return Err(SerializeError::ModeNotAllowed {
                format: name.to_string(),
                what: "translate mode",
            });
        }
        Ok(())
    }

    fn seek_loop_offset(&mut self) -> Result<()> {
        let position = self.ctx.position();
        let offset = *self.ctx.loop_offset.get_or_insert(position);
        if offset != position {
            self.ctx.chan_mut()?.seek(SeekFrom::Start(offset))?;
        }
        Ok(())
    }

    fn first_begin_ops(&mut self, name: &str, type_tag: &str) -> Result<()> {
        self.ctx.header.set_obj_size(0);
        self.ctx.header.set_header_size(0);
        if self.ctx.stream_mode == StreamMode::Loop {
            self.seek_loop_offset()?;
        }
        match self.ctx.mode {
            Mode::Write | Mode::Calc => self.write_header(name, type_tag),
            Mode::Read => self.read_header(name, type_tag),
            Mode::Null => Err(SerializeError::BadMode("set_mode was not called")),
        }
    }

    fn write_header(&mut self, name: &str, type_tag: &str) -> Result<()> {
        let format_name = self.format_name().ok_or(SerializeError::NoFormat)?;
        let header_start = self.ctx.position();
        self.ctx.header.major = crate::header::HEADER_MAJOR_DEFAULT;
        self.ctx.header.minor = crate::header::HEADER_MINOR_DEFAULT;
        self.ctx
            .header
            .set_info(Some(type_tag), Some(name), None, Some(format_name), 0);

        self.ctx.write_str(&format!(
            "{HEADER_PREAMBLE}{}.{} ",
            self.ctx.header.major, self.ctx.header.minor
        ))?;
        self.ctx
            .write_str(&format!("type = '{type_tag}' name = {name} objSize = "))?;
        self.ctx.size_field_offset = Some(self.ctx.position());
        self.ctx.write_str(&objsize_field(0))?;
        self.ctx.write_str(&format!(" format = {format_name} "))?;
        if let Some(opts) = self.ctx.header.opts().filter(|o| !o.is_empty()) {
            let opts = opts.to_string();
            self.ctx.write_str(&format!("opts = '{opts}'"))?;
        }
        self.ctx.write_str("\n")?;
        self.ctx
            .header
            .set_header_size(self.ctx.position() - header_start);
        Ok(())
    }

    fn read_header(&mut self, name: &str, type_tag: &str) -> Result<()> {
        let header_start = self.ctx.position();
        let line = {
            let chan = self.ctx.chan_mut()?;
            chan.gets(HEADER_MAXLEN)?
        };
        if line.is_empty() {
            if self.ctx.is_eof() {
                return Err(SerializeError::Eof);
            }
            tracing::error!("empty serialization header");
            return Err(SerializeError::BadHeader);
        }
        self.ctx.header.reset();
        self.ctx.header.parse_line(&line)?;

        let found = self.ctx.header.type_tag().unwrap_or("").to_string();
        if found != type_tag {
            return Err(SerializeError::HeaderMismatch {
                expected: type_tag.to_string(),
                found,
            });
        }
        if let Some(read_name) = self.ctx.header.name() {
            if read_name != name {
                tracing::warn!(
                    expected = name,
                    found = read_name,
                    "instance name differs from the header"
                );
            }
        }

        let stream_format = self.ctx.header.format().unwrap_or("").to_string();
        let opts = self.ctx.header.opts().map(str::to_string);
        match self.find_format(&stream_format) {
            Some(idx) => {
                self.active = Some(idx);
                let plugin = &mut self.formats[idx].plugin;
                plugin.options_clear();
                plugin.options_set(&mut self.ctx, opts.as_deref())?;
            }
            None => match self.active {
                Some(idx) => {
                    tracing::warn!(
                        stream_format = %stream_format,
                        current = self.formats[idx].plugin.name(),
                        "format from the header is unknown, keeping the current one"
                    );
                    let plugin = &mut self.formats[idx].plugin;
                    plugin.options_clear();
                    plugin.options_set(&mut self.ctx, opts.as_deref())?;
                }
                None => return Err(SerializeError::UnknownFormat(stream_format)),
            },
        }
        self.ctx
            .header
            .set_header_size(self.ctx.position() - header_start);
        // The body size gets recomputed at end_type from the positions.
        self.ctx.header.set_obj_size(0);
        Ok(())
    }

    fn auto_calc_patch(&mut self) {
        let Some(offset) = self.ctx.size_field_offset else {
            tracing::error!("auto-calc is set but no size field was written");
            return;
        };
        let text = objsize_field(self.ctx.header.obj_size());
        let patched = match self.ctx.chan_mut() {
            Ok(chan) => chan.overwrite_at(offset, text.as_bytes()),
            Err(e) => {
                tracing::error!(error = %e, "auto-calc has no channel to patch");
                return;
            }
        };
        if let Err(e) = patched {
            tracing::error!(
                error = %e,
                "auto-calc could not patch the header: stream is neither \
                 buffered nor memory based, the size field stays zero"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal format: scalars as space-terminated tokens, no framing.
    struct TokenFormat;

    impl FormatPlugin for TokenFormat {
        fn name(&self) -> &'static str {
            "Token"
        }

        fn begin_type(
            &mut self,
            _ctx: &mut SerializeCtx,
            _name: &str,
            _type_tag: &str,
        ) -> Result<()> {
            Ok(())
        }

        fn serialize(
            &mut self,
            ctx: &mut SerializeCtx,
            _name: &str,
            value: &mut ValueRef<'_>,
        ) -> Result<()> {
            for idx in 0..value.count() {
                if ctx.is_reading() {
                    ctx.scan_elem(value, idx, None)?;
                } else {
                    ctx.print_elem(value, idx)?;
                    ctx.write_str(" ")?;
                }
            }
            Ok(())
        }

        fn end_type(&mut self, ctx: &mut SerializeCtx) -> Result<()> {
            if !ctx.is_reading() {
                ctx.write_str("\n")?;
            }
            Ok(())
        }
    }

    fn engine_with_stream() -> Serialize {
        let mut s = Serialize::new().unwrap();
        s.register_format(Box::new(TokenFormat));
        s.set_format("Token", None).unwrap();
        s.set_stream(Channel::open("Mem://1024", ChannelMode::RW, 0).unwrap());
        s
    }

    fn write_pair(s: &mut Serialize, a: &mut i32, b: &mut i32) -> Result<()> {
        s.begin_type("pair", "Pair")?;
        s.serialize("a", &mut ValueRef::I32(a))?;
        s.serialize("b", &mut ValueRef::I32(b))?;
        s.end_type()
    }

    #[test]
    fn set_mode_validates_flag_combinations() {
        let mut s = Serialize::new().unwrap();
        assert!(matches!(
            s.set_mode(ModeFlags::AUTOCALC),
            Err(SerializeError::BadMode(_))
        ));
        assert!(matches!(
            s.set_mode(ModeFlags::WRITE | ModeFlags::READ),
            Err(SerializeError::BadMode(_))
        ));
        assert!(matches!(
            s.set_mode(ModeFlags::WRITE | ModeFlags::FLUSH | ModeFlags::LOOP),
            Err(SerializeError::BadMode(_))
        ));
        s.set_mode(ModeFlags::WRITE | ModeFlags::FLUSH | ModeFlags::NOHEADER)
            .unwrap();
        assert_eq!(s.mode(), Mode::Write);
        assert_eq!(s.stream_mode(), StreamMode::Flush);
    }

    #[test]
    fn header_lifecycle_only_at_the_outermost_pair() {
        let mut s = engine_with_stream();
        s.set_mode(ModeFlags::WRITE).unwrap();

        let (mut a, mut b) = (1i32, 2i32);
        s.begin_type("outer", "Outer").unwrap();
        let header_size = s.header_size();
        assert!(header_size > 0);
        // A nested begin does not grow the header.
        s.begin_type("inner", "Inner").unwrap();
        s.serialize("a", &mut ValueRef::I32(&mut a)).unwrap();
        s.end_type().unwrap();
        s.serialize("b", &mut ValueRef::I32(&mut b)).unwrap();
        s.end_type().unwrap();
        assert_eq!(s.header_size(), header_size);
        assert_eq!(s.total_size(), header_size + s.payload_size());
    }

    #[test]
    fn round_trip_through_the_token_format() {
        let mut s = engine_with_stream();
        s.set_mode(ModeFlags::WRITE).unwrap();
        let (mut a, mut b) = (-123i32, 456i32);
        write_pair(&mut s, &mut a, &mut b).unwrap();

        let mut ch = s.take_stream().unwrap();
        ch.rewind().unwrap();
        s.set_stream(ch);
        s.set_mode(ModeFlags::READ).unwrap();
        let (mut a2, mut b2) = (0i32, 0i32);
        write_pair(&mut s, &mut a2, &mut b2).unwrap();
        assert_eq!((a2, b2), (-123, 456));
    }

    #[test]
    fn no_header_mode_emits_only_the_body() {
        let mut s = engine_with_stream();
        s.set_mode(ModeFlags::WRITE | ModeFlags::NOHEADER).unwrap();
        let (mut a, mut b) = (7i32, 8i32);
        write_pair(&mut s, &mut a, &mut b).unwrap();
        let ch = s.stream_mut().unwrap();
        assert_eq!(ch.contents().unwrap(), b"7 8 \n");
    }

    #[test]
    fn unknown_format_is_rejected() {
        let mut s = Serialize::new().unwrap();
        assert!(matches!(
            s.set_format("Nope", None),
            Err(SerializeError::UnknownFormat(_))
        ));
    }

    #[test]
    fn peek_header_is_idempotent_and_nonconsuming() {
        let mut s = engine_with_stream();
        s.set_mode(ModeFlags::WRITE).unwrap();
        let (mut a, mut b) = (10i32, 20i32);
        write_pair(&mut s, &mut a, &mut b).unwrap();

        let mut ch = s.take_stream().unwrap();
        ch.rewind().unwrap();
        let pos = ch.position();
        s.set_stream(ch);
        s.set_mode(ModeFlags::READ).unwrap();

        let info = s.peek_header().unwrap();
        assert_eq!(info.type_tag, "Pair");
        assert_eq!(info.format, "Token");
        assert_eq!(s.stream_mut().unwrap().position(), pos);

        let (mut a2, mut b2) = (0i32, 0i32);
        write_pair(&mut s, &mut a2, &mut b2).unwrap();
        assert_eq!((a2, b2), (10, 20));
    }

    #[test]
    fn translate_mode_is_refused_by_plugins() {
        let mut s = engine_with_stream();
        s.set_mode(ModeFlags::WRITE | ModeFlags::TRANSLATE).unwrap();
        // Translate skips header work entirely, but the capability check
        // still runs at the first begin.
        let err = s.begin_type("pair", "Pair").unwrap_err();
        match err {
            SerializeError::Pending => panic!("expected a direct error"),
            SerializeError::ModeNotAllowed { what, .. } => {
                assert_eq!(what, "translate mode");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
