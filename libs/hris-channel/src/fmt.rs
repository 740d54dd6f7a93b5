//! Formatted channel I/O.
//!
//! A typed rendition of the C `printf`/`scanf` pair: the format string
//! keeps the familiar conversions (`%d %u %f %lf %s %qs %S %@` …) while
//! the variadic arguments become the [`PrintArg`] / [`ScanArg`] enums, so
//! every width and signedness is checked where the call is made.
//!
//! Scanning follows C semantics: whitespace in the format matches any
//! run of whitespace in the input (including none), literal characters
//! must match after whitespace skipping, and the first mismatched byte
//! is pushed back into the unget buffer. A conversion immediately
//! followed by a literal treats that literal as its terminator and
//! consumes it together with the token.

use crate::channel::Channel;
use crate::error::{ChannelError, ErrorKind, Result};

/// Callback for the `%@` print conversion; returns bytes written.
pub type PrintFn<'a> = dyn Fn(&mut Channel) -> Result<i64> + 'a;
/// Callback for the `%@` scan conversion; returns bytes read.
pub type ScanFn<'a> = dyn FnMut(&mut Channel) -> Result<i64> + 'a;

/// Typed argument for [`Channel::printf`].
pub enum PrintArg<'a> {
    /// `%c`
    Char(u8),
    /// `%hd`
    I16(i16),
    /// `%hu`
    U16(u16),
    /// `%d`
    I32(i32),
    /// `%u`
    U32(u32),
    /// `%ld` / `%lld`
    I64(i64),
    /// `%lu` / `%llu`
    U64(u64),
    /// `%f`
    F32(f32),
    /// `%lf` / `%Lf`
    F64(f64),
    /// `%s`
    Str(&'a str),
    /// `%S` — printable ASCII with `\xNN` hexification
    EscapedStr(&'a str),
    /// `%qc`
    QuotedChar(u8),
    /// `%qs` / `%*qs`
    QuotedStr(&'a str),
    /// `%p`
    Ptr(usize),
    /// `%@`
    Call(&'a PrintFn<'a>),
}

/// Typed argument for [`Channel::scanf`].
pub enum ScanArg<'a> {
    Char(&'a mut u8),
    I16(&'a mut i16),
    U16(&'a mut u16),
    I32(&'a mut i32),
    U32(&'a mut u32),
    I64(&'a mut i64),
    U64(&'a mut u64),
    F32(&'a mut f32),
    F64(&'a mut f64),
    Str(&'a mut String),
    EscapedStr(&'a mut String),
    QuotedChar(&'a mut u8),
    QuotedStr(&'a mut String),
    /// `%*qs`: quoted string with an explicit length bound.
    QuotedStrMax(usize, &'a mut String),
    Ptr(&'a mut usize),
    Call(&'a mut ScanFn<'a>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Conv {
    Char,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
    Str,
    EscapedStr,
    QuotedChar,
    QuotedStr,
    QuotedStrMax,
    SkipStr,
    Ptr,
    Call,
    Percent,
}

/// Parse one conversion after '%'. Returns the conversion and how many
/// format chars it consumed.
fn parse_conv(rest: &[char]) -> Result<(Conv, usize)> {
    let bad = |ctx: String| ChannelError::with_context(ErrorKind::IncorrectFormat, ctx);
    match rest.first() {
        Some('%') => Ok((Conv::Percent, 1)),
        Some('c') => Ok((Conv::Char, 1)),
        Some('d') => Ok((Conv::I32, 1)),
        Some('u') => Ok((Conv::U32, 1)),
        Some('f') => Ok((Conv::F32, 1)),
        Some('s') => Ok((Conv::Str, 1)),
        Some('S') => Ok((Conv::EscapedStr, 1)),
        Some('p') => Ok((Conv::Ptr, 1)),
        Some('@') => Ok((Conv::Call, 1)),
        Some('h') => match rest.get(1) {
            Some('d') => Ok((Conv::I16, 2)),
            Some('u') => Ok((Conv::U16, 2)),
            other => Err(bad(format!("%h{other:?} is not a conversion"))),
        },
        Some('l') => match rest.get(1) {
            Some('d') => Ok((Conv::I64, 2)),
            Some('u') => Ok((Conv::U64, 2)),
            Some('f') => Ok((Conv::F64, 2)),
            Some('l') => match rest.get(2) {
                Some('d') => Ok((Conv::I64, 3)),
                Some('u') => Ok((Conv::U64, 3)),
                other => Err(bad(format!("%ll{other:?} is not a conversion"))),
            },
            other => Err(bad(format!("%l{other:?} is not a conversion"))),
        },
        Some('L') => match rest.get(1) {
            Some('f') | Some('F') => Ok((Conv::F64, 2)),
            other => Err(bad(format!("%L{other:?} is not a conversion"))),
        },
        Some('q') => match rest.get(1) {
            Some('c') => Ok((Conv::QuotedChar, 2)),
            Some('s') => Ok((Conv::QuotedStr, 2)),
            other => Err(bad(format!("%q{other:?} is not a conversion"))),
        },
        Some('*') => match (rest.get(1), rest.get(2)) {
            (Some('q'), Some('s')) => Ok((Conv::QuotedStrMax, 3)),
            (Some('s'), _) => Ok((Conv::SkipStr, 2)),
            _ => Err(bad("%* supports only %*s and %*qs".into())),
        },
        other => Err(bad(format!("%{other:?} is not a conversion"))),
    }
}

fn is_space(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\r' | b'\n' | 0x0b)
}

/// Escape one byte for `%qc`/`%qs` output.
fn push_quoted_byte(out: &mut String, b: u8, quote: u8) {
    match b {
        b'\\' => out.push_str("\\\\"),
        b'\n' => out.push_str("\\n"),
        b'\t' => out.push_str("\\t"),
        b'\r' => out.push_str("\\r"),
        _ if b == quote => {
            out.push('\\');
            out.push(quote as char);
        }
        0x20..=0x7e => out.push(b as char),
        _ => out.push_str(&format!("\\x{b:02x}")),
    }
}

/// Shortest round-trip float text; integral values keep a bare integer
/// form, which every text format here accepts.
fn format_f64(v: f64) -> String {
    if v.is_finite() && v == v.trunc() && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{v}")
    }
}

fn format_f32(v: f32) -> String {
    if v.is_finite() && v == v.trunc() && v.abs() < 1e7 {
        format!("{}", v as i32)
    } else {
        format!("{v}")
    }
}

impl Channel {
    // ───────────────────────── printing ─────────────────────────

    /// Formatted write; returns bytes written.
    pub fn printf(&mut self, format: &str, args: &[PrintArg<'_>]) -> Result<u64> {
        let chars: Vec<char> = format.chars().collect();
        let mut out = String::new();
        let mut written: u64 = 0;
        let mut next_arg = 0usize;
        let mut idx = 0usize;

        macro_rules! arg {
            () => {{
                let a = args.get(next_arg).ok_or_else(|| {
                    ChannelError::with_context(
                        ErrorKind::IncorrectFormat,
                        "format expects more arguments than were passed",
                    )
                })?;
                next_arg += 1;
                a
            }};
        }

        while idx < chars.len() {
            let c = chars[idx];
            if c != '%' {
                out.push(c);
                idx += 1;
                continue;
            }
            let (conv, used) = parse_conv(&chars[idx + 1..])?;
            idx += 1 + used;
            match (conv, if conv == Conv::Percent { None } else { Some(arg!()) }) {
                (Conv::Percent, _) => out.push('%'),
                (Conv::Char, Some(PrintArg::Char(v))) => out.push(*v as char),
                (Conv::I16, Some(PrintArg::I16(v))) => out.push_str(&v.to_string()),
                (Conv::U16, Some(PrintArg::U16(v))) => out.push_str(&v.to_string()),
                (Conv::I32, Some(PrintArg::I32(v))) => out.push_str(&v.to_string()),
                (Conv::U32, Some(PrintArg::U32(v))) => out.push_str(&v.to_string()),
                (Conv::I64, Some(PrintArg::I64(v))) => out.push_str(&v.to_string()),
                (Conv::U64, Some(PrintArg::U64(v))) => out.push_str(&v.to_string()),
                (Conv::F32, Some(PrintArg::F32(v))) => out.push_str(&format_f32(*v)),
                (Conv::F64, Some(PrintArg::F64(v))) => out.push_str(&format_f64(*v)),
                (Conv::Str, Some(PrintArg::Str(v))) => out.push_str(v),
                (Conv::EscapedStr, Some(PrintArg::EscapedStr(v))) => {
                    push_escaped(&mut out, v);
                }
                (Conv::QuotedChar, Some(PrintArg::QuotedChar(v))) => {
                    out.push('\'');
                    push_quoted_byte(&mut out, *v, b'\'');
                    out.push('\'');
                }
                (Conv::QuotedStr | Conv::QuotedStrMax, Some(PrintArg::QuotedStr(v))) => {
                    out.push('"');
                    for b in v.bytes() {
                        push_quoted_byte(&mut out, b, b'"');
                    }
                    out.push('"');
                }
                (Conv::Ptr, Some(PrintArg::Ptr(v))) => out.push_str(&format!("{v:#x}")),
                (Conv::Call, Some(PrintArg::Call(callback))) => {
                    written += self.write_block(out.as_bytes())? as u64;
                    out.clear();
                    match callback(self) {
                        Ok(n) if n >= 0 => written += n as u64,
                        _ => {
                            return Err(ChannelError::new(ErrorKind::BadPrintfCallback));
                        }
                    }
                }
                _ => {
                    return Err(ChannelError::with_context(
                        ErrorKind::IncorrectFormat,
                        "argument type does not match its conversion",
                    ));
                }
            }
        }
        written += self.write_block(out.as_bytes())? as u64;
        Ok(written)
    }

    /// `%S` as an explicit method: printable ASCII verbatim, everything
    /// else hexified as `\xNN`.
    pub fn write_escaped_str(&mut self, text: &str) -> Result<u64> {
        let mut out = String::new();
        push_escaped(&mut out, text);
        Ok(self.write_block(out.as_bytes())? as u64)
    }

    /// `%qs` as an explicit method.
    pub fn write_quoted_str(&mut self, text: &str) -> Result<u64> {
        self.printf("%qs", &[PrintArg::QuotedStr(text)])
    }

    /// `%qc` as an explicit method.
    pub fn write_quoted_char(&mut self, c: u8) -> Result<u64> {
        self.printf("%qc", &[PrintArg::QuotedChar(c)])
    }

    // ───────────────────────── scanning ─────────────────────────

    /// Formatted read; returns the number of assigned conversions.
    pub fn scanf(&mut self, format: &str, args: &mut [ScanArg<'_>]) -> Result<usize> {
        let chars: Vec<char> = format.chars().collect();
        let mut items = 0usize;
        let mut next_arg = 0usize;
        let mut idx = 0usize;

        while idx < chars.len() {
            if self.is_eof() || self.error_kind() != ErrorKind::None {
                break;
            }
            let c = chars[idx];
            if c.is_whitespace() {
                idx += 1;
                self.skip_ws_pushback()?;
                continue;
            }
            if c != '%' {
                idx += 1;
                self.skip_ws_pushback()?;
                match self.getc()? {
                    Some(b) if b as char == c => {}
                    Some(b) => {
                        tracing::debug!(
                            expected = %c,
                            got = b,
                            "scanf literal mismatch, pushing byte back"
                        );
                        let _ = self.unget_byte(b);
                        break;
                    }
                    None => break,
                }
                continue;
            }

            let (conv, used) = parse_conv(&chars[idx + 1..])?;
            idx += 1 + used;

            // The literal right after a numeric/string conversion acts as
            // its terminator and is consumed with the token.
            let separator = match conv {
                Conv::I16 | Conv::U16 | Conv::I32 | Conv::U32 | Conv::I64 | Conv::U64
                | Conv::F32 | Conv::F64 | Conv::Str | Conv::SkipStr => {
                    match chars.get(idx) {
                        Some(&sc) if sc != '%' => {
                            idx += 1;
                            Some(sc as u8)
                        }
                        _ => None,
                    }
                }
                _ => None,
            };
            let at_end = idx >= chars.len() && separator.is_none();

            macro_rules! arg {
                () => {{
                    let a = args.get_mut(next_arg).ok_or_else(|| {
                        ChannelError::with_context(
                            ErrorKind::IncorrectFormat,
                            "format expects more arguments than were passed",
                        )
                    })?;
                    next_arg += 1;
                    a
                }};
            }
            macro_rules! scan_int {
                ($variant:ident) => {{
                    let ScanArg::$variant(slot) = arg!() else {
                        return Err(ChannelError::new(ErrorKind::IncorrectFormat));
                    };
                    let token = self.scan_number_token(false, separator, at_end)?;
                    match token.parse() {
                        Ok(v) => {
                            **slot = v;
                            items += 1;
                        }
                        Err(_) => {
                            tracing::debug!(token, "number token did not parse");
                        }
                    }
                }};
            }

            match conv {
                Conv::Percent => {
                    self.skip_ws_pushback()?;
                    if let Some(b) = self.getc()? {
                        if b != b'%' {
                            let _ = self.unget_byte(b);
                            break;
                        }
                    }
                }
                Conv::Char => {
                    let ScanArg::Char(slot) = arg!() else {
                        return Err(ChannelError::new(ErrorKind::IncorrectFormat));
                    };
                    self.skip_ws_pushback()?;
                    if let Some(b) = self.getc()? {
                        **slot = b;
                        items += 1;
                    }
                }
                Conv::I16 => scan_int!(I16),
                Conv::U16 => scan_int!(U16),
                Conv::I32 => scan_int!(I32),
                Conv::U32 => scan_int!(U32),
                Conv::I64 => scan_int!(I64),
                Conv::U64 => scan_int!(U64),
                Conv::F32 => {
                    let ScanArg::F32(slot) = arg!() else {
                        return Err(ChannelError::new(ErrorKind::IncorrectFormat));
                    };
                    let token = self.scan_number_token(true, separator, at_end)?;
                    if let Ok(v) = token.parse() {
                        **slot = v;
                        items += 1;
                    }
                }
                Conv::F64 => {
                    let ScanArg::F64(slot) = arg!() else {
                        return Err(ChannelError::new(ErrorKind::IncorrectFormat));
                    };
                    let token = self.scan_number_token(true, separator, at_end)?;
                    if let Ok(v) = token.parse() {
                        **slot = v;
                        items += 1;
                    }
                }
                Conv::Str => {
                    let ScanArg::Str(slot) = arg!() else {
                        return Err(ChannelError::new(ErrorKind::IncorrectFormat));
                    };
                    let token = self.scan_str_token(separator, at_end)?;
                    if !token.is_empty() {
                        items += 1;
                    }
                    **slot = token;
                }
                Conv::SkipStr => {
                    // Assignment-suppressed: no argument, not counted.
                    self.scan_str_token(separator, at_end)?;
                }
                Conv::EscapedStr => {
                    let ScanArg::EscapedStr(slot) = arg!() else {
                        return Err(ChannelError::new(ErrorKind::IncorrectFormat));
                    };
                    let token = self.scan_str_token(separator, at_end)?;
                    **slot = decode_escapes(&token);
                    items += 1;
                }
                Conv::QuotedChar => {
                    let ScanArg::QuotedChar(slot) = arg!() else {
                        return Err(ChannelError::new(ErrorKind::IncorrectFormat));
                    };
                    if let Some(v) = self.read_quoted_char()? {
                        **slot = v;
                        items += 1;
                    }
                }
                Conv::QuotedStr => {
                    let ScanArg::QuotedStr(slot) = arg!() else {
                        return Err(ChannelError::new(ErrorKind::IncorrectFormat));
                    };
                    **slot = self.read_quoted_str(None)?;
                    items += 1;
                }
                Conv::QuotedStrMax => {
                    let ScanArg::QuotedStrMax(max, slot) = arg!() else {
                        return Err(ChannelError::new(ErrorKind::IncorrectFormat));
                    };
                    let max = *max;
                    **slot = self.read_quoted_str(Some(max))?;
                    items += 1;
                }
                Conv::Ptr => {
                    let ScanArg::Ptr(slot) = arg!() else {
                        return Err(ChannelError::new(ErrorKind::IncorrectFormat));
                    };
                    let token = self.scan_str_token(None, at_end)?;
                    let digits = token.trim_start_matches("0x").trim_start_matches("0X");
                    if let Ok(v) = usize::from_str_radix(digits, 16) {
                        **slot = v;
                        items += 1;
                    }
                }
                Conv::Call => {
                    let ScanArg::Call(callback) = arg!() else {
                        return Err(ChannelError::new(ErrorKind::IncorrectFormat));
                    };
                    match callback(self) {
                        Ok(n) if n >= 0 => items += 1,
                        _ => {
                            return Err(ChannelError::new(ErrorKind::BadScanfCallback));
                        }
                    }
                }
            }
        }
        Ok(items)
    }

    /// Skip whitespace; the first non-whitespace byte goes back into the
    /// unget buffer.
    pub fn skip_ws_pushback(&mut self) -> Result<()> {
        loop {
            match self.getc()? {
                Some(b) if is_space(b) => continue,
                Some(b) => {
                    if self.unget_byte(b).is_err() {
                        tracing::error!(
                            byte = b,
                            "no room to push back the whitespace stopper"
                        );
                    }
                    return Ok(());
                }
                None => return Ok(()),
            }
        }
    }

    /// Read a numeric token. `separator`, when given, terminates the
    /// token and is consumed with it; any other stopper is pushed back
    /// when `unget_stopper` is set, silently dropped otherwise.
    fn scan_number_token(
        &mut self,
        float: bool,
        separator: Option<u8>,
        unget_stopper: bool,
    ) -> Result<String> {
        self.skip_ws_pushback()?;
        let mut token = String::new();
        loop {
            let Some(b) = self.getc()? else { break };
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
            if unget_stopper && self.unget_byte(b).is_err() {
                self.clear_error();
                tracing::warn!(byte = b, "scanf stopper lost, unget buffer full");
                return Err(ChannelError::new(ErrorKind::TooManyUnget));
            }
            break;
        }
        Ok(token)
    }

    /// Read a whitespace-delimited token, `separator` handling as for
    /// numbers.
    fn scan_str_token(&mut self, separator: Option<u8>, unget_stopper: bool) -> Result<String> {
        self.skip_ws_pushback()?;
        let mut token = String::new();
        loop {
            let Some(b) = self.getc()? else { break };
            if is_space(b) {
                if unget_stopper {
                    let _ = self.unget_byte(b);
                }
                break;
            }
            if Some(b) == separator {
                break;
            }
            token.push(b as char);
        }
        Ok(token)
    }

    /// `%qc` as an explicit method: `'x'`, `'\n'`, `'\x1b'` forms.
    pub fn read_quoted_char(&mut self) -> Result<Option<u8>> {
        self.skip_ws_pushback()?;
        match self.getc()? {
            Some(b'\'') => {}
            Some(other) => {
                tracing::debug!(got = other, "quoted char does not start with a quote");
                let _ = self.unget_byte(other);
                return Ok(None);
            }
            None => return Ok(None),
        }
        let value = match self.getc()? {
            Some(b'\\') => self.read_escape_tail()?,
            Some(b) => b,
            None => return Ok(None),
        };
        match self.getc()? {
            Some(b'\'') | None => {}
            Some(other) => {
                tracing::debug!(got = other, "quoted char is not closed");
                let _ = self.unget_byte(other);
            }
        }
        Ok(Some(value))
    }

    /// `%qs` / `%*qs` as an explicit method. Accepts single or double
    /// quotes; decodes `\\`, the quote itself, `\n`, `\t`, `\r`, `\xNN`.
    pub fn read_quoted_str(&mut self, max: Option<usize>) -> Result<String> {
        self.skip_ws_pushback()?;
        let quote = match self.getc()? {
            Some(q @ (b'"' | b'\'')) => q,
            Some(other) => {
                tracing::debug!(got = other, "quoted string does not start with a quote");
                let _ = self.unget_byte(other);
                return Ok(String::new());
            }
            None => return Ok(String::new()),
        };
        let mut out = String::new();
        loop {
            if let Some(limit) = max {
                if out.len() >= limit {
                    // Consume up to the closing quote regardless.
                    match self.getc()? {
                        Some(b) if b == quote => break,
                        Some(b'\\') => {
                            self.getc()?;
                        }
                        Some(_) => {}
                        None => break,
                    }
                    continue;
                }
            }
            match self.getc()? {
                Some(b) if b == quote => break,
                Some(b'\\') => {
                    let decoded = self.read_escape_tail()?;
                    out.push(decoded as char);
                }
                Some(b) => out.push(b as char),
                None => break,
            }
        }
        Ok(out)
    }

    /// Decode the escape after a consumed backslash.
    fn read_escape_tail(&mut self) -> Result<u8> {
        match self.getc()? {
            Some(b'n') => Ok(b'\n'),
            Some(b't') => Ok(b'\t'),
            Some(b'r') => Ok(b'\r'),
            Some(b'0') => Ok(0),
            Some(b'x') => {
                let mut hex = [0u8; 2];
                let n = self.read_block(&mut hex)?;
                let text = std::str::from_utf8(&hex[..n]).unwrap_or("");
                u8::from_str_radix(text, 16).map_err(|_| {
                    ChannelError::with_context(
                        ErrorKind::IncorrectFormat,
                        "bad \\xNN escape in quoted input",
                    )
                })
            }
            Some(b) => Ok(b),
            None => Err(ChannelError::with_context(
                ErrorKind::IncorrectFormat,
                "dangling backslash at end of stream",
            )),
        }
    }
}

/// `%S` escape: printable ASCII plus `\xNN` for everything else.
fn push_escaped(out: &mut String, text: &str) {
    for b in text.bytes() {
        match b {
            b'\\' => out.push_str("\\\\"),
            b'"' => out.push_str("\\\""),
            0x20..=0x7e => out.push(b as char),
            _ => out.push_str(&format!("\\x{b:02x}")),
        }
    }
}

/// Inverse of [`push_escaped`] over an in-memory token.
fn decode_escapes(token: &str) -> String {
    let bytes = token.as_bytes();
    let mut out = String::new();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 1 < bytes.len() {
            match bytes[i + 1] {
                b'n' => {
                    out.push('\n');
                    i += 2;
                }
                b't' => {
                    out.push('\t');
                    i += 2;
                }
                b'r' => {
                    out.push('\r');
                    i += 2;
                }
                b'x' if i + 3 < bytes.len() => {
                    let hex = std::str::from_utf8(&bytes[i + 2..i + 4]).unwrap_or("");
                    match u8::from_str_radix(hex, 16) {
                        Ok(v) => out.push(v as char),
                        Err(_) => out.push_str("\\x"),
                    }
                    i += 4;
                }
                other => {
                    out.push(other as char);
                    i += 2;
                }
            }
        } else {
            out.push(bytes[i] as char);
            i += 1;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::ChannelMode;

    fn channel_with(text: &str) -> Channel {
        let mut ch = Channel::open("Mem://256", ChannelMode::RW, 0).unwrap();
        ch.write_block(text.as_bytes()).unwrap();
        ch.rewind().unwrap();
        ch
    }

    #[test]
    fn printf_formats_numbers_and_strings() {
        let mut ch = Channel::open("Mem://256", ChannelMode::RW, 0).unwrap();
        ch.printf(
            "%s = %d; f = %f;",
            &[PrintArg::Str("x"), PrintArg::I32(-42), PrintArg::F32(1.5)],
        )
        .unwrap();
        assert_eq!(ch.contents().unwrap(), b"x = -42; f = 1.5;");
    }

    #[test]
    fn printf_quoted_string_escapes() {
        let mut ch = Channel::open("Mem://256", ChannelMode::RW, 0).unwrap();
        ch.printf("%qs", &[PrintArg::QuotedStr("a\"b\\c\nd")]).unwrap();
        assert_eq!(ch.contents().unwrap(), br#""a\"b\\c\nd""#);
    }

    #[test]
    fn printf_integral_floats_print_bare() {
        let mut ch = Channel::open("Mem://256", ChannelMode::RW, 0).unwrap();
        ch.printf("%lf %lf", &[PrintArg::F64(123.0), PrintArg::F64(0.25)]).unwrap();
        assert_eq!(ch.contents().unwrap(), b"123 0.25");
    }

    #[test]
    fn scanf_reads_numbers_with_separator() {
        let mut ch = channel_with("x = -42; y = 7;");
        let (mut x, mut y) = (0i32, 0i32);
        let n = ch
            .scanf("x = %d; y = %d;", &mut [ScanArg::I32(&mut x), ScanArg::I32(&mut y)])
            .unwrap();
        assert_eq!(n, 2);
        assert_eq!((x, y), (-42, 7));
    }

    #[test]
    fn scanf_trailing_whitespace_pushes_back_stopper() {
        let mut ch = channel_with("42 x");
        let mut n = 0i32;
        ch.scanf("%d ", &mut [ScanArg::I32(&mut n)]).unwrap();
        assert_eq!(n, 42);
        assert_eq!(ch.getc().unwrap(), Some(b'x'));
    }

    #[test]
    fn scanf_literal_mismatch_ungets_byte_and_stops() {
        let mut ch = channel_with("a = 1");
        let mut v = 0i32;
        let n = ch.scanf("b = %d", &mut [ScanArg::I32(&mut v)]).unwrap();
        assert_eq!(n, 0);
        // The mismatched byte is readable again.
        assert_eq!(ch.getc().unwrap(), Some(b'a'));
    }

    #[test]
    fn scanf_quoted_string_round_trip() {
        let mut src = Channel::open("Mem://256", ChannelMode::RW, 0).unwrap();
        src.printf("%qs", &[PrintArg::QuotedStr("tab\there \"q\"")]).unwrap();
        src.rewind().unwrap();
        let mut out = String::new();
        src.scanf("%qs", &mut [ScanArg::QuotedStr(&mut out)]).unwrap();
        assert_eq!(out, "tab\there \"q\"");
    }

    #[test]
    fn scanf_quoted_char_reads_escapes() {
        let mut ch = channel_with(r"'\n' '\x41' 'z'");
        let (mut a, mut b, mut c) = (0u8, 0u8, 0u8);
        let n = ch
            .scanf(
                "%qc %qc %qc",
                &mut [
                    ScanArg::QuotedChar(&mut a),
                    ScanArg::QuotedChar(&mut b),
                    ScanArg::QuotedChar(&mut c),
                ],
            )
            .unwrap();
        assert_eq!(n, 3);
        assert_eq!((a, b, c), (b'\n', b'A', b'z'));
    }

    #[test]
    fn scanf_bounded_quoted_string_truncates() {
        let mut ch = channel_with("\"abcdefgh\" next");
        let mut out = String::new();
        ch.scanf("%*qs", &mut [ScanArg::QuotedStrMax(4, &mut out)]).unwrap();
        assert_eq!(out, "abcd");
        let mut tail = String::new();
        ch.scanf("%s", &mut [ScanArg::Str(&mut tail)]).unwrap();
        assert_eq!(tail, "next");
    }

    #[test]
    fn scanf_string_stops_at_following_literal() {
        let mut ch = channel_with("HRIS-2.0 rest");
        let mut v = String::new();
        ch.scanf("HRIS-%s ", &mut [ScanArg::Str(&mut v)]).unwrap();
        assert_eq!(v, "2.0");
        assert_eq!(ch.getc().unwrap(), Some(b'r'));
    }

    #[test]
    fn print_and_scan_callback_drive_the_channel() {
        let mut ch = Channel::open("Mem://64", ChannelMode::RW, 0).unwrap();
        let print_cb = |ch: &mut Channel| -> Result<i64> {
            ch.write_block(b"<cb>").map(|n| n as i64)
        };
        ch.printf("a%@b", &[PrintArg::Call(&print_cb)]).unwrap();
        assert_eq!(ch.contents().unwrap(), b"a<cb>b");

        ch.rewind().unwrap();
        let mut seen = Vec::new();
        let mut scan_cb = |ch: &mut Channel| -> Result<i64> {
            let mut buf = [0u8; 4];
            let n = ch.read_block(&mut buf)?;
            seen.extend_from_slice(&buf[..n]);
            Ok(n as i64)
        };
        ch.scanf("a%@b", &mut [ScanArg::Call(&mut scan_cb)]).unwrap();
        assert_eq!(seen, b"<cb>");
    }

    #[test]
    fn escaped_str_hexifies_non_printables() {
        let mut ch = Channel::open("Mem://64", ChannelMode::RW, 0).unwrap();
        ch.printf("%S", &[PrintArg::EscapedStr("ok\x01")]).unwrap();
        assert_eq!(ch.contents().unwrap(), b"ok\\x01");
    }
}
