//! Json format.
//!
//! ```text
//! {
//!   "Point": {
//!     "x": 123,
//!     "y": 456
//!   }
//! }
//! ```
//!
//! Objects for structs, arrays for sequences, JSON string escaping,
//! numbers in native form, chars as integers. When the HRIS header is
//! enabled a lone `,` line separates it from the body and the reader
//! skips it; with the header disabled the stream is plain JSON.

use hris_serialize::{
    FormatPlugin, Result, ScanArg, SerializeCtx, SerializeType, ValueRef,
};

pub const FORMAT_NAME: &str = "Json";

/// Standard JSON string escaping.
pub fn escape_json(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out
}

pub struct JsonFormat {
    is_first: bool,
    element_pending: bool,
}

impl Default for JsonFormat {
    fn default() -> Self {
        JsonFormat { is_first: true, element_pending: false }
    }
}

impl JsonFormat {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a JSON string value into `out`.
    fn read_json_string(&self, ctx: &mut SerializeCtx, out: &mut String) -> Result<()> {
        let chan = ctx.chan_mut()?;
        chan.skip_ws_pushback()?;
        match chan.getc()? {
            Some(b'"') => {}
            Some(other) => {
                tracing::debug!(got = other, "json string does not start with a quote");
                let _ = chan.unget(&[other]);
                return Ok(());
            }
            None => return Ok(()),
        }
        out.clear();
        loop {
            match chan.getc()? {
                Some(b'"') | None => break,
                Some(b'\\') => match chan.getc()? {
                    Some(b'n') => out.push('\n'),
                    Some(b't') => out.push('\t'),
                    Some(b'r') => out.push('\r'),
                    Some(b'u') => {
                        let mut hex = [0u8; 4];
                        chan.read_block(&mut hex)?;
                        let text = std::str::from_utf8(&hex).unwrap_or("");
                        match u32::from_str_radix(text, 16).ok().and_then(char::from_u32) {
                            Some(c) => out.push(c),
                            None => tracing::debug!(escape = text, "bad \\u escape"),
                        }
                    }
                    Some(b) => out.push(b as char),
                    None => break,
                },
                Some(b) => out.push(b as char),
            }
        }
        Ok(())
    }
}

impl FormatPlugin for JsonFormat {
    fn name(&self) -> &'static str {
        FORMAT_NAME
    }

    fn options_clear(&mut self) {
        *self = JsonFormat::default();
    }

    fn begin_type(&mut self, ctx: &mut SerializeCtx, name: &str, _type_tag: &str) -> Result<()> {
        if self.element_pending {
            // The struct-array separator already opened this object.
            self.element_pending = false;
            return Ok(());
        }
        let root = ctx.nesting_level() == 1;
        if ctx.is_reading() {
            self.is_first = true;
            let mut instance = String::new();
            if root {
                if ctx.use_header() {
                    // Skip the separator line between header and body.
                    ctx.eat_punct(b',')?;
                }
                ctx.scanf("{ \"%s\": {", &mut [ScanArg::Str(&mut instance)])?;
            } else {
                ctx.scanf("\"%s\": {", &mut [ScanArg::Str(&mut instance)])?;
            }
            let instance = instance.trim_end_matches('"');
            if instance != name {
                tracing::warn!(expected = name, found = %instance, "instance name differs");
            }
            return Ok(());
        }

        if !self.is_first {
            ctx.write_str(",\n")?;
        }
        self.is_first = true;
        if root {
            if ctx.use_header() {
                ctx.write_str(",\n")?;
            }
            ctx.write_str("{\n")?;
            ctx.indent_incr();
        }
        ctx.write_indent()?;
        ctx.write_str(&format!("\"{name}\": {{\n"))?;
        ctx.indent_incr();
        Ok(())
    }

    fn begin_array(
        &mut self,
        ctx: &mut SerializeCtx,
        _ty: SerializeType,
        name: &str,
        _len: usize,
    ) -> Result<()> {
        if ctx.is_reading() {
            self.is_first = true;
            ctx.scanf(&format!("\"{name}\": ["), &mut [])?;
            return Ok(());
        }
        if !self.is_first {
            ctx.write_str(",\n")?;
        }
        self.is_first = false;
        ctx.write_indent()?;
        ctx.write_str(&format!("\"{name}\": ["))?;
        ctx.indent_incr();
        Ok(())
    }

    fn begin_struct_array(
        &mut self,
        ctx: &mut SerializeCtx,
        name: &str,
        _element_type: &str,
        _len: usize,
    ) -> Result<()> {
        if ctx.is_reading() {
            ctx.scanf(&format!("\"{name}\": [ "), &mut [])?;
            return Ok(());
        }
        if !self.is_first {
            ctx.write_str(",\n")?;
        }
        self.is_first = true;
        ctx.write_indent()?;
        ctx.write_str(&format!("\"{name}\": [\n"))?;
        Ok(())
    }

    fn begin_struct_array_separator(
        &mut self,
        ctx: &mut SerializeCtx,
        _name: &str,
        position: usize,
        _len: usize,
    ) -> Result<()> {
        self.element_pending = true;
        self.is_first = true;
        if ctx.is_reading() {
            ctx.scanf("{ ", &mut [])?;
            return Ok(());
        }
        if position != 0 {
            ctx.write_str(",\n")?;
        }
        ctx.write_indent()?;
        ctx.write_str("{\n")?;
        ctx.indent_incr();
        Ok(())
    }

    fn serialize(
        &mut self,
        ctx: &mut SerializeCtx,
        name: &str,
        value: &mut ValueRef<'_>,
    ) -> Result<()> {
        // Strings.
        if let Some(text) = value.as_str().map(str::to_string) {
            if ctx.is_reading() {
                ctx.scanf(&format!("\"{name}\": "), &mut [])?;
                let mut out = String::new();
                self.read_json_string(ctx, &mut out)?;
                ctx.eat_punct(b',')?;
                if let Some(slot) = value.as_string_mut() {
                    *slot = out;
                }
            } else {
                if !self.is_first {
                    ctx.write_str(",\n")?;
                }
                self.is_first = false;
                ctx.write_indent()?;
                ctx.write_str(&format!("\"{name}\": \"{}\"", escape_json(&text)))?;
            }
            return Ok(());
        }

        // Scalar arrays: bare values, comma separated, wrapped.
        if value.is_array() {
            let len = value.count();
            let wrap = ctx.column_wrap() as usize;
            for idx in 0..len {
                if ctx.is_reading() {
                    ctx.scan_elem(value, idx, None)?;
                    if idx + 1 < len {
                        ctx.eat_punct(b',')?;
                    }
                } else {
                    if wrap > 0 && idx % wrap == 0 {
                        ctx.write_str("\n")?;
                        ctx.write_indent()?;
                    }
                    ctx.print_elem(value, idx)?;
                    if idx + 1 == len {
                        ctx.write_str("\n")?;
                    } else {
                        ctx.write_str(", ")?;
                    }
                }
            }
            return Ok(());
        }

        // Plain fields; chars as integer codes.
        if ctx.is_reading() {
            ctx.scanf(&format!("\"{name}\": "), &mut [])?;
            ctx.scan_elem(value, 0, None)?;
            ctx.eat_punct(b',')?;
        } else {
            if !self.is_first {
                ctx.write_str(",\n")?;
            }
            self.is_first = false;
            ctx.write_indent()?;
            ctx.write_str(&format!("\"{name}\": "))?;
            ctx.print_elem(value, 0)?;
        }
        Ok(())
    }

    fn end_struct_array(&mut self, ctx: &mut SerializeCtx) -> Result<()> {
        if ctx.is_reading() {
            ctx.scanf("]", &mut [])?;
            ctx.eat_punct(b',')?;
            return Ok(());
        }
        ctx.write_str("\n")?;
        ctx.write_indent()?;
        ctx.write_str("]")
    }

    fn end_array(
        &mut self,
        ctx: &mut SerializeCtx,
        _ty: SerializeType,
        _name: &str,
        _len: usize,
    ) -> Result<()> {
        if ctx.is_reading() {
            ctx.scanf("]", &mut [])?;
            ctx.eat_punct(b',')?;
            return Ok(());
        }
        ctx.indent_decr();
        ctx.write_indent()?;
        ctx.write_str("]")
    }

    fn end_type(&mut self, ctx: &mut SerializeCtx) -> Result<()> {
        let root = ctx.nesting_level() == 1;
        if ctx.is_reading() {
            if root {
                ctx.scanf("} } ", &mut [])?;
            } else {
                ctx.scanf("}", &mut [])?;
                ctx.eat_punct(b',')?;
            }
            return Ok(());
        }
        ctx.write_str("\n")?;
        ctx.indent_decr();
        ctx.write_indent()?;
        ctx.write_str("}")?;
        if root {
            ctx.write_str("\n}\n")?;
            ctx.indent_decr();
            self.is_first = true;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_handles_quotes_controls_and_backslashes() {
        assert_eq!(escape_json(r#"a"b"#), r#"a\"b"#);
        assert_eq!(escape_json("a\\b"), "a\\\\b");
        assert_eq!(escape_json("line\nbreak"), "line\\nbreak");
        assert_eq!(escape_json("\u{01}"), "\\u0001");
    }
}
