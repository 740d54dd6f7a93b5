//! Xml format.
//!
//! ```text
//! <struct type="Point" name="point">
//!   <field type="int" name="x">123</field>
//!   <array type="double" name="w" size="2">
//!     <element index="0">0.5</element>
//!     <element index="1">1.5</element>
//!   </array>
//! </struct>
//! ```
//!
//! Strings are entity-escaped; struct arrays wrap each element's nested
//! `<struct>` in an `<element index="i">` pair. Chars serialize as
//! integer codes.

use hris_serialize::{FormatPlugin, Result, ScanArg, SerializeCtx, SerializeType, ValueRef};

pub const FORMAT_NAME: &str = "Xml";

/// Escape the five predefined XML entities.
pub fn escape_entities(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
    out
}

/// Inverse of [`escape_entities`]; unknown entities pass through.
pub fn unescape_entities(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];
        let known = [
            ("&amp;", '&'),
            ("&lt;", '<'),
            ("&gt;", '>'),
            ("&quot;", '"'),
            ("&apos;", '\''),
        ];
        match known.iter().find(|(e, _)| rest.starts_with(e)) {
            Some((entity, c)) => {
                out.push(*c);
                rest = &rest[entity.len()..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

#[derive(Default)]
pub struct XmlFormat;

impl XmlFormat {
    pub fn new() -> Self {
        XmlFormat
    }

    fn write_element(
        &self,
        ctx: &mut SerializeCtx,
        value: &ValueRef<'_>,
        idx: usize,
    ) -> Result<()> {
        ctx.write_indent()?;
        ctx.write_str(&format!("<element index=\"{idx}\">"))?;
        ctx.print_elem(value, idx)?;
        ctx.write_str("</element>\n")
    }

    fn read_element(
        &self,
        ctx: &mut SerializeCtx,
        value: &mut ValueRef<'_>,
        idx: usize,
    ) -> Result<()> {
        ctx.scanf(&format!("<element index=\"{idx}\">"), &mut [])?;
        ctx.scan_elem(value, idx, Some(b'<'))?;
        ctx.scanf("/element> ", &mut [])?;
        Ok(())
    }

    /// Read raw text up to the next `<`, which is consumed.
    fn read_text_until_tag(&self, ctx: &mut SerializeCtx) -> Result<String> {
        let mut raw = String::new();
        loop {
            match ctx.getc()? {
                Some(b'<') | None => break,
                Some(b) => raw.push(b as char),
            }
        }
        Ok(raw)
    }
}

impl FormatPlugin for XmlFormat {
    fn name(&self) -> &'static str {
        FORMAT_NAME
    }

    fn begin_type(&mut self, ctx: &mut SerializeCtx, name: &str, type_tag: &str) -> Result<()> {
        if ctx.is_reading() {
            let mut instance = String::new();
            ctx.scanf(
                &format!("<struct type=\"{type_tag}\" name=\"%s> "),
                &mut [ScanArg::Str(&mut instance)],
            )?;
            let instance = instance.trim_end_matches('"');
            if instance != name {
                tracing::warn!(expected = name, found = %instance, "instance name differs");
            }
            return Ok(());
        }
        ctx.write_indent()?;
        ctx.write_str(&format!("<struct type=\"{type_tag}\" name=\"{name}\">\n"))?;
        ctx.indent_incr();
        Ok(())
    }

    fn begin_array(
        &mut self,
        ctx: &mut SerializeCtx,
        ty: SerializeType,
        name: &str,
        len: usize,
    ) -> Result<()> {
        let tag = ty.tag();
        if ctx.is_reading() {
            ctx.scanf(
                &format!("<array type=\"{tag}\" name=\"{name}\" size=\"{len}\"> "),
                &mut [],
            )?;
            return Ok(());
        }
        ctx.write_indent()?;
        ctx.write_str(&format!("<array type=\"{tag}\" name=\"{name}\" size=\"{len}\">\n"))?;
        ctx.indent_incr();
        Ok(())
    }

    fn begin_struct_array(
        &mut self,
        ctx: &mut SerializeCtx,
        name: &str,
        element_type: &str,
        len: usize,
    ) -> Result<()> {
        if ctx.is_reading() {
            ctx.scanf(
                &format!("<array type=\"{element_type}\" name=\"{name}\" size=\"{len}\"> "),
                &mut [],
            )?;
            return Ok(());
        }
        ctx.write_indent()?;
        ctx.write_str(&format!(
            "<array type=\"{element_type}\" name=\"{name}\" size=\"{len}\">\n"
        ))?;
        ctx.indent_incr();
        Ok(())
    }

    fn begin_struct_array_separator(
        &mut self,
        ctx: &mut SerializeCtx,
        _name: &str,
        position: usize,
        _len: usize,
    ) -> Result<()> {
        if ctx.is_reading() {
            ctx.scanf(&format!("<element index=\"{position}\"> "), &mut [])?;
            return Ok(());
        }
        ctx.write_indent()?;
        ctx.write_str(&format!("<element index=\"{position}\">\n"))?;
        ctx.indent_incr();
        Ok(())
    }

    fn serialize(
        &mut self,
        ctx: &mut SerializeCtx,
        name: &str,
        value: &mut ValueRef<'_>,
    ) -> Result<()> {
        // Strings get entity treatment.
        if let Some(text) = value.as_str().map(str::to_string) {
            if ctx.is_reading() {
                ctx.scanf(&format!("<field type=\"string\" name=\"{name}\">"), &mut [])?;
                let raw = self.read_text_until_tag(ctx)?;
                ctx.scanf("/field> ", &mut [])?;
                if let Some(slot) = value.as_string_mut() {
                    *slot = unescape_entities(&raw);
                }
            } else {
                ctx.write_indent()?;
                ctx.write_str(&format!("<field type=\"string\" name=\"{name}\">"))?;
                ctx.write_str(&escape_entities(&text))?;
                ctx.write_str("</field>\n")?;
            }
            return Ok(());
        }

        if value.is_array() {
            for idx in 0..value.count() {
                if ctx.is_reading() {
                    self.read_element(ctx, value, idx)?;
                } else {
                    self.write_element(ctx, value, idx)?;
                }
            }
            return Ok(());
        }

        let tag = value.ty().tag();
        if ctx.is_reading() {
            ctx.scanf(&format!("<field type=\"{tag}\" name=\"{name}\">"), &mut [])?;
            ctx.scan_elem(value, 0, Some(b'<'))?;
            ctx.scanf("/field> ", &mut [])?;
        } else {
            ctx.write_indent()?;
            ctx.write_str(&format!("<field type=\"{tag}\" name=\"{name}\">"))?;
            ctx.print_elem(value, 0)?;
            ctx.write_str("</field>\n")?;
        }
        Ok(())
    }

    fn end_struct_array_separator(
        &mut self,
        ctx: &mut SerializeCtx,
        _name: &str,
        _position: usize,
        _len: usize,
    ) -> Result<()> {
        if ctx.is_reading() {
            ctx.scanf("</element> ", &mut [])?;
            return Ok(());
        }
        ctx.indent_decr();
        ctx.write_indent()?;
        ctx.write_str("</element>\n")
    }

    fn end_struct_array(&mut self, ctx: &mut SerializeCtx) -> Result<()> {
        if ctx.is_reading() {
            ctx.scanf("</array> ", &mut [])?;
            return Ok(());
        }
        ctx.indent_decr();
        ctx.write_indent()?;
        ctx.write_str("</array>\n")
    }

    fn end_array(
        &mut self,
        ctx: &mut SerializeCtx,
        _ty: SerializeType,
        _name: &str,
        _len: usize,
    ) -> Result<()> {
        if ctx.is_reading() {
            ctx.scanf("</array> ", &mut [])?;
            return Ok(());
        }
        ctx.indent_decr();
        ctx.write_indent()?;
        ctx.write_str("</array>\n")
    }

    fn end_type(&mut self, ctx: &mut SerializeCtx) -> Result<()> {
        if ctx.is_reading() {
            ctx.scanf("</struct>\n", &mut [])?;
            return Ok(());
        }
        ctx.indent_decr();
        ctx.write_indent()?;
        ctx.write_str("</struct>\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entities_escape_and_unescape_symmetrically() {
        let raw = r#"a & b < c > "d" 'e'"#;
        let escaped = escape_entities(raw);
        assert_eq!(
            escaped,
            "a &amp; b &lt; c &gt; &quot;d&quot; &apos;e&apos;"
        );
        assert_eq!(unescape_entities(&escaped), raw);
    }

    #[test]
    fn unknown_entities_pass_through() {
        assert_eq!(unescape_entities("1 &nbsp; 2"), "1 &nbsp; 2");
        assert_eq!(unescape_entities("trailing &"), "trailing &");
    }
}
