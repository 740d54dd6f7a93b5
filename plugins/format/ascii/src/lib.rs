//! Ascii format: C-like textual rendering.
//!
//! ```text
//! point =
//! {
//!   x = 123;
//!   y = 456;
//!   tags[3] =
//!   1 2 3;
//! }
//! ```
//!
//! Structures open `{` and close `}` on their own lines, nesting indents
//! by two spaces, scalar fields are `name = value;`, arrays wrap after
//! `column_wrap` elements, strings are `name[len] = "…";` with C-style
//! escapes. Chars always appear as their integer code. The
//! `WITH_TYPE=TRUE` option prefixes each name with its C type tag.

use hris_serialize::{
    FormatPlugin, PrintArg, Result, ScanArg, SerializeCtx, SerializeType, ValueRef,
};

pub const FORMAT_NAME: &str = "Ascii";

pub const OPT_WITH_TYPE: &str = "WITH_TYPE=TRUE";

#[derive(Default)]
pub struct AsciiFormat {
    with_type: bool,
}

impl AsciiFormat {
    pub fn new() -> Self {
        Self::default()
    }

    fn field_label(&self, ty: SerializeType, name: &str) -> String {
        if self.with_type {
            format!("{} {name}", ty.tag())
        } else {
            name.to_string()
        }
    }

    fn write_field(
        &self,
        ctx: &mut SerializeCtx,
        name: &str,
        value: &ValueRef<'_>,
    ) -> Result<()> {
        ctx.write_indent()?;
        ctx.write_str(&self.field_label(value.ty(), name))?;
        ctx.write_str(" = ")?;
        ctx.print_elem(value, 0)?;
        ctx.write_str(";\n")
    }

    fn read_field(
        &self,
        ctx: &mut SerializeCtx,
        name: &str,
        value: &mut ValueRef<'_>,
    ) -> Result<()> {
        ctx.scanf(&format!("{} = ", self.field_label(value.ty(), name)), &mut [])?;
        ctx.scan_elem(value, 0, Some(b';'))
    }

    fn write_string(&self, ctx: &mut SerializeCtx, name: &str, text: &str) -> Result<()> {
        ctx.write_indent()?;
        if self.with_type {
            ctx.write_str(&format!("string {name}[{}] = ", text.len()))?;
        } else {
            ctx.write_str(&format!("{name}[{}] = ", text.len()))?;
        }
        ctx.printf("%qs;\n", &[PrintArg::QuotedStr(text)])?;
        Ok(())
    }

    fn read_string(&self, ctx: &mut SerializeCtx, name: &str, out: &mut String) -> Result<()> {
        if self.with_type {
            ctx.scanf(&format!("string {name}["), &mut [])?;
        } else {
            ctx.scanf(&format!("{name}["), &mut [])?;
        }
        ctx.scan_token(false, Some(b']'))?;
        ctx.scanf("= ", &mut [])?;
        let mut text = String::new();
        ctx.scanf("%qs;", &mut [ScanArg::QuotedStr(&mut text)])?;
        *out = text;
        Ok(())
    }

    fn write_array(
        &self,
        ctx: &mut SerializeCtx,
        value: &ValueRef<'_>,
    ) -> Result<()> {
        let len = value.count();
        let wrap = ctx.column_wrap() as usize;
        for idx in 0..len {
            if wrap > 0 && idx % wrap == 0 {
                ctx.write_str("\n")?;
                ctx.write_indent()?;
            }
            ctx.print_elem(value, idx)?;
            if idx + 1 == len {
                ctx.write_str(";\n")?;
            } else {
                ctx.write_str(" ")?;
            }
        }
        Ok(())
    }

    fn read_array(&self, ctx: &mut SerializeCtx, value: &mut ValueRef<'_>) -> Result<()> {
        let len = value.count();
        for idx in 0..len {
            let sep = if idx + 1 == len { Some(b';') } else { None };
            ctx.scan_elem(value, idx, sep)?;
        }
        Ok(())
    }
}

impl FormatPlugin for AsciiFormat {
    fn name(&self) -> &'static str {
        FORMAT_NAME
    }

    fn options_set(&mut self, ctx: &mut SerializeCtx, opts: Option<&str>) -> Result<()> {
        self.with_type = opts.is_some_and(|o| o.contains(OPT_WITH_TYPE));
        if self.with_type {
            ctx.set_header_opts(OPT_WITH_TYPE);
        }
        Ok(())
    }

    fn options_get_property(&self, name: &str) -> Option<String> {
        match name {
            "WITH_TYPE" => Some(self.with_type.to_string()),
            _ => None,
        }
    }

    fn options_set_property(&mut self, name: &str, value: &str) -> bool {
        match name {
            "WITH_TYPE" => {
                self.with_type = value.eq_ignore_ascii_case("true");
                true
            }
            _ => false,
        }
    }

    fn options_clear(&mut self) {
        self.with_type = false;
    }

    fn begin_type(&mut self, ctx: &mut SerializeCtx, name: &str, type_tag: &str) -> Result<()> {
        if ctx.is_reading() {
            let mut instance = String::new();
            let fmt = if self.with_type {
                format!("struct {type_tag} %s = {{ ")
            } else {
                "%s = { ".to_string()
            };
            ctx.scanf(&fmt, &mut [ScanArg::Str(&mut instance)])?;
            if instance != name {
                tracing::warn!(expected = name, found = %instance, "instance name differs");
            }
            return Ok(());
        }
        ctx.write_indent()?;
        if self.with_type {
            ctx.write_str(&format!("struct {type_tag} {name} =\n"))?;
        } else {
            ctx.write_str(&format!("{name} =\n"))?;
        }
        ctx.write_indent()?;
        ctx.write_str("{\n")?;
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
        let label = if self.with_type {
            format!("{} {name}", ty.tag())
        } else {
            name.to_string()
        };
        if ctx.is_reading() {
            ctx.scanf(&format!("{label}[{len}] = "), &mut [])?;
            return Ok(());
        }
        ctx.write_indent()?;
        ctx.write_str(&format!("{label}[{len}] ="))?;
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
        let label = if self.with_type {
            format!("{element_type} {name}")
        } else {
            name.to_string()
        };
        if ctx.is_reading() {
            ctx.scanf(&format!("{label}[{len}] = {{ "), &mut [])?;
            return Ok(());
        }
        ctx.write_indent()?;
        ctx.write_str(&format!("{label}[{len}] = \n"))?;
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
        if let Some(text) = value.as_str().map(str::to_string) {
            if ctx.is_reading() {
                let mut out = String::new();
                self.read_string(ctx, name, &mut out)?;
                if let Some(slot) = value.as_string_mut() {
                    *slot = out;
                }
            } else {
                self.write_string(ctx, name, &text)?;
            }
            return Ok(());
        }
        if value.is_array() {
            if ctx.is_reading() {
                self.read_array(ctx, value)
            } else {
                self.write_array(ctx, value)
            }
        } else if ctx.is_reading() {
            self.read_field(ctx, name, value)
        } else {
            self.write_field(ctx, name, value)
        }
    }

    fn end_struct_array(&mut self, ctx: &mut SerializeCtx) -> Result<()> {
        if ctx.is_reading() {
            ctx.scanf("} ", &mut [])?;
            return Ok(());
        }
        ctx.indent_decr();
        ctx.write_indent()?;
        ctx.write_str("}\n")
    }

    fn end_array(
        &mut self,
        ctx: &mut SerializeCtx,
        _ty: SerializeType,
        _name: &str,
        _len: usize,
    ) -> Result<()> {
        if !ctx.is_reading() {
            ctx.indent_decr();
        }
        Ok(())
    }

    fn end_type(&mut self, ctx: &mut SerializeCtx) -> Result<()> {
        if ctx.is_reading() {
            ctx.scanf("}\n", &mut [])?;
            return Ok(());
        }
        ctx.indent_decr();
        ctx.write_indent()?;
        ctx.write_str("}\n")
    }
}
