//! Python format: a literal expression with `\` line continuations.
//!
//! ```text
//! { \
//!   "x" : 123, \
//!   "w" : [ \
//!     ( 0, 0.5 ), ( 1, 1.5 ), \
//!   ], \
//! }
//! ```
//!
//! The `type` option picks the top-level container (`AS_TUPLE`,
//! `AS_LIST`, `AS_DICT`, `AS_TUPLE_NO_KEY`, `AS_LIST_NO_KEY`), the
//! `arrayType` and `structArrayType` options pick the scalar-array and
//! struct-array containers. Keyed variants pair every entry with its
//! field name, indexed variants with its position. Chars serialize as
//! integers.

use hris_serialize::{
    FormatPlugin, PrintArg, Result, ScanArg, SerializeCtx, SerializeError, ValueRef,
};

pub const FORMAT_NAME: &str = "Python";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StructStyle {
    Tuple,
    #[default]
    List,
    Dict,
    TupleNoKey,
    ListNoKey,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SeqStyle {
    Tuple,
    #[default]
    List,
    Dict,
    TupleNoIndex,
    ListNoIndex,
}

impl StructStyle {
    fn parse(text: &str) -> Option<Self> {
        Some(match text {
            "AS_TUPLE" => StructStyle::Tuple,
            "AS_LIST" => StructStyle::List,
            "AS_DICT" => StructStyle::Dict,
            "AS_TUPLE_NO_KEY" => StructStyle::TupleNoKey,
            "AS_LIST_NO_KEY" => StructStyle::ListNoKey,
            _ => return None,
        })
    }

    fn open(self) -> &'static str {
        match self {
            StructStyle::Tuple | StructStyle::TupleNoKey => "(",
            StructStyle::List | StructStyle::ListNoKey => "[",
            StructStyle::Dict => "{",
        }
    }

    fn close(self) -> &'static str {
        match self {
            StructStyle::Tuple | StructStyle::TupleNoKey => ")",
            StructStyle::List | StructStyle::ListNoKey => "]",
            StructStyle::Dict => "}",
        }
    }

    fn has_key(self) -> bool {
        matches!(self, StructStyle::Tuple | StructStyle::List | StructStyle::Dict)
    }

    /// Key syntax: `( "name", value )` for sequences, `"name" : value`
    /// for dicts.
    fn keys_are_pairs(self) -> bool {
        matches!(self, StructStyle::Tuple | StructStyle::List)
    }
}

impl SeqStyle {
    fn parse(text: &str, prefix: &str) -> Option<Self> {
        let tail = text.strip_prefix(prefix)?;
        Some(match tail {
            "AS_TUPLE" => SeqStyle::Tuple,
            "AS_LIST" => SeqStyle::List,
            "AS_DICT" => SeqStyle::Dict,
            "AS_TUPLE_NO_INDEX" => SeqStyle::TupleNoIndex,
            "AS_LIST_NO_INDEX" => SeqStyle::ListNoIndex,
            _ => return None,
        })
    }

    fn open(self) -> &'static str {
        match self {
            SeqStyle::Tuple | SeqStyle::TupleNoIndex => "(",
            SeqStyle::List | SeqStyle::ListNoIndex => "[",
            SeqStyle::Dict => "{",
        }
    }

    fn close(self) -> &'static str {
        match self {
            SeqStyle::Tuple | SeqStyle::TupleNoIndex => ")",
            SeqStyle::List | SeqStyle::ListNoIndex => "]",
            SeqStyle::Dict => "}",
        }
    }

    fn has_index(self) -> bool {
        matches!(self, SeqStyle::Tuple | SeqStyle::List | SeqStyle::Dict)
    }

    fn indices_are_pairs(self) -> bool {
        matches!(self, SeqStyle::Tuple | SeqStyle::List)
    }
}

pub struct PythonFormat {
    struct_style: StructStyle,
    array_style: SeqStyle,
    struct_array_style: SeqStyle,
    element_pending: bool,
    element_close_indent: i32,
}

impl Default for PythonFormat {
    fn default() -> Self {
        PythonFormat {
            struct_style: StructStyle::default(),
            array_style: SeqStyle::default(),
            struct_array_style: SeqStyle::default(),
            element_pending: false,
            element_close_indent: -1,
        }
    }
}

impl PythonFormat {
    pub fn new() -> Self {
        Self::default()
    }

    fn write_key(&self, ctx: &mut SerializeCtx, name: &str) -> Result<()> {
        if !self.struct_style.has_key() {
            return Ok(());
        }
        if self.struct_style.keys_are_pairs() {
            ctx.write_str("( ")?;
            ctx.printf("%qs", &[PrintArg::QuotedStr(name)])?;
            ctx.write_str(", ")
        } else {
            ctx.printf("%qs", &[PrintArg::QuotedStr(name)])?;
            ctx.write_str(" : ")
        }
    }

    fn write_key_close(&self, ctx: &mut SerializeCtx) -> Result<()> {
        if self.struct_style.has_key() && self.struct_style.keys_are_pairs() {
            ctx.write_str(" )")?;
        }
        Ok(())
    }

    /// Scan and verify a field key.
    fn read_key(&self, ctx: &mut SerializeCtx, name: &str) -> Result<()> {
        if !self.struct_style.has_key() {
            return Ok(());
        }
        let mut found = String::new();
        if self.struct_style.keys_are_pairs() {
            ctx.scanf("( %qs, ", &mut [ScanArg::QuotedStr(&mut found)])?;
        } else {
            ctx.scanf("%qs : ", &mut [ScanArg::QuotedStr(&mut found)])?;
        }
        if found != name {
            return Err(SerializeError::BadValue(format!(
                "field name mismatch: stream has '{found}', expected '{name}'"
            )));
        }
        Ok(())
    }

    fn read_key_close(&self, ctx: &mut SerializeCtx) -> Result<()> {
        if self.struct_style.has_key() && self.struct_style.keys_are_pairs() {
            ctx.scanf(")", &mut [])?;
        }
        Ok(())
    }
}

impl FormatPlugin for PythonFormat {
    fn name(&self) -> &'static str {
        FORMAT_NAME
    }

    /// Options: whitespace-separated `key=value` tokens, e.g.
    /// `type=AS_DICT arrayType=ARRAY_AS_LIST structArrayType=STRUCTARRAY_AS_DICT`.
    fn options_set(&mut self, _ctx: &mut SerializeCtx, opts: Option<&str>) -> Result<()> {
        let Some(opts) = opts else { return Ok(()) };
        for token in opts.split_whitespace() {
            let Some((key, value)) = token.split_once('=') else { continue };
            match key {
                "type" => match StructStyle::parse(value) {
                    Some(style) => self.struct_style = style,
                    None => tracing::warn!(value, "unknown python struct style"),
                },
                "arrayType" => match SeqStyle::parse(value, "ARRAY_") {
                    Some(style) => self.array_style = style,
                    None => tracing::warn!(value, "unknown python array style"),
                },
                "structArrayType" => match SeqStyle::parse(value, "STRUCTARRAY_") {
                    Some(style) => self.struct_array_style = style,
                    None => tracing::warn!(value, "unknown python struct array style"),
                },
                other => tracing::debug!(option = other, "ignored python option"),
            }
        }
        Ok(())
    }

    fn options_clear(&mut self) {
        *self = PythonFormat::default();
    }

    fn begin_type(&mut self, ctx: &mut SerializeCtx, name: &str, _type_tag: &str) -> Result<()> {
        let rootish = ctx.nesting_level() == 1 || self.element_pending;
        self.element_pending = false;
        if ctx.is_reading() {
            if !rootish && self.struct_style.has_key() {
                self.read_key(ctx, name)?;
            }
            ctx.scanf(self.struct_style.open(), &mut [])?;
            ctx.scanf("\\ ", &mut [])?;
        } else {
            ctx.write_indent()?;
            if !rootish && self.struct_style.has_key() {
                self.write_key(ctx, name)?;
            }
            ctx.write_str(self.struct_style.open())?;
            ctx.write_str("\\\n")?;
        }
        ctx.indent_incr();
        Ok(())
    }

    fn begin_array(
        &mut self,
        ctx: &mut SerializeCtx,
        _ty: hris_serialize::SerializeType,
        name: &str,
        _len: usize,
    ) -> Result<()> {
        if ctx.is_reading() {
            if self.struct_style.has_key() {
                self.read_key(ctx, name)?;
            }
            ctx.scanf(self.array_style.open(), &mut [])?;
        } else {
            ctx.write_indent()?;
            if self.struct_style.has_key() {
                self.write_key(ctx, name)?;
            }
            ctx.write_str(self.array_style.open())?;
        }
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
            if self.struct_style.has_key() {
                self.read_key(ctx, name)?;
            }
            ctx.scanf(self.struct_array_style.open(), &mut [])?;
            ctx.scanf("\\ ", &mut [])?;
        } else {
            ctx.write_indent()?;
            if self.struct_style.has_key() {
                self.write_key(ctx, name)?;
            }
            ctx.write_str(self.struct_array_style.open())?;
            ctx.write_str("\\\n")?;
        }
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
        self.element_pending = true;
        if self.struct_array_style.has_index() {
            if ctx.is_reading() {
                if self.struct_array_style.indices_are_pairs() {
                    let mut found = 0i64;
                    ctx.scanf("( %ld, ", &mut [ScanArg::I64(&mut found)])?;
                    if found != position as i64 {
                        return Err(SerializeError::BadValue(format!(
                            "struct array index mismatch: stream has {found}, expected {position}"
                        )));
                    }
                } else {
                    let mut found = 0i64;
                    ctx.scanf("%ld : ", &mut [ScanArg::I64(&mut found)])?;
                    if found != position as i64 {
                        return Err(SerializeError::BadValue(format!(
                            "struct array index mismatch: stream has {found}, expected {position}"
                        )));
                    }
                }
                ctx.scanf("\\ ", &mut [])?;
            } else {
                ctx.write_indent()?;
                if self.struct_array_style.indices_are_pairs() {
                    ctx.write_str(&format!("( {position}, "))?;
                } else {
                    ctx.write_str(&format!("{position} : "))?;
                }
                ctx.write_str("\\\n")?;
            }
            ctx.indent_incr();
        }
        self.element_close_indent = ctx.indent();
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
                if self.struct_style.has_key() {
                    self.read_key(ctx, name)?;
                }
                let mut out = String::new();
                ctx.scanf("%qs", &mut [ScanArg::QuotedStr(&mut out)])?;
                self.read_key_close(ctx)?;
                ctx.scanf(", \\ ", &mut [])?;
                if let Some(slot) = value.as_string_mut() {
                    *slot = out;
                }
            } else {
                ctx.write_indent()?;
                if self.struct_style.has_key() {
                    self.write_key(ctx, name)?;
                }
                ctx.printf("%qs", &[PrintArg::QuotedStr(&text)])?;
                self.write_key_close(ctx)?;
                ctx.write_str(", \\\n")?;
            }
            return Ok(());
        }

        // Scalar arrays.
        if value.is_array() {
            let len = value.count();
            let wrap = ctx.column_wrap() as usize;
            for idx in 0..len {
                if ctx.is_reading() {
                    if wrap > 0 && idx % wrap == 0 {
                        ctx.scanf("\\ ", &mut [])?;
                    }
                    if self.array_style.has_index() {
                        let mut found = 0i64;
                        if self.array_style.indices_are_pairs() {
                            ctx.scanf("( %ld, ", &mut [ScanArg::I64(&mut found)])?;
                        } else {
                            ctx.scanf("%ld : ", &mut [ScanArg::I64(&mut found)])?;
                        }
                        if found != idx as i64 {
                            return Err(SerializeError::BadValue(format!(
                                "array index mismatch: stream has {found}, expected {idx}"
                            )));
                        }
                    }
                    ctx.scan_elem(value, idx, None)?;
                    if self.array_style.has_index() && self.array_style.indices_are_pairs() {
                        ctx.scanf(")", &mut [])?;
                    }
                    ctx.scanf(", ", &mut [])?;
                } else {
                    if wrap > 0 && idx % wrap == 0 {
                        ctx.write_str("\\\n")?;
                        ctx.write_indent()?;
                    }
                    if self.array_style.has_index() {
                        if self.array_style.indices_are_pairs() {
                            ctx.write_str(&format!("( {idx}, "))?;
                        } else {
                            ctx.write_str(&format!("{idx} : "))?;
                        }
                    }
                    ctx.print_elem(value, idx)?;
                    if self.array_style.has_index() && self.array_style.indices_are_pairs() {
                        ctx.write_str(" )")?;
                    }
                    ctx.write_str(", ")?;
                }
            }
            return Ok(());
        }

        // Plain fields; chars go through their integer codes.
        if ctx.is_reading() {
            if self.struct_style.has_key() {
                self.read_key(ctx, name)?;
            }
            ctx.scan_elem(value, 0, None)?;
            self.read_key_close(ctx)?;
            ctx.scanf(", \\ ", &mut [])?;
        } else {
            ctx.write_indent()?;
            if self.struct_style.has_key() {
                self.write_key(ctx, name)?;
            }
            ctx.print_elem(value, 0)?;
            self.write_key_close(ctx)?;
            ctx.write_str(", \\\n")?;
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
        if !self.struct_array_style.has_index() {
            return Ok(());
        }
        ctx.indent_decr();
        if self.struct_array_style == SeqStyle::Dict {
            return Ok(());
        }
        if ctx.is_reading() {
            if self.struct_array_style.indices_are_pairs() {
                ctx.scanf(")", &mut [])?;
            }
            ctx.scanf(",\\ ", &mut [])?;
        } else {
            ctx.write_indent()?;
            if self.struct_array_style.indices_are_pairs() {
                ctx.write_str(")")?;
            }
            ctx.write_str(",\\\n")?;
        }
        Ok(())
    }

    fn end_struct_array(&mut self, ctx: &mut SerializeCtx) -> Result<()> {
        ctx.indent_decr();
        if ctx.is_reading() {
            ctx.scanf(self.struct_array_style.close(), &mut [])?;
            self.read_key_close(ctx)?;
            ctx.scanf(",\\ ", &mut [])?;
        } else {
            ctx.write_indent()?;
            ctx.write_str(self.struct_array_style.close())?;
            self.write_key_close(ctx)?;
            ctx.write_str(",\\\n")?;
        }
        Ok(())
    }

    fn end_array(
        &mut self,
        ctx: &mut SerializeCtx,
        _ty: hris_serialize::SerializeType,
        _name: &str,
        _len: usize,
    ) -> Result<()> {
        ctx.indent_decr();
        if ctx.is_reading() {
            ctx.scanf("\\ ", &mut [])?;
            ctx.scanf(self.array_style.close(), &mut [])?;
            self.read_key_close(ctx)?;
            ctx.scanf(",\\ ", &mut [])?;
        } else {
            ctx.write_str("\\\n")?;
            ctx.write_indent()?;
            ctx.write_str(self.array_style.close())?;
            self.write_key_close(ctx)?;
            ctx.write_str(",\\\n")?;
        }
        Ok(())
    }

    fn end_type(&mut self, ctx: &mut SerializeCtx) -> Result<()> {
        ctx.indent_decr();
        let root = ctx.nesting_level() == 1;
        let closes_element = ctx.indent() == self.element_close_indent;
        if root || closes_element {
            if ctx.is_reading() {
                ctx.scanf(self.struct_style.close(), &mut [])?;
                if closes_element {
                    ctx.scanf(",\\ ", &mut [])?;
                } else {
                    ctx.scanf(" ", &mut [])?;
                }
            } else {
                ctx.write_indent()?;
                ctx.write_str(self.struct_style.close())?;
                if closes_element {
                    ctx.write_str(",\\\n")?;
                } else {
                    ctx.write_str("\n")?;
                }
            }
            self.element_close_indent = -1;
            return Ok(());
        }

        // Nested structure.
        if ctx.is_reading() {
            ctx.scanf(self.struct_style.close(), &mut [])?;
            if self.struct_style.has_key() && self.struct_style != StructStyle::Dict {
                self.read_key_close(ctx)?;
            }
            ctx.scanf(", \\ ", &mut [])?;
        } else {
            ctx.write_indent()?;
            ctx.write_str(self.struct_style.close())?;
            if self.struct_style.has_key() && self.struct_style != StructStyle::Dict {
                self.write_key_close(ctx)?;
            }
            ctx.write_str(", \\\n")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn struct_styles_parse_and_bracket() {
        let dict = StructStyle::parse("AS_DICT").unwrap();
        assert_eq!((dict.open(), dict.close()), ("{", "}"));
        assert!(dict.has_key());
        assert!(!dict.keys_are_pairs());

        let tuple = StructStyle::parse("AS_TUPLE").unwrap();
        assert!(tuple.keys_are_pairs());

        let bare = StructStyle::parse("AS_LIST_NO_KEY").unwrap();
        assert!(!bare.has_key());

        assert!(StructStyle::parse("AS_SET").is_none());
    }

    #[test]
    fn sequence_styles_parse_with_their_prefix() {
        let a = SeqStyle::parse("ARRAY_AS_TUPLE", "ARRAY_").unwrap();
        assert!(a.has_index());
        assert!(a.indices_are_pairs());

        let sa = SeqStyle::parse("STRUCTARRAY_AS_LIST_NO_INDEX", "STRUCTARRAY_").unwrap();
        assert!(!sa.has_index());

        // The prefix must match the option it came from.
        assert!(SeqStyle::parse("ARRAY_AS_LIST", "STRUCTARRAY_").is_none());
    }
}
