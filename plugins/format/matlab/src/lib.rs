//! Matlab format: `dotted.path = value ;` assignment lines.
//!
//! ```text
//! point.x = 7 ;
//! point.y = 8 ;
//! pose.positions(1).x = 1 ;
//! pose.positions(2).x = 2 ;
//! ```
//!
//! Nested structures extend a dotted prefix; struct arrays use Matlab's
//! 1-based `name(i)` indexing; scalar arrays render as row vectors
//! `name = [ v0 v1 ] ;`. Values parse through `double` on read, with
//! range checks when narrowing. A blank line closes each top-level
//! object.

use hris_serialize::{FormatPlugin, Result, ScanArg, SerializeCtx, ValueRef};

pub const FORMAT_NAME: &str = "Matlab";

#[derive(Default)]
pub struct MatlabFormat {
    /// Dotted path including the trailing dot, e.g. `pose.positions(2).`.
    prefix: String,
    /// Segments currently stacked in `prefix`.
    prefix_depth: u32,
    /// Per struct-nesting level: is the next `begin_type` a struct-array
    /// element (its name already lives in the prefix)?
    element_levels: Vec<bool>,
    level: usize,
}

impl MatlabFormat {
    pub fn new() -> Self {
        Self::default()
    }

    fn element_flag(&mut self, level: usize) -> bool {
        if level >= self.element_levels.len() {
            self.element_levels.resize(level + 1, false);
        }
        self.element_levels[level]
    }

    fn set_element_flag(&mut self, level: usize, value: bool) {
        if level >= self.element_levels.len() {
            self.element_levels.resize(level + 1, false);
        }
        self.element_levels[level] = value;
    }

    fn append_prefix(&mut self, segment: &str) {
        self.prefix.push_str(segment);
        self.prefix.push('.');
        self.prefix_depth += 1;
    }

    /// Drop the innermost prefix segment; an empty prefix closes the
    /// object with a blank line.
    fn remove_prefix(&mut self, ctx: &mut SerializeCtx) -> Result<()> {
        self.prefix_depth -= 1;
        if self.prefix_depth == 0 {
            self.prefix.clear();
            if ctx.is_reading() {
                ctx.scanf("\n", &mut [])?;
            } else {
                ctx.write_str("\n")?;
            }
            return Ok(());
        }
        self.prefix.pop(); // trailing dot
        match self.prefix.rfind('.') {
            Some(pos) => self.prefix.truncate(pos + 1),
            None => self.prefix.clear(),
        }
        Ok(())
    }

    fn write_scalar_line(
        &self,
        ctx: &mut SerializeCtx,
        name: &str,
        value: &ValueRef<'_>,
    ) -> Result<()> {
        ctx.write_str(&self.prefix)?;
        ctx.write_str(&format!("{name} = "))?;
        ctx.print_elem(value, 0)?;
        ctx.write_str(" ;\n")
    }

    fn write_vector_line(
        &self,
        ctx: &mut SerializeCtx,
        name: &str,
        value: &ValueRef<'_>,
    ) -> Result<()> {
        ctx.write_str(&self.prefix)?;
        ctx.write_str(&format!("{name} = [ "))?;
        for idx in 0..value.count() {
            ctx.print_elem(value, idx)?;
            ctx.write_str(" ")?;
        }
        ctx.write_str("] ;\n")
    }

    /// Parse one numeric token through f64, then narrow with checks.
    fn read_elem_via_double(
        &self,
        ctx: &mut SerializeCtx,
        value: &mut ValueRef<'_>,
        idx: usize,
    ) -> Result<()> {
        let token = ctx.scan_token(true, None)?;
        let parsed: f64 = token.trim().parse().map_err(|_| {
            hris_serialize::SerializeError::BadValue(format!("'{token}' is not a number"))
        })?;
        value.set_elem_f64(idx, parsed)
    }
}

impl FormatPlugin for MatlabFormat {
    fn name(&self) -> &'static str {
        FORMAT_NAME
    }

    fn options_clear(&mut self) {
        self.prefix.clear();
        self.prefix_depth = 0;
        self.element_levels.clear();
        self.level = 0;
    }

    fn begin_type(&mut self, _ctx: &mut SerializeCtx, name: &str, _type_tag: &str) -> Result<()> {
        if !self.element_flag(self.level) {
            self.append_prefix(name);
        }
        self.level += 1;
        self.set_element_flag(self.level, false);
        Ok(())
    }

    fn begin_struct_array(
        &mut self,
        _ctx: &mut SerializeCtx,
        _name: &str,
        _element_type: &str,
        _len: usize,
    ) -> Result<()> {
        self.set_element_flag(self.level, true);
        Ok(())
    }

    fn begin_struct_array_separator(
        &mut self,
        _ctx: &mut SerializeCtx,
        name: &str,
        position: usize,
        _len: usize,
    ) -> Result<()> {
        // Matlab indices start at 1.
        let segment = format!("{name}({})", position + 1);
        if position != 0 {
            // The previous element's segment is still stacked.
            self.remove_prefix_silent();
        }
        self.append_prefix(&segment);
        Ok(())
    }

    fn serialize(
        &mut self,
        ctx: &mut SerializeCtx,
        name: &str,
        value: &mut ValueRef<'_>,
    ) -> Result<()> {
        // Strings keep Matlab's single-quoted syntax.
        if let Some(text) = value.as_str().map(str::to_string) {
            if ctx.is_reading() {
                ctx.scanf(&format!("{}{name} = ", self.prefix), &mut [])?;
                let mut out = String::new();
                ctx.scanf("%qs; ", &mut [ScanArg::QuotedStr(&mut out)])?;
                if let Some(slot) = value.as_string_mut() {
                    *slot = out;
                }
            } else {
                ctx.write_str(&self.prefix)?;
                ctx.write_str(&format!("{name} = '{text}';\n"))?;
            }
            return Ok(());
        }

        if ctx.is_reading() {
            if value.is_array() {
                ctx.scanf(&format!("{}{name} = [ ", self.prefix), &mut [])?;
                for idx in 0..value.count() {
                    self.read_elem_via_double(ctx, value, idx)?;
                }
                ctx.scanf("] ;", &mut [])?;
            } else {
                ctx.scanf(&format!("{}{name} = ", self.prefix), &mut [])?;
                self.read_elem_via_double(ctx, value, 0)?;
                ctx.scanf(";", &mut [])?;
            }
            return Ok(());
        }

        if value.is_array() {
            self.write_vector_line(ctx, name, value)
        } else {
            self.write_scalar_line(ctx, name, value)
        }
    }

    fn end_struct_array_separator(
        &mut self,
        ctx: &mut SerializeCtx,
        _name: &str,
        position: usize,
        len: usize,
    ) -> Result<()> {
        if position + 1 == len {
            self.remove_prefix(ctx)?;
        }
        Ok(())
    }

    fn end_struct_array(&mut self, _ctx: &mut SerializeCtx) -> Result<()> {
        self.set_element_flag(self.level, false);
        Ok(())
    }

    fn end_type(&mut self, ctx: &mut SerializeCtx) -> Result<()> {
        self.level -= 1;
        if !self.element_flag(self.level) {
            self.remove_prefix(ctx)?;
        }
        Ok(())
    }
}

impl MatlabFormat {
    /// Strip the innermost segment without the blank-line side effect.
    fn remove_prefix_silent(&mut self) {
        self.prefix_depth -= 1;
        self.prefix.pop();
        match self.prefix.rfind('.') {
            Some(pos) => self.prefix.truncate(pos + 1),
            None => self.prefix.clear(),
        }
    }
}
