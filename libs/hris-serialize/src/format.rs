//! Format plugin contract.
//!
//! A plugin implements read, write and calc symmetrically: the same
//! callbacks run in every direction and consult
//! [`SerializeCtx::mode`](crate::SerializeCtx::mode) where behaviour
//! differs. Calc is the write path against the counting sink, so a
//! plugin that writes through the context automatically supports it.

use crate::engine::SerializeCtx;
use crate::error::Result;
use crate::value::{SerializeType, ValueRef};

bitflags::bitflags! {
    /// What a plugin claims to support beyond plain read/write.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AllowedModes: u32 {
        const CALC = 1 << 0;
        const TRANSLATE = 1 << 1;
    }
}

/// One serialization format.
///
/// The `begin`/`end` pairs bracket composite values; `serialize` emits
/// or consumes one leaf. Struct arrays additionally bracket every
/// element with the separator pair so a format can emit indices or
/// delimiters.
pub trait FormatPlugin: Send {
    fn name(&self) -> &'static str;

    /// Every built-in format supports calc; none supports translate.
    fn allowed_modes(&self) -> AllowedModes {
        AllowedModes::CALC
    }

    /// Apply an option string (`"LITTLE_ENDIAN"`, `"WITH_TYPE=TRUE"`, …).
    /// Called on format selection, also with the opts carried by a
    /// header being read.
    fn options_set(&mut self, _ctx: &mut SerializeCtx, _opts: Option<&str>) -> Result<()> {
        Ok(())
    }

    fn options_set_property(&mut self, _name: &str, _value: &str) -> bool {
        false
    }

    fn options_get_property(&self, _name: &str) -> Option<String> {
        None
    }

    fn options_clear(&mut self) {}

    fn begin_type(&mut self, ctx: &mut SerializeCtx, name: &str, type_tag: &str) -> Result<()>;

    /// Base-type variant: the fields of the nested value merge into the
    /// enclosing scope instead of opening a new one.
    fn begin_base_type(
        &mut self,
        _ctx: &mut SerializeCtx,
        _name: &str,
        _type_tag: &str,
    ) -> Result<()> {
        Ok(())
    }

    fn begin_array(
        &mut self,
        _ctx: &mut SerializeCtx,
        _ty: SerializeType,
        _name: &str,
        _len: usize,
    ) -> Result<()> {
        Ok(())
    }

    fn begin_struct_array(
        &mut self,
        _ctx: &mut SerializeCtx,
        _name: &str,
        _element_type: &str,
        _len: usize,
    ) -> Result<()> {
        Ok(())
    }

    fn begin_struct_array_separator(
        &mut self,
        _ctx: &mut SerializeCtx,
        _name: &str,
        _position: usize,
        _len: usize,
    ) -> Result<()> {
        Ok(())
    }

    fn serialize(&mut self, ctx: &mut SerializeCtx, name: &str, value: &mut ValueRef<'_>)
        -> Result<()>;

    fn end_struct_array_separator(
        &mut self,
        _ctx: &mut SerializeCtx,
        _name: &str,
        _position: usize,
        _len: usize,
    ) -> Result<()> {
        Ok(())
    }

    fn end_struct_array(&mut self, _ctx: &mut SerializeCtx) -> Result<()> {
        Ok(())
    }

    fn end_array(
        &mut self,
        _ctx: &mut SerializeCtx,
        _ty: SerializeType,
        _name: &str,
        _len: usize,
    ) -> Result<()> {
        Ok(())
    }

    fn end_base_type(&mut self, _ctx: &mut SerializeCtx) -> Result<()> {
        Ok(())
    }

    fn end_type(&mut self, ctx: &mut SerializeCtx) -> Result<()>;
}
