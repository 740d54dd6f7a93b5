//! Binary format: wire-compact, endian-aware.
//!
//! Scalars go out in their natural width in the configured byte order
//! (`LITTLE_ENDIAN` / `BIG_ENDIAN` option, reflected into the header so
//! a reader on any host restores the values). Strings carry a 16-bit
//! length prefix; arrays are back-to-back elements with no framing;
//! structure boundaries emit nothing at all.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use hris_serialize::{
    AllowedModes, FormatPlugin, Result, SerializeCtx, SerializeError, ValueRef,
};

pub const FORMAT_NAME: &str = "Binary";

pub const OPT_LITTLE_ENDIAN: &str = "LITTLE_ENDIAN";
pub const OPT_BIG_ENDIAN: &str = "BIG_ENDIAN";

/// Maximum encodable string payload, limited by the 16-bit prefix.
pub const STRING_MAXLEN: usize = u16::MAX as usize;

pub struct BinaryFormat {
    little_endian: bool,
}

impl BinaryFormat {
    pub fn new() -> Self {
        BinaryFormat { little_endian: cfg!(target_endian = "little") }
    }

    pub fn is_little_endian(&self) -> bool {
        self.little_endian
    }

    fn put_uint(&self, ctx: &mut SerializeCtx, bits: u64, size: usize) -> Result<()> {
        let mut buf = [0u8; 8];
        if self.little_endian {
            LittleEndian::write_uint(&mut buf, bits, size);
        } else {
            BigEndian::write_uint(&mut buf, bits, size);
        }
        ctx.write_bytes(&buf[..size])
    }

    fn get_uint(&self, ctx: &mut SerializeCtx, size: usize) -> Result<u64> {
        let mut buf = [0u8; 8];
        ctx.read_exact(&mut buf[..size])?;
        Ok(if self.little_endian {
            LittleEndian::read_uint(&buf, size)
        } else {
            BigEndian::read_uint(&buf, size)
        })
    }
}

impl Default for BinaryFormat {
    fn default() -> Self {
        Self::new()
    }
}

/// One fixed-width lane: widen to raw bits on write, narrow on read.
macro_rules! lane {
    ($self:ident, $ctx:ident, $writing:expr, $slot:expr, $t:ty, $raw:ty, $size:expr) => {{
        if $writing {
            $self.put_uint($ctx, (*$slot as $raw) as u64, $size)?;
        } else {
            *$slot = $self.get_uint($ctx, $size)? as $raw as $t;
        }
    }};
}

macro_rules! lane_f32 {
    ($self:ident, $ctx:ident, $writing:expr, $slot:expr) => {{
        if $writing {
            $self.put_uint($ctx, u64::from($slot.to_bits()), 4)?;
        } else {
            *$slot = f32::from_bits($self.get_uint($ctx, 4)? as u32);
        }
    }};
}

macro_rules! lane_f64 {
    ($self:ident, $ctx:ident, $writing:expr, $slot:expr) => {{
        if $writing {
            $self.put_uint($ctx, $slot.to_bits(), 8)?;
        } else {
            *$slot = f64::from_bits($self.get_uint($ctx, 8)?);
        }
    }};
}

impl FormatPlugin for BinaryFormat {
    fn name(&self) -> &'static str {
        FORMAT_NAME
    }

    fn allowed_modes(&self) -> AllowedModes {
        AllowedModes::CALC
    }

    /// `LITTLE_ENDIAN` / `BIG_ENDIAN`. Anything else falls back to the
    /// historical defaults: host order when writing, big-endian when
    /// reading. The effective order lands in the header opts.
    fn options_set(&mut self, ctx: &mut SerializeCtx, opts: Option<&str>) -> Result<()> {
        self.little_endian = match opts {
            Some(OPT_LITTLE_ENDIAN) => true,
            Some(OPT_BIG_ENDIAN) => false,
            Some(other) => {
                tracing::debug!(
                    opts = other,
                    "unrecognized endianness option, using the defaults"
                );
                if ctx.is_writing() {
                    cfg!(target_endian = "little")
                } else {
                    false
                }
            }
            None => false,
        };
        ctx.set_header_opts(if self.little_endian {
            OPT_LITTLE_ENDIAN
        } else {
            OPT_BIG_ENDIAN
        });
        Ok(())
    }

    fn options_clear(&mut self) {
        self.little_endian = cfg!(target_endian = "little");
    }

    fn begin_type(&mut self, _ctx: &mut SerializeCtx, _name: &str, _type_tag: &str) -> Result<()> {
        Ok(())
    }

    fn serialize(
        &mut self,
        ctx: &mut SerializeCtx,
        _name: &str,
        value: &mut ValueRef<'_>,
    ) -> Result<()> {
        let writing = ctx.is_writing();
        match value {
            // Single-byte kinds need no swapping.
            ValueRef::Char(v) | ValueRef::U8(v) => {
                if writing {
                    ctx.write_bytes(&[**v])?;
                } else {
                    let mut b = [0u8; 1];
                    ctx.read_exact(&mut b)?;
                    **v = b[0];
                }
            }
            ValueRef::I8(v) => {
                if writing {
                    ctx.write_bytes(&[**v as u8])?;
                } else {
                    let mut b = [0u8; 1];
                    ctx.read_exact(&mut b)?;
                    **v = b[0] as i8;
                }
            }
            ValueRef::CharArray(a) | ValueRef::U8Array(a) => {
                if writing {
                    ctx.write_bytes(&a[..])?;
                } else {
                    ctx.read_exact(&mut a[..])?;
                }
            }
            ValueRef::I8Array(a) => {
                if writing {
                    let bytes: Vec<u8> = a.iter().map(|&v| v as u8).collect();
                    ctx.write_bytes(&bytes)?;
                } else {
                    let mut bytes = vec![0u8; a.len()];
                    ctx.read_exact(&mut bytes)?;
                    for (dst, src) in a.iter_mut().zip(bytes) {
                        *dst = src as i8;
                    }
                }
            }

            ValueRef::Str(s) => {
                if writing {
                    let bytes = s.as_bytes();
                    if bytes.len() > STRING_MAXLEN {
                        return Err(SerializeError::BadValue(format!(
                            "string of {} bytes exceeds the 16-bit length prefix",
                            bytes.len()
                        )));
                    }
                    self.put_uint(ctx, bytes.len() as u64, 2)?;
                    if !bytes.is_empty() {
                        ctx.write_bytes(bytes)?;
                    }
                } else {
                    let len = self.get_uint(ctx, 2)? as usize;
                    s.clear();
                    if len > 0 {
                        let mut bytes = vec![0u8; len];
                        ctx.read_exact(&mut bytes)?;
                        s.push_str(&String::from_utf8_lossy(&bytes));
                    }
                }
            }

            ValueRef::I16(v) => lane!(self, ctx, writing, *v, i16, u16, 2),
            ValueRef::U16(v) => lane!(self, ctx, writing, *v, u16, u16, 2),
            ValueRef::I32(v) => lane!(self, ctx, writing, *v, i32, u32, 4),
            ValueRef::U32(v) => lane!(self, ctx, writing, *v, u32, u32, 4),
            ValueRef::Long(v) | ValueRef::I64(v) => lane!(self, ctx, writing, *v, i64, u64, 8),
            ValueRef::ULong(v) | ValueRef::U64(v) => lane!(self, ctx, writing, *v, u64, u64, 8),
            ValueRef::F32(v) => lane_f32!(self, ctx, writing, (*v)),
            ValueRef::F64(v) => lane_f64!(self, ctx, writing, (*v)),

            ValueRef::I16Array(a) => {
                for v in a.iter_mut() {
                    lane!(self, ctx, writing, v, i16, u16, 2);
                }
            }
            ValueRef::U16Array(a) => {
                for v in a.iter_mut() {
                    lane!(self, ctx, writing, v, u16, u16, 2);
                }
            }
            ValueRef::I32Array(a) => {
                for v in a.iter_mut() {
                    lane!(self, ctx, writing, v, i32, u32, 4);
                }
            }
            ValueRef::U32Array(a) => {
                for v in a.iter_mut() {
                    lane!(self, ctx, writing, v, u32, u32, 4);
                }
            }
            ValueRef::LongArray(a) | ValueRef::I64Array(a) => {
                for v in a.iter_mut() {
                    lane!(self, ctx, writing, v, i64, u64, 8);
                }
            }
            ValueRef::ULongArray(a) | ValueRef::U64Array(a) => {
                for v in a.iter_mut() {
                    lane!(self, ctx, writing, v, u64, u64, 8);
                }
            }
            ValueRef::F32Array(a) => {
                for v in a.iter_mut() {
                    lane_f32!(self, ctx, writing, v);
                }
            }
            ValueRef::F64Array(a) => {
                for v in a.iter_mut() {
                    lane_f64!(self, ctx, writing, v);
                }
            }

            ValueRef::LongDouble(_) | ValueRef::LongDoubleArray(_) => {
                tracing::warn!("long double is not supported by the Binary format");
            }
        }
        Ok(())
    }

    fn end_type(&mut self, _ctx: &mut SerializeCtx) -> Result<()> {
        Ok(())
    }
}
