//! Typed leaf values.
//!
//! [`ValueRef`] is what a serializer function hands the engine for each
//! field: a mutable view over one scalar, one scalar array, or one
//! string. The same view serves both directions — writing reads through
//! it, reading assigns through it.

use crate::error::{Result, SerializeError};

/// Closed set of primitive wire types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerializeType {
    Char,
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    Long,
    ULong,
    I64,
    U64,
    F32,
    F64,
    LongDouble,
    Str,
    CharArray,
    I8Array,
    U8Array,
    I16Array,
    U16Array,
    I32Array,
    U32Array,
    LongArray,
    ULongArray,
    I64Array,
    U64Array,
    F32Array,
    F64Array,
    LongDoubleArray,
}

impl SerializeType {
    pub fn is_array(self) -> bool {
        matches!(
            self,
            SerializeType::CharArray
                | SerializeType::I8Array
                | SerializeType::U8Array
                | SerializeType::I16Array
                | SerializeType::U16Array
                | SerializeType::I32Array
                | SerializeType::U32Array
                | SerializeType::LongArray
                | SerializeType::ULongArray
                | SerializeType::I64Array
                | SerializeType::U64Array
                | SerializeType::F32Array
                | SerializeType::F64Array
                | SerializeType::LongDoubleArray
        )
    }

    /// The scalar type of an array element; identity for scalars.
    pub fn element(self) -> SerializeType {
        match self {
            SerializeType::CharArray => SerializeType::Char,
            SerializeType::I8Array => SerializeType::I8,
            SerializeType::U8Array => SerializeType::U8,
            SerializeType::I16Array => SerializeType::I16,
            SerializeType::U16Array => SerializeType::U16,
            SerializeType::I32Array => SerializeType::I32,
            SerializeType::U32Array => SerializeType::U32,
            SerializeType::LongArray => SerializeType::Long,
            SerializeType::ULongArray => SerializeType::ULong,
            SerializeType::I64Array => SerializeType::I64,
            SerializeType::U64Array => SerializeType::U64,
            SerializeType::F32Array => SerializeType::F32,
            SerializeType::F64Array => SerializeType::F64,
            SerializeType::LongDoubleArray => SerializeType::LongDouble,
            other => other,
        }
    }

    /// C-style type tag used by the text formats' `WITH_TYPE` option and
    /// the XML `type="…"` attribute.
    pub fn tag(self) -> &'static str {
        match self.element() {
            SerializeType::Char => "char",
            SerializeType::I8 => "signed_char",
            SerializeType::U8 => "unsigned_char",
            SerializeType::I16 => "short_int",
            SerializeType::U16 => "short_unsigned",
            SerializeType::I32 => "int",
            SerializeType::U32 => "unsigned_int",
            SerializeType::Long => "long_int",
            SerializeType::ULong => "long_unsigned_int",
            SerializeType::I64 => "long_long",
            SerializeType::U64 => "long_long_unsigned",
            SerializeType::F32 => "float",
            SerializeType::F64 => "double",
            SerializeType::LongDouble => "long_double",
            SerializeType::Str => "string",
            _ => unreachable!(),
        }
    }
}

/// Mutable view over one field of a user value.
///
/// `Long`/`ULong` are carried as 64-bit storage; `LongDouble` as `f64`
/// (Rust has no wider stable float).
pub enum ValueRef<'a> {
    Char(&'a mut u8),
    I8(&'a mut i8),
    U8(&'a mut u8),
    I16(&'a mut i16),
    U16(&'a mut u16),
    I32(&'a mut i32),
    U32(&'a mut u32),
    Long(&'a mut i64),
    ULong(&'a mut u64),
    I64(&'a mut i64),
    U64(&'a mut u64),
    F32(&'a mut f32),
    F64(&'a mut f64),
    LongDouble(&'a mut f64),
    Str(&'a mut String),
    CharArray(&'a mut [u8]),
    I8Array(&'a mut [i8]),
    U8Array(&'a mut [u8]),
    I16Array(&'a mut [i16]),
    U16Array(&'a mut [u16]),
    I32Array(&'a mut [i32]),
    U32Array(&'a mut [u32]),
    LongArray(&'a mut [i64]),
    ULongArray(&'a mut [u64]),
    I64Array(&'a mut [i64]),
    U64Array(&'a mut [u64]),
    F32Array(&'a mut [f32]),
    F64Array(&'a mut [f64]),
    LongDoubleArray(&'a mut [f64]),
}

impl<'a> ValueRef<'a> {
    pub fn ty(&self) -> SerializeType {
        match self {
            ValueRef::Char(_) => SerializeType::Char,
            ValueRef::I8(_) => SerializeType::I8,
            ValueRef::U8(_) => SerializeType::U8,
            ValueRef::I16(_) => SerializeType::I16,
            ValueRef::U16(_) => SerializeType::U16,
            ValueRef::I32(_) => SerializeType::I32,
            ValueRef::U32(_) => SerializeType::U32,
            ValueRef::Long(_) => SerializeType::Long,
            ValueRef::ULong(_) => SerializeType::ULong,
            ValueRef::I64(_) => SerializeType::I64,
            ValueRef::U64(_) => SerializeType::U64,
            ValueRef::F32(_) => SerializeType::F32,
            ValueRef::F64(_) => SerializeType::F64,
            ValueRef::LongDouble(_) => SerializeType::LongDouble,
            ValueRef::Str(_) => SerializeType::Str,
            ValueRef::CharArray(_) => SerializeType::CharArray,
            ValueRef::I8Array(_) => SerializeType::I8Array,
            ValueRef::U8Array(_) => SerializeType::U8Array,
            ValueRef::I16Array(_) => SerializeType::I16Array,
            ValueRef::U16Array(_) => SerializeType::U16Array,
            ValueRef::I32Array(_) => SerializeType::I32Array,
            ValueRef::U32Array(_) => SerializeType::U32Array,
            ValueRef::LongArray(_) => SerializeType::LongArray,
            ValueRef::ULongArray(_) => SerializeType::ULongArray,
            ValueRef::I64Array(_) => SerializeType::I64Array,
            ValueRef::U64Array(_) => SerializeType::U64Array,
            ValueRef::F32Array(_) => SerializeType::F32Array,
            ValueRef::F64Array(_) => SerializeType::F64Array,
            ValueRef::LongDoubleArray(_) => SerializeType::LongDoubleArray,
        }
    }

    pub fn is_array(&self) -> bool {
        self.ty().is_array()
    }

    /// Char-kind values serialize as integer codes in the text formats.
    pub fn is_char_kind(&self) -> bool {
        matches!(
            self.ty().element(),
            SerializeType::Char | SerializeType::I8 | SerializeType::U8
        )
    }

    /// Number of elements: array length, 1 for scalars and strings.
    pub fn count(&self) -> usize {
        match self {
            ValueRef::CharArray(a) | ValueRef::U8Array(a) => a.len(),
            ValueRef::I8Array(a) => a.len(),
            ValueRef::I16Array(a) => a.len(),
            ValueRef::U16Array(a) => a.len(),
            ValueRef::I32Array(a) => a.len(),
            ValueRef::U32Array(a) => a.len(),
            ValueRef::LongArray(a) | ValueRef::I64Array(a) => a.len(),
            ValueRef::ULongArray(a) | ValueRef::U64Array(a) => a.len(),
            ValueRef::F32Array(a) => a.len(),
            ValueRef::F64Array(a) | ValueRef::LongDoubleArray(a) => a.len(),
            _ => 1,
        }
    }

    /// Textual form of element `idx`. Char kinds render their integer
    /// code; floats render in shortest round-trip form.
    pub fn elem_text(&self, idx: usize) -> String {
        match self {
            ValueRef::Char(v) | ValueRef::U8(v) => (**v).to_string(),
            ValueRef::I8(v) => (**v).to_string(),
            ValueRef::I16(v) => (**v).to_string(),
            ValueRef::U16(v) => (**v).to_string(),
            ValueRef::I32(v) => (**v).to_string(),
            ValueRef::U32(v) => (**v).to_string(),
            ValueRef::Long(v) | ValueRef::I64(v) => (**v).to_string(),
            ValueRef::ULong(v) | ValueRef::U64(v) => (**v).to_string(),
            ValueRef::F32(v) => float_text(f64::from(**v)),
            ValueRef::F64(v) | ValueRef::LongDouble(v) => float_text(**v),
            ValueRef::Str(v) => (*v).clone(),
            ValueRef::CharArray(a) | ValueRef::U8Array(a) => a[idx].to_string(),
            ValueRef::I8Array(a) => a[idx].to_string(),
            ValueRef::I16Array(a) => a[idx].to_string(),
            ValueRef::U16Array(a) => a[idx].to_string(),
            ValueRef::I32Array(a) => a[idx].to_string(),
            ValueRef::U32Array(a) => a[idx].to_string(),
            ValueRef::LongArray(a) | ValueRef::I64Array(a) => a[idx].to_string(),
            ValueRef::ULongArray(a) | ValueRef::U64Array(a) => a[idx].to_string(),
            ValueRef::F32Array(a) => float_text(f64::from(a[idx])),
            ValueRef::F64Array(a) | ValueRef::LongDoubleArray(a) => float_text(a[idx]),
        }
    }

    /// Assign element `idx` from a textual token.
    pub fn set_elem_text(&mut self, idx: usize, token: &str) -> Result<()> {
        fn parse<T: std::str::FromStr>(token: &str) -> Result<T> {
            token.trim().parse().map_err(|_| {
                SerializeError::BadValue(format!("'{token}' is not a valid number"))
            })
        }
        match self {
            ValueRef::Char(v) | ValueRef::U8(v) => **v = parse::<u8>(token)?,
            ValueRef::I8(v) => **v = parse::<i8>(token)?,
            ValueRef::I16(v) => **v = parse::<i16>(token)?,
            ValueRef::U16(v) => **v = parse::<u16>(token)?,
            ValueRef::I32(v) => **v = parse::<i32>(token)?,
            ValueRef::U32(v) => **v = parse::<u32>(token)?,
            ValueRef::Long(v) | ValueRef::I64(v) => **v = parse::<i64>(token)?,
            ValueRef::ULong(v) | ValueRef::U64(v) => **v = parse::<u64>(token)?,
            ValueRef::F32(v) => **v = parse::<f32>(token)?,
            ValueRef::F64(v) | ValueRef::LongDouble(v) => **v = parse::<f64>(token)?,
            ValueRef::Str(v) => {
                v.clear();
                v.push_str(token);
            }
            ValueRef::CharArray(a) | ValueRef::U8Array(a) => a[idx] = parse::<u8>(token)?,
            ValueRef::I8Array(a) => a[idx] = parse::<i8>(token)?,
            ValueRef::I16Array(a) => a[idx] = parse::<i16>(token)?,
            ValueRef::U16Array(a) => a[idx] = parse::<u16>(token)?,
            ValueRef::I32Array(a) => a[idx] = parse::<i32>(token)?,
            ValueRef::U32Array(a) => a[idx] = parse::<u32>(token)?,
            ValueRef::LongArray(a) | ValueRef::I64Array(a) => a[idx] = parse::<i64>(token)?,
            ValueRef::ULongArray(a) | ValueRef::U64Array(a) => a[idx] = parse::<u64>(token)?,
            ValueRef::F32Array(a) => a[idx] = parse::<f32>(token)?,
            ValueRef::F64Array(a) | ValueRef::LongDoubleArray(a) => {
                a[idx] = parse::<f64>(token)?;
            }
        }
        Ok(())
    }

    /// Assign element `idx` going through `f64`, with range checks. The
    /// Matlab decoder parses everything as a double first.
    pub fn set_elem_f64(&mut self, idx: usize, value: f64) -> Result<()> {
        fn ranged<T: TryFrom<i64>>(value: f64) -> Result<T> {
            let as_int = value as i64;
            T::try_from(as_int).map_err(|_| {
                SerializeError::BadValue(format!("{value} is out of range"))
            })
        }
        match self {
            ValueRef::Char(v) | ValueRef::U8(v) => **v = ranged(value)?,
            ValueRef::I8(v) => **v = ranged(value)?,
            ValueRef::I16(v) => **v = ranged(value)?,
            ValueRef::U16(v) => **v = ranged(value)?,
            ValueRef::I32(v) => **v = ranged(value)?,
            ValueRef::U32(v) => **v = ranged(value)?,
            ValueRef::Long(v) | ValueRef::I64(v) => **v = value as i64,
            ValueRef::ULong(v) | ValueRef::U64(v) => **v = value as u64,
            ValueRef::F32(v) => **v = value as f32,
            ValueRef::F64(v) | ValueRef::LongDouble(v) => **v = value,
            ValueRef::Str(_) => {
                return Err(SerializeError::BadValue("a string is not numeric".into()));
            }
            ValueRef::CharArray(a) | ValueRef::U8Array(a) => a[idx] = ranged(value)?,
            ValueRef::I8Array(a) => a[idx] = ranged(value)?,
            ValueRef::I16Array(a) => a[idx] = ranged(value)?,
            ValueRef::U16Array(a) => a[idx] = ranged(value)?,
            ValueRef::I32Array(a) => a[idx] = ranged(value)?,
            ValueRef::U32Array(a) => a[idx] = ranged(value)?,
            ValueRef::LongArray(a) | ValueRef::I64Array(a) => a[idx] = value as i64,
            ValueRef::ULongArray(a) | ValueRef::U64Array(a) => a[idx] = value as u64,
            ValueRef::F32Array(a) => a[idx] = value as f32,
            ValueRef::F64Array(a) | ValueRef::LongDoubleArray(a) => a[idx] = value,
        }
        Ok(())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ValueRef::Str(v) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn as_string_mut(&mut self) -> Option<&mut String> {
        match self {
            ValueRef::Str(v) => Some(v),
            _ => None,
        }
    }

    /// Whether element parsing should accept float syntax.
    pub fn is_float_kind(&self) -> bool {
        matches!(
            self.ty().element(),
            SerializeType::F32 | SerializeType::F64 | SerializeType::LongDouble
        )
    }
}

/// Shortest round-trip float text; integral values print bare.
pub(crate) fn float_text(v: f64) -> String {
    if v.is_finite() && v == v.trunc() && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{v}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn char_kinds_render_integer_codes() {
        let mut c = b'A';
        let v = ValueRef::Char(&mut c);
        assert!(v.is_char_kind());
        assert_eq!(v.elem_text(0), "65");
    }

    #[test]
    fn array_views_expose_length_and_elements() {
        let mut a = [7i32, -3, 12];
        let mut v = ValueRef::I32Array(&mut a);
        assert!(v.is_array());
        assert_eq!(v.count(), 3);
        assert_eq!(v.elem_text(1), "-3");
        v.set_elem_text(2, "99").unwrap();
        assert_eq!(a[2], 99);
    }

    #[test]
    fn float_text_is_bare_for_integral_values() {
        assert_eq!(float_text(123.0), "123");
        assert_eq!(float_text(0.5), "0.5");
        assert_eq!(float_text(-2.25), "-2.25");
    }

    #[test]
    fn set_elem_f64_range_checks_narrow_types() {
        let mut c = 0u8;
        let mut v = ValueRef::U8(&mut c);
        v.set_elem_f64(0, 200.0).unwrap();
        assert!(v.set_elem_f64(0, 300.0).is_err());
        assert_eq!(c, 200);
    }

    #[test]
    fn element_type_of_array_matches_scalar() {
        assert_eq!(SerializeType::F64Array.element(), SerializeType::F64);
        assert_eq!(SerializeType::F64Array.tag(), "double");
        assert!(!SerializeType::Str.is_array());
    }
}
