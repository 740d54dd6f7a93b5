//! Self-describing object header.
//!
//! Every top-level value is preceded (unless disabled) by one ASCII
//! line opening with the `HRIS-` preamble and the `major.minor` version:
//!
//! ```text
//! HRIS-2.0 type = 'Point' name = point objSize =         43 format = Binary opts = 'LITTLE_ENDIAN'
//! HRIS-1.0 Point point 43 Binary LITTLE_ENDIAN
//! ```
//!
//! v2.0 is what gets written; both versions are accepted on read. The
//! `objSize` field is right-justified in ten columns so the auto-calc
//! pass can overwrite it in place once the payload size is known.

use hris_channel::refvalue::{render_value, RefValueList};

use crate::error::{Result, SerializeError};

pub const HEADER_PREAMBLE: &str = "HRIS-";
pub const HEADER_MAJOR_DEFAULT: u8 = 2;
pub const HEADER_MINOR_DEFAULT: u8 = 0;
/// Upper bound for one header line, terminator included.
pub const HEADER_MAXLEN: usize = 4096;
/// Width of the in-place patchable `objSize` field.
pub const OBJSIZE_WIDTH: usize = 10;

/// The ten-column right-justified size text the auto-calc pass patches.
pub fn objsize_field(size: u64) -> String {
    format!("{size:>10}")
}

#[derive(Debug, Default)]
pub struct Header {
    pub major: u8,
    pub minor: u8,
    fields: RefValueList,
    obj_size: u64,
    header_size: u64,
}

impl Header {
    pub fn new() -> Self {
        Header {
            major: HEADER_MAJOR_DEFAULT,
            minor: HEADER_MINOR_DEFAULT,
            ..Default::default()
        }
    }

    pub fn type_tag(&self) -> Option<&str> {
        self.fields.find("type")
    }

    pub fn name(&self) -> Option<&str> {
        self.fields.find("name")
    }

    pub fn format(&self) -> Option<&str> {
        self.fields.find("format")
    }

    pub fn opts(&self) -> Option<&str> {
        self.fields.find("opts")
    }

    pub fn obj_size(&self) -> u64 {
        self.obj_size
    }

    pub fn set_obj_size(&mut self, size: u64) {
        self.obj_size = size;
    }

    pub fn header_size(&self) -> u64 {
        self.header_size
    }

    pub fn set_header_size(&mut self, size: u64) {
        self.header_size = size;
    }

    /// Update the stored fields; `None` leaves the current value alone.
    pub fn set_info(
        &mut self,
        type_tag: Option<&str>,
        name: Option<&str>,
        opts: Option<&str>,
        format: Option<&str>,
        obj_size: u64,
    ) {
        if let Some(t) = type_tag {
            self.fields.set("type", t);
        }
        if let Some(n) = name {
            self.fields.set("name", n);
        }
        if let Some(o) = opts {
            self.fields.set("opts", o);
        }
        if let Some(f) = format {
            self.fields.set("format", f);
        }
        self.obj_size = obj_size;
    }

    pub fn set_opts(&mut self, opts: &str) {
        self.fields.set("opts", opts);
    }

    pub fn reset(&mut self) {
        self.fields.clear();
        self.obj_size = 0;
        self.header_size = 0;
        self.major = HEADER_MAJOR_DEFAULT;
        self.minor = HEADER_MINOR_DEFAULT;
    }

    /// Render the header line (without the trailing newline), in the
    /// stored version's syntax.
    pub fn render(&self) -> Result<String> {
        let type_tag = self.type_tag().ok_or(SerializeError::BadHeader)?;
        let name = self.name().ok_or(SerializeError::BadHeader)?;
        let format = self.format().ok_or(SerializeError::BadHeader)?;
        let opts = self.opts();
        let line = match (self.major, self.minor) {
            (1, 0) => format!(
                "{HEADER_PREAMBLE}1.0 {type_tag} {name} {} {format} {}",
                objsize_field(self.obj_size),
                opts.unwrap_or(""),
            ),
            _ => {
                let mut line = format!(
                    "{HEADER_PREAMBLE}{}.{} type = {} name = {} objSize = {} format = {} ",
                    self.major,
                    self.minor,
                    render_value(type_tag),
                    name,
                    objsize_field(self.obj_size),
                    format,
                );
                if let Some(opts) = opts.filter(|o| !o.is_empty()) {
                    line.push_str(&format!("opts = '{opts}'"));
                }
                line
            }
        };
        Ok(line)
    }

    /// Parse a full header line (newline already stripped). Dispatches
    /// on the version carried in the preamble.
    pub fn parse_line(&mut self, line: &str) -> Result<()> {
        let rest = line
            .strip_prefix(HEADER_PREAMBLE)
            .ok_or(SerializeError::BadHeader)?;
        let (version, rest) = rest.split_once(' ').ok_or(SerializeError::BadHeader)?;
        let (major, minor) = version.split_once('.').ok_or(SerializeError::BadHeader)?;
        self.major = major.parse().map_err(|_| SerializeError::BadHeader)?;
        self.minor = minor.parse().map_err(|_| SerializeError::BadHeader)?;

        match (self.major, self.minor) {
            (1, 0) => self.parse_v1(rest),
            (2, 0) => self.parse_v2(rest),
            _ => {
                tracing::error!(major = self.major, minor = self.minor, "unknown header version");
                Err(SerializeError::BadHeader)
            }
        }
    }

    /// v1.0: positional `type name objSize format [opts…]`.
    fn parse_v1(&mut self, rest: &str) -> Result<()> {
        let mut words = rest.split_whitespace();
        let type_tag = words.next().ok_or(SerializeError::BadHeader)?.to_string();
        let name = words.next().ok_or(SerializeError::BadHeader)?.to_string();
        let size_text = words.next().ok_or(SerializeError::BadHeader)?;
        let format = words.next().ok_or(SerializeError::BadHeader)?.to_string();
        let opts: Vec<&str> = words.collect();
        let obj_size: u64 = size_text.parse().map_err(|_| SerializeError::BadHeader)?;

        self.fields.clear();
        self.fields.set("type", &type_tag);
        self.fields.set("name", &name);
        self.fields.set("objSize", size_text);
        self.fields.set("format", &format);
        if !opts.is_empty() {
            self.fields.set("opts", &opts.join(" "));
        }
        self.obj_size = obj_size;
        Ok(())
    }

    /// v2.0: `key = value` pairs in any order.
    fn parse_v2(&mut self, rest: &str) -> Result<()> {
        self.fields.parse_pairs(rest);
        for required in ["type", "name", "format"] {
            if self.fields.find(required).is_none() {
                tracing::error!(field = required, "header lacks a required field");
                return Err(SerializeError::BadHeader);
            }
        }
        self.obj_size = self
            .fields
            .find("objSize")
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(0);
        Ok(())
    }
}

/// Parsed header snapshot returned by `peek_header`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderInfo {
    pub major: u8,
    pub minor: u8,
    pub type_tag: String,
    pub name: String,
    pub obj_size: u64,
    pub format: String,
    pub opts: Option<String>,
}

impl HeaderInfo {
    pub fn from_header(h: &Header) -> Option<Self> {
        Some(HeaderInfo {
            major: h.major,
            minor: h.minor,
            type_tag: h.type_tag()?.to_string(),
            name: h.name()?.to_string(),
            obj_size: h.obj_size(),
            format: h.format()?.to_string(),
            opts: h.opts().map(str::to_string),
        })
    }
}
