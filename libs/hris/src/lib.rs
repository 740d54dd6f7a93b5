//! HRIS: symmetric, format-pluggable serialization over byte channels.
//!
//! This facade wires the engine to the built-in format set and
//! re-exports the public surface of the channel and serialize crates.
//!
//! ```no_run
//! use hris::{serializer, Channel, ChannelMode, ModeFlags, ValueRef, permissions};
//!
//! let mut s = serializer().unwrap();
//! let out = Channel::open("File:///tmp/point.json",
//!     ChannelMode::W_ONLY | ChannelMode::CREAT | ChannelMode::TRUNC,
//!     permissions::DEFAULT).unwrap();
//! s.set_stream(out);
//! s.set_format("Json", None).unwrap();
//! s.set_mode(ModeFlags::WRITE | ModeFlags::AUTOCALC).unwrap();
//!
//! let (mut x, mut y) = (123i32, 456i32);
//! s.begin_type("Point", "Point").unwrap();
//! s.serialize("x", &mut ValueRef::I32(&mut x)).unwrap();
//! s.serialize("y", &mut ValueRef::I32(&mut y)).unwrap();
//! s.end_type().unwrap();
//! ```

pub use hris_channel::{
    permissions, register_backend, Backend, Channel, ChannelError, ChannelKind, ChannelMode,
    ErrorKind, Interest, MemBuffer, OpenArgs, PrintArg, ScanArg,
};
pub use hris_serialize::{
    AllowedModes, FormatPlugin, Header, HeaderInfo, Mode, ModeFlags, Result, Serialize,
    SerializeCtx, SerializeError, SerializeType, StreamMode, ValueRef,
};

pub use hris_format_ascii::AsciiFormat;
pub use hris_format_binary::BinaryFormat;
pub use hris_format_json::JsonFormat;
pub use hris_format_matlab::MatlabFormat;
pub use hris_format_python::PythonFormat;
pub use hris_format_xml::XmlFormat;

/// Register the built-in format set on an engine.
pub fn register_builtin_formats(s: &mut Serialize) {
    s.register_format(Box::new(BinaryFormat::new()));
    s.register_format(Box::new(AsciiFormat::new()));
    s.register_format(Box::new(XmlFormat::new()));
    s.register_format(Box::new(MatlabFormat::new()));
    s.register_format(Box::new(PythonFormat::new()));
    s.register_format(Box::new(JsonFormat::new()));
}

/// An engine with every built-in format registered.
pub fn serializer() -> Result<Serialize> {
    let mut s = Serialize::new()?;
    register_builtin_formats(&mut s);
    Ok(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_formats_are_all_registered() {
        let s = serializer().unwrap();
        for name in ["Binary", "Ascii", "Xml", "Matlab", "Python", "Json"] {
            assert!(s.is_format_defined(name), "{name} missing");
        }
        assert!(!s.is_format_defined("Yaml"));
    }

    #[test]
    fn later_registration_overrides_earlier() {
        let mut s = serializer().unwrap();
        s.register_format(Box::new(JsonFormat::new()));
        s.set_format("Json", None).unwrap();
        assert_eq!(s.format_name(), Some("Json"));
    }
}
