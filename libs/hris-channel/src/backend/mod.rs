//! Channel backends.
//!
//! A backend is the raw byte transport behind a [`Channel`](crate::Channel):
//! a file, a memory buffer, a socket, a pipe, … Backends are selected by
//! the scheme of the info string (`File://…`, `Tcp://host:port`, …) via a
//! process-wide registry that is populated with the built-in set on first
//! use and accepts third-party registrations (e.g. an `RTBOS://` transport)
//! at startup.

use std::collections::HashMap;
use std::io::SeekFrom;
use std::sync::{LazyLock, RwLock};
use std::time::Duration;

use crate::error::{ChannelError, ErrorKind, Result};
use crate::mode::ChannelMode;
use crate::refvalue::RefValueList;

mod ansifile;
mod calc;
mod fd;
mod file;
mod mem;
mod memmapfd;
mod null;
mod pipecmd;
mod rand;
mod shm;
mod socket;
mod stdstream;

pub use fd::poll_fd;
pub use mem::MemBuffer;

pub(crate) fn mem_backend_from(buffer: MemBuffer) -> Box<dyn Backend> {
    Box::new(mem::MemBackend::from_buffer(buffer))
}

pub(crate) fn ansi_wrap(file: std::fs::File) -> ansifile::AnsiFileBackend {
    ansifile::AnsiFileBackend::wrap(file)
}

pub(crate) fn tcp_wrap(stream: std::net::TcpStream) -> socket::TcpBackend {
    socket::TcpBackend::wrap(stream)
}

/// Semantic tag describing what kind of OS resource backs a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelKind {
    #[default]
    NotSet,
    Fd,
    Socket,
    MemPtr,
    AnsiFile,
    Generic,
}

/// Readiness interest for [`Backend::wait_ready`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interest {
    Read,
    Write,
}

/// Raw transport contract.
///
/// `read` returning 0 for a non-empty destination means end of stream.
/// Backends without a capability fail gracefully: the default `seek`
/// reports `BadSeek`, the default `patch` reports `NotSupported`, the
/// default `wait_ready` is always ready.
pub trait Backend: Send {
    fn kind(&self) -> ChannelKind;

    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    fn write(&mut self, buf: &[u8]) -> Result<usize>;

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn is_seekable(&self) -> bool {
        false
    }

    fn seek(&mut self, _pos: SeekFrom) -> Result<u64> {
        Err(ChannelError::new(ErrorKind::BadSeek))
    }

    fn close(&mut self) -> Result<()>;

    /// Written contents, for memory-backed transports.
    fn contents(&self) -> Option<&[u8]> {
        None
    }

    /// Overwrite already-written bytes in place without moving the
    /// write position. Memory-backed transports only.
    fn patch(&mut self, _offset: u64, _bytes: &[u8]) -> Result<()> {
        Err(ChannelError::new(ErrorKind::NotSupported))
    }

    fn wait_ready(&mut self, _interest: Interest, _timeout: Duration) -> Result<bool> {
        Ok(true)
    }

    fn get_property(&self, _name: &str) -> Option<String> {
        None
    }

    fn set_property(&mut self, _name: &str, _value: &str) -> Result<bool> {
        Ok(false)
    }
}

/// Everything a factory needs to open a backend.
pub struct OpenArgs<'a> {
    /// Info-string tail after `<scheme>://`.
    pub tail: &'a str,
    pub mode: ChannelMode,
    pub permissions: u32,
    /// Extra backend-specific keys from the key-value open syntax.
    pub params: &'a RefValueList,
}

pub type BackendFactory =
    Box<dyn Fn(&OpenArgs<'_>) -> Result<Box<dyn Backend>> + Send + Sync>;

static REGISTRY: LazyLock<RwLock<HashMap<String, BackendFactory>>> = LazyLock::new(|| {
    let mut map: HashMap<String, BackendFactory> = HashMap::new();
    macro_rules! builtin {
        ($name:literal, $f:path) => {
            map.insert($name.to_string(), Box::new($f) as BackendFactory);
        };
    }
    builtin!("File", file::open);
    builtin!("Mem", mem::open);
    builtin!("MemMapFd", memmapfd::open);
    builtin!("Fd", fd::open);
    builtin!("AnsiFILE", ansifile::open);
    builtin!("PipeCmd", pipecmd::open);
    builtin!("Null", null::open);
    builtin!("Calc", calc::open);
    builtin!("Rand", rand::open);
    builtin!("Shm", shm::open);
    builtin!("Tcp", socket::open_tcp);
    builtin!("Udp", socket::open_udp);
    builtin!("ServerTcp", socket::open_server_tcp);
    builtin!("ServerUdp", socket::open_server_udp);
    builtin!("Socket", socket::open_wrapped);
    builtin!("StdIn", stdstream::open_stdin);
    builtin!("StdOut", stdstream::open_stdout);
    builtin!("StdErr", stdstream::open_stderr);
    RwLock::new(map)
});

/// Register (or override) a backend under `scheme`.
///
/// The built-in table lists `RTBOS` nowhere: that transport lives outside
/// this crate and hooks itself in through this call before first use.
pub fn register_backend(
    scheme: &str,
    factory: impl Fn(&OpenArgs<'_>) -> Result<Box<dyn Backend>> + Send + Sync + 'static,
) {
    let mut reg = REGISTRY.write().expect("backend registry poisoned");
    if reg.insert(scheme.to_string(), Box::new(factory)).is_some() {
        tracing::info!(scheme, "backend registration overrides an earlier one");
    }
}

pub fn is_scheme_defined(scheme: &str) -> bool {
    REGISTRY.read().expect("backend registry poisoned").contains_key(scheme)
}

/// Split `<scheme>://<tail>`; the scheme is case-sensitive.
pub fn split_info_string(info: &str) -> Result<(&str, &str)> {
    let Some(pos) = info.find(':') else {
        return Err(ChannelError::with_context(
            ErrorKind::BadInfoString,
            format!("'{info}' has no scheme"),
        ));
    };
    let (scheme, rest) = info.split_at(pos);
    let Some(tail) = rest.strip_prefix("://") else {
        return Err(ChannelError::with_context(
            ErrorKind::MissingSlashes,
            format!("'{info}' lacks '://' after the scheme"),
        ));
    };
    if scheme.is_empty() {
        return Err(ChannelError::with_context(ErrorKind::BadInfoString, "empty scheme"));
    }
    Ok((scheme, tail))
}

/// Open a backend by scheme.
pub fn open_backend(scheme: &str, args: &OpenArgs<'_>) -> Result<Box<dyn Backend>> {
    let reg = REGISTRY.read().expect("backend registry poisoned");
    match reg.get(scheme) {
        Some(factory) => factory(args),
        None => Err(ChannelError::with_context(
            ErrorKind::NotDefined,
            format!("no backend registered for scheme '{scheme}'"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_info_string_requires_double_slash() {
        assert_eq!(split_info_string("File:///tmp/x").unwrap(), ("File", "/tmp/x"));
        assert_eq!(split_info_string("Tcp://host:80").unwrap(), ("Tcp", "host:80"));
        assert_eq!(
            split_info_string("File:/tmp/x").unwrap_err().kind(),
            ErrorKind::MissingSlashes
        );
        assert_eq!(split_info_string("noscheme").unwrap_err().kind(), ErrorKind::BadInfoString);
    }

    #[test]
    fn unknown_scheme_reports_not_defined() {
        let params = RefValueList::new();
        let args = OpenArgs {
            tail: "",
            mode: ChannelMode::R_ONLY,
            permissions: 0,
            params: &params,
        };
        match open_backend("RTBOS", &args) {
            Err(e) => assert_eq!(e.kind(), ErrorKind::NotDefined),
            Ok(_) => panic!("expected NotDefined error"),
        }
    }

    #[test]
    fn registration_hook_defines_new_scheme() {
        register_backend("TestNull", null::open);
        assert!(is_scheme_defined("TestNull"));
        let params = RefValueList::new();
        let args = OpenArgs {
            tail: "",
            mode: ChannelMode::W_ONLY,
            permissions: 0,
            params: &params,
        };
        assert!(open_backend("TestNull", &args).is_ok());
    }
}
