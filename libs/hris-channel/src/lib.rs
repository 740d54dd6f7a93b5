//! Byte-oriented channels with pluggable backends.
//!
//! A [`Channel`] gives files, memory buffers, sockets, pipes, shared
//! memory and the standard streams one read/write/seek surface, plus a
//! formatted-I/O layer with scanf-style pattern matching, an optional
//! growable write buffer, and an unget stack for push-back parsing.
//!
//! Backends are chosen by info string — `File:///tmp/out.bin`,
//! `Mem://1024`, `Tcp://host:5000` — or by the key-value form
//! `{ stream: Mem, mode: RW, size: 1024 }`. Third-party transports hook
//! in through [`register_backend`].

pub mod backend;
mod buffer;
mod channel;
mod error;
mod fmt;
mod mode;
pub mod refvalue;

pub use backend::{register_backend, Backend, ChannelKind, Interest, MemBuffer, OpenArgs};
pub use channel::{Channel, DEFAULT_TIMEOUT_USEC};
pub use error::{ChannelError, ErrorKind, Result};
pub use fmt::{PrintArg, PrintFn, ScanArg, ScanFn};
pub use mode::{permissions, ChannelMode};
