//! Format-pluggable serialization of structured values over channels.
//!
//! The engine walks a composite value through `begin_type` /
//! `serialize` / `end_type` callbacks and dispatches each step to the
//! selected format plugin, which emits or consumes bytes via the
//! attached [`hris_channel::Channel`]. A versioned self-describing
//! header precedes every top-level value unless disabled.
//!
//! Three directions share one code path: Write emits, Read parses, Calc
//! replays the write path against a counting sink to pre-compute the
//! payload size.

mod engine;
mod error;
mod format;
mod header;
mod value;

pub use engine::{Mode, ModeFlags, Serialize, SerializeCtx, StreamMode, COLUMN_WRAP_DEFAULT, INDENT_STEP};
pub use error::{Result, SerializeError};
pub use format::{AllowedModes, FormatPlugin};
pub use header::{
    objsize_field, Header, HeaderInfo, HEADER_MAJOR_DEFAULT, HEADER_MAXLEN, HEADER_MINOR_DEFAULT,
    HEADER_PREAMBLE, OBJSIZE_WIDTH,
};
pub use value::{SerializeType, ValueRef};

// Re-exported so plugin crates name one dependency surface for I/O.
pub use hris_channel::{Channel, ChannelError, ChannelMode, ErrorKind, PrintArg, ScanArg};
