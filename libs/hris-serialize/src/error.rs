use hris_channel::ChannelError;

/// Engine-level failures.
///
/// `Eof` is kept apart from `Channel` so a caller can tell a short read
/// from bad input; `Pending` is what every entry point returns once a
/// previous error aborted the current object, so nested serializer
/// functions unwind with `?` without issuing further I/O.
#[derive(Debug, thiserror::Error)]
pub enum SerializeError {
    #[error("channel: {0}")]
    Channel(#[from] ChannelError),

    #[error("header type mismatch: stream has '{found}', caller expects '{expected}'")]
    HeaderMismatch { expected: String, found: String },

    #[error("malformed serialization header")]
    BadHeader,

    #[error("unknown format '{0}'")]
    UnknownFormat(String),

    #[error("format '{format}' does not support {what}")]
    ModeNotAllowed { format: String, what: &'static str },

    #[error("bad serialize mode combination: {0}")]
    BadMode(&'static str),

    #[error("unexpected end of stream")]
    Eof,

    #[error("no stream attached")]
    NoStream,

    #[error("no format selected")]
    NoFormat,

    #[error("value mismatch: {0}")]
    BadValue(String),

    #[error("a previous serialization error is pending, call clean_error()")]
    Pending,
}

pub type Result<T> = std::result::Result<T, SerializeError>;
