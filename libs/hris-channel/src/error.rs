/// Closed error taxonomy of the channel layer.
///
/// The first block covers logical errors raised by the channel itself,
/// the second block mirrors the OS `errno` values a backend can surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorKind {
    #[default]
    None,
    AccessViolation,
    IncorrectFormat,
    BadBuffer,
    BadInfoString,
    BadSeek,
    BadSize,
    BadMemPtr,
    BadMmpSize,
    BadWhence,
    BadEndSeek,
    IoCallBeforeOpen,
    MissingSlashes,
    BadMode,
    BadShmName,
    SocketRead,
    SocketWrite,
    NotDefined,
    LowLevelWrite,
    StdinAccess,
    StdoutAccess,
    BadFlags,
    BadOpenArg,
    BadMemFlags,
    UnableToConnect,
    SocketTimeout,
    BadPrintfCallback,
    BadScanfCallback,
    TooManyUnget,
    NotSupported,

    // errno-mapped
    NoEntry,
    NotDir,
    IsDir,
    Permission,
    NameTooLong,
    Exists,
    NoSuchDevice,
    NoDevice,
    ReadOnlyFs,
    TextBusy,
    Fault,
    Loop,
    NoSpace,
    NoMem,
    TooManyOpen,
    SysFileLimit,
    Interrupted,
    Again,
    IoError,
    BadFd,
    Invalid,
    TooBig,
    BrokenPipe,
    BadPipe,
    Overflow,
}

impl ErrorKind {
    pub fn description(self) -> &'static str {
        match self {
            ErrorKind::None => "no error",
            ErrorKind::AccessViolation => "operation not allowed by the channel access mode",
            ErrorKind::IncorrectFormat => "incorrect format string",
            ErrorKind::BadBuffer => "bad buffer",
            ErrorKind::BadInfoString => "malformed info string",
            ErrorKind::BadSeek => "stream is not seekable",
            ErrorKind::BadSize => "bad size",
            ErrorKind::BadMemPtr => "bad memory pointer",
            ErrorKind::BadMmpSize => "bad memory map size",
            ErrorKind::BadWhence => "bad seek whence",
            ErrorKind::BadEndSeek => "seek beyond end of stream",
            ErrorKind::IoCallBeforeOpen => "I/O call before open",
            ErrorKind::MissingSlashes => "info string lacks '://' after the scheme",
            ErrorKind::BadMode => "invalid open mode combination",
            ErrorKind::BadShmName => "invalid shared memory name",
            ErrorKind::SocketRead => "socket read failed",
            ErrorKind::SocketWrite => "socket write failed",
            ErrorKind::NotDefined => "stream scheme is not defined",
            ErrorKind::LowLevelWrite => "low level write failed",
            ErrorKind::StdinAccess => "stdin is read-only",
            ErrorKind::StdoutAccess => "stdout/stderr are write-only",
            ErrorKind::BadFlags => "invalid flags",
            ErrorKind::BadOpenArg => "invalid open argument",
            ErrorKind::BadMemFlags => "invalid memory flags",
            ErrorKind::UnableToConnect => "unable to connect",
            ErrorKind::SocketTimeout => "socket timed out",
            ErrorKind::BadPrintfCallback => "printf callback failed",
            ErrorKind::BadScanfCallback => "scanf callback failed",
            ErrorKind::TooManyUnget => "unget buffer capacity exceeded",
            ErrorKind::NotSupported => "operation not supported by this backend",
            ErrorKind::NoEntry => "no such file or directory",
            ErrorKind::NotDir => "not a directory",
            ErrorKind::IsDir => "is a directory",
            ErrorKind::Permission => "permission denied",
            ErrorKind::NameTooLong => "name too long",
            ErrorKind::Exists => "already exists",
            ErrorKind::NoSuchDevice => "no such device or address",
            ErrorKind::NoDevice => "no such device",
            ErrorKind::ReadOnlyFs => "read-only file system",
            ErrorKind::TextBusy => "text file busy",
            ErrorKind::Fault => "bad address",
            ErrorKind::Loop => "too many symbolic links",
            ErrorKind::NoSpace => "no space left",
            ErrorKind::NoMem => "out of memory",
            ErrorKind::TooManyOpen => "too many open files",
            ErrorKind::SysFileLimit => "system file table overflow",
            ErrorKind::Interrupted => "interrupted system call",
            ErrorKind::Again => "resource temporarily unavailable",
            ErrorKind::IoError => "I/O error",
            ErrorKind::BadFd => "bad file descriptor",
            ErrorKind::Invalid => "invalid argument",
            ErrorKind::TooBig => "value too big",
            ErrorKind::BrokenPipe => "broken pipe",
            ErrorKind::BadPipe => "bad pipe",
            ErrorKind::Overflow => "value overflow",
        }
    }

    /// Map an OS errno into the taxonomy.
    pub fn from_errno(errno: i32) -> Self {
        match errno {
            libc::ENOENT => ErrorKind::NoEntry,
            libc::ENOTDIR => ErrorKind::NotDir,
            libc::EISDIR => ErrorKind::IsDir,
            libc::EACCES => ErrorKind::Permission,
            libc::ENAMETOOLONG => ErrorKind::NameTooLong,
            libc::EEXIST => ErrorKind::Exists,
            libc::ENXIO => ErrorKind::NoSuchDevice,
            libc::ENODEV => ErrorKind::NoDevice,
            libc::EROFS => ErrorKind::ReadOnlyFs,
            libc::ETXTBSY => ErrorKind::TextBusy,
            libc::EFAULT => ErrorKind::Fault,
            libc::ELOOP => ErrorKind::Loop,
            libc::ENOSPC => ErrorKind::NoSpace,
            libc::ENOMEM => ErrorKind::NoMem,
            libc::EMFILE => ErrorKind::TooManyOpen,
            libc::ENFILE => ErrorKind::SysFileLimit,
            libc::EINTR => ErrorKind::Interrupted,
            libc::EAGAIN => ErrorKind::Again,
            libc::EIO => ErrorKind::IoError,
            libc::EBADF => ErrorKind::BadFd,
            libc::EINVAL => ErrorKind::Invalid,
            libc::EFBIG => ErrorKind::TooBig,
            libc::EPIPE => ErrorKind::BrokenPipe,
            libc::EOVERFLOW => ErrorKind::Overflow,
            _ => ErrorKind::IoError,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.description())
    }
}

/// Error value returned by every fallible channel primitive.
///
/// Carries the taxonomy kind, the raw OS error when one was involved,
/// and an optional human-readable context string.
#[derive(Clone)]
pub struct ChannelError {
    kind: ErrorKind,
    os_err: Option<i32>,
    context: Option<String>,
}

impl ChannelError {
    pub fn new(kind: ErrorKind) -> Self {
        Self { kind, os_err: None, context: None }
    }

    pub fn with_context(kind: ErrorKind, context: impl Into<String>) -> Self {
        Self { kind, os_err: None, context: Some(context.into()) }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn os_error(&self) -> Option<i32> {
        self.os_err
    }
}

impl std::fmt::Debug for ChannelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {self}", self.kind)
    }
}

impl std::fmt::Display for ChannelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.context {
            Some(ctx) => write!(f, "{}: {ctx}", self.kind),
            None => f.write_str(self.kind.description()),
        }
    }
}

impl std::error::Error for ChannelError {}

impl From<std::io::Error> for ChannelError {
    fn from(e: std::io::Error) -> Self {
        let kind = match e.raw_os_error() {
            Some(errno) => ErrorKind::from_errno(errno),
            None => match e.kind() {
                std::io::ErrorKind::UnexpectedEof => ErrorKind::IoError,
                std::io::ErrorKind::TimedOut => ErrorKind::SocketTimeout,
                std::io::ErrorKind::ConnectionRefused => ErrorKind::UnableToConnect,
                std::io::ErrorKind::BrokenPipe => ErrorKind::BrokenPipe,
                std::io::ErrorKind::WouldBlock => ErrorKind::Again,
                _ => ErrorKind::IoError,
            },
        };
        Self { kind, os_err: e.raw_os_error(), context: Some(e.to_string()) }
    }
}

pub type Result<T> = std::result::Result<T, ChannelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errno_mapping_covers_common_codes() {
        assert_eq!(ErrorKind::from_errno(libc::ENOENT), ErrorKind::NoEntry);
        assert_eq!(ErrorKind::from_errno(libc::EPIPE), ErrorKind::BrokenPipe);
        assert_eq!(ErrorKind::from_errno(libc::EAGAIN), ErrorKind::Again);
        assert_eq!(ErrorKind::from_errno(-1), ErrorKind::IoError);
    }

    #[test]
    fn io_error_conversion_keeps_errno() {
        let e = ChannelError::from(std::io::Error::from_raw_os_error(libc::EBADF));
        assert_eq!(e.kind(), ErrorKind::BadFd);
        assert_eq!(e.os_error(), Some(libc::EBADF));
    }
}
