use crate::error::{ChannelError, ErrorKind, Result};

bitflags::bitflags! {
    /// Open mode of a channel.
    ///
    /// Exactly one of `R_ONLY` / `W_ONLY` / `RW` must be present; `CLOSE`
    /// and `NOTCLOSE` are mutually exclusive.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ChannelMode: u32 {
        const R_ONLY   = 1 << 0;
        const W_ONLY   = 1 << 1;
        const RW       = 1 << 2;
        const CREAT    = 1 << 3;
        const TRUNC    = 1 << 4;
        const APPEND   = 1 << 5;
        /// Close the underlying resource when the channel is closed (default).
        const CLOSE    = 1 << 6;
        /// Leave the underlying resource open when the channel is closed.
        const NOTCLOSE = 1 << 7;
    }
}

impl ChannelMode {
    pub fn is_readable(self) -> bool {
        self.intersects(ChannelMode::R_ONLY | ChannelMode::RW)
    }

    pub fn is_writable(self) -> bool {
        self.intersects(ChannelMode::W_ONLY | ChannelMode::RW)
    }

    pub fn validate(self) -> Result<()> {
        let access = self & (ChannelMode::R_ONLY | ChannelMode::W_ONLY | ChannelMode::RW);
        if access.bits().count_ones() != 1 {
            return Err(ChannelError::with_context(
                ErrorKind::BadMode,
                "exactly one of R_ONLY, W_ONLY, RW is required",
            ));
        }
        if self.contains(ChannelMode::CLOSE | ChannelMode::NOTCLOSE) {
            return Err(ChannelError::with_context(
                ErrorKind::BadFlags,
                "CLOSE and NOTCLOSE are mutually exclusive",
            ));
        }
        Ok(())
    }

    /// Parse the textual form used by the `{ mode: … }` key-value open
    /// syntax, e.g. `"W_ONLY|CREAT|TRUNC"`.
    pub fn parse(text: &str) -> Result<Self> {
        let mut mode = ChannelMode::empty();
        for word in text.split(|c: char| c == '|' || c.is_whitespace()) {
            if word.is_empty() {
                continue;
            }
            mode |= match word {
                "R_ONLY" => ChannelMode::R_ONLY,
                "W_ONLY" => ChannelMode::W_ONLY,
                "RW" => ChannelMode::RW,
                "CREAT" => ChannelMode::CREAT,
                "TRUNC" => ChannelMode::TRUNC,
                "APPEND" => ChannelMode::APPEND,
                "CLOSE" => ChannelMode::CLOSE,
                "NOTCLOSE" => ChannelMode::NOTCLOSE,
                other => {
                    return Err(ChannelError::with_context(
                        ErrorKind::BadMode,
                        format!("unknown mode flag '{other}'"),
                    ));
                }
            };
        }
        mode.validate()?;
        Ok(mode)
    }
}

/// POSIX-style permission bits used when a backend creates a file.
pub mod permissions {
    pub const ALL: u32 = 0o777;
    pub const RW_ALL: u32 = 0o666;
    pub const RW_USER: u32 = 0o600;
    pub const DEFAULT: u32 = 0o644;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_pipe_separated_flags() {
        let m = ChannelMode::parse("W_ONLY|CREAT|TRUNC").unwrap();
        assert!(m.is_writable());
        assert!(!m.is_readable());
        assert!(m.contains(ChannelMode::CREAT));
    }

    #[test]
    fn validate_rejects_double_access_mode() {
        let m = ChannelMode::R_ONLY | ChannelMode::W_ONLY;
        assert_eq!(m.validate().unwrap_err().kind(), ErrorKind::BadMode);
    }

    #[test]
    fn validate_rejects_close_and_notclose() {
        let m = ChannelMode::RW | ChannelMode::CLOSE | ChannelMode::NOTCLOSE;
        assert_eq!(m.validate().unwrap_err().kind(), ErrorKind::BadFlags);
    }
}
