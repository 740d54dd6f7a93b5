use std::io::{Read, Write};
use std::os::unix::io::AsRawFd;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::Duration;

use super::{Backend, ChannelKind, Interest, OpenArgs};
use crate::error::{ChannelError, ErrorKind, Result};
use crate::mode::ChannelMode;

/// Subprocess pipe backend (`PipeCmd://sort -u`).
///
/// Half-duplex: `W_ONLY` feeds the child's stdin, `R_ONLY` drains its
/// stdout. Bidirectional pipes are not supported.
pub struct PipeCmdBackend {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: Option<ChildStdout>,
}

pub fn open(args: &OpenArgs<'_>) -> Result<Box<dyn Backend>> {
    let command = args.tail.trim();
    if command.is_empty() {
        return Err(ChannelError::with_context(
            ErrorKind::BadInfoString,
            "PipeCmd:// needs a command line",
        ));
    }
    if args.mode.contains(ChannelMode::RW) {
        return Err(ChannelError::with_context(
            ErrorKind::BadMode,
            "PipeCmd is half-duplex, use R_ONLY or W_ONLY",
        ));
    }

    let writing = args.mode.is_writable();
    let mut cmd = Command::new("/bin/sh");
    cmd.arg("-c").arg(command);
    if writing {
        cmd.stdin(Stdio::piped());
    } else {
        cmd.stdout(Stdio::piped());
    }
    let mut child = cmd.spawn().map_err(|e| {
        let e = ChannelError::from(e);
        tracing::error!(command, error = %e, "pipe command spawn failed");
        e
    })?;
    tracing::debug!(command, pid = child.id(), "pipe command spawned");

    let stdin = child.stdin.take();
    let stdout = child.stdout.take();
    Ok(Box::new(PipeCmdBackend { child, stdin, stdout }))
}

impl Backend for PipeCmdBackend {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Fd
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        match &mut self.stdout {
            Some(out) => Ok(out.read(buf)?),
            None => Err(ChannelError::new(ErrorKind::BadPipe)),
        }
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        match &mut self.stdin {
            Some(input) => Ok(input.write(buf)?),
            None => Err(ChannelError::new(ErrorKind::BadPipe)),
        }
    }

    fn flush(&mut self) -> Result<()> {
        if let Some(input) = &mut self.stdin {
            input.flush()?;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        // Dropping stdin delivers EOF so the child can terminate.
        self.stdin.take();
        self.stdout.take();
        let status = self.child.wait().map_err(ChannelError::from)?;
        if !status.success() {
            tracing::warn!(?status, "pipe command exited with failure");
        }
        Ok(())
    }

    fn wait_ready(&mut self, interest: Interest, timeout: Duration) -> Result<bool> {
        let fd = match interest {
            Interest::Read => self.stdout.as_ref().map(|s| s.as_raw_fd()),
            Interest::Write => self.stdin.as_ref().map(|s| s.as_raw_fd()),
        };
        match fd {
            Some(fd) => super::poll_fd(fd, interest, timeout),
            None => Ok(false),
        }
    }

    fn get_property(&self, name: &str) -> Option<String> {
        match name {
            "Pid" => Some(self.child.id().to_string()),
            _ => None,
        }
    }
}
