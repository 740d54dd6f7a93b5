use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream, UdpSocket};
use std::os::unix::io::{AsRawFd, FromRawFd, RawFd};
use std::time::Duration;

use super::{Backend, ChannelKind, Interest, OpenArgs};
use crate::error::{ChannelError, ErrorKind, Result};

fn wrap_read(e: std::io::Error) -> ChannelError {
    if matches!(e.kind(), std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut) {
        ChannelError::new(ErrorKind::Again)
    } else {
        ChannelError::with_context(ErrorKind::SocketRead, e.to_string())
    }
}

fn wrap_write(e: std::io::Error) -> ChannelError {
    if matches!(e.kind(), std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut) {
        ChannelError::new(ErrorKind::Again)
    } else {
        ChannelError::with_context(ErrorKind::SocketWrite, e.to_string())
    }
}

/// Connected TCP stream, client side (`Tcp://host:port`) or wrapped
/// (`Socket://<fd>`), or the single accepted connection of
/// `ServerTcp://port`.
pub struct TcpBackend {
    stream: TcpStream,
}

/// Resolve the connect target from the tail or from `host`/`port` keys.
fn connect_target(args: &OpenArgs<'_>) -> Result<String> {
    if !args.tail.is_empty() {
        return Ok(args.tail.to_string());
    }
    match (args.params.find("host"), args.params.find("port")) {
        (Some(host), Some(port)) => Ok(format!("{host}:{port}")),
        _ => Err(ChannelError::with_context(
            ErrorKind::BadOpenArg,
            "socket open needs 'host:port' or host/port keys",
        )),
    }
}

pub fn open_tcp(args: &OpenArgs<'_>) -> Result<Box<dyn Backend>> {
    let target = connect_target(args)?;
    let stream = TcpStream::connect(&target).map_err(|e| {
        let e = ChannelError::with_context(ErrorKind::UnableToConnect, e.to_string());
        tracing::warn!(addr = %target, error = %e, "tcp connect failed");
        e
    })?;
    stream.set_nodelay(true).ok();
    tracing::debug!(addr = %target, "tcp connected");
    Ok(Box::new(TcpBackend { stream }))
}

pub fn open_server_tcp(args: &OpenArgs<'_>) -> Result<Box<dyn Backend>> {
    let addr = bind_addr(args.tail)?;
    let listener = TcpListener::bind(addr)
        .map_err(|e| ChannelError::with_context(ErrorKind::UnableToConnect, e.to_string()))?;
    tracing::debug!(%addr, "server tcp waiting for one connection");
    let (stream, peer) = listener
        .accept()
        .map_err(|e| ChannelError::with_context(ErrorKind::UnableToConnect, e.to_string()))?;
    tracing::debug!(%peer, "server tcp accepted");
    Ok(Box::new(TcpBackend { stream }))
}

pub fn open_wrapped(args: &OpenArgs<'_>) -> Result<Box<dyn Backend>> {
    let fd: RawFd = args.tail.parse().map_err(|_| {
        ChannelError::with_context(
            ErrorKind::BadOpenArg,
            format!("'{}' is not a socket descriptor", args.tail),
        )
    })?;
    if fd < 0 {
        return Err(ChannelError::new(ErrorKind::BadFd));
    }
    let stream = unsafe { TcpStream::from_raw_fd(fd) };
    Ok(Box::new(TcpBackend { stream }))
}

impl TcpBackend {
    pub fn wrap(stream: TcpStream) -> Self {
        TcpBackend { stream }
    }
}

impl Backend for TcpBackend {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Socket
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.stream.read(buf).map_err(wrap_read)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.stream.write(buf).map_err(wrap_write)
    }

    fn close(&mut self) -> Result<()> {
        self.stream.shutdown(std::net::Shutdown::Both).ok();
        Ok(())
    }

    fn wait_ready(&mut self, interest: Interest, timeout: Duration) -> Result<bool> {
        super::poll_fd(self.stream.as_raw_fd(), interest, timeout)
    }

    fn get_property(&self, name: &str) -> Option<String> {
        match name {
            "Fd" => Some(self.stream.as_raw_fd().to_string()),
            "Peer" => self.stream.peer_addr().ok().map(|a| a.to_string()),
            _ => None,
        }
    }

    fn set_property(&mut self, name: &str, value: &str) -> Result<bool> {
        match name {
            "NoDelay" => {
                self.stream
                    .set_nodelay(value == "1" || value.eq_ignore_ascii_case("true"))
                    .map_err(ChannelError::from)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

/// UDP backend: connected client (`Udp://host:port`) or bound server
/// (`ServerUdp://port`, answers the last datagram peer).
pub struct UdpBackend {
    socket: UdpSocket,
    peer: Option<SocketAddr>,
    connected: bool,
}

pub fn open_udp(args: &OpenArgs<'_>) -> Result<Box<dyn Backend>> {
    let target = connect_target(args)?;
    let socket = UdpSocket::bind("0.0.0.0:0")
        .map_err(|e| ChannelError::with_context(ErrorKind::UnableToConnect, e.to_string()))?;
    socket
        .connect(&target)
        .map_err(|e| ChannelError::with_context(ErrorKind::UnableToConnect, e.to_string()))?;
    Ok(Box::new(UdpBackend { socket, peer: None, connected: true }))
}

pub fn open_server_udp(args: &OpenArgs<'_>) -> Result<Box<dyn Backend>> {
    let addr = bind_addr(args.tail)?;
    let socket = UdpSocket::bind(addr)
        .map_err(|e| ChannelError::with_context(ErrorKind::UnableToConnect, e.to_string()))?;
    Ok(Box::new(UdpBackend { socket, peer: None, connected: false }))
}

impl Backend for UdpBackend {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Socket
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.connected {
            self.socket.recv(buf).map_err(wrap_read)
        } else {
            let (n, peer) = self.socket.recv_from(buf).map_err(wrap_read)?;
            self.peer = Some(peer);
            Ok(n)
        }
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        if self.connected {
            return self.socket.send(buf).map_err(wrap_write);
        }
        match self.peer {
            Some(peer) => self.socket.send_to(buf, peer).map_err(wrap_write),
            None => Err(ChannelError::with_context(
                ErrorKind::SocketWrite,
                "no datagram peer known yet",
            )),
        }
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }

    fn wait_ready(&mut self, interest: Interest, timeout: Duration) -> Result<bool> {
        super::poll_fd(self.socket.as_raw_fd(), interest, timeout)
    }

    fn get_property(&self, name: &str) -> Option<String> {
        match name {
            "Fd" => Some(self.socket.as_raw_fd().to_string()),
            "Peer" => self.peer.map(|a| a.to_string()),
            _ => None,
        }
    }
}

/// Accept `port` or `host:port` for the server-side schemes.
fn bind_addr(tail: &str) -> Result<SocketAddr> {
    let text = if tail.contains(':') {
        tail.to_string()
    } else {
        format!("0.0.0.0:{tail}")
    };
    text.parse().map_err(|_| {
        ChannelError::with_context(
            ErrorKind::BadInfoString,
            format!("'{tail}' is not a bindable address"),
        )
    })
}
