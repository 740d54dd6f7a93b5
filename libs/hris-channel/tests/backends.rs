//! Backend behaviour against real OS resources.

use std::io::Write;
use std::os::unix::io::IntoRawFd;

use hris_channel::{permissions, Channel, ChannelMode, ErrorKind};

#[test]
fn pipecmd_reads_the_command_output() {
    let mut ch = Channel::open("PipeCmd://printf 'alpha beta'", ChannelMode::R_ONLY, 0).unwrap();
    let mut buf = [0u8; 32];
    let n = ch.read_block(&mut buf).unwrap();
    assert_eq!(&buf[..n], b"alpha beta");
    ch.close().unwrap();
}

#[test]
fn pipecmd_writes_reach_the_command() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("sink.txt");
    let info = format!("PipeCmd://cat > {}", target.display());
    let mut ch = Channel::open(&info, ChannelMode::W_ONLY, 0).unwrap();
    ch.write_block(b"through the pipe\n").unwrap();
    ch.close().unwrap(); // waits for the child

    assert_eq!(std::fs::read_to_string(&target).unwrap(), "through the pipe\n");
}

#[test]
fn pipecmd_refuses_bidirectional_mode() {
    match Channel::open("PipeCmd://cat", ChannelMode::RW, 0) {
        Err(err) => assert_eq!(err.kind(), ErrorKind::BadMode),
        Ok(_) => panic!("expected BadMode error"),
    }
}

#[test]
fn fd_backend_wraps_an_existing_descriptor() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fd.bin");
    std::fs::write(&path, b"wrapped descriptor").unwrap();
    let fd = std::fs::File::open(&path).unwrap().into_raw_fd();

    let mut ch = Channel::open(
        &format!("Fd://{fd}"),
        ChannelMode::R_ONLY | ChannelMode::CLOSE,
        0,
    )
    .unwrap();
    let mut buf = [0u8; 32];
    let n = ch.read_block(&mut buf).unwrap();
    assert_eq!(&buf[..n], b"wrapped descriptor");
    assert!(ch.is_seekable());
    ch.rewind().unwrap();
    let n = ch.read_block(&mut buf).unwrap();
    assert_eq!(&buf[..n], b"wrapped descriptor");
}

#[test]
fn memmapfd_backend_reads_and_patches_a_mapped_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"0123456789abcdef").unwrap();
    file.flush().unwrap();
    let fd = std::fs::OpenOptions::new()
        .read(true)
        .write(true)
        .open(file.path())
        .unwrap()
        .into_raw_fd();

    let mut ch = Channel::open(&format!("MemMapFd://{fd}:16"), ChannelMode::RW, 0).unwrap();
    let mut buf = [0u8; 4];
    ch.read_block(&mut buf).unwrap();
    assert_eq!(&buf, b"0123");

    ch.rewind().unwrap();
    ch.write_block(b"XYZ").unwrap();
    ch.flush().unwrap();
    assert!(ch.contents().unwrap().starts_with(b"XYZ3"));
}

#[test]
fn rand_backend_reads_entropy_and_refuses_writes() {
    let mut ch = Channel::open("Rand://", ChannelMode::R_ONLY, 0).unwrap();
    let mut a = [0u8; 16];
    let mut b = [0u8; 16];
    assert_eq!(ch.read_block(&mut a).unwrap(), 16);
    assert_eq!(ch.read_block(&mut b).unwrap(), 16);
    assert_ne!(a, b, "two 16-byte entropy reads should differ");
}

#[test]
fn null_backend_swallows_and_eofs() {
    let mut ch = Channel::open("Null://", ChannelMode::RW, 0).unwrap();
    assert_eq!(ch.write_block(b"whatever").unwrap(), 8);
    let mut buf = [0u8; 4];
    assert_eq!(ch.read(&mut buf).unwrap(), 0);
}

#[test]
fn file_backend_append_mode_appends() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("log.txt");
    let info = format!("File://{}", path.display());

    let mut first = Channel::open(
        &info,
        ChannelMode::W_ONLY | ChannelMode::CREAT | ChannelMode::TRUNC,
        permissions::DEFAULT,
    )
    .unwrap();
    first.write_block(b"one\n").unwrap();
    first.close().unwrap();

    let mut second = Channel::open(
        &info,
        ChannelMode::W_ONLY | ChannelMode::APPEND,
        permissions::DEFAULT,
    )
    .unwrap();
    second.write_block(b"two\n").unwrap();
    second.close().unwrap();

    assert_eq!(std::fs::read_to_string(&path).unwrap(), "one\ntwo\n");
}

#[test]
fn shm_backend_shares_bytes_between_channels() {
    let name = format!("hris-test-{}", std::process::id());
    let info = format!("Shm://{name}:4096");

    let mut writer = Channel::open(
        &info,
        ChannelMode::RW | ChannelMode::CREAT,
        permissions::RW_USER,
    )
    .unwrap();
    writer.write_block(b"shared payload").unwrap();
    writer.flush().unwrap();

    let mut reader = Channel::open(&info, ChannelMode::R_ONLY, 0).unwrap();
    let mut buf = [0u8; 14];
    reader.read_block(&mut buf).unwrap();
    assert_eq!(&buf, b"shared payload");

    unsafe {
        let c_name = std::ffi::CString::new(format!("/{name}")).unwrap();
        libc::shm_unlink(c_name.as_ptr());
    }
}

#[test]
fn tcp_pair_carries_bytes_both_ways() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let server = std::thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut ch = Channel::from_tcp_stream(stream);
        let mut buf = [0u8; 4];
        ch.read_block(&mut buf).unwrap();
        assert_eq!(&buf, b"ping");
        ch.write_block(b"pong").unwrap();
    });

    let mut client = Channel::open(&format!("Tcp://{addr}"), ChannelMode::RW, 0).unwrap();
    client.write_block(b"ping").unwrap();
    let mut buf = [0u8; 4];
    client.read_block(&mut buf).unwrap();
    assert_eq!(&buf, b"pong");
    server.join().unwrap();
}

#[test]
fn socket_channels_report_readiness() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let server = std::thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut ch = Channel::from_tcp_stream(stream);
        ch.write_block(b"ready").unwrap();
        std::thread::sleep(std::time::Duration::from_millis(50));
    });

    let mut client = Channel::open(&format!("Tcp://{addr}"), ChannelMode::RW, 0).unwrap();
    client.set_read_timeout_usec(500_000);
    assert!(client.is_write_possible().unwrap());
    assert!(client.is_read_data_available().unwrap());
    let mut buf = [0u8; 5];
    client.read_block(&mut buf).unwrap();
    assert_eq!(&buf, b"ready");
    server.join().unwrap();
}

#[test]
fn seek_on_a_socket_reports_bad_seek() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let server = std::thread::spawn(move || {
        let _ = listener.accept().unwrap();
        std::thread::sleep(std::time::Duration::from_millis(20));
    });
    let mut client = Channel::open(&format!("Tcp://{addr}"), ChannelMode::RW, 0).unwrap();
    let err = client.seek(std::io::SeekFrom::Start(0)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadSeek);
    server.join().unwrap();
}

#[test]
fn udp_pair_carries_datagrams() {
    let server_sock = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
    let addr = server_sock.local_addr().unwrap();

    let server = std::thread::spawn(move || {
        let mut buf = [0u8; 16];
        let (n, peer) = server_sock.recv_from(&mut buf).unwrap();
        server_sock.send_to(&buf[..n], peer).unwrap();
    });

    let mut client = Channel::open(&format!("Udp://{addr}"), ChannelMode::RW, 0).unwrap();
    client.write_block(b"echo me").unwrap();
    let mut buf = [0u8; 16];
    let n = client.read(&mut buf).unwrap();
    assert_eq!(&buf[..n], b"echo me");
    server.join().unwrap();
}
